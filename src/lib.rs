use std::sync::Arc;

use actix_web::web;

pub mod config;
pub mod database;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod services;

pub use config::Config;
pub use database::store::Store;
pub use error::AppError;
pub use services::{EventBus, Notifier, PaymentListCache, PaymentService, SmsGateway, TeacherService};

const PAYMENT_CACHE_CAPACITY: u64 = 1000;

/// Everything the HTTP layer and the background dispatcher share.
#[derive(Clone)]
pub struct AppState {
    pub config: web::Data<Config>,
    pub payments: web::Data<PaymentService>,
    pub teachers: web::Data<TeacherService>,
    pub events: EventBus,
    pub notifier: Arc<Notifier>,
}

impl AppState {
    pub async fn new(config: Config, store: Arc<dyn Store>, gateway: Arc<dyn SmsGateway>) -> Self {
        let events = EventBus::new();
        let cache = PaymentListCache::new(PAYMENT_CACHE_CAPACITY, config.cache_ttl_seconds);
        events.subscribe(Arc::new(cache.clone())).await;

        let notifier = Notifier::new(store.clone(), gateway, events.clone(), &config);
        let payments = PaymentService::new(
            store.clone(),
            events.clone(),
            cache,
            notifier.clone(),
            &config,
        );
        let teachers = TeacherService::new(store, events.clone());

        Self {
            config: web::Data::new(config),
            payments: web::Data::new(payments),
            teachers: web::Data::new(teachers),
            events,
            notifier: Arc::new(notifier),
        }
    }
}
