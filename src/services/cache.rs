use std::{
    sync::{
        Arc,
        atomic::{AtomicU64, Ordering},
    },
    time::Duration,
};

use async_trait::async_trait;
use moka::future::Cache;

use crate::database::models::TeacherPayment;
use crate::services::events::{MutationSubscriber, PaymentEvent};

/// Payment listings keyed by canonical period token.
///
/// Entries are dropped when a committed mutation touches their period; the
/// TTL only bounds how long a listing survives writes made outside this
/// process.
///
/// A listing read from the store is only kept if no invalidation happened
/// since the read started: callers take [`PaymentListCache::generation`]
/// before reading and hand it back to [`PaymentListCache::put`].
#[derive(Clone)]
pub struct PaymentListCache {
    cache: Arc<Cache<String, Arc<Vec<TeacherPayment>>>>,
    generation: Arc<AtomicU64>,
}

impl PaymentListCache {
    pub fn new(max_capacity: u64, ttl_seconds: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(ttl_seconds))
            .build();
        Self {
            cache: Arc::new(cache),
            generation: Arc::new(AtomicU64::new(0)),
        }
    }

    pub async fn get(&self, period: &str) -> Option<Arc<Vec<TeacherPayment>>> {
        let hit = self.cache.get(period).await;
        log::debug!(
            "Payment list cache {} for {}",
            if hit.is_some() { "hit" } else { "miss" },
            period
        );
        hit
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    /// Cache a listing read at `seen_generation`. A listing that raced an
    /// invalidation is returned to the caller but not kept.
    pub async fn put(
        &self,
        period: &str,
        payments: Vec<TeacherPayment>,
        seen_generation: u64,
    ) -> Arc<Vec<TeacherPayment>> {
        let payments = Arc::new(payments);
        if self.generation() != seen_generation {
            log::debug!("Skipping stale payment list for {}", period);
            return payments;
        }

        self.cache.insert(period.to_string(), payments.clone()).await;
        // An invalidation between the check and the insert may have run
        // before the entry existed.
        if self.generation() != seen_generation {
            self.cache.invalidate(period).await;
        }
        payments
    }

    pub async fn invalidate(&self, period: &str) {
        log::debug!("Invalidating payment list cache for {}", period);
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.cache.invalidate(period).await;
    }
}

#[async_trait]
impl MutationSubscriber for PaymentListCache {
    fn name(&self) -> &'static str {
        "payment_list_cache"
    }

    async fn on_event(&self, event: &PaymentEvent) {
        if let Some(period) = event.period() {
            self.invalidate(period).await;
        }
    }
}
