use std::time::Duration;

use actix_cors::Cors;
use actix_web::{App, HttpServer, middleware::Logger};
use anyhow::Result;

use teacher_payments::database::connect_store;
use teacher_payments::middleware::{RequestIdMiddleware, RequestInfoMiddleware};
use teacher_payments::services::notifier::gateway_from_config;
use teacher_payments::{AppState, Config, routes};

#[actix_web::main]
async fn main() -> Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize logger
    env_logger::init();

    log::info!("Starting teacher payments API server...");

    let config = Config::from_env()?;
    log::info!(
        "Configuration loaded (environment: {})",
        config.environment
    );

    let store = connect_store(&config).await?;
    let gateway = gateway_from_config(&config)?;
    log::info!("Storage ready, SMS via {}", gateway.name());

    let state = AppState::new(config.clone(), store, gateway).await;
    let dispatcher = state
        .notifier
        .clone()
        .spawn_dispatcher(Duration::from_secs(config.outbox_poll_seconds));

    let server_address = config.server_address();
    let allowed_origin = config.client_base_url.clone();
    log::info!("Server starting on http://{}", server_address);

    let result = HttpServer::new(move || {
        App::new()
            .configure(|cfg| routes::configure(cfg, &state))
            .wrap(
                Cors::default()
                    .allowed_origin(&allowed_origin)
                    .allowed_methods(vec!["GET", "POST", "PUT", "OPTIONS"])
                    .allowed_headers(vec![
                        "Authorization",
                        "Content-Type",
                        "Accept",
                        "X-Requested-With",
                        "X-Correlation-ID",
                    ])
                    .expose_headers(vec!["Content-Disposition", "X-Correlation-ID"])
                    .max_age(3600),
            )
            .wrap(RequestInfoMiddleware)
            .wrap(RequestIdMiddleware)
            .wrap(Logger::new(
                r#"%a "%r" %s %b "%{Referer}i" "%{User-Agent}i" %T correlation_id=%{x-correlation-id}o"#,
            ))
    })
    .bind(&server_address)?
    .run()
    .await
    .map_err(|e| anyhow::anyhow!("Server error: {}", e));

    dispatcher.abort();
    result
}
