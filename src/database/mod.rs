use std::sync::Arc;

use anyhow::Result;
use sqlx::{PgPool, postgres::PgPoolOptions};

use crate::config::Config;

pub mod memory;
pub mod models;
pub mod repositories;
pub mod store;
pub mod utils;

pub use memory::MemoryStore;
pub use repositories::PgStore;
pub use store::Store;

pub async fn init_database(database_url: &str) -> Result<PgPool> {
    let pool = PgPoolOptions::new()
        .max_connections(10)
        .connect(database_url)
        .await?;

    log::info!("Running database migrations...");
    sqlx::migrate!("./migrations").run(&pool).await?;
    log::info!("Migrations completed successfully");

    Ok(pool)
}

/// Storage selected by `DATABASE_URL`; `memory` keeps everything in process.
pub async fn connect_store(config: &Config) -> Result<Arc<dyn Store>> {
    if config.uses_memory_store() {
        log::warn!("DATABASE_URL=memory: data will not survive a restart");
        return Ok(Arc::new(MemoryStore::new()));
    }

    let pool = init_database(&config.database_url).await?;
    Ok(Arc::new(PgStore::new(pool)))
}
