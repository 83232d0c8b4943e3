//! Postgres implementation of the storage traits.
//!
//! Each mutation runs in one transaction together with its activity row.

use sqlx::PgPool;

use crate::database::store::StoreError;

pub mod activity;
pub mod outbox;
pub mod payment;
pub mod report;
pub mod teacher;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

/// Unique violations become [`StoreError::Duplicate`] so callers can tell a
/// lost race from a broken database.
pub(crate) fn map_duplicate(err: sqlx::Error, what: impl FnOnce() -> String) -> anyhow::Error {
    match &err {
        sqlx::Error::Database(db_error) if db_error.is_unique_violation() => {
            StoreError::Duplicate(what()).into()
        }
        _ => err.into(),
    }
}
