use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;

use crate::config::Config;

pub mod models;
pub mod queries;

pub async fn create_pool(config: &Config) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(5)
        .acquire_timeout(config.store_timeout())
        .connect(&config.database_url)
        .await
}

#[derive(Error, Debug)]
pub enum StoreError {
    /// Any of the four point queries found no row for the identifier.
    #[error("order {0} not found")]
    NotFound(String),

    /// The header row already exists; the write was rolled back and the
    /// original aggregate left untouched.
    #[error("order {0} already exists")]
    Duplicate(String),

    #[error("store call exceeded its deadline")]
    Timeout,

    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),
}

impl crate::utils::retry::Transient for StoreError {
    /// Connection-level failures are worth retrying; constraint
    /// violations, missing rows and duplicates are not.
    fn is_transient(&self) -> bool {
        match self {
            StoreError::Timeout => true,
            StoreError::Sqlx(e) => matches!(
                e,
                sqlx::Error::Io(_)
                    | sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::WorkerCrashed
            ),
            StoreError::NotFound(_) | StoreError::Duplicate(_) => false,
        }
    }
}
