pub mod analysis_logs;
pub mod emails;
pub mod housing_authorities;
pub mod pool;
pub mod properties;
pub mod tasks;

pub use pool::{apply_schema, create_pool_from_url, DbPoolError, PgPool};

use deadpool_postgres::PoolError;
use thiserror::Error;
use tokio_postgres::Error as PgError;

/// Shared error type for the storage modules.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to get postgres connection: {0}")]
    Pool(#[from] PoolError),
    #[error("postgres error: {0}")]
    Postgres(#[from] PgError),
    #[error("failed to map row: {0}")]
    Mapping(String),
    #[error("not found: {0}")]
    NotFound(String),
}
