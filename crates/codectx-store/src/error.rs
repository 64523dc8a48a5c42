//! Error types for codectx-store.

use std::num::TryFromIntError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Sqlite(#[from] sqlx::Error),

    #[error("migration failed: {0}")]
    Migrate(#[from] sqlx::migrate::MigrateError),

    #[error("Qdrant error: {0}")]
    Qdrant(#[from] Box<qdrant_client::QdrantError>),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A vector length does not match the dimensionality the index was created with.
    #[error("vector has {actual} dimensions, index expects {expected}")]
    Dimension { expected: usize, actual: usize },

    #[error("corrupt record {id}: {reason}")]
    Corrupt { id: String, reason: String },

    #[error("lock poisoned: {0}")]
    Lock(String),

    #[error("integer conversion failed: {0}")]
    IntConversion(#[from] TryFromIntError),
}

pub type Result<T> = std::result::Result<T, StoreError>;
