//! Error types for the data layer.

/// Errors that can occur in the data layer.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A Redis/KV operation failed.
    #[error("KV error: {0}")]
    Kv(#[from] fred::error::Error),

    /// A serialization or deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A key was not found in the KV cache.
    #[error("Key not found: {0}")]
    KeyNotFound(String),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),
}
