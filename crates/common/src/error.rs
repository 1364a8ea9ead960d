use thiserror::Error;

/// Common error types used across the dispatcher.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("Decode error: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Validation error: {0}")]
    Validation(String),
}

impl AppError {
    /// Malformed or stale input that should be dropped rather than retried.
    pub fn is_malformed_input(&self) -> bool {
        matches!(
            self,
            AppError::Decode(_) | AppError::NotFound(_) | AppError::Validation(_)
        )
    }
}
