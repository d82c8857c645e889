use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("claim not found: {0}")]
    ClaimNotFound(String),
}

pub type Result<T> = std::result::Result<T, StoreError>;
