use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("document acquisition failed: {0}")]
    Acquisition(String),

    #[error("model capability unavailable: {0}")]
    ModelUnavailable(String),

    #[error("cache integrity: {0}")]
    CacheIntegrity(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("serialization: {0}")]
    Serialization(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
