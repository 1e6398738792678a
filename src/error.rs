use thiserror::Error;
use crate::ExchangeId;

pub type Result<T> = std::result::Result<T, ExchangeError>;

#[derive(Error, Debug)]
pub enum ExchangeError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    #[error("No counter-offers remaining")]
    NegotiationExhausted,

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Place not found: {0}")]
    PlaceNotFound(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Exchange not found: {0}")]
    NotFound(ExchangeId),

    #[error("Stale write: expected version {expected}, found {found}")]
    StaleVersion { expected: u64, found: u64 },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("IO error: {0}")]
    Io(String),
}

impl From<serde_json::Error> for ExchangeError {
    fn from(err: serde_json::Error) -> Self {
        ExchangeError::Serialization(err.to_string())
    }
}

impl From<uuid::Error> for ExchangeError {
    fn from(err: uuid::Error) -> Self {
        ExchangeError::Validation(err.to_string())
    }
}

impl From<std::io::Error> for ExchangeError {
    fn from(err: std::io::Error) -> Self {
        ExchangeError::Io(err.to_string())
    }
}

impl ExchangeError {
    pub(crate) fn transition(msg: impl Into<String>) -> Self {
        ExchangeError::InvalidStateTransition(msg.into())
    }

    pub(crate) fn validation(msg: impl Into<String>) -> Self {
        ExchangeError::Validation(msg.into())
    }
}
