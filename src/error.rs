use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("degenerate state: {0}")]
    DegenerateState(String),
    #[error("unsupported object: {0}")]
    UnsupportedObject(String),
    #[error("propensity of event {event} failed: {reason}")]
    Propensity { event: String, reason: String },
    #[error("invalid argument: {0}")]
    InvalidArgument(String),
    #[error("thread pool error: {0}")]
    ThreadPool(String),
    #[error("malformed document: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SimError>;
