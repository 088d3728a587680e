use thiserror::Error;

pub type NeatResult<T> = Result<T, NeatError>;

#[derive(Error, Debug)]
pub enum NeatError {
    #[error("required capability missing: {0}")]
    MissingCapability(&'static str),

    #[error("invalid settings: {0}")]
    InvalidSettings(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}
