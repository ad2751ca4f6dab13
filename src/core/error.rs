use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Delivery error: {0}")]
    Delivery(String),
}

impl From<tempfile::PersistError> for Error {
    fn from(err: tempfile::PersistError) -> Self {
        Self::Io(err.error)
    }
}

pub type Result<T> = std::result::Result<T, Error>;
