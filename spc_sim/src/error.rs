use thiserror::Error;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("invalid generation parameters: {0}")]
    InvalidParams(String),
    #[error("malformed reading: value {0} is not finite")]
    MalformedReading(f64),
    #[error("timed out waiting for condition")]
    Timeout,
}

pub type Result<T> = std::result::Result<T, SimError>;
