use thiserror::Error;

/// Failures surfaced by the repository layer.
///
/// Store errors propagate uncaught to the caller — there is no retry and
/// no backoff anywhere in this crate. "No rows" on a single-row read is
/// not an error; those operations return `Ok(None)` instead.
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("store request failed: {0}")]
    Persistence(String),

    #[error("operation requires a signed-in user")]
    AuthRequired,

    #[error("{0} not found")]
    NotFound(String),

    #[error("invalid input: {0}")]
    Validation(String),

    #[error("missing configuration: {0}")]
    Config(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        ApiError::Persistence(err.to_string())
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::Persistence(format!("malformed store response: {}", err))
    }
}
