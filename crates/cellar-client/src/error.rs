use reqwest::StatusCode;
use thiserror::Error;

pub type ClientResult<T> = Result<T, ClientError>;

/// Errors from fetching the inventory
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("request to CellarTracker failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("CellarTracker answered with status {0}")]
    Status(StatusCode),

    #[error("CellarTracker rejected the username or password")]
    Authentication,

    #[error("failed to parse inventory export: {0}")]
    Parse(#[from] csv::Error),
}
