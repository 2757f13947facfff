use std::time::Duration;

use cellar_client::ClientError;
use thiserror::Error;

/// What went wrong in a failed refresh, kept for callers that joined it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    Timeout,
    /// CellarTracker rejected the credentials
    Authentication,
    Fetch,
}

/// Why a refresh did not produce a new snapshot
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error("fetching inventory timed out after {0:?}")]
    Timeout(Duration),

    #[error("fetching inventory failed: {0}")]
    Fetch(#[from] ClientError),

    /// The refresh this caller waited on failed
    #[error("concurrent refresh failed: {reason}")]
    Joined { kind: FailureKind, reason: String },
}

impl RefreshError {
    pub fn kind(&self) -> FailureKind {
        match self {
            RefreshError::Timeout(_) => FailureKind::Timeout,
            RefreshError::Fetch(ClientError::Authentication) => FailureKind::Authentication,
            RefreshError::Fetch(_) => FailureKind::Fetch,
            RefreshError::Joined { kind, .. } => *kind,
        }
    }
}

/// Why an account could not be set up
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("invalid CellarTracker credentials")]
    InvalidAuth,

    #[error("cannot connect to CellarTracker: {0}")]
    CannotConnect(String),
}

impl From<RefreshError> for SetupError {
    fn from(err: RefreshError) -> Self {
        match err.kind() {
            FailureKind::Authentication => SetupError::InvalidAuth,
            FailureKind::Timeout | FailureKind::Fetch => {
                SetupError::CannotConnect(err.to_string())
            }
        }
    }
}
