//! Error types for flavorsnap-client

use flavorsnap_common::ValidationError;
use thiserror::Error;

/// Failure of a single request to one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttemptError {
    /// Connection, timeout or body read failure; retried within the endpoint
    #[error("{message}")]
    Transport { endpoint: String, message: String },

    /// Endpoint answered but unusably (error status, non-JSON body);
    /// not retried, the next endpoint is tried instead
    #[error("{message}")]
    Application {
        endpoint: String,
        status: Option<u16>,
        message: String,
    },
}

impl AttemptError {
    pub fn is_transport(&self) -> bool {
        matches!(self, AttemptError::Transport { .. })
    }

    pub fn endpoint(&self) -> &str {
        match self {
            AttemptError::Transport { endpoint, .. } | AttemptError::Application { endpoint, .. } => endpoint,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            AttemptError::Transport { .. } => None,
            AttemptError::Application { status, .. } => *status,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            AttemptError::Transport { .. } => "transport",
            AttemptError::Application { .. } => "application",
        }
    }
}

/// Outcome of a whole classification that produced no predictions
#[derive(Debug, Error)]
pub enum ClassifyError {
    /// Rejected locally; no request was sent
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Caller abort or overall deadline
    #[error("Classification cancelled")]
    Cancelled,

    /// Every endpoint failed; carries the last failure seen
    #[error("{last_error}")]
    Exhausted { last_error: AttemptError },

    /// Every endpoint answered, none with a usable prediction
    #[error("No prediction returned by API")]
    NoPrediction,

    #[error("No classification endpoints configured")]
    NoEndpoints,

    /// HTTP client could not be constructed
    #[error("HTTP client error: {0}")]
    Client(String),
}

impl ClassifyError {
    /// User-initiated; a UI shows no failure message for it
    pub fn is_cancelled(&self) -> bool {
        matches!(self, ClassifyError::Cancelled)
    }

    /// Re-running the pipeline could succeed
    pub fn is_retryable(&self) -> bool {
        matches!(self, ClassifyError::Exhausted { .. } | ClassifyError::NoPrediction)
    }
}
