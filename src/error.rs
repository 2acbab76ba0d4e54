use std::path::PathBuf;
use thiserror::Error;

use crate::session::{ErrorInfo, FailureStage, Phase};

/// Failures reported by the remote detection and persistence services.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ClientError {
    /// Transport failure or timeout. The user may retry.
    #[error("network error: {0}")]
    Network(String),

    /// Missing, expired or rejected credential. Never retried automatically.
    #[error("authentication failed: {0}")]
    Auth(String),

    /// Structured rejection from the backend; the message is shown verbatim.
    #[error("{message}")]
    Service { message: String },

    /// The response body could not be understood.
    #[error("malformed response: {0}")]
    Parse(String),
}

impl ClientError {
    pub fn is_auth(&self) -> bool {
        matches!(self, ClientError::Auth(_))
    }
}

/// Local misuse of a review session. None of these reach the network.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum ReviewError {
    #[error("{field} must not be blank")]
    Validation { field: &'static str },

    #[error("cannot {operation} while the session is {phase}")]
    InvalidPhase {
        operation: &'static str,
        phase: Phase,
    },

    #[error("object index {index} is out of range ({len} detection(s))")]
    OutOfRange { index: usize, len: usize },

    #[error("sign-in expired; sign in again and start over")]
    ReauthRequired,
}

/// The main error type for the command-line front end.
#[derive(Debug, Error)]
pub enum LostlensError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to read config from {path}: {source}")]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Failed to parse detection response from {path}: {message}")]
    ResponseParse { path: PathBuf, message: String },

    #[error(transparent)]
    Review(#[from] ReviewError),

    #[error("{stage} failed: {info}")]
    WorkflowFailed { stage: FailureStage, info: ErrorInfo },

    #[error("Gave up waiting for the backend; session is still {phase}")]
    Unsettled { phase: Phase },

    #[error("Failed to write JSON output: {0}")]
    JsonWrite(#[from] serde_json::Error),
}
