//! Session phases, recorded failures and the read-only snapshot.

use std::fmt;

use serde::Serialize;

use crate::error::ClientError;
use crate::geometry::{Dimensions, DisplayBox};
use crate::image_source::ImageSource;
use crate::model::{Detection, LostItemRecord, RecordId};

/// Where a review session is in the upload → detect → review → save flow.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Phase {
    Idle,
    Detecting,
    Reviewing,
    Saving,
    Saved,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::Idle => "idle",
            Phase::Detecting => "detecting",
            Phase::Reviewing => "reviewing",
            Phase::Saving => "saving",
            Phase::Saved => "saved",
            Phase::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Category of a recorded failure, as shown to the user.
///
/// Malformed responses are reported as `Service`; the parse details only go
/// to the log.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Network,
    AuthExpired,
    Service,
}

/// Which remote step a failure belongs to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailureStage {
    Detection,
    Save,
}

impl fmt::Display for FailureStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureStage::Detection => f.write_str("detection"),
            FailureStage::Save => f.write_str("save"),
        }
    }
}

const UNREADABLE_RESPONSE: &str = "the service returned a response that could not be read";

/// A failure recorded on the session.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ErrorInfo {
    pub kind: ErrorKind,
    pub stage: FailureStage,
    pub message: String,
}

impl ErrorInfo {
    pub fn from_client(err: &ClientError, stage: FailureStage) -> Self {
        let (kind, message) = match err {
            ClientError::Network(message) => (ErrorKind::Network, message.clone()),
            ClientError::Auth(message) => (ErrorKind::AuthExpired, message.clone()),
            ClientError::Service { message } => (ErrorKind::Service, message.clone()),
            ClientError::Parse(detail) => {
                log::warn!("{} response could not be parsed: {}", stage, detail);
                (ErrorKind::Service, UNREADABLE_RESPONSE.to_string())
            }
        };
        Self {
            kind,
            stage,
            message,
        }
    }

    pub fn validation(field: &str) -> Self {
        Self {
            kind: ErrorKind::Validation,
            stage: FailureStage::Save,
            message: format!("{} must not be blank", field),
        }
    }

    /// True unless the failure requires signing in again.
    pub fn is_resumable(&self) -> bool {
        self.kind != ErrorKind::AuthExpired
    }
}

impl fmt::Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.message)
    }
}

/// Work the session wants done: submit `image` for detection.
#[derive(Clone, Debug)]
pub struct DetectRequest {
    pub generation: u64,
    pub image: ImageSource,
    pub location: Option<String>,
}

/// Work the session wants done: persist `record`.
#[derive(Clone, Debug)]
pub struct SaveRequest {
    pub generation: u64,
    pub record: LostItemRecord,
}

/// Everything a presentation layer needs, captured at one instant.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ReviewSnapshot {
    pub phase: Phase,
    pub generation: u64,
    pub file_name: Option<String>,
    pub image_ref: Option<String>,
    pub detections: Vec<Detection>,
    /// One entry per detection; `None` until the box can be mapped.
    pub display_boxes: Vec<Option<DisplayBox>>,
    pub selected: Option<usize>,
    pub manual_description: Option<String>,
    pub rendered: Option<Dimensions>,
    pub error: Option<ErrorInfo>,
    pub saved_id: Option<RecordId>,
}

impl ReviewSnapshot {
    pub fn selected_detection(&self) -> Option<&Detection> {
        self.selected.and_then(|index| self.detections.get(index))
    }
}
