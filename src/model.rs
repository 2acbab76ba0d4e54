//! Records exchanged between the session and the remote services.

use std::fmt;

use serde::Serialize;

use crate::geometry::DetectionBox;

/// One object reported by the detection service.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    /// Class label (e.g. "wallet").
    pub label: String,

    /// Score in `[0, 1]`.
    pub confidence: f64,

    /// Box in the configured detection space, if the service sent one.
    #[serde(rename = "box", skip_serializing_if = "Option::is_none")]
    pub bbox: Option<DetectionBox>,
}

impl Detection {
    pub fn new(label: impl Into<String>, confidence: f64, bbox: Option<DetectionBox>) -> Self {
        Self {
            label: label.into(),
            confidence,
            bbox,
        }
    }
}

/// A successful detection call: where the service stored the upload, and
/// what it found, in response order.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetectionResponse {
    pub image_url: String,
    pub detections: Vec<Detection>,
}

/// Identifier assigned by the record store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct RecordId(pub String);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// User-entered fields supplied when saving.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SaveMetadata {
    /// Explicit description. Falls back to the manual override, then to the
    /// selected detection's label.
    pub description: Option<String>,
    pub location: String,
    pub user_id: Option<i64>,
}

impl SaveMetadata {
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
            ..Default::default()
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_user_id(mut self, user_id: i64) -> Self {
        self.user_id = Some(user_id);
        self
    }
}

/// The finalized record handed to the persistence service.
#[derive(Clone, Debug, PartialEq)]
pub struct LostItemRecord {
    pub image_ref: String,
    pub description: String,
    pub location: String,
    /// Copy of the detections at the moment `save` was called.
    pub detection_snapshot: Vec<Detection>,
    pub created_by: Option<i64>,
}
