//! Remote collaborators: the detection service and the record store.
//!
//! Both are reached over HTTP with a bearer token taken from an injected
//! [`AuthProvider`](crate::auth::AuthProvider). Each call issues exactly one
//! request and never retries on its own; retrying is a user decision made
//! through the review session.

mod detection;
mod http;
mod multipart;
mod persistence;

pub use detection::{parse_detection_response, DetectionClient};
pub use http::{HttpTransport, DEFAULT_TIMEOUT};
pub use persistence::{
    encode_save_body, parse_save_reply, DetectionResult, PersistenceClient, SaveBody,
};

use crate::error::ClientError;
use crate::image_source::ImageSource;
use crate::model::{DetectionResponse, LostItemRecord, RecordId};

/// Submits an image for inference.
pub trait DetectionService: Send + Sync {
    fn detect(
        &self,
        image: &ImageSource,
        location: Option<&str>,
    ) -> Result<DetectionResponse, ClientError>;
}

/// Stores a finalized record.
pub trait PersistenceService: Send + Sync {
    fn save(&self, record: &LostItemRecord) -> Result<RecordId, ClientError>;
}
