use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::http::{bearer_header, HttpTransport};
use super::PersistenceService;
use crate::auth::AuthProvider;
use crate::error::ClientError;
use crate::model::{LostItemRecord, RecordId};

/// HTTP client for the record store.
pub struct PersistenceClient {
    transport: HttpTransport,
    endpoint: Url,
    auth: Arc<dyn AuthProvider>,
}

impl PersistenceClient {
    pub fn new(transport: HttpTransport, endpoint: Url, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            transport,
            endpoint,
            auth,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl PersistenceService for PersistenceClient {
    fn save(&self, record: &LostItemRecord) -> Result<RecordId, ClientError> {
        let authorization = bearer_header(self.auth.as_ref())?;

        log::info!(
            "saving record for {} with {} detection(s)",
            record.image_ref,
            record.detection_snapshot.len()
        );
        let response = self
            .transport
            .agent()
            .post(self.endpoint.as_str())
            .header("Authorization", &authorization)
            .send_json(encode_save_body(record))
            .map_err(|err| self.transport.transport_error(err))?;

        let body = self.transport.read_reply(response, self.auth.as_ref())?;
        parse_save_reply(&body)
    }
}

/// JSON body of the save call.
#[derive(Debug, Serialize)]
pub struct SaveBody<'a> {
    pub image_url: &'a str,
    pub description: &'a str,
    pub location: &'a str,
    pub detection_results: Vec<DetectionResult<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<i64>,
}

/// The `{label, score}` pair stored with a record.
#[derive(Debug, Serialize)]
pub struct DetectionResult<'a> {
    pub label: &'a str,
    pub score: f64,
}

/// Builds the wire body for `record`. Boxes are not persisted.
pub fn encode_save_body(record: &LostItemRecord) -> SaveBody<'_> {
    SaveBody {
        image_url: &record.image_ref,
        description: &record.description,
        location: &record.location,
        detection_results: record
            .detection_snapshot
            .iter()
            .map(|detection| DetectionResult {
                label: &detection.label,
                score: detection.confidence,
            })
            .collect(),
        user_id: record.created_by,
    }
}

/// Extracts the new record's id from a success reply.
///
/// The store answers `{"message": ..., "item_id": 7}`; the id may also come
/// back as a string or under `id`.
pub fn parse_save_reply(body: &str) -> Result<RecordId, ClientError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| ClientError::Parse(err.to_string()))?;

    match value.get("item_id").or_else(|| value.get("id")) {
        Some(Value::Number(id)) => Ok(RecordId(id.to_string())),
        Some(Value::String(id)) if !id.is_empty() => Ok(RecordId(id.clone())),
        _ => Err(ClientError::Parse(
            "save reply has no record id".to_string(),
        )),
    }
}
