use std::sync::Arc;

use serde_json::{Map, Value};
use url::Url;

use super::http::{bearer_header, HttpTransport};
use super::multipart::MultipartForm;
use super::DetectionService;
use crate::auth::AuthProvider;
use crate::error::ClientError;
use crate::geometry::{CoordinateConvention, DetectionBox};
use crate::image_source::ImageSource;
use crate::model::{Detection, DetectionResponse};

/// HTTP client for the upload-and-detect endpoint.
pub struct DetectionClient {
    transport: HttpTransport,
    endpoint: Url,
    convention: CoordinateConvention,
    auth: Arc<dyn AuthProvider>,
}

impl DetectionClient {
    pub fn new(
        transport: HttpTransport,
        endpoint: Url,
        convention: CoordinateConvention,
        auth: Arc<dyn AuthProvider>,
    ) -> Self {
        Self {
            transport,
            endpoint,
            convention,
            auth,
        }
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }
}

impl DetectionService for DetectionClient {
    fn detect(
        &self,
        image: &ImageSource,
        location: Option<&str>,
    ) -> Result<DetectionResponse, ClientError> {
        let authorization = bearer_header(self.auth.as_ref())?;

        let mut form = MultipartForm::new().file(
            "image",
            image.file_name(),
            image.content_type(),
            image.bytes(),
        );
        if let Some(location) = location {
            form = form.text("location", location);
        }
        let (content_type, body) = form.finish();

        log::info!(
            "submitting '{}' ({} bytes) for detection",
            image.file_name(),
            body.len()
        );
        let response = self
            .transport
            .agent()
            .post(self.endpoint.as_str())
            .header("Authorization", &authorization)
            .header("Content-Type", &content_type)
            .send(&body[..])
            .map_err(|err| self.transport.transport_error(err))?;

        let body = self.transport.read_reply(response, self.auth.as_ref())?;
        parse_detection_response(&body, self.convention)
    }
}

/// Decodes the detection service's JSON reply.
///
/// `predictions` keeps service order. Boxes are read from a `box` array or
/// from flat `x1`/`y1`/`x2`/`y2` fields and tagged with `convention`; the
/// payload itself never decides the coordinate space. Informational entries
/// (`info`, `warning`) are skipped, and an inline `error` entry fails the
/// whole response with that message.
pub fn parse_detection_response(
    body: &str,
    convention: CoordinateConvention,
) -> Result<DetectionResponse, ClientError> {
    let value: Value =
        serde_json::from_str(body).map_err(|err| ClientError::Parse(err.to_string()))?;

    let image_url = value
        .get("image_url")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Parse("response has no 'image_url'".to_string()))?
        .to_string();

    let predictions: &[Value] = match value.get("predictions") {
        None | Some(Value::Null) => &[],
        Some(Value::Array(items)) => items,
        Some(_) => {
            return Err(ClientError::Parse(
                "'predictions' is not an array".to_string(),
            ))
        }
    };

    let mut detections = Vec::with_capacity(predictions.len());
    for (index, entry) in predictions.iter().enumerate() {
        let fields = entry
            .as_object()
            .ok_or_else(|| ClientError::Parse(format!("prediction {} is not an object", index)))?;

        if let Some(error) = fields.get("error") {
            return Err(ClientError::Service {
                message: error
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_else(|| error.to_string()),
            });
        }

        if !fields.contains_key("label") {
            if let Some(note) = fields.get("info").or_else(|| fields.get("warning")) {
                log::info!("detection service note: {}", note);
            } else {
                log::warn!("skipping prediction {} without a label", index);
            }
            continue;
        }

        detections.push(parse_prediction(index, fields, convention)?);
    }

    Ok(DetectionResponse {
        image_url,
        detections,
    })
}

fn parse_prediction(
    index: usize,
    fields: &Map<String, Value>,
    convention: CoordinateConvention,
) -> Result<Detection, ClientError> {
    let label = fields
        .get("label")
        .and_then(Value::as_str)
        .ok_or_else(|| ClientError::Parse(format!("prediction {} label is not a string", index)))?;

    let raw_score = fields
        .get("score")
        .or_else(|| fields.get("confidence"))
        .ok_or_else(|| ClientError::Parse(format!("prediction {} has no score", index)))?
        .as_f64()
        .ok_or_else(|| ClientError::Parse(format!("prediction {} score is not a number", index)))?;

    let confidence = if (0.0..=1.0).contains(&raw_score) {
        raw_score
    } else {
        log::warn!(
            "prediction {} ('{}') has out-of-range score {}; using 0.0",
            index,
            label,
            raw_score
        );
        0.0
    };

    let corners = read_corners(index, fields)?;

    Ok(Detection::new(
        label,
        confidence,
        corners.map(|corners| DetectionBox::from_corners(convention, corners)),
    ))
}

fn read_corners(index: usize, fields: &Map<String, Value>) -> Result<Option<[f64; 4]>, ClientError> {
    let malformed = || ClientError::Parse(format!("prediction {} has a malformed box", index));

    if let Some(raw) = fields.get("box") {
        let items = raw.as_array().ok_or_else(malformed)?;
        if items.len() != 4 {
            return Err(malformed());
        }
        let mut corners = [0.0; 4];
        for (slot, item) in corners.iter_mut().zip(items) {
            *slot = item.as_f64().ok_or_else(malformed)?;
        }
        return Ok(Some(corners));
    }

    let flat: Vec<Option<&Value>> = ["x1", "y1", "x2", "y2"]
        .iter()
        .map(|key| fields.get(*key))
        .collect();
    if flat.iter().all(Option::is_none) {
        return Ok(None);
    }

    let mut corners = [0.0; 4];
    for (slot, item) in corners.iter_mut().zip(flat) {
        *slot = item.and_then(Value::as_f64).ok_or_else(malformed)?;
    }
    Ok(Some(corners))
}

#[cfg(test)]
mod tests {
    use super::*;

    const NORMALIZED: CoordinateConvention = CoordinateConvention::Normalized;

    #[test]
    fn parses_predictions_in_service_order() {
        let body = r#"{
            "image_url": "/uploads/wallet.jpg",
            "predictions": [
                {"label": "wallet", "score": 0.91, "x1": 0.1, "y1": 0.1, "x2": 0.4, "y2": 0.5},
                {"label": "phone", "score": 0.4, "box": [0.5, 0.5, 0.9, 0.8]},
                {"label": "keys", "score": 0.2}
            ]
        }"#;

        let response = parse_detection_response(body, NORMALIZED).unwrap();

        assert_eq!(response.image_url, "/uploads/wallet.jpg");
        let labels: Vec<&str> = response.detections.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, ["wallet", "phone", "keys"]);
        assert_eq!(
            response.detections[0].bbox.map(|b| b.corners()),
            Some([0.1, 0.1, 0.4, 0.5])
        );
        assert_eq!(
            response.detections[1].bbox.map(|b| b.convention()),
            Some(NORMALIZED)
        );
        assert_eq!(response.detections[2].bbox, None);
    }

    #[test]
    fn convention_comes_from_configuration() {
        let body = r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag", "score": 0.5, "box": [0.1, 0.2, 0.3, 0.4]}]}"#;
        let response = parse_detection_response(body, CoordinateConvention::Pixel).unwrap();
        assert_eq!(
            response.detections[0].bbox.map(|b| b.convention()),
            Some(CoordinateConvention::Pixel)
        );
    }

    #[test]
    fn missing_predictions_means_no_detections() {
        let response = parse_detection_response(r#"{"image_url": "/u/a.jpg"}"#, NORMALIZED).unwrap();
        assert!(response.detections.is_empty());
    }

    #[test]
    fn info_entries_are_skipped() {
        let body = r#"{"image_url": "/u/a.jpg", "predictions": [{"info": "nothing found"}]}"#;
        let response = parse_detection_response(body, NORMALIZED).unwrap();
        assert!(response.detections.is_empty());
    }

    #[test]
    fn inline_error_becomes_service_error() {
        let body = r#"{"image_url": "/u/a.jpg", "predictions": [{"error": "model not loaded"}]}"#;
        assert_eq!(
            parse_detection_response(body, NORMALIZED),
            Err(ClientError::Service {
                message: "model not loaded".to_string()
            })
        );
    }

    #[test]
    fn out_of_range_score_is_clamped_to_zero() {
        let body = r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag", "score": 7.5}]}"#;
        let response = parse_detection_response(body, NORMALIZED).unwrap();
        assert_eq!(response.detections[0].confidence, 0.0);
    }

    #[test]
    fn malformed_bodies_are_parse_errors() {
        for body in [
            "not json",
            r#"{"predictions": []}"#,
            r#"{"image_url": "/u/a.jpg", "predictions": {}}"#,
            r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag"}]}"#,
            r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag", "score": "high"}]}"#,
            r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag", "score": 0.5, "box": [1, 2, 3]}]}"#,
            r#"{"image_url": "/u/a.jpg", "predictions": [{"label": "bag", "score": 0.5, "x1": 1}]}"#,
        ] {
            assert!(
                matches!(parse_detection_response(body, NORMALIZED), Err(ClientError::Parse(_))),
                "expected parse error for {}",
                body
            );
        }
    }
}
