//! The review session: the state machine behind upload → detect → review →
//! save.
//!
//! A session never performs I/O. Operations that need the network return a
//! request ([`DetectRequest`], [`SaveRequest`]) stamped with the session's
//! generation; whoever executes it reports back through the matching
//! `on_*` method with that same generation. Completions for an older
//! generation, or arriving after the session moved on, are dropped. This is
//! what makes "select A, then B before A returns" resolve to B.
//!
//! All methods are expected to run on one control thread.

mod state;
pub mod view;

pub use state::{
    DetectRequest, ErrorInfo, ErrorKind, FailureStage, Phase, ReviewSnapshot, SaveRequest,
};

use crate::error::{ClientError, ReviewError};
use crate::geometry::{to_display, Dimensions, DisplayBox};
use crate::image_source::{ImageSource, PreviewHandle, PreviewRegistry};
use crate::model::{Detection, DetectionResponse, LostItemRecord, RecordId, SaveMetadata};
use crate::selection::{SelectionStore, SubscriptionId};

/// One open detection-review workflow.
pub struct ReviewSession {
    phase: Phase,
    generation: u64,
    registry: PreviewRegistry,
    source: Option<ImageSource>,
    preview: Option<PreviewHandle>,
    location_hint: Option<String>,
    image_ref: Option<String>,
    detections: Vec<Detection>,
    selection: SelectionStore,
    rendered: Option<Dimensions>,
    manual_description: Option<String>,
    error: Option<ErrorInfo>,
    saved_id: Option<RecordId>,
}

impl ReviewSession {
    pub fn new() -> Self {
        Self::with_registry(PreviewRegistry::new())
    }

    /// Creates a session that opens its previews through `registry`.
    pub fn with_registry(registry: PreviewRegistry) -> Self {
        Self {
            phase: Phase::Idle,
            generation: 0,
            registry,
            source: None,
            preview: None,
            location_hint: None,
            image_ref: None,
            detections: Vec::new(),
            selection: SelectionStore::new(),
            rendered: None,
            manual_description: None,
            error: None,
            saved_id: None,
        }
    }

    // -------------------- Image selection & detection --------------------

    /// Starts over with a newly chosen image.
    ///
    /// Allowed in every phase except `Saving`. The generation is bumped
    /// even when `file` is `None` (which returns to `Idle`), so a detection
    /// still in flight for the previous image is discarded when it lands.
    pub fn select_image(
        &mut self,
        file: Option<ImageSource>,
    ) -> Result<Option<DetectRequest>, ReviewError> {
        if self.phase == Phase::Saving {
            return Err(ReviewError::InvalidPhase {
                operation: "select an image",
                phase: self.phase,
            });
        }

        self.generation += 1;
        self.release_image();

        let Some(file) = file else {
            log::info!("image cleared (generation {})", self.generation);
            self.phase = Phase::Idle;
            return Ok(None);
        };

        log::info!(
            "selected '{}' (generation {})",
            file.file_name(),
            self.generation
        );
        self.preview = Some(self.registry.open(&file));
        self.source = Some(file.clone());
        self.phase = Phase::Detecting;
        Ok(Some(self.detect_request(file)))
    }

    /// Applies a detection result. Returns false if it was stale.
    pub fn on_detection_success(&mut self, response: DetectionResponse, generation: u64) -> bool {
        if !self.accepts(generation, Phase::Detecting, "detection result") {
            return false;
        }

        log::info!(
            "{} detection(s) for generation {}",
            response.detections.len(),
            generation
        );
        self.image_ref = Some(response.image_url);
        self.detections = response.detections;
        self.selection.replace(self.detections.len());
        if !self.detections.is_empty() {
            // In range by construction.
            let _ = self.selection.select(0);
        }
        self.phase = Phase::Reviewing;
        true
    }

    /// Records a detection failure. Returns false if it was stale.
    ///
    /// The image and its preview are kept so [`retry`](Self::retry) can
    /// resubmit without a new selection.
    pub fn on_detection_failure(&mut self, err: ClientError, generation: u64) -> bool {
        if !self.accepts(generation, Phase::Detecting, "detection failure") {
            return false;
        }

        log::warn!("detection failed for generation {}: {}", generation, err);
        self.error = Some(ErrorInfo::from_client(&err, FailureStage::Detection));
        self.phase = Phase::Failed;
        true
    }

    /// Resubmits the current image under a fresh generation.
    ///
    /// Only a failed detection can be retried. A failed save keeps the
    /// review results and resumes through [`save`](Self::save).
    pub fn retry(&mut self) -> Result<DetectRequest, ReviewError> {
        if self.phase != Phase::Failed {
            return Err(ReviewError::InvalidPhase {
                operation: "retry",
                phase: self.phase,
            });
        }
        if self.error.as_ref().is_some_and(|info| !info.is_resumable()) {
            return Err(ReviewError::ReauthRequired);
        }
        if self
            .error
            .as_ref()
            .is_some_and(|info| info.stage == FailureStage::Save)
        {
            return Err(ReviewError::InvalidPhase {
                operation: "retry a failed save",
                phase: self.phase,
            });
        }
        let source = self.source.clone().ok_or(ReviewError::InvalidPhase {
            operation: "retry without an image",
            phase: self.phase,
        })?;

        self.generation += 1;
        self.clear_results();
        self.phase = Phase::Detecting;
        log::info!("retrying detection (generation {})", self.generation);
        Ok(self.detect_request(source))
    }

    /// Location forwarded with the next detection request.
    pub fn set_location_hint(&mut self, location: Option<String>) {
        self.location_hint = location.filter(|text| !text.trim().is_empty());
    }

    // -------------------- Review --------------------

    /// Highlights detection `index`, notifying every selection subscriber.
    ///
    /// Only valid while reviewing. An out-of-range index changes nothing.
    pub fn select_object(&mut self, index: usize) -> Result<(), ReviewError> {
        self.require_reviewing("select an object")?;
        self.selection.select(index)
    }

    /// Stores a description typed by the user, independent of any label.
    pub fn set_manual_description(&mut self, text: impl Into<String>) -> Result<(), ReviewError> {
        self.require_reviewing("edit the description")?;
        self.manual_description = Some(text.into());
        Ok(())
    }

    /// Records the rendered size of the current image.
    ///
    /// Returns true if the size changed, meaning display boxes must be
    /// redrawn. Ignored while no image is selected.
    pub fn set_rendered_dimensions(&mut self, dims: Dimensions) -> bool {
        if self.source.is_none() || self.rendered == Some(dims) {
            return false;
        }
        self.rendered = Some(dims);
        true
    }

    /// Display-space box for every detection, in detection order.
    pub fn display_boxes(&self) -> Vec<Option<DisplayBox>> {
        let original = self.source.as_ref().and_then(ImageSource::dimensions);
        self.detections
            .iter()
            .map(|detection| {
                detection
                    .bbox
                    .as_ref()
                    .and_then(|bbox| to_display(bbox, self.rendered, original))
            })
            .collect()
    }

    pub fn subscribe(&mut self, listener: impl FnMut(Option<usize>) + 'static) -> SubscriptionId {
        self.selection.subscribe(listener)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.selection.unsubscribe(id)
    }

    // -------------------- Save --------------------

    /// Validates `metadata` and freezes the record to persist.
    ///
    /// Valid while reviewing, or after a save failed for a reason other than
    /// an expired sign-in. The description is `metadata.description`, else
    /// the manual description, else the selected detection's label. A blank
    /// description or location is reported without leaving the current
    /// phase, and nothing is sent.
    pub fn save(&mut self, metadata: SaveMetadata) -> Result<SaveRequest, ReviewError> {
        let failed_save = match (&self.error, self.phase) {
            (Some(info), Phase::Failed) if info.stage == FailureStage::Save => Some(info),
            _ => None,
        };
        if failed_save.is_some_and(|info| !info.is_resumable()) {
            return Err(ReviewError::ReauthRequired);
        }
        if self.phase != Phase::Reviewing && failed_save.is_none() {
            return Err(ReviewError::InvalidPhase {
                operation: "save",
                phase: self.phase,
            });
        }

        let description = metadata
            .description
            .or_else(|| self.manual_description.clone())
            .or_else(|| {
                self.selection
                    .get()
                    .and_then(|index| self.detections.get(index))
                    .map(|detection| detection.label.clone())
            })
            .unwrap_or_default();
        let description = description.trim();
        if description.is_empty() {
            return Err(self.reject("description"));
        }
        let location = metadata.location.trim();
        if location.is_empty() {
            return Err(self.reject("location"));
        }
        let image_ref = self.image_ref.clone().ok_or(ReviewError::InvalidPhase {
            operation: "save before detection finished",
            phase: self.phase,
        })?;

        let record = LostItemRecord {
            image_ref,
            description: description.to_string(),
            location: location.to_string(),
            detection_snapshot: self.detections.clone(),
            created_by: metadata.user_id,
        };
        self.error = None;
        self.phase = Phase::Saving;
        log::info!("saving record (generation {})", self.generation);
        Ok(SaveRequest {
            generation: self.generation,
            record,
        })
    }

    /// Applies a successful save. Returns false if it was stale.
    pub fn on_save_success(&mut self, id: RecordId, generation: u64) -> bool {
        if !self.accepts(generation, Phase::Saving, "save result") {
            return false;
        }
        log::info!("record saved as {}", id);
        self.saved_id = Some(id);
        self.phase = Phase::Saved;
        true
    }

    /// Records a save failure. Returns false if it was stale.
    ///
    /// An auth failure ends the session's usefulness: neither `retry` nor
    /// `save` is accepted afterwards, only `reset` or a new image.
    pub fn on_save_failure(&mut self, err: ClientError, generation: u64) -> bool {
        if !self.accepts(generation, Phase::Saving, "save failure") {
            return false;
        }
        log::warn!("save failed for generation {}: {}", generation, err);
        self.error = Some(ErrorInfo::from_client(&err, FailureStage::Save));
        self.phase = Phase::Failed;
        true
    }

    /// Returns to a fresh `Idle` session. Calling it twice is the same as
    /// calling it once.
    pub fn reset(&mut self) {
        self.release_image();
        self.location_hint = None;
        self.phase = Phase::Idle;
    }

    // -------------------- Accessors --------------------

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn detections(&self) -> &[Detection] {
        &self.detections
    }

    pub fn selected_index(&self) -> Option<usize> {
        self.selection.get()
    }

    pub fn error(&self) -> Option<&ErrorInfo> {
        self.error.as_ref()
    }

    pub fn image_ref(&self) -> Option<&str> {
        self.image_ref.as_deref()
    }

    pub fn source(&self) -> Option<&ImageSource> {
        self.source.as_ref()
    }

    pub fn preview(&self) -> Option<&PreviewHandle> {
        self.preview.as_ref()
    }

    pub fn preview_registry(&self) -> &PreviewRegistry {
        &self.registry
    }

    pub fn rendered_dimensions(&self) -> Option<Dimensions> {
        self.rendered
    }

    pub fn manual_description(&self) -> Option<&str> {
        self.manual_description.as_deref()
    }

    pub fn saved_id(&self) -> Option<&RecordId> {
        self.saved_id.as_ref()
    }

    /// Captures the current state for presentation.
    pub fn snapshot(&self) -> ReviewSnapshot {
        ReviewSnapshot {
            phase: self.phase,
            generation: self.generation,
            file_name: self.source.as_ref().map(|s| s.file_name().to_string()),
            image_ref: self.image_ref.clone(),
            detections: self.detections.clone(),
            display_boxes: self.display_boxes(),
            selected: self.selection.get(),
            manual_description: self.manual_description.clone(),
            rendered: self.rendered,
            error: self.error.clone(),
            saved_id: self.saved_id.clone(),
        }
    }

    // -------------------- Internals --------------------

    fn detect_request(&self, image: ImageSource) -> DetectRequest {
        DetectRequest {
            generation: self.generation,
            image,
            location: self.location_hint.clone(),
        }
    }

    fn accepts(&self, generation: u64, expected: Phase, what: &str) -> bool {
        if generation != self.generation {
            log::debug!(
                "discarding stale {} for generation {} (current {})",
                what,
                generation,
                self.generation
            );
            return false;
        }
        if self.phase != expected {
            log::debug!(
                "discarding {} for generation {}: session is {}",
                what,
                generation,
                self.phase
            );
            return false;
        }
        true
    }

    fn require_reviewing(&self, operation: &'static str) -> Result<(), ReviewError> {
        if self.phase == Phase::Reviewing {
            Ok(())
        } else {
            Err(ReviewError::InvalidPhase {
                operation,
                phase: self.phase,
            })
        }
    }

    fn reject(&mut self, field: &'static str) -> ReviewError {
        self.error = Some(ErrorInfo::validation(field));
        ReviewError::Validation { field }
    }

    /// Drops everything tied to the current image, revoking its preview.
    fn release_image(&mut self) {
        if let Some(mut preview) = self.preview.take() {
            preview.revoke();
        }
        self.source = None;
        self.rendered = None;
        self.clear_results();
    }

    /// Drops everything a detection produced, keeping the image.
    fn clear_results(&mut self) {
        self.image_ref = None;
        self.detections.clear();
        self.selection.replace(0);
        self.manual_description = None;
        self.error = None;
        self.saved_id = None;
    }
}

impl Default for ReviewSession {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for ReviewSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReviewSession")
            .field("phase", &self.phase)
            .field("generation", &self.generation)
            .field("detections", &self.detections.len())
            .field("selected", &self.selection.get())
            .field("error", &self.error)
            .finish()
    }
}
