//! Read-only projections of a [`ReviewSnapshot`].
//!
//! Every view here is computed from one snapshot, so the overlay, the object
//! list and the detail panel can never disagree about which detection is
//! highlighted.

use std::fmt;

use serde::Serialize;

use super::{Phase, ReviewSnapshot};
use crate::geometry::DisplayBox;

/// Descriptions offered before any detected label.
pub const COMMON_DESCRIPTIONS: &[&str] = &[
    "wallet",
    "phone",
    "keys",
    "earbuds",
    "student ID",
    "umbrella",
    "bag",
    "book",
    "tumbler",
    "glasses",
    "laptop",
    "pencil case",
    "card",
];

/// One box drawn over the image.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OverlayItem {
    pub index: usize,
    pub label: String,
    pub confidence: f64,
    pub display: DisplayBox,
    pub highlighted: bool,
}

/// One row of the object list.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ListItem {
    pub index: usize,
    pub text: String,
    pub selected: bool,
}

/// The detail panel for the highlighted detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DetailView {
    pub label: String,
    pub confidence: String,
}

/// An entry of the description picker.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct DescriptionChoice {
    /// Text stored as the description when picked.
    pub value: String,
    /// Text shown in the picker.
    pub caption: String,
}

/// Boxes to draw. Detections without a mappable, non-degenerate box are
/// left out; they still appear in [`object_list`].
pub fn overlay(snapshot: &ReviewSnapshot) -> Vec<OverlayItem> {
    snapshot
        .detections
        .iter()
        .zip(&snapshot.display_boxes)
        .enumerate()
        .filter_map(|(index, (detection, display))| {
            let display = (*display)?;
            if display.is_degenerate() {
                return None;
            }
            Some(OverlayItem {
                index,
                label: detection.label.clone(),
                confidence: detection.confidence,
                display,
                highlighted: snapshot.selected == Some(index),
            })
        })
        .collect()
}

pub fn object_list(snapshot: &ReviewSnapshot) -> Vec<ListItem> {
    snapshot
        .detections
        .iter()
        .enumerate()
        .map(|(index, detection)| ListItem {
            index,
            text: format!("{} ({:.2})", detection.label, detection.confidence),
            selected: snapshot.selected == Some(index),
        })
        .collect()
}

pub fn detail(snapshot: &ReviewSnapshot) -> Option<DetailView> {
    snapshot.selected_detection().map(|detection| DetailView {
        label: detection.label.clone(),
        confidence: format!("{:.2}", detection.confidence),
    })
}

/// The common descriptions followed by each detected label with its score
/// as a percentage.
pub fn description_choices(snapshot: &ReviewSnapshot) -> Vec<DescriptionChoice> {
    let common = COMMON_DESCRIPTIONS.iter().map(|text| DescriptionChoice {
        value: text.to_string(),
        caption: text.to_string(),
    });
    let detected = snapshot.detections.iter().map(|detection| DescriptionChoice {
        value: detection.label.clone(),
        caption: format!(
            "{} ({:.0}%)",
            detection.label,
            detection.confidence * 100.0
        ),
    });
    common.chain(detected).collect()
}

/// Plain-text rendering of a snapshot for terminals.
pub struct ReviewView<'a>(pub &'a ReviewSnapshot);

impl fmt::Display for ReviewView<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let snapshot = self.0;
        match &snapshot.file_name {
            Some(name) => writeln!(f, "{} [{}]", name, snapshot.phase)?,
            None => writeln!(f, "[{}]", snapshot.phase)?,
        }
        if let Some(error) = &snapshot.error {
            writeln!(f, "  {} error: {}", error.stage, error.message)?;
        }
        if snapshot.phase == Phase::Saved {
            if let Some(id) = &snapshot.saved_id {
                writeln!(f, "  saved as record {}", id)?;
            }
        }
        if snapshot.detections.is_empty() {
            if matches!(snapshot.phase, Phase::Reviewing | Phase::Saving | Phase::Saved) {
                writeln!(f, "  no objects detected")?;
            }
            return Ok(());
        }

        let boxes = &snapshot.display_boxes;
        for item in object_list(snapshot) {
            let marker = if item.selected { '*' } else { ' ' };
            write!(f, " {} {}: {}", marker, item.index, item.text)?;
            match boxes.get(item.index).copied().flatten() {
                Some(display) => writeln!(
                    f,
                    "  at ({:.1}, {:.1}) {:.1}x{:.1}",
                    display.left, display.top, display.width, display.height
                )?,
                None => writeln!(f)?,
            }
        }
        Ok(())
    }
}
