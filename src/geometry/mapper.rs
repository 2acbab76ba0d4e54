//! Mapping from detection space into display space.

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use super::bbox::BBoxXYXY;
use super::space::{CoordinateConvention, Normalized, Pixel};

/// Width and height of an image, either as decoded or as rendered.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Dimensions {
    pub width: f64,
    pub height: f64,
}

impl Dimensions {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True when either side is zero, negative or not finite. Such a size
    /// cannot be used as a scaling denominator.
    pub fn is_empty(&self) -> bool {
        !(self.width.is_finite() && self.height.is_finite())
            || self.width <= 0.0
            || self.height <= 0.0
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for Dimensions {
    type Err = String;

    /// Parses `WIDTHxHEIGHT`, e.g. `640x480`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("expected WIDTHxHEIGHT, got '{}'", s))?;
        let width: f64 = w
            .trim()
            .parse()
            .map_err(|_| format!("invalid width '{}'", w))?;
        let height: f64 = h
            .trim()
            .parse()
            .map_err(|_| format!("invalid height '{}'", h))?;
        let dims = Dimensions::new(width, height);
        if dims.is_empty() {
            return Err(format!("dimensions must be positive, got '{}'", s));
        }
        Ok(dims)
    }
}

/// A box positioned in rendered pixel units, ready for an overlay.
///
/// Derived data: recomputed whenever the rendered size changes and never
/// persisted.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct DisplayBox {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl DisplayBox {
    /// True when the box has no visible area (zero or negative extent).
    pub fn is_degenerate(&self) -> bool {
        !(self.width > 0.0 && self.height > 0.0)
    }
}

/// A detection box tagged with the coordinate space it was decoded in.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
#[serde(tag = "convention", rename_all = "lowercase")]
pub enum DetectionBox {
    Normalized(BBoxXYXY<Normalized>),
    Pixel(BBoxXYXY<Pixel>),
}

impl DetectionBox {
    /// Wraps raw corner values in the variant selected by `convention`.
    pub fn from_corners(convention: CoordinateConvention, corners: [f64; 4]) -> Self {
        match convention {
            CoordinateConvention::Normalized => {
                DetectionBox::Normalized(BBoxXYXY::from_array(corners))
            }
            CoordinateConvention::Pixel => DetectionBox::Pixel(BBoxXYXY::from_array(corners)),
        }
    }

    pub fn convention(&self) -> CoordinateConvention {
        match self {
            DetectionBox::Normalized(_) => CoordinateConvention::Normalized,
            DetectionBox::Pixel(_) => CoordinateConvention::Pixel,
        }
    }

    pub fn corners(&self) -> [f64; 4] {
        match self {
            DetectionBox::Normalized(b) => [b.x1, b.y1, b.x2, b.y2],
            DetectionBox::Pixel(b) => [b.x1, b.y1, b.x2, b.y2],
        }
    }
}

/// Maps a detection box into the display space of the rendered image.
///
/// Returns `None` while the rendered size is unknown; callers defer the
/// overlay until a measurement arrives. Pixel boxes additionally need the
/// original image size, and yield `None` without a usable one. The x and y
/// axes scale independently, so a stretched rendering maps correctly.
///
/// Inverted boxes are passed through with negative extent rather than
/// rejected.
pub fn to_display(
    bbox: &DetectionBox,
    rendered: Option<Dimensions>,
    original: Option<Dimensions>,
) -> Option<DisplayBox> {
    let rendered = rendered?;

    let (left, top, width, height) = match bbox {
        DetectionBox::Normalized(b) => b.scaled_ltwh(rendered.width, rendered.height),
        DetectionBox::Pixel(b) => {
            let original = original.filter(|dims| !dims.is_empty())?;
            let scale_x = rendered.width / original.width;
            let scale_y = rendered.height / original.height;
            b.scaled_ltwh(scale_x, scale_y)
        }
    };

    Some(DisplayBox {
        left,
        top,
        width,
        height,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn normalized_wallet_scenario() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Normalized, [0.1, 0.1, 0.4, 0.5]);
        let display = to_display(&bbox, Some(Dimensions::new(400.0, 300.0)), None).unwrap();
        assert!(close(display.left, 40.0));
        assert!(close(display.top, 30.0));
        assert!(close(display.width, 120.0));
        assert!(close(display.height, 120.0));
    }

    #[test]
    fn unknown_rendered_size_defers() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Normalized, [0.0, 0.0, 1.0, 1.0]);
        assert_eq!(to_display(&bbox, None, None), None);
    }

    #[test]
    fn pixel_scales_axes_independently() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Pixel, [100.0, 50.0, 300.0, 250.0]);
        let display = to_display(
            &bbox,
            Some(Dimensions::new(320.0, 120.0)),
            Some(Dimensions::new(640.0, 480.0)),
        )
        .unwrap();
        // x scale 0.5, y scale 0.25
        assert!(close(display.left, 50.0));
        assert!(close(display.top, 12.5));
        assert!(close(display.width, 100.0));
        assert!(close(display.height, 50.0));
    }

    #[test]
    fn pixel_without_original_size_is_unmapped() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Pixel, [1.0, 1.0, 2.0, 2.0]);
        let rendered = Some(Dimensions::new(100.0, 100.0));
        assert_eq!(to_display(&bbox, rendered, None), None);
        assert_eq!(
            to_display(&bbox, rendered, Some(Dimensions::new(0.0, 480.0))),
            None
        );
    }

    #[test]
    fn degenerate_box_is_passed_through() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Normalized, [0.5, 0.5, 0.25, 0.5]);
        let display = to_display(&bbox, Some(Dimensions::new(100.0, 100.0)), None).unwrap();
        assert!(close(display.width, -25.0));
        assert!(close(display.height, 0.0));
        assert!(display.is_degenerate());
    }

    #[test]
    fn parses_dimension_strings() {
        assert_eq!(
            "640x480".parse::<Dimensions>(),
            Ok(Dimensions::new(640.0, 480.0))
        );
        assert_eq!(
            " 12.5 X 7 ".parse::<Dimensions>(),
            Ok(Dimensions::new(12.5, 7.0))
        );
        assert!("640".parse::<Dimensions>().is_err());
        assert!("0x480".parse::<Dimensions>().is_err());
    }

    #[test]
    fn detection_box_serializes_with_convention_tag() {
        let bbox = DetectionBox::from_corners(CoordinateConvention::Pixel, [1.0, 2.0, 3.0, 4.0]);
        let value = serde_json::to_value(bbox).unwrap();
        assert_eq!(value["convention"], "pixel");
        assert_eq!(value["x2"], 3.0);
    }
}
