//! Axis-aligned boxes in corner (x1, y1, x2, y2) form.

use std::marker::PhantomData;

use serde::Serialize;

/// An axis-aligned bounding box given by its top-left and bottom-right
/// corners.
///
/// The `TSpace` parameter is [`Pixel`](super::Pixel) or
/// [`Normalized`](super::Normalized). Ordering of the corners is not
/// enforced: a box with `x2 < x1` is representable so that the mapping
/// layer can pass it through and the overlay can decide to skip it.
#[derive(Clone, Copy, PartialEq)]
pub struct BBoxXYXY<TSpace> {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    _space: PhantomData<TSpace>,
}

impl<TSpace> BBoxXYXY<TSpace> {
    #[inline]
    pub fn from_xyxy(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            _space: PhantomData,
        }
    }

    /// Builds a box from a `[x1, y1, x2, y2]` array, the shape the
    /// detection service uses for its `box` field.
    #[inline]
    pub fn from_array(corners: [f64; 4]) -> Self {
        Self::from_xyxy(corners[0], corners[1], corners[2], corners[3])
    }

    /// Width of the box. Negative when `x2 < x1`.
    #[inline]
    pub fn width(&self) -> f64 {
        self.x2 - self.x1
    }

    /// Height of the box. Negative when `y2 < y1`.
    #[inline]
    pub fn height(&self) -> f64 {
        self.y2 - self.y1
    }

    /// Scales each axis independently, returning `(left, top, width, height)`.
    #[inline]
    pub(crate) fn scaled_ltwh(&self, scale_x: f64, scale_y: f64) -> (f64, f64, f64, f64) {
        (
            self.x1 * scale_x,
            self.y1 * scale_y,
            self.width() * scale_x,
            self.height() * scale_y,
        )
    }
}

impl<TSpace> std::fmt::Debug for BBoxXYXY<TSpace> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BBoxXYXY")
            .field("x1", &self.x1)
            .field("y1", &self.y1)
            .field("x2", &self.x2)
            .field("y2", &self.y2)
            .finish()
    }
}

// Custom serde implementation to avoid a TSpace: Serialize bound
impl<TSpace> Serialize for BBoxXYXY<TSpace> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut state = serializer.serialize_struct("BBoxXYXY", 4)?;
        state.serialize_field("x1", &self.x1)?;
        state.serialize_field("y1", &self.y1)?;
        state.serialize_field("x2", &self.x2)?;
        state.serialize_field("y2", &self.y2)?;
        state.end()
    }
}
