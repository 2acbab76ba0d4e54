//! Detection-space geometry and the mapping into display space.
//!
//! Boxes returned by the detection service live in one of two coordinate
//! spaces, chosen at deployment time (see [`CoordinateConvention`]). The
//! space is carried in the type of [`BBoxXYXY`] so that normalized and pixel
//! values cannot be mixed, and [`DetectionBox`] is the runtime tag used once
//! a payload has been decoded.
//!
//! [`to_display`] turns a detection box into a [`DisplayBox`] for the image
//! as it is currently rendered.

mod bbox;
mod mapper;
mod space;

pub use bbox::BBoxXYXY;
pub use mapper::{to_display, DetectionBox, Dimensions, DisplayBox};
pub use space::{CoordinateConvention, Normalized, Pixel};
