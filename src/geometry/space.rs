//! Coordinate space markers and the deployment-time convention switch.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Marker type for boxes in original-image pixel units.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Pixel {}

/// Marker type for boxes expressed as fractions (0.0 to 1.0) of the image.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub enum Normalized {}

impl fmt::Debug for Pixel {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

impl fmt::Debug for Normalized {
    fn fmt(&self, _: &mut fmt::Formatter<'_>) -> fmt::Result {
        match *self {}
    }
}

/// The coordinate system the detection service uses for its boxes.
///
/// Payloads are not self-describing, so this is configured once per
/// deployment and never guessed from the numbers in a response.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CoordinateConvention {
    Normalized,
    Pixel,
}

impl CoordinateConvention {
    pub fn as_str(self) -> &'static str {
        match self {
            CoordinateConvention::Normalized => "normalized",
            CoordinateConvention::Pixel => "pixel",
        }
    }
}

impl fmt::Display for CoordinateConvention {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CoordinateConvention {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normalized" | "normalised" | "ratio" => Ok(CoordinateConvention::Normalized),
            "pixel" | "pixels" | "px" => Ok(CoordinateConvention::Pixel),
            other => Err(format!(
                "unknown coordinate convention '{}' (expected 'normalized' or 'pixel')",
                other
            )),
        }
    }
}
