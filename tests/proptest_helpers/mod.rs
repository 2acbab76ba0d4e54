#![allow(dead_code)]

use lostlens::geometry::{CoordinateConvention, DetectionBox, Dimensions};
use lostlens::model::Detection;
use proptest::prelude::*;
use proptest::strategy::BoxedStrategy;
use proptest::test_runner::{Config as ProptestConfig, FileFailurePersistence};

pub const EPS_DISPLAY: f64 = 1e-9;

pub fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|v| v.parse::<u32>().ok())
        .unwrap_or(64);

    let mut config = ProptestConfig::with_failure_persistence(FileFailurePersistence::WithSource(
        "proptest-regressions",
    ));
    config.cases = cases;
    config.max_shrink_iters = 1024;
    config
}

/// Relative tolerance scaled to the magnitude being compared.
pub fn approx(left: f64, right: f64) -> bool {
    (left - right).abs() <= EPS_DISPLAY * left.abs().max(right.abs()).max(1.0)
}

/// A rendered or original image size between 1 and 8192 pixels per side.
pub fn arb_dimensions() -> BoxedStrategy<Dimensions> {
    (1u32..=8192, 1u32..=8192)
        .prop_map(|(w, h)| Dimensions::new(w as f64, h as f64))
        .boxed()
}

/// Ordered normalized corners in `[0, 1]`.
pub fn arb_normalized_corners() -> BoxedStrategy<[f64; 4]> {
    (0u16..=1000, 0u16..=1000, 0u16..=1000, 0u16..=1000)
        .prop_map(|(a, b, c, d)| {
            let (x1, x2) = (a.min(c) as f64 / 1000.0, a.max(c) as f64 / 1000.0);
            let (y1, y2) = (b.min(d) as f64 / 1000.0, b.max(d) as f64 / 1000.0);
            [x1, y1, x2, y2]
        })
        .boxed()
}

/// Ordered pixel corners inside an image of `original` size.
pub fn arb_pixel_corners_within(original: Dimensions) -> BoxedStrategy<[f64; 4]> {
    arb_normalized_corners()
        .prop_map(move |[x1, y1, x2, y2]| {
            [
                (x1 * original.width).round(),
                (y1 * original.height).round(),
                (x2 * original.width).round(),
                (y2 * original.height).round(),
            ]
        })
        .boxed()
}

/// A detection list as the service would return it.
pub fn arb_detections(max: usize) -> BoxedStrategy<Vec<Detection>> {
    proptest::collection::vec(
        (label_strategy(), 0u16..=1000, arb_normalized_corners()),
        0..=max,
    )
    .prop_map(|rows| {
        rows.into_iter()
            .map(|(label, score, corners)| {
                Detection::new(
                    label,
                    score as f64 / 1000.0,
                    Some(DetectionBox::from_corners(
                        CoordinateConvention::Normalized,
                        corners,
                    )),
                )
            })
            .collect()
    })
    .boxed()
}

fn label_strategy() -> BoxedStrategy<String> {
    proptest::string::string_regex("[a-z]{1,12}")
        .expect("valid label regex")
        .boxed()
}
