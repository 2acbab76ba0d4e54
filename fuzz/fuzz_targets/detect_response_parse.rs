//! Fuzz target for detection response parsing.
//!
//! Feeds arbitrary bytes to the detection reply decoder under both
//! coordinate conventions, checking for panics, crashes, or hangs.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lostlens::client::parse_detection_response;
use lostlens::geometry::CoordinateConvention;

fuzz_target!(|data: &[u8]| {
    if data.len() > 10 * 1024 * 1024 {
        return;
    }
    let Ok(body) = std::str::from_utf8(data) else {
        return;
    };

    let _ = parse_detection_response(body, CoordinateConvention::Normalized);
    let _ = parse_detection_response(body, CoordinateConvention::Pixel);
});
