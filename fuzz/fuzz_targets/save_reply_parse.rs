//! Fuzz target for the record store's reply decoder.

#![no_main]

use libfuzzer_sys::fuzz_target;
use lostlens::client::parse_save_reply;

fuzz_target!(|data: &[u8]| {
    if let Ok(body) = std::str::from_utf8(data) {
        let _ = parse_save_reply(body);
    }
});
