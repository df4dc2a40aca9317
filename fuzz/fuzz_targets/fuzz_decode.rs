#![no_main]

use libfuzzer_sys::fuzz_target;
use ratchet::codec::{decode, encode};

fuzz_target!(|data: &[u8]| {
    let Ok(document) = serde_json::from_slice::<serde_json::Value>(data) else {
        return;
    };
    // Whatever decodes must re-encode or be refused, never panic.
    if let Ok(value) = decode(&document) {
        let _ = encode(&value);
    }
});
