#![no_main]

use libfuzzer_sys::fuzz_target;
use stackprobe_deploy::parse_ps_output;

// JSON array and JSON-lines forms must never panic.
fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_ps_output(text);
    }
});
