#![no_main]

use libfuzzer_sys::fuzz_target;
use stackprobe_suite_runner::StructuredReport;

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = StructuredReport::from_json(text);
    }
});
