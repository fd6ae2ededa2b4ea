#![no_main]

use libfuzzer_sys::fuzz_target;
use stackprobe_suite_runner::{parse_summary, parse_summary_line};

fuzz_target!(|data: &[u8]| {
    if let Ok(text) = std::str::from_utf8(data) {
        let _ = parse_summary_line(text);
        let _ = parse_summary(text);
    }
});
