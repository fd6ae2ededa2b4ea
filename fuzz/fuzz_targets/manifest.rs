#![no_main]

use libfuzzer_sys::fuzz_target;
use stackprobe_deploy::validate_manifest;

fuzz_target!(|data: &[u8]| {
    let Ok(text) = std::str::from_utf8(data) else {
        return;
    };
    let sections = ["services".to_owned(), "volumes".to_owned(), "networks".to_owned()];
    let services = ["synapse".to_owned(), "postgres".to_owned()];
    let _ = validate_manifest(text, &sections, &services);
});
