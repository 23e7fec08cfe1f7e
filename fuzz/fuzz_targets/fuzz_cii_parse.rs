#![no_main]

use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Errors are fine, panics are bugs.
    let _ = facturx::cii::parse(data);
    let _ = facturx::cii::guideline_id(data);
});
