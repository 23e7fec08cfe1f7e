#![no_main]

use facturx::cii::{self, SchemaProfile};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(doc) = cii::parse(data) else {
        return;
    };
    let profile = SchemaProfile::from_urn(&doc.context.guideline_id).unwrap_or(SchemaProfile::En16931);
    if let Ok(xml) = cii::serialize_unchecked(&doc, profile) {
        // Parse, serialize, parse must not panic at any step.
        let _ = cii::parse(&xml);
    }
});
