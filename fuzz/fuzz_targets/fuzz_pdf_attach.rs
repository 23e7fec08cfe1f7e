#![no_main]

use libfuzzer_sys::fuzz_target;

const INVOICE_PDF: &[u8] = include_bytes!("../../tests/samples/invoice_pdf17.pdf");

fuzz_target!(|data: &[u8]| {
    if let Ok(pdf) = facturx::pdf::attach_xml(INVOICE_PDF, data, "EN 16931") {
        assert_eq!(facturx::pdf::extract_xml(&pdf).ok().as_deref(), Some(data));
    }
});
