//! Factur-X PDF/A-3 attachment and extraction.
//!
//! Attaches CII XML to an existing PDF as an associated file and writes the
//! XMP metadata that identifies the document as Factur-X.
//!
//! # Levels
//!
//! | Level | Label | AFRelationship |
//! |-------|-------|----------------|
//! | Minimum | `MINIMUM` | Data |
//! | BasicWl | `BASIC WL` | Data |
//! | Basic | `BASIC` | Alternative |
//! | En16931 | `EN 16931` | Alternative |
//! | Extended | `EXTENDED` | Alternative |
//! | XRechnung | `XRECHNUNG` | Alternative |

mod attach;
mod extract;
mod level;
mod xmp;

pub use attach::{AttachOptions, attach_xml, attach_xml_with};
pub use extract::{FacturxAttachment, extract_xml, inspect};
pub use level::FacturxLevel;

/// Attachment filename for every level except XRechnung.
pub const FACTURX_FILENAME: &str = "factur-x.xml";

/// Attachment filename for the XRechnung level.
pub const XRECHNUNG_FILENAME: &str = "xrechnung.xml";

/// Names under which Factur-X, ZUGFeRD and XRechnung invoices are embedded.
const INVOICE_FILENAMES: [&str; 3] = [FACTURX_FILENAME, XRECHNUNG_FILENAME, "zugferd-invoice.xml"];

/// Loose match used when looking for an invoice to extract.
pub(crate) fn is_facturx_filename(name: &str) -> bool {
    let lower = name.to_lowercase();
    lower.contains("factur-x") || lower.contains("zugferd") || lower == XRECHNUNG_FILENAME
}

/// Exact match used when deciding which attachments a new invoice replaces.
pub(crate) fn is_invoice_filename(name: &str) -> bool {
    INVOICE_FILENAMES
        .iter()
        .any(|known| name.eq_ignore_ascii_case(known))
}
