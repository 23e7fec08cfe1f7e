//! Builds the "EN16931 Einfach" sample invoice, writes its CII XML to
//! `factur-x.xml` and attaches it to `tests/samples/invoice_pdf17.pdf`,
//! producing `EN16931_Einfach.pdf` in the current directory.
//!
//! ```sh
//! RUST_LOG=facturx=debug cargo run --example en16931_einfach --features all
//! ```

use std::fs;
use std::path::Path;

use facturx::cii::{self, SchemaProfile};
use facturx::pdf;
use facturx::FacturxError;
use tracing::info;
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), FacturxError> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let doc = facturx::sample::en16931_einfach();

    let xml = cii::serialize(&doc, "FACTUR-X_EN16931".parse::<SchemaProfile>()?)?;
    fs::write("factur-x.xml", &xml)?;
    info!(bytes = xml.len(), "wrote factur-x.xml");

    let sample = Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("samples")
        .join("invoice_pdf17.pdf");
    let invoice_pdf = fs::read(&sample)?;
    let new_pdf = pdf::attach_xml(&invoice_pdf, &xml, "EN 16931")?;

    fs::write("EN16931_Einfach.pdf", &new_pdf)?;
    info!(bytes = new_pdf.len(), "wrote EN16931_Einfach.pdf");
    Ok(())
}
