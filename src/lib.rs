//! # facturx
//!
//! Hybrid PDF/XML invoices in the Factur-X / ZUGFeRD format:
//! an EN 16931 document model, CII XML serialization per conformance
//! profile, and PDF/A-3 embedding of the XML into an existing PDF.
//!
//! All monetary values use [`rust_decimal::Decimal`] and keep the scale
//! they were given.
//!
//! ## Quick Start
//!
//! ```rust
//! # #[cfg(feature = "xml")] {
//! use facturx::cii::{self, SchemaProfile};
//! use facturx::core::*;
//! use chrono::NaiveDate;
//! use rust_decimal_macros::dec;
//!
//! let doc = DocumentBuilder::new("RE-2024-001", NaiveDate::from_ymd_opt(2024, 6, 15).unwrap())
//!     .seller(TradePartyBuilder::new("ACME GmbH", PostalAddressBuilder::new("DE").city("Berlin").postcode("10115").build())
//!         .tax_registration(TaxScheme::Vat, "DE123456789")
//!         .build())
//!     .buyer(TradePartyBuilder::new("Kunde AG", PostalAddressBuilder::new("DE").city("München").build()).build())
//!     .add_item(LineItemBuilder::new("1", "Beratung", dec!(10), "HUR", dec!(150))
//!         .tax(TaxCategory::StandardRate, dec!(19))
//!         .build())
//!     .build()
//!     .unwrap();
//!
//! assert_eq!(doc.trade.settlement.monetary_summation.grand_total, dec!(1785.00));
//! let xml = cii::serialize(&doc, SchemaProfile::En16931).unwrap();
//! assert!(String::from_utf8(xml).unwrap().contains("urn:cen.eu:en16931:2017"));
//! # }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `core` (default) | Document model, builders, validation, totals |
//! | `xml` | CII XML serialization & parsing |
//! | `pdf` | Factur-X PDF/A-3 attach & extract |
//! | `all` | Everything |

#[cfg(feature = "core")]
pub mod core;

#[cfg(feature = "core")]
pub mod sample;

#[cfg(feature = "xml")]
pub mod cii;

#[cfg(feature = "pdf")]
pub mod pdf;

// Re-export core types at crate root for convenience
#[cfg(feature = "core")]
pub use crate::core::*;
