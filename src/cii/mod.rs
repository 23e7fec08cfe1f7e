//! UN/CEFACT Cross Industry Invoice (CII D16B) serialization and parsing.
//!
//! # Example
//!
//! ```
//! use facturx::cii::{self, SchemaProfile};
//!
//! let doc = facturx::sample::en16931_einfach();
//! let xml = cii::serialize(&doc, "FACTUR-X_EN16931".parse::<SchemaProfile>().unwrap()).unwrap();
//! let back = cii::parse(&xml).unwrap();
//! assert_eq!(back.header.id, "471102");
//! ```

mod parse;
mod serialize;
pub(crate) mod xml_utils;

pub use crate::core::SchemaProfile;
pub use parse::{guideline_id, parse};
pub use serialize::{serialize, serialize_unchecked};

/// CII namespace URIs.
pub mod cii_ns {
    pub const RSM: &str = "urn:un:unece:uncefact:data:standard:CrossIndustryInvoice:100";
    pub const RAM: &str =
        "urn:un:unece:uncefact:data:standard:ReusableAggregateBusinessInformationEntity:100";
    pub const QDT: &str = "urn:un:unece:uncefact:data:standard:QualifiedDataType:100";
    pub const UDT: &str = "urn:un:unece:uncefact:data:standard:UnqualifiedDataType:100";
}

/// UNTDID 2379 date format code for `CCYYMMDD`.
pub(crate) const DATE_FORMAT_102: &str = "102";
