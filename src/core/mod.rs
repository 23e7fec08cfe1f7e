//! Core document model, builders, validation, and totals.
//!
//! The types mirror the EN 16931 semantic model in the nesting the CII
//! syntax uses: context, header, and a trade transaction made of line
//! items, agreement, delivery and settlement.

mod builder;
pub mod codes;
mod error;
mod profile;
mod types;
mod validation;

pub use builder::*;
pub use error::*;
pub use profile::SchemaProfile;
pub use types::*;
pub use validation::*;
