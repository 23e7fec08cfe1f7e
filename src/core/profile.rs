use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::error::FacturxError;

/// Factur-X / ZUGFeRD conformance profile, selecting which parts of the
/// document are written and which fields are mandatory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaProfile {
    /// Document-level totals only.
    Minimum,
    /// Full header data without line items.
    BasicWl,
    /// Line items, subset of EN 16931.
    Basic,
    /// Full European norm.
    En16931,
    /// Beyond EN 16931.
    Extended,
    /// German public sector CIUS.
    XRechnung,
}

impl SchemaProfile {
    pub const ALL: [SchemaProfile; 6] = [
        Self::Minimum,
        Self::BasicWl,
        Self::Basic,
        Self::En16931,
        Self::Extended,
        Self::XRechnung,
    ];

    /// Schema name as accepted by [`FromStr`] (e.g. `FACTUR-X_EN16931`).
    pub fn name(&self) -> &'static str {
        match self {
            Self::Minimum => "FACTUR-X_MINIMUM",
            Self::BasicWl => "FACTUR-X_BASIC-WL",
            Self::Basic => "FACTUR-X_BASIC",
            Self::En16931 => "FACTUR-X_EN16931",
            Self::Extended => "FACTUR-X_EXTENDED",
            Self::XRechnung => "FACTUR-X_XRECHNUNG",
        }
    }

    /// BT-24 specification identifier written to
    /// `GuidelineSpecifiedDocumentContextParameter`.
    pub fn urn(&self) -> &'static str {
        match self {
            Self::Minimum => "urn:factur-x.eu:1p0:minimum",
            Self::BasicWl => "urn:factur-x.eu:1p0:basicwl",
            Self::Basic => "urn:cen.eu:en16931:2017#compliant#urn:factur-x.eu:1p0:basic",
            Self::En16931 => "urn:cen.eu:en16931:2017",
            Self::Extended => "urn:cen.eu:en16931:2017#conformant#urn:factur-x.eu:1p0:extended",
            Self::XRechnung => {
                "urn:cen.eu:en16931:2017#compliant#urn:xeinkauf.de:kosit:xrechnung_3.0"
            }
        }
    }

    /// Reverse of [`SchemaProfile::urn`].
    pub fn from_urn(urn: &str) -> Option<Self> {
        let urn = urn.trim();
        Self::ALL.into_iter().find(|p| p.urn() == urn)
    }

    /// Whether header parties carry postal addresses, notes and the VAT breakdown.
    pub fn has_header_details(&self) -> bool {
        !matches!(self, Self::Minimum)
    }

    /// Whether line items are part of the profile.
    pub fn has_lines(&self) -> bool {
        !matches!(self, Self::Minimum | Self::BasicWl)
    }

    /// Whether lines carry seller/buyer item ids, descriptions and origin.
    pub fn has_item_details(&self) -> bool {
        !matches!(self, Self::Minimum | Self::BasicWl | Self::Basic)
    }
}

impl fmt::Display for SchemaProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for SchemaProfile {
    type Err = FacturxError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "FACTUR-X_MINIMUM" => Ok(Self::Minimum),
            "FACTUR-X_BASIC-WL" | "FACTUR-X_BASICWL" => Ok(Self::BasicWl),
            "FACTUR-X_BASIC" => Ok(Self::Basic),
            "FACTUR-X_EN16931" => Ok(Self::En16931),
            "FACTUR-X_EXTENDED" => Ok(Self::Extended),
            "FACTUR-X_XRECHNUNG" => Ok(Self::XRechnung),
            other => Err(FacturxError::Profile(format!(
                "unknown schema profile '{other}'"
            ))),
        }
    }
}
