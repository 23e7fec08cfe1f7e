use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::{FACTURX_FILENAME, XRECHNUNG_FILENAME};
use crate::core::{FacturxError, SchemaProfile};

/// Factur-X conformance level as written to the XMP `fx:ConformanceLevel`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FacturxLevel {
    Minimum,
    BasicWl,
    Basic,
    En16931,
    Extended,
    XRechnung,
}

impl FacturxLevel {
    /// The XMP label (e.g. `EN 16931`).
    pub fn label(&self) -> &'static str {
        match self {
            Self::Minimum => "MINIMUM",
            Self::BasicWl => "BASIC WL",
            Self::Basic => "BASIC",
            Self::En16931 => "EN 16931",
            Self::Extended => "EXTENDED",
            Self::XRechnung => "XRECHNUNG",
        }
    }

    /// The AFRelationship value for the PDF FileSpec.
    pub fn af_relationship(&self) -> &'static str {
        match self {
            Self::Minimum | Self::BasicWl => "Data",
            _ => "Alternative",
        }
    }

    /// Name of the embedded XML file.
    pub fn filename(&self) -> &'static str {
        match self {
            Self::XRechnung => XRECHNUNG_FILENAME,
            _ => FACTURX_FILENAME,
        }
    }

    /// Level matching a BT-24 guideline identifier.
    pub fn from_urn(urn: &str) -> Option<Self> {
        SchemaProfile::from_urn(urn).map(Self::from)
    }
}

impl From<SchemaProfile> for FacturxLevel {
    fn from(profile: SchemaProfile) -> Self {
        match profile {
            SchemaProfile::Minimum => Self::Minimum,
            SchemaProfile::BasicWl => Self::BasicWl,
            SchemaProfile::Basic => Self::Basic,
            SchemaProfile::En16931 => Self::En16931,
            SchemaProfile::Extended => Self::Extended,
            SchemaProfile::XRechnung => Self::XRechnung,
        }
    }
}

impl fmt::Display for FacturxLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for FacturxLevel {
    type Err = FacturxError;

    /// Case-insensitive; spaces, `-` and `_` are ignored (`en16931`, `Basic-WL`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key: String = s
            .chars()
            .filter(|c| !matches!(c, ' ' | '-' | '_'))
            .collect::<String>()
            .to_ascii_uppercase();
        match key.as_str() {
            "MINIMUM" => Ok(Self::Minimum),
            "BASICWL" => Ok(Self::BasicWl),
            "BASIC" => Ok(Self::Basic),
            "EN16931" => Ok(Self::En16931),
            "EXTENDED" => Ok(Self::Extended),
            "XRECHNUNG" => Ok(Self::XRechnung),
            _ => Err(FacturxError::Profile(format!(
                "unknown Factur-X level '{s}'"
            ))),
        }
    }
}
