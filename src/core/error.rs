use thiserror::Error;

/// Errors that can occur while building, serializing or embedding an invoice.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum FacturxError {
    /// One or more validation rules failed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Builder encountered invalid or missing configuration.
    #[error("builder error: {0}")]
    Builder(String),

    /// Unknown profile name, conformance level, or a document whose
    /// guideline does not match the requested profile.
    #[error("profile error: {0}")]
    Profile(String),

    /// XML generation or parsing error.
    #[error("XML error: {0}")]
    Xml(String),

    /// PDF loading, editing or saving error.
    #[error("PDF error: {0}")]
    Pdf(String),

    /// File system error.
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl FacturxError {
    /// Fold a list of findings into a single [`FacturxError::Validation`].
    pub fn from_findings(findings: &[ValidationError]) -> Self {
        let msg = findings
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ");
        Self::Validation(msg)
    }
}

/// A single validation error with field path and message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    /// Dot-separated path to the invalid field (e.g. "trade.agreement.seller.name").
    pub field: String,
    /// Human-readable error description.
    pub message: String,
    /// EN 16931 business rule ID if applicable (e.g. "BR-02").
    pub rule: Option<String>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(rule) = &self.rule {
            write!(f, "[{}] {}: {}", rule, self.field, self.message)
        } else {
            write!(f, "{}: {}", self.field, self.message)
        }
    }
}

impl ValidationError {
    /// Create a validation error without a rule ID.
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: None,
        }
    }

    /// Create a validation error with an EN 16931 rule ID.
    pub fn with_rule(
        field: impl Into<String>,
        message: impl Into<String>,
        rule: impl Into<String>,
    ) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
            rule: Some(rule.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_with_and_without_rule() {
        let e = ValidationError::with_rule("header.id", "must not be empty", "BR-02");
        assert_eq!(e.to_string(), "[BR-02] header.id: must not be empty");

        let e = ValidationError::new("trade.items", "duplicate line id '1'");
        assert_eq!(e.to_string(), "trade.items: duplicate line id '1'");
    }

    #[test]
    fn findings_are_joined() {
        let err = FacturxError::from_findings(&[
            ValidationError::with_rule("a", "x", "BR-01"),
            ValidationError::new("b", "y"),
        ]);
        assert_eq!(err.to_string(), "validation failed: [BR-01] a: x; b: y");
    }
}
