//! Store error types.

use thiserror::Error;

/// Errors raised synchronously by the store's write and projection paths.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A write produced a snapshot whose field set differs from the one
    /// registered at construction.
    #[error(
        "State shape changed: unexpected fields [{}], missing fields [{}]",
        .unexpected.join(", "),
        .missing.join(", ")
    )]
    ShapeViolation {
        unexpected: Vec<String>,
        missing: Vec<String>,
    },

    /// A field name that is not part of the state was requested.
    #[error("Field '{0}' is not defined in the state")]
    UnknownField(String),

    /// The state did not serialize to a record (JSON object).
    #[error("State must serialize to a record, found {0}")]
    NotARecord(&'static str),

    #[error("State serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StoreError {
    /// Every field named by a shape violation, unexpected first.
    pub fn offending_fields(&self) -> Vec<&str> {
        match self {
            Self::ShapeViolation {
                unexpected,
                missing,
            } => unexpected
                .iter()
                .chain(missing.iter())
                .map(String::as_str)
                .collect(),
            _ => Vec::new(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shape_violation_names_every_field() {
        let error = StoreError::ShapeViolation {
            unexpected: vec!["intruderKey".to_string(), "anotherOne".to_string()],
            missing: vec!["age".to_string()],
        };

        let message = error.to_string();
        assert!(message.contains("intruderKey"));
        assert!(message.contains("anotherOne"));
        assert!(message.contains("age"));
        assert_eq!(
            error.offending_fields(),
            vec!["intruderKey", "anotherOne", "age"]
        );
    }

    #[test]
    fn other_errors_name_no_fields() {
        let error = StoreError::UnknownField("nope".to_string());
        assert!(error.offending_fields().is_empty());
        assert_eq!(error.to_string(), "Field 'nope' is not defined in the state");
    }
}
