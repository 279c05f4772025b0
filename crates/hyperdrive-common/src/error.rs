//! Property validation errors
//!
//! Validation failures are never retried: they are reported verbatim as
//! the reason of the failed lifecycle request.

use thiserror::Error;

/// Errors raised while decoding or validating resource properties
#[derive(Debug, Error)]
pub enum ValidationError {
    /// The property map does not match the expected shape
    #[error("invalid resource properties")]
    Decode(#[from] serde_json::Error),

    /// A property failed a declarative validation rule
    #[error("invalid resource properties")]
    Invalid(#[from] garde::Report),

    /// Sequence names are suffixes of a parameter path
    #[error("name {0} must start with an /")]
    SequenceName(String),

    /// Initial values must be unsigned 64 bit integers
    #[error("InitialValue must be a uint64: {0}")]
    InitialValue(String),

    /// Retention periods must be integers
    #[error("could not parse retention in days {value} for group {group}")]
    RetentionInDays { value: String, group: String },

    /// The request type is none of Create, Update or Delete
    #[error("unknown request type {0}")]
    UnknownRequestType(String),

    /// The physical id does not have the shape this resource produces
    #[error("malformed physical resource id {0}")]
    PhysicalId(String),

    /// An immutable property was changed in place
    #[error("{0}")]
    Immutable(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        assert_eq!(
            ValidationError::SequenceName("counter".to_string()).to_string(),
            "name counter must start with an /"
        );
        assert_eq!(
            ValidationError::InitialValue("abc".to_string()).to_string(),
            "InitialValue must be a uint64: abc"
        );
        assert_eq!(
            ValidationError::UnknownRequestType("Replace".to_string()).to_string(),
            "unknown request type Replace"
        );
    }

    #[test]
    fn test_decode_error() {
        let source = serde_json::from_str::<u32>("\"x\"").unwrap_err();
        let err = ValidationError::from(source);
        assert!(err.to_string().starts_with("invalid resource properties"));
    }
}
