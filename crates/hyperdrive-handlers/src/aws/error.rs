//! AWS error classification
//!
//! Provides typed errors for AWS SDK operations using the `.code()` method
//! instead of string matching on the Debug format.

use aws_sdk_ssm::error::ProvideErrorMetadata;
use thiserror::Error;

/// AWS error categories the handlers care about
#[derive(Debug, Clone, Error)]
pub enum AwsError {
    /// The addressed resource does not exist
    #[error("Resource not found: {message}")]
    NotFound { message: String },

    /// A create call collided with an existing resource
    #[error("Resource already exists: {message}")]
    AlreadyExists { message: String },

    /// Rate limit exceeded (retryable inside bounded loops)
    #[error("Rate limit exceeded")]
    Throttled,

    /// Generic AWS SDK error with code and message
    #[error("AWS error: {message}")]
    Sdk {
        code: Option<String>,
        message: String,
    },
}

impl AwsError {
    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        matches!(self, AwsError::NotFound { .. })
    }

    /// Check if this is an "already exists" error
    pub fn is_already_exists(&self) -> bool {
        matches!(self, AwsError::AlreadyExists { .. })
    }

    /// Check if a bounded retry loop may try again
    pub fn is_retryable(&self) -> bool {
        matches!(self, AwsError::Throttled)
    }
}

/// Known AWS error codes for "not found" conditions
const NOT_FOUND_CODES: &[&str] = &[
    "ParameterNotFound",
    "ParameterVersionNotFound",
    "ResourceNotFoundException",
    "NoSuchBucket",
    "NoSuchKey",
    "RepositoryNotFoundException",
    "ValidationError",
];

/// Known AWS error codes for "already exists" conditions
const ALREADY_EXISTS_CODES: &[&str] = &[
    "ParameterAlreadyExists",
    "ResourceAlreadyExistsException",
    "BucketAlreadyOwnedByYou",
];

/// Known AWS error codes for throttling/rate limiting
const THROTTLING_CODES: &[&str] = &[
    "Throttling",
    "ThrottlingException",
    "TooManyUpdates",
    "RequestLimitExceeded",
];

/// Classify an AWS SDK error using the error code.
pub fn classify_aws_error(code: Option<&str>, message: Option<&str>) -> AwsError {
    let message = message.unwrap_or("Unknown error").to_string();

    match code {
        // CloudFormation reports missing stacks as a validation error
        Some("ValidationError") if !message.contains("does not exist") => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
        Some(c) if NOT_FOUND_CODES.contains(&c) => AwsError::NotFound { message },
        Some(c) if ALREADY_EXISTS_CODES.contains(&c) => AwsError::AlreadyExists { message },
        Some(c) if THROTTLING_CODES.contains(&c) => AwsError::Throttled,
        _ => AwsError::Sdk {
            code: code.map(str::to_string),
            message,
        },
    }
}

/// Classify any SDK error exposing error metadata
pub fn classify_sdk_error<E: ProvideErrorMetadata>(error: &E) -> AwsError {
    classify_aws_error(error.code(), error.message())
}

/// Classify an error from an anyhow::Error by extracting the AWS error code.
///
/// Walks the error chain looking for an already classified [`AwsError`] or
/// one of the SSM operation errors the sequence protocol retries on. Falls
/// back to matching known codes in the Debug representation.
pub fn classify_anyhow_error(error: &anyhow::Error) -> AwsError {
    use aws_sdk_ssm::error::SdkError;
    use aws_sdk_ssm::operation::{get_parameter::GetParameterError, put_parameter::PutParameterError};

    for cause in error.chain() {
        if let Some(e) = cause.downcast_ref::<AwsError>() {
            return e.clone();
        }
        if let Some(e) = cause.downcast_ref::<SdkError<GetParameterError>>() {
            return classify_sdk_error(e);
        }
        if let Some(e) = cause.downcast_ref::<SdkError<PutParameterError>>() {
            return classify_sdk_error(e);
        }
    }

    let debug_str = format!("{:?}", error);
    if let Some(code) = extract_error_code(&debug_str) {
        return classify_aws_error(Some(&code), Some(&debug_str));
    }

    AwsError::Sdk {
        code: None,
        message: error.to_string(),
    }
}

/// Extract a known AWS error code from a debug string representation
fn extract_error_code(debug_str: &str) -> Option<String> {
    let known = NOT_FOUND_CODES
        .iter()
        .chain(ALREADY_EXISTS_CODES)
        .chain(THROTTLING_CODES)
        .filter(|code| **code != "ValidationError");
    for code in known {
        if debug_str.contains(code) {
            return Some((*code).to_string());
        }
    }

    // Try to extract any code from `code: Some("...")` pattern
    if let Some(start) = debug_str.find("code: Some(\"") {
        let rest = &debug_str[start + 12..];
        if let Some(end) = rest.find('"') {
            return Some(rest[..end].to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_codes() {
        for code in NOT_FOUND_CODES.iter().filter(|c| **c != "ValidationError") {
            let err = classify_aws_error(Some(code), Some("some message"));
            assert!(err.is_not_found(), "Expected NotFound for code: {code}");
        }
    }

    #[test]
    fn missing_stack_is_not_found() {
        let err = classify_aws_error(Some("ValidationError"), Some("Stack with id s does not exist"));
        assert!(err.is_not_found());

        let err = classify_aws_error(Some("ValidationError"), Some("1 validation error detected"));
        assert!(matches!(err, AwsError::Sdk { .. }));
    }

    #[test]
    fn already_exists_codes() {
        for code in ALREADY_EXISTS_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_already_exists(), "Expected AlreadyExists for code: {code}");
        }
    }

    #[test]
    fn throttling_codes() {
        for code in THROTTLING_CODES {
            let err = classify_aws_error(Some(code), Some("msg"));
            assert!(err.is_retryable(), "Expected retryable for code: {code}");
        }
    }

    #[test]
    fn unknown_and_missing_codes() {
        let err = classify_aws_error(Some("SomeNewError"), Some("details"));
        assert!(matches!(err, AwsError::Sdk { .. }));
        assert!(!err.is_retryable());

        let err2 = classify_aws_error(None, Some("something failed"));
        assert!(matches!(err2, AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn classify_wrapped_aws_error() {
        let err = anyhow::Error::new(AwsError::Throttled).context("could not get the parameter /p");
        assert!(classify_anyhow_error(&err).is_retryable());
    }

    #[test]
    fn classify_wrapped_sdk_timeout() {
        use aws_sdk_ssm::error::SdkError;
        use aws_sdk_ssm::operation::get_parameter::GetParameterError;

        let sdk: SdkError<GetParameterError> = SdkError::timeout_error("connect timed out after 3.1s");
        let err = anyhow::Error::new(sdk).context("could not get the parameter /p");
        assert!(format!("{err:#}").contains("connect timed out after 3.1s"));
        assert!(matches!(classify_anyhow_error(&err), AwsError::Sdk { code: None, .. }));
    }

    #[test]
    fn extract_code_from_code_field() {
        let debug_str = r#"SdkError { code: Some("SomeRandomCode"), message: "fail" }"#;
        assert_eq!(extract_error_code(debug_str).as_deref(), Some("SomeRandomCode"));
        assert_eq!(
            extract_error_code("ServiceError { ParameterNotFound }").as_deref(),
            Some("ParameterNotFound")
        );
    }

    #[test]
    fn extract_none_from_unrelated_string() {
        assert!(extract_error_code("connection refused").is_none());
    }
}
