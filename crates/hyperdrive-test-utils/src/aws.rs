//! AWS test utilities
//!
//! Provides region detection, stack ARNs and unique names for tests that
//! create real AWS resources.

use chrono::Utc;

/// Get the AWS region for tests.
///
/// Checks environment variables in order:
/// 1. AWS_REGION
/// 2. AWS_DEFAULT_REGION
/// 3. Falls back to us-west-2
pub fn get_test_region() -> String {
    std::env::var("AWS_REGION")
        .or_else(|_| std::env::var("AWS_DEFAULT_REGION"))
        .unwrap_or_else(|_| "us-west-2".to_string())
}

/// Generate a unique run ID for test resources.
///
/// Format: `test-{timestamp_ms}-{counter}`, unique even when tests start
/// simultaneously.
///
/// # Example
///
/// ```
/// use hyperdrive_test_utils::aws::test_run_id;
///
/// let run_id = test_run_id();
/// assert!(run_id.starts_with("test-"));
/// ```
pub fn test_run_id() -> String {
    use std::sync::atomic::{AtomicU32, Ordering};
    static COUNTER: AtomicU32 = AtomicU32::new(0);

    let ts = Utc::now().timestamp_millis();
    let counter = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("test-{}-{}", ts, counter)
}

/// A unique sequence name, suitable for `SequenceName`
///
/// # Example
///
/// ```
/// use hyperdrive_test_utils::aws::test_sequence_name;
///
/// assert!(test_sequence_name().starts_with("/hyperdrive-test/"));
/// ```
pub fn test_sequence_name() -> String {
    format!("/hyperdrive-test/{}", test_run_id())
}

/// The ARN of a (fictitious) stack in `region`
pub fn test_stack_id(region: &str) -> String {
    format!(
        "arn:aws:cloudformation:{region}:123456789012:stack/hyperdrive-test/51af3dc0-da77-11e4-872e-1234567db123"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyperdrive_common::arn_region;

    #[test]
    fn test_run_id_format() {
        let run_id = test_run_id();
        // Format: test-{timestamp_ms}-{counter}
        let parts: Vec<&str> = run_id.strip_prefix("test-").unwrap().split('-').collect();
        assert_eq!(parts.len(), 2);
        parts[0].parse::<i64>().expect("Should be valid timestamp");
        parts[1].parse::<u32>().expect("Should be valid counter");
    }

    #[test]
    fn test_run_id_unique() {
        assert_ne!(test_run_id(), test_run_id());
    }

    #[test]
    fn test_stack_id_region() {
        assert_eq!(arn_region(&test_stack_id("eu-central-1")), Some("eu-central-1"));
    }
}
