//! Configuration types for the handlers
//!
//! Everything here is plain data built once per invocation, usually from
//! the command line. Defaults come from [`hyperdrive_common::defaults`].

use hyperdrive_common::defaults::{
    DEFAULT_CERTIFICATE_MAX_ATTEMPTS, DEFAULT_CERTIFICATE_RECORD_INTERVAL,
    DEFAULT_CERTIFICATE_SHAPE_INTERVAL, DEFAULT_RESPONSE_TIMEOUT, DEFAULT_SEQUENCE_MAX_ATTEMPTS,
    DEFAULT_SEQUENCE_RETRY_INTERVAL,
};
use std::time::Duration;

/// AWS SDK overrides; `None` defers to the standard credential chain
#[derive(Debug, Clone, Default)]
pub struct AwsConfig {
    /// Default region for resources without a `Region` property
    pub region: Option<String>,
    /// Named profile from the shared config files
    pub profile: Option<String>,
    /// Custom endpoint, e.g. a local emulator
    pub endpoint_url: Option<String>,
}

/// Retry budget for drawing sequence values
#[derive(Debug, Clone, Copy)]
pub struct SequenceConfig {
    pub max_attempts: u32,
    pub retry_interval: Duration,
}

impl Default for SequenceConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_SEQUENCE_MAX_ATTEMPTS,
            retry_interval: DEFAULT_SEQUENCE_RETRY_INTERVAL,
        }
    }
}

/// Readiness polling for certificate validation records.
///
/// All polls share `max_attempts`. Polls wait `interval` while the record
/// set does not have the expected size yet and `record_interval` while
/// individual records are still empty.
#[derive(Debug, Clone, Copy)]
pub struct PollConfig {
    pub max_attempts: u32,
    pub interval: Duration,
    pub record_interval: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_CERTIFICATE_MAX_ATTEMPTS,
            interval: DEFAULT_CERTIFICATE_SHAPE_INTERVAL,
            record_interval: DEFAULT_CERTIFICATE_RECORD_INTERVAL,
        }
    }
}

/// Delivery of the response document
#[derive(Debug, Clone, Copy)]
pub struct ResponseConfig {
    /// Upload the response to the event's `ResponseURL`
    pub send: bool,
    pub timeout: Duration,
}

impl Default for ResponseConfig {
    fn default() -> Self {
        Self {
            send: false,
            timeout: DEFAULT_RESPONSE_TIMEOUT,
        }
    }
}

/// Configuration for one handler invocation
///
/// Composed of focused sub-configs so that each component only receives
/// the part it uses.
#[derive(Debug, Clone, Default)]
pub struct HandlerConfig {
    pub aws: AwsConfig,
    pub sequence: SequenceConfig,
    pub certificate: PollConfig,
    pub response: ResponseConfig,
}
