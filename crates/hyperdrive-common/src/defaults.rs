//! Default configuration values and protocol constants
//!
//! These constants keep the handlers, the CLI and the tests in agreement on
//! naming conventions and retry budgets.

use std::time::Duration;

/// Prefix of every synthesized failure physical id
pub const FAILURE_ID_PREFIX: &str = "failure-";

/// Prefix of the SSM parameters backing sequences
pub const SEQUENCE_PARAMETER_PREFIX: &str = "/hyperdrive/sequence";

/// Reserved parameter value marking a sequence as locked
pub const SEQUENCE_LOCK_VALUE: &str = "lock";

/// Allowed pattern for sequence parameter values
pub const SEQUENCE_ALLOWED_PATTERN: &str = r"^(\d+|lock)$";

/// Initial value used when `InitialValue` is empty
pub const DEFAULT_INITIAL_VALUE: &str = "0";

/// Expression used when a sequence value does not specify one
pub const DEFAULT_EXPRESSION: &str = "x";

/// Maximum attempts to draw a sequence value before giving up
pub const DEFAULT_SEQUENCE_MAX_ATTEMPTS: u32 = 3600;

/// Delay between two attempts to draw a sequence value
pub const DEFAULT_SEQUENCE_RETRY_INTERVAL: Duration = Duration::from_secs(1);

/// Attempts to wait for the validation record set of a certificate
pub const DEFAULT_CERTIFICATE_MAX_ATTEMPTS: u32 = 60;

/// Delay between two polls of the validation record set shape
pub const DEFAULT_CERTIFICATE_SHAPE_INTERVAL: Duration = Duration::from_secs(1);

/// Delay between two polls while individual records are still empty
pub const DEFAULT_CERTIFICATE_RECORD_INTERVAL: Duration = Duration::from_secs(3);

/// Stack status in which cleanup resources empty their container
pub const STACK_DELETE_IN_PROGRESS: &str = "DELETE_IN_PROGRESS";

/// Timeout for delivering the response document to the pre-signed URL
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_secs(30);
