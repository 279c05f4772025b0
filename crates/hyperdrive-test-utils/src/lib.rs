//! Shared test utilities for hyperdrive
//!
//! Fixtures used by the unit and integration tests of several crates.
//!
//! ## Modules
//!
//! - [`aws`]: AWS region detection, stack ARNs and unique test names
//! - [`events`]: lifecycle event builders

pub mod aws;
pub mod events;

// Re-export commonly used items
pub use aws::{get_test_region, test_run_id, test_sequence_name, test_stack_id};
pub use events::{EventBuilder, properties};
