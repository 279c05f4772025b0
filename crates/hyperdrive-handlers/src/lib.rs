//! hyperdrive-handlers - CloudFormation custom resource handlers
//!
//! This crate reconciles custom resource lifecycle events against AWS:
//! every handler implements the [`lifecycle::ResourceHandler`] contract and
//! is driven by [`lifecycle::reconcile`], which owns the physical id and
//! failure conventions. The handlers share three protocols:
//!
//! - [`wait`]: bounded polling of eventually consistent state
//! - [`bulk_delete`]: cursor-following deletion of paged result sets
//! - [`sequence`]: an optimistic lock over a versioned SSM parameter

pub mod aws;
pub mod bulk_delete;
pub mod config;
pub mod lifecycle;
pub mod resources;
pub mod response;
pub mod sequence;
pub mod wait;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, reconcile};
pub use sequence::{SequenceError, SequenceParameter, SequenceStore};
pub use wait::{Sleeper, TokioSleeper, WaitError};
