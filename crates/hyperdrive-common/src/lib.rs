//! hyperdrive-common - Shared types and utilities
//!
//! This crate holds everything the resource handlers share that does not
//! touch the AWS SDK: the lifecycle event and response model, the failure
//! physical id convention, region comparison, the sequence expression
//! evaluator and the catalogue of resource kinds.
//!
//! ## Modules
//!
//! - [`calc`]: arithmetic expressions over a single variable `x`
//! - [`defaults`]: constants shared by handlers and the CLI
//! - [`error`]: property validation errors
//! - [`event`]: CloudFormation custom resource requests
//! - [`names`]: order and duplicate insensitive name list comparison
//! - [`outcome`]: handler results and the response document
//! - [`region`]: implicit/explicit region equivalence
//! - [`resource_kind`]: the custom resource types served by hyperdrive

pub mod calc;
pub mod defaults;
pub mod error;
pub mod event;
pub mod names;
pub mod outcome;
pub mod region;
pub mod resource_kind;

// Re-export commonly used types
pub use calc::{EvalError, Expr, ParseError, evaluate};
pub use error::ValidationError;
pub use event::{
    Properties, RequestType, ResourceEvent, failure_physical_id, is_failure_physical_id,
};
pub use names::same_names;
pub use outcome::{Attributes, CfnResponse, ResourceOutcome, ResponseStatus};
pub use region::{arn_region, is_same_region};
pub use resource_kind::ResourceKind;
