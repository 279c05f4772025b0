//! The lifecycle contract shared by all resource handlers.
//!
//! Handlers implement [`ResourceHandler`]; [`reconcile`] turns one
//! [`ResourceEvent`] into exactly one [`ResourceOutcome`] and owns the
//! physical id conventions:
//!
//! - a response always carries a non-empty physical id;
//! - a creation that fails before an identifier exists answers with the
//!   failure id of the logical resource, and deleting a failure id is a
//!   no-op;
//! - a creation that fails after an identifier exists answers with that
//!   identifier, so that the `Delete` sent on rollback cleans up;
//! - an update either mutates in place and keeps the physical id, or
//!   creates a replacement, whose new physical id makes CloudFormation
//!   delete the old resource later.

use hyperdrive_common::{
    Attributes, RequestType, ResourceEvent, ResourceKind, ResourceOutcome, ValidationError,
};
use serde_json::Value;
use std::fmt;
use std::future::Future;
use tracing::{info, warn};

/// Physical id and attributes of a created resource
#[derive(Debug, Clone, PartialEq)]
pub struct Reconciled {
    pub physical_id: String,
    pub attributes: Attributes,
}

impl Reconciled {
    pub fn new(physical_id: impl Into<String>) -> Self {
        Self {
            physical_id: physical_id.into(),
            attributes: Attributes::new(),
        }
    }

    pub fn with_attributes(mut self, attributes: Attributes) -> Self {
        self.attributes = attributes;
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}

/// A handler failure, with the physical id known when it happened
#[derive(Debug)]
pub struct ReconcileError {
    physical_id: Option<String>,
    source: anyhow::Error,
}

impl ReconcileError {
    pub fn new(source: impl Into<anyhow::Error>) -> Self {
        Self {
            physical_id: None,
            source: source.into(),
        }
    }

    pub fn with_physical_id(mut self, physical_id: impl Into<String>) -> Self {
        self.physical_id = Some(physical_id.into());
        self
    }

    pub fn physical_id(&self) -> Option<&str> {
        self.physical_id.as_deref()
    }

    pub fn source(&self) -> &anyhow::Error {
        &self.source
    }
}

impl fmt::Display for ReconcileError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#}", self.source)
    }
}

impl<E: Into<anyhow::Error>> From<E> for ReconcileError {
    fn from(source: E) -> Self {
        Self::new(source)
    }
}

/// Attach the physical id known at the point of failure
pub trait WithPhysicalId<T> {
    fn with_physical_id(self, physical_id: &str) -> Result<T, ReconcileError>;
}

impl<T, E: Into<anyhow::Error>> WithPhysicalId<T> for Result<T, E> {
    fn with_physical_id(self, physical_id: &str) -> Result<T, ReconcileError> {
        self.map_err(|e| ReconcileError::new(e).with_physical_id(physical_id))
    }
}

/// How an update is carried out
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdatePlan {
    /// Only mutable properties changed
    InPlace,
    /// Create a new resource; the old one is deleted by CloudFormation
    Replace,
}

/// A custom resource type
pub trait ResourceHandler: Send + Sync {
    fn kind(&self) -> ResourceKind;

    /// Create the resource described by the event's properties
    fn create(
        &self,
        event: &ResourceEvent,
    ) -> impl Future<Output = Result<Reconciled, ReconcileError>> + Send;

    /// Compare old and new properties
    fn plan_update(&self, event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError>;

    /// Apply the new properties to the existing resource
    fn update_in_place(
        &self,
        event: &ResourceEvent,
    ) -> impl Future<Output = Result<Attributes, ReconcileError>> + Send;

    /// Delete the resource named by the event's physical id
    fn delete(&self, event: &ResourceEvent) -> impl Future<Output = Result<(), ReconcileError>> + Send;
}

/// Handle one lifecycle event.
///
/// Never fails: errors become failed outcomes with a physical id chosen
/// by the rules of this module.
pub async fn reconcile<H: ResourceHandler>(handler: &H, event: &ResourceEvent) -> ResourceOutcome {
    let kind = handler.kind();
    info!(
        kind = %kind,
        request = %event.request_type,
        logical_id = %event.logical_resource_id,
        physical_id = %event.physical_resource_id,
        "Reconciling resource"
    );

    let outcome = match &event.request_type {
        RequestType::Create => create(handler, event).await,
        RequestType::Update => update(handler, event).await,
        RequestType::Delete => delete(handler, event).await,
        RequestType::Unknown(other) => ResourceOutcome::failure(
            current_physical_id(event),
            ValidationError::UnknownRequestType(other.clone()).to_string(),
        ),
    };

    match &outcome.error {
        None => info!(kind = %kind, physical_id = %outcome.physical_id, "Reconciled resource"),
        Some(reason) => warn!(
            kind = %kind,
            physical_id = %outcome.physical_id,
            reason = %reason,
            "Reconciliation failed"
        ),
    }
    outcome
}

/// The event's physical id, or the failure id when there is none yet
fn current_physical_id(event: &ResourceEvent) -> String {
    if event.physical_resource_id.is_empty() {
        event.failure_physical_id()
    } else {
        event.physical_resource_id.clone()
    }
}

async fn create<H: ResourceHandler>(handler: &H, event: &ResourceEvent) -> ResourceOutcome {
    created(handler.create(event).await, event, event.failure_physical_id())
}

/// Outcome of a creation; `fallback_id` is reported when no id is known
fn created(
    result: Result<Reconciled, ReconcileError>,
    event: &ResourceEvent,
    fallback_id: String,
) -> ResourceOutcome {
    match result {
        Ok(reconciled) if reconciled.physical_id.is_empty() => ResourceOutcome::failure(
            event.failure_physical_id(),
            "handler returned an empty physical resource id",
        ),
        Ok(reconciled) => ResourceOutcome::success(reconciled.physical_id, reconciled.attributes),
        Err(e) => {
            let reason = e.to_string();
            let physical_id = e.physical_id.unwrap_or(fallback_id);
            ResourceOutcome::failure(physical_id, reason)
        }
    }
}

async fn update<H: ResourceHandler>(handler: &H, event: &ResourceEvent) -> ResourceOutcome {
    let current = current_physical_id(event);

    // Nothing was created that could be updated
    let plan = if event.is_failure() || event.physical_resource_id.is_empty() {
        Ok(UpdatePlan::Replace)
    } else {
        handler.plan_update(event)
    };

    match plan {
        Ok(UpdatePlan::InPlace) => {
            info!(physical_id = %current, "Updating in place");
            match handler.update_in_place(event).await {
                Ok(attributes) => ResourceOutcome::success(current, attributes),
                Err(e) => ResourceOutcome::failure(current, e.to_string()),
            }
        }
        Ok(UpdatePlan::Replace) => {
            info!(physical_id = %current, "Replacing resource");
            // The old resource still exists when the replacement fails
            // without an id, so it keeps being tracked.
            created(handler.create(event).await, event, current)
        }
        Err(e) => ResourceOutcome::failure(current, e.to_string()),
    }
}

async fn delete<H: ResourceHandler>(handler: &H, event: &ResourceEvent) -> ResourceOutcome {
    let current = current_physical_id(event);
    if event.physical_resource_id.is_empty() || event.is_failure() {
        info!(physical_id = %current, "Nothing was created, skipping delete");
        return ResourceOutcome::success(current, Attributes::new());
    }

    match handler.delete(event).await {
        Ok(()) => ResourceOutcome::success(current, Attributes::new()),
        Err(e) => ResourceOutcome::failure(current, e.to_string()),
    }
}
