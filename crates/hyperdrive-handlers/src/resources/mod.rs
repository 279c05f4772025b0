//! Concrete custom resource handlers
//!
//! Each submodule implements [`ResourceHandler`](crate::lifecycle::ResourceHandler)
//! for one [`ResourceKind`]. The handlers are generic over the `*Operations`
//! traits of [`crate::aws`]; [`handle`] wires them to live AWS clients.

mod dns_certificate;
mod ecr_cleanup;
mod log_group;
mod s3_cleanup;
mod sequence;
mod sequence_value;

pub use dns_certificate::{DnsCertificateHandler, DnsCertificateProperties};
pub use ecr_cleanup::{EcrCleanupHandler, EcrCleanupProperties};
pub use log_group::{LogGroupHandler, LogGroupProperties};
pub use s3_cleanup::{S3CleanupHandler, S3CleanupProperties};
pub use sequence::{SequenceHandler, SequenceProperties};
pub use sequence_value::{SequenceValueHandler, SequenceValueProperties};

use crate::aws::{
    AcmClient, AwsContext, CloudFormationClient, EcrClient, FromAwsContext, LogsClient, Regional,
    S3Client, SsmClient, StackOperations,
};
use crate::config::HandlerConfig;
use crate::lifecycle::reconcile;
use crate::sequence::SequenceStore;
use crate::wait::TokioSleeper;
use garde::Validate;
use hyperdrive_common::defaults::STACK_DELETE_IN_PROGRESS;
use hyperdrive_common::event::decode_properties;
use hyperdrive_common::{Properties, ResourceEvent, ResourceKind, ResourceOutcome, ValidationError};
use serde::de::DeserializeOwned;
use tracing::info;

/// Decode a property map and check its validation rules
pub(crate) fn decode<T>(properties: &Properties) -> Result<T, ValidationError>
where
    T: DeserializeOwned + Validate,
    T::Context: Default,
{
    let value: T = decode_properties(properties)?;
    value.validate()?;
    Ok(value)
}

/// Whether the enclosing stack is being deleted.
///
/// Cleanup resources are also deleted when they are merely removed from
/// a template; only a stack deletion may empty their container.
pub(crate) async fn stack_is_deleting<K: StackOperations>(
    stacks: &K,
    stack_id: &str,
) -> anyhow::Result<bool> {
    let status = stacks.stack_status(stack_id).await?;
    if status != STACK_DELETE_IN_PROGRESS {
        info!(stack_id = %stack_id, status = %status, "Stack is not being deleted, keeping contents");
        return Ok(false);
    }
    Ok(true)
}

/// Run one event through the handler for `kind`.
///
/// Region-sensitive handlers get clients for the resource's `Region`
/// property, all others use the context's region.
pub async fn handle(
    kind: ResourceKind,
    event: &ResourceEvent,
    ctx: &AwsContext,
    config: &HandlerConfig,
) -> ResourceOutcome {
    match kind {
        ResourceKind::SequenceGenerator => {
            let store = SequenceStore::new(SsmClient::from_context(ctx), config.sequence);
            reconcile(&SequenceHandler::new(store), event).await
        }
        ResourceKind::SequenceValue => {
            let store = SequenceStore::new(SsmClient::from_context(ctx), config.sequence);
            reconcile(&SequenceValueHandler::new(store), event).await
        }
        ResourceKind::DnsCertificate => {
            let handler = DnsCertificateHandler::new(
                Regional::<AcmClient>::new(ctx.clone()),
                TokioSleeper,
                config.certificate,
            );
            reconcile(&handler, event).await
        }
        ResourceKind::LogGroup => {
            let handler = LogGroupHandler::new(Regional::<LogsClient>::new(ctx.clone()));
            reconcile(&handler, event).await
        }
        ResourceKind::S3Cleanup => {
            let handler = S3CleanupHandler::new(
                S3Client::from_context(ctx),
                CloudFormationClient::from_context(ctx),
            );
            reconcile(&handler, event).await
        }
        ResourceKind::EcrCleanup => {
            let handler = EcrCleanupHandler::new(
                EcrClient::from_context(ctx),
                CloudFormationClient::from_context(ctx),
            );
            reconcile(&handler, event).await
        }
    }
}
