//! `Custom::S3Cleanup`: empties a bucket when its stack is deleted

use crate::aws::{BucketOperations, BucketVersions, StackOperations};
use crate::bulk_delete::delete_all;
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::{decode, stack_is_deleting};
use garde::Validate;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, ResourceEvent, ResourceKind};
use serde::Deserialize;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct S3CleanupProperties {
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub bucket: String,
    /// Only object keys starting with this prefix are deleted
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(skip)]
    pub prefix: String,
}

pub struct S3CleanupHandler<B, K> {
    buckets: B,
    stacks: K,
}

impl<B: BucketOperations, K: StackOperations> S3CleanupHandler<B, K> {
    pub fn new(buckets: B, stacks: K) -> Self {
        Self { buckets, stacks }
    }
}

impl<B: BucketOperations, K: StackOperations> ResourceHandler for S3CleanupHandler<B, K> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::S3Cleanup
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let _: S3CleanupProperties = decode(&event.resource_properties)?;
        Ok(Reconciled::new(&event.logical_resource_id))
    }

    fn plan_update(&self, _event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        Ok(UpdatePlan::InPlace)
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        let _: S3CleanupProperties = decode(&event.resource_properties)?;
        Ok(Attributes::new())
    }

    async fn delete(&self, event: &ResourceEvent) -> Result<(), ReconcileError> {
        let physical_id = &event.physical_resource_id;
        if !stack_is_deleting(&self.stacks, &event.stack_id)
            .await
            .with_physical_id(physical_id)?
        {
            return Ok(());
        }

        let properties: S3CleanupProperties = decode(&event.resource_properties)?;
        let source = BucketVersions::new(&self.buckets, &properties.bucket, &properties.prefix);
        let report = delete_all(&source, &properties.bucket)
            .await
            .with_physical_id(physical_id)?;
        info!(
            bucket = %properties.bucket,
            prefix = %properties.prefix,
            deleted = report.deleted,
            "Emptied bucket"
        );
        Ok(())
    }
}
