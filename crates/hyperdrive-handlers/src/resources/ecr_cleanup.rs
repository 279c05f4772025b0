//! `Custom::EcrCleanup`: empties a repository when its stack is deleted

use crate::aws::{RepositoryImages, RepositoryOperations, StackOperations};
use crate::bulk_delete::delete_all;
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::{decode, stack_is_deleting};
use garde::Validate;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, ResourceEvent, ResourceKind};
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct EcrCleanupProperties {
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub repository: String,
}

pub struct EcrCleanupHandler<E, K> {
    repositories: E,
    stacks: K,
}

impl<E: RepositoryOperations, K: StackOperations> EcrCleanupHandler<E, K> {
    pub fn new(repositories: E, stacks: K) -> Self {
        Self {
            repositories,
            stacks,
        }
    }
}

impl<E: RepositoryOperations, K: StackOperations> ResourceHandler for EcrCleanupHandler<E, K> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::EcrCleanup
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let _: EcrCleanupProperties = decode(&event.resource_properties)?;
        Ok(Reconciled::new(&event.logical_resource_id))
    }

    fn plan_update(&self, _event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        Ok(UpdatePlan::InPlace)
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        let _: EcrCleanupProperties = decode(&event.resource_properties)?;
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

        let properties: EcrCleanupProperties = decode(&event.resource_properties)?;
        let source = RepositoryImages::new(&self.repositories, &properties.repository);
        delete_all(&source, &properties.repository)
            .await
            .with_physical_id(physical_id)?;
        Ok(())
    }
}
