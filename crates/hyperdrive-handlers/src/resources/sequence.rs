//! `Custom::SequenceGenerator`: creates and deletes sequences

use crate::aws::ParameterOperations;
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::decode;
use crate::sequence::{SequenceStore, parameter_name, parse_initial_value};
use crate::wait::{Sleeper, TokioSleeper};
use garde::Validate;
use hyperdrive_common::defaults::SEQUENCE_PARAMETER_PREFIX;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, ResourceEvent, ResourceKind, ValidationError};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct SequenceProperties {
    /// Path below the sequence prefix, starting with `/`
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub sequence_name: String,
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(skip)]
    pub initial_value: String,
}

pub struct SequenceHandler<P, S = TokioSleeper> {
    store: SequenceStore<P, S>,
}

impl<P: ParameterOperations, S: Sleeper + Clone + 'static> SequenceHandler<P, S> {
    pub fn new(store: SequenceStore<P, S>) -> Self {
        Self { store }
    }
}

fn attributes(parameter: &str) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("ParameterName".to_string(), json!(parameter));
    attributes
}

impl<P: ParameterOperations, S: Sleeper + Clone + 'static> ResourceHandler for SequenceHandler<P, S> {
    fn kind(&self) -> ResourceKind {
        ResourceKind::SequenceGenerator
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let properties: SequenceProperties = decode(&event.resource_properties)?;
        let parameter = parameter_name(&properties.sequence_name)?;

        // An existing parameter belongs to someone else: report no id so
        // that rollback does not delete it.
        self.store
            .create(&parameter, &properties.initial_value)
            .await?;
        Ok(Reconciled::new(&parameter).with_attributes(attributes(&parameter)))
    }

    fn plan_update(&self, event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        let new: SequenceProperties = decode(&event.resource_properties)?;
        let old: SequenceProperties = decode(&event.old_resource_properties)?;

        if new.sequence_name != old.sequence_name {
            return Ok(UpdatePlan::Replace);
        }
        if parse_initial_value(&new.initial_value)? != parse_initial_value(&old.initial_value)? {
            return Err(ValidationError::Immutable(format!(
                "cannot change initial value for sequence {}",
                new.sequence_name
            ))
            .into());
        }
        Ok(UpdatePlan::InPlace)
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        Ok(attributes(&event.physical_resource_id))
    }

    async fn delete(&self, event: &ResourceEvent) -> Result<(), ReconcileError> {
        let parameter = &event.physical_resource_id;
        if !parameter.starts_with(SEQUENCE_PARAMETER_PREFIX) {
            return Err(ValidationError::PhysicalId(parameter.clone()).into());
        }
        self.store.delete(parameter).await.with_physical_id(parameter)?;
        info!(sequence = %parameter, "Deleted sequence");
        Ok(())
    }
}
