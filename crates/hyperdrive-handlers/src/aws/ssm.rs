//! SSM parameters backing sequences

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::aws::error::classify_sdk_error;
use crate::sequence::SequenceParameter;
use anyhow::{Context, Result};
use aws_sdk_ssm::Client;
use aws_sdk_ssm::types::ParameterType;
use hyperdrive_common::defaults::SEQUENCE_ALLOWED_PATTERN;
use std::future::Future;
use tracing::{debug, info, warn};

/// Versioned single value store operations.
///
/// Every successful write returns the version it created. Versions of one
/// parameter start at 1 and grow by exactly one per write.
pub trait ParameterOperations: Send + Sync {
    /// Read the latest version of a parameter
    fn get_parameter(&self, name: &str) -> impl Future<Output = Result<SequenceParameter>> + Send;

    /// Read one specific version of a parameter
    fn get_parameter_version(
        &self,
        name: &str,
        version: i64,
    ) -> impl Future<Output = Result<SequenceParameter>> + Send;

    /// Create a parameter, failing if it already exists
    fn create_parameter(&self, name: &str, value: &str)
    -> impl Future<Output = Result<i64>> + Send;

    /// Write a new version of an existing parameter
    fn overwrite_parameter(
        &self,
        name: &str,
        value: &str,
    ) -> impl Future<Output = Result<i64>> + Send;

    /// Delete a parameter with all its versions
    fn delete_parameter(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// SSM client for sequence parameters
pub struct SsmClient {
    client: Client,
}

impl FromAwsContext for SsmClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ssm_client(),
        }
    }
}

impl SsmClient {
    async fn get(&self, name: &str, selector: &str) -> Result<SequenceParameter> {
        let output = self
            .client
            .get_parameter()
            .name(selector)
            .send()
            .await
            .with_context(|| format!("could not get the parameter {selector}"))?;

        let parameter = output
            .parameter()
            .with_context(|| format!("no parameter returned for {selector}"))?;

        Ok(SequenceParameter {
            name: name.to_string(),
            value: parameter.value().unwrap_or_default().to_string(),
            version: parameter.version(),
        })
    }

    async fn put(&self, name: &str, value: &str, overwrite: bool) -> Result<i64> {
        let output = self
            .client
            .put_parameter()
            .name(name)
            .value(value)
            .r#type(ParameterType::String)
            .allowed_pattern(SEQUENCE_ALLOWED_PATTERN)
            .overwrite(overwrite)
            .send()
            .await
            .with_context(|| format!("could not put the parameter {name}"))?;

        debug!(parameter = %name, value = %value, version = output.version(), "Wrote parameter");
        Ok(output.version())
    }
}

impl ParameterOperations for SsmClient {
    async fn get_parameter(&self, name: &str) -> Result<SequenceParameter> {
        self.get(name, name).await
    }

    async fn get_parameter_version(&self, name: &str, version: i64) -> Result<SequenceParameter> {
        let mut parameter = self.get(name, &format!("{name}:{version}")).await?;
        parameter.version = version;
        Ok(parameter)
    }

    async fn create_parameter(&self, name: &str, value: &str) -> Result<i64> {
        info!(parameter = %name, value = %value, "Creating parameter");
        self.put(name, value, false).await
    }

    async fn overwrite_parameter(&self, name: &str, value: &str) -> Result<i64> {
        self.put(name, value, true).await
    }

    async fn delete_parameter(&self, name: &str) -> Result<()> {
        info!(parameter = %name, "Deleting parameter");
        match self.client.delete_parameter().name(name).send().await {
            Ok(_) => Ok(()),
            Err(e) if classify_sdk_error(&e).is_not_found() => {
                warn!(parameter = %name, "Parameter already deleted");
                Ok(())
            }
            Err(e) => Err(e).with_context(|| format!("could not delete the parameter {name}")),
        }
    }
}
