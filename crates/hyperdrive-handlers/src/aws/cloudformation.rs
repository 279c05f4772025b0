//! CloudFormation stack status lookups

use crate::aws::context::{AwsContext, FromAwsContext};
use anyhow::{Context, Result};
use aws_sdk_cloudformation::Client;
use std::future::Future;
use tracing::debug;

/// Stack operations used by the cleanup handlers
pub trait StackOperations: Send + Sync {
    /// Current status of the stack, e.g. `DELETE_IN_PROGRESS`
    fn stack_status(&self, stack_id: &str) -> impl Future<Output = Result<String>> + Send;
}

/// CloudFormation client
pub struct CloudFormationClient {
    client: Client,
}

impl FromAwsContext for CloudFormationClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.cloudformation_client(),
        }
    }
}

impl StackOperations for CloudFormationClient {
    async fn stack_status(&self, stack_id: &str) -> Result<String> {
        let output = self
            .client
            .describe_stacks()
            .stack_name(stack_id)
            .send()
            .await
            .with_context(|| format!("could not fetch the stack {stack_id}"))?;

        let status = output
            .stacks()
            .first()
            .and_then(|stack| stack.stack_status())
            .map(|status| status.as_str().to_string())
            .with_context(|| format!("no status for the stack {stack_id}"))?;

        debug!(stack = %stack_id, status = %status, "Fetched stack status");
        Ok(status)
    }
}
