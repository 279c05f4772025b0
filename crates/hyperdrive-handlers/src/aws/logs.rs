//! CloudWatch Logs groups

use crate::aws::context::{AwsContext, FromAwsContext};
use anyhow::{Context, Result};
use aws_sdk_cloudwatchlogs::Client;
use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use tracing::{debug, info};

/// Log group tags by key
pub type LogGroupTags = BTreeMap<String, String>;

/// Log group operations used by the log group handler
pub trait LogGroupOperations: Send + Sync {
    fn create_log_group(
        &self,
        name: &str,
        tags: &LogGroupTags,
    ) -> impl Future<Output = Result<()>> + Send;

    fn put_retention_policy(&self, name: &str, days: i32)
    -> impl Future<Output = Result<()>> + Send;

    fn delete_retention_policy(&self, name: &str) -> impl Future<Output = Result<()>> + Send;

    /// The ARN of the group named exactly `name`
    fn log_group_arn(&self, name: &str) -> impl Future<Output = Result<String>> + Send;

    fn list_tags(&self, name: &str) -> impl Future<Output = Result<LogGroupTags>> + Send;

    fn tag(&self, name: &str, tags: &LogGroupTags) -> impl Future<Output = Result<()>> + Send;

    fn untag(&self, name: &str, keys: &[String]) -> impl Future<Output = Result<()>> + Send;

    fn delete_log_group(&self, name: &str) -> impl Future<Output = Result<()>> + Send;
}

/// CloudWatch Logs client
pub struct LogsClient {
    client: Client,
}

impl FromAwsContext for LogsClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.logs_client(),
        }
    }
}

fn sdk_tags(tags: &LogGroupTags) -> Option<HashMap<String, String>> {
    (!tags.is_empty()).then(|| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
}

impl LogGroupOperations for LogsClient {
    async fn create_log_group(&self, name: &str, tags: &LogGroupTags) -> Result<()> {
        info!(log_group = %name, "Creating log group");
        self.client
            .create_log_group()
            .log_group_name(name)
            .set_tags(sdk_tags(tags))
            .send()
            .await
            .with_context(|| format!("could not create log group {name}"))?;
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> Result<()> {
        debug!(log_group = %name, days, "Putting retention policy");
        self.client
            .put_retention_policy()
            .log_group_name(name)
            .retention_in_days(days)
            .send()
            .await
            .with_context(|| format!("could not put retention policy for log group {name}"))?;
        Ok(())
    }

    async fn delete_retention_policy(&self, name: &str) -> Result<()> {
        debug!(log_group = %name, "Deleting retention policy");
        self.client
            .delete_retention_policy()
            .log_group_name(name)
            .send()
            .await
            .with_context(|| format!("could not delete retention policy for log group {name}"))?;
        Ok(())
    }

    async fn log_group_arn(&self, name: &str) -> Result<String> {
        let mut next_token: Option<String> = None;
        loop {
            let output = self
                .client
                .describe_log_groups()
                .log_group_name_prefix(name)
                .set_next_token(next_token.take())
                .send()
                .await
                .with_context(|| format!("could not fetch log groups with prefix {name}"))?;

            if let Some(arn) = output
                .log_groups()
                .iter()
                .find(|group| group.log_group_name() == Some(name))
                .and_then(|group| group.arn())
            {
                return Ok(arn.to_string());
            }

            match output.next_token() {
                Some(token) => next_token = Some(token.to_string()),
                None => anyhow::bail!("log group not found for name {name}"),
            }
        }
    }

    #[allow(deprecated)]
    async fn list_tags(&self, name: &str) -> Result<LogGroupTags> {
        let output = self
            .client
            .list_tags_log_group()
            .log_group_name(name)
            .send()
            .await
            .with_context(|| format!("could not list the tags for log group {name}"))?;

        Ok(output
            .tags()
            .map(|tags| tags.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
            .unwrap_or_default())
    }

    #[allow(deprecated)]
    async fn tag(&self, name: &str, tags: &LogGroupTags) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .tag_log_group()
            .log_group_name(name)
            .set_tags(sdk_tags(tags))
            .send()
            .await
            .with_context(|| format!("could not tag the log group {name}"))?;
        Ok(())
    }

    #[allow(deprecated)]
    async fn untag(&self, name: &str, keys: &[String]) -> Result<()> {
        if keys.is_empty() {
            return Ok(());
        }
        self.client
            .untag_log_group()
            .log_group_name(name)
            .set_tags(Some(keys.to_vec()))
            .send()
            .await
            .with_context(|| format!("could not untag the log group {name}"))?;
        Ok(())
    }

    async fn delete_log_group(&self, name: &str) -> Result<()> {
        info!(log_group = %name, "Deleting log group");
        self.client
            .delete_log_group()
            .log_group_name(name)
            .send()
            .await
            .with_context(|| format!("could not delete log group {name}"))?;
        Ok(())
    }
}
