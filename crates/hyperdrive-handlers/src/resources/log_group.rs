//! `Custom::LogGroup`: CloudWatch log groups, optionally in another region

use crate::aws::{LogGroupOperations, LogGroupTags, RegionalClients};
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::decode;
use garde::Validate;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, ResourceEvent, ResourceKind, ValidationError, is_same_region};
use serde::Deserialize;
use serde_json::json;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct LogGroupProperties {
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub log_group_name: String,
    /// Empty for the stack's region
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(skip)]
    pub region: String,
    /// Empty to keep log events forever
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(skip)]
    pub retention_in_days: String,
    #[serde(default)]
    #[garde(skip)]
    pub tags: LogGroupTags,
}

impl LogGroupProperties {
    fn retention(&self) -> Result<Option<i32>, ValidationError> {
        if self.retention_in_days.is_empty() {
            return Ok(None);
        }
        self.retention_in_days
            .parse()
            .map(Some)
            .map_err(|_| ValidationError::RetentionInDays {
                value: self.retention_in_days.clone(),
                group: self.log_group_name.clone(),
            })
    }
}

fn arn_attributes(arn: String) -> Attributes {
    let mut attributes = Attributes::new();
    attributes.insert("Arn".to_string(), json!(arn));
    attributes
}

pub struct LogGroupHandler<R> {
    clients: R,
}

impl<R> LogGroupHandler<R>
where
    R: RegionalClients,
    R::Client: LogGroupOperations,
{
    pub fn new(clients: R) -> Self {
        Self { clients }
    }
}

impl<R> ResourceHandler for LogGroupHandler<R>
where
    R: RegionalClients,
    R::Client: LogGroupOperations,
{
    fn kind(&self) -> ResourceKind {
        ResourceKind::LogGroup
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let properties: LogGroupProperties = decode(&event.resource_properties)?;
        let retention = properties.retention()?;
        let name = &properties.log_group_name;
        let client = self.clients.client_for(event.region());

        client.create_log_group(name, &properties.tags).await?;
        info!(log_group = %name, region = ?event.region(), "Created log group");

        if let Some(days) = retention {
            client
                .put_retention_policy(name, days)
                .await
                .with_physical_id(name)?;
        }

        let arn = client.log_group_arn(name).await.with_physical_id(name)?;
        Ok(Reconciled::new(name).with_attributes(arn_attributes(arn)))
    }

    fn plan_update(&self, event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        let new: LogGroupProperties = decode(&event.resource_properties)?;
        let old: LogGroupProperties = decode(&event.old_resource_properties)?;

        if new.log_group_name != old.log_group_name
            || !is_same_region(&event.stack_id, &old.region, &new.region)
        {
            return Ok(UpdatePlan::Replace);
        }
        Ok(UpdatePlan::InPlace)
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        let new: LogGroupProperties = decode(&event.resource_properties)?;
        let old: LogGroupProperties = decode(&event.old_resource_properties)?;
        let name = &event.physical_resource_id;
        let client = self.clients.client_for(event.region());

        if new.retention_in_days != old.retention_in_days {
            match new.retention()? {
                Some(days) => client.put_retention_policy(name, days).await?,
                None => client.delete_retention_policy(name).await?,
            }
        }

        if new.tags != old.tags {
            let existing = client.list_tags(name).await?;
            let keys: Vec<String> = existing.into_keys().collect();
            client.untag(name, &keys).await?;
            client.tag(name, &new.tags).await?;
            info!(log_group = %name, tags = new.tags.len(), "Replaced log group tags");
        }

        let arn = client.log_group_arn(name).await?;
        Ok(arn_attributes(arn))
    }

    async fn delete(&self, event: &ResourceEvent) -> Result<(), ReconcileError> {
        let name = &event.physical_resource_id;
        self.clients
            .client_for(event.region())
            .delete_log_group(name)
            .await?;
        info!(log_group = %name, "Deleted log group");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::reconcile;
    use crate::testing::{FakeLogGroup, FakeLogGroups};
    use hyperdrive_common::{Properties, RequestType};

    const STACK_ID: &str =
        "arn:aws:cloudformation:us-west-2:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123";
    const GROUP: &str = "/app/web";

    fn props(name: &str, region: &str, retention: &str, tags: &[(&str, &str)]) -> Properties {
        let mut props = Properties::new();
        props.insert("LogGroupName".to_string(), json!(name));
        props.insert("Region".to_string(), json!(region));
        props.insert("RetentionInDays".to_string(), json!(retention));
        let tags: LogGroupTags = tags
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        props.insert("Tags".to_string(), json!(tags));
        props
    }

    fn event(request_type: RequestType, physical_id: &str) -> ResourceEvent {
        ResourceEvent::new(request_type, "MyLogGroup", STACK_ID).with_physical_id(physical_id)
    }

    fn tags(pairs: &[(&str, &str)]) -> LogGroupTags {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_create_log_group() {
        let groups = FakeLogGroups::new();
        let create = event(RequestType::Create, "")
            .with_properties(props(GROUP, "eu-west-1", "14", &[("team", "web")]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &create).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.physical_id, GROUP);
        assert_eq!(
            outcome.attributes["Arn"],
            "arn:aws:logs:us-west-2:123456789012:log-group:/app/web:*"
        );
        assert_eq!(
            groups.group(GROUP),
            Some(FakeLogGroup {
                retention: Some(14),
                tags: tags(&[("team", "web")]),
            })
        );
        assert_eq!(groups.regions(), vec![Some("eu-west-1".to_string())]);
        assert_eq!(groups.calls(), vec!["create", "put_retention", "describe"]);
    }

    #[tokio::test]
    async fn test_create_without_retention() {
        let groups = FakeLogGroups::new();
        let create = event(RequestType::Create, "").with_properties(props(GROUP, "", "", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &create).await;

        assert!(outcome.is_success());
        assert_eq!(groups.group(GROUP).unwrap().retention, None);
        assert_eq!(groups.calls(), vec!["create", "describe"]);
    }

    #[tokio::test]
    async fn test_invalid_retention_creates_nothing() {
        let groups = FakeLogGroups::new();
        let create = event(RequestType::Create, "").with_properties(props(GROUP, "", "two weeks", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &create).await;

        assert_eq!(outcome.physical_id, "failure-MyLogGroup");
        assert_eq!(
            outcome.error.as_deref(),
            Some("could not parse retention in days two weeks for group /app/web")
        );
        assert!(groups.calls().is_empty());
    }

    #[tokio::test]
    async fn test_existing_group_fails_without_id() {
        let groups = FakeLogGroups::new().with_group(GROUP, FakeLogGroup::default());
        let create = event(RequestType::Create, "").with_properties(props(GROUP, "", "7", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &create).await;

        assert_eq!(outcome.physical_id, "failure-MyLogGroup");
        assert_eq!(groups.group(GROUP).unwrap().retention, None);
    }

    #[tokio::test]
    async fn test_update_retention_and_tags_in_place() {
        let groups = FakeLogGroups::new().with_group(
            GROUP,
            FakeLogGroup {
                retention: Some(14),
                tags: tags(&[("team", "web"), ("old", "x")]),
            },
        );
        let update = event(RequestType::Update, GROUP)
            .with_properties(props(GROUP, "", "30", &[("team", "platform")]))
            .with_old_properties(props(GROUP, "", "14", &[("team", "web"), ("old", "x")]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &update).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.physical_id, GROUP);
        assert_eq!(
            groups.group(GROUP),
            Some(FakeLogGroup {
                retention: Some(30),
                tags: tags(&[("team", "platform")]),
            })
        );
        assert_eq!(
            groups.calls(),
            vec!["put_retention", "list_tags", "untag", "tag", "describe"]
        );
    }

    #[tokio::test]
    async fn test_removed_retention_deletes_policy() {
        let groups = FakeLogGroups::new().with_group(
            GROUP,
            FakeLogGroup {
                retention: Some(14),
                tags: LogGroupTags::new(),
            },
        );
        let update = event(RequestType::Update, GROUP)
            .with_properties(props(GROUP, "", "", &[]))
            .with_old_properties(props(GROUP, "", "14", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &update).await;

        assert!(outcome.is_success());
        assert_eq!(groups.group(GROUP).unwrap().retention, None);
        assert_eq!(groups.calls(), vec!["delete_retention", "describe"]);
    }

    #[tokio::test]
    async fn test_explicit_stack_region_updates_in_place() {
        let groups = FakeLogGroups::new().with_group(GROUP, FakeLogGroup::default());
        let update = event(RequestType::Update, GROUP)
            .with_properties(props(GROUP, "us-west-2", "", &[]))
            .with_old_properties(props(GROUP, "", "", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &update).await;

        assert!(outcome.is_success());
        assert_eq!(groups.calls(), vec!["describe"]);
    }

    #[tokio::test]
    async fn test_implicit_region_uses_stack_region() {
        let groups = FakeLogGroups::new().with_group(GROUP, FakeLogGroup::default());
        let update = event(RequestType::Update, GROUP)
            .with_properties(props(GROUP, "", "", &[]))
            .with_old_properties(props(GROUP, "us-west-2", "", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &update).await;

        assert!(outcome.is_success());
        assert_eq!(groups.regions(), vec![Some("us-west-2".to_string())]);
    }

    #[tokio::test]
    async fn test_rename_replaces() {
        let groups = FakeLogGroups::new().with_group(GROUP, FakeLogGroup::default());
        let update = event(RequestType::Update, GROUP)
            .with_properties(props("/app/api", "", "", &[]))
            .with_old_properties(props(GROUP, "", "", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &update).await;

        assert_eq!(outcome.physical_id, "/app/api");
        assert!(groups.group("/app/api").is_some());
        assert!(groups.group(GROUP).is_some());
    }

    #[tokio::test]
    async fn test_delete_log_group() {
        let groups = FakeLogGroups::new().with_group(GROUP, FakeLogGroup::default());
        let delete = event(RequestType::Delete, GROUP).with_properties(props(GROUP, "eu-west-1", "", &[]));

        let outcome = reconcile(&LogGroupHandler::new(groups.clone()), &delete).await;

        assert!(outcome.is_success());
        assert!(groups.group(GROUP).is_none());
        assert_eq!(groups.regions(), vec![Some("eu-west-1".to_string())]);
    }
}
