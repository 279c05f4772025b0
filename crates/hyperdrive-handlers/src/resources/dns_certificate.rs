//! `Custom::DnsCertificate`: ACM certificates validated through DNS
//!
//! ACM generates the validation records asynchronously after the request.
//! The record set first grows to one entry per distinct domain name, then
//! each entry gets its CNAME; both stages are polled for.

use crate::aws::{CertificateOperations, CertificateTag, RegionalClients, ValidationRecord};
use crate::config::PollConfig;
use crate::lifecycle::{ReconcileError, Reconciled, ResourceHandler, UpdatePlan, WithPhysicalId};
use crate::resources::decode;
use crate::wait::{Sleeper, TokioSleeper, poll_with_cadence};
use garde::Validate;
use hyperdrive_common::event::lenient;
use hyperdrive_common::{Attributes, ResourceEvent, ResourceKind, is_same_region, same_names};
use serde::Deserialize;
use serde_json::json;
use std::collections::BTreeSet;
use tracing::info;

#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "PascalCase")]
pub struct DnsCertificateProperties {
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(length(min = 1))]
    pub domain_name: String,
    /// Empty for the stack's region
    #[serde(deserialize_with = "lenient::string", default)]
    #[garde(skip)]
    pub region: String,
    #[serde(default)]
    #[garde(inner(length(min = 1)))]
    pub subject_alternative_names: Vec<String>,
    #[serde(default)]
    #[garde(skip)]
    pub tags: Vec<CertificateTag>,
}

impl DnsCertificateProperties {
    /// Number of validation records ACM creates.
    ///
    /// ACM issues one validation record per distinct name, so a SAN that
    /// repeats the domain name or another SAN shares that name's record and
    /// is not counted twice.
    fn expected_records(&self) -> usize {
        let mut names: BTreeSet<&str> = self
            .subject_alternative_names
            .iter()
            .map(String::as_str)
            .collect();
        names.insert(&self.domain_name);
        names.len()
    }
}

pub struct DnsCertificateHandler<R, S = TokioSleeper> {
    clients: R,
    sleeper: S,
    poll: PollConfig,
}

impl<R, S> DnsCertificateHandler<R, S>
where
    R: RegionalClients,
    R::Client: CertificateOperations,
    S: Sleeper,
{
    pub fn new(clients: R, sleeper: S, poll: PollConfig) -> Self {
        Self {
            clients,
            sleeper,
            poll,
        }
    }

    /// Wait for the validation records and render them as attributes
    async fn attributes(
        &self,
        client: &R::Client,
        arn: &str,
        expected: usize,
    ) -> anyhow::Result<Attributes> {
        let record_interval = self.poll.record_interval;
        let interval = self.poll.interval;

        let records = poll_with_cadence(
            self.poll.max_attempts,
            &self.sleeper,
            arn,
            || client.describe_validation(arn),
            |records: &Vec<ValidationRecord>| {
                records.len() == expected && records.iter().all(|r| r.record.is_some())
            },
            |records| {
                if records.len() == expected {
                    record_interval
                } else {
                    interval
                }
            },
        )
        .await?;

        let mut attributes = Attributes::new();
        attributes.insert("Arn".to_string(), json!(arn));
        for ValidationRecord {
            domain_name,
            record,
        } in records
        {
            if let Some(record) = record {
                attributes.insert(format!("{domain_name}-RecordName"), json!(record.name));
                attributes.insert(format!("{domain_name}-RecordValue"), json!(record.value));
            }
        }
        Ok(attributes)
    }
}

impl<R, S> ResourceHandler for DnsCertificateHandler<R, S>
where
    R: RegionalClients,
    R::Client: CertificateOperations,
    S: Sleeper,
{
    fn kind(&self) -> ResourceKind {
        ResourceKind::DnsCertificate
    }

    async fn create(&self, event: &ResourceEvent) -> Result<Reconciled, ReconcileError> {
        let properties: DnsCertificateProperties = decode(&event.resource_properties)?;
        let client = self.clients.client_for(event.region());

        let arn = client
            .request_certificate(&properties.domain_name, &properties.subject_alternative_names)
            .await?;
        info!(domain = %properties.domain_name, arn = %arn, "Requested certificate");

        client
            .add_tags(&arn, &properties.tags)
            .await
            .with_physical_id(&arn)?;

        let attributes = self
            .attributes(&client, &arn, properties.expected_records())
            .await
            .with_physical_id(&arn)?;
        Ok(Reconciled::new(arn).with_attributes(attributes))
    }

    fn plan_update(&self, event: &ResourceEvent) -> Result<UpdatePlan, ReconcileError> {
        let new: DnsCertificateProperties = decode(&event.resource_properties)?;
        let old: DnsCertificateProperties = decode(&event.old_resource_properties)?;

        let only_tags_changed = new.domain_name == old.domain_name
            && is_same_region(&event.stack_id, &old.region, &new.region)
            && same_names(&new.subject_alternative_names, &old.subject_alternative_names);

        if only_tags_changed {
            Ok(UpdatePlan::InPlace)
        } else {
            Ok(UpdatePlan::Replace)
        }
    }

    async fn update_in_place(&self, event: &ResourceEvent) -> Result<Attributes, ReconcileError> {
        let properties: DnsCertificateProperties = decode(&event.resource_properties)?;
        let arn = &event.physical_resource_id;
        let client = self.clients.client_for(event.region());

        let existing = client.list_tags(arn).await?;
        client.remove_tags(arn, &existing).await?;
        client.add_tags(arn, &properties.tags).await?;
        info!(arn = %arn, tags = properties.tags.len(), "Replaced certificate tags");

        Ok(self
            .attributes(&client, arn, properties.expected_records())
            .await?)
    }

    async fn delete(&self, event: &ResourceEvent) -> Result<(), ReconcileError> {
        let arn = &event.physical_resource_id;
        self.clients
            .client_for(event.region())
            .delete_certificate(arn)
            .await?;
        info!(arn = %arn, "Deleted certificate");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::DnsRecord;
    use crate::lifecycle::reconcile;
    use crate::testing::{FakeCertificates, RecordingSleeper};
    use hyperdrive_common::{Properties, RequestType};
    use std::time::Duration;

    const STACK_ID: &str =
        "arn:aws:cloudformation:us-west-2:123456789012:stack/teststack/51af3dc0-da77-11e4-872e-1234567db123";
    const ARN: &str = "arn:aws:acm:us-east-1:123456789012:certificate/0f2e7a1b";

    fn poll() -> PollConfig {
        PollConfig {
            max_attempts: 5,
            interval: Duration::from_secs(1),
            record_interval: Duration::from_secs(3),
        }
    }

    fn handler(
        certificates: &FakeCertificates,
        sleeper: &RecordingSleeper,
    ) -> DnsCertificateHandler<FakeCertificates, RecordingSleeper> {
        DnsCertificateHandler::new(certificates.clone(), sleeper.clone(), poll())
    }

    fn pending(domain: &str) -> ValidationRecord {
        ValidationRecord {
            domain_name: domain.to_string(),
            record: None,
        }
    }

    fn ready(domain: &str) -> ValidationRecord {
        ValidationRecord {
            domain_name: domain.to_string(),
            record: Some(DnsRecord {
                name: format!("_x1.{domain}."),
                value: format!("_y1.{domain}.acm-validations.aws."),
            }),
        }
    }

    fn props(domain: &str, region: &str, sans: &[&str], tags: &[(&str, &str)]) -> Properties {
        let mut props = Properties::new();
        props.insert("DomainName".to_string(), json!(domain));
        props.insert("Region".to_string(), json!(region));
        props.insert("SubjectAlternativeNames".to_string(), json!(sans));
        let tags: Vec<_> = tags
            .iter()
            .map(|(k, v)| json!({"Key": k, "Value": v}))
            .collect();
        props.insert("Tags".to_string(), json!(tags));
        props
    }

    fn event(request_type: RequestType, physical_id: &str) -> ResourceEvent {
        ResourceEvent::new(request_type, "MyCertificate", STACK_ID).with_physical_id(physical_id)
    }

    #[tokio::test]
    async fn test_create_waits_for_records() {
        let certificates = FakeCertificates::new(ARN).with_validation(vec![
            vec![],
            vec![pending("example.com")],
            vec![pending("example.com"), pending("www.example.com")],
            vec![ready("example.com"), ready("www.example.com")],
        ]);
        let sleeper = RecordingSleeper::default();
        let create = event(RequestType::Create, "").with_properties(props(
            "example.com",
            "us-east-1",
            &["www.example.com"],
            &[("team", "web")],
        ));

        let outcome = reconcile(&handler(&certificates, &sleeper), &create).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.physical_id, ARN);
        assert_eq!(outcome.attributes["Arn"], ARN);
        assert_eq!(
            outcome.attributes["www.example.com-RecordName"],
            "_x1.www.example.com."
        );
        assert_eq!(
            outcome.attributes["example.com-RecordValue"],
            "_y1.example.com.acm-validations.aws."
        );
        assert_eq!(certificates.regions(), vec![Some("us-east-1".to_string())]);
        assert_eq!(certificates.tags(), vec![CertificateTag::new("team", "web")]);
        assert_eq!(
            sleeper.sleeps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(1),
                Duration::from_secs(3)
            ]
        );
    }

    #[test]
    fn test_repeated_names_share_a_record() {
        let properties: DnsCertificateProperties = decode(&props(
            "example.com",
            "",
            &["www.example.com", "example.com", "www.example.com"],
            &[],
        ))
        .unwrap();
        assert_eq!(properties.expected_records(), 2);
    }

    #[tokio::test]
    async fn test_san_equal_to_domain_is_not_counted() {
        let certificates =
            FakeCertificates::new(ARN).with_validation(vec![vec![ready("example.com")]]);
        let sleeper = RecordingSleeper::default();
        let create = event(RequestType::Create, "").with_properties(props(
            "example.com",
            "",
            &["example.com"],
            &[],
        ));

        let outcome = reconcile(&handler(&certificates, &sleeper), &create).await;

        assert!(outcome.is_success());
        assert_eq!(certificates.describes(), 1);
        assert_eq!(certificates.regions(), vec![Some("us-west-2".to_string())]);
    }

    #[tokio::test]
    async fn test_timeout_reports_arn() {
        let certificates =
            FakeCertificates::new(ARN).with_validation(vec![vec![pending("example.com")]]);
        let sleeper = RecordingSleeper::default();
        let create = event(RequestType::Create, "")
            .with_properties(props("example.com", "", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &create).await;

        // The certificate exists, so the rollback must be able to delete it
        assert_eq!(outcome.physical_id, ARN);
        assert!(outcome.error.unwrap().contains("timed out"));
        assert_eq!(certificates.describes(), 5);
        assert_eq!(sleeper.sleeps().len(), 4);
    }

    #[tokio::test]
    async fn test_missing_domain_fails_without_request() {
        let certificates = FakeCertificates::new(ARN);
        let sleeper = RecordingSleeper::default();
        let create = event(RequestType::Create, "").with_properties(props("", "", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &create).await;

        assert_eq!(outcome.physical_id, "failure-MyCertificate");
        assert!(certificates.requests().is_empty());
    }

    #[tokio::test]
    async fn test_tag_update_in_place() {
        let certificates = FakeCertificates::new(ARN)
            .with_tags(vec![CertificateTag::new("team", "web")])
            .with_validation(vec![vec![ready("example.com"), ready("www.example.com")]]);
        let sleeper = RecordingSleeper::default();
        // Implicit region to the stack's explicit region is no move
        let update = event(RequestType::Update, ARN)
            .with_properties(props(
                "example.com",
                "us-west-2",
                &["www.example.com", "example.com"],
                &[("team", "platform")],
            ))
            .with_old_properties(props(
                "example.com",
                "",
                &["www.example.com"],
                &[("team", "web")],
            ));

        let outcome = reconcile(&handler(&certificates, &sleeper), &update).await;

        assert!(outcome.is_success(), "{:?}", outcome.error);
        assert_eq!(outcome.physical_id, ARN);
        assert_eq!(certificates.tags(), vec![CertificateTag::new("team", "platform")]);
        assert!(certificates.requests().is_empty());
        assert!(outcome.attributes.contains_key("www.example.com-RecordName"));
    }

    #[tokio::test]
    async fn test_domain_update_replaces() {
        let new_arn = "arn:aws:acm:us-west-2:123456789012:certificate/new";
        let certificates =
            FakeCertificates::new(new_arn).with_validation(vec![vec![ready("example.org")]]);
        let sleeper = RecordingSleeper::default();
        let update = event(RequestType::Update, ARN)
            .with_properties(props("example.org", "", &[], &[]))
            .with_old_properties(props("example.com", "", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &update).await;

        assert_eq!(outcome.physical_id, new_arn);
        assert_eq!(
            certificates.requests(),
            vec![("example.org".to_string(), vec![])]
        );
    }

    #[tokio::test]
    async fn test_region_move_replaces() {
        let certificates =
            FakeCertificates::new(ARN).with_validation(vec![vec![ready("example.com")]]);
        let sleeper = RecordingSleeper::default();
        let update = event(RequestType::Update, ARN)
            .with_properties(props("example.com", "us-east-1", &[], &[]))
            .with_old_properties(props("example.com", "", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &update).await;

        assert!(outcome.is_success());
        assert_eq!(certificates.requests().len(), 1);
        assert_eq!(certificates.regions(), vec![Some("us-east-1".to_string())]);
    }

    #[tokio::test]
    async fn test_delete_in_property_region() {
        let certificates = FakeCertificates::new(ARN);
        let sleeper = RecordingSleeper::default();
        let delete = event(RequestType::Delete, ARN)
            .with_properties(props("example.com", "us-east-1", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &delete).await;

        assert!(outcome.is_success());
        assert_eq!(certificates.deleted(), vec![ARN.to_string()]);
        assert_eq!(certificates.regions(), vec![Some("us-east-1".to_string())]);
    }

    #[tokio::test]
    async fn test_implicit_region_uses_stack_region() {
        let certificates =
            FakeCertificates::new(ARN).with_validation(vec![vec![ready("example.com")]]);
        let sleeper = RecordingSleeper::default();
        let update = event(RequestType::Update, ARN)
            .with_properties(props("example.com", "", &[], &[("team", "web")]))
            .with_old_properties(props("example.com", "us-west-2", &[], &[]));

        let outcome = reconcile(&handler(&certificates, &sleeper), &update).await;

        assert!(outcome.is_success());
        assert!(certificates.requests().is_empty());
        assert_eq!(certificates.regions(), vec![Some("us-west-2".to_string())]);
    }
}
