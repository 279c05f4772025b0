//! ACM certificates validated through DNS

use crate::aws::context::{AwsContext, FromAwsContext};
use anyhow::{Context, Result};
use aws_sdk_acm::Client;
use aws_sdk_acm::operation::request_certificate::builders::RequestCertificateFluentBuilder;
use aws_sdk_acm::types::{Tag, ValidationMethod};
use hyperdrive_common::event::lenient;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info};

/// A certificate tag, as written in templates
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct CertificateTag {
    #[serde(deserialize_with = "lenient::string")]
    pub key: String,
    #[serde(deserialize_with = "lenient::string", default)]
    pub value: String,
}

impl CertificateTag {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

/// The DNS record proving control over one domain of a certificate
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationRecord {
    pub domain_name: String,
    /// `None` until ACM has generated the record
    pub record: Option<DnsRecord>,
}

/// Name and value of a validation CNAME
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DnsRecord {
    pub name: String,
    pub value: String,
}

/// Certificate operations used by the DNS certificate handler
pub trait CertificateOperations: Send + Sync {
    /// Request a DNS validated certificate and return its ARN
    fn request_certificate(
        &self,
        domain_name: &str,
        alternative_names: &[String],
    ) -> impl Future<Output = Result<String>> + Send;

    fn add_tags(&self, arn: &str, tags: &[CertificateTag])
    -> impl Future<Output = Result<()>> + Send;

    fn list_tags(&self, arn: &str) -> impl Future<Output = Result<Vec<CertificateTag>>> + Send;

    fn remove_tags(
        &self,
        arn: &str,
        tags: &[CertificateTag],
    ) -> impl Future<Output = Result<()>> + Send;

    /// The validation records known so far, one per validated domain
    fn describe_validation(
        &self,
        arn: &str,
    ) -> impl Future<Output = Result<Vec<ValidationRecord>>> + Send;

    fn delete_certificate(&self, arn: &str) -> impl Future<Output = Result<()>> + Send;
}

/// ACM client
pub struct AcmClient {
    client: Client,
}

impl FromAwsContext for AcmClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.acm_client(),
        }
    }
}

impl AcmClient {
    /// ACM logs every public certificate to certificate transparency
    fn certificate_request(
        &self,
        domain_name: &str,
        alternative_names: &[String],
    ) -> RequestCertificateFluentBuilder {
        let request = self
            .client
            .request_certificate()
            .domain_name(domain_name)
            .validation_method(ValidationMethod::Dns);
        if alternative_names.is_empty() {
            request
        } else {
            request.set_subject_alternative_names(Some(alternative_names.to_vec()))
        }
    }
}

fn sdk_tags(tags: &[CertificateTag]) -> Result<Vec<Tag>> {
    tags.iter()
        .map(|tag| {
            Tag::builder()
                .key(&tag.key)
                .value(&tag.value)
                .build()
                .with_context(|| format!("invalid tag {}", tag.key))
        })
        .collect()
}

impl CertificateOperations for AcmClient {
    async fn request_certificate(
        &self,
        domain_name: &str,
        alternative_names: &[String],
    ) -> Result<String> {
        info!(domain = %domain_name, alternative_names = ?alternative_names, "Requesting certificate");

        let output = self
            .certificate_request(domain_name, alternative_names)
            .send()
            .await
            .context("could not create the certificate")?;
        output
            .certificate_arn()
            .map(str::to_string)
            .context("certificate request returned no ARN")
    }

    async fn add_tags(&self, arn: &str, tags: &[CertificateTag]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .add_tags_to_certificate()
            .certificate_arn(arn)
            .set_tags(Some(sdk_tags(tags)?))
            .send()
            .await
            .with_context(|| format!("could not add tags to certificate {arn}"))?;
        Ok(())
    }

    async fn list_tags(&self, arn: &str) -> Result<Vec<CertificateTag>> {
        let output = self
            .client
            .list_tags_for_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .with_context(|| format!("could not list tags for certificate {arn}"))?;

        Ok(output
            .tags()
            .iter()
            .map(|tag| CertificateTag::new(tag.key(), tag.value().unwrap_or_default()))
            .collect())
    }

    async fn remove_tags(&self, arn: &str, tags: &[CertificateTag]) -> Result<()> {
        if tags.is_empty() {
            return Ok(());
        }
        self.client
            .remove_tags_from_certificate()
            .certificate_arn(arn)
            .set_tags(Some(sdk_tags(tags)?))
            .send()
            .await
            .with_context(|| format!("could not remove tags for certificate {arn}"))?;
        Ok(())
    }

    async fn describe_validation(&self, arn: &str) -> Result<Vec<ValidationRecord>> {
        let output = self
            .client
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .with_context(|| format!("could not fetch certificate {arn}"))?;

        let records: Vec<ValidationRecord> = output
            .certificate()
            .map(|detail| detail.domain_validation_options())
            .unwrap_or_default()
            .iter()
            .map(|option| ValidationRecord {
                domain_name: option.domain_name().to_string(),
                record: option.resource_record().map(|record| DnsRecord {
                    name: record.name().to_string(),
                    value: record.value().to_string(),
                }),
            })
            .collect();

        debug!(certificate = %arn, records = records.len(), "Described certificate");
        Ok(records)
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        info!(certificate = %arn, "Deleting certificate");
        self.client
            .delete_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .with_context(|| format!("could not delete the certificate {arn}"))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_acm::config::{BehaviorVersion, Region};
    use serde_json::json;

    #[test]
    fn test_certificate_request_is_dns_validated() {
        let config = aws_sdk_acm::Config::builder()
            .behavior_version(BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .build();
        let acm = AcmClient {
            client: Client::from_conf(config),
        };

        let request = acm.certificate_request("example.com", &["www.example.com".to_string()]);
        let input = request.as_input();
        assert_eq!(input.get_domain_name().as_deref(), Some("example.com"));
        assert_eq!(input.get_validation_method(), &Some(ValidationMethod::Dns));
        assert_eq!(
            input.get_subject_alternative_names(),
            &Some(vec!["www.example.com".to_string()])
        );
        assert!(input.get_options().is_none());

        let bare = acm.certificate_request("example.com", &[]);
        assert!(bare.as_input().get_subject_alternative_names().is_none());
    }

    #[test]
    fn test_tag_from_template() {
        let tags: Vec<CertificateTag> = serde_json::from_value(json!([
            {"Key": "team", "Value": "web"},
            {"Key": "build", "Value": 42},
            {"Key": "empty"}
        ]))
        .unwrap();

        assert_eq!(
            tags,
            vec![
                CertificateTag::new("team", "web"),
                CertificateTag::new("build", "42"),
                CertificateTag::new("empty", ""),
            ]
        );
    }

    #[test]
    fn test_sdk_tags() {
        let tags = sdk_tags(&[CertificateTag::new("team", "web")]).unwrap();
        assert_eq!(tags[0].key(), "team");
        assert_eq!(tags[0].value(), Some("web"));
    }
}
