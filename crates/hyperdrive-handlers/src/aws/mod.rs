//! AWS client modules for the resource handlers
//!
//! Every client wraps one SDK client and implements an `*Operations` trait
//! so that handlers can be exercised against in-memory fakes:
//! - ACM: DNS validated certificates
//! - CloudFormation: stack status lookups
//! - CloudWatch Logs: log groups
//! - ECR: repository image listing and deletion
//! - S3: object version listing and deletion
//! - SSM: the versioned parameters backing sequences

pub mod acm;
pub mod cloudformation;
pub mod context;
pub mod ecr;
pub mod error;
pub mod logs;
pub mod s3;
pub mod ssm;

pub use acm::{AcmClient, CertificateOperations, CertificateTag, DnsRecord, ValidationRecord};
pub use cloudformation::{CloudFormationClient, StackOperations};
pub use context::{AwsContext, FromAwsContext, Regional, RegionalClients};
pub use ecr::{EcrClient, ImageId, RepositoryImages, RepositoryOperations};
pub use error::{AwsError, classify_anyhow_error, classify_aws_error, classify_sdk_error};
pub use logs::{LogGroupOperations, LogGroupTags, LogsClient};
pub use s3::{BucketOperations, BucketVersions, ObjectId, S3Client, VersionMarker};
pub use ssm::{ParameterOperations, SsmClient};
