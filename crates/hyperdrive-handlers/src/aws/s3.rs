//! S3 object versions, listed and deleted page by page

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::bulk_delete::{Page, PagedSource};
use anyhow::{Context, Result};
use aws_sdk_s3::Client;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use std::future::Future;
use tracing::debug;

/// One version of an object, or a delete marker
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectId {
    pub key: String,
    pub version_id: Option<String>,
}

impl ObjectId {
    pub fn new(key: impl Into<String>, version_id: Option<&str>) -> Self {
        Self {
            key: key.into(),
            version_id: version_id.map(str::to_string),
        }
    }
}

/// Where a version listing continues
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionMarker {
    pub key_marker: Option<String>,
    pub version_id_marker: Option<String>,
}

/// Bucket operations used by the S3 cleanup handler
pub trait BucketOperations: Send + Sync {
    /// One page of object versions and delete markers under `prefix`
    fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> impl Future<Output = Result<Page<ObjectId, VersionMarker>>> + Send;

    /// Delete up to 1000 object versions in one call
    fn delete_objects(
        &self,
        bucket: &str,
        objects: Vec<ObjectId>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// S3 client
pub struct S3Client {
    client: Client,
}

impl FromAwsContext for S3Client {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.s3_client(),
        }
    }
}

impl BucketOperations for S3Client {
    async fn list_object_versions(
        &self,
        bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> Result<Page<ObjectId, VersionMarker>> {
        let (key_marker, version_id_marker) = marker
            .map(|m| (m.key_marker, m.version_id_marker))
            .unwrap_or_default();

        let output = self
            .client
            .list_object_versions()
            .bucket(bucket)
            .set_prefix((!prefix.is_empty()).then(|| prefix.to_string()))
            .set_key_marker(key_marker)
            .set_version_id_marker(version_id_marker)
            .send()
            .await
            .with_context(|| format!("could not fetch versions for the bucket {bucket}"))?;

        let versions = output
            .versions()
            .iter()
            .filter_map(|v| v.key().map(|key| ObjectId::new(key, v.version_id())));
        let markers = output
            .delete_markers()
            .iter()
            .filter_map(|m| m.key().map(|key| ObjectId::new(key, m.version_id())));

        let is_truncated = output.is_truncated().unwrap_or(false);
        Ok(Page {
            items: versions.chain(markers).collect(),
            next_cursor: is_truncated.then(|| VersionMarker {
                key_marker: output.next_key_marker().map(str::to_string),
                version_id_marker: output.next_version_id_marker().map(str::to_string),
            }),
            is_truncated,
        })
    }

    async fn delete_objects(&self, bucket: &str, objects: Vec<ObjectId>) -> Result<()> {
        let identifiers = objects
            .into_iter()
            .map(|object| {
                ObjectIdentifier::builder()
                    .key(object.key)
                    .set_version_id(object.version_id)
                    .build()
                    .context("invalid object identifier")
            })
            .collect::<Result<Vec<_>>>()?;
        let count = identifiers.len();

        let delete = Delete::builder()
            .set_objects(Some(identifiers))
            .quiet(true)
            .build()
            .context("invalid delete request")?;

        let output = self
            .client
            .delete_objects()
            .bucket(bucket)
            .delete(delete)
            .send()
            .await
            .with_context(|| format!("could not delete objects from the s3 bucket {bucket}"))?;

        if let Some(error) = output.errors().first() {
            anyhow::bail!(
                "could not delete {} from the s3 bucket {bucket}: {} {}",
                error.key().unwrap_or_default(),
                error.code().unwrap_or_default(),
                error.message().unwrap_or_default()
            );
        }

        debug!(bucket = %bucket, count, "Deleted object versions");
        Ok(())
    }
}

/// All versions under a prefix of a bucket, as a deletable listing
pub struct BucketVersions<'a, B> {
    client: &'a B,
    bucket: &'a str,
    prefix: &'a str,
}

impl<'a, B: BucketOperations> BucketVersions<'a, B> {
    pub fn new(client: &'a B, bucket: &'a str, prefix: &'a str) -> Self {
        Self {
            client,
            bucket,
            prefix,
        }
    }
}

impl<B: BucketOperations> PagedSource for BucketVersions<'_, B> {
    type Item = ObjectId;
    type Cursor = VersionMarker;

    fn list(
        &self,
        cursor: Option<VersionMarker>,
    ) -> impl Future<Output = Result<Page<ObjectId, VersionMarker>>> + Send {
        self.client
            .list_object_versions(self.bucket, self.prefix, cursor)
    }

    fn delete_batch(&self, items: Vec<ObjectId>) -> impl Future<Output = Result<()>> + Send {
        self.client.delete_objects(self.bucket, items)
    }
}
