//! ECR repository images, listed and deleted page by page

use crate::aws::context::{AwsContext, FromAwsContext};
use crate::bulk_delete::{Page, PagedSource};
use anyhow::{Context, Result};
use aws_sdk_ecr::Client;
use aws_sdk_ecr::types::{ImageFailureCode, ImageIdentifier};
use std::future::Future;
use tracing::{debug, warn};

/// Images listed per page
const LIST_IMAGES_PAGE_SIZE: i32 = 100;

/// An image, by digest and/or tag
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageId {
    pub digest: Option<String>,
    pub tag: Option<String>,
}

impl ImageId {
    pub fn digest(digest: impl Into<String>) -> Self {
        Self {
            digest: Some(digest.into()),
            tag: None,
        }
    }
}

/// Repository operations used by the ECR cleanup handler
pub trait RepositoryOperations: Send + Sync {
    /// One page of images; the page is the last one when no token is returned
    fn list_images(
        &self,
        repository: &str,
        next_token: Option<String>,
    ) -> impl Future<Output = Result<Page<ImageId, String>>> + Send;

    fn batch_delete_image(
        &self,
        repository: &str,
        images: Vec<ImageId>,
    ) -> impl Future<Output = Result<()>> + Send;
}

/// ECR client
pub struct EcrClient {
    client: Client,
}

impl FromAwsContext for EcrClient {
    fn from_context(ctx: &AwsContext) -> Self {
        Self {
            client: ctx.ecr_client(),
        }
    }
}

impl RepositoryOperations for EcrClient {
    async fn list_images(
        &self,
        repository: &str,
        next_token: Option<String>,
    ) -> Result<Page<ImageId, String>> {
        let output = self
            .client
            .list_images()
            .repository_name(repository)
            .max_results(LIST_IMAGES_PAGE_SIZE)
            .set_next_token(next_token)
            .send()
            .await
            .with_context(|| format!("could not fetch images for the repository {repository}"))?;

        let items = output
            .image_ids()
            .iter()
            .map(|id| ImageId {
                digest: id.image_digest().map(str::to_string),
                tag: id.image_tag().map(str::to_string),
            })
            .collect();

        Ok(match output.next_token() {
            Some(token) => Page::truncated(items, token.to_string()),
            None => Page::last(items),
        })
    }

    async fn batch_delete_image(&self, repository: &str, images: Vec<ImageId>) -> Result<()> {
        let count = images.len();
        let ids = images
            .into_iter()
            .map(|image| {
                ImageIdentifier::builder()
                    .set_image_digest(image.digest)
                    .set_image_tag(image.tag)
                    .build()
            })
            .collect();

        let output = self
            .client
            .batch_delete_image()
            .repository_name(repository)
            .set_image_ids(Some(ids))
            .send()
            .await
            .with_context(|| format!("could not delete images from the repository {repository}"))?;

        for failure in output.failures() {
            // Tags go away together with the digest they point to
            if failure.failure_code() == Some(&ImageFailureCode::ImageNotFound) {
                warn!(repository = %repository, image = ?failure.image_id(), "Image already deleted");
                continue;
            }
            anyhow::bail!(
                "could not delete image {:?} from the repository {repository}: {}",
                failure.image_id(),
                failure.failure_reason().unwrap_or_default()
            );
        }

        debug!(repository = %repository, count, "Deleted images");
        Ok(())
    }
}

/// All images of a repository, as a deletable listing
pub struct RepositoryImages<'a, R> {
    client: &'a R,
    repository: &'a str,
}

impl<'a, R: RepositoryOperations> RepositoryImages<'a, R> {
    pub fn new(client: &'a R, repository: &'a str) -> Self {
        Self { client, repository }
    }
}

impl<R: RepositoryOperations> PagedSource for RepositoryImages<'_, R> {
    type Item = ImageId;
    type Cursor = String;

    fn list(
        &self,
        cursor: Option<String>,
    ) -> impl Future<Output = Result<Page<ImageId, String>>> + Send {
        self.client.list_images(self.repository, cursor)
    }

    fn delete_batch(&self, items: Vec<ImageId>) -> impl Future<Output = Result<()>> + Send {
        self.client.batch_delete_image(self.repository, items)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bulk_delete::delete_all;
    use crate::testing::FakeRepository;

    #[tokio::test]
    async fn test_repository_images_follow_tokens() {
        let repository = FakeRepository::with_images(
            (0..250).map(|i| ImageId::digest(format!("sha256:{i:064}"))),
        );
        let report = delete_all(&RepositoryImages::new(&repository, "web"), "web")
            .await
            .unwrap();

        assert_eq!(report.pages, 3);
        assert_eq!(report.deleted, 250);
        assert_eq!(repository.remaining(), 0);
    }

    #[tokio::test]
    async fn test_empty_repository() {
        let repository = FakeRepository::with_images(std::iter::empty());
        let report = delete_all(&RepositoryImages::new(&repository, "web"), "web")
            .await
            .unwrap();

        assert_eq!(report.pages, 1);
        assert_eq!(report.batches, 0);
        assert_eq!(repository.deletes(), 0);
    }
}
