//! Cursor-following deletion of paged result sets.
//!
//! Containers such as buckets and repositories refuse to be destroyed while
//! they still hold items, and list their items one page at a time. The
//! deleter lists a page, deletes whatever it holds and follows the cursor
//! until the source reports that no more pages exist.

use anyhow::{Result, bail};
use std::future::Future;
use tracing::{debug, info};

/// One page of a listing
#[derive(Debug, Clone, PartialEq)]
pub struct Page<T, C> {
    pub items: Vec<T>,
    /// Where the next page starts, when `is_truncated` is set
    pub next_cursor: Option<C>,
    pub is_truncated: bool,
}

impl<T, C> Page<T, C> {
    /// The final page of a listing
    pub fn last(items: Vec<T>) -> Self {
        Self {
            items,
            next_cursor: None,
            is_truncated: false,
        }
    }

    /// A page followed by more items starting at `cursor`
    pub fn truncated(items: Vec<T>, cursor: C) -> Self {
        Self {
            items,
            next_cursor: Some(cursor),
            is_truncated: true,
        }
    }
}

/// A listing that can delete what it lists
pub trait PagedSource: Send + Sync {
    type Item: Send;
    type Cursor: Send;

    /// List the page starting at `cursor`, or the first page for `None`
    fn list(
        &self,
        cursor: Option<Self::Cursor>,
    ) -> impl Future<Output = Result<Page<Self::Item, Self::Cursor>>> + Send;

    /// Delete every item of one page
    fn delete_batch(&self, items: Vec<Self::Item>) -> impl Future<Output = Result<()>> + Send;
}

/// Summary of a bulk deletion
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BulkDeleteReport {
    /// Pages listed
    pub pages: usize,
    /// Delete calls issued
    pub batches: usize,
    /// Items deleted
    pub deleted: usize,
}

/// Delete everything `source` lists, following cursors page by page.
///
/// Empty pages are skipped without a delete call. Errors of either call
/// abort the deletion and are returned unchanged.
pub async fn delete_all<P: PagedSource>(source: &P, container: &str) -> Result<BulkDeleteReport> {
    let mut report = BulkDeleteReport::default();
    let mut cursor = None;

    loop {
        let page = source.list(cursor).await?;
        report.pages += 1;

        if !page.items.is_empty() {
            let count = page.items.len();
            debug!(container = %container, page = report.pages, count, "Deleting page");
            source.delete_batch(page.items).await?;
            report.batches += 1;
            report.deleted += count;
        }

        if !page.is_truncated {
            break;
        }
        match page.next_cursor {
            Some(next) => cursor = Some(next),
            None => bail!("listing of {container} is truncated but has no cursor"),
        }
    }

    info!(
        container = %container,
        pages = report.pages,
        deleted = report.deleted,
        "Emptied container"
    );
    Ok(report)
}
