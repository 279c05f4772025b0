//! In-memory fakes of the AWS operations.
//!
//! Every fake is cheaply cloneable and clones share state, so a test can
//! hand one clone to a handler and inspect another afterwards.

use crate::aws::{
    AwsError, BucketOperations, CertificateOperations, CertificateTag, ImageId, LogGroupOperations,
    LogGroupTags, ObjectId, ParameterOperations, RegionalClients, RepositoryOperations,
    StackOperations, ValidationRecord, VersionMarker,
};
use crate::bulk_delete::{Page, PagedSource};
use crate::sequence::SequenceParameter;
use crate::wait::Sleeper;
use anyhow::{Context, Result, anyhow, bail};
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records requested delays and yields instead of sleeping
#[derive(Debug, Clone, Default)]
pub struct RecordingSleeper {
    sleeps: Arc<Mutex<Vec<Duration>>>,
}

impl RecordingSleeper {
    pub fn sleeps(&self) -> Vec<Duration> {
        lock(&self.sleeps).clone()
    }
}

impl Sleeper for RecordingSleeper {
    async fn sleep(&self, duration: Duration) {
        lock(&self.sleeps).push(duration);
        tokio::task::yield_now().await;
    }
}

#[derive(Debug, Default)]
struct ParameterState {
    /// Every value ever written, version `n` at index `n - 1`
    history: HashMap<String, Vec<String>>,
    throttle: u32,
    unthrottled: u32,
    interleaved: HashMap<String, Vec<String>>,
}

/// Versioned parameters with SSM's versioning rules.
///
/// Calls yield to the scheduler before touching state, so concurrent
/// callers interleave between their read and their write.
#[derive(Debug, Clone, Default)]
pub struct InMemoryParameters {
    state: Arc<Mutex<ParameterState>>,
}

impl InMemoryParameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parameter(self, name: &str, value: &str) -> Self {
        lock(&self.state)
            .history
            .insert(name.to_string(), vec![value.to_string()]);
        self
    }

    /// The latest value of `name`
    pub fn value(&self, name: &str) -> Option<String> {
        lock(&self.state)
            .history
            .get(name)
            .and_then(|h| h.last().cloned())
    }

    /// All values of `name`, oldest first
    pub fn history(&self, name: &str) -> Vec<String> {
        lock(&self.state)
            .history
            .get(name)
            .cloned()
            .unwrap_or_default()
    }

    /// Fail the next `calls` calls with a throttling error
    pub fn throttle_next(&self, calls: u32) {
        lock(&self.state).throttle = calls;
    }

    /// Let `skip` calls through, then fail the following `calls` calls
    /// with a throttling error
    pub fn throttle_after(&self, skip: u32, calls: u32) {
        let mut state = lock(&self.state);
        state.unthrottled = skip;
        state.throttle = calls;
    }

    /// Write `values` to `name` right before the next overwrite of it, as
    /// if another caller got there first
    pub fn interleave_before_next_write(&self, name: &str, values: &[&str]) {
        lock(&self.state).interleaved.insert(
            name.to_string(),
            values.iter().map(|v| v.to_string()).collect(),
        );
    }

    async fn enter(&self) -> Result<MutexGuard<'_, ParameterState>> {
        tokio::task::yield_now().await;
        let mut state = lock(&self.state);
        if state.unthrottled > 0 {
            state.unthrottled -= 1;
        } else if state.throttle > 0 {
            state.throttle -= 1;
            return Err(AwsError::Throttled).context("rate exceeded");
        }
        Ok(state)
    }
}

fn not_found(name: &str) -> anyhow::Error {
    anyhow::Error::new(AwsError::NotFound {
        message: format!("parameter {name} not found"),
    })
}

impl ParameterOperations for InMemoryParameters {
    async fn get_parameter(&self, name: &str) -> Result<SequenceParameter> {
        let state = self.enter().await?;
        let history = state.history.get(name).ok_or_else(|| not_found(name))?;
        Ok(SequenceParameter {
            name: name.to_string(),
            value: history.last().cloned().unwrap_or_default(),
            version: history.len() as i64,
        })
    }

    async fn get_parameter_version(&self, name: &str, version: i64) -> Result<SequenceParameter> {
        let state = self.enter().await?;
        let value = state
            .history
            .get(name)
            .and_then(|h| usize::try_from(version - 1).ok().and_then(|i| h.get(i)))
            .ok_or_else(|| not_found(&format!("{name}:{version}")))?;
        Ok(SequenceParameter {
            name: name.to_string(),
            value: value.clone(),
            version,
        })
    }

    async fn create_parameter(&self, name: &str, value: &str) -> Result<i64> {
        let mut state = self.enter().await?;
        if state.history.contains_key(name) {
            return Err(AwsError::AlreadyExists {
                message: format!("parameter {name} already exists"),
            }
            .into());
        }
        state
            .history
            .insert(name.to_string(), vec![value.to_string()]);
        Ok(1)
    }

    async fn overwrite_parameter(&self, name: &str, value: &str) -> Result<i64> {
        let mut state = self.enter().await?;
        let interleaved = state.interleaved.remove(name).unwrap_or_default();
        let history = state
            .history
            .get_mut(name)
            .ok_or_else(|| not_found(name))?;
        history.extend(interleaved);
        history.push(value.to_string());
        Ok(history.len() as i64)
    }

    async fn delete_parameter(&self, name: &str) -> Result<()> {
        self.enter().await?.history.remove(name);
        Ok(())
    }
}

/// Pages served in order; records cursors and deleted batches
pub struct PagedFake<T, C = u32> {
    pages: Mutex<VecDeque<Page<T, C>>>,
    cursors: Mutex<Vec<Option<C>>>,
    deleted: Mutex<Vec<Vec<T>>>,
    fail_deletes: bool,
}

impl<T, C> PagedFake<T, C> {
    pub fn new(pages: Vec<Page<T, C>>) -> Self {
        Self {
            pages: Mutex::new(pages.into()),
            cursors: Mutex::new(Vec::new()),
            deleted: Mutex::new(Vec::new()),
            fail_deletes: false,
        }
    }

    pub fn failing_deletes(mut self) -> Self {
        self.fail_deletes = true;
        self
    }
}

impl<T: Clone, C: Clone> PagedFake<T, C> {
    pub fn cursors(&self) -> Vec<Option<C>> {
        lock(&self.cursors).clone()
    }

    pub fn deleted(&self) -> Vec<Vec<T>> {
        lock(&self.deleted).clone()
    }
}

impl<T: Send, C: Send> PagedSource for PagedFake<T, C> {
    type Item = T;
    type Cursor = C;

    async fn list(&self, cursor: Option<C>) -> Result<Page<T, C>> {
        lock(&self.cursors).push(cursor);
        lock(&self.pages)
            .pop_front()
            .context("listed past the last page")
    }

    async fn delete_batch(&self, items: Vec<T>) -> Result<()> {
        if self.fail_deletes {
            bail!("access denied");
        }
        lock(&self.deleted).push(items);
        Ok(())
    }
}

#[derive(Debug, Default)]
struct BucketState {
    objects: Vec<ObjectId>,
    page_size: usize,
}

/// A versioned bucket listing keys in order, `page_size` per page
#[derive(Debug, Clone, Default)]
pub struct FakeBucket {
    state: Arc<Mutex<BucketState>>,
}

impl FakeBucket {
    pub fn with_objects(objects: impl IntoIterator<Item = ObjectId>, page_size: usize) -> Self {
        let mut objects: Vec<ObjectId> = objects.into_iter().collect();
        objects.sort_by(|a, b| (&a.key, &a.version_id).cmp(&(&b.key, &b.version_id)));
        Self {
            state: Arc::new(Mutex::new(BucketState {
                objects,
                page_size: page_size.max(1),
            })),
        }
    }

    pub fn remaining(&self) -> Vec<ObjectId> {
        lock(&self.state).objects.clone()
    }
}

impl BucketOperations for FakeBucket {
    async fn list_object_versions(
        &self,
        _bucket: &str,
        prefix: &str,
        marker: Option<VersionMarker>,
    ) -> Result<Page<ObjectId, VersionMarker>> {
        tokio::task::yield_now().await;
        let state = lock(&self.state);
        let after = marker.map(|m| (m.key_marker.unwrap_or_default(), m.version_id_marker));

        let mut matching = state.objects.iter().filter(|o| {
            o.key.starts_with(prefix)
                && after
                    .as_ref()
                    .is_none_or(|(key, version)| (&o.key, &o.version_id) > (key, version))
        });
        let items: Vec<ObjectId> = matching.by_ref().take(state.page_size).cloned().collect();
        let more = matching.next().is_some();

        let marker = items.last().filter(|_| more).map(|last| VersionMarker {
            key_marker: Some(last.key.clone()),
            version_id_marker: last.version_id.clone(),
        });
        Ok(match marker {
            Some(marker) => Page::truncated(items, marker),
            None => Page::last(items),
        })
    }

    async fn delete_objects(&self, _bucket: &str, objects: Vec<ObjectId>) -> Result<()> {
        lock(&self.state).objects.retain(|o| !objects.contains(o));
        Ok(())
    }
}

#[derive(Debug, Default)]
struct RepositoryState {
    images: Vec<ImageId>,
    deletes: usize,
}

/// A repository listing 100 images per page
#[derive(Debug, Clone, Default)]
pub struct FakeRepository {
    state: Arc<Mutex<RepositoryState>>,
}

impl FakeRepository {
    const PAGE_SIZE: usize = 100;

    pub fn with_images(images: impl IntoIterator<Item = ImageId>) -> Self {
        let mut images: Vec<ImageId> = images.into_iter().collect();
        images.sort_by(|a, b| a.digest.cmp(&b.digest));
        Self {
            state: Arc::new(Mutex::new(RepositoryState { images, deletes: 0 })),
        }
    }

    pub fn remaining(&self) -> usize {
        lock(&self.state).images.len()
    }

    /// Number of batch delete calls
    pub fn deletes(&self) -> usize {
        lock(&self.state).deletes
    }
}

impl RepositoryOperations for FakeRepository {
    async fn list_images(
        &self,
        _repository: &str,
        next_token: Option<String>,
    ) -> Result<Page<ImageId, String>> {
        let state = lock(&self.state);
        let mut rest = state.images.iter().filter(|image| match &next_token {
            Some(token) => image.digest.as_deref() > Some(token.as_str()),
            None => true,
        });
        let items: Vec<ImageId> = rest.by_ref().take(Self::PAGE_SIZE).cloned().collect();
        let more = rest.next().is_some();

        let token = items.last().filter(|_| more).and_then(|last| last.digest.clone());
        Ok(match token {
            Some(token) => Page::truncated(items, token),
            None => Page::last(items),
        })
    }

    async fn batch_delete_image(&self, _repository: &str, images: Vec<ImageId>) -> Result<()> {
        let mut state = lock(&self.state);
        state.deletes += 1;
        state.images.retain(|image| !images.contains(image));
        Ok(())
    }
}

/// A stack in a fixed status
#[derive(Debug, Clone)]
pub struct FakeStacks {
    status: Arc<Mutex<String>>,
}

impl FakeStacks {
    pub fn with_status(status: &str) -> Self {
        Self {
            status: Arc::new(Mutex::new(status.to_string())),
        }
    }
}

impl StackOperations for FakeStacks {
    async fn stack_status(&self, _stack_id: &str) -> Result<String> {
        Ok(lock(&self.status).clone())
    }
}

#[derive(Debug, Default)]
struct CertificateState {
    arn: String,
    requests: Vec<(String, Vec<String>)>,
    regions: Vec<Option<String>>,
    tags: Vec<CertificateTag>,
    validation: VecDeque<Vec<ValidationRecord>>,
    describes: usize,
    deleted: Vec<String>,
}

/// ACM with scripted validation records.
///
/// Each describe call returns the next scripted record set; the last one
/// is repeated forever.
#[derive(Debug, Clone, Default)]
pub struct FakeCertificates {
    state: Arc<Mutex<CertificateState>>,
}

impl FakeCertificates {
    pub fn new(arn: &str) -> Self {
        let fake = Self::default();
        lock(&fake.state).arn = arn.to_string();
        fake
    }

    pub fn with_validation(self, script: Vec<Vec<ValidationRecord>>) -> Self {
        lock(&self.state).validation = script.into();
        self
    }

    pub fn with_tags(self, tags: Vec<CertificateTag>) -> Self {
        lock(&self.state).tags = tags;
        self
    }

    /// Domain and alternative names of every request
    pub fn requests(&self) -> Vec<(String, Vec<String>)> {
        lock(&self.state).requests.clone()
    }

    /// Region of every client handed out
    pub fn regions(&self) -> Vec<Option<String>> {
        lock(&self.state).regions.clone()
    }

    pub fn tags(&self) -> Vec<CertificateTag> {
        lock(&self.state).tags.clone()
    }

    pub fn describes(&self) -> usize {
        lock(&self.state).describes
    }

    pub fn deleted(&self) -> Vec<String> {
        lock(&self.state).deleted.clone()
    }
}

impl RegionalClients for FakeCertificates {
    type Client = FakeCertificates;

    fn client_for(&self, region: Option<&str>) -> FakeCertificates {
        lock(&self.state).regions.push(region.map(str::to_string));
        self.clone()
    }
}

impl CertificateOperations for FakeCertificates {
    async fn request_certificate(
        &self,
        domain_name: &str,
        alternative_names: &[String],
    ) -> Result<String> {
        let mut state = lock(&self.state);
        state
            .requests
            .push((domain_name.to_string(), alternative_names.to_vec()));
        Ok(state.arn.clone())
    }

    async fn add_tags(&self, _arn: &str, tags: &[CertificateTag]) -> Result<()> {
        lock(&self.state).tags.extend_from_slice(tags);
        Ok(())
    }

    async fn list_tags(&self, _arn: &str) -> Result<Vec<CertificateTag>> {
        Ok(lock(&self.state).tags.clone())
    }

    async fn remove_tags(&self, _arn: &str, tags: &[CertificateTag]) -> Result<()> {
        lock(&self.state).tags.retain(|tag| !tags.contains(tag));
        Ok(())
    }

    async fn describe_validation(&self, _arn: &str) -> Result<Vec<ValidationRecord>> {
        let mut state = lock(&self.state);
        state.describes += 1;
        let records = if state.validation.len() > 1 {
            state.validation.pop_front()
        } else {
            state.validation.front().cloned()
        };
        Ok(records.unwrap_or_default())
    }

    async fn delete_certificate(&self, arn: &str) -> Result<()> {
        lock(&self.state).deleted.push(arn.to_string());
        Ok(())
    }
}

/// A log group of [`FakeLogGroups`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeLogGroup {
    pub retention: Option<i32>,
    pub tags: LogGroupTags,
}

#[derive(Debug, Default)]
struct LogGroupState {
    groups: BTreeMap<String, FakeLogGroup>,
    regions: Vec<Option<String>>,
    calls: Vec<String>,
}

/// CloudWatch Logs keeping groups in memory
#[derive(Debug, Clone, Default)]
pub struct FakeLogGroups {
    state: Arc<Mutex<LogGroupState>>,
}

impl FakeLogGroups {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_group(self, name: &str, group: FakeLogGroup) -> Self {
        lock(&self.state).groups.insert(name.to_string(), group);
        self
    }

    pub fn group(&self, name: &str) -> Option<FakeLogGroup> {
        lock(&self.state).groups.get(name).cloned()
    }

    /// Region of every client handed out
    pub fn regions(&self) -> Vec<Option<String>> {
        lock(&self.state).regions.clone()
    }

    /// Names of the operations called, in order
    pub fn calls(&self) -> Vec<String> {
        lock(&self.state).calls.clone()
    }

    fn with_group_mut<T>(&self, call: &str, name: &str, f: impl FnOnce(&mut FakeLogGroup) -> T) -> Result<T> {
        let mut state = lock(&self.state);
        state.calls.push(call.to_string());
        let group = state
            .groups
            .get_mut(name)
            .ok_or_else(|| anyhow!("log group {name} does not exist"))?;
        Ok(f(group))
    }
}

impl RegionalClients for FakeLogGroups {
    type Client = FakeLogGroups;

    fn client_for(&self, region: Option<&str>) -> FakeLogGroups {
        lock(&self.state).regions.push(region.map(str::to_string));
        self.clone()
    }
}

impl LogGroupOperations for FakeLogGroups {
    async fn create_log_group(&self, name: &str, tags: &LogGroupTags) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("create".to_string());
        if state.groups.contains_key(name) {
            bail!("log group {name} already exists");
        }
        state.groups.insert(
            name.to_string(),
            FakeLogGroup {
                retention: None,
                tags: tags.clone(),
            },
        );
        Ok(())
    }

    async fn put_retention_policy(&self, name: &str, days: i32) -> Result<()> {
        self.with_group_mut("put_retention", name, |g| g.retention = Some(days))
    }

    async fn delete_retention_policy(&self, name: &str) -> Result<()> {
        self.with_group_mut("delete_retention", name, |g| g.retention = None)
    }

    async fn log_group_arn(&self, name: &str) -> Result<String> {
        self.with_group_mut("describe", name, |_| {
            format!("arn:aws:logs:us-west-2:123456789012:log-group:{name}:*")
        })
    }

    async fn list_tags(&self, name: &str) -> Result<LogGroupTags> {
        self.with_group_mut("list_tags", name, |g| g.tags.clone())
    }

    async fn tag(&self, name: &str, tags: &LogGroupTags) -> Result<()> {
        self.with_group_mut("tag", name, |g| g.tags.extend(tags.clone()))
    }

    async fn untag(&self, name: &str, keys: &[String]) -> Result<()> {
        self.with_group_mut("untag", name, |g| g.tags.retain(|k, _| !keys.contains(k)))
    }

    async fn delete_log_group(&self, name: &str) -> Result<()> {
        let mut state = lock(&self.state);
        state.calls.push("delete".to_string());
        state
            .groups
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| anyhow!("log group {name} does not exist"))
    }
}
