//! Bounded polling of eventually consistent state.
//!
//! A probe is called until its result satisfies a readiness predicate or
//! the attempt budget is spent. Sleeping goes through a [`Sleeper`] so
//! tests can run thousands of attempts without wall-clock delay.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

/// Source of delays between attempts
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

/// Sleeps on the tokio timer
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        tokio::time::sleep(duration)
    }
}

impl<S: Sleeper> Sleeper for Arc<S> {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

impl<S: Sleeper> Sleeper for &S {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send {
        (**self).sleep(duration)
    }
}

/// Attempt budget with a fixed interval between attempts
#[derive(Debug, Clone, Copy)]
pub struct WaitConfig {
    /// Total number of probes, including the first one
    pub max_attempts: u32,
    /// Delay between two probes
    pub interval: Duration,
}

/// Errors ending a wait
#[derive(Debug, Error)]
pub enum WaitError {
    /// The budget was spent without the probe reporting ready
    #[error("timed out waiting for {resource} after {attempts} attempts")]
    Timeout { resource: String, attempts: u32 },

    /// The probe itself failed; probes are not retried
    #[error("failed to check {resource}")]
    Probe {
        resource: String,
        #[source]
        source: anyhow::Error,
    },
}

impl WaitError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, WaitError::Timeout { .. })
    }
}

/// Poll `probe` every `config.interval` until `is_ready` accepts its result.
///
/// The probe runs at most `config.max_attempts` times and there is no
/// sleep after the last attempt. Returns the first ready state.
pub async fn poll_until<T, F, Fut, R, S>(
    config: &WaitConfig,
    sleeper: &S,
    resource: &str,
    probe: F,
    is_ready: R,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    R: FnMut(&T) -> bool,
    S: Sleeper,
{
    let interval = config.interval;
    poll_with_cadence(config.max_attempts, sleeper, resource, probe, is_ready, |_| {
        interval
    })
    .await
}

/// Like [`poll_until`], with the delay chosen from the last unready state.
///
/// Used where the probed system reports progress in stages that settle at
/// different speeds.
pub async fn poll_with_cadence<T, F, Fut, R, D, S>(
    max_attempts: u32,
    sleeper: &S,
    resource: &str,
    mut probe: F,
    mut is_ready: R,
    mut delay_after: D,
) -> Result<T, WaitError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = anyhow::Result<T>>,
    R: FnMut(&T) -> bool,
    D: FnMut(&T) -> Duration,
    S: Sleeper,
{
    for attempt in 1..=max_attempts {
        let state = probe().await.map_err(|source| {
            warn!(resource = %resource, attempt, error = ?source, "Readiness check failed");
            WaitError::Probe {
                resource: resource.to_string(),
                source,
            }
        })?;

        if is_ready(&state) {
            debug!(resource = %resource, attempt, "Resource ready");
            return Ok(state);
        }

        if attempt < max_attempts {
            let delay = delay_after(&state);
            debug!(
                resource = %resource,
                attempt,
                delay_ms = delay.as_millis(),
                "Resource not ready, retrying"
            );
            sleeper.sleep(delay).await;
        }
    }

    warn!(resource = %resource, attempts = max_attempts, "Gave up waiting");
    Err(WaitError::Timeout {
        resource: resource.to_string(),
        attempts: max_attempts,
    })
}
