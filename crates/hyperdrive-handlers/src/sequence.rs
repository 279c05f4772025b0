//! Monotonic counters over a versioned parameter.
//!
//! A sequence is a single parameter holding either the next value to hand
//! out or the reserved value `lock`. Drawing a value is an optimistic lock:
//!
//! 1. read the current value and version;
//! 2. if the value is `lock`, somebody holds the lock: sleep and retry;
//! 3. otherwise overwrite the value with `lock` and remember the version
//!    the write created;
//! 4. if that version directly follows the one read, no other write
//!    happened in between and the lock is ours: write `value + 1`, which
//!    releases the lock, and return `value`;
//! 5. otherwise another caller raced us: retry from 1;
//! 6. give up once the attempt budget is spent.
//!
//! A racing caller whose `lock` write lands after the holder released
//! would leave the sequence locked forever. Such a caller finds the
//! released number in the version its write replaced and puts it back.

use crate::aws::ParameterOperations;
use crate::aws::error::classify_anyhow_error;
use crate::config::SequenceConfig;
use crate::wait::{Sleeper, TokioSleeper};
use anyhow::Context;
use backon::{BackoffBuilder, ConstantBuilder, Retryable};
use hyperdrive_common::ValidationError;
use hyperdrive_common::defaults::{
    DEFAULT_INITIAL_VALUE, SEQUENCE_LOCK_VALUE, SEQUENCE_PARAMETER_PREFIX,
};
use std::future::Future;
use thiserror::Error;
use tracing::{debug, info, warn};

/// One version of a sequence parameter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceParameter {
    pub name: String,
    /// A decimal counter or the lock value
    pub value: String,
    pub version: i64,
}

impl SequenceParameter {
    pub fn is_locked(&self) -> bool {
        self.value == SEQUENCE_LOCK_VALUE
    }

    /// The counter held by this version, `None` for the lock value
    pub fn counter(&self) -> Option<u64> {
        parse_counter(&self.value)
    }
}

/// Errors of sequence operations
#[derive(Debug, Error)]
pub enum SequenceError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("sequence parameter {name} already exists")]
    AlreadyExists { name: String },

    /// The lock could not be won within the attempt budget
    #[error("could not draw a value from sequence {name} after {attempts} attempts")]
    Contention { name: String, attempts: u32 },

    #[error("sequence {name} holds {value:?}, which is not a counter")]
    Corrupt { name: String, value: String },

    #[error("sequence {name} is exhausted")]
    Exhausted { name: String },

    #[error(transparent)]
    Store(#[from] anyhow::Error),
}

/// Full parameter name of a sequence.
///
/// Sequence names must start with `/` and are appended to the sequence
/// parameter prefix.
pub fn parameter_name(sequence_name: &str) -> Result<String, ValidationError> {
    if !sequence_name.starts_with('/') {
        return Err(ValidationError::SequenceName(sequence_name.to_string()));
    }
    Ok(format!("{SEQUENCE_PARAMETER_PREFIX}{sequence_name}"))
}

/// Validate an `InitialValue`; the empty string stands for zero
pub fn parse_initial_value(raw: &str) -> Result<u64, ValidationError> {
    let raw = if raw.is_empty() {
        DEFAULT_INITIAL_VALUE
    } else {
        raw
    };
    parse_counter(raw).ok_or_else(|| ValidationError::InitialValue(raw.to_string()))
}

/// Decimal digits only; signs, whitespace and the lock value are rejected
fn parse_counter(value: &str) -> Option<u64> {
    if value.is_empty() || !value.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    value.parse().ok()
}

/// What one pass through the protocol achieved
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Attempt {
    Drawn(u64),
    Locked,
    Raced,
    Throttled,
}

fn is_throttled(error: &anyhow::Error) -> bool {
    classify_anyhow_error(error).is_retryable()
}

/// Sequence operations on top of a parameter store
pub struct SequenceStore<P, S = TokioSleeper> {
    parameters: P,
    sleeper: S,
    config: SequenceConfig,
}

impl<P: ParameterOperations> SequenceStore<P> {
    pub fn new(parameters: P, config: SequenceConfig) -> Self {
        Self::with_sleeper(parameters, TokioSleeper, config)
    }
}

impl<P: ParameterOperations, S: Sleeper + Clone + 'static> SequenceStore<P, S> {
    pub fn with_sleeper(parameters: P, sleeper: S, config: SequenceConfig) -> Self {
        Self {
            parameters,
            sleeper,
            config,
        }
    }

    /// Create the parameter `name` holding `initial_value`.
    ///
    /// Returns the stored counter. Fails without writing anything when the
    /// initial value is not an unsigned integer.
    pub async fn create(&self, name: &str, initial_value: &str) -> Result<u64, SequenceError> {
        let value = parse_initial_value(initial_value)?;

        match self.parameters.create_parameter(name, &value.to_string()).await {
            Ok(_) => {
                info!(sequence = %name, value, "Created sequence");
                Ok(value)
            }
            Err(e) if classify_anyhow_error(&e).is_already_exists() => {
                Err(SequenceError::AlreadyExists {
                    name: name.to_string(),
                })
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Draw the next value of the sequence `name`.
    pub async fn next(&self, name: &str) -> Result<u64, SequenceError> {
        let max_attempts = self.config.max_attempts;
        let mut delays = self.backoff().build();

        for attempt in 1..=max_attempts {
            match self.try_draw(name).await? {
                Attempt::Drawn(value) => {
                    info!(sequence = %name, value, attempt, "Drew sequence value");
                    return Ok(value);
                }
                outcome => {
                    debug!(sequence = %name, attempt, outcome = ?outcome, "Sequence busy");
                }
            }

            if let Some(delay) = delays.next() {
                self.sleeper.sleep(delay).await;
            }
        }

        warn!(sequence = %name, attempts = max_attempts, "Could not draw a sequence value");
        Err(SequenceError::Contention {
            name: name.to_string(),
            attempts: max_attempts,
        })
    }

    /// Delete the sequence `name`; deleting a missing sequence succeeds
    pub async fn delete(&self, name: &str) -> Result<(), SequenceError> {
        self.parameters.delete_parameter(name).await?;
        Ok(())
    }

    /// Delays between attempts; one fewer than attempts
    fn backoff(&self) -> ConstantBuilder {
        ConstantBuilder::default()
            .with_delay(self.config.retry_interval)
            .with_max_times(self.config.max_attempts.saturating_sub(1) as usize)
    }

    async fn try_draw(&self, name: &str) -> Result<Attempt, SequenceError> {
        let current = match self.parameters.get_parameter(name).await {
            Ok(current) => current,
            Err(e) if is_throttled(&e) => return Ok(Attempt::Throttled),
            Err(e) => return Err(e.into()),
        };

        if current.is_locked() {
            return Ok(Attempt::Locked);
        }

        let value = current.counter().ok_or_else(|| SequenceError::Corrupt {
            name: name.to_string(),
            value: current.value.clone(),
        })?;
        let next = value
            .checked_add(1)
            .ok_or_else(|| SequenceError::Exhausted {
                name: name.to_string(),
            })?
            .to_string();

        let locked_version = match self
            .parameters
            .overwrite_parameter(name, SEQUENCE_LOCK_VALUE)
            .await
        {
            Ok(version) => version,
            Err(e) if is_throttled(&e) => return Ok(Attempt::Throttled),
            Err(e) => return Err(e.into()),
        };

        if locked_version != current.version + 1 {
            debug!(
                sequence = %name,
                read_version = current.version,
                locked_version,
                "Lost the race for the sequence lock"
            );
            self.restore_clobbered(name, locked_version).await?;
            return Ok(Attempt::Raced);
        }

        let next = next.as_str();
        self.retry_throttled(|| self.parameters.overwrite_parameter(name, next))
            .await
            .with_context(|| format!("could not release the lock of sequence {name}"))?;

        Ok(Attempt::Drawn(value))
    }

    /// Undo a `lock` write that replaced a released counter.
    ///
    /// Nobody can hold the lock in that case, so the counter our write
    /// replaced is written back.
    async fn restore_clobbered(&self, name: &str, locked_version: i64) -> Result<(), SequenceError> {
        let replaced = match self
            .retry_throttled(|| self.parameters.get_parameter_version(name, locked_version - 1))
            .await
        {
            Ok(replaced) => replaced,
            Err(e) if classify_anyhow_error(&e).is_not_found() => {
                warn!(sequence = %name, version = locked_version - 1, "Replaced version is gone");
                return Ok(());
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(counter) = replaced.counter() {
            warn!(sequence = %name, counter, "Restoring counter clobbered by a stale lock");
            let counter = counter.to_string();
            let counter = counter.as_str();
            self.retry_throttled(|| self.parameters.overwrite_parameter(name, counter))
                .await
                .with_context(|| format!("could not restore the counter of sequence {name}"))?;
        }
        Ok(())
    }

    /// Run `op` again while it is throttled, within the attempt budget
    async fn retry_throttled<T, F, Fut>(&self, op: F) -> anyhow::Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let sleeper = self.sleeper.clone();
        op.retry(self.backoff())
            .sleep(move |delay| {
                let sleeper = sleeper.clone();
                async move { sleeper.sleep(delay).await }
            })
            .when(is_throttled)
            .notify(|e, delay| warn!(delay = ?delay, error = %e, "Throttled, retrying"))
            .await
    }
}
