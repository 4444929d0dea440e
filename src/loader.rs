//! Word-list acquisition with bounded retry.
//!
//! A load makes one attempt plus up to `max_retries` automatic retries. The
//! delay before retry `n` (0-based) is `initial_delay * 2^n`, capped at
//! `max_delay`. When the last retry fails the loader reports `Exhausted` and
//! stops; calling [`SessionLoader::load`] again starts a fresh sequence.
//!
//! Every wait is raced against a [`CancellationToken`] so a torn-down session
//! never sees a late completion.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LoadError;
use crate::stimulus::StimulusSet;

/// Where stimulus sets come from.
#[async_trait]
pub trait WordSource: Send + Sync {
    async fn fetch_words(&self) -> Result<StimulusSet, LoadError>;
}

#[async_trait]
impl<T: WordSource + ?Sized> WordSource for Arc<T> {
    async fn fetch_words(&self) -> Result<StimulusSet, LoadError> {
        (**self).fetch_words().await
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Automatic retries after the first attempt.
    pub max_retries: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(1000),
            max_delay: Duration::from_millis(10_000),
        }
    }
}

impl RetryPolicy {
    /// Delay before the retry following failed attempt `attempt` (0-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.checked_pow(attempt).unwrap_or(u32::MAX);
        self.initial_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Loading progress as seen by presentation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    /// Waiting to make retry number `n` (1-based).
    Retrying(u32),
    Failed,
}

pub struct SessionLoader<S> {
    source: S,
    policy: RetryPolicy,
}

impl<S: WordSource> SessionLoader<S> {
    pub fn new(source: S, policy: RetryPolicy) -> Self {
        Self { source, policy }
    }

    /// Runs one full attempt sequence, reporting progress through `on_state`.
    ///
    /// Returns either a complete set or an error; nothing partial is exposed.
    pub async fn load<F>(
        &self,
        cancel: &CancellationToken,
        mut on_state: F,
    ) -> Result<StimulusSet, LoadError>
    where
        F: FnMut(LoadState) + Send,
    {
        on_state(LoadState::Loading);
        let mut attempt: u32 = 0;

        loop {
            let outcome = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(LoadError::Cancelled),
                result = self.source.fetch_words() => result,
            };

            match outcome {
                Ok(set) => {
                    if set.is_empty() {
                        tracing::warn!("word list service returned no words");
                    }
                    tracing::info!(
                        attempts = attempt + 1,
                        practice = set.practice().len(),
                        scored = set.scored().len(),
                        "word list loaded"
                    );
                    return Ok(set);
                }
                Err(err) if attempt < self.policy.max_retries => {
                    let delay = self.policy.delay_for(attempt);
                    attempt += 1;
                    tracing::warn!(
                        error = %err,
                        retry = attempt,
                        delay_ms = delay.as_millis() as u64,
                        "word list load failed, retrying"
                    );
                    on_state(LoadState::Retrying(attempt));

                    tokio::select! {
                        biased;
                        () = cancel.cancelled() => {
                            tracing::debug!("retry backoff cancelled");
                            return Err(LoadError::Cancelled);
                        }
                        () = tokio::time::sleep(delay) => {}
                    }
                }
                Err(err) => {
                    tracing::warn!(error = %err, attempts = attempt + 1, "word list load gave up");
                    on_state(LoadState::Failed);
                    return Err(LoadError::Exhausted {
                        attempts: attempt + 1,
                        last: Box::new(err),
                    });
                }
            }
        }
    }
}
