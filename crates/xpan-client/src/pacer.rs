//! Shared pacing and backoff for every remote call.
//!
//! One [`Pacer`] is owned by a client and cloned into each sub-client, so
//! concurrent uploads through the same client see the same rate-limit
//! pressure. The state is a single mutex-protected record:
//!
//! - a call may not start before `next_slot`;
//! - each start pushes `next_slot` forward by the current sleep;
//! - a retryable failure doubles the sleep (capped at `max_sleep`) and pushes
//!   `next_slot` to at least `now + sleep`;
//! - a success decays the sleep by `sleep / 2^decay_constant`, floored at
//!   `min_sleep`.
//!
//! Retries stop after `low_level_retries` attempts; the last error is
//! returned. Cancellation is never retried and interrupts any wait.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::time::Instant;

use crate::cancel::CancelToken;
use crate::error::XpanError;

/// Tuning for a [`Pacer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacerConfig {
    /// Floor of the inter-call delay. Values below 1ms are raised to 1ms.
    pub min_sleep: Duration,
    /// Ceiling of the inter-call delay.
    pub max_sleep: Duration,
    /// Success decay: each success removes `sleep / 2^decay_constant`.
    pub decay_constant: u32,
    /// Attempts per call, including the first.
    pub low_level_retries: u32,
}

impl Default for PacerConfig {
    fn default() -> Self {
        Self {
            min_sleep: Duration::from_millis(10),
            max_sleep: Duration::from_secs(2),
            decay_constant: 2,
            low_level_retries: 10,
        }
    }
}

#[derive(Debug)]
struct PacerState {
    sleep: Duration,
    next_slot: Option<Instant>,
}

#[derive(Debug)]
struct PacerInner {
    config: PacerConfig,
    state: Mutex<PacerState>,
}

/// Cloneable handle to shared backoff state.
#[derive(Debug, Clone)]
pub struct Pacer {
    inner: Arc<PacerInner>,
}

/// Smallest delay a retry backs off to, whatever `min_sleep` says.
const MIN_BACKOFF: Duration = Duration::from_millis(1);

impl Pacer {
    /// Create a pacer starting at `config.min_sleep`.
    ///
    /// `min_sleep` is raised to at least 1ms so that doubling on retry
    /// always backs off, `max_sleep` to at least `min_sleep`, and
    /// `low_level_retries` to at least one attempt.
    pub fn new(mut config: PacerConfig) -> Self {
        config.min_sleep = config.min_sleep.max(MIN_BACKOFF);
        config.max_sleep = config.max_sleep.max(config.min_sleep);
        config.low_level_retries = config.low_level_retries.max(1);
        Self {
            inner: Arc::new(PacerInner {
                config,
                state: Mutex::new(PacerState {
                    sleep: config.min_sleep,
                    next_slot: None,
                }),
            }),
        }
    }

    /// The effective configuration, after clamping.
    pub fn config(&self) -> PacerConfig {
        self.inner.config
    }

    /// The delay currently enforced between calls.
    pub fn current_sleep(&self) -> Duration {
        self.inner.state.lock().sleep
    }

    /// Run `op` under the pacing policy, retrying retryable failures.
    ///
    /// `op` is invoked once per attempt and must rebuild its request each
    /// time.
    pub async fn call<T, F, Fut>(
        &self,
        cancel: &CancelToken,
        endpoint: &str,
        mut op: F,
    ) -> Result<T, XpanError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, XpanError>>,
    {
        let attempts = self.inner.config.low_level_retries;
        let mut attempt = 0;
        loop {
            attempt += 1;
            let slot = self.reserve_slot();
            cancel.sleep_until(slot).await?;

            match op().await {
                Ok(value) => {
                    self.record(false);
                    return Ok(value);
                }
                Err(XpanError::Cancelled) => return Err(XpanError::Cancelled),
                Err(err) if err.is_retryable() => {
                    let delay = self.record(true);
                    if attempt >= attempts {
                        tracing::warn!(
                            endpoint,
                            attempts,
                            "giving up after retries: {err}"
                        );
                        return Err(err);
                    }
                    tracing::warn!(
                        endpoint,
                        attempt,
                        max_attempts = attempts,
                        delay_ms = delay.as_millis() as u64,
                        "remote call failed, retrying: {err}"
                    );
                }
                Err(err) => {
                    self.record(false);
                    return Err(err);
                }
            }
        }
    }

    fn reserve_slot(&self) -> Instant {
        let mut state = self.inner.state.lock();
        let now = Instant::now();
        let slot = match state.next_slot {
            Some(next) if next > now => next,
            _ => now,
        };
        state.next_slot = Some(slot + state.sleep);
        slot
    }

    /// Update the sleep after an attempt; returns the new sleep.
    fn record(&self, retry: bool) -> Duration {
        let config = self.inner.config;
        let mut state = self.inner.state.lock();
        if retry {
            state.sleep = state.sleep.saturating_mul(2).min(config.max_sleep);
            let earliest = Instant::now() + state.sleep;
            state.next_slot = Some(match state.next_slot {
                Some(next) => next.max(earliest),
                None => earliest,
            });
        } else {
            let shift = config.decay_constant.min(31);
            let decayed = state.sleep.saturating_sub(state.sleep / (1u32 << shift));
            state.sleep = decayed.max(config.min_sleep);
        }
        state.sleep
    }
}
