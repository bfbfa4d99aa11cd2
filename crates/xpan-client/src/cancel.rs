//! Caller-driven cancellation.
//!
//! A [`CancelSource`] hands out [`CancelToken`]s. Every wait inside the
//! client (pacing slots, backoff sleeps, in-flight requests) races the token,
//! so a cancel aborts the upload without waiting out the current delay.

use std::future::{pending, Future};

use tokio::sync::watch;
use tokio::time::{sleep_until, Instant};

use crate::error::XpanError;

/// Owner side of a cancellation signal.
#[derive(Debug)]
pub struct CancelSource {
    tx: watch::Sender<bool>,
}

impl Default for CancelSource {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelSource {
    /// A source that has not been cancelled.
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx }
    }

    /// A token observing this source.
    pub fn token(&self) -> CancelToken {
        CancelToken {
            rx: Some(self.tx.subscribe()),
            deadline: None,
        }
    }

    /// Signal every token. Idempotent.
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }
}

/// Observer side of a cancellation signal, optionally with a deadline.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl CancelToken {
    /// A token that never fires.
    pub fn never() -> Self {
        Self {
            rx: None,
            deadline: None,
        }
    }

    /// Also fire at `deadline`. The earlier of two deadlines wins.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Whether the source has cancelled or the deadline has passed.
    pub fn is_cancelled(&self) -> bool {
        let signalled = self.rx.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        signalled || expired
    }

    /// Resolves once the source cancels or the deadline passes.
    ///
    /// Pends forever if the source is dropped without cancelling.
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.rx {
                Some(rx) => {
                    let mut rx = rx.clone();
                    loop {
                        if *rx.borrow_and_update() {
                            return;
                        }
                        if rx.changed().await.is_err() {
                            pending::<()>().await;
                        }
                    }
                }
                None => pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(d) => sleep_until(d).await,
                None => pending::<()>().await,
            }
        };
        tokio::select! {
            _ = signal => {}
            _ = deadline => {}
        }
    }

    /// Run `fut` unless the token fires first.
    pub async fn race<F: Future>(&self, fut: F) -> Result<F::Output, XpanError> {
        if self.is_cancelled() {
            return Err(XpanError::Cancelled);
        }
        tokio::select! {
            biased;
            _ = self.cancelled() => Err(XpanError::Cancelled),
            out = fut => Ok(out),
        }
    }

    /// Sleep until `at`, returning early with [`XpanError::Cancelled`].
    pub async fn sleep_until(&self, at: Instant) -> Result<(), XpanError> {
        self.race(sleep_until(at)).await
    }
}
