//! Deadline and retry envelope around backend calls.
//!
//! Every public repository operation runs inside [`Envelope::within`],
//! which races the operation against a deadline fixed at submission. When
//! the deadline wins the operation future is dropped, abandoning any
//! in-flight round trip, and the caller gets [`RepositoryError::Timeout`].
//!
//! Reads go through [`Envelope::read`], which retries a round trip that
//! failed transiently a bounded number of times. Retries happen inside the
//! caller's deadline, so they can never extend it. Writes get a single
//! attempt.

use std::future::Future;
use std::time::Duration;

use permrepo_store::StoreError;
use tracing::warn;

use crate::clock::Clock;
use crate::error::{RepositoryError, Result};

/// Bounded retry for read round trips.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub backoff: Duration,
}

impl RetryPolicy {
    pub const NONE: RetryPolicy = RetryPolicy {
        max_retries: 0,
        backoff: Duration::ZERO,
    };
}

/// Applies deadlines and read retries using an injected [`Clock`].
#[derive(Debug, Clone)]
pub struct Envelope<C> {
    clock: C,
    retry: RetryPolicy,
}

impl<C: Clock> Envelope<C> {
    pub fn new(clock: C, retry: RetryPolicy) -> Self {
        Self { clock, retry }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run `operation` to completion or until `limit` elapses, whichever
    /// comes first.
    pub async fn within<T, F>(&self, operation: &'static str, limit: Duration, fut: F) -> Result<T>
    where
        F: Future<Output = Result<T>>,
    {
        let deadline = self.clock.now() + limit;
        tokio::select! {
            biased;
            result = fut => result,
            _ = self.clock.sleep_until(deadline) => {
                warn!(
                    operation,
                    limit_ms = limit.as_millis() as u64,
                    "backend operation timed out"
                );
                Err(RepositoryError::Timeout { operation, limit })
            }
        }
    }

    /// Run one read round trip, retrying transient backend failures.
    pub async fn read<T, F, Fut>(&self, operation: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, StoreError>>,
    {
        let mut attempt = 0u32;
        loop {
            match call().await {
                Ok(value) => return Ok(value),
                Err(error) if error.is_transient() && attempt < self.retry.max_retries => {
                    attempt += 1;
                    warn!(operation, attempt, %error, "backend read failed, retrying");
                    if !self.retry.backoff.is_zero() {
                        let resume = self.clock.now() + self.retry.backoff;
                        self.clock.sleep_until(resume).await;
                    }
                }
                Err(error) => return Err(error.into()),
            }
        }
    }

    /// Run one write round trip. Writes are not retried.
    pub async fn write<Fut>(&self, fut: Fut) -> Result<()>
    where
        Fut: Future<Output = std::result::Result<(), StoreError>>,
    {
        fut.await.map_err(RepositoryError::from)
    }
}
