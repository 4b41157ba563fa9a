//! Time sources for deadlines and timestamps.
//!
//! The repository never reads the system clock directly. Deadlines and the
//! unrestricted principal's last-modified stamp both come from a [`Clock`],
//! so tests can drive time by hand with [`ManualClock`].

use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use tokio::sync::watch;

/// A source of monotonic instants, wall-clock timestamps, and sleeps.
#[async_trait]
pub trait Clock: Send + Sync {
    /// Current monotonic instant.
    fn now(&self) -> Instant;

    /// Current wall-clock time in Unix milliseconds.
    fn epoch_millis(&self) -> i64;

    /// Resolve once `now() >= deadline`.
    async fn sleep_until(&self, deadline: Instant);
}

#[async_trait]
impl<C: Clock + ?Sized> Clock for Arc<C> {
    fn now(&self) -> Instant {
        (**self).now()
    }

    fn epoch_millis(&self) -> i64 {
        (**self).epoch_millis()
    }

    async fn sleep_until(&self, deadline: Instant) {
        (**self).sleep_until(deadline).await
    }
}

/// The real clock, backed by tokio timers.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

#[async_trait]
impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn epoch_millis(&self) -> i64 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0)
    }

    async fn sleep_until(&self, deadline: Instant) {
        tokio::time::sleep_until(tokio::time::Instant::from_std(deadline)).await
    }
}

/// A clock that only moves when told to.
///
/// Sleepers wake as soon as [`ManualClock::advance`] carries the clock past
/// their deadline; no real time passes.
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    origin_millis: i64,
    elapsed: watch::Sender<Duration>,
}

impl ManualClock {
    /// A clock whose wall time starts at `epoch_millis`.
    pub fn new(epoch_millis: i64) -> Self {
        let (elapsed, _) = watch::channel(Duration::ZERO);
        Self {
            origin: Instant::now(),
            origin_millis: epoch_millis,
            elapsed,
        }
    }

    /// Move time forward by `by`, waking any sleeper whose deadline passed.
    pub fn advance(&self, by: Duration) {
        self.elapsed.send_modify(|elapsed| *elapsed += by);
    }

    /// Total time advanced since creation.
    pub fn elapsed(&self) -> Duration {
        *self.elapsed.borrow()
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new(0)
    }
}

#[async_trait]
impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.elapsed()
    }

    fn epoch_millis(&self) -> i64 {
        self.origin_millis + self.elapsed().as_millis() as i64
    }

    async fn sleep_until(&self, deadline: Instant) {
        let mut elapsed = self.elapsed.subscribe();
        loop {
            if self.origin + *elapsed.borrow_and_update() >= deadline {
                return;
            }
            if elapsed.changed().await.is_err() {
                // The clock was dropped; it can never reach the deadline.
                std::future::pending::<()>().await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_manual_clock_wakes_sleeper() {
        let clock = Arc::new(ManualClock::new(1_000));
        let deadline = clock.now() + Duration::from_millis(100);

        let sleeper = {
            let clock = clock.clone();
            tokio::spawn(async move { clock.sleep_until(deadline).await })
        };

        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::from_millis(50));
        tokio::task::yield_now().await;
        assert!(!sleeper.is_finished());

        clock.advance(Duration::from_millis(50));
        sleeper.await.unwrap();
        assert_eq!(clock.epoch_millis(), 1_100);
    }

    #[tokio::test]
    async fn test_past_deadline_returns_immediately() {
        let clock = ManualClock::default();
        let deadline = clock.now();
        clock.sleep_until(deadline).await;
    }
}
