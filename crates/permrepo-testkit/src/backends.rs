//! Backends that misbehave on command.
//!
//! Both wrap a real backend and forward to it once they let a call through.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use permrepo_store::{Backend, Batch, Query, Reply, Result, StoreError};
use tokio::sync::{watch, Notify};

/// A backend whose calls can be held at the door until released.
///
/// While stalled, every call parks before reaching the inner backend. Tests
/// use it to keep a repository operation in flight while they move a
/// clock past its deadline.
pub struct StallingBackend<B> {
    inner: B,
    stalled: watch::Sender<bool>,
    entered: Notify,
}

impl<B: Backend> StallingBackend<B> {
    pub fn new(inner: B) -> Self {
        let (stalled, _) = watch::channel(false);
        Self {
            inner,
            stalled,
            entered: Notify::new(),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Park every subsequent call.
    pub fn stall(&self) {
        self.stalled.send_replace(true);
    }

    /// Let parked and future calls through.
    pub fn release(&self) {
        self.stalled.send_replace(false);
    }

    /// Wait until some call has parked.
    pub async fn wait_until_stalled(&self) {
        self.entered.notified().await;
    }

    async fn gate(&self) {
        let mut stalled = self.stalled.subscribe();
        let mut announced = false;
        loop {
            let parked = *stalled.borrow_and_update();
            if !parked {
                return;
            }
            if !announced {
                self.entered.notify_one();
                announced = true;
            }
            if stalled.changed().await.is_err() {
                return;
            }
        }
    }
}

#[async_trait]
impl<B: Backend> Backend for StallingBackend<B> {
    async fn execute(&self, batch: Batch) -> Result<()> {
        self.gate().await;
        self.inner.execute(batch).await
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        self.gate().await;
        self.inner.query(queries).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.gate().await;
        self.inner.scan_prefix(prefix).await
    }
}

/// A backend that fails a set number of calls before behaving.
pub struct FlakyBackend<B> {
    inner: B,
    read_failures: AtomicUsize,
    write_failures: AtomicUsize,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl<B: Backend> FlakyBackend<B> {
    pub fn new(inner: B) -> Self {
        Self {
            inner,
            read_failures: AtomicUsize::new(0),
            write_failures: AtomicUsize::new(0),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    pub fn inner(&self) -> &B {
        &self.inner
    }

    /// Fail the next `n` queries with a connection error.
    pub fn fail_reads(&self, n: usize) {
        self.read_failures.store(n, Ordering::SeqCst);
    }

    /// Fail the next `n` batches with a connection error.
    pub fn fail_writes(&self, n: usize) {
        self.write_failures.store(n, Ordering::SeqCst);
    }

    /// Query calls seen, including failed ones.
    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Batch calls seen, including failed ones.
    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

fn take_failure(remaining: &AtomicUsize) -> bool {
    remaining
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl<B: Backend> Backend for FlakyBackend<B> {
    async fn execute(&self, batch: Batch) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.write_failures) {
            return Err(StoreError::Connection("injected write failure".into()));
        }
        self.inner.execute(batch).await
    }

    async fn query(&self, queries: Vec<Query>) -> Result<Vec<Reply>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.read_failures) {
            return Err(StoreError::Connection("injected read failure".into()));
        }
        self.inner.query(queries).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        self.inner.scan_prefix(prefix).await
    }
}
