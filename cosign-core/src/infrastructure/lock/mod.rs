//! Per-token mutual exclusion.
//!
//! Every mutating wallet operation holds the lock of its wallet id. The in-process
//! [`LocalLocker`] queues waiters FIFO; the [`RemoteLocker`] delegates to a lock server that
//! runs the same queue, so multi-process deployments share semantics.

pub mod local;
pub mod protocol;
pub mod remote;

pub use local::LocalLocker;
pub use protocol::{LockRequest, LockResponse};
pub use remote::RemoteLocker;

use crate::foundation::Result;
use async_trait::async_trait;
use std::fmt;
use std::future::Future;
use std::time::Duration;

type ReleaseFn = Box<dyn FnOnce() + Send>;

/// Held lock; dropping it releases the token.
pub struct LockGuard {
    token: String,
    release: Option<ReleaseFn>,
}

impl LockGuard {
    pub fn new(token: impl Into<String>, release: ReleaseFn) -> Self {
        Self { token: token.into(), release: Some(release) }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn release(mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if let Some(release) = self.release.take() {
            release();
        }
    }
}

impl fmt::Debug for LockGuard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LockGuard").field("token", &self.token).finish()
    }
}

#[async_trait]
pub trait Locker: Send + Sync {
    /// Waits up to `wait` for `token`. A grant is released automatically after `max_hold`.
    ///
    /// Fails with `WalletLocked` when the wait elapses.
    async fn acquire(&self, token: &str, wait: Duration, max_hold: Duration) -> Result<LockGuard>;
}

/// Runs `task` while holding `token`.
pub async fn run_locked<F, Fut, T>(locker: &dyn Locker, token: &str, wait: Duration, max_hold: Duration, task: F) -> Result<T>
where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let _guard = locker.acquire(token, wait, max_hold).await?;
    task().await
}
