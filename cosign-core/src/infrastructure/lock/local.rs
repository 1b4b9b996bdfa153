use crate::foundation::{CosignError, Result};
use crate::infrastructure::lock::{LockGuard, Locker};
use async_trait::async_trait;
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use tokio::sync::oneshot;

#[derive(Default)]
struct TokenQueue {
    holder: Option<u64>,
    waiters: VecDeque<(u64, oneshot::Sender<()>)>,
}

type LockTable = Arc<Mutex<HashMap<String, TokenQueue>>>;

fn lock_table(table: &LockTable) -> MutexGuard<'_, HashMap<String, TokenQueue>> {
    table.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Hands the token to the next live waiter, or forgets it when nobody waits.
fn release(table: &LockTable, token: &str, holder: u64) {
    let mut table = lock_table(table);
    let Some(queue) = table.get_mut(token) else {
        return;
    };
    if queue.holder != Some(holder) {
        return;
    }
    queue.holder = None;
    while let Some((next, grant)) = queue.waiters.pop_front() {
        queue.holder = Some(next);
        if grant.send(()).is_ok() {
            break;
        }
        queue.holder = None;
    }
    if queue.holder.is_none() && queue.waiters.is_empty() {
        table.remove(token);
    }
}

/// In-process FIFO lock keyed by token.
#[derive(Clone, Default)]
pub struct LocalLocker {
    table: LockTable,
    next_id: Arc<AtomicU64>,
}

impl LocalLocker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_locked(&self, token: &str) -> bool {
        lock_table(&self.table).get(token).is_some_and(|queue| queue.holder.is_some())
    }

    pub fn waiting(&self, token: &str) -> usize {
        lock_table(&self.table).get(token).map_or(0, |queue| queue.waiters.len())
    }

    fn enqueue(&self, token: &str, id: u64) -> Option<oneshot::Receiver<()>> {
        let mut table = lock_table(&self.table);
        let queue = table.entry(token.to_string()).or_default();
        if queue.holder.is_none() && queue.waiters.is_empty() {
            queue.holder = Some(id);
            return None;
        }
        let (grant, granted) = oneshot::channel();
        queue.waiters.push_back((id, grant));
        Some(granted)
    }

    /// Leaves the queue after a failed wait; returns true when the grant raced the timeout.
    fn abandon(&self, token: &str, id: u64) -> bool {
        let mut table = lock_table(&self.table);
        let Some(queue) = table.get_mut(token) else {
            return false;
        };
        if queue.holder == Some(id) {
            return true;
        }
        queue.waiters.retain(|(waiter, _)| *waiter != id);
        if queue.holder.is_none() && queue.waiters.is_empty() {
            table.remove(token);
        }
        false
    }
}

#[async_trait]
impl Locker for LocalLocker {
    async fn acquire(&self, token: &str, wait: Duration, max_hold: Duration) -> Result<LockGuard> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        if let Some(granted) = self.enqueue(token, id) {
            let in_time = matches!(tokio::time::timeout(wait, granted).await, Ok(Ok(())));
            if !in_time && !self.abandon(token, id) {
                debug!("lock wait elapsed token={} wait_ms={}", token, wait.as_millis());
                return Err(CosignError::WalletLocked);
            }
        }

        let table = self.table.clone();
        let expiry_token = token.to_string();
        let expiry = tokio::spawn(async move {
            tokio::time::sleep(max_hold).await;
            warn!("lock held past max hold, releasing token={} max_hold_ms={}", expiry_token, max_hold.as_millis());
            release(&table, &expiry_token, id);
        });

        let table = self.table.clone();
        let release_token = token.to_string();
        Ok(LockGuard::new(
            token,
            Box::new(move || {
                expiry.abort();
                release(&table, &release_token, id);
            }),
        ))
    }
}
