use crate::domain::notification::{Notification, NotificationType};
use crate::foundation::util::time::Clock;
use crate::foundation::{CosignError, Result};
use crate::infrastructure::explorer::Explorer;
use log::{debug, warn};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[derive(Clone, Copy, Debug)]
struct CachedHeight {
    height: u64,
    fetched_at_ms: u64,
}

/// Last known block height per network, refreshed after the TTL or a new-block notification.
pub struct HeightCache {
    ttl_ms: u64,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, CachedHeight>>,
}

impl HeightCache {
    pub fn new(ttl_secs: u64, clock: Arc<dyn Clock>) -> Self {
        Self { ttl_ms: ttl_secs.saturating_mul(1000), clock, entries: Mutex::new(HashMap::new()) }
    }

    fn entries(&self) -> Result<MutexGuard<'_, HashMap<String, CachedHeight>>> {
        self.entries.lock().map_err(|_| CosignError::Message("height cache lock poisoned".to_string()))
    }

    pub fn cached(&self, network: &str) -> Option<u64> {
        let now = self.clock.now_millis();
        let entries = self.entries.lock().ok()?;
        entries.get(network).filter(|entry| now.saturating_sub(entry.fetched_at_ms) < self.ttl_ms).map(|entry| entry.height)
    }

    pub async fn get(&self, network: &str, explorer: &dyn Explorer) -> Result<u64> {
        if let Some(height) = self.cached(network) {
            return Ok(height);
        }
        let height = explorer.get_blockchain_height().await?;
        debug!("block height refreshed network={} height={}", network, height);
        self.entries()?.insert(network.to_string(), CachedHeight { height, fetched_at_ms: self.clock.now_millis() });
        Ok(height)
    }

    pub fn invalidate(&self, network: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(network);
        }
    }

    /// Drops the cached height of a network whenever a `NewBlock` notification for it arrives.
    pub fn spawn_invalidator(self: Arc<Self>, mut notifications: broadcast::Receiver<Notification>) -> JoinHandle<()> {
        tokio::spawn(async move {
            loop {
                match notifications.recv().await {
                    Ok(notification) if notification.kind == NotificationType::NewBlock => {
                        self.invalidate(&notification.network_name);
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("height cache invalidator lagged skipped={}", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        })
    }
}
