use crate::domain::utxo::Utxo;
use crate::foundation::{CosignError, Result};
use crate::infrastructure::explorer::{Explorer, ExplorerEvent, ExplorerTx};
use async_trait::async_trait;
use bitcoin::Network;
use log::warn;
use std::collections::BTreeMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::broadcast;

/// Bounds every explorer call; bulk history gets the longer limit.
pub struct TimeoutExplorer {
    inner: Arc<dyn Explorer>,
    request_timeout: Duration,
    history_timeout: Duration,
}

impl TimeoutExplorer {
    pub fn new(inner: Arc<dyn Explorer>, request_timeout: Duration, history_timeout: Duration) -> Self {
        Self { inner, request_timeout, history_timeout }
    }

    async fn bounded<T>(&self, operation: &str, limit: Duration, fut: impl Future<Output = Result<T>>) -> Result<T> {
        match tokio::time::timeout(limit, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!("explorer call timed out operation={} timeout_ms={}", operation, limit.as_millis());
                Err(CosignError::ExplorerTimeout { operation: operation.to_string(), timeout_ms: limit.as_millis() as u64 })
            }
        }
    }
}

#[async_trait]
impl Explorer for TimeoutExplorer {
    fn network(&self) -> Network {
        self.inner.network()
    }

    async fn get_utxos(&self, addresses: &[String]) -> Result<Vec<Utxo>> {
        self.bounded("get_utxos", self.request_timeout, self.inner.get_utxos(addresses)).await
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String> {
        self.bounded("broadcast", self.request_timeout, self.inner.broadcast(raw_tx)).await
    }

    async fn get_transaction(&self, txid: &str) -> Result<Option<ExplorerTx>> {
        self.bounded("get_transaction", self.request_timeout, self.inner.get_transaction(txid)).await
    }

    async fn get_transactions(&self, addresses: &[String], from: usize, to: usize) -> Result<(Vec<ExplorerTx>, usize)> {
        self.bounded("get_transactions", self.history_timeout, self.inner.get_transactions(addresses, from, to)).await
    }

    async fn get_address_activity(&self, address: &str) -> Result<bool> {
        self.bounded("get_address_activity", self.request_timeout, self.inner.get_address_activity(address)).await
    }

    async fn estimate_fee(&self, nb_blocks: &[u32]) -> Result<BTreeMap<u32, f64>> {
        self.bounded("estimate_fee", self.request_timeout, self.inner.estimate_fee(nb_blocks)).await
    }

    async fn get_blockchain_height(&self) -> Result<u64> {
        self.bounded("get_blockchain_height", self.request_timeout, self.inner.get_blockchain_height()).await
    }

    async fn get_txids_in_block(&self, block_hash: &str) -> Result<Vec<String>> {
        self.bounded("get_txids_in_block", self.request_timeout, self.inner.get_txids_in_block(block_hash)).await
    }

    fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.inner.subscribe()
    }
}
