//! Blockchain explorer contract.
//!
//! The explorer's wire protocol is not implemented here; deployments plug in their own
//! [`Explorer`] and wrap it in [`TimeoutExplorer`] so every call fails closed.

pub mod height_cache;
pub mod mock;
pub mod timeout;

pub use height_cache::HeightCache;
pub use mock::MockExplorer;
pub use timeout::TimeoutExplorer;

use crate::domain::utxo::Utxo;
use crate::foundation::Result;
use async_trait::async_trait;
use bitcoin::Network;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::broadcast;

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerTxIo {
    #[serde(default)]
    pub address: Option<String>,
    pub amount: u64,
}

/// Transaction as reported by the explorer, used for history and monitoring.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExplorerTx {
    pub txid: String,
    pub confirmations: u32,
    #[serde(default)]
    pub block_height: Option<u64>,
    /// Seconds since epoch; first-seen time for unconfirmed transactions.
    pub time: u64,
    pub fees: u64,
    #[serde(default)]
    pub inputs: Vec<ExplorerTxIo>,
    #[serde(default)]
    pub outputs: Vec<ExplorerTxIo>,
}

impl ExplorerTx {
    pub fn new(txid: impl Into<String>, time: u64) -> Self {
        Self { txid: txid.into(), confirmations: 0, block_height: None, time, fees: 0, inputs: Vec::new(), outputs: Vec::new() }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ExplorerEvent {
    Tx(ExplorerTx),
    Block { hash: String, height: u64 },
}

#[async_trait]
pub trait Explorer: Send + Sync {
    fn network(&self) -> Network;

    async fn get_utxos(&self, addresses: &[String]) -> Result<Vec<Utxo>>;

    /// Submits a raw transaction (hex) and returns its txid.
    async fn broadcast(&self, raw_tx: &str) -> Result<String>;

    async fn get_transaction(&self, txid: &str) -> Result<Option<ExplorerTx>>;

    /// Page `[from, to)` of the history of `addresses`, newest first, with the total count.
    async fn get_transactions(&self, addresses: &[String], from: usize, to: usize) -> Result<(Vec<ExplorerTx>, usize)>;

    async fn get_address_activity(&self, address: &str) -> Result<bool>;

    /// Fee rate estimates in coin per kB keyed by block target; negative when unavailable.
    async fn estimate_fee(&self, nb_blocks: &[u32]) -> Result<BTreeMap<u32, f64>>;

    async fn get_blockchain_height(&self) -> Result<u64>;

    async fn get_txids_in_block(&self, block_hash: &str) -> Result<Vec<String>>;

    fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent>;
}
