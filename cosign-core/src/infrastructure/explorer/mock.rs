use crate::domain::utxo::Utxo;
use crate::foundation::{CosignError, Result};
use crate::infrastructure::explorer::{Explorer, ExplorerEvent, ExplorerTx};
use async_trait::async_trait;
use bitcoin::{Network, Transaction};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard};
use tokio::sync::broadcast;

const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Default)]
struct MockState {
    utxos: Vec<Utxo>,
    txs: HashMap<String, ExplorerTx>,
    history: Vec<ExplorerTx>,
    active_addresses: HashSet<String>,
    fee_samples: BTreeMap<u32, f64>,
    block_txids: HashMap<String, Vec<String>>,
    broadcasted: Vec<String>,
    broadcast_error: Option<String>,
}

/// In-memory explorer for tests and local runs.
pub struct MockExplorer {
    network: Network,
    state: Mutex<MockState>,
    height: AtomicU64,
    height_queries: AtomicUsize,
    events: broadcast::Sender<ExplorerEvent>,
}

impl MockExplorer {
    pub fn new(network: Network) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self { network, state: Mutex::new(MockState::default()), height: AtomicU64::new(0), height_queries: AtomicUsize::new(0), events }
    }

    fn state(&self) -> Result<MutexGuard<'_, MockState>> {
        self.state.lock().map_err(|_| CosignError::explorer("mock explorer lock", "poisoned"))
    }

    fn with_state(&self, f: impl FnOnce(&mut MockState)) {
        if let Ok(mut state) = self.state.lock() {
            f(&mut state);
        }
    }

    pub fn push_utxo(&self, utxo: Utxo) {
        self.with_state(|state| state.utxos.push(utxo));
    }

    pub fn set_utxos(&self, utxos: Vec<Utxo>) {
        self.with_state(|state| state.utxos = utxos);
    }

    pub fn remove_utxo(&self, txid: &str, vout: u32) {
        self.with_state(|state| state.utxos.retain(|utxo| !(utxo.txid == txid && utxo.vout == vout)));
    }

    /// Makes `tx` visible to `get_transaction` and, newest first, to history queries.
    pub fn add_transaction(&self, tx: ExplorerTx) {
        self.with_state(|state| {
            state.history.insert(0, tx.clone());
            state.txs.insert(tx.txid.clone(), tx);
        });
    }

    pub fn set_address_activity(&self, address: &str) {
        self.with_state(|state| {
            state.active_addresses.insert(address.to_string());
        });
    }

    pub fn set_fee_samples(&self, samples: BTreeMap<u32, f64>) {
        self.with_state(|state| state.fee_samples = samples);
    }

    pub fn set_block_txids(&self, block_hash: &str, txids: Vec<String>) {
        self.with_state(|state| {
            state.block_txids.insert(block_hash.to_string(), txids);
        });
    }

    /// Every following broadcast fails with `message` until cleared with `None`.
    pub fn set_broadcast_error(&self, message: Option<&str>) {
        self.with_state(|state| state.broadcast_error = message.map(str::to_string));
    }

    pub fn broadcasted(&self) -> Vec<String> {
        self.state.lock().map(|state| state.broadcasted.clone()).unwrap_or_default()
    }

    pub fn set_height(&self, height: u64) {
        self.height.store(height, Ordering::SeqCst);
    }

    pub fn height_queries(&self) -> usize {
        self.height_queries.load(Ordering::SeqCst)
    }

    /// Pushes an event to subscribers; returns the number of receivers reached.
    pub fn emit(&self, event: ExplorerEvent) -> usize {
        self.events.send(event).unwrap_or(0)
    }
}

#[async_trait]
impl Explorer for MockExplorer {
    fn network(&self) -> Network {
        self.network
    }

    async fn get_utxos(&self, addresses: &[String]) -> Result<Vec<Utxo>> {
        let state = self.state()?;
        Ok(state.utxos.iter().filter(|utxo| addresses.contains(&utxo.address)).cloned().collect())
    }

    async fn broadcast(&self, raw_tx: &str) -> Result<String> {
        let mut state = self.state()?;
        if let Some(message) = state.broadcast_error.clone() {
            return Err(CosignError::explorer("broadcast", message));
        }
        let bytes = hex::decode(raw_tx.trim())?;
        let tx: Transaction = bitcoin::consensus::deserialize(&bytes).map_err(|err| CosignError::explorer("broadcast", err))?;
        let txid = tx.compute_txid().to_string();
        state.broadcasted.push(raw_tx.to_string());
        state.txs.entry(txid.clone()).or_insert_with(|| ExplorerTx::new(txid.clone(), 0));
        Ok(txid)
    }

    async fn get_transaction(&self, txid: &str) -> Result<Option<ExplorerTx>> {
        Ok(self.state()?.txs.get(txid).cloned())
    }

    async fn get_transactions(&self, addresses: &[String], from: usize, to: usize) -> Result<(Vec<ExplorerTx>, usize)> {
        let state = self.state()?;
        let touches = |tx: &ExplorerTx| {
            tx.inputs.iter().chain(tx.outputs.iter()).any(|io| io.address.as_ref().is_some_and(|address| addresses.contains(address)))
        };
        let matching: Vec<ExplorerTx> = state.history.iter().filter(|tx| touches(tx)).cloned().collect();
        let total = matching.len();
        Ok((matching.into_iter().skip(from).take(to.saturating_sub(from)).collect(), total))
    }

    async fn get_address_activity(&self, address: &str) -> Result<bool> {
        Ok(self.state()?.active_addresses.contains(address))
    }

    async fn estimate_fee(&self, nb_blocks: &[u32]) -> Result<BTreeMap<u32, f64>> {
        let state = self.state()?;
        Ok(nb_blocks.iter().map(|nb| (*nb, state.fee_samples.get(nb).copied().unwrap_or(-1.0))).collect())
    }

    async fn get_blockchain_height(&self) -> Result<u64> {
        self.height_queries.fetch_add(1, Ordering::SeqCst);
        Ok(self.height.load(Ordering::SeqCst))
    }

    async fn get_txids_in_block(&self, block_hash: &str) -> Result<Vec<String>> {
        Ok(self.state()?.block_txids.get(block_hash).cloned().unwrap_or_default())
    }

    fn subscribe(&self) -> broadcast::Receiver<ExplorerEvent> {
        self.events.subscribe()
    }
}
