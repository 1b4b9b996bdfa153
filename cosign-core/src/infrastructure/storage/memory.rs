use crate::domain::address::AddressRecord;
use crate::domain::notification::Notification;
use crate::domain::proposal::TxProposal;
use crate::domain::wallet::{CopayerLookup, Wallet};
use crate::foundation::{CopayerId, CosignError, NotificationId, ProposalId, Result, WalletId};
use crate::infrastructure::storage::traits::{apply_limit, in_query, sort_newest_first};
use crate::infrastructure::storage::{ActiveAddresses, Storage, TxHistoryCache, TxQuery};
use log::warn;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, MutexGuard};

#[derive(Default)]
struct MemoryInner {
    wallets: HashMap<WalletId, Wallet>,
    copayer_lookups: HashMap<CopayerId, CopayerLookup>,
    txs: HashMap<WalletId, HashMap<ProposalId, TxProposal>>,
    addresses: HashMap<WalletId, Vec<AddressRecord>>,
    address_owner: HashMap<String, WalletId>,
    notifications: HashMap<WalletId, BTreeMap<NotificationId, Notification>>,
    active_addresses: HashMap<WalletId, ActiveAddresses>,
    history_cache: HashMap<WalletId, TxHistoryCache>,
}

impl MemoryInner {
    fn insert_address(&mut self, address: &AddressRecord) -> bool {
        if self.address_owner.contains_key(&address.address) {
            return false;
        }
        self.address_owner.insert(address.address.clone(), address.wallet_id.clone());
        self.addresses.entry(address.wallet_id.clone()).or_default().push(address.clone());
        true
    }
}

/// Process-local storage for tests and single-node development.
#[derive(Clone, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock_inner(&self) -> Result<MutexGuard<'_, MemoryInner>> {
        self.inner.lock().map_err(|_| CosignError::StorageError { operation: "memory storage lock".to_string(), details: "poisoned".to_string() })
    }
}

impl Storage for MemoryStorage {
    fn store_wallet(&self, wallet: &Wallet) -> Result<()> {
        self.lock_inner()?.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    fn fetch_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>> {
        Ok(self.lock_inner()?.wallets.get(wallet_id).cloned())
    }

    fn store_wallet_and_update_copayers_lookup(&self, wallet: &Wallet) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.wallets.insert(wallet.id.clone(), wallet.clone());
        for lookup in wallet.copayer_lookups() {
            inner.copayer_lookups.insert(lookup.copayer_id.clone(), lookup);
        }
        Ok(())
    }

    fn fetch_copayer_lookup(&self, copayer_id: &CopayerId) -> Result<Option<CopayerLookup>> {
        Ok(self.lock_inner()?.copayer_lookups.get(copayer_id).cloned())
    }

    fn store_tx(&self, proposal: &TxProposal) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.txs.entry(proposal.wallet_id.clone()).or_default().insert(proposal.id.clone(), proposal.clone());
        Ok(())
    }

    fn fetch_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<Option<TxProposal>> {
        Ok(self.lock_inner()?.txs.get(wallet_id).and_then(|txs| txs.get(proposal_id)).cloned())
    }

    fn fetch_tx_by_hash(&self, wallet_id: &WalletId, txid: &str) -> Result<Option<TxProposal>> {
        let inner = self.lock_inner()?;
        Ok(inner.txs.get(wallet_id).and_then(|txs| txs.values().find(|txp| txp.txid.as_deref() == Some(txid))).cloned())
    }

    fn remove_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<()> {
        if let Some(txs) = self.lock_inner()?.txs.get_mut(wallet_id) {
            txs.remove(proposal_id);
        }
        Ok(())
    }

    fn fetch_txs(&self, wallet_id: &WalletId, query: &TxQuery) -> Result<Vec<TxProposal>> {
        let inner = self.lock_inner()?;
        let mut txs: Vec<TxProposal> =
            inner.txs.get(wallet_id).map(|txs| txs.values().filter(|txp| in_query(txp, query)).cloned().collect()).unwrap_or_default();
        sort_newest_first(&mut txs);
        Ok(apply_limit(txs, query))
    }

    fn store_address_and_wallet(&self, wallet: &Wallet, addresses: &[AddressRecord]) -> Result<()> {
        let mut inner = self.lock_inner()?;
        for address in addresses {
            if !inner.insert_address(address) {
                warn!("skipping duplicate address address={} wallet_id={}", address.address, address.wallet_id);
            }
        }
        inner.wallets.insert(wallet.id.clone(), wallet.clone());
        Ok(())
    }

    fn store_address(&self, address: &AddressRecord) -> Result<()> {
        let mut inner = self.lock_inner()?;
        if !inner.insert_address(address) {
            warn!("skipping duplicate address address={} wallet_id={}", address.address, address.wallet_id);
        }
        Ok(())
    }

    fn mark_address_activity(&self, wallet_id: &WalletId, address: &str) -> Result<()> {
        let mut inner = self.lock_inner()?;
        if let Some(record) = inner.addresses.get_mut(wallet_id).and_then(|records| records.iter_mut().find(|record| record.address == address)) {
            record.has_activity = Some(true);
        }
        Ok(())
    }

    fn fetch_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressRecord>> {
        Ok(self.lock_inner()?.addresses.get(wallet_id).cloned().unwrap_or_default())
    }

    fn fetch_address_by_wallet_id(&self, wallet_id: &WalletId, address: &str) -> Result<Option<AddressRecord>> {
        let inner = self.lock_inner()?;
        Ok(inner.addresses.get(wallet_id).and_then(|records| records.iter().find(|record| record.address == address)).cloned())
    }

    fn fetch_address_wallet(&self, address: &str) -> Result<Option<WalletId>> {
        Ok(self.lock_inner()?.address_owner.get(address).cloned())
    }

    fn store_notification(&self, notification: &Notification) -> Result<()> {
        let mut inner = self.lock_inner()?;
        inner.notifications.entry(notification.wallet_id.clone()).or_default().insert(notification.id.clone(), notification.clone());
        Ok(())
    }

    fn fetch_notifications(&self, wallet_id: &WalletId, from_id: Option<&NotificationId>, min_ts: u64) -> Result<Vec<Notification>> {
        let inner = self.lock_inner()?;
        let Some(notifications) = inner.notifications.get(wallet_id) else {
            return Ok(Vec::new());
        };
        Ok(notifications
            .values()
            .filter(|notification| from_id.map_or(true, |from| &notification.id > from))
            .filter(|notification| notification.created_on >= min_ts)
            .cloned()
            .collect())
    }

    fn store_active_addresses(&self, wallet_id: &WalletId, addresses: &[String], now: u64) -> Result<()> {
        let entry = ActiveAddresses { addresses: addresses.to_vec(), updated_on: now };
        self.lock_inner()?.active_addresses.insert(wallet_id.clone(), entry);
        Ok(())
    }

    fn fetch_active_addresses(&self, wallet_id: &WalletId) -> Result<Option<ActiveAddresses>> {
        Ok(self.lock_inner()?.active_addresses.get(wallet_id).cloned())
    }

    fn store_tx_history_cache(&self, wallet_id: &WalletId, cache: &TxHistoryCache) -> Result<()> {
        self.lock_inner()?.history_cache.insert(wallet_id.clone(), cache.clone());
        Ok(())
    }

    fn fetch_tx_history_cache(&self, wallet_id: &WalletId) -> Result<Option<TxHistoryCache>> {
        Ok(self.lock_inner()?.history_cache.get(wallet_id).cloned())
    }

    fn clear_tx_history_cache(&self, wallet_id: &WalletId) -> Result<()> {
        self.lock_inner()?.history_cache.remove(wallet_id);
        Ok(())
    }
}
