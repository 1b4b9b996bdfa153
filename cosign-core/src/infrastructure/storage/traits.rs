use crate::domain::address::AddressRecord;
use crate::domain::notification::Notification;
use crate::domain::proposal::{ProposalStatus, TxProposal};
use crate::domain::wallet::{CopayerLookup, Wallet};
use crate::foundation::{CopayerId, NotificationId, ProposalId, Result, WalletId};
use crate::infrastructure::explorer::ExplorerTx;
use serde::{Deserialize, Serialize};

/// Proposal listing filter. Results are always newest first.
#[derive(Clone, Debug, Default)]
pub struct TxQuery {
    /// Inclusive lower bound on `created_on` (seconds).
    pub min_ts: Option<u64>,
    /// Inclusive upper bound on `created_on` (seconds).
    pub max_ts: Option<u64>,
    pub limit: Option<usize>,
}

/// Addresses seen with activity, kept to speed up two-step balance.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveAddresses {
    pub addresses: Vec<String>,
    pub updated_on: u64,
}

/// Head of a wallet history as last fetched; dropped whenever the wallet sees a new tx or block.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistoryCache {
    /// Newest first, starting at the head of the history.
    pub items: Vec<ExplorerTx>,
    /// History length reported by the explorer when the cache was filled.
    pub total: usize,
    pub updated_on: u64,
}

pub trait Storage: Send + Sync {
    fn store_wallet(&self, wallet: &Wallet) -> Result<()>;
    fn fetch_wallet(&self, wallet_id: &WalletId) -> Result<Option<Wallet>>;

    /// Stores the wallet together with the copayer lookups of every copayer it holds.
    fn store_wallet_and_update_copayers_lookup(&self, wallet: &Wallet) -> Result<()>;
    fn fetch_copayer_lookup(&self, copayer_id: &CopayerId) -> Result<Option<CopayerLookup>>;

    fn store_tx(&self, proposal: &TxProposal) -> Result<()>;
    fn fetch_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<Option<TxProposal>>;
    fn fetch_tx_by_hash(&self, wallet_id: &WalletId, txid: &str) -> Result<Option<TxProposal>>;
    fn remove_tx(&self, wallet_id: &WalletId, proposal_id: &ProposalId) -> Result<()>;

    /// Non-temporary proposals of a wallet matching `query`, newest first.
    fn fetch_txs(&self, wallet_id: &WalletId, query: &TxQuery) -> Result<Vec<TxProposal>>;

    /// Pending and accepted proposals, newest first.
    fn fetch_pending_txs(&self, wallet_id: &WalletId) -> Result<Vec<TxProposal>> {
        let txs = self.fetch_txs(wallet_id, &TxQuery::default())?;
        Ok(txs.into_iter().filter(|txp| matches!(txp.status, ProposalStatus::Pending | ProposalStatus::Accepted)).collect())
    }

    /// Most recent proposals created by `creator_id`, newest first.
    fn fetch_last_txs(&self, wallet_id: &WalletId, creator_id: &CopayerId, limit: usize) -> Result<Vec<TxProposal>> {
        let txs = self.fetch_txs(wallet_id, &TxQuery::default())?;
        Ok(txs.into_iter().filter(|txp| &txp.creator_id == creator_id).take(limit).collect())
    }

    /// Broadcasted proposals created at or after `min_ts`, newest first.
    fn fetch_broadcasted_txs(&self, wallet_id: &WalletId, min_ts: u64, limit: usize) -> Result<Vec<TxProposal>> {
        let query = TxQuery { min_ts: Some(min_ts), ..TxQuery::default() };
        let txs = self.fetch_txs(wallet_id, &query)?;
        Ok(txs.into_iter().filter(|txp| txp.is_broadcasted()).take(limit).collect())
    }

    /// Stores an address and the wallet whose address manager produced it.
    ///
    /// An address already known is skipped with a warning; the wallet is still stored.
    fn store_address_and_wallet(&self, wallet: &Wallet, addresses: &[AddressRecord]) -> Result<()>;
    fn store_address(&self, address: &AddressRecord) -> Result<()>;
    /// Sets the activity marker of a stored address; unknown addresses are ignored.
    fn mark_address_activity(&self, wallet_id: &WalletId, address: &str) -> Result<()>;
    /// Addresses of a wallet in creation order.
    fn fetch_addresses(&self, wallet_id: &WalletId) -> Result<Vec<AddressRecord>>;
    fn fetch_address_by_wallet_id(&self, wallet_id: &WalletId, address: &str) -> Result<Option<AddressRecord>>;
    /// Owning wallet of an address across all wallets.
    fn fetch_address_wallet(&self, address: &str) -> Result<Option<WalletId>>;

    fn store_notification(&self, notification: &Notification) -> Result<()>;
    /// Notifications with id greater than `from_id` and `created_on >= min_ts`, in id order.
    fn fetch_notifications(&self, wallet_id: &WalletId, from_id: Option<&NotificationId>, min_ts: u64) -> Result<Vec<Notification>>;

    fn store_active_addresses(&self, wallet_id: &WalletId, addresses: &[String], now: u64) -> Result<()>;
    fn fetch_active_addresses(&self, wallet_id: &WalletId) -> Result<Option<ActiveAddresses>>;

    fn store_tx_history_cache(&self, wallet_id: &WalletId, cache: &TxHistoryCache) -> Result<()>;
    fn fetch_tx_history_cache(&self, wallet_id: &WalletId) -> Result<Option<TxHistoryCache>>;
    fn clear_tx_history_cache(&self, wallet_id: &WalletId) -> Result<()>;

    fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

pub(crate) fn in_query(proposal: &TxProposal, query: &TxQuery) -> bool {
    !proposal.is_temporary()
        && query.min_ts.map_or(true, |min| proposal.created_on >= min)
        && query.max_ts.map_or(true, |max| proposal.created_on <= max)
}

/// Newest first; ties broken by id so the order is total.
pub(crate) fn sort_newest_first(txs: &mut [TxProposal]) {
    txs.sort_by(|a, b| b.created_on.cmp(&a.created_on).then_with(|| b.id.cmp(&a.id)));
}

pub(crate) fn apply_limit(mut txs: Vec<TxProposal>, query: &TxQuery) -> Vec<TxProposal> {
    if let Some(limit) = query.limit {
        txs.truncate(limit);
    }
    txs
}
