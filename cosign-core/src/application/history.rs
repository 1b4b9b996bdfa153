use crate::application::service::{CopayerContext, WalletService};
use crate::domain::proposal::{ProposalAction, TxProposal};
use crate::domain::wallet::Wallet;
use crate::foundation::constants::HISTORY_LIMIT;
use crate::foundation::{ProposalId, Result};
use crate::infrastructure::explorer::ExplorerTx;
use crate::infrastructure::storage::TxHistoryCache;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HistoryAction {
    Sent,
    Received,
    Moved,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistoryOutput {
    pub address: String,
    pub amount: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxHistoryItem {
    pub txid: String,
    pub action: HistoryAction,
    pub amount: u64,
    pub fees: u64,
    pub time: u64,
    pub confirmations: u32,
    #[serde(default)]
    pub block_height: Option<u64>,
    #[serde(default)]
    pub proposal_id: Option<ProposalId>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub creator_name: Option<String>,
    #[serde(default)]
    pub actions: Vec<ProposalAction>,
    #[serde(default)]
    pub outputs: Vec<TxHistoryOutput>,
}

/// Wallet address ownership: `true` for change addresses.
type OwnAddresses = HashMap<String, bool>;

/// Classifies a transaction from the wallet's point of view.
///
/// Spending own inputs to only own outputs is a move; the amount then excludes change.
fn classify(tx: &ExplorerTx, own: &OwnAddresses) -> (HistoryAction, u64) {
    let is_own = |address: &Option<String>| address.as_ref().is_some_and(|address| own.contains_key(address));
    let amount_in: u64 = tx.inputs.iter().filter(|input| is_own(&input.address)).map(|input| input.amount).sum();
    let amount_out: u64 = tx.outputs.iter().filter(|output| is_own(&output.address)).map(|output| output.amount).sum();
    let amount_out_change: u64 = tx
        .outputs
        .iter()
        .filter(|output| output.address.as_ref().is_some_and(|address| own.get(address) == Some(&true)))
        .map(|output| output.amount)
        .sum();

    if amount_in == 0 {
        return (HistoryAction::Received, amount_out);
    }
    if amount_in == amount_out + tx.fees {
        return (HistoryAction::Moved, amount_out - amount_out_change);
    }
    (HistoryAction::Sent, amount_in.saturating_sub(amount_out + tx.fees))
}

fn decorate(tx: &ExplorerTx, own: &OwnAddresses, wallet: &Wallet, proposal: Option<TxProposal>) -> TxHistoryItem {
    let (action, amount) = classify(tx, own);
    let mut outputs: Vec<TxHistoryOutput> = tx
        .outputs
        .iter()
        .filter_map(|output| {
            let address = output.address.clone()?;
            let keep = match action {
                HistoryAction::Sent => !own.contains_key(&address),
                HistoryAction::Received => own.contains_key(&address),
                HistoryAction::Moved => own.get(&address) == Some(&false),
            };
            keep.then_some(TxHistoryOutput { address, amount: output.amount, message: None })
        })
        .collect();

    let mut item = TxHistoryItem {
        txid: tx.txid.clone(),
        action,
        amount,
        fees: tx.fees,
        time: tx.time,
        confirmations: tx.confirmations,
        block_height: tx.block_height,
        proposal_id: None,
        message: None,
        creator_name: None,
        actions: Vec::new(),
        outputs: Vec::new(),
    };

    if let Some(txp) = proposal {
        for output in &mut outputs {
            output.message =
                txp.outputs.iter().find(|proposed| proposed.to_address == output.address).and_then(|proposed| proposed.message.clone());
        }
        item.creator_name = wallet.copayer(&txp.creator_id).map(|copayer| copayer.name.clone());
        item.proposal_id = Some(txp.id);
        item.message = txp.message;
        item.actions = txp.actions;
    }
    item.outputs = outputs;
    item
}

impl WalletService {
    /// History page `[skip, skip + limit)`, newest first.
    ///
    /// The head of the history is cached per wallet until the next transaction or block touching it.
    pub async fn get_tx_history(&self, ctx: &CopayerContext, skip: usize, limit: usize) -> Result<Vec<TxHistoryItem>> {
        let limit = limit.min(HISTORY_LIMIT);
        let wallet = self.fetch_wallet(&ctx.wallet_id)?;
        let records = self.storage.fetch_addresses(&wallet.id)?;
        if records.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }
        let own: OwnAddresses = records.iter().map(|record| (record.address.clone(), record.is_change)).collect();

        let needed = skip + limit;
        let cached = self.storage.fetch_tx_history_cache(&wallet.id)?.filter(|cache| cache.items.len() >= needed.min(cache.total));
        let items = match cached {
            Some(cache) => {
                debug!("tx history served from cache wallet_id={} cached={} total={}", wallet.id, cache.items.len(), cache.total);
                cache.items
            }
            None => {
                let addresses: Vec<String> = records.iter().map(|record| record.address.clone()).collect();
                let (items, total) = self.explorer.get_transactions(&addresses, 0, needed).await?;
                let cache = TxHistoryCache { items, total, updated_on: self.now_secs() };
                self.storage.store_tx_history_cache(&wallet.id, &cache)?;
                debug!("tx history fetched wallet_id={} fetched={} total={}", wallet.id, cache.items.len(), total);
                cache.items
            }
        };

        let mut page = Vec::with_capacity(limit);
        for tx in items.iter().skip(skip).take(limit) {
            let proposal = self.storage.fetch_tx_by_hash(&wallet.id, &tx.txid)?;
            page.push(decorate(tx, &own, &wallet, proposal));
        }
        Ok(page)
    }
}
