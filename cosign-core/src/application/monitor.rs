//! Chain event consumer.
//!
//! Mirrors explorer transaction and block events into wallet state: third-party broadcasts of
//! accepted proposals, incoming payments, and new blocks.

use crate::application::service::WalletService;
use crate::domain::notification::NotificationType;
use crate::domain::proposal::ProposalStatus;
use crate::foundation::constants::INCOMING_TX_NOTIFY_WINDOW_SECS;
use crate::foundation::{ProposalId, Result, WalletId};
use crate::infrastructure::explorer::{ExplorerEvent, ExplorerTx};
use log::{debug, info, warn};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

struct AbortOnDrop(JoinHandle<()>);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

#[derive(Default)]
struct IncomingPayment {
    addresses: Vec<String>,
    amount: u64,
}

pub struct BlockchainMonitor {
    service: WalletService,
}

impl BlockchainMonitor {
    pub fn new(service: WalletService) -> Self {
        Self { service }
    }

    /// Runs the monitor on its own task.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    /// Consumes explorer events until the subscription closes. The height cache follows
    /// NewBlock notifications for as long as the monitor runs.
    pub async fn run(&self) {
        let mut events = self.service.explorer.subscribe();
        let invalidator = self.service.height_cache.clone().spawn_invalidator(self.service.bus.subscribe());
        let _invalidator_guard = AbortOnDrop(invalidator);
        info!("blockchain monitor started network={}", self.service.chain.network_name());

        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("blockchain monitor lagged skipped={}", skipped);
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            };
            let outcome = match &event {
                ExplorerEvent::Tx(tx) => self.handle_tx(tx).await,
                ExplorerEvent::Block { hash, height } => self.handle_block(hash, *height).await,
            };
            if let Err(err) = outcome {
                warn!("blockchain event handler error event={:?} error={}", event, err);
            }
        }
        info!("blockchain monitor stopped network={}", self.service.chain.network_name());
    }

    pub async fn handle_tx(&self, tx: &ExplorerTx) -> Result<()> {
        let storage = &self.service.storage;

        let mut spending = BTreeSet::new();
        for address in tx.inputs.iter().filter_map(|input| input.address.as_deref()) {
            if let Some(wallet_id) = storage.fetch_address_wallet(address)? {
                spending.insert(wallet_id);
            }
        }
        for wallet_id in &spending {
            if let Some(txp) = storage.fetch_tx_by_hash(wallet_id, &tx.txid)? {
                if txp.status == ProposalStatus::Accepted {
                    self.mark_broadcasted_by_third_party(wallet_id, &txp.id, &tx.txid).await?;
                }
            }
            storage.clear_tx_history_cache(wallet_id)?;
        }

        let mut incoming: BTreeMap<WalletId, IncomingPayment> = BTreeMap::new();
        for output in &tx.outputs {
            let Some(address) = output.address.as_deref() else {
                continue;
            };
            let Some(wallet_id) = storage.fetch_address_wallet(address)? else {
                continue;
            };
            let receive = storage.fetch_address_by_wallet_id(&wallet_id, address)?.is_some_and(|record| !record.is_change);
            if !receive {
                continue;
            }
            let payment = incoming.entry(wallet_id).or_default();
            payment.addresses.push(address.to_string());
            payment.amount += output.amount;
        }
        for (wallet_id, payment) in incoming {
            self.record_incoming(&wallet_id, &tx.txid, payment).await?;
        }
        Ok(())
    }

    async fn mark_broadcasted_by_third_party(&self, wallet_id: &WalletId, proposal_id: &ProposalId, txid: &str) -> Result<()> {
        let _guard = self.service.lock_wallet(wallet_id).await?;
        let Some(mut txp) = self.service.storage.fetch_tx(wallet_id, proposal_id)? else {
            return Ok(());
        };
        if txp.status != ProposalStatus::Accepted {
            return Ok(());
        }
        txp.set_broadcasted(self.service.now_secs())?;
        self.service.storage.store_tx(&txp)?;
        let data = json!({ "txProposalId": txp.id, "txid": txid, "amount": txp.total_amount() });
        self.service.notify(NotificationType::NewOutgoingTxByThirdParty, wallet_id, None, data).await?;
        info!("proposal broadcasted by third party wallet_id={} proposal_id={} txid={}", wallet_id, txp.id, txid);
        Ok(())
    }

    async fn record_incoming(&self, wallet_id: &WalletId, txid: &str, payment: IncomingPayment) -> Result<()> {
        let storage = &self.service.storage;
        let since = self.service.now_secs().saturating_sub(INCOMING_TX_NOTIFY_WINDOW_SECS);
        let already_notified = storage
            .fetch_notifications(wallet_id, None, since)?
            .iter()
            .any(|notification| notification.kind == NotificationType::NewIncomingTx && notification.data["txid"] == txid);

        if already_notified {
            debug!("incoming tx already notified wallet_id={} txid={}", wallet_id, txid);
        } else {
            let data = json!({ "txid": txid, "address": payment.addresses.first(), "amount": payment.amount });
            self.service.notify(NotificationType::NewIncomingTx, wallet_id, None, data).await?;
            info!("incoming tx wallet_id={} txid={} amount={}", wallet_id, txid, payment.amount);
        }

        storage.clear_tx_history_cache(wallet_id)?;
        if let Some(mut active) = storage.fetch_active_addresses(wallet_id)? {
            let before = active.addresses.len();
            for address in payment.addresses {
                if !active.addresses.contains(&address) {
                    active.addresses.push(address);
                }
            }
            if active.addresses.len() != before {
                storage.store_active_addresses(wallet_id, &active.addresses, active.updated_on)?;
            }
        }
        Ok(())
    }

    pub async fn handle_block(&self, hash: &str, height: u64) -> Result<()> {
        let network = self.service.chain.network_name();
        let data = json!({ "hash": hash, "height": height });
        self.service.notify(NotificationType::NewBlock, &WalletId::new(network.clone()), None, data).await?;

        let mut affected = BTreeSet::new();
        for txid in self.service.explorer.get_txids_in_block(hash).await? {
            let Some(tx) = self.service.explorer.get_transaction(&txid).await? else {
                continue;
            };
            for address in tx.inputs.iter().chain(tx.outputs.iter()).filter_map(|io| io.address.as_deref()) {
                if let Some(wallet_id) = self.service.storage.fetch_address_wallet(address)? {
                    affected.insert(wallet_id);
                }
            }
        }
        for wallet_id in &affected {
            self.service.storage.clear_tx_history_cache(wallet_id)?;
        }
        debug!("new block network={} height={} hash={} wallets_touched={}", network, height, hash, affected.len());
        Ok(())
    }
}
