use crate::application::service::{CopayerContext, WalletService};
use crate::domain::address::AddressRecord;
use crate::domain::notification::{Notification, NotificationType};
use crate::domain::proposal::{build_unsigned_tx, parse_address, raw_unsigned_hex, NewProposal, ProposalStatus, TxOutput, TxProposal};
use crate::domain::selection::{CoinSelector, SelectionRequest};
use crate::domain::wallet::Wallet;
use crate::foundation::{verify_message, CosignError, NotificationId, ProposalId, Result};
use crate::infrastructure::storage::TxQuery;
use log::{debug, info, warn};
use serde_json::{json, Value};
use std::collections::HashSet;

#[derive(Clone, Debug, Default)]
pub struct CreateTxParams {
    /// Idempotency key; re-submitting the same id returns the stored proposal.
    pub proposal_id: Option<ProposalId>,
    pub outputs: Vec<TxOutput>,
    pub message: Option<String>,
    pub fee_per_kb: Option<u64>,
    pub fee_level: Option<String>,
    pub change_address: Option<String>,
    pub exclude_unconfirmed_utxos: bool,
    pub utxos_to_exclude: Vec<String>,
    /// Exact inputs to spend (`txid:vout`), bypassing selection.
    pub inputs: Option<Vec<String>>,
    /// Builds and returns the proposal without persisting anything.
    pub dry_run: bool,
}

fn proposal_data(txp: &TxProposal) -> Value {
    json!({
        "txProposalId": txp.id,
        "creatorId": txp.creator_id,
        "amount": txp.total_amount(),
        "message": txp.message,
    })
}

impl WalletService {
    fn validate_outputs(&self, outputs: &[TxOutput]) -> Result<()> {
        if outputs.is_empty() {
            return Err(CosignError::invalid_argument("no outputs were specified"));
        }
        for output in outputs {
            parse_address(&output.to_address, self.chain.network)?;
            if output.amount == 0 {
                return Err(CosignError::invalid_argument("invalid amount"));
            }
            if output.amount < self.chain.dust_threshold {
                return Err(CosignError::DustAmount { amount: output.amount, threshold: self.chain.dust_threshold });
            }
        }
        Ok(())
    }

    /// Explicit rate, named level, or the default level, in that order.
    async fn resolve_fee(&self, params: &CreateTxParams) -> Result<(u64, Option<String>)> {
        if params.fee_per_kb.is_some() && params.fee_level.is_some() {
            return Err(CosignError::invalid_argument("only one of fee_per_kb or fee_level may be specified"));
        }
        if let Some(fee_per_kb) = params.fee_per_kb {
            if !self.chain.fee_per_kb_in_range(fee_per_kb) {
                return Err(CosignError::invalid_argument(format!("invalid fee per kB {}", fee_per_kb)));
            }
            return Ok((fee_per_kb, None));
        }

        let name = params.fee_level.clone().unwrap_or_else(|| self.chain.default_fee_level.clone());
        if self.chain.fee_level(&name).is_none() {
            return Err(CosignError::invalid_argument(format!("invalid fee level {}", name)));
        }
        let level = self
            .get_fee_levels()
            .await?
            .into_iter()
            .find(|level| level.level == name)
            .ok_or_else(|| CosignError::invalid_argument(format!("invalid fee level {}", name)))?;
        if !self.chain.fee_per_kb_in_range(level.fee_per_kb) {
            return Err(CosignError::invalid_argument(format!("fee level {} out of range: {}", name, level.fee_per_kb)));
        }
        Ok((level.fee_per_kb, Some(name)))
    }

    /// Refuses creation after too many consecutive rejections by the same creator, until the
    /// back-off window since the latest of them has passed.
    fn check_backoff(&self, ctx: &CopayerContext) -> Result<()> {
        let offset = self.settings.backoff_offset;
        let last = self.storage.fetch_last_txs(&ctx.wallet_id, &ctx.copayer_id, offset + 5)?;
        let rejected = last.iter().take_while(|txp| txp.status == ProposalStatus::Rejected).count();
        if rejected <= offset {
            return Ok(());
        }
        let latest = last.first().map(|txp| txp.created_on).unwrap_or_default();
        if self.now_secs() <= latest + self.settings.backoff_time_secs {
            debug!("proposal creation in back-off wallet_id={} copayer_id={} rejected={}", ctx.wallet_id, ctx.copayer_id, rejected);
            return Err(CosignError::TxCannotCreate);
        }
        Ok(())
    }

    /// Change address for a new proposal; `true` when it was freshly derived and must be stored.
    fn resolve_change_address(&self, wallet: &mut Wallet, requested: Option<&str>) -> Result<(AddressRecord, bool)> {
        if wallet.single_address {
            let first = self
                .storage
                .fetch_addresses(&wallet.id)?
                .into_iter()
                .next()
                .ok_or_else(|| CosignError::invalid_argument("the wallet has no addresses"))?;
            return Ok((first, false));
        }
        if let Some(requested) = requested {
            let record = self.storage.fetch_address_by_wallet_id(&wallet.id, requested)?.ok_or(CosignError::InvalidChangeAddress)?;
            return Ok((record, false));
        }
        Ok((wallet.create_address(true, self.now_secs())?, true))
    }

    /// Builds a temporary proposal: validates outputs and fee, selects inputs and reserves a change address.
    pub async fn create_tx(&self, ctx: &CopayerContext, params: CreateTxParams) -> Result<TxProposal> {
        self.validate_outputs(&params.outputs)?;
        let (fee_per_kb, fee_level) = self.resolve_fee(&params).await?;

        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let mut wallet = self.fetch_wallet(&ctx.wallet_id)?;
        if !wallet.is_complete() {
            return Err(CosignError::WalletNotComplete);
        }
        if let Some(id) = &params.proposal_id {
            if let Some(existing) = self.storage.fetch_tx(&wallet.id, id)? {
                debug!("proposal already exists wallet_id={} proposal_id={}", wallet.id, id);
                return Ok(existing);
            }
        }
        self.check_backoff(ctx)?;

        let (change_address, derived) = self.resolve_change_address(&mut wallet, params.change_address.as_deref())?;
        let mut txp = TxProposal::new(
            &wallet,
            NewProposal {
                id: params.proposal_id.clone().unwrap_or_else(ProposalId::random),
                creator_id: ctx.copayer_id.clone(),
                outputs: params.outputs,
                message: params.message,
                change_address: Some(change_address.clone()),
                fee_per_kb,
                fee_level,
                exclude_unconfirmed_utxos: params.exclude_unconfirmed_utxos,
            },
            self.now_secs(),
        );

        let utxos = self.wallet_utxos(&wallet, None).await?;
        let selector = CoinSelector::new(&self.chain, wallet.address_type, txp.required_signatures, wallet.n);
        let selection = selector.select(
            &SelectionRequest {
                amount: txp.total_amount(),
                fee_per_kb,
                nb_outputs: txp.outputs.len(),
                exclude_unconfirmed: params.exclude_unconfirmed_utxos,
                utxos_to_exclude: params.utxos_to_exclude,
                fixed_inputs: params.inputs,
            },
            &utxos,
        )?;
        txp.fee = selection.fee;
        txp.inputs = selection.inputs;
        build_unsigned_tx(&txp)?;

        if params.dry_run {
            debug!("proposal dry run wallet_id={} inputs={} fee={}", wallet.id, txp.inputs.len(), txp.fee);
            return Ok(txp);
        }
        if derived {
            self.storage.store_address_and_wallet(&wallet, std::slice::from_ref(&change_address))?;
        }
        self.storage.store_tx(&txp)?;
        info!(
            "proposal created wallet_id={} proposal_id={} amount={} fee={} inputs={}",
            wallet.id,
            txp.id,
            txp.total_amount(),
            txp.fee,
            txp.inputs.len()
        );
        Ok(txp)
    }

    /// Moves a temporary proposal to pending once the creator signed its unsigned serialization.
    pub async fn publish_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId, proposal_signature: &str) -> Result<TxProposal> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let wallet = self.fetch_wallet(&ctx.wallet_id)?;
        let mut txp = self.fetch_proposal(ctx, proposal_id)?;
        if !txp.is_temporary() {
            return Ok(txp);
        }
        if txp.creator_id != ctx.copayer_id {
            return Err(CosignError::NotAuthorized("only the creator can publish a proposal".to_string()));
        }
        let copayer = wallet.copayer(&ctx.copayer_id).ok_or_else(|| CosignError::NotAuthorized("copayer not found".to_string()))?;

        let raw = raw_unsigned_hex(&txp)?;
        let signing_key = copayer
            .request_pub_keys
            .iter()
            .find(|key| verify_message(&raw, proposal_signature, &key.key))
            .cloned()
            .ok_or_else(|| CosignError::BadSignatures("invalid proposal signature".to_string()))?;

        let available: HashSet<String> =
            self.wallet_utxos(&wallet, None).await?.into_iter().filter(|utxo| !utxo.locked).map(|utxo| utxo.key()).collect();
        if txp.input_keys().iter().any(|key| !available.contains(key)) {
            return Err(CosignError::UnavailableUtxos);
        }

        txp.proposal_signature = Some(proposal_signature.to_string());
        if signing_key.self_signed {
            txp.proposal_signature_pub_key = Some(signing_key.key);
            txp.proposal_signature_pub_key_sig = Some(signing_key.signature);
        }
        txp.publish()?;
        self.storage.store_tx(&txp)?;
        self.notify(NotificationType::NewTxProposal, &wallet.id, Some(&ctx.copayer_id), proposal_data(&txp)).await?;
        info!("proposal published wallet_id={} proposal_id={}", wallet.id, txp.id);
        Ok(txp)
    }

    /// Records the caller's input signatures; the final transaction is assembled on quorum.
    pub async fn sign_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId, signatures: Vec<String>) -> Result<TxProposal> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let wallet = self.fetch_wallet(&ctx.wallet_id)?;
        let copayer = wallet.copayer(&ctx.copayer_id).ok_or_else(|| CosignError::NotAuthorized("copayer not found".to_string()))?;
        let mut txp = self.fetch_proposal(ctx, proposal_id)?;

        txp.sign(&ctx.copayer_id, signatures, &copayer.xpub, self.now_secs())?;
        self.storage.store_tx(&txp)?;

        let kind = match txp.status {
            ProposalStatus::Accepted => NotificationType::TxProposalFinallyAccepted,
            _ => NotificationType::TxProposalAcceptedBy,
        };
        self.notify(kind, &wallet.id, Some(&ctx.copayer_id), proposal_data(&txp)).await?;
        info!("proposal signed wallet_id={} proposal_id={} copayer_id={} status={}", wallet.id, txp.id, ctx.copayer_id, txp.status);
        Ok(txp)
    }

    pub async fn reject_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId, reason: Option<String>) -> Result<TxProposal> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let mut txp = self.fetch_proposal(ctx, proposal_id)?;

        txp.reject(&ctx.copayer_id, reason, self.now_secs())?;
        self.storage.store_tx(&txp)?;

        let kind = match txp.status {
            ProposalStatus::Rejected => NotificationType::TxProposalFinallyRejected,
            _ => NotificationType::TxProposalRejectedBy,
        };
        self.notify(kind, &ctx.wallet_id, Some(&ctx.copayer_id), proposal_data(&txp)).await?;
        info!("proposal rejected wallet_id={} proposal_id={} copayer_id={} status={}", ctx.wallet_id, txp.id, ctx.copayer_id, txp.status);
        Ok(txp)
    }

    /// Submits an accepted proposal. A failed submission of a transaction the explorer already
    /// knows counts as a third-party broadcast.
    pub async fn broadcast_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId) -> Result<TxProposal> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let mut txp = self.fetch_proposal(ctx, proposal_id)?;
        if txp.is_broadcasted() {
            return Err(CosignError::TxAlreadyBroadcasted);
        }
        if txp.status != ProposalStatus::Accepted {
            return Err(CosignError::TxNotAccepted);
        }
        let raw = txp.raw.clone().ok_or(CosignError::TxNotAccepted)?;
        let txid = txp.txid.clone().ok_or(CosignError::TxNotAccepted)?;

        let kind = match self.explorer.broadcast(&raw).await {
            Ok(_) => NotificationType::NewOutgoingTx,
            Err(err) => {
                if self.explorer.get_transaction(&txid).await?.is_none() {
                    warn!("broadcast failed wallet_id={} proposal_id={} txid={} error={}", ctx.wallet_id, txp.id, txid, err);
                    return Err(err);
                }
                info!("broadcast refused but transaction is known wallet_id={} txid={}", ctx.wallet_id, txid);
                NotificationType::NewOutgoingTxByThirdParty
            }
        };

        txp.set_broadcasted(self.now_secs())?;
        self.storage.store_tx(&txp)?;
        self.storage.clear_tx_history_cache(&ctx.wallet_id)?;
        let mut data = proposal_data(&txp);
        data["txid"] = json!(txid);
        self.notify(kind, &ctx.wallet_id, Some(&ctx.copayer_id), data).await?;
        info!("proposal broadcasted wallet_id={} proposal_id={} txid={}", ctx.wallet_id, txp.id, txid);
        Ok(txp)
    }

    /// Seconds until any copayer may remove the proposal; zero when removal is allowed now.
    ///
    /// The creator may remove immediately while no other copayer has acted on it.
    pub fn get_remaining_delete_lock_time(&self, ctx: &CopayerContext, txp: &TxProposal) -> u64 {
        let actors = txp.actors();
        if txp.creator_id == ctx.copayer_id && actors.iter().all(|actor| **actor == ctx.copayer_id) {
            return 0;
        }
        let unlock_at = txp.created_on + self.settings.delete_lock_time_secs;
        unlock_at.saturating_sub(self.now_secs())
    }

    pub async fn remove_pending_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId) -> Result<()> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let txp = self.fetch_proposal(ctx, proposal_id)?;
        if !txp.is_pending() {
            return Err(CosignError::TxNotPending);
        }
        let remaining_secs = self.get_remaining_delete_lock_time(ctx, &txp);
        if remaining_secs > 0 {
            return Err(CosignError::TxCannotRemove { remaining_secs });
        }

        self.storage.remove_tx(&ctx.wallet_id, &txp.id)?;
        self.notify(NotificationType::TxProposalRemoved, &ctx.wallet_id, Some(&ctx.copayer_id), proposal_data(&txp)).await?;
        info!("proposal removed wallet_id={} proposal_id={} copayer_id={}", ctx.wallet_id, txp.id, ctx.copayer_id);
        Ok(())
    }

    pub fn get_tx(&self, ctx: &CopayerContext, proposal_id: &ProposalId) -> Result<TxProposal> {
        self.fetch_proposal(ctx, proposal_id)
    }

    /// Pending and accepted proposals, newest first.
    pub fn get_pending_txs(&self, ctx: &CopayerContext) -> Result<Vec<TxProposal>> {
        self.storage.fetch_pending_txs(&ctx.wallet_id)
    }

    /// Published proposals created within `[min_ts, max_ts]`, newest first.
    pub fn get_txs(&self, ctx: &CopayerContext, query: &TxQuery) -> Result<Vec<TxProposal>> {
        self.storage.fetch_txs(&ctx.wallet_id, query)
    }

    /// Notifications after `from_id` (exclusive) and not older than `min_ts`, in id order.
    pub fn get_notifications(&self, ctx: &CopayerContext, from_id: Option<&NotificationId>, min_ts: u64) -> Result<Vec<Notification>> {
        self.storage.fetch_notifications(&ctx.wallet_id, from_id, min_ts)
    }

    fn fetch_proposal(&self, ctx: &CopayerContext, proposal_id: &ProposalId) -> Result<TxProposal> {
        self.storage.fetch_tx(&ctx.wallet_id, proposal_id)?.ok_or(CosignError::TxNotFound)
    }
}
