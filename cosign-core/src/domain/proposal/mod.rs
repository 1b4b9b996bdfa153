//! Transaction proposals: model, quorum rules and the size/fee model.
//!
//! A proposal moves `temporary -> pending -> {accepted, rejected}` and `accepted -> broadcasted`.
//! Each copayer acts at most once; after every action the rejection quorum is evaluated before
//! the acceptance quorum, so the two outcomes are mutually exclusive.

pub mod builder;
pub mod state_machine;

pub use builder::*;
pub use state_machine::{is_terminal, validate_transition, ProposalStatus};

use crate::domain::address::{AddressRecord, AddressType};
use crate::domain::utxo::Utxo;
use crate::domain::wallet::{required_rejections, Wallet};
use crate::foundation::{CopayerId, CosignError, ProposalId, Result, WalletId};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

/// Estimated size of a single-key input.
pub const P2PKH_INPUT_SIZE: u64 = 147;
/// Version, locktime and the two varint counters.
pub const TX_OVERHEAD_SIZE: u64 = 4 + 4 + 9 + 9;
pub const OUTPUT_SIZE: u64 = 34;
const SIZE_SAFETY_MARGIN: f64 = 0.02;

pub fn estimated_input_size(address_type: AddressType, required_signatures: u8, n: u8) -> u64 {
    match address_type {
        AddressType::P2pkh => P2PKH_INPUT_SIZE,
        AddressType::P2sh => u64::from(required_signatures) * 72 + u64::from(n) * 36 + 44,
    }
}

/// Size estimate in bytes; one change output is always assumed.
pub fn estimated_tx_size(input_size: u64, nb_inputs: usize, nb_outputs: usize) -> u64 {
    let nb_outputs = nb_outputs.max(1) as u64 + 1;
    let size = TX_OVERHEAD_SIZE + input_size * nb_inputs as u64 + OUTPUT_SIZE * nb_outputs;
    (size as f64 * (1.0 + SIZE_SAFETY_MARGIN)).round() as u64
}

pub fn estimated_fee(size: u64, fee_per_kb: u64) -> u64 {
    (size as f64 * fee_per_kb as f64 / 1000.0).round() as u64
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxOutput {
    pub to_address: String,
    pub amount: u64,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionType {
    Accept,
    Reject,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalAction {
    pub version: String,
    pub created_on: u64,
    pub copayer_id: CopayerId,
    #[serde(rename = "type")]
    pub action_type: ActionType,
    #[serde(default)]
    pub signatures: Option<Vec<String>>,
    #[serde(default)]
    pub xpub: Option<String>,
    #[serde(default)]
    pub comment: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TxProposal {
    pub version: u32,
    pub created_on: u64,
    pub id: ProposalId,
    pub wallet_id: WalletId,
    pub creator_id: CopayerId,
    pub coin: String,
    pub network: Network,
    pub outputs: Vec<TxOutput>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub change_address: Option<AddressRecord>,
    #[serde(default)]
    pub inputs: Vec<Utxo>,
    pub wallet_m: u8,
    pub wallet_n: u8,
    pub required_signatures: u8,
    pub required_rejections: u8,
    pub address_type: AddressType,
    pub status: ProposalStatus,
    #[serde(default)]
    pub actions: Vec<ProposalAction>,
    pub fee: u64,
    pub fee_per_kb: u64,
    #[serde(default)]
    pub fee_level: Option<String>,
    #[serde(default)]
    pub exclude_unconfirmed_utxos: bool,
    #[serde(default)]
    pub txid: Option<String>,
    #[serde(default)]
    pub raw: Option<String>,
    #[serde(default)]
    pub broadcasted_on: Option<u64>,
    #[serde(default)]
    pub proposal_signature: Option<String>,
    #[serde(default)]
    pub proposal_signature_pub_key: Option<String>,
    #[serde(default)]
    pub proposal_signature_pub_key_sig: Option<String>,
}

pub struct NewProposal {
    pub id: ProposalId,
    pub creator_id: CopayerId,
    pub outputs: Vec<TxOutput>,
    pub message: Option<String>,
    pub change_address: Option<AddressRecord>,
    pub fee_per_kb: u64,
    pub fee_level: Option<String>,
    pub exclude_unconfirmed_utxos: bool,
}

impl TxProposal {
    pub fn new(wallet: &Wallet, params: NewProposal, created_on: u64) -> Self {
        Self {
            version: 3,
            created_on,
            id: params.id,
            wallet_id: wallet.id.clone(),
            creator_id: params.creator_id,
            coin: wallet.coin.clone(),
            network: wallet.network,
            outputs: params.outputs,
            message: params.message,
            change_address: params.change_address,
            inputs: Vec::new(),
            wallet_m: wallet.m,
            wallet_n: wallet.n,
            required_signatures: wallet.m,
            required_rejections: required_rejections(wallet.m, wallet.n),
            address_type: wallet.address_type,
            status: ProposalStatus::Temporary,
            actions: Vec::new(),
            fee: 0,
            fee_per_kb: params.fee_per_kb,
            fee_level: params.fee_level,
            exclude_unconfirmed_utxos: params.exclude_unconfirmed_utxos,
            txid: None,
            raw: None,
            broadcasted_on: None,
            proposal_signature: None,
            proposal_signature_pub_key: None,
            proposal_signature_pub_key_sig: None,
        }
    }

    pub fn total_amount(&self) -> u64 {
        self.outputs.iter().map(|output| output.amount).sum()
    }

    pub fn input_amount(&self) -> u64 {
        self.inputs.iter().map(|input| input.satoshis).sum()
    }

    /// Change left after outputs and fee; negative when inputs do not cover them.
    pub fn change_amount(&self) -> i128 {
        i128::from(self.input_amount()) - i128::from(self.total_amount()) - i128::from(self.fee)
    }

    pub fn estimated_size_for_single_input(&self) -> u64 {
        estimated_input_size(self.address_type, self.required_signatures, self.wallet_n)
    }

    pub fn estimated_size(&self) -> u64 {
        estimated_tx_size(self.estimated_size_for_single_input(), self.inputs.len(), self.outputs.len())
    }

    pub fn estimated_fee(&self) -> u64 {
        estimated_fee(self.estimated_size(), self.fee_per_kb)
    }

    pub fn input_keys(&self) -> Vec<String> {
        self.inputs.iter().map(Utxo::key).collect()
    }

    pub fn is_temporary(&self) -> bool {
        self.status == ProposalStatus::Temporary
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::Pending
    }

    pub fn is_accepted(&self) -> bool {
        self.count_actions(ActionType::Accept) >= usize::from(self.required_signatures)
    }

    pub fn is_rejected(&self) -> bool {
        self.count_actions(ActionType::Reject) >= usize::from(self.required_rejections)
    }

    pub fn is_broadcasted(&self) -> bool {
        self.status == ProposalStatus::Broadcasted
    }

    pub fn action_by(&self, copayer_id: &CopayerId) -> Option<&ProposalAction> {
        self.actions.iter().find(|action| &action.copayer_id == copayer_id)
    }

    pub fn actors(&self) -> Vec<&CopayerId> {
        self.actions.iter().map(|action| &action.copayer_id).collect()
    }

    fn count_actions(&self, action_type: ActionType) -> usize {
        self.actions.iter().filter(|action| action.action_type == action_type).count()
    }

    /// Checks the one-action-per-copayer rule and that the proposal still collects votes.
    pub fn ensure_can_act(&self, copayer_id: &CopayerId) -> Result<()> {
        if self.action_by(copayer_id).is_some() {
            return Err(CosignError::CopayerVoted);
        }
        if !self.is_pending() {
            return Err(CosignError::TxNotPending);
        }
        Ok(())
    }

    /// Records an action and re-evaluates quorum, rejection first.
    pub fn add_action(&mut self, action: ProposalAction) -> Result<()> {
        self.ensure_can_act(&action.copayer_id)?;
        self.actions.push(action);
        if self.is_rejected() {
            state_machine::transition(&mut self.status, ProposalStatus::Rejected, &self.id)?;
        } else if self.is_accepted() {
            state_machine::transition(&mut self.status, ProposalStatus::Accepted, &self.id)?;
        }
        Ok(())
    }

    pub fn reject(&mut self, copayer_id: &CopayerId, reason: Option<String>, now: u64) -> Result<()> {
        self.add_action(ProposalAction {
            version: "1.0.0".to_string(),
            created_on: now,
            copayer_id: copayer_id.clone(),
            action_type: ActionType::Reject,
            signatures: None,
            xpub: None,
            comment: reason,
        })
    }

    /// Verifies and records a copayer's input signatures; on quorum the final transaction is assembled.
    pub fn sign(&mut self, copayer_id: &CopayerId, signatures: Vec<String>, xpub: &str, now: u64) -> Result<()> {
        self.ensure_can_act(copayer_id)?;
        builder::verify_copayer_signatures(self, xpub, &signatures)?;
        self.add_action(ProposalAction {
            version: "1.0.0".to_string(),
            created_on: now,
            copayer_id: copayer_id.clone(),
            action_type: ActionType::Accept,
            signatures: Some(signatures),
            xpub: Some(xpub.to_string()),
            comment: None,
        })?;
        if self.status == ProposalStatus::Accepted {
            let tx = builder::build_signed_tx(self)?;
            self.raw = Some(bitcoin::consensus::encode::serialize_hex(&tx));
            self.txid = Some(tx.compute_txid().to_string());
        }
        Ok(())
    }

    pub fn publish(&mut self) -> Result<()> {
        state_machine::transition(&mut self.status, ProposalStatus::Pending, &self.id)
    }

    pub fn set_broadcasted(&mut self, now: u64) -> Result<()> {
        state_machine::transition(&mut self.status, ProposalStatus::Broadcasted, &self.id)?;
        self.broadcasted_on = Some(now);
        Ok(())
    }
}
