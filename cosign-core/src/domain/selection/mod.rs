//! Input selection for transaction proposals.
//!
//! Candidates are split around a "big input" threshold. Small inputs are accumulated largest
//! first while the marginal fee stays reasonable; if they cannot cover the payment the smallest
//! big input is used alone. The whole pass is retried over progressively looser confirmation
//! tiers. Ordering is total (value, then outpoint), so the result is a pure function of the pool.

use crate::domain::address::AddressType;
use crate::domain::chain::{ChainParams, SelectionFactors};
use crate::domain::proposal::{estimated_input_size, estimated_tx_size};
use crate::domain::utxo::Utxo;
use crate::foundation::{CosignError, Result};
use log::debug;
use std::cmp::Ordering;
use std::collections::HashSet;

/// Confirmation tiers tried in order; the last one is dropped when unconfirmed inputs are excluded.
const CONFIRMATION_TIERS: [u32; 3] = [6, 1, 0];

#[derive(Clone, Debug, Default)]
pub struct SelectionRequest {
    pub amount: u64,
    pub fee_per_kb: u64,
    pub nb_outputs: usize,
    pub exclude_unconfirmed: bool,
    /// Outpoint keys (`txid:vout`) never to be used.
    pub utxos_to_exclude: Vec<String>,
    /// When set, exactly these outpoints are spent.
    pub fixed_inputs: Option<Vec<String>>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Selection {
    pub inputs: Vec<Utxo>,
    pub fee: u64,
    pub estimated_size: u64,
}

impl Selection {
    pub fn input_amount(&self) -> u64 {
        self.inputs.iter().map(|utxo| utxo.satoshis).sum()
    }
}

#[derive(Clone, Debug)]
pub struct CoinSelector {
    input_size: u64,
    max_tx_size: u64,
    dust_threshold: u64,
    factors: SelectionFactors,
}

impl CoinSelector {
    pub fn new(chain: &ChainParams, address_type: AddressType, required_signatures: u8, n: u8) -> Self {
        Self {
            input_size: estimated_input_size(address_type, required_signatures, n),
            max_tx_size: chain.max_tx_size_bytes(),
            dust_threshold: chain.dust_threshold,
            factors: chain.selection,
        }
    }

    pub fn input_size(&self) -> u64 {
        self.input_size
    }

    pub fn select(&self, request: &SelectionRequest, utxos: &[Utxo]) -> Result<Selection> {
        if let Some(fixed) = &request.fixed_inputs {
            return self.select_fixed(request, fixed, utxos);
        }

        let fee_per_kb = request.fee_per_kb as f64;
        let base_size = estimated_tx_size(self.input_size, 0, request.nb_outputs);
        let base_fee = base_size as f64 * fee_per_kb / 1000.0;
        let fee_per_input = self.input_size as f64 * fee_per_kb / 1000.0;

        let usable = |utxo: &&Utxo| !utxo.spent && (!request.exclude_unconfirmed || utxo.confirmations > 0);
        let total: u64 = utxos.iter().filter(usable).map(|utxo| utxo.satoshis).sum();
        let available: u64 = utxos.iter().filter(usable).filter(|utxo| !utxo.locked).map(|utxo| utxo.satoshis).sum();
        if total < request.amount {
            return Err(CosignError::InsufficientFunds { available: total, required: request.amount });
        }
        if available < request.amount {
            return Err(CosignError::InsufficientFundsForFee("funds are locked by pending transaction proposals".to_string()));
        }

        let excluded: HashSet<&str> = request.utxos_to_exclude.iter().map(String::as_str).collect();
        let candidates: Vec<&Utxo> = utxos
            .iter()
            .filter(usable)
            .filter(|utxo| !utxo.locked)
            .filter(|utxo| utxo.satoshis as f64 > fee_per_input)
            .filter(|utxo| !excluded.contains(utxo.key().as_str()))
            .collect();

        let tiers: &[u32] = if request.exclude_unconfirmed { &CONFIRMATION_TIERS[..2] } else { &CONFIRMATION_TIERS };
        let mut previous_len = None;
        let mut last_error = None;
        for &min_confirmations in tiers {
            let pool: Vec<&Utxo> = candidates.iter().copied().filter(|utxo| utxo.confirmations >= min_confirmations).collect();
            if previous_len == Some(pool.len()) {
                continue;
            }
            previous_len = Some(pool.len());
            debug!(
                "coin selection tier min_confirmations={} candidates={} amount={} fee_per_kb={}",
                min_confirmations,
                pool.len(),
                request.amount,
                request.fee_per_kb
            );
            match self.select_from(&pool, request.amount, base_size, base_fee, fee_per_input) {
                Ok((inputs, fee)) => {
                    let estimated_size = base_size + self.input_size * inputs.len() as u64;
                    return Ok(Selection { inputs: inputs.into_iter().cloned().collect(), fee, estimated_size });
                }
                Err(err) => last_error = Some(err),
            }
        }
        Err(last_error
            .unwrap_or_else(|| CosignError::InsufficientFundsForFee("no spendable inputs cover the amount plus fee".to_string())))
    }

    fn select_from<'a>(
        &self,
        pool: &[&'a Utxo],
        amount: u64,
        base_size: u64,
        base_fee: f64,
        fee_per_input: f64,
    ) -> Result<(Vec<&'a Utxo>, u64)> {
        let total: u64 = pool.iter().map(|utxo| utxo.satoshis).sum();
        let net = total as f64 - base_fee - pool.len() as f64 * fee_per_input;
        if total < amount {
            return Err(CosignError::InsufficientFunds { available: total, required: amount });
        }
        if net < amount as f64 {
            return Err(CosignError::InsufficientFundsForFee(format!("net value {} below amount {}", net.floor(), amount)));
        }

        let big_threshold = amount as f64 * self.factors.max_single_utxo_factor + base_fee + fee_per_input;
        let (mut big, mut small): (Vec<&Utxo>, Vec<&Utxo>) = pool.iter().copied().partition(|utxo| utxo.satoshis as f64 > big_threshold);
        big.sort_by(|a, b| a.satoshis.cmp(&b.satoshis).then_with(|| outpoint_order(a, b)));
        small.sort_by(|a, b| b.satoshis.cmp(&a.satoshis).then_with(|| outpoint_order(a, b)));

        let single_input_fee = base_fee + fee_per_input;
        let mut selected: Vec<&Utxo> = Vec::new();
        let mut fee = 0u64;
        let mut error = None;

        let mut partial: Vec<&Utxo> = Vec::new();
        let mut partial_total = 0u64;
        let mut net_total = -base_fee;
        for utxo in small.iter().copied() {
            let net_input = utxo.satoshis as f64 - fee_per_input;
            partial.push(utxo);
            partial_total += utxo.satoshis;
            net_total += net_input;

            let size = base_size + partial.len() as u64 * self.input_size;
            let partial_fee = (base_fee + partial.len() as f64 * fee_per_input).round() as u64;
            if size > self.max_tx_size {
                error = Some(CosignError::TxMaxSizeExceeded { size, max: self.max_tx_size });
                break;
            }

            if !big.is_empty() {
                if net_input / (amount as f64) < self.factors.min_tx_amount_vs_utxo_factor {
                    break;
                }
                let fee_vs_amount = partial_fee as f64 / amount as f64;
                let fee_vs_single_input = partial_fee as f64 / single_input_fee;
                if fee_vs_amount > self.factors.max_fee_vs_tx_amount_factor
                    && fee_vs_single_input > self.factors.max_fee_vs_single_utxo_fee_factor
                {
                    break;
                }
            }

            if net_total >= amount as f64 {
                selected = partial.clone();
                fee = self.fold_dust_change(partial_total, amount, partial_fee);
                break;
            }
        }

        if selected.is_empty() {
            if let Some(first_big) = big.first() {
                selected = vec![*first_big];
                fee = self.fold_dust_change(first_big.satoshis, amount, single_input_fee.round() as u64);
            }
        }

        if selected.is_empty() {
            return Err(error
                .unwrap_or_else(|| CosignError::InsufficientFundsForFee("no input combination covers the amount plus fee".to_string())));
        }
        Ok((selected, fee))
    }

    /// Change at or below the dust threshold is added to the fee instead of creating an output.
    fn fold_dust_change(&self, input_total: u64, amount: u64, fee: u64) -> u64 {
        let change = i128::from(input_total) - i128::from(amount) - i128::from(fee);
        if change > 0 && change <= i128::from(self.dust_threshold) {
            fee + change as u64
        } else {
            fee
        }
    }

    fn select_fixed(&self, request: &SelectionRequest, fixed: &[String], utxos: &[Utxo]) -> Result<Selection> {
        let mut inputs = Vec::with_capacity(fixed.len());
        for key in fixed {
            let utxo = utxos.iter().find(|utxo| &utxo.key() == key).ok_or(CosignError::UnavailableUtxos)?;
            if utxo.locked || utxo.spent {
                return Err(CosignError::UnavailableUtxos);
            }
            inputs.push(utxo.clone());
        }
        let estimated_size = estimated_tx_size(self.input_size, inputs.len(), request.nb_outputs);
        if estimated_size > self.max_tx_size {
            return Err(CosignError::TxMaxSizeExceeded { size: estimated_size, max: self.max_tx_size });
        }
        let fee = (estimated_size as f64 * request.fee_per_kb as f64 / 1000.0).round() as u64;
        let input_total: u64 = inputs.iter().map(|utxo| utxo.satoshis).sum();
        if input_total < request.amount {
            return Err(CosignError::InsufficientFunds { available: input_total, required: request.amount });
        }
        if input_total < request.amount + fee {
            return Err(CosignError::InsufficientFundsForFee(format!("inputs {} cannot cover amount {} plus fee {}", input_total, request.amount, fee)));
        }
        let fee = self.fold_dust_change(input_total, request.amount, fee);
        Ok(Selection { inputs, fee, estimated_size })
    }
}

fn outpoint_order(a: &Utxo, b: &Utxo) -> Ordering {
    a.txid.cmp(&b.txid).then_with(|| a.vout.cmp(&b.vout))
}
