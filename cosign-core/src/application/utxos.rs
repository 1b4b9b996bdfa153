use crate::application::service::{CopayerContext, WalletService};
use crate::domain::address::AddressRecord;
use crate::domain::fees::{compute_fee_levels, fee_block_targets, FeeLevel};
use crate::domain::notification::NotificationType;
use crate::domain::utxo::{totalize, Balance, Utxo};
use crate::domain::wallet::Wallet;
use crate::foundation::constants::{SPENT_INPUTS_LIMIT, SPENT_INPUTS_WINDOW_SECS};
use crate::foundation::{Result, WalletId};
use log::{debug, warn};
use std::collections::{HashMap, HashSet};

impl WalletService {
    /// Wallet UTXOs with local `locked`/`spent` bookkeeping applied.
    pub async fn get_utxos(&self, ctx: &CopayerContext) -> Result<Vec<Utxo>> {
        let wallet = self.fetch_wallet(&ctx.wallet_id)?;
        self.wallet_utxos(&wallet, None).await
    }

    /// Fetches UTXOs of `only` (or every wallet address) and reconciles them with local proposals.
    ///
    /// Inputs of pending or accepted proposals are marked locked. Inputs of proposals broadcast
    /// within the spent window are dropped, since the explorer may still report them.
    pub(crate) async fn wallet_utxos(&self, wallet: &Wallet, only: Option<&[String]>) -> Result<Vec<Utxo>> {
        let records = self.storage.fetch_addresses(&wallet.id)?;
        let by_address: HashMap<&str, &AddressRecord> = records.iter().map(|record| (record.address.as_str(), record)).collect();
        let addresses: Vec<String> = match only {
            Some(only) => only.iter().filter(|address| by_address.contains_key(address.as_str())).cloned().collect(),
            None => records.iter().map(|record| record.address.clone()).collect(),
        };
        if addresses.is_empty() {
            return Ok(Vec::new());
        }

        let mut utxos = self.explorer.get_utxos(&addresses).await?;
        let mut seen = HashSet::new();
        utxos.retain(|utxo| seen.insert(utxo.key()));

        let locked: HashSet<String> = self.storage.fetch_pending_txs(&wallet.id)?.iter().flat_map(|txp| txp.input_keys()).collect();
        let min_ts = self.now_secs().saturating_sub(SPENT_INPUTS_WINDOW_SECS);
        let spent: HashSet<String> = self
            .storage
            .fetch_broadcasted_txs(&wallet.id, min_ts, SPENT_INPUTS_LIMIT)?
            .iter()
            .flat_map(|txp| txp.input_keys())
            .collect();

        let mut result = Vec::with_capacity(utxos.len());
        for mut utxo in utxos {
            let key = utxo.key();
            if spent.contains(&key) {
                continue;
            }
            utxo.locked = locked.contains(&key);
            if let Some(record) = by_address.get(utxo.address.as_str()) {
                utxo.path = Some(record.path.clone());
                utxo.public_keys = record.public_keys.clone();
            }
            result.push(utxo);
        }
        debug!("wallet utxos fetched wallet_id={} utxos={} locked={} spent={}", wallet.id, result.len(), locked.len(), spent.len());
        Ok(result)
    }

    /// Wallet balance. Large wallets with a fresh active-address set get a fast partial balance
    /// first while the full balance is computed in the background.
    pub async fn get_balance(&self, ctx: &CopayerContext, two_step: bool) -> Result<Balance> {
        let wallet = self.fetch_wallet(&ctx.wallet_id)?;
        let address_count = self.storage.fetch_addresses(&wallet.id)?.len();
        let large = address_count >= self.settings.two_step_balance_threshold;

        if two_step && large {
            if let Some(active) = self.storage.fetch_active_addresses(&wallet.id)? {
                let fresh = self.now_secs().saturating_sub(active.updated_on) <= self.settings.active_addresses_ttl_secs;
                if fresh {
                    let partial = totalize(&self.wallet_utxos(&wallet, Some(&active.addresses)).await?);
                    self.spawn_full_balance(wallet, partial.clone());
                    return Ok(partial);
                }
            }
        }

        let balance = totalize(&self.wallet_utxos(&wallet, None).await?);
        if large {
            self.store_active_addresses(&wallet.id, &balance)?;
        }
        Ok(balance)
    }

    fn store_active_addresses(&self, wallet_id: &WalletId, balance: &Balance) -> Result<()> {
        let active: Vec<String> = balance.by_address.iter().map(|entry| entry.address.clone()).collect();
        self.storage.store_active_addresses(wallet_id, &active, self.now_secs())
    }

    fn spawn_full_balance(&self, wallet: Wallet, partial: Balance) {
        let service = self.clone();
        tokio::spawn(async move {
            let full = match service.wallet_utxos(&wallet, None).await {
                Ok(utxos) => totalize(&utxos),
                Err(err) => {
                    warn!("background balance failed wallet_id={} error={}", wallet.id, err);
                    return;
                }
            };
            if let Err(err) = service.store_active_addresses(&wallet.id, &full) {
                warn!("storing active addresses failed wallet_id={} error={}", wallet.id, err);
            }
            if full != partial {
                let data = serde_json::to_value(&full).unwrap_or_default();
                if let Err(err) = service.notify(NotificationType::BalanceUpdated, &wallet.id, None, data).await {
                    warn!("balance update notification failed wallet_id={} error={}", wallet.id, err);
                }
            }
        });
    }

    /// Fee levels from explorer estimates, falling back to the level defaults.
    pub async fn get_fee_levels(&self) -> Result<Vec<FeeLevel>> {
        let targets = fee_block_targets(&self.chain);
        let samples = self.explorer.estimate_fee(&targets).await?;
        Ok(compute_fee_levels(&self.chain, &samples))
    }
}
