use crate::application::service::{CopayerContext, WalletService};
use crate::domain::address::AddressRecord;
use crate::domain::notification::NotificationType;
use crate::domain::wallet::Wallet;
use crate::foundation::{CosignError, Result};
use log::{debug, info};
use serde_json::json;

impl WalletService {
    /// Derives and stores the next receive address of the wallet.
    pub async fn create_address(&self, ctx: &CopayerContext, ignore_max_gap: bool) -> Result<AddressRecord> {
        let _guard = self.lock_wallet(&ctx.wallet_id).await?;
        let mut wallet = self.fetch_wallet(&ctx.wallet_id)?;
        if !wallet.is_complete() {
            return Err(CosignError::WalletNotComplete);
        }

        if wallet.single_address {
            if let Some(first) = self.storage.fetch_addresses(&wallet.id)?.into_iter().next() {
                return Ok(first);
            }
        } else if !ignore_max_gap && !self.can_create_address(&wallet).await? {
            return Err(CosignError::MainAddressGapReached);
        }

        let address = wallet.create_address(false, self.now_secs())?;
        self.storage.store_address_and_wallet(&wallet, std::slice::from_ref(&address))?;
        self.notify(NotificationType::NewAddress, &wallet.id, Some(&ctx.copayer_id), json!({ "address": address.address })).await?;
        info!("address created wallet_id={} address={} path={}", wallet.id, address.address, address.path);
        Ok(address)
    }

    /// Receive addresses in creation order, or newest first when `reverse` is set.
    pub fn get_main_addresses(&self, ctx: &CopayerContext, limit: Option<usize>, reverse: bool) -> Result<Vec<AddressRecord>> {
        let mut addresses: Vec<AddressRecord> =
            self.storage.fetch_addresses(&ctx.wallet_id)?.into_iter().filter(|address| !address.is_change).collect();
        if reverse {
            addresses.reverse();
        }
        if let Some(limit) = limit {
            addresses.truncate(limit);
        }
        Ok(addresses)
    }

    /// Gap-limit check over the newest main addresses.
    ///
    /// When none of the last `max_main_address_gap` main addresses is known to have activity, the
    /// explorer is asked newest first; the first active address found is marked and unblocks creation.
    async fn can_create_address(&self, wallet: &Wallet) -> Result<bool> {
        let gap = self.settings.max_main_address_gap;
        let main: Vec<AddressRecord> = self.storage.fetch_addresses(&wallet.id)?.into_iter().filter(|address| !address.is_change).collect();
        if main.len() < gap {
            return Ok(true);
        }

        let latest = &main[main.len() - gap..];
        if latest.iter().any(|address| address.has_activity == Some(true)) {
            return Ok(true);
        }

        for address in latest.iter().rev() {
            if self.explorer.get_address_activity(&address.address).await? {
                debug!("address activity found wallet_id={} address={}", wallet.id, address.address);
                self.storage.mark_address_activity(&wallet.id, &address.address)?;
                return Ok(true);
            }
        }
        Ok(false)
    }
}
