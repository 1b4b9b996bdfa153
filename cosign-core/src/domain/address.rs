//! Address derivation and per-branch address counters.

use crate::foundation::constants::BIP45_SHARED_INDEX;
use crate::foundation::{derive_child_pubkey_str, redeem_script_from_pubkeys, sort_pubkeys, CosignError, Result, WalletId};
use bitcoin::{Address, Network};
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AddressType {
    #[serde(rename = "P2SH")]
    P2sh,
    #[serde(rename = "P2PKH")]
    P2pkh,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DerivationStrategy {
    #[serde(rename = "BIP44")]
    Bip44,
    #[serde(rename = "BIP45")]
    Bip45,
}

/// Monotonic receive/change counters of a wallet. BIP45 wallets derive on the shared
/// copayer branch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressManager {
    pub version: u32,
    pub derivation_strategy: DerivationStrategy,
    pub receive_address_index: u32,
    pub change_address_index: u32,
    pub copayer_index: u32,
}

impl AddressManager {
    pub fn new(derivation_strategy: DerivationStrategy) -> Self {
        Self { version: 2, derivation_strategy, receive_address_index: 0, change_address_index: 0, copayer_index: BIP45_SHARED_INDEX }
    }

    pub fn current_index(&self, is_change: bool) -> u32 {
        if is_change {
            self.change_address_index
        } else {
            self.receive_address_index
        }
    }

    pub fn base_address_path(&self, is_change: bool) -> String {
        let change = if is_change { 1 } else { 0 };
        match self.derivation_strategy {
            DerivationStrategy::Bip45 => format!("m/{}/{}", self.copayer_index, change),
            DerivationStrategy::Bip44 => format!("m/{}", change),
        }
    }

    pub fn current_address_path(&self, is_change: bool) -> String {
        format!("{}/{}", self.base_address_path(is_change), self.current_index(is_change))
    }

    /// Returns the current path of the branch and advances its counter.
    pub fn next_address_path(&mut self, is_change: bool) -> String {
        let path = self.current_address_path(is_change);
        self.increment(is_change);
        path
    }

    /// Steps the branch counter back by `n`, floored at zero.
    pub fn rewind_index(&mut self, is_change: bool, n: u32) {
        if is_change {
            self.change_address_index = self.change_address_index.saturating_sub(n);
        } else {
            self.receive_address_index = self.receive_address_index.saturating_sub(n);
        }
    }

    fn increment(&mut self, is_change: bool) {
        if is_change {
            self.change_address_index += 1;
        } else {
            self.receive_address_index += 1;
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressRecord {
    pub version: String,
    pub created_on: u64,
    pub address: String,
    pub wallet_id: WalletId,
    pub is_change: bool,
    pub path: String,
    pub public_keys: Vec<String>,
    pub coin: String,
    pub network: Network,
    #[serde(rename = "type")]
    pub address_type: AddressType,
    #[serde(default)]
    pub has_activity: Option<bool>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DerivedAddress {
    pub address: String,
    pub path: String,
    pub public_keys: Vec<String>,
}

/// Derives one child key per xpub at `path` and builds the P2SH multisig or P2PKH address.
pub fn derive_address(address_type: AddressType, xpubs: &[String], path: &str, m: u8, network: Network) -> Result<DerivedAddress> {
    let mut public_keys = xpubs.iter().map(|xpub| derive_child_pubkey_str(xpub, path)).collect::<Result<Vec<_>>>()?;
    let address = match address_type {
        AddressType::P2sh => {
            sort_pubkeys(&mut public_keys);
            let redeem = redeem_script_from_pubkeys(&public_keys, m)?;
            Address::p2sh(&redeem, network).map_err(|err| CosignError::crypto("p2sh address", err))?
        }
        AddressType::P2pkh => {
            if public_keys.len() != 1 {
                return Err(CosignError::invalid_argument(format!("P2PKH requires exactly one public key, got {}", public_keys.len())));
            }
            Address::p2pkh(public_keys[0].pubkey_hash(), network)
        }
    };
    Ok(DerivedAddress {
        address: address.to_string(),
        path: path.to_string(),
        public_keys: public_keys.iter().map(|key| key.to_string()).collect(),
    })
}

impl AddressRecord {
    #[allow(clippy::too_many_arguments)]
    pub fn derive(
        wallet_id: &WalletId,
        address_type: AddressType,
        xpubs: &[String],
        path: &str,
        m: u8,
        coin: &str,
        network: Network,
        is_change: bool,
        created_on: u64,
    ) -> Result<Self> {
        let derived = derive_address(address_type, xpubs, path, m, network)?;
        Ok(Self {
            version: "1.0.0".to_string(),
            created_on,
            address: derived.address,
            wallet_id: wallet_id.clone(),
            is_change,
            path: derived.path,
            public_keys: derived.public_keys,
            coin: coin.to_string(),
            network,
            address_type,
            has_activity: None,
        })
    }
}
