use crate::domain::address::{AddressManager, AddressRecord, AddressType, DerivationStrategy};
use crate::foundation::constants::MAX_COPAYERS;
use crate::foundation::{copayer_id_from_xpub, CopayerId, CosignError, Result, WalletId};
use bitcoin::Network;
use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WalletStatus {
    Pending,
    Complete,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestPubKey {
    pub key: String,
    pub signature: String,
    #[serde(default)]
    pub self_signed: bool,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyRingEntry {
    pub xpub: String,
    pub request_pub_key: String,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Copayer {
    pub version: u32,
    pub created_on: u64,
    pub id: CopayerId,
    pub name: String,
    pub xpub: String,
    pub request_pub_keys: Vec<RequestPubKey>,
    pub signature: String,
}

impl Copayer {
    pub fn new(
        name: impl Into<String>,
        xpub: impl Into<String>,
        request_pub_key: impl Into<String>,
        signature: impl Into<String>,
        created_on: u64,
    ) -> Self {
        let xpub = xpub.into();
        let signature = signature.into();
        Self {
            version: 2,
            created_on,
            id: copayer_id_from_xpub(&xpub),
            name: name.into(),
            request_pub_keys: vec![RequestPubKey { key: request_pub_key.into(), signature: signature.clone(), self_signed: false }],
            xpub,
            signature,
        }
    }

    /// Most recently registered request key.
    pub fn request_pub_key(&self) -> Option<&str> {
        self.request_pub_keys.last().map(|entry| entry.key.as_str())
    }
}

/// Reverse index from copayer id to its wallet and request keys.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CopayerLookup {
    pub copayer_id: CopayerId,
    pub wallet_id: WalletId,
    pub request_pub_keys: Vec<RequestPubKey>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Wallet {
    pub version: String,
    pub created_on: u64,
    pub id: WalletId,
    pub name: String,
    pub m: u8,
    pub n: u8,
    pub single_address: bool,
    pub status: WalletStatus,
    pub public_key_ring: Vec<PublicKeyRingEntry>,
    pub copayers: Vec<Copayer>,
    /// Shared wallet key that signs copayer join requests.
    pub pub_key: String,
    pub coin: String,
    pub network: Network,
    pub derivation_strategy: DerivationStrategy,
    pub address_type: AddressType,
    pub address_manager: AddressManager,
}

pub fn verify_copayer_limits(m: u8, n: u8) -> bool {
    (1..=MAX_COPAYERS).contains(&n) && m >= 1 && m <= n
}

pub struct NewWallet {
    pub id: Option<WalletId>,
    pub name: String,
    pub m: u8,
    pub n: u8,
    pub pub_key: String,
    pub coin: String,
    pub network: Network,
    pub single_address: bool,
    pub derivation_strategy: DerivationStrategy,
}

impl Wallet {
    pub fn create(params: NewWallet, created_on: u64) -> Result<Self> {
        if params.name.trim().is_empty() {
            return Err(CosignError::invalid_argument("invalid wallet name"));
        }
        if !verify_copayer_limits(params.m, params.n) {
            return Err(CosignError::invalid_argument("invalid combination of required copayers / total copayers"));
        }
        let address_type = if params.n == 1 && params.derivation_strategy == DerivationStrategy::Bip44 {
            AddressType::P2pkh
        } else {
            AddressType::P2sh
        };
        Ok(Self {
            version: "1.0.0".to_string(),
            created_on,
            id: params.id.unwrap_or_else(WalletId::random),
            name: params.name,
            m: params.m,
            n: params.n,
            single_address: params.single_address,
            status: WalletStatus::Pending,
            public_key_ring: Vec::new(),
            copayers: Vec::new(),
            pub_key: params.pub_key,
            coin: params.coin,
            network: params.network,
            derivation_strategy: params.derivation_strategy,
            address_type,
            address_manager: AddressManager::new(params.derivation_strategy),
        })
    }

    pub fn is_complete(&self) -> bool {
        self.status == WalletStatus::Complete
    }

    pub fn is_shared(&self) -> bool {
        self.n > 1
    }

    pub fn copayer(&self, copayer_id: &CopayerId) -> Option<&Copayer> {
        self.copayers.iter().find(|copayer| &copayer.id == copayer_id)
    }

    pub fn copayer_mut(&mut self, copayer_id: &CopayerId) -> Option<&mut Copayer> {
        self.copayers.iter_mut().find(|copayer| &copayer.id == copayer_id)
    }

    /// Appends a copayer; the wallet becomes complete exactly when `n` copayers joined.
    pub fn add_copayer(&mut self, copayer: Copayer) -> Result<()> {
        if self.copayers.iter().any(|existing| existing.xpub == copayer.xpub) {
            return Err(CosignError::CopayerInWallet);
        }
        if self.copayers.len() >= usize::from(self.n) {
            return Err(CosignError::WalletFull);
        }
        self.copayers.push(copayer);
        if self.copayers.len() == usize::from(self.n) {
            self.status = WalletStatus::Complete;
            self.public_key_ring = self
                .copayers
                .iter()
                .map(|copayer| PublicKeyRingEntry {
                    xpub: copayer.xpub.clone(),
                    request_pub_key: copayer.request_pub_key().unwrap_or_default().to_string(),
                })
                .collect();
        }
        Ok(())
    }

    pub fn add_copayer_request_key(&mut self, copayer_id: &CopayerId, key: RequestPubKey) -> Result<()> {
        let copayer = self.copayer_mut(copayer_id).ok_or_else(|| CosignError::NotAuthorized("copayer not found".to_string()))?;
        copayer.request_pub_keys.push(key);
        Ok(())
    }

    pub fn xpubs(&self) -> Vec<String> {
        self.public_key_ring.iter().map(|entry| entry.xpub.clone()).collect()
    }

    pub fn copayer_lookups(&self) -> Vec<CopayerLookup> {
        self.copayers
            .iter()
            .map(|copayer| CopayerLookup {
                copayer_id: copayer.id.clone(),
                wallet_id: self.id.clone(),
                request_pub_keys: copayer.request_pub_keys.clone(),
            })
            .collect()
    }

    /// Derives the next wallet-level address on the main or change branch.
    pub fn create_address(&mut self, is_change: bool, created_on: u64) -> Result<AddressRecord> {
        if !self.is_complete() {
            return Err(CosignError::WalletNotComplete);
        }
        let path = self.address_manager.next_address_path(is_change);
        match self.derive_address_at(&path, is_change, created_on) {
            Ok(address) => Ok(address),
            Err(err) => {
                self.address_manager.rewind_index(is_change, 1);
                Err(err)
            }
        }
    }

    pub fn derive_address_at(&self, path: &str, is_change: bool, created_on: u64) -> Result<AddressRecord> {
        AddressRecord::derive(
            &self.id,
            self.address_type,
            &self.xpubs(),
            path,
            self.m,
            &self.coin,
            self.network,
            is_change,
            created_on,
        )
    }

    pub fn required_rejections(&self) -> u8 {
        required_rejections(self.m, self.n)
    }
}

/// Rejections needed to veto a spend: `min(m, n - m + 1)`.
pub fn required_rejections(m: u8, n: u8) -> u8 {
    m.min(n.saturating_sub(m).saturating_add(1))
}
