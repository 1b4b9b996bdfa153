use crate::application::service::{CopayerContext, WalletService};
use crate::domain::address::DerivationStrategy;
use crate::domain::chain::network_name;
use crate::domain::notification::NotificationType;
use crate::domain::wallet::{Copayer, CopayerLookup, NewWallet, RequestPubKey, Wallet};
use crate::foundation::constants::REQUEST_KEY_AUTH_PATH;
use crate::foundation::{derive_child_pubkey_str, parse_public_key, parse_xpub, verify_message, CopayerId, CosignError, Result, WalletId};
use bitcoin::{Network, NetworkKind};
use log::info;
use serde_json::json;

#[derive(Clone, Debug)]
pub struct CreateWalletParams {
    /// Caller-chosen id; a random one is assigned when absent.
    pub id: Option<WalletId>,
    pub name: String,
    pub m: u8,
    pub n: u8,
    /// Wallet key that signs copayer join requests (hex compressed public key).
    pub pub_key: String,
    pub network: Network,
    pub single_address: bool,
    pub derivation_strategy: DerivationStrategy,
}

#[derive(Clone, Debug)]
pub struct JoinWalletParams {
    pub wallet_id: WalletId,
    pub name: String,
    pub xpub: String,
    pub request_pub_key: String,
    /// Wallet-key signature over `name|xpub|requestPubKey`.
    pub copayer_signature: String,
}

#[derive(Clone, Debug)]
pub struct JoinedWallet {
    pub copayer_id: CopayerId,
    pub wallet: Wallet,
}

/// Text signed with the wallet key to authorize a join.
pub fn join_request_message(name: &str, xpub: &str, request_pub_key: &str) -> String {
    format!("{}|{}|{}", name, xpub, request_pub_key)
}

impl WalletService {
    pub async fn create_wallet(&self, params: CreateWalletParams) -> Result<WalletId> {
        if params.network != self.chain.network {
            return Err(CosignError::invalid_argument(format!("invalid network {}", network_name(params.network))));
        }
        parse_public_key(&params.pub_key).map_err(|_| CosignError::invalid_argument("invalid public key"))?;

        let wallet = Wallet::create(
            NewWallet {
                id: params.id,
                name: params.name,
                m: params.m,
                n: params.n,
                pub_key: params.pub_key,
                coin: self.chain.coin.clone(),
                network: params.network,
                single_address: params.single_address,
                derivation_strategy: params.derivation_strategy,
            },
            self.now_secs(),
        )?;

        let _guard = self.lock_wallet(&wallet.id).await?;
        if self.storage.fetch_wallet(&wallet.id)?.is_some() {
            return Err(CosignError::WalletAlreadyExists);
        }
        self.storage.store_wallet(&wallet)?;
        info!("wallet created wallet_id={} m={} n={} network={}", wallet.id, wallet.m, wallet.n, network_name(wallet.network));
        Ok(wallet.id)
    }

    pub async fn join_wallet(&self, params: JoinWalletParams) -> Result<JoinedWallet> {
        let xpub = parse_xpub(&params.xpub).map_err(|_| CosignError::invalid_argument("invalid extended public key"))?;
        parse_public_key(&params.request_pub_key).map_err(|_| CosignError::invalid_argument("invalid request public key"))?;

        let _guard = self.lock_wallet(&params.wallet_id).await?;
        let mut wallet = self.fetch_wallet(&params.wallet_id)?;
        if xpub.network != NetworkKind::from(wallet.network) {
            return Err(CosignError::invalid_argument("extended public key network does not match wallet network"));
        }

        let message = join_request_message(&params.name, &params.xpub, &params.request_pub_key);
        if !verify_message(&message, &params.copayer_signature, &wallet.pub_key) {
            return Err(CosignError::NotAuthorized("bad join signature".to_string()));
        }

        if wallet.copayers.iter().any(|copayer| copayer.xpub == params.xpub) {
            return Err(CosignError::CopayerInWallet);
        }
        if wallet.is_complete() {
            return Err(CosignError::WalletFull);
        }

        let copayer = Copayer::new(
            params.name,
            params.xpub,
            params.request_pub_key,
            params.copayer_signature,
            self.now_secs(),
        );
        if self.storage.fetch_copayer_lookup(&copayer.id)?.is_some() {
            return Err(CosignError::CopayerRegistered);
        }

        let copayer_id = copayer.id.clone();
        let copayer_name = copayer.name.clone();
        wallet.add_copayer(copayer)?;
        self.storage.store_wallet_and_update_copayers_lookup(&wallet)?;

        let kind = if wallet.is_complete() { NotificationType::WalletComplete } else { NotificationType::NewCopayer };
        self.notify(kind, &wallet.id, Some(&copayer_id), json!({ "walletId": wallet.id, "copayerId": copayer_id, "copayerName": copayer_name }))
            .await?;
        info!("copayer joined wallet_id={} copayer_id={} copayers={}/{}", wallet.id, copayer_id, wallet.copayers.len(), wallet.n);
        Ok(JoinedWallet { copayer_id, wallet })
    }

    /// Registers an additional request key, authorized by the copayer's `m/2` key.
    pub async fn add_access(&self, copayer_id: &CopayerId, request_pub_key: &str, signature: &str) -> Result<CopayerContext> {
        parse_public_key(request_pub_key).map_err(|_| CosignError::invalid_argument("invalid request public key"))?;
        let lookup = self.copayer_lookup(copayer_id)?;

        let _guard = self.lock_wallet(&lookup.wallet_id).await?;
        let mut wallet = self.fetch_wallet(&lookup.wallet_id)?;
        let copayer = wallet.copayer(copayer_id).ok_or_else(|| CosignError::NotAuthorized("copayer not found".to_string()))?;
        if copayer.request_pub_keys.len() >= self.settings.max_request_keys {
            return Err(CosignError::TooManyKeys);
        }

        let auth_key = derive_child_pubkey_str(&copayer.xpub, REQUEST_KEY_AUTH_PATH)?;
        if !verify_message(request_pub_key, signature, &auth_key.to_string()) {
            return Err(CosignError::NotAuthorized("bad access signature".to_string()));
        }

        let key = RequestPubKey { key: request_pub_key.to_string(), signature: signature.to_string(), self_signed: true };
        wallet.add_copayer_request_key(copayer_id, key)?;
        self.storage.store_wallet_and_update_copayers_lookup(&wallet)?;
        info!("request key added wallet_id={} copayer_id={}", wallet.id, copayer_id);
        Ok(CopayerContext::new(copayer_id.clone(), wallet.id))
    }

    /// Verifies `signature` over `message` against any registered request key of the copayer.
    pub fn authenticate(&self, copayer_id: &CopayerId, message: &str, signature: &str) -> Result<CopayerContext> {
        let lookup = self.copayer_lookup(copayer_id)?;
        let valid = lookup.request_pub_keys.iter().any(|key| verify_message(message, signature, &key.key));
        if !valid {
            return Err(CosignError::NotAuthorized("invalid signature".to_string()));
        }
        Ok(CopayerContext::new(lookup.copayer_id, lookup.wallet_id))
    }

    fn copayer_lookup(&self, copayer_id: &CopayerId) -> Result<CopayerLookup> {
        self.storage.fetch_copayer_lookup(copayer_id)?.ok_or_else(|| CosignError::NotAuthorized("copayer not found".to_string()))
    }
}
