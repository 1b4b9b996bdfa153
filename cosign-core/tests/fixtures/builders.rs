#![allow(dead_code)]

use crate::fixtures::{
    confirmed_utxo, copayer_xpriv, copayer_xpub, external_address, payment, request_pub_key, request_secret, wallet_pub_key,
    wallet_secret, TEST_NOW_SECS, TEST_WALLET_ID,
};
use bitcoin::bip32::Xpriv;
use bitcoin::Network;
use cosign_core::application::wallets::join_request_message;
use cosign_core::application::{CopayerContext, CreateTxParams, CreateWalletParams, JoinWalletParams, ServiceSettings, WalletService};
use cosign_core::domain::proposal::builder::{raw_unsigned_hex, sign_proposal};
use cosign_core::domain::{AddressRecord, ChainParams, DerivationStrategy, TxProposal, Utxo};
use cosign_core::foundation::util::time::ManualClock;
use cosign_core::foundation::{sign_message, ProposalId, Result, WalletId};
use cosign_core::infrastructure::explorer::{ExplorerEvent, MockExplorer};
use cosign_core::infrastructure::lock::LocalLocker;
use cosign_core::infrastructure::messaging::LocalBus;
use cosign_core::infrastructure::storage::Storage;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

pub struct TestCopayer {
    pub index: u8,
    pub xpriv: Xpriv,
    pub ctx: CopayerContext,
}

/// Complete m-of-n wallet on a memory-backed service with a mock explorer and a manual clock.
pub struct TestWallet {
    pub service: WalletService,
    pub explorer: Arc<MockExplorer>,
    pub clock: Arc<ManualClock>,
    pub wallet_id: WalletId,
    pub copayers: Vec<TestCopayer>,
    next_txid: AtomicU64,
}

pub struct TestWalletBuilder {
    m: u8,
    n: u8,
    single_address: bool,
    storage: Option<Arc<dyn Storage>>,
    settings: ServiceSettings,
}

impl TestWalletBuilder {
    pub fn new(m: u8, n: u8) -> Self {
        Self { m, n, single_address: false, storage: None, settings: ServiceSettings::default() }
    }

    pub fn single_address(mut self) -> Self {
        self.single_address = true;
        self
    }

    pub fn settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn storage(mut self, storage: Arc<dyn Storage>) -> Self {
        self.storage = Some(storage);
        self
    }

    pub async fn build(self) -> TestWallet {
        let explorer = Arc::new(MockExplorer::new(Network::Testnet));
        let clock = Arc::new(ManualClock::new(TEST_NOW_SECS));
        let chain = ChainParams::bitcoin(Network::Testnet);
        let service = match self.storage {
            Some(storage) => WalletService::new(
                storage,
                explorer.clone(),
                Arc::new(LocalLocker::new()),
                Arc::new(LocalBus::new()),
                chain,
            ),
            None => WalletService::in_memory(explorer.clone(), chain),
        }
        .with_clock(clock.clone())
        .with_settings(self.settings);

        let wallet_id = service
            .create_wallet(CreateWalletParams {
                id: Some(WalletId::from(TEST_WALLET_ID)),
                name: "treasury".to_string(),
                m: self.m,
                n: self.n,
                pub_key: wallet_pub_key(),
                network: Network::Testnet,
                single_address: self.single_address,
                derivation_strategy: DerivationStrategy::Bip45,
            })
            .await
            .expect("create wallet");

        let mut copayers = Vec::new();
        for index in 0..self.n {
            let name = format!("copayer-{}", index);
            let xpub = copayer_xpub(index);
            let request_key = request_pub_key(index);
            let signature = sign_message(&join_request_message(&name, &xpub, &request_key), &wallet_secret());
            let joined = service
                .join_wallet(JoinWalletParams {
                    wallet_id: wallet_id.clone(),
                    name,
                    xpub,
                    request_pub_key: request_key,
                    copayer_signature: signature,
                })
                .await
                .expect("join wallet");
            copayers.push(TestCopayer {
                index,
                xpriv: copayer_xpriv(index),
                ctx: CopayerContext::new(joined.copayer_id, wallet_id.clone()),
            });
        }

        TestWallet { service, explorer, clock, wallet_id, copayers, next_txid: AtomicU64::new(1) }
    }
}

impl TestWallet {
    pub async fn new(m: u8, n: u8) -> Self {
        TestWalletBuilder::new(m, n).build().await
    }

    pub fn ctx(&self, copayer: usize) -> &CopayerContext {
        &self.copayers[copayer].ctx
    }

    pub async fn receive_address(&self) -> AddressRecord {
        self.service.create_address(self.ctx(0), true).await.expect("create address")
    }

    /// Funds a fresh receive address with one confirmed UTXO per amount.
    pub async fn fund(&self, amounts: &[u64]) -> Vec<Utxo> {
        let address = self.receive_address().await;
        amounts
            .iter()
            .map(|amount| {
                let utxo = confirmed_utxo(self.next_txid.fetch_add(1, Ordering::SeqCst), &address.address, *amount);
                self.explorer.push_utxo(utxo.clone());
                utxo
            })
            .collect()
    }

    pub async fn create(&self, creator: usize, params: CreateTxParams) -> Result<TxProposal> {
        self.service.create_tx(self.ctx(creator), params).await
    }

    pub fn proposal_signature(&self, creator: usize, txp: &TxProposal) -> String {
        let raw = raw_unsigned_hex(txp).expect("raw unsigned tx");
        sign_message(&raw, &request_secret(self.copayers[creator].index))
    }

    pub async fn publish(&self, creator: usize, txp: &TxProposal) -> Result<TxProposal> {
        let signature = self.proposal_signature(creator, txp);
        self.service.publish_tx(self.ctx(creator), &txp.id, &signature).await
    }

    /// Creates and publishes a payment of `amount` to an external address.
    pub async fn propose(&self, creator: usize, amount: u64) -> TxProposal {
        let txp = self.create(creator, payment(&external_address(), amount)).await.expect("create proposal");
        self.publish(creator, &txp).await.expect("publish proposal")
    }

    pub async fn sign(&self, signer: usize, proposal_id: &ProposalId) -> Result<TxProposal> {
        let txp = self.service.get_tx(self.ctx(signer), proposal_id)?;
        let signatures = sign_proposal(&txp, &self.copayers[signer].xpriv)?;
        self.service.sign_tx(self.ctx(signer), proposal_id, signatures).await
    }

    pub async fn reject(&self, copayer: usize, proposal_id: &ProposalId) -> Result<TxProposal> {
        self.service.reject_tx(self.ctx(copayer), proposal_id, Some("no".to_string())).await
    }
}

/// Emits once the monitor has subscribed to explorer events.
pub async fn emit_when_subscribed(explorer: &MockExplorer, event: ExplorerEvent) {
    for _ in 0..200 {
        if explorer.emit(event.clone()) > 0 {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("no explorer subscriber for {:?}", event);
}

pub async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    panic!("condition not reached in time");
}
