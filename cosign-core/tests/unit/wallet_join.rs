use crate::fixtures::{copayer_xpriv, copayer_xpub, request_pub_key, request_secret, wallet_pub_key, wallet_secret, TestWallet};
use bitcoin::Network;
use cosign_core::application::wallets::join_request_message;
use cosign_core::application::{CreateWalletParams, JoinWalletParams};
use cosign_core::domain::{DerivationStrategy, NotificationType, WalletStatus};
use cosign_core::foundation::{derive_child_secret, sign_message, CosignError, WalletId};
use secp256k1::{PublicKey, SecretKey};

fn wallet_params(id: &str, m: u8, n: u8) -> CreateWalletParams {
    CreateWalletParams {
        id: Some(WalletId::from(id)),
        name: id.to_string(),
        m,
        n,
        pub_key: wallet_pub_key(),
        network: Network::Testnet,
        single_address: false,
        derivation_strategy: DerivationStrategy::Bip45,
    }
}

fn join_params(wallet_id: &WalletId, index: u8) -> JoinWalletParams {
    let name = format!("copayer-{}", index);
    let xpub = copayer_xpub(index);
    let request_key = request_pub_key(index);
    let signature = sign_message(&join_request_message(&name, &xpub, &request_key), &wallet_secret());
    JoinWalletParams { wallet_id: wallet_id.clone(), name, xpub, request_pub_key: request_key, copayer_signature: signature }
}

#[tokio::test]
async fn test_join_when_last_copayer_joins_then_wallet_complete_notified() {
    let wallet = TestWallet::new(2, 3).await;
    let stored = wallet.service.get_wallet(wallet.ctx(0)).expect("wallet");
    assert_eq!(stored.status, WalletStatus::Complete);
    assert_eq!(stored.public_key_ring.len(), 3);

    let kinds: Vec<NotificationType> =
        wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications").iter().map(|n| n.kind).collect();
    assert_eq!(kinds, vec![NotificationType::NewCopayer, NotificationType::NewCopayer, NotificationType::WalletComplete]);
}

#[tokio::test]
async fn test_join_when_invalid_then_refused_without_changes() {
    let wallet = TestWallet::new(1, 1).await;
    let service = &wallet.service;

    let wrong_network = CreateWalletParams { network: Network::Bitcoin, ..wallet_params("mainnet", 1, 2) };
    assert!(matches!(service.create_wallet(wrong_network).await, Err(CosignError::InvalidArgument(_))));
    assert!(matches!(service.create_wallet(wallet_params("wallet-1", 1, 1)).await, Err(CosignError::WalletAlreadyExists)));

    let wallet_id = service.create_wallet(wallet_params("second", 2, 2)).await.expect("create");

    let mut forged = join_params(&wallet_id, 1);
    forged.name = "someone-else".to_string();
    assert!(matches!(service.join_wallet(forged).await, Err(CosignError::NotAuthorized(_))));

    service.join_wallet(join_params(&wallet_id, 1)).await.expect("join");
    assert!(matches!(service.join_wallet(join_params(&wallet_id, 1)).await, Err(CosignError::CopayerInWallet)));

    // copayer 0 already belongs to wallet-1
    assert!(matches!(service.join_wallet(join_params(&wallet_id, 0)).await, Err(CosignError::CopayerRegistered)));

    service.join_wallet(join_params(&wallet_id, 2)).await.expect("join");
    assert!(matches!(service.join_wallet(join_params(&wallet_id, 3)).await, Err(CosignError::WalletFull)));

    let unknown = join_params(&WalletId::from("nope"), 4);
    assert!(matches!(service.join_wallet(unknown).await, Err(CosignError::WalletNotFound)));
}

#[tokio::test]
async fn test_access_when_key_signed_by_copayer_auth_key_then_authenticates() {
    let wallet = TestWallet::new(2, 3).await;
    let copayer_id = wallet.ctx(1).copayer_id.clone();

    let message = "GET /v1/wallets";
    let ctx = wallet.service.authenticate(&copayer_id, message, &sign_message(message, &request_secret(1))).expect("authenticate");
    assert_eq!(&ctx, wallet.ctx(1));
    assert!(matches!(
        wallet.service.authenticate(&copayer_id, message, &sign_message(message, &request_secret(2))),
        Err(CosignError::NotAuthorized(_))
    ));

    let new_secret = SecretKey::from_slice(&[77u8; 32]).expect("secret");
    let new_key = hex::encode(PublicKey::from_secret_key(cosign_core::foundation::secp(), &new_secret).serialize());
    let auth_secret = derive_child_secret(&copayer_xpriv(1), "m/2").expect("auth key");

    let bad = wallet.service.add_access(&copayer_id, &new_key, &sign_message(&new_key, &new_secret)).await;
    assert!(matches!(bad, Err(CosignError::NotAuthorized(_))));

    wallet.service.add_access(&copayer_id, &new_key, &sign_message(&new_key, &auth_secret)).await.expect("add access");
    let ctx = wallet.service.authenticate(&copayer_id, message, &sign_message(message, &new_secret)).expect("new key");
    assert_eq!(&ctx, wallet.ctx(1));
}
