use crate::fixtures::{TestWallet, TestWalletBuilder, COIN};
use cosign_core::application::ServiceSettings;
use cosign_core::domain::NotificationType;
use cosign_core::infrastructure::storage::Storage;
use std::time::Duration;

#[tokio::test]
async fn test_balance_when_proposal_pending_then_its_inputs_are_locked() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN, COIN]).await;
    wallet.propose(0, 10_000_000).await;

    let balance = wallet.service.get_balance(wallet.ctx(1), false).await.expect("balance");
    assert_eq!(balance.total_amount, 2 * COIN);
    assert_eq!(balance.locked_amount, COIN);
    assert_eq!(balance.available_amount, COIN);
    assert_eq!(balance.total_confirmed_amount, 2 * COIN);
    assert_eq!(balance.by_address.len(), 1);

    let utxos = wallet.service.get_utxos(wallet.ctx(1)).await.expect("utxos");
    assert_eq!(utxos.iter().filter(|utxo| utxo.locked).count(), 1);
    assert!(utxos.iter().all(|utxo| utxo.path.is_some() && utxo.public_keys.len() == 3));
}

#[tokio::test]
async fn test_two_step_balance_when_active_set_fresh_then_partial_first_and_update_notified() {
    let settings = ServiceSettings { two_step_balance_threshold: 1, ..ServiceSettings::default() };
    let wallet = TestWalletBuilder::new(1, 1).settings(settings).build().await;
    wallet.fund(&[COIN]).await;

    let full = wallet.service.get_balance(wallet.ctx(0), true).await.expect("first balance");
    assert_eq!(full.total_amount, COIN);

    wallet.fund(&[2 * COIN]).await;
    let mut notifications = wallet.service.bus().subscribe();
    let partial = wallet.service.get_balance(wallet.ctx(0), true).await.expect("partial balance");
    assert_eq!(partial.total_amount, COIN);

    let updated = tokio::time::timeout(Duration::from_secs(2), notifications.recv())
        .await
        .expect("update in time")
        .expect("notification");
    assert_eq!(updated.kind, NotificationType::BalanceUpdated);
    assert_eq!(updated.data["total_amount"].as_u64(), Some(3 * COIN));

    let refreshed = wallet.service.get_balance(wallet.ctx(0), true).await.expect("refreshed balance");
    assert_eq!(refreshed.total_amount, 3 * COIN);
}

#[tokio::test]
async fn test_two_step_balance_when_wallet_small_then_full_balance_only() {
    let wallet = TestWallet::new(1, 1).await;
    wallet.fund(&[COIN]).await;
    wallet.service.get_balance(wallet.ctx(0), true).await.expect("balance");
    assert!(wallet.service.storage().fetch_active_addresses(&wallet.wallet_id).expect("active").is_none());
}
