use crate::fixtures::{TestWalletBuilder, COIN, TEST_NOW_SECS};
use cosign_core::domain::{NotificationType, ProposalStatus};
use cosign_core::infrastructure::storage::{RocksStorage, Storage, TxQuery};
use std::sync::Arc;
use tempfile::TempDir;

#[tokio::test]
async fn test_rocks_storage_when_reopened_then_wallet_state_is_preserved() {
    let temp_dir = TempDir::new().expect("temp dir");
    let db_path = temp_dir.path().join("db");

    let (wallet_id, proposal_id, copayer_id, receive_address) = {
        let storage: Arc<dyn Storage> = Arc::new(RocksStorage::open(&db_path).expect("open rocks"));
        let wallet = TestWalletBuilder::new(2, 3).storage(storage).build().await;
        let utxos = wallet.fund(&[COIN]).await;
        let txp = wallet.propose(0, 10_000_000).await;
        wallet.sign(1, &txp.id).await.expect("signature");
        (wallet.wallet_id.clone(), txp.id.clone(), wallet.ctx(0).copayer_id.clone(), utxos[0].address.clone())
    };

    let storage = RocksStorage::open(&db_path).expect("reopen rocks");
    let wallet = storage.fetch_wallet(&wallet_id).expect("fetch wallet").expect("wallet present");
    assert!(wallet.is_complete());
    assert_eq!(wallet.copayers.len(), 3);

    let lookup = storage.fetch_copayer_lookup(&copayer_id).expect("lookup").expect("lookup present");
    assert_eq!(lookup.wallet_id, wallet_id);

    let txp = storage.fetch_tx(&wallet_id, &proposal_id).expect("fetch tx").expect("tx present");
    assert_eq!(txp.status, ProposalStatus::Pending);
    assert_eq!(txp.actions.len(), 1);
    assert_eq!(storage.fetch_pending_txs(&wallet_id).expect("pending").len(), 1);

    let addresses = storage.fetch_addresses(&wallet_id).expect("addresses");
    assert!(addresses.iter().any(|a| a.address == receive_address && !a.is_change));
    assert!(addresses.iter().any(|a| a.is_change), "change address of the proposal is stored");
    assert_eq!(storage.fetch_address_wallet(&receive_address).expect("owner"), Some(wallet_id.clone()));

    let notifications = storage.fetch_notifications(&wallet_id, None, 0).expect("notifications");
    assert_eq!(notifications.last().map(|n| n.kind), Some(NotificationType::TxProposalAcceptedBy));
    for pair in notifications.windows(2) {
        assert!(pair[0].id < pair[1].id);
    }
}

#[tokio::test]
async fn test_rocks_storage_when_querying_txs_then_time_window_and_limit_apply() {
    let temp_dir = TempDir::new().expect("temp dir");
    let storage: Arc<dyn Storage> = Arc::new(RocksStorage::open(temp_dir.path().join("db")).expect("open rocks"));
    let wallet = TestWalletBuilder::new(1, 2).storage(storage.clone()).build().await;
    wallet.fund(&[COIN, COIN, COIN]).await;

    let mut ids = Vec::new();
    for _ in 0..3 {
        ids.push(wallet.propose(0, 10_000_000).await.id);
        wallet.clock.advance_secs(100);
    }

    let all = storage.fetch_txs(&wallet.wallet_id, &TxQuery::default()).expect("all");
    assert_eq!(all.iter().map(|txp| txp.id.clone()).collect::<Vec<_>>(), ids.iter().rev().cloned().collect::<Vec<_>>());

    let window = TxQuery { min_ts: Some(TEST_NOW_SECS + 50), max_ts: Some(TEST_NOW_SECS + 150), limit: None };
    let middle = storage.fetch_txs(&wallet.wallet_id, &window).expect("window");
    assert_eq!(middle.len(), 1);
    assert_eq!(middle[0].id, ids[1]);

    let limited = storage.fetch_txs(&wallet.wallet_id, &TxQuery { limit: Some(2), ..TxQuery::default() }).expect("limited");
    assert_eq!(limited.len(), 2);
    assert_eq!(limited[0].id, ids[2]);

    storage.remove_tx(&wallet.wallet_id, &ids[0]).expect("remove");
    assert!(storage.fetch_tx(&wallet.wallet_id, &ids[0]).expect("fetch").is_none());
}
