use crate::fixtures::{TestWallet, COIN, TEST_NOW_SECS};
use cosign_core::domain::NotificationType;

#[tokio::test]
async fn test_notifications_when_emitted_then_ids_strictly_increase() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    wallet.sign(0, &txp.id).await.expect("signature");

    let notifications = wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications");
    assert!(notifications.len() >= 6);
    for pair in notifications.windows(2) {
        assert!(pair[0].id < pair[1].id, "{} !< {}", pair[0].id, pair[1].id);
    }
    assert!(notifications.iter().all(|n| n.network_name == "testnet" && n.wallet_id == wallet.wallet_id));

    let published = notifications.iter().find(|n| n.kind == NotificationType::NewTxProposal).expect("new proposal");
    assert_eq!(published.creator_id.as_ref(), Some(&wallet.ctx(0).copayer_id));
    assert_eq!(published.data["txProposalId"], serde_json::json!(txp.id));
    assert_eq!(published.data["amount"], serde_json::json!(10_000_000));
}

#[tokio::test]
async fn test_notifications_when_reading_from_id_then_only_newer_returned() {
    let wallet = TestWallet::new(2, 3).await;
    let all = wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications");
    let cursor = all.last().map(|n| n.id.clone()).expect("cursor");

    wallet.clock.advance_secs(60);
    wallet.fund(&[COIN]).await;
    let newer = wallet.service.get_notifications(wallet.ctx(0), Some(&cursor), 0).expect("newer");
    assert_eq!(newer.len(), 1);
    assert_eq!(newer[0].kind, NotificationType::NewAddress);
    assert!(newer[0].id > cursor);

    let recent = wallet.service.get_notifications(wallet.ctx(0), None, TEST_NOW_SECS + 30).expect("recent");
    assert_eq!(recent.iter().map(|n| &n.id).collect::<Vec<_>>(), newer.iter().map(|n| &n.id).collect::<Vec<_>>());
}

#[tokio::test]
async fn test_notifications_when_subscribed_then_delivered_after_store_in_order() {
    let wallet = TestWallet::new(2, 3).await;
    let mut receiver = wallet.service.bus().subscribe();
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    let first = receiver.recv().await.expect("address notification");
    assert_eq!(first.kind, NotificationType::NewAddress);
    let second = receiver.recv().await.expect("proposal notification");
    assert_eq!(second.kind, NotificationType::NewTxProposal);
    assert_eq!(second.data["txProposalId"], serde_json::json!(txp.id));

    let stored = wallet.service.get_notifications(wallet.ctx(0), Some(&first.id), 0).expect("stored");
    assert_eq!(stored.first().map(|n| &n.id), Some(&second.id));
}
