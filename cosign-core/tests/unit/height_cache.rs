use crate::fixtures::{emit_when_subscribed, wait_until, TestWallet};
use cosign_core::application::BlockchainMonitor;
use cosign_core::domain::NotificationType;
use cosign_core::infrastructure::explorer::ExplorerEvent;

#[tokio::test]
async fn test_height_when_cached_then_explorer_queried_once_until_ttl() {
    let wallet = TestWallet::new(1, 1).await;
    wallet.explorer.set_height(100);

    assert_eq!(wallet.service.get_blockchain_height().await.expect("height"), 100);
    wallet.explorer.set_height(101);
    assert_eq!(wallet.service.get_blockchain_height().await.expect("height"), 100);
    assert_eq!(wallet.explorer.height_queries(), 1);

    wallet.clock.advance_secs(600);
    assert_eq!(wallet.service.get_blockchain_height().await.expect("height"), 101);
    assert_eq!(wallet.explorer.height_queries(), 2);
}

#[tokio::test]
async fn test_height_when_new_block_arrives_then_cache_invalidated() {
    let wallet = TestWallet::new(1, 1).await;
    wallet.explorer.set_height(100);
    assert_eq!(wallet.service.get_blockchain_height().await.expect("height"), 100);
    assert_eq!(wallet.service.height_cache().cached("testnet"), Some(100));

    let mut notifications = wallet.service.bus().subscribe();
    let monitor = BlockchainMonitor::new(wallet.service.clone()).spawn();
    wallet.explorer.set_height(101);
    emit_when_subscribed(&wallet.explorer, ExplorerEvent::Block { hash: "00ab".to_string(), height: 101 }).await;

    let block = notifications.recv().await.expect("block notification");
    assert_eq!(block.kind, NotificationType::NewBlock);
    assert_eq!(block.wallet_id.as_str(), "testnet");
    assert_eq!(block.data["height"], serde_json::json!(101));

    let cache = wallet.service.height_cache().clone();
    wait_until(|| cache.cached("testnet").is_none()).await;
    assert_eq!(wallet.service.get_blockchain_height().await.expect("height"), 101);
    monitor.abort();
}
