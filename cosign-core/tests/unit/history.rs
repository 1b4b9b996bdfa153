use crate::fixtures::{external_address, incoming_tx, io, test_txid, TestWallet, COIN, TEST_NOW_SECS};
use cosign_core::application::{BlockchainMonitor, HistoryAction};
use cosign_core::infrastructure::explorer::ExplorerTx;

#[tokio::test]
async fn test_history_when_tx_matches_proposal_then_decorated_as_sent() {
    let wallet = TestWallet::new(2, 3).await;
    let utxos = wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    wallet.sign(0, &txp.id).await.expect("first signature");
    let accepted = wallet.sign(1, &txp.id).await.expect("second signature");
    wallet.service.broadcast_tx(wallet.ctx(0), &txp.id).await.expect("broadcast");

    let change = accepted.change_address.clone().expect("change");
    let mut sent = ExplorerTx::new(accepted.txid.clone().expect("txid"), TEST_NOW_SECS);
    sent.fees = accepted.fee;
    sent.inputs = vec![io(&utxos[0].address, COIN)];
    sent.outputs = vec![io(&external_address(), 10_000_000), io(&change.address, COIN - 10_000_000 - accepted.fee)];
    wallet.explorer.add_transaction(sent);

    let history = wallet.service.get_tx_history(wallet.ctx(2), 0, 10).await.expect("history");
    assert_eq!(history.len(), 1);
    let item = &history[0];
    assert_eq!(item.action, HistoryAction::Sent);
    assert_eq!(item.amount, 10_000_000);
    assert_eq!(item.fees, accepted.fee);
    assert_eq!(item.proposal_id.as_ref(), Some(&txp.id));
    assert_eq!(item.creator_name.as_deref(), Some("copayer-0"));
    assert_eq!(item.actions.len(), 2);
    assert_eq!(item.outputs.len(), 1);
    assert_eq!(item.outputs[0].address, external_address());
}

#[tokio::test]
async fn test_history_when_cached_then_served_until_wallet_sees_new_tx() {
    let wallet = TestWallet::new(2, 3).await;
    let address = wallet.receive_address().await;
    wallet.explorer.add_transaction(incoming_tx(&test_txid(1), &address.address, 40_000, TEST_NOW_SECS));

    let first = wallet.service.get_tx_history(wallet.ctx(0), 0, 10).await.expect("history");
    assert_eq!(first.len(), 1);
    assert_eq!(first[0].action, HistoryAction::Received);
    assert_eq!(first[0].amount, 40_000);

    let newer = incoming_tx(&test_txid(2), &address.address, 60_000, TEST_NOW_SECS + 1);
    wallet.explorer.add_transaction(newer.clone());
    let cached = wallet.service.get_tx_history(wallet.ctx(0), 0, 10).await.expect("history");
    assert_eq!(cached.len(), 1, "head of history is cached");

    BlockchainMonitor::new(wallet.service.clone()).handle_tx(&newer).await.expect("handle tx");
    let refreshed = wallet.service.get_tx_history(wallet.ctx(0), 0, 10).await.expect("history");
    assert_eq!(refreshed.iter().map(|item| item.txid.clone()).collect::<Vec<_>>(), vec![test_txid(2), test_txid(1)]);

    let page = wallet.service.get_tx_history(wallet.ctx(0), 1, 1).await.expect("page");
    assert_eq!(page.len(), 1);
    assert_eq!(page[0].txid, test_txid(1));
}

#[tokio::test]
async fn test_history_when_wallet_has_no_addresses_then_empty() {
    let wallet = TestWallet::new(2, 3).await;
    let history = wallet.service.get_tx_history(wallet.ctx(0), 0, 10).await.expect("history");
    assert!(history.is_empty());
}
