use crate::fixtures::{TestWallet, COIN};
use cosign_core::domain::{NotificationType, ProposalStatus};
use cosign_core::foundation::CosignError;

#[tokio::test]
async fn test_proposal_when_second_copayer_signs_then_accepted_with_raw_tx() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN, COIN]).await;
    let txp = wallet.propose(0, 80_000_000).await;
    assert_eq!(txp.status, ProposalStatus::Pending);
    assert_eq!(txp.inputs.len(), 1);
    assert!(txp.fee > 0);

    let after_first = wallet.sign(0, &txp.id).await.expect("first signature");
    assert_eq!(after_first.status, ProposalStatus::Pending);
    assert!(after_first.raw.is_none());

    let after_second = wallet.sign(1, &txp.id).await.expect("second signature");
    assert_eq!(after_second.status, ProposalStatus::Accepted);
    assert!(after_second.raw.is_some());
    assert_eq!(after_second.txid.as_ref().map(String::len), Some(64));

    let late = wallet.sign(2, &txp.id).await;
    assert!(matches!(late, Err(CosignError::TxNotPending)));
}

#[tokio::test]
async fn test_proposal_when_copayer_acts_twice_then_copayer_voted() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    wallet.sign(1, &txp.id).await.expect("signature");
    assert!(matches!(wallet.sign(1, &txp.id).await, Err(CosignError::CopayerVoted)));
    assert!(matches!(wallet.reject(1, &txp.id).await, Err(CosignError::CopayerVoted)));
}

#[tokio::test]
async fn test_proposal_when_rejection_quorum_reached_then_rejected_and_closed() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    let once = wallet.reject(1, &txp.id).await.expect("first rejection");
    assert_eq!(once.status, ProposalStatus::Pending);
    let twice = wallet.reject(2, &txp.id).await.expect("second rejection");
    assert_eq!(twice.status, ProposalStatus::Rejected);

    assert!(matches!(wallet.sign(0, &txp.id).await, Err(CosignError::TxNotPending)));
    assert!(wallet.service.get_pending_txs(wallet.ctx(0)).expect("pending").is_empty());

    let kinds: Vec<NotificationType> =
        wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications").iter().map(|n| n.kind).collect();
    assert!(kinds.contains(&NotificationType::TxProposalRejectedBy));
    assert_eq!(kinds.last(), Some(&NotificationType::TxProposalFinallyRejected));
}

#[tokio::test]
async fn test_proposal_when_signature_is_not_for_the_tx_then_bad_signatures() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    let result = wallet.service.sign_tx(wallet.ctx(1), &txp.id, vec!["3006020101020101".to_string()]).await;
    assert!(matches!(result, Err(CosignError::BadSignatures(_))));
    let stored = wallet.service.get_tx(wallet.ctx(1), &txp.id).expect("stored");
    assert!(stored.actions.is_empty());
}

#[tokio::test]
async fn test_broadcast_when_accepted_then_broadcasted_and_inputs_spent() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    assert!(matches!(wallet.service.broadcast_tx(wallet.ctx(0), &txp.id).await, Err(CosignError::TxNotAccepted)));

    wallet.sign(0, &txp.id).await.expect("first signature");
    let accepted = wallet.sign(1, &txp.id).await.expect("second signature");
    let broadcasted = wallet.service.broadcast_tx(wallet.ctx(2), &txp.id).await.expect("broadcast");
    assert_eq!(broadcasted.status, ProposalStatus::Broadcasted);
    assert!(broadcasted.broadcasted_on.is_some());
    assert_eq!(wallet.explorer.broadcasted(), vec![accepted.raw.clone().expect("raw")]);

    assert!(matches!(wallet.service.broadcast_tx(wallet.ctx(0), &txp.id).await, Err(CosignError::TxAlreadyBroadcasted)));

    let utxos = wallet.service.get_utxos(wallet.ctx(0)).await.expect("utxos");
    assert!(utxos.is_empty(), "broadcast inputs are no longer spendable");

    let notifications = wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications");
    let last = notifications.last().expect("notification");
    assert_eq!(last.kind, NotificationType::NewOutgoingTx);
    assert_eq!(last.data["txid"], serde_json::json!(accepted.txid));
}

#[tokio::test]
async fn test_broadcast_when_explorer_refuses_known_tx_then_third_party() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    wallet.sign(0, &txp.id).await.expect("first signature");
    let accepted = wallet.sign(1, &txp.id).await.expect("second signature");
    let txid = accepted.txid.clone().expect("txid");

    wallet.explorer.set_broadcast_error(Some("txn-already-known"));
    let unknown = wallet.service.broadcast_tx(wallet.ctx(0), &txp.id).await;
    assert!(matches!(unknown, Err(CosignError::ExplorerError { .. })));

    wallet.explorer.add_transaction(cosign_core::infrastructure::explorer::ExplorerTx::new(txid, 0));
    let broadcasted = wallet.service.broadcast_tx(wallet.ctx(0), &txp.id).await.expect("third party broadcast");
    assert_eq!(broadcasted.status, ProposalStatus::Broadcasted);

    let notifications = wallet.service.get_notifications(wallet.ctx(0), None, 0).expect("notifications");
    assert_eq!(notifications.last().map(|n| n.kind), Some(NotificationType::NewOutgoingTxByThirdParty));
}

#[tokio::test]
async fn test_pending_inputs_when_second_proposal_needs_them_then_locked_funds_error() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let first = wallet.propose(0, 50_000_000).await;

    let utxos = wallet.service.get_utxos(wallet.ctx(0)).await.expect("utxos");
    assert!(utxos.iter().all(|utxo| utxo.locked));
    assert_eq!(utxos[0].key(), first.input_keys()[0]);

    let second = wallet.create(1, crate::fixtures::payment(&crate::fixtures::external_address(), 10_000_000)).await;
    assert!(matches!(second, Err(CosignError::InsufficientFundsForFee(_))));
}
