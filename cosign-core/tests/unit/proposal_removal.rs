use crate::fixtures::{TestWallet, COIN};
use cosign_core::domain::NotificationType;
use cosign_core::foundation::CosignError;

#[tokio::test]
async fn test_remove_when_creator_and_no_other_approvals_then_immediate() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    wallet.sign(0, &txp.id).await.expect("creator signs");

    assert_eq!(wallet.service.get_remaining_delete_lock_time(wallet.ctx(0), &txp), 0);
    wallet.service.remove_pending_tx(wallet.ctx(0), &txp.id).await.expect("remove");

    assert!(matches!(wallet.service.get_tx(wallet.ctx(0), &txp.id), Err(CosignError::TxNotFound)));
    let utxos = wallet.service.get_utxos(wallet.ctx(0)).await.expect("utxos");
    assert!(utxos.iter().all(|utxo| !utxo.locked), "inputs are released");
    let notifications = wallet.service.get_notifications(wallet.ctx(1), None, 0).expect("notifications");
    assert_eq!(notifications.last().map(|n| n.kind), Some(NotificationType::TxProposalRemoved));
}

#[tokio::test]
async fn test_remove_when_other_copayer_then_waits_for_delete_lock() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    let early = wallet.service.remove_pending_tx(wallet.ctx(1), &txp.id).await;
    assert!(matches!(early, Err(CosignError::TxCannotRemove { remaining_secs: 600 })));

    wallet.clock.advance_secs(450);
    assert_eq!(wallet.service.get_remaining_delete_lock_time(wallet.ctx(1), &txp), 150);
    wallet.clock.advance_secs(150);
    wallet.service.remove_pending_tx(wallet.ctx(1), &txp.id).await.expect("remove after lock");
}

#[tokio::test]
async fn test_remove_when_another_copayer_approved_then_creator_must_wait() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    let signed = wallet.sign(1, &txp.id).await.expect("signature");

    assert_eq!(wallet.service.get_remaining_delete_lock_time(wallet.ctx(0), &signed), 600);
    let result = wallet.service.remove_pending_tx(wallet.ctx(0), &txp.id).await;
    assert!(matches!(result, Err(CosignError::TxCannotRemove { .. })));
}

#[tokio::test]
async fn test_remove_when_other_copayer_rejected_then_waits_for_delete_lock() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    let rejected = wallet.reject(1, &txp.id).await.expect("single rejection");
    assert!(rejected.is_pending());

    assert_eq!(wallet.service.get_remaining_delete_lock_time(wallet.ctx(0), &rejected), 600);
    let early = wallet.service.remove_pending_tx(wallet.ctx(0), &txp.id).await;
    assert!(matches!(early, Err(CosignError::TxCannotRemove { remaining_secs: 600 })));

    wallet.clock.advance_secs(600);
    wallet.service.remove_pending_tx(wallet.ctx(0), &txp.id).await.expect("remove after lock");
}

#[tokio::test]
async fn test_remove_when_accepted_then_not_pending() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;
    wallet.sign(0, &txp.id).await.expect("first signature");
    wallet.sign(1, &txp.id).await.expect("second signature");

    wallet.clock.advance_secs(3_600);
    let result = wallet.service.remove_pending_tx(wallet.ctx(0), &txp.id).await;
    assert!(matches!(result, Err(CosignError::TxNotPending)));
}
