use crate::fixtures::{external_address, payment, TestWallet, COIN};
use cosign_core::domain::ProposalStatus;
use cosign_core::foundation::CosignError;
use cosign_core::infrastructure::lock::{run_locked, LocalLocker, Locker};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_signatures_when_all_copayers_sign_then_quorum_applied_once() {
    let wallet = Arc::new(TestWallet::new(2, 3).await);
    wallet.fund(&[COIN]).await;
    let txp = wallet.propose(0, 10_000_000).await;

    let mut handles = Vec::new();
    for signer in 0..3 {
        let wallet = wallet.clone();
        let id = txp.id.clone();
        handles.push(tokio::spawn(async move { wallet.sign(signer, &id).await }));
    }
    let mut accepted = 0;
    let mut not_pending = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => accepted += 1,
            Err(CosignError::TxNotPending) => not_pending += 1,
            Err(err) => panic!("unexpected error: {}", err),
        }
    }
    assert_eq!((accepted, not_pending), (2, 1));

    let stored = wallet.service.get_tx(wallet.ctx(0), &txp.id).expect("stored");
    assert_eq!(stored.status, ProposalStatus::Accepted);
    assert_eq!(stored.actions.len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_publish_when_proposals_share_input_then_only_one_wins() {
    let wallet = Arc::new(TestWallet::new(2, 3).await);
    wallet.fund(&[COIN]).await;
    let first = wallet.create(0, payment(&external_address(), 10_000_000)).await.expect("first");
    let second = wallet.create(1, payment(&external_address(), 20_000_000)).await.expect("second");
    assert_eq!(first.input_keys(), second.input_keys());

    let (a, b) = tokio::join!(
        {
            let wallet = wallet.clone();
            async move { wallet.publish(0, &first).await }
        },
        {
            let wallet = wallet.clone();
            async move { wallet.publish(1, &second).await }
        }
    );
    let outcomes = [a.is_ok(), b.is_ok()];
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
    let loser = if outcomes[0] { b } else { a };
    assert!(matches!(loser, Err(CosignError::UnavailableUtxos)));
    assert_eq!(wallet.service.get_pending_txs(wallet.ctx(2)).expect("pending").len(), 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_create_when_copayers_race_then_pending_proposals_never_share_inputs() {
    let wallet = Arc::new(TestWallet::new(2, 3).await);
    wallet.fund(&[COIN, COIN, COIN]).await;

    let mut handles = Vec::new();
    for creator in 0..3 {
        let wallet = wallet.clone();
        handles.push(tokio::spawn(async move {
            let txp = wallet.create(creator, payment(&external_address(), 10_000_000)).await?;
            wallet.publish(creator, &txp).await
        }));
    }
    let mut published = 0;
    for handle in handles {
        match handle.await.expect("join") {
            Ok(_) => published += 1,
            Err(CosignError::UnavailableUtxos) => {}
            Err(err) => panic!("unexpected error: {}", err),
        }
    }
    assert!(published >= 1);

    let pending = wallet.service.get_pending_txs(wallet.ctx(0)).expect("pending");
    assert_eq!(pending.len(), published);
    let mut locked = HashSet::new();
    for txp in &pending {
        for key in txp.input_keys() {
            assert!(locked.insert(key.clone()), "input {} locked by two proposals", key);
        }
    }

    let next = wallet.create(0, payment(&external_address(), 10_000_000)).await;
    if published < 3 {
        let next = next.expect("a free input remains");
        assert!(next.input_keys().iter().all(|key| !locked.contains(key)));
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_local_locker_when_tasks_contend_then_critical_sections_do_not_overlap() {
    let locker = Arc::new(LocalLocker::new());
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let mut handles = Vec::new();
    for _ in 0..8 {
        let locker = locker.clone();
        let inside = inside.clone();
        let max_inside = max_inside.clone();
        handles.push(tokio::spawn(async move {
            run_locked(locker.as_ref() as &dyn Locker, "wallet-1", Duration::from_secs(5), Duration::from_secs(60), || async {
                let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                max_inside.fetch_max(now, Ordering::SeqCst);
                tokio::time::sleep(Duration::from_millis(10)).await;
                inside.fetch_sub(1, Ordering::SeqCst);
                Ok(())
            })
            .await
        }));
    }
    for handle in handles {
        handle.await.expect("join").expect("locked task");
    }
    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert!(!locker.is_locked("wallet-1"));
}

#[tokio::test]
async fn test_local_locker_when_wait_elapses_then_wallet_locked() {
    let locker = LocalLocker::new();
    let _held = locker.acquire("wallet-1", Duration::from_millis(50), Duration::from_secs(60)).await.expect("first");
    let second = locker.acquire("wallet-1", Duration::from_millis(50), Duration::from_secs(60)).await;
    assert!(matches!(second, Err(CosignError::WalletLocked)));
    assert!(locker.acquire("wallet-2", Duration::from_millis(50), Duration::from_secs(60)).await.is_ok());
}
