use crate::fixtures::{external_address, payment, wallet_pub_key, TestWallet, TestWalletBuilder, COIN};
use bitcoin::Network;
use cosign_core::application::{CopayerContext, CreateTxParams, CreateWalletParams};
use cosign_core::domain::{DerivationStrategy, ProposalStatus, TxOutput};
use cosign_core::foundation::{CosignError, ProposalId, WalletId};
use std::collections::BTreeMap;

#[tokio::test]
async fn test_create_when_same_proposal_id_resubmitted_then_existing_returned() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN, COIN]).await;

    let mut params = payment(&external_address(), 10_000_000);
    params.proposal_id = Some(ProposalId::from("client-chosen-id"));
    let first = wallet.create(0, params.clone()).await.expect("create");
    assert_eq!(first.status, ProposalStatus::Temporary);
    let published = wallet.publish(0, &first).await.expect("publish");

    params.outputs[0].amount = 20_000_000;
    let again = wallet.create(0, params).await.expect("idempotent create");
    assert_eq!(again.id, published.id);
    assert_eq!(again.status, ProposalStatus::Pending);
    assert_eq!(again.total_amount(), 10_000_000);
}

#[tokio::test]
async fn test_create_when_dry_run_then_nothing_is_stored() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let addresses_before = wallet.service.storage().fetch_addresses(&wallet.wallet_id).expect("addresses").len();

    let mut params = payment(&external_address(), 10_000_000);
    params.dry_run = true;
    let txp = wallet.create(0, params).await.expect("dry run");
    assert!(!txp.inputs.is_empty());

    assert!(matches!(wallet.service.get_tx(wallet.ctx(0), &txp.id), Err(CosignError::TxNotFound)));
    let addresses_after = wallet.service.storage().fetch_addresses(&wallet.wallet_id).expect("addresses").len();
    assert_eq!(addresses_before, addresses_after);
}

#[tokio::test]
async fn test_create_when_not_dry_run_then_change_address_is_derived_and_stored() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;

    let txp = wallet.create(0, payment(&external_address(), 10_000_000)).await.expect("create");
    let change = txp.change_address.clone().expect("change address");
    assert!(change.is_change);
    let stored = wallet.service.storage().fetch_address_by_wallet_id(&wallet.wallet_id, &change.address).expect("fetch");
    assert_eq!(stored.map(|record| record.is_change), Some(true));
}

#[tokio::test]
async fn test_create_when_single_address_wallet_then_change_goes_to_first_address() {
    let wallet = TestWalletBuilder::new(1, 2).single_address().build().await;
    let funded = wallet.fund(&[COIN]).await;
    let again = wallet.receive_address().await;
    assert_eq!(again.address, funded[0].address);

    let txp = wallet.create(0, payment(&external_address(), 10_000_000)).await.expect("create");
    assert_eq!(txp.change_address.map(|record| record.address), Some(funded[0].address.clone()));
}

#[tokio::test]
async fn test_create_when_outputs_invalid_then_rejected_before_selection() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;

    let empty = CreateTxParams { fee_per_kb: Some(10_000), ..CreateTxParams::default() };
    assert!(matches!(wallet.create(0, empty).await, Err(CosignError::InvalidArgument(_))));

    let dust = payment(&external_address(), 100);
    assert!(matches!(wallet.create(0, dust).await, Err(CosignError::DustAmount { amount: 100, threshold: 546 })));

    let mut both = payment(&external_address(), 10_000_000);
    both.fee_level = Some("normal".to_string());
    assert!(matches!(wallet.create(0, both).await, Err(CosignError::InvalidArgument(_))));

    let mut unknown_level = payment(&external_address(), 10_000_000);
    unknown_level.fee_per_kb = None;
    unknown_level.fee_level = Some("whenever".to_string());
    assert!(matches!(wallet.create(0, unknown_level).await, Err(CosignError::InvalidArgument(_))));

    let too_much = payment(&external_address(), 5 * COIN);
    assert!(matches!(wallet.create(0, too_much).await, Err(CosignError::InsufficientFunds { .. })));
}

#[tokio::test]
async fn test_create_when_fee_level_given_then_rate_follows_explorer_estimate() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;

    let mut params = payment(&external_address(), 10_000_000);
    params.fee_per_kb = None;
    let default_level = wallet.create(0, params.clone()).await.expect("default level");
    assert_eq!(default_level.fee_level.as_deref(), Some("normal"));
    assert_eq!(default_level.fee_per_kb, 30_000);

    wallet.explorer.set_fee_samples(BTreeMap::from([(3, 0.0002)]));
    params.fee_level = Some("normal".to_string());
    let sampled = wallet.create(0, params).await.expect("sampled level");
    assert_eq!(sampled.fee_per_kb, 20_000);
}

#[tokio::test]
async fn test_create_when_wallet_unknown_or_incomplete_then_refused() {
    let wallet = TestWallet::new(2, 3).await;
    let copayer_id = wallet.ctx(0).copayer_id.clone();

    let missing = CopayerContext::new(copayer_id.clone(), WalletId::from("missing"));
    let result = wallet.service.create_tx(&missing, payment(&external_address(), 10_000_000)).await;
    assert!(matches!(result, Err(CosignError::WalletNotFound)));

    let pending_id = wallet
        .service
        .create_wallet(CreateWalletParams {
            id: Some(WalletId::from("half-joined")),
            name: "half".to_string(),
            m: 2,
            n: 2,
            pub_key: wallet_pub_key(),
            network: Network::Testnet,
            single_address: false,
            derivation_strategy: DerivationStrategy::Bip45,
        })
        .await
        .expect("create wallet");
    let pending = CopayerContext::new(copayer_id, pending_id);
    let result = wallet.service.create_tx(&pending, payment(&external_address(), 10_000_000)).await;
    assert!(matches!(result, Err(CosignError::WalletNotComplete)));
}

#[tokio::test]
async fn test_publish_when_not_creator_or_bad_signature_then_refused() {
    let wallet = TestWallet::new(2, 3).await;
    wallet.fund(&[COIN]).await;
    let txp = wallet.create(0, payment(&external_address(), 10_000_000)).await.expect("create");

    let foreign = wallet.proposal_signature(1, &txp);
    let not_creator = wallet.service.publish_tx(wallet.ctx(1), &txp.id, &foreign).await;
    assert!(matches!(not_creator, Err(CosignError::NotAuthorized(_))));

    let wrong_key = wallet.service.publish_tx(wallet.ctx(0), &txp.id, &foreign).await;
    assert!(matches!(wrong_key, Err(CosignError::BadSignatures(_))));

    let published = wallet.publish(0, &txp).await.expect("publish");
    assert_eq!(published.status, ProposalStatus::Pending);
    assert!(published.proposal_signature.is_some());
    let republished = wallet.publish(0, &txp).await.expect("publish again");
    assert_eq!(republished.status, ProposalStatus::Pending);
}

#[tokio::test]
async fn test_publish_when_input_disappeared_then_unavailable_utxos() {
    let wallet = TestWallet::new(2, 3).await;
    let utxos = wallet.fund(&[COIN]).await;
    let txp = wallet.create(0, payment(&external_address(), 10_000_000)).await.expect("create");

    wallet.explorer.remove_utxo(&utxos[0].txid, utxos[0].vout);
    assert!(matches!(wallet.publish(0, &txp).await, Err(CosignError::UnavailableUtxos)));
}

#[tokio::test]
async fn test_create_when_explicit_inputs_then_selection_is_bypassed() {
    let wallet = TestWallet::new(2, 3).await;
    let utxos = wallet.fund(&[COIN, COIN / 2]).await;

    let mut params = payment(&external_address(), 10_000_000);
    params.inputs = Some(vec![utxos[1].key()]);
    params.outputs.push(TxOutput { to_address: external_address(), amount: 1_000_000, message: Some("tip".to_string()) });
    let txp = wallet.create(0, params).await.expect("create");
    assert_eq!(txp.input_keys(), vec![utxos[1].key()]);
    assert_eq!(txp.total_amount(), 11_000_000);
}
