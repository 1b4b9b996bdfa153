use axum::body::to_bytes;
use axum::http::{Request, StatusCode};
use cosign_core::domain::{Notification, NotificationType};
use cosign_core::foundation::{CosignError, NotificationId, WalletId};
use cosign_core::infrastructure::lock::{Locker, RemoteLocker};
use cosign_core::infrastructure::messaging::{NotificationBus, RelayBus};
use cosign_service::service::metrics::build_router;
use cosign_service::service::{LockServer, Metrics, RelayServer};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

fn notification(seq: u32, kind: NotificationType) -> Notification {
    Notification::new(
        NotificationId::new(format!("{:014}{:04}abcd", 1_700_000_000_000u64, seq)),
        kind,
        WalletId::from("wallet-1"),
        None,
        "testnet",
        json!({ "seq": seq }),
        1_700_000_000,
    )
}

#[tokio::test]
async fn test_metrics_route_when_scraped_then_prometheus_text_returned() {
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    metrics.observe_notification(NotificationType::TxProposalRemoved);

    let request = Request::builder().uri("/metrics").body(axum::body::Body::empty()).expect("request");
    let response = build_router(metrics).oneshot(request).await.expect("response");
    assert_eq!(response.status(), StatusCode::OK);
    let content_type = response.headers().get("content-type").and_then(|value| value.to_str().ok()).map(str::to_string);
    assert_eq!(content_type.as_deref(), Some("text/plain; version=0.0.4"));

    let body = to_bytes(response.into_body(), usize::MAX).await.expect("body");
    let text = String::from_utf8(body.to_vec()).expect("utf8");
    assert!(text.contains("cosign_proposals_total{stage=\"removed\"} 1"));
}

#[tokio::test]
async fn test_lock_server_when_token_contended_then_wait_and_timeout_counted() {
    let metrics = Arc::new(Metrics::new().expect("metrics"));
    let server = LockServer::bind("127.0.0.1:0").await.expect("bind").with_metrics(metrics.clone());
    let addr = server.local_addr().expect("addr").to_string();
    tokio::spawn(server.run());
    let locker = RemoteLocker::new(addr);

    let _held = locker.acquire("wallet-1", Duration::from_millis(200), Duration::from_secs(60)).await.expect("grant");
    let second = locker.acquire("wallet-1", Duration::from_millis(50), Duration::from_secs(60)).await;
    assert!(matches!(second, Err(CosignError::WalletLocked)));

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.lock_grants, 1);
    assert_eq!(snapshot.lock_waits, 1);
    assert_eq!(snapshot.lock_timeouts, 1);
    assert_eq!(snapshot.lock_connections, 2);
}

#[tokio::test]
async fn test_relay_when_proposal_events_pass_then_counted_by_stage() {
    let server = RelayServer::bind("127.0.0.1:0").await.expect("bind relay");
    let metrics = server.metrics();
    let addr = server.local_addr().expect("addr").to_string();
    tokio::spawn(server.run());

    let bus = RelayBus::connect(addr, 3, Duration::from_millis(50)).await.expect("connect relay");
    let mut echoes = bus.subscribe();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let sent = [NotificationType::NewTxProposal, NotificationType::TxProposalRejectedBy, NotificationType::NewBlock];
    for (seq, kind) in sent.iter().enumerate() {
        bus.publish(&notification(seq as u32, *kind)).await.expect("publish");
    }
    for _ in 0..sent.len() {
        tokio::time::timeout(RECEIVE_TIMEOUT, echoes.recv()).await.expect("echo in time").expect("open channel");
    }

    let snapshot = metrics.snapshot();
    assert_eq!(snapshot.relay_connections, 1);
    assert_eq!(snapshot.proposals_published, 1);
    assert_eq!(snapshot.proposals_rejected, 1);
    assert_eq!(snapshot.proposals_signed, 0);
}
