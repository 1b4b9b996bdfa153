use cosign_core::domain::{Notification, NotificationType};
use cosign_core::foundation::{NotificationId, WalletId};
use cosign_core::infrastructure::messaging::{NotificationBus, RelayBus};
use cosign_service::service::RelayServer;
use serde_json::json;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio::sync::broadcast;

const RECEIVE_TIMEOUT: Duration = Duration::from_secs(2);

async fn start_relay() -> String {
    let server = RelayServer::bind("127.0.0.1:0").await.expect("bind relay");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(server.run());
    addr
}

async fn connect(addr: &str) -> RelayBus {
    RelayBus::connect(addr, 3, Duration::from_millis(50)).await.expect("connect relay")
}

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

async fn next(receiver: &mut broadcast::Receiver<Notification>) -> Notification {
    tokio::time::timeout(RECEIVE_TIMEOUT, receiver.recv()).await.expect("notification in time").expect("open channel")
}

/// The relay subscribes each connection on its own task; give both sides time to settle.
async fn settle() {
    tokio::time::sleep(Duration::from_millis(100)).await;
}

#[tokio::test]
async fn test_relay_when_published_then_every_client_receives_including_sender() {
    let addr = start_relay().await;
    let publisher = connect(&addr).await;
    let listener = connect(&addr).await;
    let mut own = publisher.subscribe();
    let mut remote = listener.subscribe();
    settle().await;

    publisher.publish(&notification(1, NotificationType::NewTxProposal)).await.expect("publish");

    let echoed = next(&mut own).await;
    let relayed = next(&mut remote).await;
    assert_eq!(echoed, relayed);
    assert_eq!(relayed.kind, NotificationType::NewTxProposal);
    assert_eq!(relayed.data["seq"], 1);
}

#[tokio::test]
async fn test_relay_when_clients_publish_then_all_observe_same_order() {
    let addr = start_relay().await;
    let first = connect(&addr).await;
    let second = connect(&addr).await;
    let mut first_rx = first.subscribe();
    let mut second_rx = second.subscribe();
    settle().await;

    first.publish(&notification(1, NotificationType::NewTxProposal)).await.expect("publish 1");
    second.publish(&notification(2, NotificationType::TxProposalAcceptedBy)).await.expect("publish 2");
    first.publish(&notification(3, NotificationType::TxProposalFinallyAccepted)).await.expect("publish 3");

    let mut seen_first = Vec::new();
    let mut seen_second = Vec::new();
    for _ in 0..3 {
        seen_first.push(next(&mut first_rx).await.id);
        seen_second.push(next(&mut second_rx).await.id);
    }
    assert_eq!(seen_first, seen_second);
}

#[tokio::test]
async fn test_relay_when_line_malformed_then_dropped_and_stream_continues() {
    let addr = start_relay().await;
    let listener = connect(&addr).await;
    let mut receiver = listener.subscribe();
    let mut raw = TcpStream::connect(&addr).await.expect("raw connect");
    settle().await;

    raw.write_all(b"not json at all\n").await.expect("send garbage");
    let valid = serde_json::to_string(&notification(7, NotificationType::NewBlock)).expect("encode");
    raw.write_all(format!("{}\n", valid).as_bytes()).await.expect("send valid");

    let received = next(&mut receiver).await;
    assert_eq!(received.kind, NotificationType::NewBlock);
    assert_eq!(received.data["seq"], 7);
}
