use cosign_core::foundation::CosignError;
use cosign_core::infrastructure::lock::{LockRequest, LockResponse, Locker, RemoteLocker};
use cosign_service::service::LockServer;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

const WAIT: Duration = Duration::from_millis(200);
const MAX_HOLD: Duration = Duration::from_secs(60);

async fn start_server() -> String {
    let server = LockServer::bind("127.0.0.1:0").await.expect("bind lock server");
    let addr = server.local_addr().expect("local addr").to_string();
    tokio::spawn(server.run());
    addr
}

async fn wait_until_free(locker: &RemoteLocker, token: &str) {
    for _ in 0..100 {
        if let Ok(guard) = locker.acquire(token, Duration::from_millis(20), MAX_HOLD).await {
            drop(guard);
            return;
        }
    }
    panic!("token {} was never released", token);
}

async fn exchange(stream: &mut BufReader<TcpStream>, request: &LockRequest) -> LockResponse {
    let line = format!("{}\n", serde_json::to_string(request).expect("encode"));
    stream.get_mut().write_all(line.as_bytes()).await.expect("send");
    let mut response = String::new();
    stream.read_line(&mut response).await.expect("receive");
    serde_json::from_str(response.trim_end()).expect("decode response")
}

#[tokio::test]
async fn test_remote_locker_when_token_free_then_granted_and_other_tokens_independent() {
    let addr = start_server().await;
    let locker = RemoteLocker::new(addr);

    let first = locker.acquire("wallet-1", WAIT, MAX_HOLD).await.expect("grant wallet-1");
    assert_eq!(first.token(), "wallet-1");
    let other = locker.acquire("wallet-2", WAIT, MAX_HOLD).await.expect("grant wallet-2");
    assert_eq!(other.token(), "wallet-2");
}

#[tokio::test]
async fn test_remote_locker_when_token_held_then_wallet_locked_after_wait() {
    let addr = start_server().await;
    let locker = RemoteLocker::new(addr);

    let _held = locker.acquire("wallet-1", WAIT, MAX_HOLD).await.expect("first grant");
    let started = tokio::time::Instant::now();
    let second = locker.acquire("wallet-1", WAIT, MAX_HOLD).await;
    assert!(matches!(second, Err(CosignError::WalletLocked)));
    assert!(started.elapsed() >= WAIT);
}

#[tokio::test]
async fn test_remote_locker_when_guard_dropped_then_waiter_is_granted() {
    let addr = start_server().await;
    let locker = RemoteLocker::new(addr);

    let held = locker.acquire("wallet-1", WAIT, MAX_HOLD).await.expect("first grant");
    let waiter = {
        let locker = locker.clone();
        tokio::spawn(async move { locker.acquire("wallet-1", Duration::from_secs(5), MAX_HOLD).await.map(|guard| guard.token().to_string()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    drop(held);

    let granted = waiter.await.expect("join").expect("waiter granted");
    assert_eq!(granted, "wallet-1");
}

#[tokio::test]
async fn test_lock_server_when_connection_closes_then_held_locks_are_released() {
    let addr = start_server().await;
    let mut raw = BufReader::new(TcpStream::connect(&addr).await.expect("connect"));
    let acquire = LockRequest::Acquire { token: "wallet-1".to_string(), wait_ms: 200, ttl_ms: 60_000 };
    assert!(matches!(exchange(&mut raw, &acquire).await, LockResponse::Granted { .. }));
    drop(raw);

    wait_until_free(&RemoteLocker::new(addr), "wallet-1").await;
}

#[tokio::test]
async fn test_lock_server_when_token_reacquired_on_same_connection_then_error() {
    let addr = start_server().await;
    let mut raw = BufReader::new(TcpStream::connect(&addr).await.expect("connect"));
    let acquire = LockRequest::Acquire { token: "wallet-1".to_string(), wait_ms: 200, ttl_ms: 60_000 };

    assert!(matches!(exchange(&mut raw, &acquire).await, LockResponse::Granted { .. }));
    assert!(matches!(exchange(&mut raw, &acquire).await, LockResponse::Error { .. }));

    let release = LockRequest::Release { token: "wallet-1".to_string() };
    assert!(matches!(exchange(&mut raw, &release).await, LockResponse::Released { .. }));
    assert!(matches!(exchange(&mut raw, &release).await, LockResponse::Released { .. }));
    assert!(matches!(exchange(&mut raw, &acquire).await, LockResponse::Granted { .. }));
}

#[tokio::test]
async fn test_lock_server_when_request_malformed_then_error_and_connection_stays_open() {
    let addr = start_server().await;
    let mut raw = BufReader::new(TcpStream::connect(&addr).await.expect("connect"));

    raw.get_mut().write_all(b"{\"op\":\"grab\"}\n").await.expect("send");
    let mut response = String::new();
    raw.read_line(&mut response).await.expect("receive");
    let decoded: LockResponse = serde_json::from_str(response.trim_end()).expect("decode");
    assert!(matches!(decoded, LockResponse::Error { .. }));

    let acquire = LockRequest::Acquire { token: "wallet-9".to_string(), wait_ms: 200, ttl_ms: 60_000 };
    assert!(matches!(exchange(&mut raw, &acquire).await, LockResponse::Granted { .. }));
}
