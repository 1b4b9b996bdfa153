use cosign_core::foundation::{CosignError, Result};
use cosign_core::infrastructure::codec::{decode_line, encode_line, MAX_LINE_BYTES};
use cosign_core::infrastructure::lock::{LocalLocker, LockGuard, LockRequest, LockResponse, Locker};
use crate::service::metrics::Metrics;
use log::{debug, info, warn};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};

/// Shared lock server. Queueing is delegated to a [`LocalLocker`]; every lock a connection
/// holds is released when that connection closes.
pub struct LockServer {
    listener: TcpListener,
    locker: LocalLocker,
    metrics: Arc<Metrics>,
}

impl LockServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener = TcpListener::bind(addr).await.map_err(|err| CosignError::LockError(format!("bind {}: {}", addr, err)))?;
        Ok(Self { listener, locker: LocalLocker::new(), metrics: Arc::new(Metrics::new()?) })
    }

    /// Reports into a registry shared with other roles of the process.
    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|err| CosignError::LockError(format!("local_addr: {}", err)))
    }

    pub fn locker(&self) -> &LocalLocker {
        &self.locker
    }

    pub async fn run(self) -> Result<()> {
        info!("lock server listening addr={}", self.local_addr()?);
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("lock server accept failed error={}", err);
                    continue;
                }
            };
            debug!("lock client connected peer={}", peer);
            self.metrics.inc_connection("lock_server");
            let locker = self.locker.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                if let Err(err) = serve_connection(stream, locker, &metrics).await {
                    warn!("lock connection failed peer={} error={}", peer, err);
                }
                debug!("lock client disconnected peer={}", peer);
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, locker: LocalLocker, metrics: &Metrics) -> Result<()> {
    let (read_half, mut write_half) = stream.into_split();
    let mut reader = BufReader::new(read_half.take(MAX_LINE_BYTES as u64));
    let mut held: HashMap<String, LockGuard> = HashMap::new();
    let mut line = String::new();

    loop {
        line.clear();
        let read = reader.read_line(&mut line).await.map_err(|err| CosignError::LockError(format!("read: {}", err)))?;
        if read == 0 {
            break;
        }
        if reader.get_ref().limit() == 0 {
            warn!("lock request too large, closing connection");
            break;
        }
        reader.get_mut().set_limit(MAX_LINE_BYTES as u64);

        let response = match decode_line::<LockRequest>(&line) {
            Ok(request) => handle_request(&locker, metrics, &mut held, request).await,
            Err(err) => LockResponse::Error { message: format!("malformed request: {}", err) },
        };
        write_half
            .write_all(encode_line(&response)?.as_bytes())
            .await
            .map_err(|err| CosignError::LockError(format!("write: {}", err)))?;
    }

    if !held.is_empty() {
        info!("releasing locks of closed connection tokens={}", held.len());
    }
    Ok(())
}

async fn handle_request(locker: &LocalLocker, metrics: &Metrics, held: &mut HashMap<String, LockGuard>, request: LockRequest) -> LockResponse {
    match request {
        LockRequest::Acquire { token, wait_ms, ttl_ms } => {
            if held.contains_key(&token) {
                return LockResponse::Error { message: format!("token {} already held by this connection", token) };
            }
            if locker.is_locked(&token) {
                metrics.inc_lock_wait();
            }
            match locker.acquire(&token, Duration::from_millis(wait_ms), Duration::from_millis(ttl_ms)).await {
                Ok(guard) => {
                    metrics.inc_lock_request("granted");
                    held.insert(token.clone(), guard);
                    LockResponse::Granted { token }
                }
                Err(CosignError::WalletLocked) => {
                    metrics.inc_lock_request("timeout");
                    LockResponse::Timeout { token }
                }
                Err(err) => {
                    metrics.inc_lock_request("error");
                    LockResponse::Error { message: err.to_string() }
                }
            }
        }
        LockRequest::Release { token } => {
            if held.remove(&token).is_none() {
                debug!("release of a token not held token={}", token);
            }
            LockResponse::Released { token }
        }
    }
}
