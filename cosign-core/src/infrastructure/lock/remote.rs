use crate::foundation::{CosignError, Result};
use crate::infrastructure::codec::{decode_line, encode_line, MAX_LINE_BYTES};
use crate::infrastructure::lock::{LockGuard, LockRequest, LockResponse, Locker};
use async_trait::async_trait;
use log::{debug, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

/// Extra time granted to the server beyond the requested wait before the client gives up.
const RESPONSE_SLACK: Duration = Duration::from_secs(2);

/// Lock client for the shared lock server. One connection per held lock; the server also
/// releases when that connection drops.
#[derive(Clone, Debug)]
pub struct RemoteLocker {
    addr: String,
}

impl RemoteLocker {
    pub fn new(addr: impl Into<String>) -> Self {
        Self { addr: addr.into() }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }
}

fn lock_err(action: &str, err: impl std::fmt::Display) -> CosignError {
    CosignError::LockError(format!("{}: {}", action, err))
}

#[async_trait]
impl Locker for RemoteLocker {
    async fn acquire(&self, token: &str, wait: Duration, max_hold: Duration) -> Result<LockGuard> {
        let stream = TcpStream::connect(&self.addr).await.map_err(|err| lock_err("connect", err))?;
        let (read_half, mut write_half) = stream.into_split();

        let request = LockRequest::Acquire { token: token.to_string(), wait_ms: wait.as_millis() as u64, ttl_ms: max_hold.as_millis() as u64 };
        write_half.write_all(encode_line(&request)?.as_bytes()).await.map_err(|err| lock_err("send acquire", err))?;

        let mut reader = BufReader::new(read_half.take(MAX_LINE_BYTES as u64));
        let mut line = String::new();
        let read = tokio::time::timeout(wait + RESPONSE_SLACK, reader.read_line(&mut line))
            .await
            .map_err(|_| CosignError::WalletLocked)?
            .map_err(|err| lock_err("read response", err))?;
        if read == 0 {
            return Err(lock_err("read response", "connection closed"));
        }

        match decode_line::<LockResponse>(&line)? {
            LockResponse::Granted { .. } => {
                debug!("remote lock granted token={} addr={}", token, self.addr);
                let release_token = token.to_string();
                Ok(LockGuard::new(
                    token,
                    Box::new(move || {
                        let release = LockRequest::Release { token: release_token.clone() };
                        let Ok(line) = encode_line(&release) else {
                            return;
                        };
                        // Without a runtime the dropped connection releases the lock server-side.
                        if let Ok(handle) = tokio::runtime::Handle::try_current() {
                            handle.spawn(async move {
                                if let Err(err) = write_half.write_all(line.as_bytes()).await {
                                    warn!("remote lock release failed token={} error={}", release_token, err);
                                }
                                let _ = write_half.shutdown().await;
                            });
                        }
                    }),
                ))
            }
            LockResponse::Timeout { .. } => Err(CosignError::WalletLocked),
            LockResponse::Error { message } => Err(CosignError::LockError(message)),
            LockResponse::Released { .. } => Err(lock_err("acquire", "unexpected release response")),
        }
    }
}
