use crate::service::metrics::Metrics;
use cosign_core::domain::NotificationType;
use cosign_core::foundation::{CosignError, Result};
use cosign_core::infrastructure::codec::{decode_line, MAX_LINE_BYTES};
use cosign_core::infrastructure::messaging::BUS_CAPACITY;
use log::{debug, info, warn};
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::OwnedReadHalf;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::broadcast;

/// Notification relay: every JSON line a client sends is written to all connected clients,
/// the sender included, in the order the relay received them.
pub struct RelayServer {
    listener: TcpListener,
    lines: broadcast::Sender<Arc<str>>,
    metrics: Arc<Metrics>,
}

impl RelayServer {
    pub async fn bind(addr: &str) -> Result<Self> {
        let listener =
            TcpListener::bind(addr).await.map_err(|err| CosignError::MessagingError(format!("bind {}: {}", addr, err)))?;
        let (lines, _) = broadcast::channel(BUS_CAPACITY);
        Ok(Self { listener, lines, metrics: Arc::new(Metrics::new()?) })
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn metrics(&self) -> Arc<Metrics> {
        self.metrics.clone()
    }

    pub fn local_addr(&self) -> Result<SocketAddr> {
        self.listener.local_addr().map_err(|err| CosignError::MessagingError(format!("local_addr: {}", err)))
    }

    pub async fn run(self) -> Result<()> {
        info!("notification relay listening addr={}", self.local_addr()?);
        loop {
            let (stream, peer) = match self.listener.accept().await {
                Ok(accepted) => accepted,
                Err(err) => {
                    warn!("relay accept failed error={}", err);
                    continue;
                }
            };
            debug!("relay client connected peer={}", peer);
            self.metrics.inc_connection("relay");
            let lines = self.lines.clone();
            let metrics = self.metrics.clone();
            tokio::spawn(async move {
                serve_connection(stream, lines, metrics, peer).await;
                debug!("relay client disconnected peer={}", peer);
            });
        }
    }
}

async fn serve_connection(stream: TcpStream, lines: broadcast::Sender<Arc<str>>, metrics: Arc<Metrics>, peer: SocketAddr) {
    let (read_half, mut write_half) = stream.into_split();
    let mut outgoing = lines.subscribe();
    let mut incoming = tokio::spawn(read_lines(read_half, lines, metrics, peer));

    loop {
        tokio::select! {
            _ = &mut incoming => return,
            received = outgoing.recv() => match received {
                Ok(framed) => {
                    if let Err(err) = write_half.write_all(framed.as_bytes()).await {
                        warn!("relay write failed peer={} error={}", peer, err);
                        incoming.abort();
                        return;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!("relay client lagged peer={} skipped={}", peer, skipped);
                }
                Err(broadcast::error::RecvError::Closed) => {
                    incoming.abort();
                    return;
                }
            },
        }
    }
}

async fn read_lines(read_half: OwnedReadHalf, lines: broadcast::Sender<Arc<str>>, metrics: Arc<Metrics>, peer: SocketAddr) {
    let mut reader = BufReader::new(read_half.take(MAX_LINE_BYTES as u64));
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => return,
            Ok(_) => {}
            Err(err) => {
                warn!("relay read failed peer={} error={}", peer, err);
                return;
            }
        }
        if reader.get_ref().limit() == 0 {
            warn!("relay frame too large, closing peer={}", peer);
            return;
        }
        reader.get_mut().set_limit(MAX_LINE_BYTES as u64);
        match decode_line::<serde_json::Value>(&line) {
            Ok(value) => {
                if let Ok(kind) = NotificationType::deserialize(&value["type"]) {
                    metrics.observe_notification(kind);
                }
                let framed: Arc<str> = Arc::from(format!("{}\n", line.trim_end()));
                let _ = lines.send(framed);
            }
            Err(err) => debug!("dropping malformed relay line peer={} error={}", peer, err),
        }
    }
}
