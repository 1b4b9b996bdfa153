use crate::domain::notification::Notification;
use crate::foundation::{CosignError, Result};
use crate::infrastructure::codec::{decode_line, encode_line, MAX_LINE_BYTES};
use crate::infrastructure::messaging::{NotificationBus, BUS_CAPACITY};
use async_trait::async_trait;
use log::{debug, info, warn};
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::TcpStream;
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;
use tokio::time::sleep;

struct Connection {
    writer: OwnedWriteHalf,
    reader: JoinHandle<()>,
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.reader.abort();
    }
}

/// Bus shared between processes through the relay server.
///
/// Published notifications go to the relay, which echoes them to every connection including
/// this one; local subscribers are fed only from the relay stream so all processes observe the
/// same order.
pub struct RelayBus {
    addr: String,
    attempts: usize,
    delay: Duration,
    sender: broadcast::Sender<Notification>,
    connection: Mutex<Option<Connection>>,
}

impl RelayBus {
    pub async fn connect(addr: impl Into<String>, attempts: usize, delay: Duration) -> Result<Self> {
        let (sender, _) = broadcast::channel(BUS_CAPACITY);
        let bus = Self { addr: addr.into(), attempts: attempts.max(1), delay, sender, connection: Mutex::new(None) };
        let connection = bus.open().await?;
        *bus.connection.lock().await = Some(connection);
        info!("connected to notification relay addr={}", bus.addr);
        Ok(bus)
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    async fn open(&self) -> Result<Connection> {
        let stream = self.dial().await?;
        let (read_half, writer) = stream.into_split();
        let reader = tokio::spawn(forward(read_half, self.sender.clone(), self.addr.clone()));
        Ok(Connection { writer, reader })
    }

    /// Dials the relay up to `attempts` times, sleeping `delay` between refusals.
    async fn dial(&self) -> Result<TcpStream> {
        let mut attempt = 1;
        loop {
            match TcpStream::connect(&self.addr).await {
                Ok(stream) => {
                    if attempt > 1 {
                        info!("notification relay reachable again addr={} attempt={}", self.addr, attempt);
                    }
                    return Ok(stream);
                }
                Err(err) if attempt < self.attempts => {
                    warn!("notification relay connect failed addr={} attempt={}/{} error={}", self.addr, attempt, self.attempts, err);
                    attempt += 1;
                    sleep(self.delay).await;
                }
                Err(err) => {
                    return Err(CosignError::MessagingError(format!("connect {} failed after {} attempts: {}", self.addr, attempt, err)));
                }
            }
        }
    }

    async fn write(connection: &mut Connection, line: &str) -> std::io::Result<()> {
        connection.writer.write_all(line.as_bytes()).await?;
        connection.writer.flush().await
    }
}

async fn forward(read_half: OwnedReadHalf, sender: broadcast::Sender<Notification>, addr: String) {
    let mut reader = BufReader::new(read_half.take(MAX_LINE_BYTES as u64));
    let mut line = String::new();
    loop {
        line.clear();
        match reader.read_line(&mut line).await {
            Ok(0) => {
                warn!("notification relay closed the connection addr={}", addr);
                return;
            }
            Ok(_) => match decode_line::<Notification>(&line) {
                Ok(notification) => {
                    let _ = sender.send(notification);
                }
                Err(err) => debug!("skipping malformed relay line error={}", err),
            },
            Err(err) => {
                warn!("notification relay read failed addr={} error={}", addr, err);
                return;
            }
        }
        // A frame that hit the byte limit leaves the reader exhausted.
        if reader.get_ref().limit() == 0 {
            warn!("notification relay frame too large addr={}", addr);
            return;
        }
        reader.get_mut().set_limit(MAX_LINE_BYTES as u64);
    }
}

#[async_trait]
impl NotificationBus for RelayBus {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        let line = encode_line(notification)?;
        let mut guard = self.connection.lock().await;
        if let Some(connection) = guard.as_mut() {
            match Self::write(connection, &line).await {
                Ok(()) => return Ok(()),
                Err(err) => warn!("relay publish failed, reconnecting addr={} error={}", self.addr, err),
            }
        }
        *guard = None;
        let mut connection = self.open().await?;
        Self::write(&mut connection, &line).await.map_err(|err| CosignError::MessagingError(format!("publish: {}", err)))?;
        *guard = Some(connection);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}
