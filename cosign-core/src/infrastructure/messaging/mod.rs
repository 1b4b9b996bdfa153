//! Notification fan-out.
//!
//! Notifications are persisted first and published afterwards; the bus is a best-effort push
//! channel, so subscribers that fall behind observe `Lagged` and can re-read from storage.

pub mod local;
pub mod remote;

pub use local::LocalBus;
pub use remote::RelayBus;

use crate::domain::notification::Notification;
use crate::foundation::Result;
use async_trait::async_trait;
use tokio::sync::broadcast;

/// Buffered notifications per subscriber before it starts lagging.
pub const BUS_CAPACITY: usize = 1024;

#[async_trait]
pub trait NotificationBus: Send + Sync {
    async fn publish(&self, notification: &Notification) -> Result<()>;

    /// Receives every notification published after the call, in publish order.
    fn subscribe(&self) -> broadcast::Receiver<Notification>;
}
