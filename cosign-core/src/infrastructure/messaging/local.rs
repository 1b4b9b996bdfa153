use crate::domain::notification::Notification;
use crate::foundation::Result;
use crate::infrastructure::messaging::{NotificationBus, BUS_CAPACITY};
use async_trait::async_trait;
use log::trace;
use tokio::sync::broadcast;

/// Single-process bus.
#[derive(Clone)]
pub struct LocalBus {
    sender: broadcast::Sender<Notification>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::with_capacity(BUS_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }
}

impl Default for LocalBus {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NotificationBus for LocalBus {
    async fn publish(&self, notification: &Notification) -> Result<()> {
        // No subscribers is not an error.
        let receivers = self.sender.send(notification.clone()).unwrap_or(0);
        trace!("notification published id={} type={:?} receivers={}", notification.id, notification.kind, receivers);
        Ok(())
    }

    fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.sender.subscribe()
    }
}
