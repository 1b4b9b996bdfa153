//! Network roles of a multi-process deployment.

pub mod lock_server;
pub mod metrics;
pub mod relay;

pub use lock_server::LockServer;
pub use metrics::{Metrics, MetricsSnapshot};
pub use relay::RelayServer;
