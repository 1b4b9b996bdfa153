//! Infrastructure layer: storage, locking, messaging, explorer access, config and logging.

pub mod codec;
pub mod config;
pub mod explorer;
pub mod lock;
pub mod logging;
pub mod messaging;
pub mod storage;
