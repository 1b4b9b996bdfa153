pub mod lock_server;
pub mod relay;
