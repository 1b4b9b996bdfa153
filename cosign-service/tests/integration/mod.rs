mod lock_server;
mod metrics;
mod relay;
