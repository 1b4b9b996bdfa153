use cosign_core::foundation::CosignError;
use cosign_service::service::{Metrics, LockServer};
use log::info;
use std::sync::Arc;

pub async fn run(listen_addr: &str, metrics: Arc<Metrics>) -> Result<(), CosignError> {
    let server = LockServer::bind(listen_addr).await?.with_metrics(metrics);
    tokio::select! {
        outcome = server.run() => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("lock server shutting down");
            Ok(())
        }
    }
}
