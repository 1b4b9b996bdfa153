use cosign_core::foundation::CosignError;
use cosign_core::infrastructure::config::AppConfig;
use cosign_core::infrastructure::logging::init_logger;
use cosign_service::service::metrics::serve_metrics;
use cosign_service::service::Metrics;
use log::{info, warn};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

pub fn load_app_config() -> Result<AppConfig, CosignError> {
    cosign_core::infrastructure::config::load_app_config()
}

/// The command-line filter wins over `logging.filters`.
pub fn init_logging(app_config: &AppConfig, cli_filters: Option<&str>) -> Result<(), CosignError> {
    let filters = cli_filters.unwrap_or(&app_config.logging.filters);
    init_logger(app_config.logging.log_dir.as_deref(), filters)
}

pub fn log_startup_banner(app_config: &AppConfig, mode: &str, listen_addr: &str) {
    info!(
        "cosign-service starting mode={} listen_addr={} network={} data_dir={}",
        mode, listen_addr, app_config.chain.network, app_config.service.data_dir
    );
}

/// Binds the metrics endpoint up front so a bad address fails startup.
pub async fn spawn_metrics_endpoint(addr: &str, metrics: Arc<Metrics>) -> Result<JoinHandle<()>, CosignError> {
    let listener = TcpListener::bind(addr).await.map_err(|err| CosignError::ConfigError(format!("metrics bind {}: {}", addr, err)))?;
    Ok(tokio::spawn(async move {
        if let Err(err) = serve_metrics(listener, metrics).await {
            warn!("metrics endpoint stopped error={}", err);
        }
    }))
}
