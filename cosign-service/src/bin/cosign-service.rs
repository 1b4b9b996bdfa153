#[path = "cosign-service/cli.rs"]
mod cli;
#[path = "cosign-service/modes/mod.rs"]
mod modes;
#[path = "cosign-service/setup.rs"]
mod setup;

use crate::cli::{Cli, Mode};
use cosign_service::service::Metrics;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Cli::parse_args();
    args.apply_to_env();

    let app_config = setup::load_app_config()?;
    setup::init_logging(&app_config, args.log_level.as_deref())?;

    let metrics = Arc::new(Metrics::new()?);
    let metrics_addr = args.metrics_listen.clone().or_else(|| app_config.metrics.listen_addr.clone());
    let metrics_task = match metrics_addr {
        Some(addr) => Some(setup::spawn_metrics_endpoint(&addr, metrics.clone()).await?),
        None => None,
    };

    match args.mode {
        Mode::LockServer => {
            let listen_addr = args.listen.clone().unwrap_or_else(|| app_config.lock.listen_addr.clone());
            setup::log_startup_banner(&app_config, "lock-server", &listen_addr);
            modes::lock_server::run(&listen_addr, metrics).await?;
        }
        Mode::Relay => {
            let listen_addr = args.listen.clone().unwrap_or_else(|| app_config.messaging.listen_addr.clone());
            setup::log_startup_banner(&app_config, "relay", &listen_addr);
            modes::relay::run(&listen_addr, metrics).await?;
        }
    }
    if let Some(task) = metrics_task {
        task.abort();
    }
    info!("cosign-service stopped");
    Ok(())
}
