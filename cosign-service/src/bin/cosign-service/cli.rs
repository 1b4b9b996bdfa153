use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Shared FIFO lock server for multi-process deployments
    LockServer,
    /// Notification relay rebroadcasting every line to all clients
    Relay,
}

#[derive(Parser, Debug)]
#[command(name = "cosign-service")]
#[command(about = "Cosign multisig coordination network roles", long_about = None)]
pub struct Cli {
    /// Role to run
    #[arg(value_enum)]
    pub mode: Mode,

    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Override data directory
    #[arg(short, long)]
    pub data_dir: Option<PathBuf>,

    /// Override the listen address of the selected role
    #[arg(long)]
    pub listen: Option<String>,

    /// Serve Prometheus metrics on this address; defaults to `metrics.listen_addr`
    #[arg(long)]
    pub metrics_listen: Option<String>,

    /// Log filters, e.g. `info` or `debug,root=warn`; defaults to `logging.filters`
    #[arg(short, long)]
    pub log_level: Option<String>,
}

impl Cli {
    pub fn parse_args() -> Self {
        Self::parse()
    }

    pub fn apply_to_env(&self) {
        if let Some(config_path) = &self.config {
            std::env::set_var(cosign_core::infrastructure::config::CONFIG_PATH_ENV, config_path);
        }

        if let Some(data_dir) = &self.data_dir {
            std::env::set_var(cosign_core::infrastructure::config::DATA_DIR_ENV, data_dir);
        }
    }
}
