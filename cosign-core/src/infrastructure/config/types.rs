use crate::domain::chain::{parse_network, ChainParams, SelectionFactors};
use crate::foundation::constants::*;
use crate::foundation::{CosignError, Result};
use figment::value::{Dict, Map};
use serde::{Deserialize, Serialize};

pub const DEFAULT_LOCK_LISTEN_ADDR: &str = "127.0.0.1:3231";
pub const DEFAULT_RELAY_LISTEN_ADDR: &str = "127.0.0.1:3380";

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StorageBackend {
    #[default]
    Memory,
    #[serde(alias = "rocks")]
    Rocksdb,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendKind {
    /// In-process implementation.
    #[default]
    Local,
    /// Shared server reached over TCP.
    Remote,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ServiceConfig {
    /// Filled with the resolved data directory when empty.
    #[serde(default)]
    pub data_dir: String,
    #[serde(default)]
    pub storage: StorageBackend,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChainConfig {
    pub coin: String,
    /// `livenet`, `testnet`, `signet` or `regtest`.
    pub network: String,
    pub dust_threshold: u64,
    pub min_fee_per_kb: u64,
    pub max_fee_per_kb: u64,
    pub max_tx_size_kb: u64,
    #[serde(default)]
    pub selection: SelectionFactors,
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            coin: "btc".to_string(),
            network: "testnet".to_string(),
            dust_threshold: DUST_THRESHOLD,
            min_fee_per_kb: MIN_FEE_PER_KB,
            max_fee_per_kb: MAX_FEE_PER_KB,
            max_tx_size_kb: MAX_TX_SIZE_IN_KB,
            selection: SelectionFactors::default(),
        }
    }
}

impl ChainConfig {
    pub fn chain_params(&self) -> Result<ChainParams> {
        let network = parse_network(&self.network)
            .ok_or_else(|| CosignError::ConfigError(format!("unsupported chain.network '{}'", self.network)))?;
        let mut params = ChainParams::bitcoin(network);
        params.coin = self.coin.clone();
        params.dust_threshold = self.dust_threshold;
        params.min_fee_per_kb = self.min_fee_per_kb;
        params.max_fee_per_kb = self.max_fee_per_kb;
        params.max_tx_size_kb = self.max_tx_size_kb;
        params.selection = self.selection;
        Ok(params)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LockConfig {
    pub backend: BackendKind,
    /// Lock server address when `backend = "remote"`.
    #[serde(default)]
    pub remote_addr: Option<String>,
    pub wait_ms: u64,
    pub max_hold_secs: u64,
    /// Address the lock server binds in `lock-server` mode.
    pub listen_addr: String,
}

impl Default for LockConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            remote_addr: None,
            wait_ms: LOCK_WAIT_TIME_MS,
            max_hold_secs: LOCK_EXE_TIME_SECS,
            listen_addr: DEFAULT_LOCK_LISTEN_ADDR.to_string(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MessagingConfig {
    pub backend: BackendKind,
    #[serde(default)]
    pub relay_addr: Option<String>,
    pub listen_addr: String,
    pub reconnect_attempts: u32,
    pub reconnect_delay_ms: u64,
}

impl Default for MessagingConfig {
    fn default() -> Self {
        Self {
            backend: BackendKind::Local,
            relay_addr: None,
            listen_addr: DEFAULT_RELAY_LISTEN_ADDR.to_string(),
            reconnect_attempts: 5,
            reconnect_delay_ms: 500,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ExplorerConfig {
    pub request_timeout_secs: u64,
    pub history_timeout_secs: u64,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self { request_timeout_secs: EXPLORER_REQUEST_TIMEOUT_SECS, history_timeout_secs: EXPLORER_HISTORY_TIMEOUT_SECS }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ProposalConfig {
    pub backoff_offset: usize,
    pub backoff_time_secs: u64,
    pub delete_lock_time_secs: u64,
    pub max_request_keys: usize,
}

impl Default for ProposalConfig {
    fn default() -> Self {
        Self {
            backoff_offset: BACKOFF_OFFSET,
            backoff_time_secs: BACKOFF_TIME_SECS,
            delete_lock_time_secs: DELETE_LOCKTIME_SECS,
            max_request_keys: MAX_REQUEST_KEYS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AddressConfig {
    pub max_main_address_gap: usize,
}

impl Default for AddressConfig {
    fn default() -> Self {
        Self { max_main_address_gap: MAX_MAIN_ADDRESS_GAP }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CacheConfig {
    pub height_ttl_secs: u64,
    pub two_step_balance_threshold: usize,
    pub active_addresses_ttl_secs: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            height_ttl_secs: BLOCKHEIGHT_CACHE_TIME_SECS,
            two_step_balance_threshold: TWO_STEP_BALANCE_THRESHOLD,
            active_addresses_ttl_secs: ACTIVE_ADDRESSES_TTL_SECS,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct LoggingConfig {
    pub filters: String,
    #[serde(default)]
    pub log_dir: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { filters: "info".to_string(), log_dir: None }
    }
}

/// Prometheus endpoint of the network roles; disabled when `listen_addr` is unset.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub listen_addr: Option<String>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub service: ServiceConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub lock: LockConfig,
    #[serde(default)]
    pub messaging: MessagingConfig,
    #[serde(default)]
    pub explorer: ExplorerConfig,
    #[serde(default)]
    pub proposals: ProposalConfig,
    #[serde(default)]
    pub addresses: AddressConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
    /// Raw `[profiles.<name>]` sections; applied by the loader.
    #[serde(default, skip_serializing)]
    pub profiles: Option<Map<String, Dict>>,
}
