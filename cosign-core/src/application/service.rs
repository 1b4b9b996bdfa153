use crate::domain::chain::{network_name, ChainParams};
use crate::domain::notification::{Notification, NotificationIdGenerator, NotificationType};
use crate::domain::wallet::Wallet;
use crate::foundation::util::time::{Clock, SystemClock};
use crate::foundation::{CopayerId, CosignError, Result, WalletId};
use crate::infrastructure::config::{AppConfig, BackendKind, StorageBackend};
use crate::infrastructure::explorer::{Explorer, HeightCache, TimeoutExplorer};
use crate::infrastructure::lock::{LocalLocker, LockGuard, Locker, RemoteLocker};
use crate::infrastructure::messaging::{LocalBus, NotificationBus, RelayBus};
use crate::infrastructure::storage::{MemoryStorage, RocksStorage, Storage};
use crate::foundation::constants::*;
use log::{debug, info, warn};
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;

/// Tunables of the wallet service, usually taken from [`AppConfig`].
#[derive(Clone, Debug)]
pub struct ServiceSettings {
    pub lock_wait: Duration,
    pub lock_max_hold: Duration,
    pub backoff_offset: usize,
    pub backoff_time_secs: u64,
    pub delete_lock_time_secs: u64,
    pub max_request_keys: usize,
    pub max_main_address_gap: usize,
    pub two_step_balance_threshold: usize,
    pub active_addresses_ttl_secs: u64,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            lock_wait: Duration::from_millis(LOCK_WAIT_TIME_MS),
            lock_max_hold: Duration::from_secs(LOCK_EXE_TIME_SECS),
            backoff_offset: BACKOFF_OFFSET,
            backoff_time_secs: BACKOFF_TIME_SECS,
            delete_lock_time_secs: DELETE_LOCKTIME_SECS,
            max_request_keys: MAX_REQUEST_KEYS,
            max_main_address_gap: MAX_MAIN_ADDRESS_GAP,
            two_step_balance_threshold: TWO_STEP_BALANCE_THRESHOLD,
            active_addresses_ttl_secs: ACTIVE_ADDRESSES_TTL_SECS,
        }
    }
}

impl ServiceSettings {
    pub fn from_config(config: &AppConfig) -> Self {
        Self {
            lock_wait: Duration::from_millis(config.lock.wait_ms),
            lock_max_hold: Duration::from_secs(config.lock.max_hold_secs),
            backoff_offset: config.proposals.backoff_offset,
            backoff_time_secs: config.proposals.backoff_time_secs,
            delete_lock_time_secs: config.proposals.delete_lock_time_secs,
            max_request_keys: config.proposals.max_request_keys,
            max_main_address_gap: config.addresses.max_main_address_gap,
            two_step_balance_threshold: config.cache.two_step_balance_threshold,
            active_addresses_ttl_secs: config.cache.active_addresses_ttl_secs,
        }
    }
}

/// Authenticated caller: a copayer of one wallet.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CopayerContext {
    pub copayer_id: CopayerId,
    pub wallet_id: WalletId,
}

impl CopayerContext {
    pub fn new(copayer_id: CopayerId, wallet_id: WalletId) -> Self {
        Self { copayer_id, wallet_id }
    }
}

/// Owns every collaborator of the coordination engine.
///
/// Mutating operations take the wallet lock before reading state and persist before they
/// notify. Cloning is cheap and shares all collaborators.
#[derive(Clone)]
pub struct WalletService {
    pub(crate) storage: Arc<dyn Storage>,
    pub(crate) explorer: Arc<dyn Explorer>,
    pub(crate) locker: Arc<dyn Locker>,
    pub(crate) bus: Arc<dyn NotificationBus>,
    pub(crate) height_cache: Arc<HeightCache>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) chain: ChainParams,
    pub(crate) settings: ServiceSettings,
    notification_ids: Arc<NotificationIdGenerator>,
}

impl WalletService {
    pub fn new(
        storage: Arc<dyn Storage>,
        explorer: Arc<dyn Explorer>,
        locker: Arc<dyn Locker>,
        bus: Arc<dyn NotificationBus>,
        chain: ChainParams,
    ) -> Self {
        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        Self {
            storage,
            explorer,
            locker,
            bus,
            height_cache: Arc::new(HeightCache::new(BLOCKHEIGHT_CACHE_TIME_SECS, clock.clone())),
            clock,
            chain,
            settings: ServiceSettings::default(),
            notification_ids: Arc::new(NotificationIdGenerator::new()),
        }
    }

    /// In-process collaborators only: memory storage, local lock and local bus.
    pub fn in_memory(explorer: Arc<dyn Explorer>, chain: ChainParams) -> Self {
        Self::new(Arc::new(MemoryStorage::new()), explorer, Arc::new(LocalLocker::new()), Arc::new(LocalBus::new()), chain)
    }

    /// Builds the service from validated configuration around a deployment-provided explorer.
    pub async fn from_config(config: &AppConfig, explorer: Arc<dyn Explorer>) -> Result<Self> {
        let chain = config.chain.chain_params()?;
        if explorer.network() != chain.network {
            return Err(CosignError::ConfigError(format!(
                "explorer network {} does not match chain.network {}",
                network_name(explorer.network()),
                config.chain.network
            )));
        }

        let storage: Arc<dyn Storage> = match config.service.storage {
            StorageBackend::Memory => Arc::new(MemoryStorage::new()),
            StorageBackend::Rocksdb => Arc::new(RocksStorage::open_in_dir(&config.service.data_dir)?),
        };

        let locker: Arc<dyn Locker> = match config.lock.backend {
            BackendKind::Local => Arc::new(LocalLocker::new()),
            BackendKind::Remote => {
                let addr = config.lock.remote_addr.clone().ok_or_else(|| CosignError::ConfigError("lock.remote_addr is required".to_string()))?;
                Arc::new(RemoteLocker::new(addr))
            }
        };

        let bus: Arc<dyn NotificationBus> = match config.messaging.backend {
            BackendKind::Local => Arc::new(LocalBus::new()),
            BackendKind::Remote => {
                let addr =
                    config.messaging.relay_addr.clone().ok_or_else(|| CosignError::ConfigError("messaging.relay_addr is required".to_string()))?;
                let attempts = config.messaging.reconnect_attempts as usize;
                let delay = Duration::from_millis(config.messaging.reconnect_delay_ms);
                Arc::new(RelayBus::connect(addr, attempts, delay).await?)
            }
        };

        let explorer: Arc<dyn Explorer> = Arc::new(TimeoutExplorer::new(
            explorer,
            Duration::from_secs(config.explorer.request_timeout_secs),
            Duration::from_secs(config.explorer.history_timeout_secs),
        ));

        info!(
            "wallet service configured network={} storage={:?} lock={:?} messaging={:?}",
            chain.network_name(),
            config.service.storage,
            config.lock.backend,
            config.messaging.backend
        );
        Ok(Self::new(storage, explorer, locker, bus, chain)
            .with_settings(ServiceSettings::from_config(config))
            .with_height_ttl(config.cache.height_ttl_secs))
    }

    pub fn with_settings(mut self, settings: ServiceSettings) -> Self {
        self.settings = settings;
        self
    }

    /// Replaces the time source; the height cache follows it.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.height_cache = Arc::new(HeightCache::new(BLOCKHEIGHT_CACHE_TIME_SECS, clock.clone()));
        self.clock = clock;
        self
    }

    pub fn with_height_ttl(mut self, ttl_secs: u64) -> Self {
        self.height_cache = Arc::new(HeightCache::new(ttl_secs, self.clock.clone()));
        self
    }

    pub fn chain(&self) -> &ChainParams {
        &self.chain
    }

    pub fn settings(&self) -> &ServiceSettings {
        &self.settings
    }

    pub fn storage(&self) -> &Arc<dyn Storage> {
        &self.storage
    }

    pub fn explorer(&self) -> &Arc<dyn Explorer> {
        &self.explorer
    }

    pub fn bus(&self) -> &Arc<dyn NotificationBus> {
        &self.bus
    }

    pub fn height_cache(&self) -> &Arc<HeightCache> {
        &self.height_cache
    }

    pub(crate) fn now_secs(&self) -> u64 {
        self.clock.now_secs()
    }

    pub(crate) async fn lock_wallet(&self, wallet_id: &WalletId) -> Result<LockGuard> {
        let guard = self.locker.acquire(wallet_id, self.settings.lock_wait, self.settings.lock_max_hold).await;
        if let Err(err) = &guard {
            debug!("wallet lock not acquired wallet_id={} error={}", wallet_id, err);
        }
        guard
    }

    pub(crate) fn fetch_wallet(&self, wallet_id: &WalletId) -> Result<Wallet> {
        self.storage.fetch_wallet(wallet_id)?.ok_or(CosignError::WalletNotFound)
    }

    pub fn get_wallet(&self, ctx: &CopayerContext) -> Result<Wallet> {
        self.fetch_wallet(&ctx.wallet_id)
    }

    /// Current block height, served from the height cache.
    pub async fn get_blockchain_height(&self) -> Result<u64> {
        self.height_cache.get(&self.chain.network_name(), self.explorer.as_ref()).await
    }

    /// Persists a notification and then publishes it. Publishing is best effort.
    pub(crate) async fn notify(
        &self,
        kind: NotificationType,
        wallet_id: &WalletId,
        creator_id: Option<&CopayerId>,
        data: Value,
    ) -> Result<Notification> {
        let now_ms = self.clock.now_millis();
        let notification = Notification::new(
            self.notification_ids.next(now_ms),
            kind,
            wallet_id.clone(),
            creator_id.cloned(),
            self.chain.network_name(),
            data,
            now_ms / 1000,
        );
        self.storage.store_notification(&notification)?;
        if let Err(err) = self.bus.publish(&notification).await {
            warn!("notification publish failed id={} type={:?} wallet_id={} error={}", notification.id, kind, wallet_id, err);
        }
        debug!("notification emitted id={} type={:?} wallet_id={}", notification.id, kind, wallet_id);
        Ok(notification)
    }
}
