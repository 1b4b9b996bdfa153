//! RocksDB-backed storage engine.
//!
//! # Lock Semantics
//!
//! RocksDB is thread-safe for single puts. Writes spanning several keys (a proposal and its
//! txid index, an address batch and its wallet) go through one `WriteBatch` under `write_lock`
//! so readers never observe half an update and address sequences are allocated once.
//!
//! # Column Families
//!
//! See `schema.rs` for column family names and key prefixes. Values are JSON.

use crate::foundation::{CosignError, WalletId};
use crate::infrastructure::storage::rocks::schema::*;
use crate::storage_err;
use log::{debug, info, warn};
use rocksdb::{ColumnFamily, ColumnFamilyDescriptor, Direction, IteratorMode, Options as RocksOptions, DB};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard, TryLockError};
use std::time::{Duration, Instant};
use std::{env, fs, thread};

mod storage;

const DB_DIR_NAME: &str = "cosign-db";
const BATCH_LOCK_WAIT: Duration = Duration::from_secs(10);
const BATCH_LOCK_POLL: Duration = Duration::from_millis(10);

/// Value of `CF_ADDRESS_INDEX`.
#[derive(Debug, Serialize, Deserialize)]
pub(super) struct AddressIndexEntry {
    pub wallet_id: WalletId,
    pub seq: u64,
}

pub fn open_db_with_cfs(path: impl AsRef<Path>) -> Result<DB, CosignError> {
    let mut options = RocksOptions::default();
    options.create_if_missing(true);
    options.create_missing_column_families(true);
    options.set_use_fsync(true);
    options.set_paranoid_checks(true);

    let cfs = ALL_CFS.iter().map(|name| ColumnFamilyDescriptor::new(*name, RocksOptions::default())).collect::<Vec<_>>();
    DB::open_cf_descriptors(&options, path, cfs).map_err(|err| storage_err!("rocksdb open_cf_descriptors", err))
}

pub struct RocksStorage {
    db: Arc<DB>,
    write_lock: Mutex<()>,
    batch_lock_wait: Duration,
}

impl RocksStorage {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, CosignError> {
        Self::open_with_options(path, false)
    }

    pub fn open_with_options(path: impl AsRef<Path>, allow_schema_wipe: bool) -> Result<Self, CosignError> {
        let path = path.as_ref();
        debug!("opening RocksStorage path={}", path.display());
        let db = open_db_with_cfs(path)?;
        let storage = Self { db: Arc::new(db), write_lock: Mutex::new(()), batch_lock_wait: BATCH_LOCK_WAIT };
        match storage.check_schema_version()? {
            None => {}
            Some(stored) if allow_schema_wipe => {
                warn!("schema mismatch (stored={}, current={}); wiping db path={}", stored, SCHEMA_VERSION, path.display());
                drop(storage);
                if path.exists() {
                    fs::remove_dir_all(path).map_err(|err| storage_err!("fs::remove_dir_all schema_wipe", err))?;
                }
                return Self::open_with_options(path, false);
            }
            Some(stored) => {
                return Err(CosignError::StorageError {
                    operation: "schema check".to_string(),
                    details: format!("schema version mismatch: stored={} current={}", stored, SCHEMA_VERSION),
                });
            }
        }
        info!("RocksStorage opened path={}", path.display());
        Ok(storage)
    }

    /// Opens `<data_dir>/cosign-db`, falling back to `COSIGN_DATA_DIR` or `./.cosign` when empty.
    pub fn open_in_dir(data_dir: impl AsRef<Path>) -> Result<Self, CosignError> {
        let dir = data_dir.as_ref();
        if dir.as_os_str().is_empty() {
            return Self::open_default();
        }
        fs::create_dir_all(dir).map_err(|err| storage_err!("fs::create_dir_all open_in_dir", err))?;
        Self::open(dir.join(DB_DIR_NAME))
    }

    pub fn open_default() -> Result<Self, CosignError> {
        if let Ok(data_dir) = env::var(crate::infrastructure::config::DATA_DIR_ENV) {
            let trimmed = data_dir.trim();
            if !trimmed.is_empty() {
                return Self::open_in_dir(trimmed);
            }
        }
        let base = env::current_dir().map_err(|err| storage_err!("env::current_dir", err))?;
        Self::open_in_dir(base.join(".cosign"))
    }

    /// Returns the stored version when it differs from `SCHEMA_VERSION`; stamps fresh databases.
    fn check_schema_version(&self) -> Result<Option<u32>, CosignError> {
        let cf = self.cf_handle(CF_METADATA)?;
        let stored = self.db.get_cf(cf, KEY_SCHEMA_VERSION).map_err(|err| storage_err!("rocksdb get_cf schema_version", err))?;
        match stored {
            None => {
                info!("initializing fresh db schema schema_version={}", SCHEMA_VERSION);
                self.db.put_cf(cf, KEY_SCHEMA_VERSION, SCHEMA_VERSION.to_be_bytes()).map_err(CosignError::from)?;
                Ok(None)
            }
            Some(bytes) => {
                let array: [u8; 4] =
                    bytes.as_slice().try_into().map_err(|_| storage_err!("schema_version decode", "corrupt schema version"))?;
                let version = u32::from_be_bytes(array);
                Ok((version != SCHEMA_VERSION).then_some(version))
            }
        }
    }

    /// Serializes multi-key batches. Gives up with a storage error after `batch_lock_wait`
    /// rather than blocking a wallet operation indefinitely.
    fn lock_batches(&self, operation: &'static str) -> Result<MutexGuard<'_, ()>, CosignError> {
        let deadline = Instant::now() + self.batch_lock_wait;
        loop {
            match self.write_lock.try_lock() {
                Ok(guard) => return Ok(guard),
                Err(TryLockError::Poisoned(_)) => return Err(storage_err!(operation, "batch lock poisoned")),
                Err(TryLockError::WouldBlock) if Instant::now() >= deadline => {
                    warn!("batch lock wait elapsed operation={} wait_ms={}", operation, self.batch_lock_wait.as_millis());
                    return Err(storage_err!(operation, format!("batch lock not acquired within {}ms", self.batch_lock_wait.as_millis())));
                }
                Err(TryLockError::WouldBlock) => thread::sleep(BATCH_LOCK_POLL),
            }
        }
    }

    fn cf_handle(&self, name: &str) -> Result<&ColumnFamily, CosignError> {
        self.db.cf_handle(name).ok_or_else(|| CosignError::StorageError {
            operation: "rocksdb cf_handle".to_string(),
            details: format!("missing column family: {}", name),
        })
    }

    fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CosignError> {
        Ok(serde_json::to_vec(value)?)
    }

    fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, CosignError> {
        Ok(serde_json::from_slice(bytes)?)
    }

    fn get_decoded<T: serde::de::DeserializeOwned>(&self, cf_name: &str, key: &[u8]) -> Result<Option<T>, CosignError> {
        let cf = self.cf_handle(cf_name)?;
        match self.db.get_cf(cf, key).map_err(|err| storage_err!("rocksdb get_cf", err))? {
            Some(bytes) => Ok(Some(Self::decode(&bytes)?)),
            None => Ok(None),
        }
    }

    /// Decodes every value whose key starts with `prefix`, in key order.
    fn scan_prefix<T: serde::de::DeserializeOwned>(&self, cf_name: &str, prefix: &[u8]) -> Result<Vec<T>, CosignError> {
        let cf = self.cf_handle(cf_name)?;
        let mut values = Vec::new();
        for item in self.db.iterator_cf(cf, IteratorMode::From(prefix, Direction::Forward)) {
            let (key, value) = item.map_err(|err| storage_err!("rocksdb iterator", err))?;
            if !key.starts_with(prefix) {
                break;
            }
            values.push(Self::decode(&value)?);
        }
        Ok(values)
    }

    fn key_address(wallet_id: &WalletId, seq: u64) -> Vec<u8> {
        KeyBuilder::with_capacity(wallet_id.len() + 9).str(wallet_id).sep().u64_be(seq).build()
    }

    fn key_address_seq(wallet_id: &WalletId) -> Vec<u8> {
        KeyBuilder::with_capacity(PREFIX_ADDRESS_SEQ.len() + wallet_id.len()).prefix(PREFIX_ADDRESS_SEQ).str(wallet_id).build()
    }

    fn key_cache(prefix: &[u8], wallet_id: &WalletId) -> Vec<u8> {
        KeyBuilder::with_capacity(prefix.len() + wallet_id.len()).prefix(prefix).str(wallet_id).build()
    }

    fn next_address_seq(&self, wallet_id: &WalletId) -> Result<u64, CosignError> {
        let cf = self.cf_handle(CF_METADATA)?;
        match self.db.get_cf(cf, Self::key_address_seq(wallet_id)).map_err(|err| storage_err!("rocksdb get_cf addr_seq", err))? {
            Some(bytes) => {
                let array: [u8; 8] = bytes.as_slice().try_into().map_err(|_| storage_err!("addr_seq decode", "corrupt sequence"))?;
                Ok(u64::from_be_bytes(array))
            }
            None => Ok(0),
        }
    }

    pub fn compact(&self) -> Result<(), CosignError> {
        debug!("rocksdb compact_range start");
        self.db.compact_range(None::<&[u8]>, None::<&[u8]>);
        Ok(())
    }
}
