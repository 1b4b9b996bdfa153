use crate::domain::chain::parse_network;
use crate::infrastructure::config::types::{AppConfig, BackendKind, StorageBackend};

impl AppConfig {
    /// Collects every violation instead of stopping at the first one.
    pub fn validate(&self) -> Result<(), Vec<String>> {
        let mut errors = Vec::new();

        if self.service.storage == StorageBackend::Rocksdb && self.service.data_dir.trim().is_empty() {
            errors.push("service.data_dir is required when service.storage=rocksdb".to_string());
        }

        let chain = &self.chain;
        if chain.coin.trim().is_empty() {
            errors.push("chain.coin must not be empty".to_string());
        }
        if parse_network(&chain.network).is_none() {
            errors.push(format!("chain.network '{}' is not one of livenet, testnet, signet, regtest", chain.network));
        }
        if chain.min_fee_per_kb > chain.max_fee_per_kb {
            errors.push("chain.min_fee_per_kb cannot exceed chain.max_fee_per_kb".to_string());
        }
        if chain.max_tx_size_kb == 0 {
            errors.push("chain.max_tx_size_kb must be > 0".to_string());
        }
        let factors = &chain.selection;
        for (name, value) in [
            ("max_single_utxo_factor", factors.max_single_utxo_factor),
            ("min_tx_amount_vs_utxo_factor", factors.min_tx_amount_vs_utxo_factor),
            ("max_fee_vs_tx_amount_factor", factors.max_fee_vs_tx_amount_factor),
            ("max_fee_vs_single_utxo_fee_factor", factors.max_fee_vs_single_utxo_fee_factor),
        ] {
            if !value.is_finite() || value <= 0.0 {
                errors.push(format!("chain.selection.{} must be a positive number", name));
            }
        }

        if self.lock.wait_ms == 0 {
            errors.push("lock.wait_ms must be > 0".to_string());
        }
        if self.lock.max_hold_secs == 0 {
            errors.push("lock.max_hold_secs must be > 0".to_string());
        }
        if self.lock.backend == BackendKind::Remote && self.lock.remote_addr.as_deref().map_or(true, |addr| addr.trim().is_empty()) {
            errors.push("lock.remote_addr is required when lock.backend=remote".to_string());
        }
        if self.lock.listen_addr.trim().is_empty() {
            errors.push("lock.listen_addr must not be empty".to_string());
        }

        if self.messaging.backend == BackendKind::Remote
            && self.messaging.relay_addr.as_deref().map_or(true, |addr| addr.trim().is_empty())
        {
            errors.push("messaging.relay_addr is required when messaging.backend=remote".to_string());
        }
        if self.messaging.reconnect_attempts == 0 {
            errors.push("messaging.reconnect_attempts must be > 0".to_string());
        }

        if self.explorer.request_timeout_secs == 0 {
            errors.push("explorer.request_timeout_secs must be > 0".to_string());
        }
        if self.explorer.history_timeout_secs < self.explorer.request_timeout_secs {
            errors.push("explorer.history_timeout_secs cannot be shorter than explorer.request_timeout_secs".to_string());
        }

        if self.proposals.max_request_keys == 0 {
            errors.push("proposals.max_request_keys must be > 0".to_string());
        }
        if self.addresses.max_main_address_gap == 0 {
            errors.push("addresses.max_main_address_gap must be > 0".to_string());
        }
        if self.cache.height_ttl_secs == 0 {
            errors.push("cache.height_ttl_secs must be > 0".to_string());
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}
