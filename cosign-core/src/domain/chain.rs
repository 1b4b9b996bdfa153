//! Per-network chain parameters.
//!
//! Each supported coin/network is a value of [`ChainParams`] handed to the components at
//! construction time; nothing downstream branches on the coin type.

use crate::foundation::constants::*;
use bitcoin::Network;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FeeLevelSpec {
    pub name: String,
    pub nb_blocks: u32,
    #[serde(default)]
    pub multiplier: Option<f64>,
    /// Fee-per-kB used when no estimate is available.
    pub default_fee_per_kb: u64,
}

impl FeeLevelSpec {
    fn new(name: &str, nb_blocks: u32, multiplier: Option<f64>, default_fee_per_kb: u64) -> Self {
        Self { name: name.to_string(), nb_blocks, multiplier, default_fee_per_kb }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SelectionFactors {
    pub max_single_utxo_factor: f64,
    pub min_tx_amount_vs_utxo_factor: f64,
    pub max_fee_vs_tx_amount_factor: f64,
    pub max_fee_vs_single_utxo_fee_factor: f64,
}

impl Default for SelectionFactors {
    fn default() -> Self {
        Self {
            max_single_utxo_factor: UTXO_SELECTION_MAX_SINGLE_UTXO_FACTOR,
            min_tx_amount_vs_utxo_factor: UTXO_SELECTION_MIN_TX_AMOUNT_VS_UTXO_FACTOR,
            max_fee_vs_tx_amount_factor: UTXO_SELECTION_MAX_FEE_VS_TX_AMOUNT_FACTOR,
            max_fee_vs_single_utxo_fee_factor: UTXO_SELECTION_MAX_FEE_VS_SINGLE_UTXO_FEE_FACTOR,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChainParams {
    pub coin: String,
    pub network: Network,
    /// Base units per whole coin.
    pub unit_to_base: u64,
    pub dust_threshold: u64,
    pub min_fee_per_kb: u64,
    pub max_fee_per_kb: u64,
    pub max_tx_size_kb: u64,
    pub default_fee_level: String,
    pub fee_levels_fallback: u32,
    pub fee_levels: Vec<FeeLevelSpec>,
    pub selection: SelectionFactors,
}

impl ChainParams {
    pub fn bitcoin(network: Network) -> Self {
        Self {
            coin: "btc".to_string(),
            network,
            unit_to_base: 100_000_000,
            dust_threshold: DUST_THRESHOLD,
            min_fee_per_kb: MIN_FEE_PER_KB,
            max_fee_per_kb: MAX_FEE_PER_KB,
            max_tx_size_kb: MAX_TX_SIZE_IN_KB,
            default_fee_level: DEFAULT_FEE_LEVEL.to_string(),
            fee_levels_fallback: FEE_LEVELS_FALLBACK,
            fee_levels: vec![
                FeeLevelSpec::new("urgent", 2, Some(1.5), 75_000),
                FeeLevelSpec::new("priority", 2, None, 50_000),
                FeeLevelSpec::new("normal", 3, None, 30_000),
                FeeLevelSpec::new("economy", 6, None, 25_000),
                FeeLevelSpec::new("superEconomy", 24, None, 10_000),
            ],
            selection: SelectionFactors::default(),
        }
    }

    pub fn max_tx_size_bytes(&self) -> u64 {
        self.max_tx_size_kb.saturating_mul(1000)
    }

    pub fn fee_level(&self, name: &str) -> Option<&FeeLevelSpec> {
        self.fee_levels.iter().find(|level| level.name == name)
    }

    pub fn fee_per_kb_in_range(&self, fee_per_kb: u64) -> bool {
        fee_per_kb >= self.min_fee_per_kb && fee_per_kb <= self.max_fee_per_kb
    }

    /// Wire name of the network in notifications and records.
    pub fn network_name(&self) -> String {
        network_name(self.network)
    }
}

pub fn network_name(network: Network) -> String {
    match network {
        Network::Bitcoin => "livenet".to_string(),
        other => other.to_string(),
    }
}

pub fn parse_network(value: &str) -> Option<Network> {
    match value.trim().to_ascii_lowercase().as_str() {
        "livenet" | "mainnet" | "bitcoin" => Some(Network::Bitcoin),
        "testnet" => Some(Network::Testnet),
        "signet" => Some(Network::Signet),
        "regtest" => Some(Network::Regtest),
        _ => None,
    }
}
