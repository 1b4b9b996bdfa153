use crate::domain::chain::ChainParams;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeeLevel {
    pub level: String,
    pub fee_per_kb: u64,
    /// Block target the value was sampled at; `None` when the level default was used.
    #[serde(default)]
    pub nb_blocks: Option<u32>,
}

/// Every block target worth asking the explorer about, fallbacks included.
pub fn fee_block_targets(chain: &ChainParams) -> Vec<u32> {
    let mut targets = BTreeSet::new();
    for level in &chain.fee_levels {
        for offset in 0..=chain.fee_levels_fallback {
            targets.insert(level.nb_blocks + offset);
        }
    }
    targets.into_iter().collect()
}

/// Converts raw estimates (coin per kB, negative when unknown) into per-level base-unit rates.
///
/// Levels come out in table order and never increase from one level to the next.
pub fn compute_fee_levels(chain: &ChainParams, samples: &BTreeMap<u32, f64>) -> Vec<FeeLevel> {
    let sample_at = |nb_blocks: u32| -> Option<u64> {
        samples
            .get(&nb_blocks)
            .filter(|rate| rate.is_finite() && **rate >= 0.0)
            .map(|rate| (rate * chain.unit_to_base as f64).round() as u64)
    };

    let mut levels: Vec<FeeLevel> = chain
        .fee_levels
        .iter()
        .map(|level_spec| {
            let found = (0..=chain.fee_levels_fallback)
                .map(|offset| level_spec.nb_blocks + offset)
                .find_map(|nb_blocks| sample_at(nb_blocks).map(|fee| (nb_blocks, fee)));
            let (nb_blocks, mut fee_per_kb) = match found {
                Some((nb_blocks, fee)) => (Some(nb_blocks), fee),
                None => (None, level_spec.default_fee_per_kb),
            };
            if let Some(multiplier) = level_spec.multiplier {
                fee_per_kb = (fee_per_kb as f64 * multiplier).round() as u64;
            }
            FeeLevel { level: level_spec.name.clone(), fee_per_kb, nb_blocks }
        })
        .collect();

    for index in 1..levels.len() {
        levels[index].fee_per_kb = levels[index].fee_per_kb.min(levels[index - 1].fee_per_kb);
    }
    levels
}
