#![allow(dead_code)]

/// Wall clock of every harness, seconds since epoch.
pub const TEST_NOW_SECS: u64 = 1_700_000_000;
pub const TEST_WALLET_ID: &str = "wallet-1";
pub const TEST_WALLET_SEED: u8 = 42;
pub const COIN: u64 = 100_000_000;
pub const TEST_FEE_PER_KB: u64 = 10_000;
