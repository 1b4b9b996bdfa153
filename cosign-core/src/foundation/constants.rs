//! System-wide defaults for wallet coordination.

/// Smallest output value considered economical to create (satoshis).
pub const DUST_THRESHOLD: u64 = 546;

/// Maximum estimated transaction size in kilobytes.
pub const MAX_TX_SIZE_IN_KB: u64 = 100;

/// Maximum number of copayers in a wallet.
pub const MAX_COPAYERS: u8 = 15;

/// Maximum number of request keys a copayer may register.
pub const MAX_REQUEST_KEYS: usize = 100;

/// Lower bound for an explicit fee-per-kB.
pub const MIN_FEE_PER_KB: u64 = 0;

/// Upper bound for an explicit fee-per-kB.
pub const MAX_FEE_PER_KB: u64 = 1_000_000;

/// Name of the fee level used when the caller specifies neither a level nor a rate.
pub const DEFAULT_FEE_LEVEL: &str = "normal";

/// Number of extra block targets sampled when a fee level has no estimate.
pub const FEE_LEVELS_FALLBACK: u32 = 2;

/// A UTXO is "big" when it exceeds `amount * factor + fees`.
pub const UTXO_SELECTION_MAX_SINGLE_UTXO_FACTOR: f64 = 2.0;

/// Stop adding small inputs whose net value is below this share of the amount.
pub const UTXO_SELECTION_MIN_TX_AMOUNT_VS_UTXO_FACTOR: f64 = 0.1;

/// Fee share of the amount above which the single-utxo ratio is consulted.
pub const UTXO_SELECTION_MAX_FEE_VS_TX_AMOUNT_FACTOR: f64 = 0.05;

/// Maximum fee relative to the fee of a single-input transaction.
pub const UTXO_SELECTION_MAX_FEE_VS_SINGLE_UTXO_FEE_FACTOR: f64 = 5.0;

/// Consecutive rejected proposals tolerated before back-off applies.
pub const BACKOFF_OFFSET: usize = 10;

/// Back-off window in seconds.
pub const BACKOFF_TIME_SECS: u64 = 600;

/// Seconds before a pending proposal may be removed by any copayer.
pub const DELETE_LOCKTIME_SECS: u64 = 600;

/// Consecutive main addresses without activity allowed before creation is refused.
pub const MAX_MAIN_ADDRESS_GAP: usize = 20;

/// Default lock acquisition wait (milliseconds).
pub const LOCK_WAIT_TIME_MS: u64 = 5_000;

/// Default maximum lock hold (seconds).
pub const LOCK_EXE_TIME_SECS: u64 = 5 * 60;

/// Blockchain height cache TTL (seconds).
pub const BLOCKHEIGHT_CACHE_TIME_SECS: u64 = 10 * 60;

/// Explorer request timeout (seconds).
pub const EXPLORER_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Explorer timeout for bulk history fetches (seconds).
pub const EXPLORER_HISTORY_TIMEOUT_SECS: u64 = 120;

/// Window of broadcast proposals whose inputs are treated as spent (seconds).
pub const SPENT_INPUTS_WINDOW_SECS: u64 = 24 * 3600;

/// Maximum broadcast proposals inspected for spent inputs.
pub const SPENT_INPUTS_LIMIT: usize = 100;

/// Window used to de-duplicate incoming-payment notifications (seconds).
pub const INCOMING_TX_NOTIFY_WINDOW_SECS: u64 = 24 * 3600;

/// Address count from which balance is served in two steps.
pub const TWO_STEP_BALANCE_THRESHOLD: usize = 100;

/// Freshness of the stored active-address set (seconds).
pub const ACTIVE_ADDRESSES_TTL_SECS: u64 = 24 * 3600;

/// Maximum history items returned per page.
pub const HISTORY_LIMIT: usize = 1001;

/// Shared copayer index used for wallet-level BIP45 paths.
pub const BIP45_SHARED_INDEX: u32 = 2_147_483_647;

/// Path of the request-key authorization child derived from a copayer xpub.
pub const REQUEST_KEY_AUTH_PATH: &str = "m/2";

/// Notification record version.
pub const NOTIFICATION_VERSION: &str = "1.0.0";

/// Env override for the wall clock in tests (seconds since epoch).
pub const TEST_NOW_SECS_ENV_VAR: &str = "COSIGN_TEST_NOW_SECS";
