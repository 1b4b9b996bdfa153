/// Main log file written under the configured log directory.
pub const LOG_FILE_NAME: &str = "cosign.log";
/// Warn and error records only.
pub const ERR_LOG_FILE_NAME: &str = "cosign_err.log";

/// Format: `timestamp [LEVEL] message [module] [thread-id]`
pub const LOG_LINE_PATTERN_COLORED: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{h({l:5})}] {m} [{M}] [{I}]{n}";

pub const LOG_LINE_PATTERN: &str = "{d(%Y-%m-%d %H:%M:%S%.3f)} [{l:5}] {m} [{M}] [{I}]{n}";

/// Rotation size for both log files (20 MB).
pub const LOG_FILE_MAX_SIZE: u64 = 20_000_000;

pub const LOG_FILE_MAX_ROLLS: u32 = 5;

/// Workspace crates logged at the app level; everything else is off unless opted in.
pub const WHITELISTED_CRATES: &[&str] = &["cosign_core", "cosign_service"];
