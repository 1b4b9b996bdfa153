//! Newline-delimited JSON framing shared by the lock and relay protocols.

use crate::foundation::Result;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Longest accepted line; longer frames are rejected by readers.
pub const MAX_LINE_BYTES: usize = 1024 * 1024;

pub fn encode_line<T: Serialize>(message: &T) -> Result<String> {
    let mut line = serde_json::to_string(message)?;
    line.push('\n');
    Ok(line)
}

pub fn decode_line<T: DeserializeOwned>(line: &str) -> Result<T> {
    Ok(serde_json::from_str(line.trim_end())?)
}
