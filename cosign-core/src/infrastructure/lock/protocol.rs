use serde::{Deserialize, Serialize};

/// Client request, one JSON object per line.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum LockRequest {
    Acquire { token: String, wait_ms: u64, ttl_ms: u64 },
    Release { token: String },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LockResponse {
    Granted { token: String },
    Timeout { token: String },
    Released { token: String },
    Error { message: String },
}
