use secp256k1::Error as SecpError;
use std::io;
use thiserror::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    // Client errors
    InvalidArgument,
    WalletNotFound,
    WalletAlreadyExists,
    WalletFull,
    WalletNotComplete,
    WalletLocked,
    WalletBusy,
    CopayerInWallet,
    CopayerRegistered,
    CopayerVoted,
    NotAuthorized,
    TooManyKeys,
    InvalidAddress,
    IncorrectAddressNetwork,
    InvalidChangeAddress,
    DustAmount,
    MainAddressGapReached,
    InsufficientFunds,
    InsufficientFundsForFee,
    UnavailableUtxos,
    TxNotFound,
    TxNotPending,
    TxNotAccepted,
    TxAlreadyBroadcasted,
    TxCannotCreate,
    TxCannotRemove,
    TxMaxSizeExceeded,
    BadSignatures,
    // Operational errors
    StorageError,
    SerializationError,
    ExplorerError,
    ExplorerTimeout,
    LockError,
    MessagingError,
    ConfigError,
    CryptoError,
    InvalidStateTransition,
    Message,
}

impl ErrorCode {
    /// Stable machine-readable code surfaced to callers.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::InvalidArgument => "INVALID_ARGUMENT",
            ErrorCode::WalletNotFound => "WALLET_NOT_FOUND",
            ErrorCode::WalletAlreadyExists => "WALLET_ALREADY_EXISTS",
            ErrorCode::WalletFull => "WALLET_FULL",
            ErrorCode::WalletNotComplete => "WALLET_NOT_COMPLETE",
            ErrorCode::WalletLocked => "WALLET_LOCKED",
            ErrorCode::WalletBusy => "WALLET_BUSY",
            ErrorCode::CopayerInWallet => "COPAYER_IN_WALLET",
            ErrorCode::CopayerRegistered => "COPAYER_REGISTERED",
            ErrorCode::CopayerVoted => "COPAYER_VOTED",
            ErrorCode::NotAuthorized => "NOT_AUTHORIZED",
            ErrorCode::TooManyKeys => "TOO_MANY_KEYS",
            ErrorCode::InvalidAddress => "INVALID_ADDRESS",
            ErrorCode::IncorrectAddressNetwork => "INCORRECT_ADDRESS_NETWORK",
            ErrorCode::InvalidChangeAddress => "INVALID_CHANGE_ADDRESS",
            ErrorCode::DustAmount => "DUST_AMOUNT",
            ErrorCode::MainAddressGapReached => "MAIN_ADDRESS_GAP_REACHED",
            ErrorCode::InsufficientFunds => "INSUFFICIENT_FUNDS",
            ErrorCode::InsufficientFundsForFee => "INSUFFICIENT_FUNDS_FOR_FEE",
            ErrorCode::UnavailableUtxos => "UNAVAILABLE_UTXOS",
            ErrorCode::TxNotFound => "TX_NOT_FOUND",
            ErrorCode::TxNotPending => "TX_NOT_PENDING",
            ErrorCode::TxNotAccepted => "TX_NOT_ACCEPTED",
            ErrorCode::TxAlreadyBroadcasted => "TX_ALREADY_BROADCASTED",
            ErrorCode::TxCannotCreate => "TX_CANNOT_CREATE",
            ErrorCode::TxCannotRemove => "TX_CANNOT_REMOVE",
            ErrorCode::TxMaxSizeExceeded => "TX_MAX_SIZE_EXCEEDED",
            ErrorCode::BadSignatures => "BAD_SIGNATURES",
            ErrorCode::StorageError => "STORAGE_ERROR",
            ErrorCode::SerializationError => "SERIALIZATION_ERROR",
            ErrorCode::ExplorerError => "EXPLORER_ERROR",
            ErrorCode::ExplorerTimeout => "EXPLORER_TIMEOUT",
            ErrorCode::LockError => "LOCK_ERROR",
            ErrorCode::MessagingError => "MESSAGING_ERROR",
            ErrorCode::ConfigError => "CONFIG_ERROR",
            ErrorCode::CryptoError => "CRYPTO_ERROR",
            ErrorCode::InvalidStateTransition => "INVALID_STATE_TRANSITION",
            ErrorCode::Message => "MESSAGE",
        }
    }

    /// Client errors are caller-correctable; everything else is operational.
    pub fn is_client_error(&self) -> bool {
        !matches!(
            self,
            ErrorCode::StorageError
                | ErrorCode::SerializationError
                | ErrorCode::ExplorerError
                | ErrorCode::ExplorerTimeout
                | ErrorCode::LockError
                | ErrorCode::MessagingError
                | ErrorCode::ConfigError
                | ErrorCode::CryptoError
                | ErrorCode::InvalidStateTransition
                | ErrorCode::Message
        )
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorContext {
    pub code: ErrorCode,
    pub message: String,
}

#[derive(Debug, Error)]
pub enum CosignError {
    // === Client errors ===
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("wallet not found")]
    WalletNotFound,

    #[error("wallet already exists")]
    WalletAlreadyExists,

    #[error("wallet full")]
    WalletFull,

    #[error("wallet is not complete")]
    WalletNotComplete,

    #[error("wallet is locked")]
    WalletLocked,

    #[error("wallet is busy, try later")]
    WalletBusy,

    #[error("copayer already in wallet")]
    CopayerInWallet,

    #[error("copayer id already registered on server")]
    CopayerRegistered,

    #[error("copayer already voted on this transaction proposal")]
    CopayerVoted,

    #[error("not authorized: {0}")]
    NotAuthorized(String),

    #[error("too many keys registered")]
    TooManyKeys,

    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("incorrect address network")]
    IncorrectAddressNetwork,

    #[error("invalid change address")]
    InvalidChangeAddress,

    #[error("amount below dust threshold: amount={amount} threshold={threshold}")]
    DustAmount { amount: u64, threshold: u64 },

    #[error("maximum number of consecutive addresses without activity reached")]
    MainAddressGapReached,

    #[error("insufficient funds: available={available} required={required}")]
    InsufficientFunds { available: u64, required: u64 },

    #[error("insufficient funds for fee: {0}")]
    InsufficientFundsForFee(String),

    #[error("some inputs were not found in the utxo set or are locked")]
    UnavailableUtxos,

    #[error("transaction proposal not found")]
    TxNotFound,

    #[error("the transaction proposal is not pending")]
    TxNotPending,

    #[error("the transaction proposal is not accepted")]
    TxNotAccepted,

    #[error("the transaction proposal is already broadcasted")]
    TxAlreadyBroadcasted,

    #[error("cannot create transaction proposal during backoff time")]
    TxCannotCreate,

    #[error("cannot remove this transaction proposal yet: remaining_secs={remaining_secs}")]
    TxCannotRemove { remaining_secs: u64 },

    #[error("transaction exceeds maximum size: size_bytes={size} max_bytes={max}")]
    TxMaxSizeExceeded { size: u64, max: u64 },

    #[error("bad signatures: {0}")]
    BadSignatures(String),

    // === Operational errors ===
    #[error("storage error during {operation}: {details}")]
    StorageError { operation: String, details: String },

    #[error("serialization error ({format}): {details}")]
    SerializationError { format: String, details: String },

    #[error("explorer error during {operation}: {details}")]
    ExplorerError { operation: String, details: String },

    #[error("explorer request timed out: operation={operation} timeout_ms={timeout_ms}")]
    ExplorerTimeout { operation: String, timeout_ms: u64 },

    #[error("lock backend error: {0}")]
    LockError(String),

    #[error("messaging error: {0}")]
    MessagingError(String),

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("crypto error during {operation}: {details}")]
    CryptoError { operation: String, details: String },

    #[error("invalid state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("{0}")]
    Message(String),
}

pub type Result<T> = std::result::Result<T, CosignError>;

impl CosignError {
    pub fn code(&self) -> ErrorCode {
        match self {
            CosignError::InvalidArgument(_) => ErrorCode::InvalidArgument,
            CosignError::WalletNotFound => ErrorCode::WalletNotFound,
            CosignError::WalletAlreadyExists => ErrorCode::WalletAlreadyExists,
            CosignError::WalletFull => ErrorCode::WalletFull,
            CosignError::WalletNotComplete => ErrorCode::WalletNotComplete,
            CosignError::WalletLocked => ErrorCode::WalletLocked,
            CosignError::WalletBusy => ErrorCode::WalletBusy,
            CosignError::CopayerInWallet => ErrorCode::CopayerInWallet,
            CosignError::CopayerRegistered => ErrorCode::CopayerRegistered,
            CosignError::CopayerVoted => ErrorCode::CopayerVoted,
            CosignError::NotAuthorized(_) => ErrorCode::NotAuthorized,
            CosignError::TooManyKeys => ErrorCode::TooManyKeys,
            CosignError::InvalidAddress(_) => ErrorCode::InvalidAddress,
            CosignError::IncorrectAddressNetwork => ErrorCode::IncorrectAddressNetwork,
            CosignError::InvalidChangeAddress => ErrorCode::InvalidChangeAddress,
            CosignError::DustAmount { .. } => ErrorCode::DustAmount,
            CosignError::MainAddressGapReached => ErrorCode::MainAddressGapReached,
            CosignError::InsufficientFunds { .. } => ErrorCode::InsufficientFunds,
            CosignError::InsufficientFundsForFee(_) => ErrorCode::InsufficientFundsForFee,
            CosignError::UnavailableUtxos => ErrorCode::UnavailableUtxos,
            CosignError::TxNotFound => ErrorCode::TxNotFound,
            CosignError::TxNotPending => ErrorCode::TxNotPending,
            CosignError::TxNotAccepted => ErrorCode::TxNotAccepted,
            CosignError::TxAlreadyBroadcasted => ErrorCode::TxAlreadyBroadcasted,
            CosignError::TxCannotCreate => ErrorCode::TxCannotCreate,
            CosignError::TxCannotRemove { .. } => ErrorCode::TxCannotRemove,
            CosignError::TxMaxSizeExceeded { .. } => ErrorCode::TxMaxSizeExceeded,
            CosignError::BadSignatures(_) => ErrorCode::BadSignatures,
            CosignError::StorageError { .. } => ErrorCode::StorageError,
            CosignError::SerializationError { .. } => ErrorCode::SerializationError,
            CosignError::ExplorerError { .. } => ErrorCode::ExplorerError,
            CosignError::ExplorerTimeout { .. } => ErrorCode::ExplorerTimeout,
            CosignError::LockError(_) => ErrorCode::LockError,
            CosignError::MessagingError(_) => ErrorCode::MessagingError,
            CosignError::ConfigError(_) => ErrorCode::ConfigError,
            CosignError::CryptoError { .. } => ErrorCode::CryptoError,
            CosignError::InvalidStateTransition { .. } => ErrorCode::InvalidStateTransition,
            CosignError::Message(_) => ErrorCode::Message,
        }
    }

    pub fn context(&self) -> ErrorContext {
        ErrorContext { code: self.code(), message: self.to_string() }
    }

    pub fn is_client_error(&self) -> bool {
        self.code().is_client_error()
    }

    pub fn invalid_argument(details: impl Into<String>) -> Self {
        CosignError::InvalidArgument(details.into())
    }

    pub fn explorer(operation: impl Into<String>, details: impl std::fmt::Display) -> Self {
        CosignError::ExplorerError { operation: operation.into(), details: details.to_string() }
    }

    pub fn crypto(operation: impl Into<String>, details: impl std::fmt::Display) -> Self {
        CosignError::CryptoError { operation: operation.into(), details: details.to_string() }
    }
}

impl From<hex::FromHexError> for CosignError {
    fn from(err: hex::FromHexError) -> Self {
        CosignError::SerializationError { format: "hex".to_string(), details: err.to_string() }
    }
}

impl From<toml::de::Error> for CosignError {
    fn from(err: toml::de::Error) -> Self {
        CosignError::ConfigError(format!("TOML parsing error: {}", err))
    }
}

impl From<figment::Error> for CosignError {
    fn from(err: figment::Error) -> Self {
        CosignError::ConfigError(format!("config extraction failed: {}", err))
    }
}

impl From<rocksdb::Error> for CosignError {
    fn from(err: rocksdb::Error) -> Self {
        CosignError::StorageError { operation: "rocksdb".to_string(), details: err.to_string() }
    }
}

#[macro_export]
macro_rules! storage_err {
    ($op:expr, $err:expr) => {
        $crate::foundation::CosignError::StorageError { operation: $op.into(), details: $err.to_string() }
    };
}

#[macro_export]
macro_rules! serde_err {
    ($fmt:expr, $err:expr) => {
        $crate::foundation::CosignError::SerializationError { format: $fmt.into(), details: $err.to_string() }
    };
}

impl From<io::Error> for CosignError {
    fn from(err: io::Error) -> Self {
        CosignError::StorageError { operation: "io".to_string(), details: err.to_string() }
    }
}

impl From<serde_json::Error> for CosignError {
    fn from(err: serde_json::Error) -> Self {
        CosignError::SerializationError { format: "json".to_string(), details: err.to_string() }
    }
}

impl From<SecpError> for CosignError {
    fn from(err: SecpError) -> Self {
        CosignError::CryptoError { operation: "secp256k1".to_string(), details: err.to_string() }
    }
}

impl From<bitcoin::bip32::Error> for CosignError {
    fn from(err: bitcoin::bip32::Error) -> Self {
        CosignError::CryptoError { operation: "bip32".to_string(), details: err.to_string() }
    }
}

impl From<bitcoin::address::ParseError> for CosignError {
    fn from(err: bitcoin::address::ParseError) -> Self {
        CosignError::InvalidAddress(err.to_string())
    }
}

// NOTE: Avoid adding generic "stringly" error conversions here.
