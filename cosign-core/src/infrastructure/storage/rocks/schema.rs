/// Helper to build storage keys consistently.
pub struct KeyBuilder {
    buf: Vec<u8>,
}

impl KeyBuilder {
    pub fn with_capacity(cap: usize) -> Self {
        Self { buf: Vec::with_capacity(cap) }
    }

    pub fn prefix(mut self, prefix: &[u8]) -> Self {
        self.buf.extend_from_slice(prefix);
        self
    }

    pub fn str(mut self, value: &str) -> Self {
        self.buf.extend_from_slice(value.as_bytes());
        self
    }

    pub fn u64_be(mut self, value: u64) -> Self {
        self.buf.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub fn sep(mut self) -> Self {
        self.buf.push(b':');
        self
    }

    pub fn build(self) -> Vec<u8> {
        self.buf
    }
}

pub const SCHEMA_VERSION: u32 = 1;

pub const CF_DEFAULT: &str = "default";
pub const CF_METADATA: &str = "metadata";
/// wallet_id -> Wallet
pub const CF_WALLET: &str = "wallet";
/// copayer_id -> CopayerLookup
pub const CF_COPAYER_LOOKUP: &str = "copayer_lookup";
/// wallet_id:proposal_id -> TxProposal
pub const CF_TX: &str = "tx";
/// wallet_id:txid -> proposal_id
pub const CF_TX_HASH: &str = "tx_hash";
/// wallet_id:seq(u64 be) -> AddressRecord
pub const CF_ADDRESS: &str = "address";
/// address -> AddressIndexEntry
pub const CF_ADDRESS_INDEX: &str = "address_index";
/// wallet_id:notification_id -> Notification
pub const CF_NOTIFICATION: &str = "notification";
/// active:wallet_id / history:wallet_id
pub const CF_CACHE: &str = "cache";

pub const ALL_CFS: [&str; 10] =
    [CF_DEFAULT, CF_METADATA, CF_WALLET, CF_COPAYER_LOOKUP, CF_TX, CF_TX_HASH, CF_ADDRESS, CF_ADDRESS_INDEX, CF_NOTIFICATION, CF_CACHE];

pub const KEY_SCHEMA_VERSION: &[u8] = b"schema_version";
pub const PREFIX_ADDRESS_SEQ: &[u8] = b"addr_seq:";
pub const PREFIX_ACTIVE: &[u8] = b"active:";
pub const PREFIX_HISTORY: &[u8] = b"history:";

/// Key of every record scoped to `wallet_id`, optionally followed by an entity key.
pub fn wallet_scoped(wallet_id: &str, suffix: Option<&str>) -> Vec<u8> {
    let builder = KeyBuilder::with_capacity(wallet_id.len() + 1 + suffix.map_or(0, str::len)).str(wallet_id).sep();
    match suffix {
        Some(suffix) => builder.str(suffix).build(),
        None => builder.build(),
    }
}
