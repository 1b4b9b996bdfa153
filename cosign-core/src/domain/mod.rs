//! Domain layer: wallet models and the pure algorithms of proposal coordination.

pub mod address;
pub mod chain;
pub mod fees;
pub mod notification;
pub mod proposal;
pub mod selection;
pub mod utxo;
pub mod wallet;

pub use address::{derive_address, AddressManager, AddressRecord, AddressType, DerivationStrategy};
pub use chain::{network_name, parse_network, ChainParams, FeeLevelSpec, SelectionFactors};
pub use fees::{compute_fee_levels, fee_block_targets, FeeLevel};
pub use notification::{Notification, NotificationIdGenerator, NotificationType};
pub use proposal::{ActionType, NewProposal, ProposalAction, ProposalStatus, TxOutput, TxProposal};
pub use selection::{CoinSelector, Selection, SelectionRequest};
pub use utxo::{totalize, Balance, Utxo};
pub use wallet::{Copayer, CopayerLookup, NewWallet, RequestPubKey, Wallet, WalletStatus};
