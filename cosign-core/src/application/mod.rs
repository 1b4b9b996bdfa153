//! Application layer: the wallet service orchestrating domain logic and infrastructure I/O.

pub mod addresses;
pub mod history;
pub mod monitor;
pub mod proposals;
pub mod service;
pub mod utxos;
pub mod wallets;

pub use history::{HistoryAction, TxHistoryItem};
pub use monitor::BlockchainMonitor;
pub use proposals::CreateTxParams;
pub use service::{CopayerContext, ServiceSettings, WalletService};
pub use wallets::{CreateWalletParams, JoinWalletParams, JoinedWallet};
