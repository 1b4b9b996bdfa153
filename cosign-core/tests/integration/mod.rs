mod concurrent_wallet_ops;
mod storage_persistence;
