//! RocksDB-backed storage implementation.
//!
//! `RocksStorage` is the persistent implementation of `Storage`. See `engine.rs` for lock
//! semantics and `schema.rs` for column families and key layout.

pub mod engine;
pub mod schema;

pub use engine::RocksStorage;
