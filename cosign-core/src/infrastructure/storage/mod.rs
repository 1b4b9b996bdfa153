pub mod memory;
pub mod rocks;
pub mod traits;

pub use memory::MemoryStorage;
pub use rocks::RocksStorage;
pub use traits::*;
