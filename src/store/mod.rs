pub mod backend;
pub mod keys;
pub mod memory;
pub mod valkey;

pub use backend::{ScoredMember, StatsStore};
pub use keys::KeySpace;
pub use memory::MemoryStore;
pub use valkey::ValkeyStore;
