pub mod backend;
pub mod content;
pub mod memory;

pub use backend::{StorageError, StorageStats, UnitFilter, UnitUpdate, WorkStore};
pub use content::{content_id, ContentStore, HttpContentStore, MemoryContentStore};
pub use memory::MemoryWorkStore;
