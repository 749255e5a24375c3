//! Storage layer: content-addressed result cache over pluggable backends.

mod error;
pub use error::StoreError;

pub mod backend;
pub use backend::{CacheBackend, MemoryBackend, StoredEntry};

mod fs;
pub use fs::FsBackend;

mod cache;
pub use cache::{CacheStats, ResultCache};
