//! # Storage
//!
//! The document store contract with its in-memory and file-backed
//! implementations, the record codec, per-table locks, and the
//! [`RecordManager`] that layers relational constraints over the store.

pub mod codec;
pub mod document;
pub mod file;
pub mod lock;
pub mod memory;
pub mod record;

pub use document::{Document, DocumentStore, StoreError, StoreResult};
pub use file::FileStore;
pub use lock::{LockSet, TableLocks};
pub use memory::MemoryStore;
pub use record::{RecordError, RecordManager};
