//! Content-addressed file storage.
//!
//! Two correlated namespaces back every store:
//!
//! - a **name index** mapping file names to content digests, and
//! - a **blob store** mapping digests to payload bytes, one copy per distinct
//!   content.
//!
//! [`FileStore`] is the only component that mutates both. It deduplicates on
//! write and deletes a blob once the last name referencing it is gone.
//! [`Aggregator`] computes word statistics across every stored file, and
//! [`MaintenanceLoop`] periodically asks each storage engine to reclaim space.
//!
//! # Backends
//!
//! - [`SledNameIndex`] / [`SledBlobStore`]: one sled database per namespace.
//! - [`InMemoryNameIndex`] / [`InMemoryBlobStore`]: maps behind `RwLock`s,
//!   for tests and embedding.
//!
//! # Consistency
//!
//! Single-key operations are atomic. Compound writes (`add`, `update`,
//! `remove`) are not atomic across the two namespaces; they are serialized
//! within one process and leave partial state behind if a step fails.

pub mod aggregate;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod maintenance;
pub mod memory;
pub mod sled_store;
pub mod traits;

pub use aggregate::{count_words, rank, tally_words, Aggregator};
pub use config::StoreConfig;
pub use coordinator::{FileStore, UpdateOutcome};
pub use error::{ErrorKind, StoreError, StoreResult};
pub use maintenance::{MaintenanceHandle, MaintenanceLoop, DEFAULT_INTERVAL};
pub use memory::{InMemoryBlobStore, InMemoryNameIndex, InMemoryReclaimer};
pub use sled_store::{SledBlobStore, SledNameIndex, SledReclaimer};
pub use traits::{BlobStore, NameEntries, NameIndex, ReclaimOutcome, SpaceReclaimer};
