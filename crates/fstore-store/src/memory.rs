//! In-memory backends for tests and diskless embedding.
//!
//! Both namespaces live behind a `RwLock`. Data is lost when the store is
//! dropped.

use std::collections::{BTreeMap, HashMap};
use std::sync::{RwLock, RwLockReadGuard, RwLockWriteGuard};

use fstore_types::Digest;

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, NameEntries, NameIndex, ReclaimOutcome, SpaceReclaimer};

fn read_lock<T>(lock: &RwLock<T>) -> StoreResult<RwLockReadGuard<'_, T>> {
    lock.read()
        .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
}

fn write_lock<T>(lock: &RwLock<T>) -> StoreResult<RwLockWriteGuard<'_, T>> {
    lock.write()
        .map_err(|e| StoreError::Backend(format!("lock poisoned: {e}")))
}

/// `BTreeMap`-backed [`NameIndex`]. Iterates in byte order of names.
#[derive(Debug, Default)]
pub struct InMemoryNameIndex {
    entries: RwLock<BTreeMap<String, Digest>>,
}

impl InMemoryNameIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of names currently indexed.
    pub fn len(&self) -> usize {
        read_lock(&self.entries).map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl NameIndex for InMemoryNameIndex {
    fn put_if_absent(&self, name: &str, digest: &Digest) -> StoreResult<()> {
        let mut entries = write_lock(&self.entries)?;
        if entries.contains_key(name) {
            return Err(StoreError::Conflict(name.to_string()));
        }
        entries.insert(name.to_string(), *digest);
        Ok(())
    }

    fn put(&self, name: &str, digest: &Digest) -> StoreResult<()> {
        write_lock(&self.entries)?.insert(name.to_string(), *digest);
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Digest> {
        read_lock(&self.entries)?
            .get(name)
            .copied()
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        write_lock(&self.entries)?
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(name.to_string()))
    }

    fn for_each(&self) -> StoreResult<NameEntries<'_>> {
        // Point-in-time snapshot: later writers never affect this scan.
        let snapshot: Vec<(String, Digest)> = read_lock(&self.entries)?
            .iter()
            .map(|(name, digest)| (name.clone(), *digest))
            .collect();
        Ok(Box::new(snapshot.into_iter().map(Ok)))
    }
}

/// `HashMap`-backed [`BlobStore`].
#[derive(Debug, Default)]
pub struct InMemoryBlobStore {
    blobs: RwLock<HashMap<Digest, Vec<u8>>>,
}

impl InMemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct blobs stored.
    pub fn len(&self) -> usize {
        read_lock(&self.blobs).map(|m| m.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl BlobStore for InMemoryBlobStore {
    fn exists(&self, digest: &Digest) -> bool {
        read_lock(&self.blobs)
            .map(|m| m.contains_key(digest))
            .unwrap_or(false)
    }

    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        read_lock(&self.blobs)?
            .get(digest)
            .cloned()
            .ok_or_else(|| StoreError::NotFound(digest.to_hex()))
    }

    fn put_if_absent(&self, digest: &Digest, payload: &[u8]) -> StoreResult<bool> {
        let mut blobs = write_lock(&self.blobs)?;
        if blobs.contains_key(digest) {
            return Ok(false);
        }
        blobs.insert(*digest, payload.to_vec());
        Ok(true)
    }

    fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        Ok(write_lock(&self.blobs)?.remove(digest).is_some())
    }

    fn size(&self, digest: &Digest) -> StoreResult<u64> {
        read_lock(&self.blobs)?
            .get(digest)
            .map(|p| p.len() as u64)
            .ok_or_else(|| StoreError::NotFound(digest.to_hex()))
    }
}

/// Reclaimer for in-memory namespaces: there is never anything to do.
#[derive(Debug)]
pub struct InMemoryReclaimer {
    namespace: &'static str,
}

impl InMemoryReclaimer {
    pub fn new(namespace: &'static str) -> Self {
        Self { namespace }
    }
}

impl SpaceReclaimer for InMemoryReclaimer {
    fn namespace(&self) -> &str {
        self.namespace
    }

    fn reclaim(&self) -> StoreResult<ReclaimOutcome> {
        Ok(ReclaimOutcome::Idle)
    }
}
