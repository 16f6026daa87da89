//! The consistency coordinator: the only code that touches both namespaces.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fstore_types::{Digest, FileRecord, Listing, Order, WordFrequency};
use tracing::{debug, info, warn};

use crate::aggregate::{count_words, Aggregator};
use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::memory::{InMemoryBlobStore, InMemoryNameIndex, InMemoryReclaimer};
use crate::sled_store::{SledBlobStore, SledNameIndex};
use crate::traits::{BlobStore, NameIndex, SpaceReclaimer};

/// Whether an update introduced a new name or replaced an existing one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateOutcome {
    Created,
    Updated,
}

/// Named files over a deduplicating blob store.
///
/// `add`, `update` and `remove` are compound: each touches the name index
/// and the blob store in sequence, with no rollback if a later step fails.
/// They are serialized through a write gate so an orphan check never races a
/// concurrent attach of the same content. Reads and aggregations do not take
/// the gate.
pub struct FileStore {
    names: Arc<dyn NameIndex>,
    blobs: Arc<dyn BlobStore>,
    reclaimers: Vec<Arc<dyn SpaceReclaimer>>,
    write_gate: Mutex<()>,
}

impl fmt::Debug for FileStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileStore")
            .field("reclaimers", &self.reclaimers.len())
            .finish_non_exhaustive()
    }
}

impl FileStore {
    pub fn new(names: Arc<dyn NameIndex>, blobs: Arc<dyn BlobStore>) -> Self {
        Self {
            names,
            blobs,
            reclaimers: Vec::new(),
            write_gate: Mutex::new(()),
        }
    }

    pub fn with_reclaimers(mut self, reclaimers: Vec<Arc<dyn SpaceReclaimer>>) -> Self {
        self.reclaimers = reclaimers;
        self
    }

    /// Store backed by in-memory maps. Contents vanish on drop.
    pub fn in_memory() -> Self {
        Self::new(
            Arc::new(InMemoryNameIndex::new()),
            Arc::new(InMemoryBlobStore::new()),
        )
        .with_reclaimers(vec![
            Arc::new(InMemoryReclaimer::new("names")),
            Arc::new(InMemoryReclaimer::new("blobs")),
        ])
    }

    /// Open (or create) the sled-backed namespaces described by `config`.
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let names = SledNameIndex::open(config)?;
        let blobs = SledBlobStore::open(config)?;
        let reclaimers: Vec<Arc<dyn SpaceReclaimer>> =
            vec![Arc::new(names.reclaimer()), Arc::new(blobs.reclaimer())];
        Ok(Self::new(Arc::new(names), Arc::new(blobs)).with_reclaimers(reclaimers))
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Create `name` with the given content.
    ///
    /// `payload` may be empty when `digest` names content that is already
    /// stored. Fails with `Conflict` if the name exists.
    pub fn add(&self, name: &str, digest: Option<&Digest>, payload: &[u8]) -> StoreResult<Digest> {
        validate_name(name)?;
        let _gate = self.lock_writes();
        let (digest, content) = self.resolve_content(name, digest, payload)?;

        self.names.put_if_absent(name, &digest)?;
        let stored = match content {
            Some(content) => self.blobs.put_if_absent(&digest, content)?,
            None => false,
        };
        debug!(file = name, digest = %digest.short_hex(), stored, "added file");
        Ok(digest)
    }

    /// Point `name` at the given content, creating it if needed.
    ///
    /// Content previously referenced by `name` is deleted once no other name
    /// references it.
    pub fn update(&self, name: &str, digest: Option<&Digest>, payload: &[u8]) -> StoreResult<UpdateOutcome> {
        validate_name(name)?;
        let _gate = self.lock_writes();
        let (digest, content) = self.resolve_content(name, digest, payload)?;

        let previous = match self.names.get(name) {
            Ok(previous) => Some(previous),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e),
        };
        self.names.put(name, &digest)?;
        if let Some(old) = previous.filter(|old| *old != digest) {
            self.reclaim_if_orphaned(&old)?;
        }
        if let Some(content) = content {
            self.blobs.put_if_absent(&digest, content)?;
        }

        let outcome = if previous.is_some() {
            UpdateOutcome::Updated
        } else {
            UpdateOutcome::Created
        };
        debug!(file = name, digest = %digest.short_hex(), ?outcome, "updated file");
        Ok(outcome)
    }

    /// Delete `name`, and its content if nothing else references it.
    pub fn remove(&self, name: &str) -> StoreResult<()> {
        let _gate = self.lock_writes();
        let digest = self.names.get(name)?;
        self.names.delete(name)?;
        let reclaimed = self.reclaim_if_orphaned(&digest)?;
        debug!(file = name, digest = %digest.short_hex(), reclaimed, "removed file");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn get(&self, name: &str) -> StoreResult<Vec<u8>> {
        let digest = self.names.get(name)?;
        self.blobs.get(&digest)
    }

    /// All names in index order, or full records when `details` is set.
    ///
    /// A record whose content cannot be resolved reports zero size and
    /// words rather than failing the listing.
    pub fn list(&self, details: bool) -> StoreResult<Listing> {
        let entries = self.names.for_each()?;
        if !details {
            let names = entries
                .map(|entry| entry.map(|(name, _)| name))
                .collect::<StoreResult<Vec<_>>>()?;
            return Ok(Listing::Names(names));
        }

        let mut records = Vec::new();
        for entry in entries {
            let (name, digest) = entry?;
            let size = self.blobs.size(&digest).unwrap_or_else(|e| {
                warn!(file = %name, digest = %digest.short_hex(), error = %e, "size unavailable");
                0
            });
            let word_count = match self.blobs.get(&digest) {
                Ok(payload) => count_words(&payload),
                Err(e) => {
                    warn!(file = %name, digest = %digest.short_hex(), error = %e, "content unavailable");
                    0
                }
            };
            records.push(FileRecord::new(name, &digest, size, word_count));
        }
        Ok(Listing::Details(records))
    }

    pub fn file_exists(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn content_exists(&self, digest: &Digest) -> bool {
        self.blobs.exists(digest)
    }

    // -----------------------------------------------------------------------
    // Statistics
    // -----------------------------------------------------------------------

    pub fn aggregator(&self) -> Aggregator {
        Aggregator::new(Arc::clone(&self.names), Arc::clone(&self.blobs))
    }

    pub async fn word_count(&self) -> StoreResult<u64> {
        self.aggregator().word_count().await
    }

    pub async fn word_frequency(&self, order: Order, limit: Option<usize>) -> StoreResult<Vec<WordFrequency>> {
        self.aggregator().ranked_frequency(order, limit).await
    }

    /// Unranked frequencies, for callers that sort on their own.
    pub async fn word_frequency_map(&self) -> StoreResult<HashMap<String, u64>> {
        self.aggregator().word_frequency().await
    }

    // -----------------------------------------------------------------------
    // Lifecycle
    // -----------------------------------------------------------------------

    /// One reclaimer per namespace, for the maintenance loop.
    pub fn reclaimers(&self) -> Vec<Arc<dyn SpaceReclaimer>> {
        self.reclaimers.clone()
    }

    /// Flush both namespaces. The store stays usable afterwards.
    pub fn close(&self) -> StoreResult<()> {
        let _gate = self.lock_writes();
        self.names.flush()?;
        self.blobs.flush()?;
        info!("file store closed");
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Internals
    // -----------------------------------------------------------------------

    fn lock_writes(&self) -> MutexGuard<'_, ()> {
        self.write_gate.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Decide which digest a write refers to, and the bytes to store under it.
    ///
    /// A non-empty payload always wins over a supplied digest. A bare digest
    /// must name content that is already stored, or be the digest of empty
    /// content, in which case the empty payload is stored.
    fn resolve_content<'a>(
        &self,
        name: &str,
        claimed: Option<&Digest>,
        payload: &'a [u8],
    ) -> StoreResult<(Digest, Option<&'a [u8]>)> {
        if !payload.is_empty() {
            let actual = Digest::of(payload);
            if let Some(claimed) = claimed.filter(|claimed| **claimed != actual) {
                warn!(
                    file = name,
                    claimed = %claimed.short_hex(),
                    actual = %actual.short_hex(),
                    "supplied digest does not match payload, using payload digest"
                );
            }
            return Ok((actual, Some(payload)));
        }
        match claimed {
            Some(digest) if self.blobs.exists(digest) => Ok((*digest, None)),
            Some(digest) if digest.matches(payload) => Ok((*digest, Some(payload))),
            Some(digest) => Err(StoreError::NotFound(digest.to_hex())),
            None => Err(StoreError::InvalidInput(format!(
                "{name}: neither content nor digest supplied"
            ))),
        }
    }

    /// Delete the blob for `digest` unless some name still references it.
    /// Returns `true` if the blob was deleted.
    fn reclaim_if_orphaned(&self, digest: &Digest) -> StoreResult<bool> {
        if let Some(holder) = self.names.find_by_digest(digest)? {
            debug!(digest = %digest.short_hex(), holder = %holder, "content still referenced");
            return Ok(false);
        }
        self.blobs.delete(digest)
    }
}

fn validate_name(name: &str) -> StoreResult<()> {
    if name.is_empty() {
        return Err(StoreError::InvalidInput("file name is empty".into()));
    }
    Ok(())
}
