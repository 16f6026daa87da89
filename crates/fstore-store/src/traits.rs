//! Storage seams for the two correlated namespaces.
//!
//! The [`FileStore`](crate::FileStore) coordinator is written against these
//! traits only; sled-backed and in-memory backends implement them.

use fstore_types::Digest;

use crate::error::StoreResult;

/// Lazy sequence of `(name, digest)` pairs produced by [`NameIndex::for_each`].
pub type NameEntries<'a> = Box<dyn Iterator<Item = StoreResult<(String, Digest)>> + Send + 'a>;

/// Persistent mapping from file name to content digest.
///
/// Every single-key operation is atomic. Implementations must be
/// thread-safe; concurrency control is left to the backend.
pub trait NameIndex: Send + Sync {
    /// Insert `name -> digest` unless `name` is already present.
    ///
    /// Fails with `Conflict` if the name exists; the existing entry is left
    /// untouched.
    fn put_if_absent(&self, name: &str, digest: &Digest) -> StoreResult<()>;

    /// Unconditional upsert.
    fn put(&self, name: &str, digest: &Digest) -> StoreResult<()>;

    /// Look up the digest for `name`. Fails with `NotFound` if absent.
    fn get(&self, name: &str) -> StoreResult<Digest>;

    /// Remove `name`. Fails with `NotFound` if absent.
    fn delete(&self, name: &str) -> StoreResult<()>;

    /// Iterate all entries in index order.
    ///
    /// Each call starts a fresh scan; an iterator is never restarted.
    fn for_each(&self) -> StoreResult<NameEntries<'_>>;

    /// Returns `true` if `name` is present. Backend failures read as absent.
    fn contains(&self, name: &str) -> bool {
        self.get(name).is_ok()
    }

    /// Reverse lookup: any name currently mapped to `digest`.
    ///
    /// Linear in the number of names. A per-entry read failure aborts the
    /// scan, since callers use a negative answer to delete content.
    fn find_by_digest(&self, digest: &Digest) -> StoreResult<Option<String>> {
        for entry in self.for_each()? {
            let (name, candidate) = entry?;
            if candidate == *digest {
                return Ok(Some(name));
            }
        }
        Ok(None)
    }

    /// Persist buffered writes. Backends without buffering do nothing.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Persistent mapping from digest to immutable payload bytes.
pub trait BlobStore: Send + Sync {
    /// Returns `true` if a blob is stored under `digest`. Never fails;
    /// backend errors read as absent.
    fn exists(&self, digest: &Digest) -> bool;

    /// Read a payload. Fails with `NotFound` if absent.
    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>>;

    /// Store `payload` under `digest` if no blob is present yet.
    ///
    /// Returns `true` if the blob was written, `false` if it already existed.
    /// An existing blob is never overwritten: equal digests mean equal content.
    fn put_if_absent(&self, digest: &Digest, payload: &[u8]) -> StoreResult<bool>;

    /// Remove a blob. Returns `true` if it existed; absence is not an error.
    fn delete(&self, digest: &Digest) -> StoreResult<bool>;

    /// Payload length in bytes, without reading the payload.
    fn size(&self, digest: &Digest) -> StoreResult<u64>;

    /// Persist buffered writes. Backends without buffering do nothing.
    fn flush(&self) -> StoreResult<()> {
        Ok(())
    }
}

/// Result of one space-reclamation pass.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReclaimOutcome {
    /// The pass did work and another pass may find more.
    MoreWork,
    /// Nothing left to do until the next tick.
    Idle,
}

/// Hook into a storage engine's own space reclamation.
///
/// Never touches application data; safe to call concurrently with any
/// coordinator or aggregator operation.
pub trait SpaceReclaimer: Send + Sync {
    /// Namespace label for logs.
    fn namespace(&self) -> &str;

    /// Run one reclamation pass.
    fn reclaim(&self) -> StoreResult<ReclaimOutcome>;
}
