//! sled-backed name index and blob store.
//!
//! Each namespace is its own `sled::Db` under the configured root
//! (`<root>/names`, `<root>/blobs`) so the two engines flush and reclaim
//! space independently. The blob database keeps payloads in its default tree
//! and big-endian `u64` payload lengths in a `sizes` tree, written in the same
//! transaction.

use fstore_types::Digest;
use sled::transaction::{ConflictableTransactionResult, TransactionError};
use sled::Transactional;
use tracing::{debug, info, warn};

use crate::config::StoreConfig;
use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, NameEntries, NameIndex, ReclaimOutcome, SpaceReclaimer};

const NAMES_DB: &str = "names";
const BLOBS_DB: &str = "blobs";
const SIZES_TREE: &str = "sizes";

fn open_db(config: &StoreConfig, namespace: &str) -> StoreResult<sled::Db> {
    let engine = sled::Config::new().cache_capacity(config.cache_capacity_bytes());
    let engine = if config.diskless {
        engine.temporary(true)
    } else {
        engine.path(config.path.join(namespace))
    };
    let db = engine.open()?;
    info!(
        namespace,
        diskless = config.diskless,
        path = %config.path.display(),
        "opened storage engine"
    );
    Ok(db)
}

fn tx_error(err: TransactionError<()>) -> StoreError {
    match err {
        TransactionError::Storage(e) => StoreError::Engine(e),
        TransactionError::Abort(()) => StoreError::Backend("transaction aborted".into()),
    }
}

/// [`NameIndex`] over a dedicated sled database. Iterates in byte order.
#[derive(Clone, Debug)]
pub struct SledNameIndex {
    db: sled::Db,
}

impl SledNameIndex {
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        Ok(Self {
            db: open_db(config, NAMES_DB)?,
        })
    }

    /// Reclaimer bound to this namespace's engine.
    pub fn reclaimer(&self) -> SledReclaimer {
        SledReclaimer::new(NAMES_DB, self.db.clone())
    }

    fn decode_entry(key: &[u8], value: &[u8]) -> StoreResult<(String, Digest)> {
        let name = String::from_utf8(key.to_vec()).map_err(|e| StoreError::Corrupt {
            key: String::from_utf8_lossy(key).into_owned(),
            reason: e.to_string(),
        })?;
        let digest = Digest::from_slice(value).map_err(|e| StoreError::corrupt(&name, e))?;
        Ok((name, digest))
    }
}

impl NameIndex for SledNameIndex {
    fn put_if_absent(&self, name: &str, digest: &Digest) -> StoreResult<()> {
        let swapped = self.db.compare_and_swap(
            name.as_bytes(),
            None::<&[u8]>,
            Some(&digest.as_bytes()[..]),
        )?;
        swapped.map_err(|_| StoreError::Conflict(name.to_string()))
    }

    fn put(&self, name: &str, digest: &Digest) -> StoreResult<()> {
        self.db.insert(name.as_bytes(), &digest.as_bytes()[..])?;
        Ok(())
    }

    fn get(&self, name: &str) -> StoreResult<Digest> {
        match self.db.get(name.as_bytes())? {
            Some(value) => Digest::from_slice(&value).map_err(|e| StoreError::corrupt(name, e)),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    fn delete(&self, name: &str) -> StoreResult<()> {
        match self.db.remove(name.as_bytes())? {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound(name.to_string())),
        }
    }

    fn for_each(&self) -> StoreResult<NameEntries<'_>> {
        Ok(Box::new(self.db.iter().map(|item| {
            let (key, value) = item?;
            Self::decode_entry(&key, &value)
        })))
    }

    fn contains(&self, name: &str) -> bool {
        match self.db.contains_key(name.as_bytes()) {
            Ok(present) => present,
            Err(e) => {
                warn!(file = name, error = %e, "name lookup failed; treating as absent");
                false
            }
        }
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// [`BlobStore`] over a dedicated sled database.
#[derive(Clone, Debug)]
pub struct SledBlobStore {
    db: sled::Db,
    sizes: sled::Tree,
}

impl SledBlobStore {
    pub fn open(config: &StoreConfig) -> StoreResult<Self> {
        let db = open_db(config, BLOBS_DB)?;
        let sizes = db.open_tree(SIZES_TREE)?;
        Ok(Self { db, sizes })
    }

    /// Reclaimer bound to this namespace's engine.
    pub fn reclaimer(&self) -> SledReclaimer {
        SledReclaimer::new(BLOBS_DB, self.db.clone())
    }
}

impl BlobStore for SledBlobStore {
    fn exists(&self, digest: &Digest) -> bool {
        match self.db.contains_key(digest.as_bytes()) {
            Ok(present) => present,
            Err(e) => {
                warn!(digest = %digest.short_hex(), error = %e, "blob lookup failed; treating as absent");
                false
            }
        }
    }

    fn get(&self, digest: &Digest) -> StoreResult<Vec<u8>> {
        self.db
            .get(digest.as_bytes())?
            .map(|payload| payload.to_vec())
            .ok_or_else(|| StoreError::NotFound(digest.to_hex()))
    }

    fn put_if_absent(&self, digest: &Digest, payload: &[u8]) -> StoreResult<bool> {
        let key = &digest.as_bytes()[..];
        let len = (payload.len() as u64).to_be_bytes();
        let blobs: &sled::Tree = &self.db;
        let written = (blobs, &self.sizes)
            .transaction(|(blobs, sizes)| -> ConflictableTransactionResult<bool, ()> {
                if blobs.get(key)?.is_some() {
                    return Ok(false);
                }
                blobs.insert(key, payload)?;
                sizes.insert(key, &len[..])?;
                Ok(true)
            })
            .map_err(tx_error)?;
        if written {
            debug!(digest = %digest.short_hex(), size = payload.len(), "blob stored");
        }
        Ok(written)
    }

    fn delete(&self, digest: &Digest) -> StoreResult<bool> {
        let key = &digest.as_bytes()[..];
        let blobs: &sled::Tree = &self.db;
        (blobs, &self.sizes)
            .transaction(|(blobs, sizes)| -> ConflictableTransactionResult<bool, ()> {
                let existed = blobs.remove(key)?.is_some();
                sizes.remove(key)?;
                Ok(existed)
            })
            .map_err(tx_error)
    }

    fn size(&self, digest: &Digest) -> StoreResult<u64> {
        let raw = self
            .sizes
            .get(digest.as_bytes())?
            .ok_or_else(|| StoreError::NotFound(digest.to_hex()))?;
        let bytes = <[u8; 8]>::try_from(&raw[..]).map_err(|_| StoreError::Corrupt {
            key: digest.to_hex(),
            reason: format!("size record has {} bytes, expected 8", raw.len()),
        })?;
        Ok(u64::from_be_bytes(bytes))
    }

    fn flush(&self) -> StoreResult<()> {
        self.db.flush()?;
        Ok(())
    }
}

/// Triggers sled's write-back of dirty pages for one namespace.
///
/// sled compacts and frees segments as they are written back, so a flush is
/// the reclamation hint. A pass that wrote bytes reports `MoreWork`.
#[derive(Clone, Debug)]
pub struct SledReclaimer {
    namespace: &'static str,
    db: sled::Db,
}

impl SledReclaimer {
    fn new(namespace: &'static str, db: sled::Db) -> Self {
        Self { namespace, db }
    }
}

impl SpaceReclaimer for SledReclaimer {
    fn namespace(&self) -> &str {
        self.namespace
    }

    fn reclaim(&self) -> StoreResult<ReclaimOutcome> {
        let flushed = self.db.flush()?;
        debug!(namespace = self.namespace, flushed, "reclamation pass");
        Ok(if flushed > 0 {
            ReclaimOutcome::MoreWork
        } else {
            ReclaimOutcome::Idle
        })
    }
}
