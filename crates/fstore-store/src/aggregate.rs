//! Read-only word statistics over every stored file.
//!
//! Both aggregations fan out one blocking task per name entry and join on
//! all of them. A file whose content cannot be resolved contributes nothing;
//! only a failure to start the scan fails the whole call.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use fstore_types::{Digest, Order, WordFrequency};
use tokio::task::JoinSet;
use tracing::{debug, warn};

use crate::error::{StoreError, StoreResult};
use crate::traits::{BlobStore, NameIndex};

/// Number of whitespace-delimited words in a payload.
pub fn count_words(payload: &[u8]) -> u64 {
    String::from_utf8_lossy(payload).split_whitespace().count() as u64
}

/// Lower-cased word counts for a single payload.
pub fn tally_words(payload: &[u8]) -> HashMap<String, u64> {
    let mut counts = HashMap::new();
    for word in String::from_utf8_lossy(payload).split_whitespace() {
        *counts.entry(word.to_lowercase()).or_insert(0) += 1;
    }
    counts
}

/// Sort word counts by count and keep the first `limit` entries.
///
/// Equal counts are ordered by word so output is stable. A `limit` of
/// `None` or `Some(0)` keeps everything.
pub fn rank(frequencies: HashMap<String, u64>, order: Order, limit: Option<usize>) -> Vec<WordFrequency> {
    let mut ranked: Vec<WordFrequency> = frequencies
        .into_iter()
        .map(|(word, count)| WordFrequency::new(word, count))
        .collect();
    ranked.sort_by(|a, b| {
        let by_count = match order {
            Order::Asc => a.count.cmp(&b.count),
            Order::Dsc => b.count.cmp(&a.count),
        };
        by_count.then_with(|| a.word.cmp(&b.word))
    });
    if let Some(limit) = limit.filter(|&n| n > 0) {
        ranked.truncate(limit);
    }
    ranked
}

/// Fan-out statistics engine over a name index and blob store.
#[derive(Clone)]
pub struct Aggregator {
    names: Arc<dyn NameIndex>,
    blobs: Arc<dyn BlobStore>,
}

impl Aggregator {
    pub fn new(names: Arc<dyn NameIndex>, blobs: Arc<dyn BlobStore>) -> Self {
        Self { names, blobs }
    }

    /// Total word count across all stored files.
    pub async fn word_count(&self) -> StoreResult<u64> {
        let total = Arc::new(AtomicU64::new(0));
        let sink = Arc::clone(&total);
        let files = self
            .fan_out(move |payload| {
                sink.fetch_add(count_words(&payload), Ordering::Relaxed);
            })
            .await?;
        let total = total.load(Ordering::Relaxed);
        debug!(files, total, "word count complete");
        Ok(total)
    }

    /// Lower-cased word frequencies across all stored files, unordered.
    pub async fn word_frequency(&self) -> StoreResult<HashMap<String, u64>> {
        let shared = Arc::new(Mutex::new(HashMap::<String, u64>::new()));
        let sink = Arc::clone(&shared);
        let files = self
            .fan_out(move |payload| {
                let local = tally_words(&payload);
                let mut merged = sink.lock().unwrap_or_else(PoisonError::into_inner);
                for (word, count) in local {
                    *merged.entry(word).or_insert(0) += count;
                }
            })
            .await?;
        let frequencies = std::mem::take(&mut *shared.lock().unwrap_or_else(PoisonError::into_inner));
        debug!(files, words = frequencies.len(), "word frequency complete");
        Ok(frequencies)
    }

    /// [`word_frequency`](Self::word_frequency) sorted and truncated with [`rank`].
    pub async fn ranked_frequency(&self, order: Order, limit: Option<usize>) -> StoreResult<Vec<WordFrequency>> {
        Ok(rank(self.word_frequency().await?, order, limit))
    }

    /// Run `work` on the payload of every name entry, one task per entry.
    ///
    /// Returns the number of entries whose task ran to completion.
    async fn fan_out<F>(&self, work: F) -> StoreResult<usize>
    where
        F: Fn(Vec<u8>) + Send + Sync + 'static,
    {
        let work = Arc::new(work);
        let mut tasks = JoinSet::new();
        for (name, digest) in self.snapshot().await? {
            let blobs = Arc::clone(&self.blobs);
            let work = Arc::clone(&work);
            tasks.spawn_blocking(move || match blobs.get(&digest) {
                Ok(payload) => work(payload),
                Err(e) => warn!(
                    file = %name,
                    digest = %digest.short_hex(),
                    error = %e,
                    "skipping unresolvable file"
                ),
            });
        }

        let mut completed = 0;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(()) => completed += 1,
                Err(e) => warn!(error = %e, "aggregation task failed"),
            }
        }
        Ok(completed)
    }

    /// Collect every name entry on the blocking pool.
    async fn snapshot(&self) -> StoreResult<Vec<(String, Digest)>> {
        let names = Arc::clone(&self.names);
        tokio::task::spawn_blocking(move || -> StoreResult<Vec<(String, Digest)>> {
            let mut entries = Vec::new();
            for entry in names.for_each()? {
                match entry {
                    Ok(entry) => entries.push(entry),
                    Err(e) => warn!(error = %e, "skipping unreadable name entry"),
                }
            }
            Ok(entries)
        })
        .await
        .map_err(|e| StoreError::Backend(format!("name scan task failed: {e}")))?
    }
}
