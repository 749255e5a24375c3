//! Result cache keyed by fingerprint, with lazy time-based expiry.
//!
//! Each record is the JSON mapping of the decision fields, the `_metadata`
//! of the call that produced it, and a `_cache_timestamp` in float seconds
//! since the Unix epoch.
//!
//! The cache is an optimisation, never a correctness requirement: unreadable,
//! undecodable, or invariant-breaking records read as absent and are deleted
//! opportunistically, and write failures are logged and swallowed.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use scopesignal_core::{CallMetadata, ClassifiedDecision, Decision, Fingerprint};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::StoreError;
use crate::backend::{CacheBackend, MemoryBackend};
use crate::fs::FsBackend;

#[derive(Serialize)]
struct CacheRecord {
    #[serde(flatten)]
    entry: ClassifiedDecision,
    #[serde(rename = "_cache_timestamp")]
    cache_timestamp: f64,
}

/// Read side of [`CacheRecord`]. Records holding only the decision fields
/// and a timestamp have no `_metadata`; a missing timestamp means epoch 0.
#[derive(Deserialize)]
struct StoredRecord {
    #[serde(flatten)]
    decision: Decision,
    #[serde(rename = "_metadata", default)]
    metadata: Option<CallMetadata>,
    #[serde(rename = "_cache_timestamp", default)]
    cache_timestamp: f64,
}

/// Just enough of a record to date it.
#[derive(Deserialize)]
struct RecordTimestamp {
    #[serde(rename = "_cache_timestamp")]
    cache_timestamp: Option<f64>,
}

/// Read-only cache introspection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub entry_count: usize,
    pub total_size_bytes: u64,
    /// Age of the oldest dated record, `None` when no record is readable.
    pub oldest_age_secs: Option<u64>,
    pub newest_age_secs: Option<u64>,
}

/// Shared handle to a result cache.
///
/// Cloning is cheap; clones share the same backend.
#[derive(Clone)]
pub struct ResultCache {
    backend: Arc<dyn CacheBackend>,
    ttl: Duration,
}

impl ResultCache {
    pub fn new(backend: Arc<dyn CacheBackend>, ttl: Duration) -> Self {
        Self { backend, ttl }
    }

    /// Filesystem cache rooted at `dir`.
    pub fn open_dir(dir: impl Into<PathBuf>, ttl: Duration) -> Result<Self, StoreError> {
        Ok(Self::new(Arc::new(FsBackend::open(dir)?), ttl))
    }

    pub fn in_memory(ttl: Duration) -> Self {
        Self::new(Arc::new(MemoryBackend::new()), ttl)
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Look up a fingerprint, annotating hits with `cache_hit` and their age.
    pub fn get(&self, fingerprint: &Fingerprint) -> Option<ClassifiedDecision> {
        self.get_at(fingerprint, Utc::now())
    }

    /// [`get`](Self::get) evaluated at an explicit instant.
    pub fn get_at(
        &self,
        fingerprint: &Fingerprint,
        now: DateTime<Utc>,
    ) -> Option<ClassifiedDecision> {
        let key = fingerprint.to_hex();

        let bytes = match self.backend.load(&key) {
            Ok(Some(bytes)) => bytes,
            Ok(None) => {
                debug!(fingerprint = %key, "cache miss");
                return None;
            }
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "cache read failed, treating as miss");
                self.discard(&key);
                return None;
            }
        };

        // Decoding a `Decision` re-checks its invariants.
        let record: StoredRecord = match serde_json::from_slice(&bytes) {
            Ok(record) => record,
            Err(e) => {
                warn!(fingerprint = %key, error = %e, "corrupt cache record, discarding");
                self.discard(&key);
                return None;
            }
        };

        let age = age_secs(record.cache_timestamp, now);
        if age > self.ttl.as_secs_f64() {
            debug!(fingerprint = %key, age_secs = age, "cache entry expired");
            self.discard(&key);
            return None;
        }

        debug!(fingerprint = %key, age_secs = age, "cache hit");
        let metadata = match record.metadata {
            Some(metadata) => metadata,
            None => unrecorded_metadata(fingerprint, &record.decision),
        };
        let entry = ClassifiedDecision {
            decision: record.decision,
            metadata,
        };
        Some(entry.into_cache_hit(age as u64))
    }

    /// Store a snapshot of a decision, replacing any existing record.
    ///
    /// Failures are logged and swallowed.
    pub fn set(&self, fingerprint: &Fingerprint, decision: &ClassifiedDecision) {
        self.set_at(fingerprint, decision, Utc::now());
    }

    /// [`set`](Self::set) stamped with an explicit instant.
    pub fn set_at(
        &self,
        fingerprint: &Fingerprint,
        decision: &ClassifiedDecision,
        now: DateTime<Utc>,
    ) {
        let key = fingerprint.to_hex();

        let mut entry = decision.clone();
        entry.metadata.cache_hit = false;
        entry.metadata.cache_age_secs = None;
        let record = CacheRecord {
            entry,
            cache_timestamp: epoch_secs(now),
        };

        let result = serde_json::to_vec_pretty(&record)
            .map_err(StoreError::from)
            .and_then(|bytes| self.backend.save(&key, &bytes));
        match result {
            Ok(()) => debug!(fingerprint = %key, "cached decision"),
            Err(e) => warn!(fingerprint = %key, error = %e, "cache write failed"),
        }
    }

    /// Delete every record. Returns how many were removed.
    pub fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for entry in self.backend.entries()? {
            match self.backend.remove(&entry.key) {
                Ok(true) => removed += 1,
                Ok(false) => {}
                Err(e) => warn!(key = %entry.key, error = %e, "failed to remove cache record"),
            }
        }
        info!(removed, "cache cleared");
        Ok(removed)
    }

    pub fn stats(&self) -> Result<CacheStats, StoreError> {
        self.stats_at(Utc::now())
    }

    /// [`stats`](Self::stats) evaluated at an explicit instant.
    ///
    /// Every listed record counts towards `entry_count` and size; only
    /// records with a readable timestamp contribute to the ages.
    pub fn stats_at(&self, now: DateTime<Utc>) -> Result<CacheStats, StoreError> {
        let entries = self.backend.entries()?;

        let mut timestamps = Vec::with_capacity(entries.len());
        for entry in &entries {
            let Ok(Some(bytes)) = self.backend.load(&entry.key) else {
                continue;
            };
            if let Ok(RecordTimestamp {
                cache_timestamp: Some(ts),
            }) = serde_json::from_slice(&bytes)
            {
                timestamps.push(ts);
            }
        }

        let oldest = timestamps.iter().copied().reduce(f64::min);
        let newest = timestamps.iter().copied().reduce(f64::max);

        Ok(CacheStats {
            entry_count: entries.len(),
            total_size_bytes: entries.iter().map(|e| e.size_bytes).sum(),
            oldest_age_secs: oldest.map(|ts| age_secs(ts, now) as u64),
            newest_age_secs: newest.map(|ts| age_secs(ts, now) as u64),
        })
    }

    fn discard(&self, key: &str) {
        if let Err(e) = self.backend.remove(key) {
            warn!(fingerprint = %key, error = %e, "failed to discard cache record");
        }
    }
}

/// Metadata for a record stored without any: the call that produced it is
/// unknown, so category and model are empty and `attempts` is 0.
fn unrecorded_metadata(fingerprint: &Fingerprint, decision: &Decision) -> CallMetadata {
    CallMetadata {
        category: String::new(),
        model: String::new(),
        fingerprint: *fingerprint,
        attempts: 0,
        latency_ms: 0,
        cache_hit: false,
        cache_age_secs: None,
        downgrade_reason: decision.downgrade_reason(),
    }
}

fn epoch_secs(at: DateTime<Utc>) -> f64 {
    at.timestamp_micros() as f64 / 1_000_000.0
}

/// Age of a record at `now`; records dated in the future count as fresh.
fn age_secs(timestamp: f64, now: DateTime<Utc>) -> f64 {
    (epoch_secs(now) - timestamp).max(0.0)
}
