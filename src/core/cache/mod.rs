// src/core/cache/mod.rs

//! The read-through result cache.
//!
//! Read-only extraction results are cached under a deterministic fingerprint
//! of (session id, command kind, selector, kind-specific parameters). The
//! cache is bounded by an LRU capacity, entries expire after a TTL, and any
//! mutating command on a session drops every entry scoped to that session.
//! A per-fingerprint in-flight lock gives singleflight: a second request for
//! a fingerprint being computed waits for the first instead of issuing a
//! duplicate executor call.

use crate::core::commands::extract::{Extract, ExtractResult};
use crate::core::metrics;
use dashmap::DashMap;
use lru::LruCache;
use parking_lot::Mutex;
use sha2::{Digest, Sha256};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

/// The deterministic cache key of a read-only command.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    /// Builds the fingerprint of an extract command scoped to a session.
    /// Only parameters that affect output participate.
    pub fn for_extract(session_id: &str, cmd: &Extract) -> Self {
        let mut hasher = Sha256::new();
        for part in [
            session_id,
            "extract",
            &cmd.selector,
            &format!("{:?}", cmd.kind),
            cmd.kind_parameter(),
            if cmd.multiple { "multi" } else { "single" },
            if cmd.trim { "trim" } else { "raw" },
        ] {
            hasher.update(part.as_bytes());
            hasher.update([0x1f]);
        }
        Fingerprint(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone)]
struct CachedEntry {
    session_id: String,
    payload: ExtractResult,
    captured_at: Instant,
}

/// Guard representing the right to compute a fingerprint; see
/// [`ResultCache::lock_fingerprint`].
#[derive(Debug)]
pub struct ComputeGuard {
    _guard: OwnedMutexGuard<()>,
}

/// Process-wide fingerprint-keyed cache with TTL, LRU bound and
/// session-scoped invalidation.
pub struct ResultCache {
    entries: Mutex<LruCache<Fingerprint, CachedEntry>>,
    inflight: DashMap<Fingerprint, Arc<AsyncMutex<()>>>,
    ttl: Duration,
    hits: AtomicU64,
    misses: AtomicU64,
    invalidations: AtomicU64,
}

impl ResultCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity.max(1)).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
            inflight: DashMap::new(),
            ttl,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            invalidations: AtomicU64::new(0),
        }
    }

    /// Returns a fresh cached payload, marked as served from cache. Stale
    /// entries are dropped on the way out.
    pub fn lookup(&self, fingerprint: &Fingerprint) -> Option<ExtractResult> {
        enum Probe {
            Fresh(ExtractResult),
            Stale,
            Absent,
        }

        let mut entries = self.entries.lock();
        let probe = match entries.get(fingerprint) {
            Some(entry) if entry.captured_at.elapsed() <= self.ttl => {
                let mut payload = entry.payload.clone();
                payload.from_cache = true;
                Probe::Fresh(payload)
            }
            Some(_) => Probe::Stale,
            None => Probe::Absent,
        };
        match probe {
            Probe::Fresh(payload) => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                metrics::CACHE_HITS_TOTAL.inc();
                Some(payload)
            }
            Probe::Stale => {
                entries.pop(fingerprint);
                self.record_miss();
                None
            }
            Probe::Absent => {
                self.record_miss();
                None
            }
        }
    }

    /// Stores a freshly computed payload.
    pub fn insert(&self, fingerprint: Fingerprint, session_id: &str, payload: ExtractResult) {
        self.entries.lock().put(
            fingerprint,
            CachedEntry {
                session_id: session_id.to_string(),
                payload,
                captured_at: Instant::now(),
            },
        );
    }

    /// Acquires the singleflight lock for a fingerprint. Callers must
    /// re-check `lookup` after acquiring: the first flight may have already
    /// populated the entry.
    pub async fn lock_fingerprint(&self, fingerprint: &Fingerprint) -> ComputeGuard {
        let cell = self
            .inflight
            .entry(fingerprint.clone())
            .or_insert_with(|| Arc::new(AsyncMutex::new(())))
            .clone();
        let guard = cell.lock_owned().await;
        ComputeGuard { _guard: guard }
    }

    /// Drops every entry scoped to `session_id`. Called after any mutating
    /// command on that session (and when the session closes).
    pub fn invalidate_session(&self, session_id: &str) {
        let mut entries = self.entries.lock();
        let doomed: Vec<Fingerprint> = entries
            .iter()
            .filter(|(_, entry)| entry.session_id == session_id)
            .map(|(fp, _)| fp.clone())
            .collect();
        if doomed.is_empty() {
            return;
        }
        for fingerprint in &doomed {
            entries.pop(fingerprint);
        }
        self.invalidations
            .fetch_add(doomed.len() as u64, Ordering::Relaxed);
        for _ in &doomed {
            metrics::CACHE_INVALIDATIONS_TOTAL.inc();
        }
        debug!(
            session = %session_id,
            entries = doomed.len(),
            "invalidated cached results after mutation"
        );
    }

    /// Removes in-flight markers that nobody is waiting on. Run periodically
    /// so the singleflight map does not grow with dead fingerprints.
    pub fn sweep_inflight(&self) {
        self.inflight
            .retain(|_, cell| Arc::strong_count(cell) > 1 || cell.try_lock().is_err());
    }

    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn hit_count(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn miss_count(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn invalidation_count(&self) -> u64 {
        self.invalidations.load(Ordering::Relaxed)
    }

    fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        metrics::CACHE_MISSES_TOTAL.inc();
    }
}
