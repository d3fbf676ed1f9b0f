//! Signed URL caching using Moka.
//!
//! One cache is built per process and shared by `Arc` with everything that
//! resolves document URLs. Entries stop being handed out a safety margin
//! before the URL itself expires, so a caller never receives a URL that is
//! about to die.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::{DateTime, TimeDelta, Utc};
use moka::future::Cache;
use serde::Serialize;

use super::path::StoragePath;
use crate::storage::{BlobStore, StorageResult};
use assetdoc_shared::DocumentSettings;

/// Source of the current time for expiry checks.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    /// Start at `now`.
    #[must_use]
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(now),
        }
    }

    /// Move forward by `delta`.
    pub fn advance(&self, delta: TimeDelta) {
        let mut now = self.now.lock().unwrap_or_else(PoisonError::into_inner);
        *now += delta;
    }

    /// Jump to `instant`.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner) = instant;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A cached signed URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SignedAccessEntry {
    /// Capability URL.
    pub url: String,
    /// Instant after which the entry is no longer handed out.
    pub expires_at: DateTime<Utc>,
}

impl SignedAccessEntry {
    /// Valid iff `now < expires_at`.
    #[must_use]
    pub fn is_valid_at(&self, now: DateTime<Utc>) -> bool {
        now < self.expires_at
    }
}

/// Lifetime and sizing of the cache.
#[derive(Debug, Clone, Copy)]
pub struct CachePolicy {
    /// Lifetime requested for each issued URL.
    pub ttl: Duration,
    /// Subtracted from `ttl` to get the cached validity window.
    pub margin: Duration,
    /// Maximum number of entries.
    pub capacity: u64,
}

impl CachePolicy {
    /// Build from the `documents` section of the application config.
    #[must_use]
    pub fn from_settings(settings: &DocumentSettings) -> Self {
        Self {
            ttl: Duration::from_secs(settings.signed_url_ttl_secs),
            margin: Duration::from_secs(settings.cache_margin_secs),
            capacity: settings.cache_capacity,
        }
    }

    /// How long an entry is handed out after issuance.
    #[must_use]
    pub fn validity(&self) -> TimeDelta {
        TimeDelta::from_std(self.ttl.saturating_sub(self.margin)).unwrap_or(TimeDelta::zero())
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self::from_settings(&DocumentSettings::default())
    }
}

/// Process-wide map from storage path to a live signed URL.
///
/// Concurrent misses for the same path may both issue; the last insert wins
/// and both URLs are valid. An invalidation that lands while a URL is being
/// issued keeps that URL out of the cache.
pub struct SignedUrlCache {
    store: Arc<dyn BlobStore>,
    entries: Cache<String, SignedAccessEntry>,
    /// Bumped by every invalidation.
    generation: AtomicU64,
    policy: CachePolicy,
    clock: Arc<dyn Clock>,
}

impl SignedUrlCache {
    /// Create a cache using the wall clock.
    #[must_use]
    pub fn new(store: Arc<dyn BlobStore>, policy: CachePolicy) -> Self {
        Self::with_clock(store, policy, Arc::new(SystemClock))
    }

    /// Create a cache with an explicit clock.
    #[must_use]
    pub fn with_clock(
        store: Arc<dyn BlobStore>,
        policy: CachePolicy,
        clock: Arc<dyn Clock>,
    ) -> Self {
        // Moka's TTL is only a memory backstop; validity is checked against `clock`.
        let entries = Cache::builder()
            .max_capacity(policy.capacity)
            .time_to_live(policy.ttl)
            .build();

        Self {
            store,
            entries,
            generation: AtomicU64::new(0),
            policy,
            clock,
        }
    }

    /// Return a live URL for `path`, issuing a new one on a miss or when the
    /// cached entry has expired.
    ///
    /// # Errors
    ///
    /// Returns the store's error when issuance is denied. Nothing is cached
    /// in that case.
    pub async fn get(&self, path: &StoragePath) -> StorageResult<SignedAccessEntry> {
        let now = self.clock.now();

        if let Some(entry) = self.entries.get(path.as_str()).await {
            if entry.is_valid_at(now) {
                tracing::debug!(storage_path = %path, "Signed URL cache hit");
                return Ok(entry);
            }
            tracing::debug!(storage_path = %path, "Signed URL cache entry expired");
        }

        let generation = self.generation.load(Ordering::SeqCst);
        let url = self.store.issue_signed_url(path, self.policy.ttl).await?;
        let entry = SignedAccessEntry {
            url,
            expires_at: now + self.policy.validity(),
        };
        self.entries
            .insert(path.as_str().to_string(), entry.clone())
            .await;

        // An invalidation ran during issuance: the object may be gone, so the
        // URL is returned to this caller but not kept.
        if self.generation.load(Ordering::SeqCst) != generation {
            tracing::debug!(storage_path = %path, "Signed URL issued across an invalidation");
            self.entries.invalidate(path.as_str()).await;
        }

        Ok(entry)
    }

    /// Drop the entry for `path`, including one still being issued.
    pub async fn invalidate(&self, path: &StoragePath) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate(path.as_str()).await;
    }

    /// Drop every entry.
    pub fn invalidate_all(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        self.entries.invalidate_all();
    }

    /// Approximate number of entries.
    #[must_use]
    pub fn entry_count(&self) -> u64 {
        self.entries.entry_count()
    }

    /// Flush pending maintenance so `entry_count` is exact.
    pub async fn run_pending_tasks(&self) {
        self.entries.run_pending_tasks().await;
    }

    /// Active policy.
    #[must_use]
    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }
}

impl fmt::Debug for SignedUrlCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SignedUrlCache")
            .field("policy", &self.policy)
            .field("entries", &self.entries.entry_count())
            .finish_non_exhaustive()
    }
}
