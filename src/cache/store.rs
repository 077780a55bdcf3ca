//! Expiring key-value store holding encoded response snapshots.

use std::sync::{Arc, Weak};
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use tracing::debug;

/// Default lifetime of an entry stored with [`Duration::ZERO`] (5 minutes).
pub const DEFAULT_TTL: Duration = Duration::from_secs(5 * 60);

/// Default period of the background sweep (5 minutes).
pub const DEFAULT_SWEEP_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// A thread-safe map from string key to opaque payload, each entry with its own deadline.
///
/// Implementations own their locking; callers share one instance across all requests.
pub trait Store: Send + Sync {
    /// Returns the payload for `key` if present and not yet expired.
    fn get(&self, key: &str) -> Option<Bytes>;

    /// Inserts or replaces the entry for `key`, resetting its deadline to now + `ttl`.
    ///
    /// A `ttl` too large to add to the current instant keeps the entry until it
    /// is deleted or replaced.
    fn set(&self, key: &str, value: Bytes, ttl: Duration);

    /// Removes the entry for `key`, expired or not.
    fn delete(&self, key: &str);
}

/// Settings for [`MemoryStore`].
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
/// use rttp_cache::cache::StoreConfig;
///
/// let config = StoreConfig::new()
///     .default_ttl(Duration::from_secs(30))
///     .sweep_interval(Duration::from_secs(60));
/// ```
#[derive(Debug, Clone)]
pub struct StoreConfig {
    default_ttl: Duration,
    sweep_interval: Duration,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl StoreConfig {
    /// Five-minute default TTL, five-minute sweep.
    pub fn new() -> Self {
        Self {
            default_ttl: DEFAULT_TTL,
            sweep_interval: DEFAULT_SWEEP_INTERVAL,
        }
    }

    /// Lifetime applied when an entry is stored with a zero TTL.
    #[must_use]
    pub fn default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = ttl;
        self
    }

    /// How often the background task purges expired entries.
    /// `Duration::ZERO` disables the sweep; expired entries are then only dropped on access.
    #[must_use]
    pub fn sweep_interval(mut self, interval: Duration) -> Self {
        self.sweep_interval = interval;
        self
    }
}

struct Entry {
    value: Bytes,
    // `None` when the TTL reaches past what `Instant` can represent.
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.is_some_and(|deadline| now >= deadline)
    }
}

/// In-process [`Store`] backed by a sharded concurrent map.
///
/// Expiry is enforced on read; memory held by expired entries is reclaimed by
/// [`purge_expired`](Self::purge_expired), either called directly or from the
/// background sweep started by [`MemoryStore::start`].
pub struct MemoryStore {
    entries: DashMap<String, Entry>,
    default_ttl: Duration,
}

impl MemoryStore {
    /// Creates an empty store without a background sweep.
    pub fn new(config: &StoreConfig) -> Self {
        Self {
            entries: DashMap::new(),
            default_ttl: config.default_ttl,
        }
    }

    /// Creates a shared store and, when the config asks for it, spawns its sweep task.
    ///
    /// Must be called from within a Tokio runtime if the sweep is enabled. The task
    /// holds only a weak reference and ends once the last `Arc` is dropped.
    pub fn start(config: StoreConfig) -> Arc<Self> {
        let store = Arc::new(Self::new(&config));
        if !config.sweep_interval.is_zero() {
            spawn_sweeper(Arc::downgrade(&store), config.sweep_interval);
        }
        store
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn purge_expired(&self) -> usize {
        let now = Instant::now();
        let before = self.entries.len();
        self.entries.retain(|_, entry| !entry.is_expired(now));
        before.saturating_sub(self.entries.len())
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Store for MemoryStore {
    fn get(&self, key: &str) -> Option<Bytes> {
        let now = Instant::now();
        if let Some(entry) = self.entries.get(key) {
            if !entry.is_expired(now) {
                return Some(entry.value.clone());
            }
        }
        // The guard above is released before taking the shard's write lock.
        self.entries.remove_if(key, |_, entry| entry.is_expired(now));
        None
    }

    fn set(&self, key: &str, value: Bytes, ttl: Duration) {
        let ttl = if ttl.is_zero() { self.default_ttl } else { ttl };
        let entry = Entry {
            value,
            expires_at: Instant::now().checked_add(ttl),
        };
        self.entries.insert(key.to_owned(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.remove(key);
    }
}

fn spawn_sweeper(store: Weak<MemoryStore>, every: Duration) {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let Some(store) = store.upgrade() else {
                break;
            };
            let purged = store.purge_expired();
            if purged > 0 {
                debug!(purged, remaining = store.len(), "swept expired cache entries");
            }
        }
    });
}
