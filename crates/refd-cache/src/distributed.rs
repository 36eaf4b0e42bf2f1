use std::collections::HashMap;
use std::sync::RwLock;
use std::time::{Duration, Instant};

/// A shared key→value cache with per-entry TTL.
///
/// Modeled on a memcached-style service: no durability, no ordering, and no
/// failure reporting: a `set` that never lands simply leaves the old entry
/// (or nothing) behind. Every consumer must treat entries as possibly stale.
pub trait DistributedCache: Send + Sync {
    /// Look up an entry. `None` on miss or expiry.
    fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Store an entry, replacing any existing one. `ttl` of `None` means
    /// no expiry.
    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>);

    /// Remove an entry. A no-op if absent.
    fn delete(&self, key: &str);
}

/// In-memory, HashMap-based distributed cache for tests and embedding.
///
/// Expiry is checked lazily on `get`.
pub struct MemoryCache {
    entries: RwLock<HashMap<String, Entry>>,
}

struct Entry {
    value: Vec<u8>,
    expires_at: Option<Instant>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self { entries: RwLock::new(HashMap::new()) }
    }

    /// Number of live entries. Test helper; expired entries still count
    /// until touched.
    pub fn len(&self) -> usize {
        self.entries.read().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().expect("lock poisoned").is_empty()
    }

    /// Force an entry to be expired, simulating TTL passage without waiting.
    pub fn expire_now(&self, key: &str) {
        let mut entries = self.entries.write().expect("lock poisoned");
        if let Some(entry) = entries.get_mut(key) {
            entry.expires_at = Some(Instant::now() - Duration::from_secs(1));
        }
    }
}

impl Default for MemoryCache {
    fn default() -> Self {
        Self::new()
    }
}

impl DistributedCache for MemoryCache {
    fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entries = self.entries.read().expect("lock poisoned");
        let entry = entries.get(key)?;
        if let Some(expires_at) = entry.expires_at {
            if Instant::now() >= expires_at {
                return None;
            }
        }
        Some(entry.value.clone())
    }

    fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) {
        let entry = Entry {
            value,
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        };
        self.entries.write().expect("lock poisoned").insert(key.to_string(), entry);
    }

    fn delete(&self, key: &str) {
        self.entries.write().expect("lock poisoned").remove(key);
    }
}
