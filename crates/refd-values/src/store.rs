use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use refd_cache::DistributedCache;
use tracing::{debug, warn};

use crate::document::DocumentStore;
use crate::error::{ValueError, ValueResult};

/// Maximum stored value length, in characters.
pub const MAX_VALUE_LEN: usize = 65_535;

const VALUE_CACHE_TTL: Duration = Duration::from_secs(1800);

fn value_cache_key(hash: &str) -> String {
    format!("itemDataValue_{hash}")
}

/// Content hash of a value: hex-encoded blake3 of the UTF-8 bytes.
pub fn value_hash(value: &str) -> String {
    hex::encode(blake3::hash(value.as_bytes()).as_bytes())
}

/// Content-addressed value store.
///
/// Values are keyed by their content hash, so `put` is idempotent and a
/// value shared across many fields is stored once. Reads walk local map,
/// distributed cache, document replica, then document primary; `get_many`
/// must account for every requested hash or the read is treated as a
/// consistency failure.
pub struct ValueStore {
    cache: Arc<dyn DistributedCache>,
    docs: Arc<dyn DocumentStore>,
    local: RwLock<HashMap<String, String>>,
}

impl ValueStore {
    pub fn new(cache: Arc<dyn DistributedCache>, docs: Arc<dyn DocumentStore>) -> Self {
        Self {
            cache,
            docs,
            local: RwLock::new(HashMap::new()),
        }
    }

    /// Store a value, returning its content hash.
    ///
    /// Writes through local map and distributed cache before inserting on
    /// the document primary; a repeat put of the same content hits the
    /// local map or the distributed cache and performs no durable write.
    pub fn put(&self, value: &str) -> ValueResult<String> {
        let len = value.chars().count();
        if len > MAX_VALUE_LEN {
            return Err(ValueError::TooLong {
                len,
                max: MAX_VALUE_LEN,
            });
        }
        let hash = value_hash(value);
        if self.local.read().expect("lock poisoned").contains_key(&hash) {
            return Ok(hash);
        }
        let cache_key = value_cache_key(&hash);
        // A warm distributed entry means some process already stored this
        // value; skip the durable round-trip.
        if self.cache.get(&cache_key).is_some() {
            self.local
                .write()
                .expect("lock poisoned")
                .insert(hash.clone(), value.to_string());
            return Ok(hash);
        }
        self.docs.insert_if_absent(&hash, value)?;
        self.cache
            .set(&cache_key, value.as_bytes().to_vec(), Some(VALUE_CACHE_TTL));
        self.local
            .write()
            .expect("lock poisoned")
            .insert(hash.clone(), value.to_string());
        Ok(hash)
    }

    /// Store several values, returning their hashes in input order.
    pub fn put_many(&self, values: &[&str]) -> ValueResult<Vec<String>> {
        values.iter().map(|v| self.put(v)).collect()
    }

    /// Fetch a single value by hash, or `None` if no store layer has it.
    pub fn get(&self, hash: &str) -> ValueResult<Option<String>> {
        let mut found = self.get_many_lenient(std::slice::from_ref(&hash.to_string()))?;
        Ok(found.remove(hash))
    }

    /// Fetch values for all given hashes.
    ///
    /// Duplicate hashes are resolved once. Every distinct hash must resolve;
    /// a shortfall after falling back to the document primary is a fatal
    /// [`ValueError::CountMismatch`], since callers hold these hashes only
    /// because the values were stored.
    pub fn get_many(&self, hashes: &[String]) -> ValueResult<HashMap<String, String>> {
        let distinct: HashSet<&String> = hashes.iter().collect();
        let expected = distinct.len();
        let found = self.get_many_lenient(hashes)?;
        if found.len() != expected {
            return Err(ValueError::CountMismatch {
                found: found.len(),
                expected,
            });
        }
        Ok(found)
    }

    fn get_many_lenient(&self, hashes: &[String]) -> ValueResult<HashMap<String, String>> {
        let mut found = HashMap::new();
        let mut missing: Vec<String> = Vec::new();
        {
            let local = self.local.read().expect("lock poisoned");
            for hash in hashes {
                if found.contains_key(hash) {
                    continue;
                }
                match local.get(hash) {
                    Some(value) => {
                        found.insert(hash.clone(), value.clone());
                    }
                    None => {
                        if !missing.contains(hash) {
                            missing.push(hash.clone());
                        }
                    }
                }
            }
        }
        if missing.is_empty() {
            return Ok(found);
        }

        missing.retain(|hash| match self.cache.get(&value_cache_key(hash)) {
            Some(bytes) => match String::from_utf8(bytes) {
                Ok(value) => {
                    found.insert(hash.clone(), value);
                    false
                }
                Err(_) => {
                    warn!(%hash, "discarding non-UTF-8 cached value");
                    self.cache.delete(&value_cache_key(hash));
                    true
                }
            },
            None => true,
        });
        if missing.is_empty() {
            self.remember(&found);
            return Ok(found);
        }

        debug!(count = missing.len(), "fetching values from document store");
        let from_replica = self.docs.get_many(&missing, true)?;
        missing.retain(|hash| match from_replica.get(hash) {
            Some(value) => {
                found.insert(hash.clone(), value.clone());
                false
            }
            None => true,
        });
        if !missing.is_empty() {
            // Replica may lag recent writes. Retry the stragglers on the
            // primary before concluding they are gone.
            warn!(
                count = missing.len(),
                "values missing on replica, retrying on primary"
            );
            let from_primary = self.docs.get_many(&missing, false)?;
            for (hash, value) in from_primary {
                found.insert(hash, value);
            }
        }
        self.remember(&found);
        Ok(found)
    }

    fn remember(&self, found: &HashMap<String, String>) {
        let mut local = self.local.write().expect("lock poisoned");
        for (hash, value) in found {
            if !local.contains_key(hash) {
                self.cache.set(
                    &value_cache_key(hash),
                    value.as_bytes().to_vec(),
                    Some(VALUE_CACHE_TTL),
                );
                local.insert(hash.clone(), value.clone());
            }
        }
    }
}
