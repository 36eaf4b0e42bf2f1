use std::collections::HashMap;
use std::sync::RwLock;

use crate::error::ValueResult;

/// Document-oriented store holding `{_id: hash, value: text}` records,
/// with a primary and at least one read replica.
///
/// Replicas may lag the primary; readers that need completeness fall back
/// to the primary for hashes the replica has not seen yet.
pub trait DocumentStore: Send + Sync {
    /// Returns `true` if the primary holds the hash.
    fn exists(&self, hash: &str) -> ValueResult<bool>;

    /// Insert a record on the primary if absent. Idempotent.
    fn insert_if_absent(&self, hash: &str, value: &str) -> ValueResult<()>;

    /// Batch lookup. `replica` selects the read replica; missing hashes are
    /// simply absent from the result.
    fn get_many(&self, hashes: &[String], replica: bool) -> ValueResult<HashMap<String, String>>;
}

/// In-memory document store with an explicitly lagged replica, for tests
/// and embedding.
///
/// Writes land on the primary; the replica follows only when
/// [`MemoryDocumentStore::replicate`] runs (immediately, unless replication
/// is paused). Pausing replication lets tests exercise the replica-lag
/// fallback path.
pub struct MemoryDocumentStore {
    primary: RwLock<HashMap<String, String>>,
    replica: RwLock<HashMap<String, String>>,
    paused: RwLock<bool>,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self {
            primary: RwLock::new(HashMap::new()),
            replica: RwLock::new(HashMap::new()),
            paused: RwLock::new(false),
        }
    }

    /// Stop copying writes to the replica until [`Self::replicate`] is
    /// called, simulating replication lag.
    pub fn pause_replication(&self) {
        *self.paused.write().expect("lock poisoned") = true;
    }

    /// Copy all primary records to the replica and resume replication.
    pub fn replicate(&self) {
        let primary = self.primary.read().expect("lock poisoned");
        let mut replica = self.replica.write().expect("lock poisoned");
        for (hash, value) in primary.iter() {
            replica.entry(hash.clone()).or_insert_with(|| value.clone());
        }
        drop(replica);
        drop(primary);
        *self.paused.write().expect("lock poisoned") = false;
    }

    /// Number of records on the primary. Test helper.
    pub fn primary_len(&self) -> usize {
        self.primary.read().expect("lock poisoned").len()
    }

    /// Remove a record from the primary (and replica), simulating data loss.
    pub fn corrupt(&self, hash: &str) {
        self.primary.write().expect("lock poisoned").remove(hash);
        self.replica.write().expect("lock poisoned").remove(hash);
    }
}

impl Default for MemoryDocumentStore {
    fn default() -> Self {
        Self::new()
    }
}

impl DocumentStore for MemoryDocumentStore {
    fn exists(&self, hash: &str) -> ValueResult<bool> {
        Ok(self.primary.read().expect("lock poisoned").contains_key(hash))
    }

    fn insert_if_absent(&self, hash: &str, value: &str) -> ValueResult<()> {
        let mut primary = self.primary.write().expect("lock poisoned");
        primary.entry(hash.to_string()).or_insert_with(|| value.to_string());
        drop(primary);
        if !*self.paused.read().expect("lock poisoned") {
            self.replica
                .write()
                .expect("lock poisoned")
                .entry(hash.to_string())
                .or_insert_with(|| value.to_string());
        }
        Ok(())
    }

    fn get_many(&self, hashes: &[String], replica: bool) -> ValueResult<HashMap<String, String>> {
        let source = if replica { &self.replica } else { &self.primary };
        let map = source.read().expect("lock poisoned");
        Ok(hashes
            .iter()
            .filter_map(|hash| map.get(hash).map(|v| (hash.clone(), v.clone())))
            .collect())
    }
}
