use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use refd_store::{PrimaryRow, ShardBackend, ShardLocator};
use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind};

use crate::error::CacheResult;

/// Per-library snapshots of the lightweight primary columns of one kind.
///
/// Each snapshot holds two indices, by id and by key, that alias the same
/// [`PrimaryRow`] allocation, so a row visible through one index is always
/// the identical record seen through the other.
///
/// Population is lazy (full per-library load on first access). Deletes evict
/// the single entry from both indices; updates drop the whole snapshot and
/// let the next access reload it. The full reload on update is a known cost,
/// kept because it makes the two indices trivially consistent.
pub struct PrimaryDataCache {
    kind: ObjectKind,
    backend: Arc<dyn ShardBackend>,
    locator: ShardLocator,
    local: RwLock<HashMap<LibraryId, Snapshot>>,
}

#[derive(Default)]
struct Snapshot {
    by_id: HashMap<ObjectId, Arc<PrimaryRow>>,
    by_key: HashMap<ObjectKey, Arc<PrimaryRow>>,
}

impl Snapshot {
    fn insert(&mut self, row: PrimaryRow) {
        let row = Arc::new(row);
        self.by_id.insert(row.id, Arc::clone(&row));
        self.by_key.insert(row.key, row);
    }

    fn remove_key(&mut self, key: ObjectKey) {
        if let Some(row) = self.by_key.remove(&key) {
            self.by_id.remove(&row.id);
        }
    }
}

impl PrimaryDataCache {
    pub fn new(
        kind: ObjectKind,
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
    ) -> Self {
        Self {
            kind,
            backend,
            locator,
            local: RwLock::new(HashMap::new()),
        }
    }

    /// Primary data for an object by id, or `None` if no such row.
    pub fn get_by_id(&self, library: LibraryId, id: ObjectId) -> CacheResult<Option<Arc<PrimaryRow>>> {
        self.ensure_loaded(library)?;
        let local = self.local.read().expect("lock poisoned");
        Ok(local.get(&library).and_then(|s| s.by_id.get(&id)).cloned())
    }

    /// Primary data for an object by key, or `None` if no such row.
    pub fn get_by_key(
        &self,
        library: LibraryId,
        key: ObjectKey,
    ) -> CacheResult<Option<Arc<PrimaryRow>>> {
        self.ensure_loaded(library)?;
        let local = self.local.read().expect("lock poisoned");
        Ok(local.get(&library).and_then(|s| s.by_key.get(&key)).cloned())
    }

    /// Insert or replace one row in an already-loaded snapshot.
    ///
    /// Used after a create so the new object is visible without a full
    /// reload. A no-op when the library isn't cached yet.
    pub fn cache_row(&self, row: PrimaryRow) {
        let mut local = self.local.write().expect("lock poisoned");
        if let Some(snapshot) = local.get_mut(&row.library) {
            snapshot.remove_key(row.key);
            snapshot.insert(row);
        }
    }

    /// Evict one object from both indices after a delete.
    pub fn evict(&self, library: LibraryId, key: ObjectKey) {
        let mut local = self.local.write().expect("lock poisoned");
        if let Some(snapshot) = local.get_mut(&library) {
            snapshot.remove_key(key);
        }
    }

    /// Drop a library's snapshot; the next access reloads it in full.
    pub fn invalidate_library(&self, library: LibraryId) {
        self.local.write().expect("lock poisoned").remove(&library);
    }

    fn ensure_loaded(&self, library: LibraryId) -> CacheResult<()> {
        {
            let local = self.local.read().expect("lock poisoned");
            if local.contains_key(&library) {
                return Ok(());
            }
        }
        let shard = self.locator.shard_for(library);
        let rows = self.backend.load_primary_rows(shard, self.kind, library)?;
        let mut snapshot = Snapshot::default();
        for row in rows {
            snapshot.insert(row);
        }
        let mut local = self.local.write().expect("lock poisoned");
        local.insert(library, snapshot);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refd_store::{InMemoryBackend, ShardId, StoredRecord, WriteBatch, WriteOp};
    use refd_types::{ObjectVersion, ServerTimestamp};

    const SHARD: ShardId = ShardId(1);

    fn library(id: i64) -> LibraryId {
        LibraryId::new(id).unwrap()
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    fn store_row(backend: &InMemoryBackend, lib: LibraryId, k: ObjectKey, version: u16) -> ObjectId {
        let id = backend.allocate_id(SHARD, ObjectKind::Collection).unwrap();
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Collection,
            row: PrimaryRow {
                id,
                library: lib,
                key: k,
                version: ObjectVersion(version),
                date_added: ServerTimestamp::zero(),
                date_modified: ServerTimestamp::zero(),
                server_date_modified: ServerTimestamp::now(),
            },
            payload: Vec::new(),
        }));
        backend.apply(&batch).unwrap();
        id
    }

    fn cache(backend: Arc<InMemoryBackend>) -> PrimaryDataCache {
        PrimaryDataCache::new(ObjectKind::Collection, backend, ShardLocator::single(SHARD))
    }

    #[test]
    fn lazy_load_and_lookup_by_both_indices() {
        let backend = Arc::new(InMemoryBackend::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"), 1);

        let cache = cache(backend);
        let by_id = cache.get_by_id(lib, id).unwrap().unwrap();
        let by_key = cache.get_by_key(lib, key("AAAA1111")).unwrap().unwrap();
        assert_eq!(by_id.key, key("AAAA1111"));
        assert_eq!(by_key.id, id);
    }

    #[test]
    fn indices_alias_the_same_record() {
        let backend = Arc::new(InMemoryBackend::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"), 1);

        let cache = cache(backend);
        let by_id = cache.get_by_id(lib, id).unwrap().unwrap();
        let by_key = cache.get_by_key(lib, key("AAAA1111")).unwrap().unwrap();
        assert!(Arc::ptr_eq(&by_id, &by_key), "both indices must point at one record");
    }

    #[test]
    fn evict_removes_from_both_indices() {
        let backend = Arc::new(InMemoryBackend::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"), 1);

        let cache = cache(backend);
        cache.get_by_id(lib, id).unwrap();
        cache.evict(lib, key("AAAA1111"));
        assert!(cache.get_by_id(lib, id).unwrap().is_none());
        assert!(cache.get_by_key(lib, key("AAAA1111")).unwrap().is_none());
    }

    #[test]
    fn cache_row_updates_loaded_snapshot() {
        let backend = Arc::new(InMemoryBackend::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"), 1);

        let cache = cache(backend);
        let loaded = cache.get_by_id(lib, id).unwrap().unwrap();
        let mut updated = (*loaded).clone();
        updated.version = ObjectVersion(2);
        cache.cache_row(updated);

        let by_key = cache.get_by_key(lib, key("AAAA1111")).unwrap().unwrap();
        assert_eq!(by_key.version, ObjectVersion(2));
        let by_id = cache.get_by_id(lib, id).unwrap().unwrap();
        assert!(Arc::ptr_eq(&by_id, &by_key));
    }

    #[test]
    fn invalidate_library_forces_reload() {
        let backend = Arc::new(InMemoryBackend::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"), 1);

        let cache = cache(backend.clone());
        cache.get_by_id(lib, id).unwrap();

        // A second row written after the snapshot is invisible until
        // invalidation.
        let other = store_row(&backend, lib, key("BBBB2222"), 1);
        assert!(cache.get_by_id(lib, other).unwrap().is_none());
        cache.invalidate_library(lib);
        assert!(cache.get_by_id(lib, other).unwrap().is_some());
    }

    #[test]
    fn missing_row_is_none_not_error() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = cache(backend);
        let lib = library(1);
        assert!(cache.get_by_key(lib, key("ZZZZ9999")).unwrap().is_none());
    }
}
