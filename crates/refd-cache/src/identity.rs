use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, warn};

use refd_store::{ShardBackend, ShardLocator};
use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind};

use crate::distributed::DistributedCache;
use crate::error::{CacheError, CacheResult};

/// TTL of the distributed key→id map entries.
const ID_MAP_TTL: Duration = Duration::from_secs(1800);

/// The key⇄id identity cache for one object kind across all libraries.
///
/// On first access per library, the full `(key → id)` map is bulk-loaded,
/// from the distributed cache when present, otherwise from the library's
/// shard (then written through to the distributed cache). A process-local
/// shadow copy serves subsequent lookups.
///
/// Correctness rule: a lookup miss served from a distributed-cache-sourced
/// map is re-verified against the store **exactly once** before absence is
/// reported. A failed concurrent `set` can leave the distributed entry
/// stale, and a false "not found" would break key-stability guarantees
/// upstream. One reload, never a loop.
pub struct IdentityResolver {
    kind: ObjectKind,
    backend: Arc<dyn ShardBackend>,
    locator: ShardLocator,
    cache: Arc<dyn DistributedCache>,
    local: RwLock<HashMap<LibraryId, KeyMap>>,
}

struct KeyMap {
    ids: HashMap<ObjectKey, ObjectId>,
    /// Whether this map came from the distributed cache rather than a
    /// fresh store load. Governs the re-verify-once rule.
    from_distributed: bool,
}

impl IdentityResolver {
    pub fn new(
        kind: ObjectKind,
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
    ) -> Self {
        Self {
            kind,
            backend,
            locator,
            cache,
            local: RwLock::new(HashMap::new()),
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    /// Resolve a key to its internal id, or `None` if no such object exists.
    pub fn resolve(&self, library: LibraryId, key: ObjectKey) -> CacheResult<Option<ObjectId>> {
        self.ensure_loaded(library, false)?;

        let (hit, from_distributed) = {
            let local = self.local.read().expect("lock poisoned");
            let map = local.get(&library).expect("loaded above");
            (map.ids.get(&key).copied(), map.from_distributed)
        };

        if hit.is_some() {
            return Ok(hit);
        }

        // Missing, but sourced from the distributed cache: the entry may be
        // stale after a failed concurrent set. Reload from the store once.
        if from_distributed {
            debug!(kind = %self.kind, %library, %key, "identity miss on cached map, re-verifying from store");
            self.clear_library(library);
            self.ensure_loaded(library, true)?;
            let local = self.local.read().expect("lock poisoned");
            let map = local.get(&library).expect("loaded above");
            return Ok(map.ids.get(&key).copied());
        }

        Ok(None)
    }

    /// Returns `true` if an object with this key exists in the library.
    pub fn exists(&self, library: LibraryId, key: ObjectKey) -> CacheResult<bool> {
        Ok(self.resolve(library, key)?.is_some())
    }

    /// Register a freshly created `(library, key, id)` mapping.
    ///
    /// Must be called exactly once after every successful create, or
    /// key-based lookups won't see the new object until cache expiry.
    /// Registering a pair that already maps to a *different* id is a fatal
    /// consistency error.
    pub fn register_new_id(
        &self,
        library: LibraryId,
        key: ObjectKey,
        id: ObjectId,
    ) -> CacheResult<()> {
        // The first create in a fresh library populates the map below, so
        // only protest when the existing mapping disagrees.
        if let Some(existing) = self.resolve(library, key)? {
            if existing != id {
                return Err(CacheError::IdCollision {
                    kind: self.kind,
                    library,
                    key,
                    existing,
                    incoming: id,
                });
            }
        }

        let encoded = {
            let mut local = self.local.write().expect("lock poisoned");
            let map = local.entry(library).or_insert_with(|| KeyMap {
                ids: HashMap::new(),
                from_distributed: false,
            });
            map.ids.insert(key, id);
            encode_map(&map.ids)
        };
        self.cache
            .set(&self.kind.id_map_cache_key(library), encoded, Some(ID_MAP_TTL));
        Ok(())
    }

    /// Drop one library's map from both cache levels.
    pub fn clear_library(&self, library: LibraryId) {
        self.local.write().expect("lock poisoned").remove(&library);
        self.cache.delete(&self.kind.id_map_cache_key(library));
    }

    /// Remove a single key after a delete and write the shrunk map through.
    pub fn remove(&self, library: LibraryId, key: ObjectKey) {
        let mut local = self.local.write().expect("lock poisoned");
        if let Some(map) = local.get_mut(&library) {
            map.ids.remove(&key);
            self.cache.set(
                &self.kind.id_map_cache_key(library),
                encode_map(&map.ids),
                Some(ID_MAP_TTL),
            );
        }
    }

    /// Populate the local map for a library if not already present.
    ///
    /// `skip_distributed` forces a store load, used by the re-verify path.
    fn ensure_loaded(&self, library: LibraryId, skip_distributed: bool) -> CacheResult<()> {
        {
            let local = self.local.read().expect("lock poisoned");
            if local.contains_key(&library) {
                return Ok(());
            }
        }

        let cache_key = self.kind.id_map_cache_key(library);

        if !skip_distributed {
            if let Some(bytes) = self.cache.get(&cache_key) {
                match decode_map(&bytes) {
                    Ok(ids) => {
                        let mut local = self.local.write().expect("lock poisoned");
                        local.entry(library).or_insert(KeyMap { ids, from_distributed: true });
                        return Ok(());
                    }
                    Err(err) => {
                        warn!(kind = %self.kind, %library, %err, "undecodable id map in distributed cache, reloading from store");
                        self.cache.delete(&cache_key);
                    }
                }
            }
        }

        let shard = self.locator.shard_for(library);
        let pairs = self.backend.load_key_map(shard, self.kind, library)?;
        let ids: HashMap<ObjectKey, ObjectId> = pairs.into_iter().collect();
        self.cache.set(&cache_key, encode_map(&ids), Some(ID_MAP_TTL));

        let mut local = self.local.write().expect("lock poisoned");
        // Concurrent loads race benignly: both write equivalent fresh maps.
        local.insert(library, KeyMap { ids, from_distributed: false });
        Ok(())
    }
}

fn encode_map(ids: &HashMap<ObjectKey, ObjectId>) -> Vec<u8> {
    let pairs: Vec<(String, i64)> = ids
        .iter()
        .map(|(key, id)| (key.as_str().to_string(), id.get()))
        .collect();
    bincode::serialize(&pairs).expect("key map serializes")
}

fn decode_map(bytes: &[u8]) -> CacheResult<HashMap<ObjectKey, ObjectId>> {
    let pairs: Vec<(String, i64)> =
        bincode::deserialize(bytes).map_err(|e| CacheError::Codec(e.to_string()))?;
    let mut ids = HashMap::with_capacity(pairs.len());
    for (key, id) in pairs {
        let key = ObjectKey::parse(&key).map_err(|e| CacheError::Codec(e.to_string()))?;
        let id = ObjectId::new(id).map_err(|e| CacheError::Codec(e.to_string()))?;
        ids.insert(key, id);
    }
    Ok(ids)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::distributed::MemoryCache;
    use refd_store::{InMemoryBackend, PrimaryRow, ShardId, StoredRecord, WriteBatch, WriteOp};
    use refd_types::{ObjectVersion, ServerTimestamp};

    const SHARD: ShardId = ShardId(1);

    fn library(id: i64) -> LibraryId {
        LibraryId::new(id).unwrap()
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    fn store_row(backend: &InMemoryBackend, lib: LibraryId, k: ObjectKey) -> ObjectId {
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Item,
            row: PrimaryRow {
                id,
                library: lib,
                key: k,
                version: ObjectVersion(1),
                date_added: ServerTimestamp::zero(),
                date_modified: ServerTimestamp::zero(),
                server_date_modified: ServerTimestamp::now(),
            },
            payload: Vec::new(),
        }));
        backend.apply(&batch).unwrap();
        id
    }

    fn resolver(backend: Arc<InMemoryBackend>, cache: Arc<MemoryCache>) -> IdentityResolver {
        IdentityResolver::new(
            ObjectKind::Item,
            backend,
            ShardLocator::single(SHARD),
            cache,
        )
    }

    #[test]
    fn resolves_stored_objects() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend, cache);
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), Some(id));
        assert_eq!(resolver.resolve(lib, key("ZZZZ9999")).unwrap(), None);
    }

    #[test]
    fn registered_ids_survive_cache_eviction() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend.clone(), cache.clone());
        resolver.register_new_id(lib, key("AAAA1111"), id).unwrap();

        // Evict both levels; the mapping must be re-derivable from storage.
        resolver.clear_library(lib);
        cache.delete(&ObjectKind::Item.id_map_cache_key(lib));
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), Some(id));
    }

    #[test]
    fn stale_distributed_map_is_reverified_once() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);

        // Seed the distributed cache with an empty (stale) map, then write
        // the row to storage behind the cache's back.
        cache.set(
            &ObjectKind::Item.id_map_cache_key(lib),
            encode_map(&HashMap::new()),
            None,
        );
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend, cache);
        // The stale cached map says "absent"; the re-verify pass must find it.
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), Some(id));
    }

    #[test]
    fn reverify_happens_only_once_for_true_absence() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        cache.set(
            &ObjectKind::Item.id_map_cache_key(lib),
            encode_map(&HashMap::new()),
            None,
        );

        let resolver = resolver(backend, cache);
        // Truly absent: one reload, then a clean None (no infinite retry).
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), None);
        // After the reload the map is store-sourced; further lookups are
        // plain misses.
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), None);
    }

    #[test]
    fn register_same_id_twice_is_idempotent() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend, cache);
        resolver.register_new_id(lib, key("AAAA1111"), id).unwrap();
        resolver.register_new_id(lib, key("AAAA1111"), id).unwrap();
    }

    #[test]
    fn register_conflicting_id_is_fatal() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend.clone(), cache);
        resolver.register_new_id(lib, key("AAAA1111"), id).unwrap();

        let other = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let err = resolver.register_new_id(lib, key("AAAA1111"), other).unwrap_err();
        assert!(matches!(err, CacheError::IdCollision { .. }));
    }

    #[test]
    fn remove_drops_key_from_both_levels() {
        let backend = Arc::new(InMemoryBackend::new());
        let cache = Arc::new(MemoryCache::new());
        let lib = library(1);
        let id = store_row(&backend, lib, key("AAAA1111"));

        let resolver = resolver(backend, cache);
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), Some(id));
        resolver.remove(lib, key("AAAA1111"));

        // The store-sourced local map no longer has the key, so the miss is
        // final (no re-verify). The object layer deletes the storage row
        // before calling remove(), keeping both views consistent.
        assert_eq!(resolver.resolve(lib, key("AAAA1111")).unwrap(), None);
    }
}
