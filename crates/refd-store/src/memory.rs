use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::RwLock;

use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind, ServerTimestamp};

use crate::error::{StoreError, StoreResult};
use crate::ops::{WriteBatch, WriteOp};
use crate::row::{ChangeCursor, PrimaryRow, StoredRecord, Tombstone};
use crate::shard::ShardId;
use crate::traits::ShardBackend;

/// In-memory, HashMap-based shard backend.
///
/// Intended for tests and embedding. Each shard's state lives behind one
/// `RwLock`, so write batches are naturally atomic: the whole batch is
/// validated, then applied, under a single write guard.
///
/// Shards can be marked unavailable to exercise fan-out failure paths.
pub struct InMemoryBackend {
    shards: RwLock<HashMap<ShardId, ShardState>>,
    unavailable: RwLock<HashSet<ShardId>>,
}

#[derive(Default)]
struct ShardState {
    sequences: HashMap<ObjectKind, i64>,
    /// Rows keyed by `(kind, library, key)`, the unique index.
    records: BTreeMap<(ObjectKind, LibraryId, ObjectKey), StoredRecord>,
    /// Primary-key index: id → row location.
    by_id: HashMap<(ObjectKind, ObjectId), (LibraryId, ObjectKey)>,
    tombstones: HashMap<(ObjectKind, LibraryId, ObjectKey), Tombstone>,
}

impl InMemoryBackend {
    /// Create a new empty backend.
    pub fn new() -> Self {
        Self {
            shards: RwLock::new(HashMap::new()),
            unavailable: RwLock::new(HashSet::new()),
        }
    }

    /// Simulate a shard outage. Subsequent operations on the shard fail
    /// with [`StoreError::ShardUnavailable`] until restored.
    pub fn set_unavailable(&self, shard: ShardId, down: bool) {
        let mut set = self.unavailable.write().expect("lock poisoned");
        if down {
            set.insert(shard);
        } else {
            set.remove(&shard);
        }
    }

    /// Number of rows of a kind across all shards. Test helper.
    pub fn row_count(&self, kind: ObjectKind) -> usize {
        let shards = self.shards.read().expect("lock poisoned");
        shards
            .values()
            .map(|s| s.records.keys().filter(|(k, _, _)| *k == kind).count())
            .sum()
    }

    fn check_available(&self, shard: ShardId) -> StoreResult<()> {
        if self.unavailable.read().expect("lock poisoned").contains(&shard) {
            return Err(StoreError::ShardUnavailable(shard));
        }
        Ok(())
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl ShardState {
    fn validate(&self, op: &WriteOp) -> StoreResult<()> {
        if let WriteOp::Upsert(record) = op {
            let at = (record.kind, record.row.library, record.row.key);
            if let Some(existing) = self.records.get(&at) {
                if existing.row.id != record.row.id {
                    return Err(StoreError::IdCollision {
                        kind: record.kind,
                        library: record.row.library,
                        key: record.row.key,
                        existing: existing.row.id,
                        incoming: record.row.id,
                    });
                }
            }
        }
        Ok(())
    }

    fn apply(&mut self, op: &WriteOp) {
        match op {
            WriteOp::Upsert(record) => {
                let at = (record.kind, record.row.library, record.row.key);
                self.by_id
                    .insert((record.kind, record.row.id), (record.row.library, record.row.key));
                self.records.insert(at, record.clone());
            }
            WriteOp::Delete { kind, library, key } => {
                if let Some(removed) = self.records.remove(&(*kind, *library, *key)) {
                    self.by_id.remove(&(*kind, removed.row.id));
                }
            }
            WriteOp::UpsertTombstone(tombstone) => {
                // Refresh the timestamp if a tombstone for the key exists.
                self.tombstones
                    .insert((tombstone.kind, tombstone.library, tombstone.key), tombstone.clone());
            }
        }
    }
}

impl ShardBackend for InMemoryBackend {
    fn allocate_id(&self, shard: ShardId, kind: ObjectKind) -> StoreResult<ObjectId> {
        self.check_available(shard)?;
        let mut shards = self.shards.write().expect("lock poisoned");
        let state = shards.entry(shard).or_default();
        let next = state.sequences.entry(kind).or_insert(0);
        *next += 1;
        ObjectId::new(*next).map_err(|e| StoreError::Backend(e.to_string()))
    }

    fn load_primary_rows(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        library: LibraryId,
    ) -> StoreResult<Vec<PrimaryRow>> {
        self.check_available(shard)?;
        let shards = self.shards.read().expect("lock poisoned");
        let Some(state) = shards.get(&shard) else {
            return Ok(Vec::new());
        };
        Ok(state
            .records
            .range((kind, library, ObjectKey::parse("00000000").expect("valid key"))..)
            .take_while(|((k, l, _), _)| *k == kind && *l == library)
            .map(|(_, record)| record.row.clone())
            .collect())
    }

    fn load_records(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        library: LibraryId,
        ids: &[ObjectId],
    ) -> StoreResult<Vec<StoredRecord>> {
        self.check_available(shard)?;
        let shards = self.shards.read().expect("lock poisoned");
        let Some(state) = shards.get(&shard) else {
            return Ok(Vec::new());
        };
        let mut loaded = Vec::with_capacity(ids.len());
        for id in ids {
            let Some((lib, key)) = state.by_id.get(&(kind, *id)) else {
                continue;
            };
            if *lib != library {
                continue;
            }
            if let Some(record) = state.records.get(&(kind, *lib, *key)) {
                loaded.push(record.clone());
            }
        }
        Ok(loaded)
    }

    fn apply(&self, batch: &WriteBatch) -> StoreResult<()> {
        self.check_available(batch.shard)?;
        let mut shards = self.shards.write().expect("lock poisoned");
        let state = shards.entry(batch.shard).or_default();

        // Validate everything before touching state, so a failed batch
        // leaves the shard exactly as it was.
        for op in &batch.ops {
            state.validate(op)?;
        }
        for op in &batch.ops {
            state.apply(op);
        }
        Ok(())
    }

    fn changed_since(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        libraries: &[LibraryId],
        cursor: ChangeCursor,
    ) -> StoreResult<Vec<(LibraryId, ObjectId)>> {
        self.check_available(shard)?;
        let shards = self.shards.read().expect("lock poisoned");
        let Some(state) = shards.get(&shard) else {
            return Ok(Vec::new());
        };
        let wanted: HashSet<LibraryId> = libraries.iter().copied().collect();
        Ok(state
            .records
            .iter()
            .filter(|((k, library, _), record)| {
                *k == kind && wanted.contains(library) && cursor.matches(&record.row)
            })
            .map(|((_, library, _), record)| (*library, record.row.id))
            .collect())
    }

    fn tombstones_since(
        &self,
        shard: ShardId,
        library: LibraryId,
        since: ServerTimestamp,
    ) -> StoreResult<Vec<Tombstone>> {
        self.check_available(shard)?;
        let shards = self.shards.read().expect("lock poisoned");
        let Some(state) = shards.get(&shard) else {
            return Ok(Vec::new());
        };
        Ok(state
            .tombstones
            .values()
            .filter(|t| t.library == library && t.timestamp > since)
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refd_types::ObjectVersion;

    const SHARD: ShardId = ShardId(1);

    fn library(id: i64) -> LibraryId {
        LibraryId::new(id).unwrap()
    }

    fn key(s: &str) -> ObjectKey {
        ObjectKey::parse(s).unwrap()
    }

    fn record(kind: ObjectKind, lib: LibraryId, k: &str, id: ObjectId, version: u16) -> StoredRecord {
        StoredRecord {
            kind,
            row: PrimaryRow {
                id,
                library: lib,
                key: key(k),
                version: ObjectVersion(version),
                date_added: ServerTimestamp::zero(),
                date_modified: ServerTimestamp::zero(),
                server_date_modified: ServerTimestamp::new(100, 0),
            },
            payload: Vec::new(),
        }
    }

    fn upsert(backend: &InMemoryBackend, record: StoredRecord) {
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Upsert(record));
        backend.apply(&batch).unwrap();
    }

    #[test]
    fn allocated_ids_are_monotonic_and_never_reused() {
        let backend = InMemoryBackend::new();
        let first = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let second = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        assert!(second > first);

        // Deleting rows does not recycle the sequence.
        let lib = library(1);
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", first, 1));
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Delete { kind: ObjectKind::Item, library: lib, key: key("AAAA1111") });
        backend.apply(&batch).unwrap();
        let third = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        assert!(third > second);
    }

    #[test]
    fn upsert_then_load_roundtrip() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", id, 1));

        let rows = backend.load_primary_rows(SHARD, ObjectKind::Item, lib).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].key, key("AAAA1111"));

        let loaded = backend.load_records(SHARD, ObjectKind::Item, lib, &[id]).unwrap();
        assert_eq!(loaded.len(), 1);
        assert_eq!(loaded[0].row.id, id);
    }

    #[test]
    fn id_change_on_existing_key_is_rejected() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", id, 1));

        let other = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Upsert(record(ObjectKind::Item, lib, "AAAA1111", other, 2)));
        let err = backend.apply(&batch).unwrap_err();
        assert!(matches!(err, StoreError::IdCollision { .. }));
    }

    #[test]
    fn failed_batch_leaves_state_untouched() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", id, 1));

        // A batch with one valid and one invalid op must apply neither.
        let good_id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let bad_id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::Upsert(record(ObjectKind::Item, lib, "BBBB2222", good_id, 1)));
        batch.push(WriteOp::Upsert(record(ObjectKind::Item, lib, "AAAA1111", bad_id, 2)));
        assert!(backend.apply(&batch).is_err());

        let rows = backend.load_primary_rows(SHARD, ObjectKind::Item, lib).unwrap();
        assert_eq!(rows.len(), 1, "partial batch must not land");
    }

    #[test]
    fn load_records_drops_vanished_ids() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let ghost = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", id, 1));

        let loaded = backend.load_records(SHARD, ObjectKind::Item, lib, &[id, ghost]).unwrap();
        assert_eq!(loaded.len(), 1);
    }

    #[test]
    fn changed_since_filters_by_cursor() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let a = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        let b = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, lib, "AAAA1111", a, 3));
        upsert(&backend, record(ObjectKind::Item, lib, "BBBB2222", b, 7));

        let changed = backend
            .changed_since(SHARD, ObjectKind::Item, &[lib], ChangeCursor::Version(ObjectVersion(3)))
            .unwrap();
        assert_eq!(changed, vec![(lib, b)]);
    }

    #[test]
    fn tombstone_upsert_refreshes_timestamp() {
        let backend = InMemoryBackend::new();
        let lib = library(1);
        let tombstone = |unix| Tombstone {
            library: lib,
            kind: ObjectKind::Item,
            key: key("AAAA1111"),
            timestamp: ServerTimestamp::new(unix, 0),
        };
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::UpsertTombstone(tombstone(100)));
        backend.apply(&batch).unwrap();
        let mut batch = WriteBatch::new(SHARD);
        batch.push(WriteOp::UpsertTombstone(tombstone(200)));
        backend.apply(&batch).unwrap();

        let all = backend.tombstones_since(SHARD, lib, ServerTimestamp::zero()).unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].timestamp.unix, 200);
    }

    #[test]
    fn unavailable_shard_fails_loudly() {
        let backend = InMemoryBackend::new();
        backend.set_unavailable(SHARD, true);
        let err = backend.load_primary_rows(SHARD, ObjectKind::Item, library(1)).unwrap_err();
        assert!(matches!(err, StoreError::ShardUnavailable(_)));

        backend.set_unavailable(SHARD, false);
        assert!(backend.load_primary_rows(SHARD, ObjectKind::Item, library(1)).is_ok());
    }

    #[test]
    fn libraries_are_isolated() {
        let backend = InMemoryBackend::new();
        let a = library(1);
        let b = library(2);
        let id = backend.allocate_id(SHARD, ObjectKind::Item).unwrap();
        upsert(&backend, record(ObjectKind::Item, a, "AAAA1111", id, 1));

        assert!(backend.load_primary_rows(SHARD, ObjectKind::Item, b).unwrap().is_empty());
        assert!(backend.load_records(SHARD, ObjectKind::Item, b, &[id]).unwrap().is_empty());
    }
}
