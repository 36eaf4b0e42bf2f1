use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_gate::{AccessContext, EditTarget, PermissionGate};
use refd_store::{
    PrimaryRow, ShardBackend, ShardLocator, StoredRecord, Tombstone, WriteBatch, WriteOp,
};
use refd_types::{Library, LibraryId, ObjectKey, ObjectKind, ServerTimestamp};

use crate::core::ObjectCore;
use crate::error::DataResult;
use crate::record::{decode, encode, RelationRecord};

/// A loaded relation triple.
#[derive(Clone, Debug)]
pub struct Relation {
    pub row: PrimaryRow,
    pub record: RelationRecord,
}

/// Store for subject/predicate/object triples linking objects across
/// libraries. Triples are immutable: saving an existing triple returns the
/// stored row unchanged.
pub struct RelationStore {
    core: ObjectCore,
    gate: Arc<PermissionGate>,
}

impl RelationStore {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Relation, backend, locator, cache),
            gate,
        }
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    fn load_all(&self, library: LibraryId) -> DataResult<Vec<Relation>> {
        let ids: Vec<_> = self.core.rows(library)?.into_iter().map(|r| r.id).collect();
        let mut out = Vec::new();
        for record in self.core.load_records(library, &ids)? {
            out.push(Relation {
                record: decode(&record.payload)?,
                row: record.row,
            });
        }
        Ok(out)
    }

    /// Look up an exact triple.
    pub fn find(
        &self,
        library: LibraryId,
        record: &RelationRecord,
    ) -> DataResult<Option<Relation>> {
        Ok(self
            .load_all(library)?
            .into_iter()
            .find(|r| r.record == *record))
    }

    /// All triples with the given subject URI.
    pub fn by_subject(&self, library: LibraryId, subject: &str) -> DataResult<Vec<Relation>> {
        let mut hits: Vec<_> = self
            .load_all(library)?
            .into_iter()
            .filter(|r| r.record.subject == subject)
            .collect();
        hits.sort_by(|a, b| a.row.key.cmp(&b.row.key));
        Ok(hits)
    }

    /// All triples with the given object URI.
    pub fn by_object(&self, library: LibraryId, object: &str) -> DataResult<Vec<Relation>> {
        let mut hits: Vec<_> = self
            .load_all(library)?
            .into_iter()
            .filter(|r| r.record.object == object)
            .collect();
        hits.sort_by(|a, b| a.row.key.cmp(&b.row.key));
        Ok(hits)
    }

    /// Save a triple, deduplicating on the full subject/predicate/object.
    pub fn save(
        &self,
        ctx: &AccessContext,
        library: &Library,
        record: RelationRecord,
    ) -> DataResult<Relation> {
        self.gate.edit_check(ctx, library, EditTarget::plain())?;
        if let Some(existing) = self.find(library.id, &record)? {
            return Ok(existing);
        }

        let id = self.core.allocate_id(library.id)?;
        let key = ObjectKey::generate();
        let row = self.core.new_row(library.id, key, id);
        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Relation,
            row: row.clone(),
            payload: encode(&record)?,
        }));
        self.core.apply(&batch)?;
        self.core.note_created(&row)?;
        Ok(Relation { row, record })
    }

    /// Delete a triple by key. A miss is a no-op.
    pub fn delete(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: ObjectKey,
    ) -> DataResult<()> {
        if self.core.row_by_key(library.id, key)?.is_none() {
            return Ok(());
        }
        self.gate.edit_check(ctx, library, EditTarget::plain())?;

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        batch.push(WriteOp::Delete {
            kind: ObjectKind::Relation,
            library: library.id,
            key,
        });
        batch.push(WriteOp::UpsertTombstone(Tombstone {
            library: library.id,
            kind: ObjectKind::Relation,
            key,
            timestamp: ServerTimestamp::now(),
        }));
        self.core.apply(&batch)?;
        self.core.note_deleted(library.id, key);
        Ok(())
    }
}
