use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_store::{PrimaryRow, ShardBackend, ShardLocator, StoredRecord, WriteBatch, WriteOp};
use refd_types::{CreatorData, LibraryId, ObjectId, ObjectKey, ObjectKind};

use crate::core::ObjectCore;
use crate::error::DataResult;
use crate::record::{decode, encode, CreatorRecord};

/// Store for creator rows.
///
/// Creator content is deduplicated library-wide: the merge engine looks up
/// candidates by content hash before creating a new row, so equal names
/// share one row across all of a library's items.
pub struct CreatorStore {
    core: ObjectCore,
}

impl CreatorStore {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Creator, backend, locator, cache),
        }
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    pub fn get(&self, library: LibraryId, id: ObjectId) -> DataResult<Option<CreatorData>> {
        let records = self.core.load_records(library, &[id])?;
        match records.into_iter().next() {
            Some(record) => Ok(Some(decode::<CreatorRecord>(&record.payload)?.data)),
            None => Ok(None),
        }
    }

    pub fn get_many(
        &self,
        library: LibraryId,
        ids: &[ObjectId],
    ) -> DataResult<Vec<(ObjectId, CreatorData)>> {
        let records = self.core.load_records(library, ids)?;
        records
            .into_iter()
            .map(|r| Ok((r.row.id, decode::<CreatorRecord>(&r.payload)?.data)))
            .collect()
    }

    /// Library-wide lookup of a content-identical creator.
    pub fn find_by_hash(&self, library: LibraryId, hash: &str) -> DataResult<Option<ObjectId>> {
        let ids: Vec<ObjectId> = self.core.rows(library)?.iter().map(|r| r.id).collect();
        for record in self.core.load_records(library, &ids)? {
            let data = decode::<CreatorRecord>(&record.payload)?.data;
            if data.hash() == hash {
                return Ok(Some(record.row.id));
            }
        }
        Ok(None)
    }

    /// Stage a new creator row on the caller's batch. The row becomes
    /// visible (and must be registered via [`CreatorStore::commit_staged`])
    /// only after the batch applies.
    pub fn stage_create(
        &self,
        library: LibraryId,
        data: &CreatorData,
        batch: &mut WriteBatch,
    ) -> DataResult<PrimaryRow> {
        let id = self.core.allocate_id(library)?;
        let row = self.core.new_row(library, ObjectKey::generate(), id);
        let payload = encode(&CreatorRecord { data: data.clone() })?;
        batch.push(WriteOp::Upsert(StoredRecord {
            kind: ObjectKind::Creator,
            row: row.clone(),
            payload,
        }));
        Ok(row)
    }

    /// Register staged rows after their batch applied.
    pub fn commit_staged(&self, rows: &[PrimaryRow]) -> DataResult<()> {
        for row in rows {
            self.core.note_created(row)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use refd_cache::MemoryCache;
    use refd_store::{InMemoryBackend, ShardId};

    fn store() -> CreatorStore {
        let backend = Arc::new(InMemoryBackend::new());
        CreatorStore::new(
            backend,
            ShardLocator::single(ShardId(1)),
            Arc::new(MemoryCache::new()),
        )
    }

    fn library() -> LibraryId {
        LibraryId::new(1).unwrap()
    }

    #[test]
    fn staged_creator_is_findable_by_hash() {
        let store = store();
        let data = CreatorData::two_field("Ada", "Lovelace");

        let mut batch = WriteBatch::new(store.core().shard_for(library()));
        let row = store.stage_create(library(), &data, &mut batch).unwrap();
        store.core().apply(&batch).unwrap();
        store.commit_staged(std::slice::from_ref(&row)).unwrap();

        let found = store.find_by_hash(library(), &data.hash()).unwrap();
        assert_eq!(found, Some(row.id));
        assert_eq!(store.get(library(), row.id).unwrap(), Some(data));
    }

    #[test]
    fn hash_lookup_misses_different_content() {
        let store = store();
        let mut batch = WriteBatch::new(store.core().shard_for(library()));
        let row = store
            .stage_create(library(), &CreatorData::two_field("Ada", "Lovelace"), &mut batch)
            .unwrap();
        store.core().apply(&batch).unwrap();
        store.commit_staged(std::slice::from_ref(&row)).unwrap();

        let other = CreatorData::single_field("Bourbaki");
        assert_eq!(store.find_by_hash(library(), &other.hash()).unwrap(), None);
    }
}
