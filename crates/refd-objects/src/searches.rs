use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_gate::{AccessContext, EditTarget, PermissionGate};
use refd_store::{
    PrimaryRow, ShardBackend, ShardLocator, StoredRecord, Tombstone, WriteBatch, WriteOp,
};
use refd_types::{Library, LibraryId, ObjectKey, ObjectKind, ObjectVersion, ServerTimestamp};

use crate::core::ObjectCore;
use crate::error::{DataError, DataResult};
use crate::record::{decode, encode, SavedSearchRecord};

/// A loaded saved search.
#[derive(Clone, Debug)]
pub struct SavedSearch {
    pub row: PrimaryRow,
    pub record: SavedSearchRecord,
}

/// Store for saved searches: named, versioned condition lists.
pub struct SavedSearchStore {
    core: ObjectCore,
    gate: Arc<PermissionGate>,
}

impl SavedSearchStore {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Search, backend, locator, cache),
            gate,
        }
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    pub fn get_by_library_and_key(
        &self,
        library: LibraryId,
        key: ObjectKey,
    ) -> DataResult<Option<SavedSearch>> {
        match self.core.load_by_key(library, key)? {
            Some(record) => Ok(Some(SavedSearch {
                record: decode(&record.payload)?,
                row: record.row,
            })),
            None => Ok(None),
        }
    }

    pub fn save(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: Option<ObjectKey>,
        record: SavedSearchRecord,
        presented_version: Option<ObjectVersion>,
    ) -> DataResult<SavedSearch> {
        if record.name.trim().is_empty() {
            return Err(DataError::InvalidInput("'name' property not provided".into()));
        }
        if record.conditions.is_empty() {
            return Err(DataError::InvalidInput(
                "a saved search needs at least one condition".into(),
            ));
        }
        self.gate.edit_check(ctx, library, EditTarget::plain())?;

        let existing = match key {
            Some(key) => self.get_by_library_and_key(library.id, key)?,
            None => None,
        };
        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        match existing {
            Some(current) => {
                self.core.check_version(&current.row, presented_version)?;
                if record == current.record {
                    return Ok(current);
                }
                let row = self.core.touched(&current.row);
                batch.push(WriteOp::Upsert(StoredRecord {
                    kind: ObjectKind::Search,
                    row: row.clone(),
                    payload: encode(&record)?,
                }));
                self.core.apply(&batch)?;
                self.core.note_saved(&row);
                Ok(SavedSearch { row, record })
            }
            None => {
                let id = self.core.allocate_id(library.id)?;
                let key = key.unwrap_or_else(ObjectKey::generate);
                let row = self.core.new_row(library.id, key, id);
                batch.push(WriteOp::Upsert(StoredRecord {
                    kind: ObjectKind::Search,
                    row: row.clone(),
                    payload: encode(&record)?,
                }));
                self.core.apply(&batch)?;
                self.core.note_created(&row)?;
                Ok(SavedSearch { row, record })
            }
        }
    }

    /// Delete a saved search. A miss is a no-op.
    pub fn delete(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: ObjectKey,
    ) -> DataResult<()> {
        if self.get_by_library_and_key(library.id, key)?.is_none() {
            return Ok(());
        }
        self.gate.edit_check(ctx, library, EditTarget::plain())?;

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        batch.push(WriteOp::Delete {
            kind: ObjectKind::Search,
            library: library.id,
            key,
        });
        batch.push(WriteOp::UpsertTombstone(Tombstone {
            library: library.id,
            kind: ObjectKind::Search,
            key,
            timestamp: ServerTimestamp::now(),
        }));
        self.core.apply(&batch)?;
        self.core.note_deleted(library.id, key);
        Ok(())
    }
}
