use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_gate::{AccessContext, EditTarget, PermissionGate};
use refd_store::{
    PrimaryRow, ShardBackend, ShardLocator, StoredRecord, Tombstone, WriteBatch, WriteOp,
};
use refd_types::{Library, LibraryId, ObjectKey, ObjectKind, ObjectVersion, ServerTimestamp};
use refd_wire::{validate_collection, CollectionPayload, ParentSpec};
use tracing::debug;

use crate::core::ObjectCore;
use crate::error::{DataError, DataResult};
use crate::record::{decode, encode, CollectionRecord};

/// A loaded collection.
#[derive(Clone, Debug)]
pub struct Collection {
    pub row: PrimaryRow,
    pub record: CollectionRecord,
}

impl Collection {
    pub fn key(&self) -> ObjectKey {
        self.row.key
    }
}

/// Store for collection trees.
///
/// Parent links form a forest; saves reject payloads that would close a
/// cycle rather than inherit silent ambiguity about what such a tree means.
pub struct CollectionStore {
    core: ObjectCore,
    gate: Arc<PermissionGate>,
}

impl CollectionStore {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
        gate: Arc<PermissionGate>,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Collection, backend, locator, cache),
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
    ) -> DataResult<Option<Collection>> {
        match self.core.load_by_key(library, key)? {
            Some(record) => Ok(Some(Self::hydrate(record)?)),
            None => Ok(None),
        }
    }

    pub fn all(&self, library: LibraryId) -> DataResult<Vec<Collection>> {
        let ids: Vec<_> = self.core.rows(library)?.iter().map(|r| r.id).collect();
        self.core
            .load_records(library, &ids)?
            .into_iter()
            .map(Self::hydrate)
            .collect()
    }

    /// Direct children of a collection.
    pub fn children(&self, library: LibraryId, key: ObjectKey) -> DataResult<Vec<Collection>> {
        Ok(self
            .all(library)?
            .into_iter()
            .filter(|c| c.record.parent == Some(key))
            .collect())
    }

    fn hydrate(record: StoredRecord) -> DataResult<Collection> {
        Ok(Collection {
            record: decode::<CollectionRecord>(&record.payload)?,
            row: record.row,
        })
    }

    /// Validate and apply an upload onto a new or existing collection.
    pub fn save(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: Option<ObjectKey>,
        payload: &CollectionPayload,
    ) -> DataResult<Collection> {
        validate_collection(payload)?;
        self.gate.edit_check(ctx, library, EditTarget::plain())?;

        let existing = match key {
            Some(key) => self.get_by_library_and_key(library.id, key)?,
            None => None,
        };
        if let Some(current) = &existing {
            self.core
                .check_version(&current.row, payload.version.map(ObjectVersion))?;
        }

        let parent = match &payload.parent_collection {
            Some(ParentSpec::Key(raw)) => {
                let parent_key = ObjectKey::parse(raw)?;
                if self.core.resolve(library.id, parent_key)?.is_none() {
                    return Err(DataError::NotFound {
                        kind: ObjectKind::Collection,
                        library: library.id,
                        key: parent_key,
                    });
                }
                Some(parent_key)
            }
            Some(ParentSpec::Flag(_)) | None => None,
        };
        if let (Some(current), Some(parent_key)) = (&existing, parent) {
            self.check_cycle(library.id, current.row.key, parent_key)?;
        }

        let record = CollectionRecord {
            name: payload.name.clone(),
            parent,
            relations: payload.relations.clone().unwrap_or_default(),
        };

        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        match existing {
            Some(current) => {
                if record == current.record {
                    debug!(library = %library.id, key = %current.row.key, "collection unchanged");
                    return Ok(current);
                }
                let row = self.core.touched(&current.row);
                batch.push(WriteOp::Upsert(StoredRecord {
                    kind: ObjectKind::Collection,
                    row: row.clone(),
                    payload: encode(&record)?,
                }));
                self.core.apply(&batch)?;
                self.core.note_saved(&row);
                Ok(Collection { row, record })
            }
            None => {
                let id = self.core.allocate_id(library.id)?;
                let key = key.unwrap_or_else(ObjectKey::generate);
                let row = self.core.new_row(library.id, key, id);
                batch.push(WriteOp::Upsert(StoredRecord {
                    kind: ObjectKind::Collection,
                    row: row.clone(),
                    payload: encode(&record)?,
                }));
                self.core.apply(&batch)?;
                self.core.note_created(&row)?;
                Ok(Collection { row, record })
            }
        }
    }

    // Walk the parent chain from the proposed parent; reaching the saved
    // collection means the edit would close a loop.
    fn check_cycle(
        &self,
        library: LibraryId,
        own_key: ObjectKey,
        parent: ObjectKey,
    ) -> DataResult<()> {
        let mut cursor = Some(parent);
        let mut hops = 0usize;
        while let Some(key) = cursor {
            if key == own_key {
                return Err(DataError::InvalidInput(
                    "parent collection would create a cycle".into(),
                ));
            }
            hops += 1;
            if hops > 1024 {
                return Err(DataError::Consistency(
                    "collection parent chain does not terminate".into(),
                ));
            }
            cursor = self
                .get_by_library_and_key(library, key)?
                .and_then(|c| c.record.parent);
        }
        Ok(())
    }

    /// Delete a collection and its subtree, with a tombstone per node. A
    /// miss is a no-op. Items keep their membership keys; readers ignore
    /// keys that no longer resolve.
    pub fn delete(
        &self,
        ctx: &AccessContext,
        library: &Library,
        key: ObjectKey,
    ) -> DataResult<()> {
        let Some(root) = self.get_by_library_and_key(library.id, key)? else {
            return Ok(());
        };
        self.gate.edit_check(ctx, library, EditTarget::plain())?;

        let mut doomed = vec![root];
        let mut frontier = 0;
        while frontier < doomed.len() {
            let children = self.children(library.id, doomed[frontier].row.key)?;
            doomed.extend(children);
            frontier += 1;
        }

        let now = ServerTimestamp::now();
        let mut batch = WriteBatch::new(self.core.shard_for(library.id));
        for collection in &doomed {
            batch.push(WriteOp::Delete {
                kind: ObjectKind::Collection,
                library: library.id,
                key: collection.row.key,
            });
            batch.push(WriteOp::UpsertTombstone(Tombstone {
                library: library.id,
                kind: ObjectKind::Collection,
                key: collection.row.key,
                timestamp: now,
            }));
        }
        self.core.apply(&batch)?;
        for collection in &doomed {
            self.core.note_deleted(library.id, collection.row.key);
        }
        Ok(())
    }
}
