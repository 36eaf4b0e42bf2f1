use std::sync::Arc;

use refd_cache::DistributedCache;
use refd_store::{PrimaryRow, ShardBackend, ShardLocator, StoredRecord, WriteBatch, WriteOp};
use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind, TagType};

use crate::core::ObjectCore;
use crate::error::DataResult;
use crate::record::{decode, encode, TagRecord, TagValue};

/// Store for tag rows, unique per `(library, name, type)`.
///
/// Item saves attach tags by value; this store keeps the corresponding tag
/// rows alive so tags carry keys and versions of their own for sync.
pub struct TagStore {
    core: ObjectCore,
}

impl TagStore {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
    ) -> Self {
        Self {
            core: ObjectCore::new(ObjectKind::Tag, backend, locator, cache),
        }
    }

    pub fn core(&self) -> &ObjectCore {
        &self.core
    }

    /// The id of an existing tag row with this name and type.
    pub fn find(
        &self,
        library: LibraryId,
        name: &str,
        tag_type: TagType,
    ) -> DataResult<Option<ObjectId>> {
        let ids: Vec<ObjectId> = self.core.rows(library)?.iter().map(|r| r.id).collect();
        for record in self.core.load_records(library, &ids)? {
            let tag = decode::<TagRecord>(&record.payload)?;
            if tag.name == name && tag.tag_type == tag_type {
                return Ok(Some(record.row.id));
            }
        }
        Ok(None)
    }

    /// All tags in a library, with their ids.
    pub fn all(&self, library: LibraryId) -> DataResult<Vec<(ObjectId, TagValue)>> {
        let ids: Vec<ObjectId> = self.core.rows(library)?.iter().map(|r| r.id).collect();
        self.core
            .load_records(library, &ids)?
            .into_iter()
            .map(|record| {
                let tag = decode::<TagRecord>(&record.payload)?;
                Ok((
                    record.row.id,
                    TagValue {
                        name: tag.name,
                        tag_type: tag.tag_type,
                    },
                ))
            })
            .collect()
    }

    /// Stage rows for any of `tags` that do not exist yet. Returns the
    /// staged rows for post-apply registration.
    pub fn stage_missing(
        &self,
        library: LibraryId,
        tags: &[TagValue],
        batch: &mut WriteBatch,
    ) -> DataResult<Vec<PrimaryRow>> {
        let mut staged = Vec::new();
        for tag in tags {
            if self.find(library, &tag.name, tag.tag_type)?.is_some() {
                continue;
            }
            // Two equal tags in one payload would both miss the lookup.
            if staged
                .iter()
                .any(|(_, t): &(PrimaryRow, TagValue)| t == tag)
            {
                continue;
            }
            let id = self.core.allocate_id(library)?;
            let row = self.core.new_row(library, ObjectKey::generate(), id);
            let payload = encode(&TagRecord {
                name: tag.name.clone(),
                tag_type: tag.tag_type,
            })?;
            batch.push(WriteOp::Upsert(StoredRecord {
                kind: ObjectKind::Tag,
                row: row.clone(),
                payload,
            }));
            staged.push((row, tag.clone()));
        }
        Ok(staged.into_iter().map(|(row, _)| row).collect())
    }

    pub fn commit_staged(&self, rows: &[PrimaryRow]) -> DataResult<()> {
        for row in rows {
            self.core.note_created(row)?;
        }
        Ok(())
    }
}
