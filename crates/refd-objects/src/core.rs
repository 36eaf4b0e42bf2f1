use std::collections::HashMap;
use std::sync::Arc;

use refd_cache::{DistributedCache, IdentityResolver, PrimaryDataCache};
use refd_store::{PrimaryRow, ShardBackend, ShardId, ShardLocator, StoredRecord, WriteBatch};
use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind, ObjectVersion, ServerTimestamp};
use tracing::debug;

use crate::error::{DataError, DataResult};

/// Shared plumbing for one object kind: id/key resolution, primary-data
/// caching, batched record loads, and version bookkeeping.
///
/// Each typed store owns one of these; the typed layer supplies payload
/// encoding and kind-specific semantics.
pub struct ObjectCore {
    kind: ObjectKind,
    backend: Arc<dyn ShardBackend>,
    locator: ShardLocator,
    identity: IdentityResolver,
    primary: PrimaryDataCache,
}

impl ObjectCore {
    pub fn new(
        kind: ObjectKind,
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        cache: Arc<dyn DistributedCache>,
    ) -> Self {
        let identity = IdentityResolver::new(kind, backend.clone(), locator.clone(), cache);
        let primary = PrimaryDataCache::new(kind, backend.clone(), locator.clone());
        Self {
            kind,
            backend,
            locator,
            identity,
            primary,
        }
    }

    pub fn kind(&self) -> ObjectKind {
        self.kind
    }

    pub fn backend(&self) -> &Arc<dyn ShardBackend> {
        &self.backend
    }

    pub fn shard_for(&self, library: LibraryId) -> ShardId {
        self.locator.shard_for(library)
    }

    pub fn resolve(&self, library: LibraryId, key: ObjectKey) -> DataResult<Option<ObjectId>> {
        Ok(self.identity.resolve(library, key)?)
    }

    pub fn exists(&self, library: LibraryId, key: ObjectKey) -> DataResult<bool> {
        Ok(self.identity.exists(library, key)?)
    }

    pub fn row_by_key(
        &self,
        library: LibraryId,
        key: ObjectKey,
    ) -> DataResult<Option<Arc<PrimaryRow>>> {
        Ok(self.primary.get_by_key(library, key)?)
    }

    pub fn row_by_id(
        &self,
        library: LibraryId,
        id: ObjectId,
    ) -> DataResult<Option<Arc<PrimaryRow>>> {
        Ok(self.primary.get_by_id(library, id)?)
    }

    /// All primary rows of this kind in a library.
    pub fn rows(&self, library: LibraryId) -> DataResult<Vec<PrimaryRow>> {
        let shard = self.shard_for(library);
        Ok(self.backend.load_primary_rows(shard, self.kind, library)?)
    }

    /// Load full records for `ids` in one backend call, preserving caller
    /// order. Ids that vanished since the caller obtained them are dropped,
    /// not errors.
    pub fn load_records(
        &self,
        library: LibraryId,
        ids: &[ObjectId],
    ) -> DataResult<Vec<StoredRecord>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let shard = self.shard_for(library);
        let loaded = self.backend.load_records(shard, self.kind, library, ids)?;
        let mut by_id: HashMap<ObjectId, StoredRecord> =
            loaded.into_iter().map(|r| (r.row.id, r)).collect();
        let mut ordered = Vec::with_capacity(ids.len());
        for id in ids {
            match by_id.remove(id) {
                Some(record) => ordered.push(record),
                None => {
                    debug!(kind = %self.kind, %library, %id, "dropping vanished id from batch");
                }
            }
        }
        Ok(ordered)
    }

    /// Load one record by key, or `None`.
    pub fn load_by_key(
        &self,
        library: LibraryId,
        key: ObjectKey,
    ) -> DataResult<Option<StoredRecord>> {
        let Some(id) = self.resolve(library, key)? else {
            return Ok(None);
        };
        Ok(self.load_records(library, &[id])?.into_iter().next())
    }

    /// Allocate the next id on the library's shard.
    pub fn allocate_id(&self, library: LibraryId) -> DataResult<ObjectId> {
        let shard = self.shard_for(library);
        Ok(self.backend.allocate_id(shard, self.kind)?)
    }

    /// Fail with [`DataError::VersionConflict`] unless the presented version
    /// matches the stored one. `None` means the caller did not present a
    /// version and relies on a fresh read.
    pub fn check_version(
        &self,
        row: &PrimaryRow,
        presented: Option<ObjectVersion>,
    ) -> DataResult<()> {
        if let Some(presented) = presented {
            if presented != row.version {
                return Err(DataError::VersionConflict {
                    library: row.library,
                    key: row.key,
                    stored: row.version,
                    presented,
                });
            }
        }
        Ok(())
    }

    /// A fresh row for a newly created object.
    pub fn new_row(&self, library: LibraryId, key: ObjectKey, id: ObjectId) -> PrimaryRow {
        let now = ServerTimestamp::now();
        PrimaryRow {
            id,
            library,
            key,
            version: ObjectVersion::INITIAL.bumped(),
            date_added: now,
            date_modified: now,
            server_date_modified: now,
        }
    }

    /// Bump version and modification markers for a saved row. Wraps at the
    /// counter maximum.
    pub fn touched(&self, row: &PrimaryRow) -> PrimaryRow {
        let now = ServerTimestamp::now();
        PrimaryRow {
            version: row.version.bumped(),
            date_modified: now,
            server_date_modified: now,
            ..*row
        }
    }

    pub fn apply(&self, batch: &WriteBatch) -> DataResult<()> {
        if batch.is_empty() {
            return Ok(());
        }
        self.backend.apply(batch)?;
        Ok(())
    }

    /// Post-create bookkeeping: register the key→id mapping (collision
    /// detection included) and admit the row to the primary cache.
    pub fn note_created(&self, row: &PrimaryRow) -> DataResult<()> {
        self.identity
            .register_new_id(row.library, row.key, row.id)?;
        self.primary.cache_row(row.clone());
        Ok(())
    }

    /// Post-save bookkeeping for an existing object.
    pub fn note_saved(&self, row: &PrimaryRow) {
        self.primary.cache_row(row.clone());
    }

    /// Post-delete bookkeeping: drop the key from both cache levels.
    pub fn note_deleted(&self, library: LibraryId, key: ObjectKey) {
        self.identity.remove(library, key);
        self.primary.evict(library, key);
    }
}
