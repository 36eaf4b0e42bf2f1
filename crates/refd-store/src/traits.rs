use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind, ServerTimestamp};

use crate::error::StoreResult;
use crate::ops::WriteBatch;
use crate::row::{ChangeCursor, PrimaryRow, StoredRecord, Tombstone};
use crate::shard::ShardId;

/// The durable storage contract, implemented per deployment backend.
///
/// Operations are synchronous and blocking; concurrency control above this
/// trait is optimistic versioning, not locking. Reads of absent rows return
/// empty results. All errors are infrastructure failures, never "not found".
pub trait ShardBackend: Send + Sync {
    /// Allocate the next numeric id for a kind on a shard. Ids are
    /// monotonically increasing and never reused, even after deletes.
    fn allocate_id(&self, shard: ShardId, kind: ObjectKind) -> StoreResult<ObjectId>;

    /// All primary rows of a kind in one library.
    fn load_primary_rows(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        library: LibraryId,
    ) -> StoreResult<Vec<PrimaryRow>>;

    /// The `(key, id)` pairs of a kind in one library, for identity-cache
    /// population. Default implementation projects [`Self::load_primary_rows`].
    fn load_key_map(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        library: LibraryId,
    ) -> StoreResult<Vec<(ObjectKey, ObjectId)>> {
        Ok(self
            .load_primary_rows(shard, kind, library)?
            .into_iter()
            .map(|row| (row.key, row.id))
            .collect())
    }

    /// Load full records by id, in one round-trip. Ids that no longer exist
    /// are absent from the result; the caller decides whether that matters.
    fn load_records(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        library: LibraryId,
        ids: &[ObjectId],
    ) -> StoreResult<Vec<StoredRecord>>;

    /// Apply a write batch atomically.
    fn apply(&self, batch: &WriteBatch) -> StoreResult<()>;

    /// Ids of rows in the given libraries whose modification marker exceeds
    /// the cursor. One scan per shard; callers group libraries by shard.
    fn changed_since(
        &self,
        shard: ShardId,
        kind: ObjectKind,
        libraries: &[LibraryId],
        cursor: ChangeCursor,
    ) -> StoreResult<Vec<(LibraryId, ObjectId)>>;

    /// Delete-log rows for a library with timestamps after `since`.
    fn tombstones_since(
        &self,
        shard: ShardId,
        library: LibraryId,
        since: ServerTimestamp,
    ) -> StoreResult<Vec<Tombstone>>;
}
