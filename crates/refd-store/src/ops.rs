use refd_types::{LibraryId, ObjectKey, ObjectKind};

use crate::row::{StoredRecord, Tombstone};
use crate::shard::ShardId;

/// A single mutation within a write batch.
#[derive(Clone, Debug)]
pub enum WriteOp {
    /// Insert or update a row. The id must match any existing row for the
    /// same `(kind, library, key)`.
    Upsert(StoredRecord),
    /// Remove a row. A no-op if the row does not exist.
    Delete {
        kind: ObjectKind,
        library: LibraryId,
        key: ObjectKey,
    },
    /// Insert or refresh a delete-log row.
    UpsertTombstone(Tombstone),
}

/// An ordered list of mutations applied atomically on one shard.
///
/// This is the transaction scope of the storage contract: backends apply the
/// whole batch or none of it. A cascading item delete (children, parent,
/// tombstones) is built as one batch.
#[derive(Clone, Debug)]
pub struct WriteBatch {
    pub shard: ShardId,
    pub ops: Vec<WriteOp>,
}

impl WriteBatch {
    pub fn new(shard: ShardId) -> Self {
        Self { shard, ops: Vec::new() }
    }

    pub fn push(&mut self, op: WriteOp) {
        self.ops.push(op);
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }
}
