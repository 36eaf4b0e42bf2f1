use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind};

use crate::shard::ShardId;

/// Errors from storage backend operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The shard is unreachable or failed mid-request.
    #[error("shard {0} unavailable")]
    ShardUnavailable(ShardId),

    /// An upsert tried to change the id of an existing `(library, key)` row.
    /// Ids are stable for an object's lifetime; this indicates a bug or data
    /// corruption, not a transient condition.
    #[error("id collision for {kind} {library}/{key}: row has id {existing}, write carried {incoming}")]
    IdCollision {
        kind: ObjectKind,
        library: LibraryId,
        key: ObjectKey,
        existing: ObjectId,
        incoming: ObjectId,
    },

    /// A record payload failed to encode or decode.
    #[error("record payload for {kind} {library}/{key}: {reason}")]
    CorruptRecord {
        kind: ObjectKind,
        library: LibraryId,
        key: ObjectKey,
        reason: String,
    },

    /// A backend-specific failure.
    #[error("storage backend error: {0}")]
    Backend(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
