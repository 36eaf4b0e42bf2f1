use serde::{Deserialize, Serialize};

use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind, ObjectVersion, ServerTimestamp};

/// The lightweight per-object columns every kind's table carries.
///
/// This is what the primary-data cache snapshots and what change tracking
/// scans; the kind-specific content lives in the record payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryRow {
    pub id: ObjectId,
    pub library: LibraryId,
    pub key: ObjectKey,
    pub version: ObjectVersion,
    pub date_added: ServerTimestamp,
    pub date_modified: ServerTimestamp,
    pub server_date_modified: ServerTimestamp,
}

/// A full stored row: primary columns plus the kind-specific payload,
/// bincode-encoded by the object layer.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub kind: ObjectKind,
    pub row: PrimaryRow,
    pub payload: Vec<u8>,
}

/// A delete-log row: records that `(library, kind, key)` was removed at a
/// given time, so sync clients can detect deletions.
///
/// Upsert semantics: deleting a key that already has a tombstone refreshes
/// the timestamp. Keys can be deleted, recreated, and deleted again without
/// duplicating log rows.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tombstone {
    pub library: LibraryId,
    pub kind: ObjectKind,
    pub key: ObjectKey,
    pub timestamp: ServerTimestamp,
}

/// Cursor for "changed since" scans: either a version floor or a modification
/// timestamp. Rows strictly greater than the cursor match.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ChangeCursor {
    Version(ObjectVersion),
    Timestamp(ServerTimestamp),
}

impl ChangeCursor {
    /// Returns `true` if the row's modification marker exceeds the cursor.
    pub fn matches(&self, row: &PrimaryRow) -> bool {
        match self {
            ChangeCursor::Version(floor) => row.version > *floor,
            ChangeCursor::Timestamp(since) => row.server_date_modified > *since,
        }
    }
}
