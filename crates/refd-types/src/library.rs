use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::TypeError;

/// Numeric identifier of a user account.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct UserId(pub i64);

impl fmt::Debug for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserId({})", self.0)
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Numeric identifier of a library, the tenant boundary of the system.
///
/// Every object belongs to exactly one library, and a library's id determines
/// which shard holds its rows.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LibraryId(i64);

impl LibraryId {
    /// Wrap a raw id, rejecting non-positive values.
    pub fn new(id: i64) -> Result<Self, TypeError> {
        if id <= 0 {
            return Err(TypeError::InvalidLibraryId(id));
        }
        Ok(Self(id))
    }

    /// The raw numeric value.
    pub fn get(&self) -> i64 {
        self.0
    }
}

impl fmt::Debug for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "LibraryId({})", self.0)
    }
}

impl fmt::Display for LibraryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Whether a library is a personal library or a group library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LibraryKind {
    User,
    Group,
}

/// A library: a personal or group collection of objects.
///
/// Libraries are never deleted within the scope of this layer. Group
/// libraries additionally attribute writes to users
/// (`created_by` / `last_modified_by` on their items).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Library {
    pub id: LibraryId,
    pub kind: LibraryKind,
    /// Owning user for `User` libraries, `None` for groups.
    pub owner: Option<UserId>,
}

impl Library {
    pub fn user(id: LibraryId, owner: UserId) -> Self {
        Self { id, kind: LibraryKind::User, owner: Some(owner) }
    }

    pub fn group(id: LibraryId) -> Self {
        Self { id, kind: LibraryKind::Group, owner: None }
    }

    pub fn is_group(&self) -> bool {
        self.kind == LibraryKind::Group
    }
}
