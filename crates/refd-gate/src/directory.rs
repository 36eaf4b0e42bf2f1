use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use refd_types::{LibraryId, UserId};

/// Publication settings for a library, consulted for anonymous access.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LibraryPrivacy {
    pub publish_library: bool,
    pub publish_notes: bool,
}

/// Source of per-library privacy settings.
///
/// An unknown library reports fully private, never an error.
pub trait PrivacyDirectory: Send + Sync {
    fn privacy(&self, library: LibraryId) -> LibraryPrivacy;
}

/// Group membership and role lookups for group libraries.
pub trait GroupAccess: Send + Sync {
    /// Can the user see the group's library at all (member or public group)?
    fn user_can_read(&self, user: UserId, library: LibraryId) -> bool;

    /// Is the user a member with edit rights?
    fn user_can_edit(&self, user: UserId, library: LibraryId) -> bool;

    /// May the user modify stored attachment files?
    fn user_can_edit_files(&self, user: UserId, library: LibraryId) -> bool;
}

/// In-memory privacy directory for tests and embedding.
pub struct MemoryPrivacyDirectory {
    settings: RwLock<HashMap<LibraryId, LibraryPrivacy>>,
}

impl MemoryPrivacyDirectory {
    pub fn new() -> Self {
        Self {
            settings: RwLock::new(HashMap::new()),
        }
    }

    pub fn set(&self, library: LibraryId, privacy: LibraryPrivacy) {
        self.settings
            .write()
            .expect("lock poisoned")
            .insert(library, privacy);
    }
}

impl Default for MemoryPrivacyDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl PrivacyDirectory for MemoryPrivacyDirectory {
    fn privacy(&self, library: LibraryId) -> LibraryPrivacy {
        self.settings
            .read()
            .expect("lock poisoned")
            .get(&library)
            .copied()
            .unwrap_or_default()
    }
}

/// In-memory group role table for tests and embedding.
///
/// Roles are cumulative: an editor can read, a file editor can edit.
pub struct MemoryGroupAccess {
    readers: RwLock<HashSet<(LibraryId, UserId)>>,
    editors: RwLock<HashSet<(LibraryId, UserId)>>,
    file_editors: RwLock<HashSet<(LibraryId, UserId)>>,
}

impl MemoryGroupAccess {
    pub fn new() -> Self {
        Self {
            readers: RwLock::new(HashSet::new()),
            editors: RwLock::new(HashSet::new()),
            file_editors: RwLock::new(HashSet::new()),
        }
    }

    pub fn add_reader(&self, library: LibraryId, user: UserId) {
        self.readers
            .write()
            .expect("lock poisoned")
            .insert((library, user));
    }

    pub fn add_editor(&self, library: LibraryId, user: UserId) {
        self.add_reader(library, user);
        self.editors
            .write()
            .expect("lock poisoned")
            .insert((library, user));
    }

    pub fn add_file_editor(&self, library: LibraryId, user: UserId) {
        self.add_editor(library, user);
        self.file_editors
            .write()
            .expect("lock poisoned")
            .insert((library, user));
    }
}

impl Default for MemoryGroupAccess {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupAccess for MemoryGroupAccess {
    fn user_can_read(&self, user: UserId, library: LibraryId) -> bool {
        self.readers
            .read()
            .expect("lock poisoned")
            .contains(&(library, user))
    }

    fn user_can_edit(&self, user: UserId, library: LibraryId) -> bool {
        self.editors
            .read()
            .expect("lock poisoned")
            .contains(&(library, user))
    }

    fn user_can_edit_files(&self, user: UserId, library: LibraryId) -> bool {
        self.file_editors
            .read()
            .expect("lock poisoned")
            .contains(&(library, user))
    }
}
