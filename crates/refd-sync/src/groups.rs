use std::collections::HashMap;
use std::sync::RwLock;

use refd_types::{LibraryId, ServerTimestamp, UserId};

/// Group membership lookups, keyed by the group's library id.
pub trait GroupDirectory: Send + Sync {
    /// Library ids of every group the user belongs to.
    fn user_groups(&self, user: UserId) -> Vec<LibraryId>;

    /// Library ids of groups the user joined strictly after `since`.
    fn joined_since(&self, user: UserId, since: ServerTimestamp) -> Vec<LibraryId>;
}

/// In-memory group directory for tests and embedding.
pub struct MemoryGroupDirectory {
    // Per user: (group library, joined-at timestamp).
    memberships: RwLock<HashMap<UserId, Vec<(LibraryId, ServerTimestamp)>>>,
}

impl MemoryGroupDirectory {
    pub fn new() -> Self {
        Self {
            memberships: RwLock::new(HashMap::new()),
        }
    }

    pub fn add_member(&self, user: UserId, group_library: LibraryId, joined_at: ServerTimestamp) {
        self.memberships
            .write()
            .expect("lock poisoned")
            .entry(user)
            .or_default()
            .push((group_library, joined_at));
    }
}

impl Default for MemoryGroupDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl GroupDirectory for MemoryGroupDirectory {
    fn user_groups(&self, user: UserId) -> Vec<LibraryId> {
        self.memberships
            .read()
            .expect("lock poisoned")
            .get(&user)
            .map(|groups| groups.iter().map(|(lib, _)| *lib).collect())
            .unwrap_or_default()
    }

    fn joined_since(&self, user: UserId, since: ServerTimestamp) -> Vec<LibraryId> {
        self.memberships
            .read()
            .expect("lock poisoned")
            .get(&user)
            .map(|groups| {
                groups
                    .iter()
                    .filter(|(_, joined_at)| *joined_at > since)
                    .map(|(lib, _)| *lib)
                    .collect()
            })
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn joined_since_is_strictly_after() {
        let dir = MemoryGroupDirectory::new();
        let user = UserId(1);
        let lib = LibraryId::new(10).unwrap();
        dir.add_member(user, lib, ServerTimestamp::new(100, 0));

        assert_eq!(dir.joined_since(user, ServerTimestamp::new(99, 999)), vec![lib]);
        assert!(dir.joined_since(user, ServerTimestamp::new(100, 0)).is_empty());
        assert_eq!(dir.user_groups(user), vec![lib]);
    }
}
