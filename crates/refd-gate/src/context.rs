use std::collections::HashMap;

use refd_types::{LibraryId, UserId};

/// One access capability on a library.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Capability {
    /// Read the library's objects.
    Library,
    /// Read item notes.
    Notes,
    /// Read and write attachment files.
    Files,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct Grants {
    library: bool,
    notes: bool,
    files: bool,
}

impl Grants {
    fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Library => self.library,
            Capability::Notes => self.notes,
            Capability::Files => self.files,
        }
    }

    fn set(&mut self, capability: Capability) {
        match capability {
            Capability::Library => self.library = true,
            Capability::Notes => self.notes = true,
            Capability::Files => self.files = true,
        }
    }
}

/// The caller's standing for one request.
///
/// Built once from the caller's credentials and threaded explicitly through
/// every gate check. Grants are assumed consistent with group membership:
/// a grant on a group library is honored without re-checking membership.
#[derive(Clone, Debug)]
pub struct AccessContext {
    user: Option<UserId>,
    anonymous: bool,
    super_user: bool,
    grants: HashMap<LibraryId, Grants>,
    /// Grant covering all group libraries whose group the user can read.
    all_groups_library: bool,
}

impl AccessContext {
    /// Context for an authenticated user with no grants yet.
    pub fn for_user(user: UserId) -> Self {
        Self {
            user: Some(user),
            anonymous: false,
            super_user: false,
            grants: HashMap::new(),
            all_groups_library: false,
        }
    }

    /// Context for an unauthenticated caller. Access falls back to each
    /// library's privacy settings.
    pub fn anonymous() -> Self {
        Self {
            user: None,
            anonymous: true,
            super_user: false,
            grants: HashMap::new(),
            all_groups_library: false,
        }
    }

    /// Context that passes every check.
    pub fn super_user() -> Self {
        Self {
            user: None,
            anonymous: false,
            super_user: true,
            grants: HashMap::new(),
            all_groups_library: false,
        }
    }

    /// Grant one capability on one library.
    pub fn grant(mut self, library: LibraryId, capability: Capability) -> Self {
        self.grants.entry(library).or_default().set(capability);
        self
    }

    /// Grant all three capabilities on one library.
    pub fn grant_all(self, library: LibraryId) -> Self {
        self.grant(library, Capability::Library)
            .grant(library, Capability::Notes)
            .grant(library, Capability::Files)
    }

    /// Grant library access to every group the user can read.
    pub fn grant_all_groups(mut self) -> Self {
        self.all_groups_library = true;
        self
    }

    pub fn user(&self) -> Option<UserId> {
        self.user
    }

    pub fn is_anonymous(&self) -> bool {
        self.anonymous
    }

    pub fn is_super(&self) -> bool {
        self.super_user
    }

    pub(crate) fn has_grant(&self, library: LibraryId, capability: Capability) -> bool {
        self.grants
            .get(&library)
            .is_some_and(|g| g.has(capability))
    }

    pub(crate) fn has_all_groups_grant(&self) -> bool {
        self.all_groups_library
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn grants_accumulate_per_library() {
        let lib_a = LibraryId::new(1).unwrap();
        let lib_b = LibraryId::new(2).unwrap();
        let ctx = AccessContext::for_user(UserId(5))
            .grant(lib_a, Capability::Library)
            .grant(lib_a, Capability::Notes);
        assert!(ctx.has_grant(lib_a, Capability::Library));
        assert!(ctx.has_grant(lib_a, Capability::Notes));
        assert!(!ctx.has_grant(lib_a, Capability::Files));
        assert!(!ctx.has_grant(lib_b, Capability::Library));
    }

    #[test]
    fn grant_all_covers_every_capability() {
        let lib = LibraryId::new(1).unwrap();
        let ctx = AccessContext::for_user(UserId(5)).grant_all(lib);
        for cap in [Capability::Library, Capability::Notes, Capability::Files] {
            assert!(ctx.has_grant(lib, cap));
        }
    }
}
