use std::sync::Arc;

use refd_types::Library;
use tracing::debug;

use crate::context::{AccessContext, Capability};
use crate::directory::{GroupAccess, PrivacyDirectory};
use crate::error::{GateError, GateResult};

/// The per-object facts an edit check needs.
#[derive(Clone, Copy, Debug)]
pub struct EditTarget {
    /// Attachment items with a stored file need file-edit rights in groups.
    pub imported_attachment: bool,
}

impl EditTarget {
    pub fn plain() -> Self {
        Self {
            imported_attachment: false,
        }
    }

    pub fn imported_attachment() -> Self {
        Self {
            imported_attachment: true,
        }
    }
}

/// Evaluates access and edit rights against explicit contexts.
pub struct PermissionGate {
    privacy: Arc<dyn PrivacyDirectory>,
    groups: Arc<dyn GroupAccess>,
}

impl PermissionGate {
    pub fn new(privacy: Arc<dyn PrivacyDirectory>, groups: Arc<dyn GroupAccess>) -> Self {
        Self { privacy, groups }
    }

    /// May the caller exercise `capability` on `library`?
    ///
    /// Order of precedence: super-user, explicit grant, all-groups grant
    /// (group libraries with group read access), then the anonymous privacy
    /// fallback. `Files` never falls back to privacy settings.
    pub fn can_access(
        &self,
        ctx: &AccessContext,
        library: &Library,
        capability: Capability,
    ) -> bool {
        if ctx.is_super() {
            return true;
        }
        if ctx.has_grant(library.id, capability) {
            return true;
        }
        if library.is_group() && ctx.has_all_groups_grant() {
            if let Some(user) = ctx.user() {
                if self.groups.user_can_read(user, library.id) {
                    return true;
                }
            }
        }
        if !ctx.is_anonymous() {
            return false;
        }
        let privacy = self.privacy.privacy(library.id);
        let allowed = match capability {
            Capability::Library => privacy.publish_library,
            Capability::Notes => privacy.publish_notes,
            Capability::Files => false,
        };
        if allowed {
            debug!(library = %library.id, ?capability, "anonymous access via privacy settings");
        }
        allowed
    }

    /// May the caller modify an object in `library`?
    ///
    /// User libraries are editable only by their owner. Group libraries
    /// require member edit rights, and imported attachments additionally
    /// require file-edit rights. Contexts without a user (super-user and
    /// internal callers) pass.
    pub fn is_editable(&self, ctx: &AccessContext, library: &Library, target: EditTarget) -> bool {
        if ctx.is_super() {
            return true;
        }
        let Some(user) = ctx.user() else {
            return !ctx.is_anonymous();
        };
        if library.is_group() {
            if !self.groups.user_can_edit(user, library.id) {
                return false;
            }
            if target.imported_attachment && !self.groups.user_can_edit_files(user, library.id) {
                return false;
            }
            return true;
        }
        library.owner == Some(user)
    }

    /// [`Self::is_editable`] as a fallible check for mutation paths.
    pub fn edit_check(
        &self,
        ctx: &AccessContext,
        library: &Library,
        target: EditTarget,
    ) -> GateResult<()> {
        if self.is_editable(ctx, library, target) {
            Ok(())
        } else {
            Err(GateError::PermissionDenied {
                library: library.id,
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::directory::{LibraryPrivacy, MemoryGroupAccess, MemoryPrivacyDirectory};
    use refd_types::{LibraryId, UserId};

    fn gate() -> (PermissionGate, Arc<MemoryPrivacyDirectory>, Arc<MemoryGroupAccess>) {
        let privacy = Arc::new(MemoryPrivacyDirectory::new());
        let groups = Arc::new(MemoryGroupAccess::new());
        (
            PermissionGate::new(privacy.clone(), groups.clone()),
            privacy,
            groups,
        )
    }

    fn user_lib(id: i64, owner: i64) -> Library {
        Library::user(LibraryId::new(id).unwrap(), UserId(owner))
    }

    fn group_lib(id: i64) -> Library {
        Library::group(LibraryId::new(id).unwrap())
    }

    #[test]
    fn super_user_passes_everything() {
        let (gate, _, _) = gate();
        let ctx = AccessContext::super_user();
        let lib = user_lib(1, 10);
        for cap in [Capability::Library, Capability::Notes, Capability::Files] {
            assert!(gate.can_access(&ctx, &lib, cap));
        }
        assert!(gate.is_editable(&ctx, &lib, EditTarget::plain()));
    }

    #[test]
    fn explicit_grant_is_honored() {
        let (gate, _, _) = gate();
        let lib = user_lib(1, 10);
        let ctx = AccessContext::for_user(UserId(2)).grant(lib.id, Capability::Library);
        assert!(gate.can_access(&ctx, &lib, Capability::Library));
        assert!(!gate.can_access(&ctx, &lib, Capability::Notes));
    }

    #[test]
    fn all_groups_grant_needs_group_read_access() {
        let (gate, _, groups) = gate();
        let readable = group_lib(20);
        let closed = group_lib(21);
        groups.add_reader(readable.id, UserId(5));

        let ctx = AccessContext::for_user(UserId(5)).grant_all_groups();
        assert!(gate.can_access(&ctx, &readable, Capability::Library));
        assert!(!gate.can_access(&ctx, &closed, Capability::Library));
    }

    #[test]
    fn all_groups_grant_ignores_user_libraries() {
        let (gate, _, _) = gate();
        let lib = user_lib(1, 10);
        let ctx = AccessContext::for_user(UserId(5)).grant_all_groups();
        assert!(!gate.can_access(&ctx, &lib, Capability::Library));
    }

    #[test]
    fn anonymous_falls_back_to_privacy() {
        let (gate, privacy, _) = gate();
        let lib = user_lib(1, 10);
        privacy.set(
            lib.id,
            LibraryPrivacy {
                publish_library: true,
                publish_notes: false,
            },
        );
        let ctx = AccessContext::anonymous();
        assert!(gate.can_access(&ctx, &lib, Capability::Library));
        assert!(!gate.can_access(&ctx, &lib, Capability::Notes));
    }

    #[test]
    fn files_never_anonymous() {
        let (gate, privacy, _) = gate();
        let lib = user_lib(1, 10);
        privacy.set(
            lib.id,
            LibraryPrivacy {
                publish_library: true,
                publish_notes: true,
            },
        );
        assert!(!gate.can_access(&AccessContext::anonymous(), &lib, Capability::Files));
    }

    #[test]
    fn authenticated_user_does_not_fall_back_to_privacy() {
        let (gate, privacy, _) = gate();
        let lib = user_lib(1, 10);
        privacy.set(
            lib.id,
            LibraryPrivacy {
                publish_library: true,
                publish_notes: true,
            },
        );
        let ctx = AccessContext::for_user(UserId(2));
        assert!(!gate.can_access(&ctx, &lib, Capability::Library));
    }

    #[test]
    fn user_library_editable_only_by_owner() {
        let (gate, _, _) = gate();
        let lib = user_lib(1, 10);
        assert!(gate.is_editable(
            &AccessContext::for_user(UserId(10)),
            &lib,
            EditTarget::plain()
        ));
        assert!(!gate.is_editable(
            &AccessContext::for_user(UserId(11)),
            &lib,
            EditTarget::plain()
        ));
    }

    #[test]
    fn group_edit_requires_editor_role() {
        let (gate, _, groups) = gate();
        let lib = group_lib(20);
        groups.add_reader(lib.id, UserId(5));
        groups.add_editor(lib.id, UserId(6));

        let reader = AccessContext::for_user(UserId(5));
        let editor = AccessContext::for_user(UserId(6));
        assert!(!gate.is_editable(&reader, &lib, EditTarget::plain()));
        assert!(gate.is_editable(&editor, &lib, EditTarget::plain()));
    }

    #[test]
    fn imported_attachment_needs_file_edit_rights() {
        let (gate, _, groups) = gate();
        let lib = group_lib(20);
        groups.add_editor(lib.id, UserId(6));
        groups.add_file_editor(lib.id, UserId(7));

        let editor = AccessContext::for_user(UserId(6));
        let file_editor = AccessContext::for_user(UserId(7));
        assert!(gate.is_editable(&editor, &lib, EditTarget::plain()));
        assert!(!gate.is_editable(&editor, &lib, EditTarget::imported_attachment()));
        assert!(gate.is_editable(&file_editor, &lib, EditTarget::imported_attachment()));
    }

    #[test]
    fn edit_check_surfaces_permission_denied() {
        let (gate, _, _) = gate();
        let lib = user_lib(1, 10);
        let err = gate
            .edit_check(
                &AccessContext::for_user(UserId(11)),
                &lib,
                EditTarget::plain(),
            )
            .unwrap_err();
        assert!(matches!(err, GateError::PermissionDenied { library } if library == lib.id));
    }
}
