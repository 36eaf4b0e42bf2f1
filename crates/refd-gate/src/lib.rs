//! Permission checks consulted before every read scoped to a library and
//! before every mutation.
//!
//! The caller's standing is an explicit [`AccessContext`] value threaded
//! through calls, never ambient state. A context carries per-library grants,
//! an optional all-groups grant, and one of three identities: a known user,
//! anonymous, or super-user (which bypasses every check).
//!
//! Anonymous callers fall back to the target library's privacy settings for
//! `Library` and `Notes` access; `Files` is never granted anonymously.

pub mod context;
pub mod directory;
pub mod error;
pub mod gate;

pub use context::{AccessContext, Capability};
pub use directory::{
    GroupAccess, LibraryPrivacy, MemoryGroupAccess, MemoryPrivacyDirectory, PrivacyDirectory,
};
pub use error::{GateError, GateResult};
pub use gate::{EditTarget, PermissionGate};
