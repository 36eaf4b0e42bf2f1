//! Upload payload types and their validation.
//!
//! Incoming JSON is deserialized into typed payload structs, then validated
//! for cross-field legality before any merge. The schema is closed: every
//! property either maps to a struct field or, for item data fields, must
//! name a known field in the vocabulary. Anything else is rejected, never
//! ignored.
//!
//! Validation never touches storage. Facts about the existing object that
//! the rules need (new vs. existing, child vs. top-level, group library,
//! current attachment metadata) arrive in an explicit [`ItemContext`].

pub mod error;
pub mod payload;
pub mod validate;

pub use error::{WireError, WireResult};
pub use payload::{
    CollectionPayload, CreatorEntry, ItemPayload, ParentSpec, TagEntry, COLLECTION_NAME_MAX,
};
pub use validate::{validate_collection, AttachmentMeta, ItemContext, ItemValidator};
