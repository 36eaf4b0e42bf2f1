//! Core types for the refd data layer.
//!
//! Everything above this crate, stores and caches and the merge engine alike, speaks in
//! terms of these identifiers: a [`LibraryId`] names a tenant, an
//! [`ObjectKey`] is the public 8-character identifier of an object within a
//! library, an [`ObjectId`] is its internal numeric id, and an
//! [`ObjectVersion`] is the per-object optimistic-concurrency counter.
//!
//! The crate also carries the type vocabularies (item types, creator types,
//! item fields) that JSON validation resolves names against, and the
//! per-kind configuration table that replaces name-templated table lookups.

pub mod creator;
pub mod error;
pub mod key;
pub mod kind;
pub mod library;
pub mod timestamp;
pub mod version;
pub mod vocab;

pub use creator::{CreatorData, NameMode};
pub use error::TypeError;
pub use key::{ObjectId, ObjectKey};
pub use kind::{KindConfig, ObjectKind};
pub use library::{Library, LibraryId, LibraryKind, UserId};
pub use timestamp::ServerTimestamp;
pub use version::ObjectVersion;
pub use vocab::{CreatorTypeId, FieldId, ItemTypeId, LinkMode, TagType, Vocabulary};
