//! Versioned data objects: items, collections, saved searches, and
//! relations, together with the creator and tag side tables they share.
//!
//! Each store wraps an [`core::ObjectCore`] that handles key→id resolution,
//! row caching, version checks, and batched shard writes, and layers its own
//! record schema, validation, and permission checks on top. Item saves go
//! through the wire-payload validator and the content-addressed value store;
//! searches over items combine stored metadata with an optional full-text
//! index.

pub mod collections;
pub mod core;
pub mod creators;
pub mod error;
pub mod items;
pub mod merge;
pub mod query;
pub mod record;
pub mod relations;
pub mod searches;
pub mod tags;

pub use collections::{Collection, CollectionStore};
pub use self::core::ObjectCore;
pub use creators::CreatorStore;
pub use error::{DataError, DataResult};
pub use items::{DeferredParts, Item, ItemStore, SaveOutcome};
pub use query::{
    search, EmptyPlacement, OutputFormat, SearchParams, SearchResults, SortDirection, SortField,
    TagFilter,
};
pub use record::{
    AttachmentData, CollectionRecord, CreatorRecord, CreatorRef, ItemRecord, RelationRecord,
    SavedSearchRecord, SearchCondition, TagRecord, TagValue,
};
pub use relations::{Relation, RelationStore};
pub use searches::{SavedSearch, SavedSearchStore};
pub use tags::TagStore;
