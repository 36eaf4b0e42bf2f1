//! Content-addressed storage for large item field values.
//!
//! Field values are deduplicated corpus-wide by content digest: many items
//! (and many fields) may reference one stored value. Reads and writes go
//! through three layers: a process-local map, the distributed cache, and a
//! document store with a primary and at least one read replica.
//!
//! [`ValueStore::put`] is idempotent write-through: it inserts into the
//! document store only on a true miss across all layers.
//! [`ValueStore::get_many`] tolerates replica lag by retrying stragglers on
//! the primary; a count mismatch after that pass is a fatal consistency
//! error, not a retry.

pub mod document;
pub mod error;
pub mod store;

pub use document::{DocumentStore, MemoryDocumentStore};
pub use error::{ValueError, ValueResult};
pub use store::{value_hash, ValueStore, MAX_VALUE_LEN};
