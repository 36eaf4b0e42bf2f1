//! Durable storage contract for the refd data layer.
//!
//! The store is organized around shards: each library's rows live on exactly
//! one shard, located by the [`ShardLocator`]. A shard holds per-kind row
//! tables keyed by `(library, key)` unique / numeric id primary, plus a
//! tombstone log for sync delete detection.
//!
//! Mutations travel as [`WriteBatch`]es: an ordered list of operations
//! applied atomically on one shard. That batch is the transaction scope:
//! a cascading delete is one batch, and either all of it lands or none does.
//! Cross-shard operations are never transactional; callers fan out one batch
//! or query per shard and treat any shard failure as fatal for the request.
//!
//! All implementations must satisfy these invariants:
//! - `(kind, library, key)` maps to at most one row, and a row's id never
//!   changes. Upserting a key with a different id is a consistency error.
//! - Ids come from [`ShardBackend::allocate_id`] and are never reused.
//! - Reads of absent rows return empty results, never errors.

pub mod error;
pub mod memory;
pub mod ops;
pub mod row;
pub mod shard;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryBackend;
pub use ops::{WriteBatch, WriteOp};
pub use row::{ChangeCursor, PrimaryRow, StoredRecord, Tombstone};
pub use shard::{ShardId, ShardLocator};
pub use traits::ShardBackend;
