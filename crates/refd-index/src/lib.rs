//! Notification path between the object stores and the external search
//! index.
//!
//! Writes never wait on the index: after a save or delete the store calls
//! [`IndexNotifier::notify`], which enqueues an [`IndexOp`] and swallows any
//! enqueue failure after logging it. The index catches up out of band.
//!
//! Queries go the other way through the [`SearchIndex`] contract, which
//! returns `(library, key)` candidates for the store to hydrate. Candidates
//! that no longer exist in primary storage are the index lagging a delete;
//! hydration drops them.

pub mod error;
pub mod notify;
pub mod query;

pub use error::{IndexError, IndexResult};
pub use notify::{IndexNotifier, IndexOp, IndexQueue, MemoryIndexQueue, QueuedNotification};
pub use query::{MemorySearchIndex, SearchIndex};
