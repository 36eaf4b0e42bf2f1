//! Change tracking for sync clients: which objects changed since a cursor,
//! and which were deleted.
//!
//! [`ChangeTracker::changed_since`] answers for one personal library, and
//! optionally for all of the user's group libraries. Group libraries are
//! grouped by shard and queried one batch per shard; a group joined after
//! the cursor is included wholesale, since its pre-join content would
//! otherwise never reach the client. One failed shard fails the whole
//! request, so clients never advance their cursor past unseen changes.

pub mod config;
pub mod error;
pub mod groups;
pub mod tracker;

pub use config::SyncConfig;
pub use error::{SyncError, SyncResult};
pub use groups::{GroupDirectory, MemoryGroupDirectory};
pub use tracker::ChangeTracker;
