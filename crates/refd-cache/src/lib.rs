//! Caching layers between the object stores and durable storage.
//!
//! Two services live here, both constructed once per process and injected
//! into the stores that need them (no ambient static state):
//!
//! - [`IdentityResolver`]: the key⇄id map per `(kind, library)`, backed by
//!   a process-local shadow of a distributed cache entry. Its re-verify-once
//!   rule is the correctness guard against stale distributed entries
//!   reporting false absence.
//! - [`PrimaryDataCache`]: per-library snapshots of the lightweight primary
//!   columns, indexed by id and by key with both indices aliasing the same
//!   record.
//!
//! The [`DistributedCache`] contract is deliberately lossy: entries may
//! expire or vanish at any time, and a `set` may silently fail. Consumers
//! must tolerate staleness; the resolver's re-verify rule exists for exactly
//! that reason.

pub mod distributed;
pub mod error;
pub mod identity;
pub mod primary;

pub use distributed::{DistributedCache, MemoryCache};
pub use error::{CacheError, CacheResult};
pub use identity::IdentityResolver;
pub use primary::PrimaryDataCache;
