use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use refd_types::LibraryId;

/// Identifier of a physical storage partition.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ShardId(pub u16);

impl fmt::Debug for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ShardId({})", self.0)
    }
}

impl fmt::Display for ShardId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "shard{}", self.0)
    }
}

/// Maps a library to the shard holding its rows.
///
/// A pure, side-effect-free lookup: explicit assignments first, then a
/// stable modulo spread over the configured shard list. Results are safe to
/// cache for the life of the process because libraries never migrate within
/// the scope of this layer.
#[derive(Clone, Debug)]
pub struct ShardLocator {
    shards: Vec<ShardId>,
    assignments: HashMap<LibraryId, ShardId>,
}

impl ShardLocator {
    /// A locator spreading libraries over the given shards.
    ///
    /// # Panics
    /// Panics if `shards` is empty; a deployment always has at least one.
    pub fn new(shards: Vec<ShardId>) -> Self {
        assert!(!shards.is_empty(), "shard list cannot be empty");
        Self { shards, assignments: HashMap::new() }
    }

    /// A single-shard locator, the common test configuration.
    pub fn single(shard: ShardId) -> Self {
        Self::new(vec![shard])
    }

    /// Pin a library to a specific shard, overriding the default spread.
    pub fn assign(&mut self, library: LibraryId, shard: ShardId) {
        self.assignments.insert(library, shard);
    }

    /// The shard holding the given library's rows.
    pub fn shard_for(&self, library: LibraryId) -> ShardId {
        if let Some(&shard) = self.assignments.get(&library) {
            return shard;
        }
        let index = (library.get() as u64 % self.shards.len() as u64) as usize;
        self.shards[index]
    }

    /// All configured shards.
    pub fn shards(&self) -> &[ShardId] {
        &self.shards
    }
}
