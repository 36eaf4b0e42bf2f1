use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

use refd_store::{ChangeCursor, ShardBackend, ShardId, ShardLocator, Tombstone};
use refd_types::{Library, LibraryId, ObjectId, ObjectKind, ServerTimestamp};
use tracing::debug;

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::groups::GroupDirectory;

/// Answers "what changed since" across a user's libraries.
pub struct ChangeTracker {
    backend: Arc<dyn ShardBackend>,
    locator: ShardLocator,
    groups: Arc<dyn GroupDirectory>,
    config: SyncConfig,
}

impl ChangeTracker {
    pub fn new(
        backend: Arc<dyn ShardBackend>,
        locator: ShardLocator,
        groups: Arc<dyn GroupDirectory>,
        config: SyncConfig,
    ) -> Self {
        Self {
            backend,
            locator,
            groups,
            config,
        }
    }

    /// Ids of objects modified after `cursor`, keyed by library.
    ///
    /// The personal library is queried on its own shard. With
    /// `include_groups`, the owner's group libraries are bucketed by shard
    /// and queried one batch per shard. Groups joined after a timestamp
    /// cursor are included wholesale: their content predates the join and
    /// would never match the cursor. Version cursors are per-library
    /// counters with no cross-library meaning, so no join test applies.
    ///
    /// Ids are unordered within a library. Any shard failure, or a fan-out
    /// overrunning [`SyncConfig::shard_deadline`], fails the whole request.
    pub fn changed_since(
        &self,
        kind: ObjectKind,
        library: &Library,
        cursor: ChangeCursor,
        include_groups: bool,
    ) -> SyncResult<BTreeMap<LibraryId, Vec<ObjectId>>> {
        let started = Instant::now();
        let mut updated: BTreeMap<LibraryId, Vec<ObjectId>> = BTreeMap::new();

        let own_shard = self.locator.shard_for(library.id);
        for (lib, id) in
            self.backend
                .changed_since(own_shard, kind, &[library.id], cursor)?
        {
            updated.entry(lib).or_default().push(id);
        }

        if !include_groups {
            return Ok(updated);
        }
        let Some(owner) = library.owner else {
            return Ok(updated);
        };

        let group_libs = self.groups.user_groups(owner);
        if group_libs.is_empty() {
            return Ok(updated);
        }
        let joined = match cursor {
            ChangeCursor::Timestamp(since) => self.groups.joined_since(owner, since),
            ChangeCursor::Version(_) => Vec::new(),
        };

        let mut by_shard: BTreeMap<ShardId, Vec<LibraryId>> = BTreeMap::new();
        for lib in &group_libs {
            by_shard
                .entry(self.locator.shard_for(*lib))
                .or_default()
                .push(*lib);
        }
        debug!(
            shards = by_shard.len(),
            groups = group_libs.len(),
            "fanning out change query"
        );

        for (shard, libs) in by_shard {
            if started.elapsed() > self.config.shard_deadline {
                return Err(SyncError::DeadlineExceeded(self.config.shard_deadline));
            }
            let cursor_libs: Vec<LibraryId> = libs
                .iter()
                .copied()
                .filter(|lib| !joined.contains(lib))
                .collect();
            if !cursor_libs.is_empty() {
                for (lib, id) in self
                    .backend
                    .changed_since(shard, kind, &cursor_libs, cursor)?
                {
                    updated.entry(lib).or_default().push(id);
                }
            }
            for lib in libs.iter().filter(|lib| joined.contains(lib)) {
                let ids: Vec<ObjectId> = self
                    .backend
                    .load_primary_rows(shard, kind, *lib)?
                    .into_iter()
                    .map(|row| row.id)
                    .collect();
                if !ids.is_empty() {
                    updated.insert(*lib, ids);
                }
            }
        }
        Ok(updated)
    }

    /// Delete-log entries for one library after `since`.
    pub fn tombstones_since(
        &self,
        library: LibraryId,
        since: ServerTimestamp,
    ) -> SyncResult<Vec<Tombstone>> {
        let shard = self.locator.shard_for(library);
        Ok(self.backend.tombstones_since(shard, library, since)?)
    }

    /// Total changed-object count across the user's libraries.
    pub fn count_updated(
        &self,
        kind: ObjectKind,
        library: &Library,
        cursor: ChangeCursor,
    ) -> SyncResult<usize> {
        let updated = self.changed_since(kind, library, cursor, true)?;
        Ok(updated.values().map(Vec::len).sum())
    }
}
