use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Tuning knobs for the change tracker.
#[derive(Clone, Copy, Debug, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Wall-clock limit for the whole shard fan-out of one `changed_since`
    /// call. Checked between shard batches; an overrun fails the request
    /// rather than returning a partial result.
    pub shard_deadline: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            shard_deadline: Duration::from_secs(10),
        }
    }
}
