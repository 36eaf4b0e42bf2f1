use std::time::Duration;

/// Errors from change-tracking queries.
#[derive(Debug, thiserror::Error)]
pub enum SyncError {
    /// A shard query failed; the whole request is abandoned rather than
    /// returning a partial view the client would commit a cursor against.
    #[error(transparent)]
    Store(#[from] refd_store::StoreError),

    /// The shard fan-out exceeded its deadline.
    #[error("shard fan-out exceeded deadline of {0:?}")]
    DeadlineExceeded(Duration),
}

/// Result alias for sync operations.
pub type SyncResult<T> = Result<T, SyncError>;
