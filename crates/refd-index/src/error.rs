/// Errors from the index queue and query paths.
#[derive(Debug, thiserror::Error)]
pub enum IndexError {
    /// The queue transport rejected the notification.
    #[error("index queue unavailable: {0}")]
    QueueUnavailable(String),

    /// The search backend failed a query.
    #[error("search backend error: {0}")]
    Backend(String),
}

/// Result alias for index operations.
pub type IndexResult<T> = Result<T, IndexError>;
