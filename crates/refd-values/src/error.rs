/// Errors from the content-addressed value store.
#[derive(Debug, thiserror::Error)]
pub enum ValueError {
    /// A value longer than the storage column allows.
    #[error("data too long for value storage ({len} > {max})")]
    TooLong { len: usize, max: usize },

    /// Fewer values resolved than hashes requested, even after checking the
    /// document-store primary. Indicates data loss or corruption; fatal.
    #[error("value count mismatch: found {found} of {expected} hashes")]
    CountMismatch { found: usize, expected: usize },

    /// The document store failed.
    #[error("document store error: {0}")]
    Document(String),
}

/// Result alias for value-store operations.
pub type ValueResult<T> = Result<T, ValueError>;
