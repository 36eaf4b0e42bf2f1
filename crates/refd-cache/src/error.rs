use refd_types::{LibraryId, ObjectId, ObjectKey, ObjectKind};

/// Errors from the caching layers.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Registering a `(library, key)` pair that already maps to a different
    /// id. This is the duplicate-key collision detector: it indicates a bug
    /// in create paths, not a transient condition.
    #[error("{kind} {library}/{key} already cached with id {existing}, refusing to register {incoming}")]
    IdCollision {
        kind: ObjectKind,
        library: LibraryId,
        key: ObjectKey,
        existing: ObjectId,
        incoming: ObjectId,
    },

    /// A distributed-cache entry failed to decode. Treated as a miss by the
    /// resolver, surfaced only when decoding our own writes fails.
    #[error("cache entry codec error: {0}")]
    Codec(String),

    /// The durable store failed while (re)populating a cache.
    #[error(transparent)]
    Store(#[from] refd_store::StoreError),
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
