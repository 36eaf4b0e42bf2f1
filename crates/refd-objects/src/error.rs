use refd_types::{LibraryId, ObjectKey, ObjectKind, ObjectVersion};

/// The unified error taxonomy of the object layer.
///
/// Reads of absent objects return empty results, not errors; `NotFound`
/// appears only when a payload references an object that must already
/// exist. `Consistency` failures indicate a bug or data corruption and are
/// never retried.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    /// Malformed identifier, schema violation, or illegal field value.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A referenced object that must exist does not.
    #[error("{kind} {library}/{key} not found")]
    NotFound {
        kind: ObjectKind,
        library: LibraryId,
        key: ObjectKey,
    },

    /// The presented version no longer matches the stored version.
    #[error(
        "version conflict on {library}/{key}: stored {stored}, presented {presented}"
    )]
    VersionConflict {
        library: LibraryId,
        key: ObjectKey,
        stored: ObjectVersion,
        presented: ObjectVersion,
    },

    /// The permission gate rejected the operation.
    #[error(transparent)]
    PermissionDenied(#[from] refd_gate::GateError),

    /// Cache/store disagreement or id collision. Fatal.
    #[error("consistency error: {0}")]
    Consistency(String),

    /// Durable storage failed.
    #[error(transparent)]
    Store(#[from] refd_store::StoreError),
}

impl From<refd_wire::WireError> for DataError {
    fn from(err: refd_wire::WireError) -> Self {
        DataError::InvalidInput(err.to_string())
    }
}

impl From<refd_types::TypeError> for DataError {
    fn from(err: refd_types::TypeError) -> Self {
        DataError::InvalidInput(err.to_string())
    }
}

impl From<refd_cache::CacheError> for DataError {
    fn from(err: refd_cache::CacheError) -> Self {
        match err {
            refd_cache::CacheError::Store(e) => DataError::Store(e),
            other => DataError::Consistency(other.to_string()),
        }
    }
}

impl From<refd_values::ValueError> for DataError {
    fn from(err: refd_values::ValueError) -> Self {
        match err {
            refd_values::ValueError::TooLong { .. } => DataError::InvalidInput(err.to_string()),
            other => DataError::Consistency(other.to_string()),
        }
    }
}

/// Result alias for object-layer operations.
pub type DataResult<T> = Result<T, DataError>;
