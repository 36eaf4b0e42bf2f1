use refd_types::LibraryId;

/// Errors from permission checks.
#[derive(Debug, thiserror::Error)]
pub enum GateError {
    /// The caller may not perform the requested operation on the library.
    #[error("access denied to library {library}")]
    PermissionDenied { library: LibraryId },
}

/// Result alias for gate operations.
pub type GateResult<T> = Result<T, GateError>;
