/// Errors from parsing or validating core types.
#[derive(Debug, thiserror::Error)]
pub enum TypeError {
    /// An object key that is not 8 uppercase-alphanumeric characters.
    #[error("invalid object key '{0}'")]
    InvalidKey(String),

    /// A library id that is not a positive integer.
    #[error("library id '{0}' must be a positive integer")]
    InvalidLibraryId(i64),

    /// A numeric object id that is not a positive integer.
    #[error("object id '{0}' must be a positive integer")]
    InvalidObjectId(i64),

    /// A timestamp cursor that could not be parsed.
    #[error("invalid timestamp cursor '{0}'")]
    InvalidTimestamp(String),

    /// A name that does not resolve in a vocabulary.
    #[error("'{name}' is not a valid {vocabulary}")]
    UnknownName { vocabulary: &'static str, name: String },

    /// A numeric id that does not resolve in a vocabulary.
    #[error("{id} is not a valid {vocabulary} id")]
    UnknownId { vocabulary: &'static str, id: u16 },
}

/// Result alias for type-level operations.
pub type TypeResult<T> = Result<T, TypeError>;
