/// Schema and cross-field validation failures.
///
/// All of these are caller errors (InvalidInput at the API boundary), with
/// messages specific enough to fix the payload.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WireError {
    #[error("unknown property '{0}'")]
    UnknownProperty(String),

    #[error("'{0}' property not provided")]
    MissingProperty(&'static str),

    #[error("invalid value for property '{name}': {reason}")]
    InvalidProperty { name: &'static str, reason: String },

    #[error("'{0}' is not a valid item type")]
    UnknownItemType(String),

    #[error("child item must be a note or attachment, not '{0}'")]
    InvalidChildType(String),

    #[error("only file attachments and PDF imports may be top-level items")]
    TopLevelAttachment,

    #[error("'{0}' is not a valid creator type for this item type")]
    InvalidCreatorType(String),

    #[error("creator cannot have both 'name' and 'firstName'/'lastName' properties")]
    CreatorNameExclusivity,

    #[error("creator name cannot be empty")]
    EmptyCreator,

    #[error("attachment property '{0}' is not valid for this item type")]
    AttachmentOnlyProperty(&'static str),

    #[error("property '{0}' is valid only for imported attachments")]
    ImportedOnlyProperty(&'static str),

    #[error("link mode cannot be changed on an existing attachment")]
    LinkModeChange,

    #[error("property '{0}' cannot be changed directly in group libraries")]
    ServerManagedProperty(&'static str),
}

/// Result alias for payload validation.
pub type WireResult<T> = Result<T, WireError>;
