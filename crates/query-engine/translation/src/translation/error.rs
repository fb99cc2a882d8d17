//! Errors for translation.

/// How an error is reported to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    BadRequest,
    NotFound,
    ServerError,
}

/// A type for translation errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
    #[error("Resource not found for the segment '{0}'")]
    EntitySetNotFound(String),
    #[error("There was an invalid field in the $filter parameter")]
    InvalidFilterField(String),
    #[error("There was an invalid field in the $select parameter")]
    InvalidSelectField(String),
    #[error("There was an invalid field in the $orderby parameter")]
    InvalidOrderByField(String),
    #[error("Invalid $filter expression: {0}")]
    InvalidFilter(String),
    #[error("Invalid value '{value}' for the {option} parameter")]
    InvalidOptionValue { option: String, value: String },
    #[error("A skip token can only be provided in a query request against an entity set when the entity set has a paging limit set.")]
    SkipTokenNotSupported,
    #[error("apply=groupby can only be used with an aggregate custom entity")]
    GroupByNotSupported(String),
    #[error("The groupby fields must match the non-aggregate fields of the custom entity")]
    GroupByMismatch(Vec<String>),
    #[error("Invalid apply parameter '{0}'")]
    InvalidApply(String),
    #[error("The entity set {0} is read-only")]
    ReadOnlyEntitySet(String),
    #[error("Invalid key predicate '{0}'")]
    InvalidKey(String),
    #[error("The key property {0} must be supplied")]
    MissingKey(String),
    #[error("Invalid value for property {property}: {value}")]
    InvalidPropertyValue { property: String, value: String },
    #[error("The property {0} does not exist")]
    UnknownProperty(String),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::EntitySetNotFound(_) => ErrorKind::NotFound,
            Error::SkipTokenNotSupported => ErrorKind::ServerError,
            _ => ErrorKind::BadRequest,
        }
    }
}
