//! The structured error surface returned by fallible index operations.

use thiserror::Error;

/// Everything that can go wrong while building, updating, or querying a
/// [`crate::index::SearchIndex`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SearchError {
    #[error("document is missing required fields")]
    MissingFields,

    #[error("document has no id")]
    MissingId,

    #[error("a document with this id is already indexed")]
    DuplicateId,

    #[error("no document with this id is indexed")]
    NotIndexed,

    #[error("invalid key")]
    InvalidKey,

    #[error("prefix does not extend the view it was requested from")]
    InvalidPrefix,

    #[error("unknown search option: {0}")]
    UnknownOption(String),

    #[error("serialized index is not compatible with this version")]
    IncompatibleSerialization,

    #[error("remove_all requires either a predicate or an explicit id list, not null")]
    RemoveAllWithNullArg,
}

pub type Result<T> = std::result::Result<T, SearchError>;
