//! Error taxonomy for filter compilation and connection resolution
//!
//! Every filter-level error carries the dotted path of the filter location that
//! triggered it (e.g. `OR[1].author__filter`), so that errors in deeply nested
//! filters can be traced back to the offending key.

use thiserror::Error;

use crate::storage::StorageError;

/// Result alias used throughout the crate
pub type Result<T, E = QueryError> = std::result::Result<T, E>;

/// Errors raised while validating, compiling or resolving a connection query.
///
/// All variants except [`QueryError::Storage`] are client errors: the request is
/// rejected as a whole and nothing is partially applied.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("invalid filter key {key:?} at {path}")]
    InvalidFilterKey { key: String, path: String },

    #[error("unknown filter operator '{operator}' in key '{key}' at {path}")]
    UnknownFilterOperator {
        key: String,
        operator: String,
        path: String,
    },

    #[error("operator '{operator}' is not supported by attribute '{attribute}' at {path}")]
    UnsupportedFilterOperator {
        attribute: String,
        operator: String,
        path: String,
    },

    #[error("invalid filter at {path}: {reason}")]
    InvalidFilter { reason: String, path: String },

    #[error("invalid value for '{key}' at {path}: {reason}")]
    InvalidFilterValue {
        key: String,
        reason: String,
        path: String,
    },

    #[error("unknown filter attribute '{attribute}' on entity '{entity}' at {path}")]
    UnknownFilterAttribute {
        entity: String,
        attribute: String,
        path: String,
    },

    #[error("conflicting filter operators on attribute '{attribute}' at {path}")]
    ConflictingFilterOperators { attribute: String, path: String },

    #[error("only one pre-filter may be active on '{attribute}', got {} at {path}", names.join(", "))]
    AmbiguousPreFilter {
        attribute: String,
        names: Vec<String>,
        path: String,
    },

    #[error("unknown pre-filter '{name}' on entity '{entity}' at {path}")]
    UnknownPreFilter {
        entity: String,
        name: String,
        path: String,
    },

    #[error("`first` and `last` cannot be used together")]
    MutuallyExclusivePagination,

    #[error("`{argument}` must be between 0 and {max}, got {value}")]
    PageSizeOutOfRange {
        argument: &'static str,
        value: i64,
        max: i64,
    },

    #[error("`offset` must not be negative, got {value}")]
    InvalidOffset { value: i64 },

    #[error("invalid cursor: {reason}")]
    InvalidCursor { reason: String },

    #[error("unknown entity '{name}'")]
    UnknownEntity { name: String },

    #[error("unknown sort attribute '{attribute}' on entity '{entity}'")]
    UnknownSortAttribute { entity: String, attribute: String },

    #[error("lookup on '{entity}' is not permitted")]
    PermissionDenied { entity: String },

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl QueryError {
    pub(crate) fn invalid_cursor(reason: impl Into<String>) -> Self {
        QueryError::InvalidCursor {
            reason: reason.into(),
        }
    }

    /// Stable machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            QueryError::InvalidFilterKey { .. } => "INVALID_FILTER_KEY",
            QueryError::UnknownFilterOperator { .. } => "UNKNOWN_FILTER_OPERATOR",
            QueryError::UnsupportedFilterOperator { .. } => "UNSUPPORTED_FILTER_OPERATOR",
            QueryError::InvalidFilter { .. } => "INVALID_FILTER",
            QueryError::InvalidFilterValue { .. } => "INVALID_FILTER_VALUE",
            QueryError::UnknownFilterAttribute { .. } => "UNKNOWN_FILTER_ATTRIBUTE",
            QueryError::ConflictingFilterOperators { .. } => "CONFLICTING_FILTER_OPERATORS",
            QueryError::AmbiguousPreFilter { .. } => "AMBIGUOUS_PRE_FILTER",
            QueryError::UnknownPreFilter { .. } => "UNKNOWN_PRE_FILTER",
            QueryError::MutuallyExclusivePagination => "MUTUALLY_EXCLUSIVE_PAGINATION",
            QueryError::PageSizeOutOfRange { .. } => "PAGE_SIZE_OUT_OF_RANGE",
            QueryError::InvalidOffset { .. } => "INVALID_OFFSET",
            QueryError::InvalidCursor { .. } => "INVALID_CURSOR",
            QueryError::UnknownEntity { .. } => "UNKNOWN_ENTITY",
            QueryError::UnknownSortAttribute { .. } => "UNKNOWN_SORT_ATTRIBUTE",
            QueryError::PermissionDenied { .. } => "PERMISSION_DENIED",
            QueryError::Storage(_) => "STORAGE_ERROR",
        }
    }

    /// The dotted filter path, for errors raised inside a filter tree
    pub fn path(&self) -> Option<&str> {
        match self {
            QueryError::InvalidFilterKey { path, .. }
            | QueryError::UnknownFilterOperator { path, .. }
            | QueryError::UnsupportedFilterOperator { path, .. }
            | QueryError::InvalidFilter { path, .. }
            | QueryError::InvalidFilterValue { path, .. }
            | QueryError::UnknownFilterAttribute { path, .. }
            | QueryError::ConflictingFilterOperators { path, .. }
            | QueryError::AmbiguousPreFilter { path, .. }
            | QueryError::UnknownPreFilter { path, .. } => Some(path.as_str()),
            _ => None,
        }
    }

    /// Whether the error was caused by the request (4xx) rather than by storage (5xx)
    pub fn is_client_error(&self) -> bool {
        !matches!(self, QueryError::Storage(_))
    }
}
