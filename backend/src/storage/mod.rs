//! Storage collaborator contract
//!
//! The connection resolver and the filter compiler only talk to storage through the
//! [`Storage`] trait. Backends receive a [`NormalizedFilter`] plus sort, window and
//! seek arguments and return raw rows keyed by internal attribute names.

pub mod memory;
pub mod sql;
#[cfg(feature = "sqlite")]
pub mod sqlite;

use async_trait::async_trait;
use serde_json::Value;
use thiserror::Error;

use crate::connection::{Cursor, OrderBy, SeekDirection};
use crate::context::RequestContext;
use crate::filter::NormalizedFilter;
use crate::model::EntityDescriptor;

pub use memory::MemoryStorage;
#[cfg(feature = "sqlite")]
pub use sqlite::SqliteStorage;

/// A raw storage row keyed by internal attribute name
pub type Row = serde_json::Map<String, Value>;

/// Errors raised by storage backends
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage has no data for entity '{0}'")]
    UnknownEntity(String),

    #[error("unsupported by this storage backend: {0}")]
    Unsupported(String),

    #[error("failed to decode column '{column}': {reason}")]
    Decode { column: String, reason: String },

    #[cfg(feature = "sqlite")]
    #[error("database error: {0}")]
    Sqlx(#[from] sqlx::Error),

    #[error("{0}")]
    Backend(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Arguments of a single `find` call
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FindArgs {
    pub filter: NormalizedFilter,
    /// Sort order using internal attribute names, ending in a unique attribute
    pub order_by: Vec<OrderBy>,
    pub first: Option<i64>,
    pub last: Option<i64>,
    pub offset: Option<i64>,
    /// Only rows strictly after this cursor
    pub after: Option<Cursor>,
    /// Only rows strictly before this cursor
    pub before: Option<Cursor>,
    /// Restrict returned columns; `None` returns every attribute
    pub projection: Option<Vec<String>>,
    /// Set for internal lookups (deep filters) that constrain rather than expose data
    pub skip_permissions: bool,
}

impl FindArgs {
    pub fn filtered(filter: NormalizedFilter) -> Self {
        Self {
            filter,
            ..Default::default()
        }
    }

    /// Filter including the parent constraint, without cursor seeks
    pub fn base_filter(&self, parent: Option<&ParentConnection>) -> NormalizedFilter {
        match parent {
            Some(parent) => self.filter.clone().and_also(parent.filter()),
            None => self.filter.clone(),
        }
    }

    /// Filter a backend must apply for `find`: base filter plus `after`/`before` seeks
    pub fn effective_filter(&self, parent: Option<&ParentConnection>) -> NormalizedFilter {
        let mut filter = self.base_filter(parent);
        if let Some(after) = &self.after {
            filter = filter.and_also(after.seek_filter(&self.order_by, SeekDirection::After));
        }
        if let Some(before) = &self.before {
            filter = filter.and_also(before.seek_filter(&self.order_by, SeekDirection::Before));
        }
        filter
    }
}

/// Restricts a nested connection to the rows that reference a parent row
#[derive(Debug, Clone, PartialEq)]
pub struct ParentConnection {
    /// Internal name of the referencing attribute on the child entity
    pub attribute: String,
    /// Primary key of the parent row
    pub value: Value,
}

impl ParentConnection {
    pub fn new(attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            attribute: attribute.into(),
            value: value.into(),
        }
    }

    pub fn filter(&self) -> NormalizedFilter {
        NormalizedFilter::equals(self.attribute.clone(), self.value.clone())
    }
}

/// Page flags only storage can compute
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StoragePageInfo {
    pub has_previous_page: bool,
    pub has_next_page: bool,
}

/// Result of a `find` call: rows in requested order plus page flags
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StoragePage {
    pub rows: Vec<Row>,
    pub page_info: StoragePageInfo,
}

/// Storage engine contract
#[async_trait]
pub trait Storage: Send + Sync {
    /// Rows matching `args`, windowed and ordered
    async fn find(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<StoragePage, StorageError>;

    /// Number of rows matching the filter and parent constraint, ignoring window and seeks
    async fn count(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<u64, StorageError>;

    /// Single row by primary key
    async fn find_one(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        context: &RequestContext,
    ) -> Result<Option<Row>, StorageError>;
}
