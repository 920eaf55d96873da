//! filterql - filter compilation and connection resolution for entity-backed GraphQL APIs
//!
//! Clients send nested filter objects and Relay-style pagination arguments. This crate
//! turns them into storage-agnostic artifacts and shapes the results:
//!
//! - [`filter`] compiles the client filter DSL (`field__operator`, `AND`/`OR`, deep
//!   filters and pre-filters) into a [`NormalizedFilter`] tree
//! - [`connection`] validates pagination arguments, enforces a unique sort tiebreak,
//!   encodes cursors and assembles connections (edges + pageInfo + lazy totalCount)
//! - [`storage`] defines the storage collaborator and ships an in-memory backend plus
//!   a SQLite backend built on sqlx
//! - [`graphql`] adapts connections and errors to async-graphql
//!
//! # Example
//!
//! ```rust,ignore
//! let registry = EntityRegistry::builder().entity(Book::entity_descriptor()?).build()?;
//! let resolver = ConnectionResolver::new(registry, storage, &Config::from_env()?);
//!
//! let args = ConnectionArgs::default()
//!     .first(10)
//!     .filter(json!({ "title__contains": "Rust", "OR": [{ "year__gte": 2020 }] }));
//! let connection = resolver.resolve("Book", args, &RequestContext::anonymous(), None).await?;
//! ```

extern crate self as filterql;

pub mod config;
pub mod connection;
pub mod context;
pub mod error;
pub mod filter;
pub mod graphql;
pub mod logging;
pub mod model;
pub mod permission;
pub mod storage;

pub use config::Config;
pub use connection::{
    Connection, ConnectionArgs, ConnectionResolver, Cursor, Edge, OrderBy, PageInfo,
    SortDirection, TotalCount,
};
pub use context::RequestContext;
pub use error::{QueryError, Result};
pub use filter::{
    Comparison, Constraint, FilterCompiler, FilterOperator, FilterPath, NormalizedFilter,
};
pub use graphql::{ConnectionObject, OrderByInput};
pub use model::{
    AttributeDescriptor, EntityBuilder, EntityDescriptor, EntityModel, EntityRegistry,
    FilterCapabilities, PreFilter, PreFilterKind, PreFilterResolver, RegistryError, ValueType,
};
pub use permission::{OwnershipPolicy, PermissionPolicy};
pub use storage::{
    FindArgs, MemoryStorage, ParentConnection, Row, Storage, StorageError, StoragePage,
    StoragePageInfo,
};
#[cfg(feature = "sqlite")]
pub use storage::SqliteStorage;

/// Derive an [`EntityModel`] from a struct definition.
pub use filterql_macros::Entity;
