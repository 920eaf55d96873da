//! Connection assembly: edges, page info and a lazy total count

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use futures::future::{BoxFuture, FutureExt};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::OnceCell;

use super::args::OrderBy;
use super::cursor::Cursor;
use crate::error::Result;
use crate::model::EntityDescriptor;
use crate::storage::{Row, StoragePageInfo};

/// Information about pagination in a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    /// Cursor of the first edge in this page
    pub start_cursor: Option<String>,
    /// Cursor of the last edge in this page
    pub end_cursor: Option<String>,
}

/// An edge in a connection
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Edge {
    /// The shaped row (public field names)
    pub node: Value,
    /// Omitted when the entity has no primary attribute
    pub cursor: Option<String>,
}

type CountFn = Arc<dyn Fn() -> BoxFuture<'static, Result<u64>> + Send + Sync>;

/// Total number of rows matching a connection's filter.
///
/// Evaluated on first access with a separate storage round trip, then cached.
/// Clones share the cached value.
#[derive(Clone)]
pub struct TotalCount {
    cell: Arc<OnceCell<u64>>,
    count: CountFn,
}

impl TotalCount {
    /// An already known count
    pub fn known(total: u64) -> Self {
        Self {
            cell: Arc::new(OnceCell::new_with(Some(total))),
            count: Arc::new(move || -> BoxFuture<'static, Result<u64>> {
                async move { Ok(total) }.boxed()
            }),
        }
    }

    /// A count computed by `count` on first access
    pub fn deferred<F, Fut>(count: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<u64>> + Send + 'static,
    {
        Self {
            cell: Arc::new(OnceCell::new()),
            count: Arc::new(move || count().boxed()),
        }
    }

    pub async fn get(&self) -> Result<u64> {
        self.cell
            .get_or_try_init(|| (self.count)())
            .await
            .copied()
    }

    /// Whether the count has been computed
    pub fn is_evaluated(&self) -> bool {
        self.cell.initialized()
    }
}

impl fmt::Debug for TotalCount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TotalCount")
            .field("value", &self.cell.get())
            .finish_non_exhaustive()
    }
}

/// A paginated result set
#[derive(Debug, Clone)]
pub struct Connection {
    pub edges: Vec<Edge>,
    pub page_info: PageInfo,
    pub total_count: TotalCount,
}

impl Connection {
    pub fn empty() -> Self {
        Self {
            edges: Vec::new(),
            page_info: PageInfo::default(),
            total_count: TotalCount::known(0),
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = &Value> {
        self.edges.iter().map(|edge| &edge.node)
    }

    pub async fn total_count(&self) -> Result<u64> {
        self.total_count.get().await
    }
}

/// Build a connection from shaped nodes and the raw rows they came from.
///
/// `nodes[i]` is the public shape of `rows[i]`; cursors are encoded from the raw
/// rows since they carry internal attribute names. Page flags are taken from
/// storage as-is.
pub fn connection_from_data(
    nodes: Vec<Value>,
    rows: &[Row],
    entity: &EntityDescriptor,
    order_by: &[OrderBy],
    storage_page_info: StoragePageInfo,
    total_count: TotalCount,
) -> Connection {
    let primary = entity.primary_attribute().map(|a| a.name.as_str());

    let edges: Vec<Edge> = nodes
        .into_iter()
        .enumerate()
        .map(|(idx, node)| Edge {
            cursor: match (primary, rows.get(idx)) {
                (Some(primary), Some(row)) => {
                    Some(Cursor::encode(entity.name(), Some(primary), order_by, row).serialize())
                }
                _ => None,
            },
            node,
        })
        .collect();

    let page_info = PageInfo {
        has_next_page: storage_page_info.has_next_page,
        has_previous_page: storage_page_info.has_previous_page,
        start_cursor: edges.first().and_then(|e| e.cursor.clone()),
        end_cursor: edges.last().and_then(|e| e.cursor.clone()),
    };

    Connection {
        edges,
        page_info,
        total_count,
    }
}
