//! GraphQL output and input types for connections
//!
//! Nodes are exposed as the `JSON` scalar keyed by public field names, so one set
//! of connection types serves every registered entity.

use async_graphql::{ErrorExtensions, InputObject, Json, Object, SimpleObject};
use serde_json::Value;

use crate::connection::{Connection, ConnectionArgs, Edge, OrderBy, PageInfo, SortDirection};

/// One `orderBy` entry
#[derive(InputObject, Clone, Debug)]
#[graphql(name = "OrderBy")]
pub struct OrderByInput {
    /// Public or internal attribute name
    pub attribute: String,
    #[graphql(default)]
    pub direction: SortDirection,
}

impl From<OrderByInput> for OrderBy {
    fn from(input: OrderByInput) -> Self {
        OrderBy::new(input.attribute, input.direction)
    }
}

impl ConnectionArgs {
    /// Build arguments from the standard connection field arguments
    pub fn from_graphql(
        first: Option<i32>,
        last: Option<i32>,
        before: Option<String>,
        after: Option<String>,
        offset: Option<i32>,
        order_by: Option<Vec<OrderByInput>>,
        filter: Option<Json<Value>>,
    ) -> Self {
        Self {
            first: first.map(i64::from),
            last: last.map(i64::from),
            before,
            after,
            offset: offset.map(i64::from),
            order_by: order_by
                .unwrap_or_default()
                .into_iter()
                .map(OrderBy::from)
                .collect(),
            filter: filter.map(|Json(value)| value),
        }
    }
}

/// Pagination state of a connection
#[derive(SimpleObject, Debug, Clone, Default)]
#[graphql(name = "PageInfo")]
pub struct PageInfoObject {
    /// When paginating forwards, are there more items?
    pub has_next_page: bool,
    /// When paginating backwards, are there more items?
    pub has_previous_page: bool,
    pub start_cursor: Option<String>,
    pub end_cursor: Option<String>,
}

impl From<PageInfo> for PageInfoObject {
    fn from(info: PageInfo) -> Self {
        Self {
            has_next_page: info.has_next_page,
            has_previous_page: info.has_previous_page,
            start_cursor: info.start_cursor,
            end_cursor: info.end_cursor,
        }
    }
}

#[derive(SimpleObject, Debug, Clone)]
#[graphql(name = "Edge")]
pub struct EdgeObject {
    pub node: Json<Value>,
    /// Opaque cursor; absent for entities without a primary attribute
    pub cursor: Option<String>,
}

impl From<Edge> for EdgeObject {
    fn from(edge: Edge) -> Self {
        Self {
            node: Json(edge.node),
            cursor: edge.cursor,
        }
    }
}

/// A resolved page of nodes
#[derive(Debug, Clone)]
pub struct ConnectionObject(pub Connection);

impl From<Connection> for ConnectionObject {
    fn from(connection: Connection) -> Self {
        Self(connection)
    }
}

#[Object(name = "Connection")]
impl ConnectionObject {
    async fn edges(&self) -> Vec<EdgeObject> {
        self.0.edges.iter().cloned().map(EdgeObject::from).collect()
    }

    async fn nodes(&self) -> Vec<Json<Value>> {
        self.0.nodes().cloned().map(Json).collect()
    }

    async fn page_info(&self) -> PageInfoObject {
        self.0.page_info.clone().into()
    }

    /// Rows matching the filter, ignoring pagination; counted on first request
    async fn total_count(&self) -> async_graphql::Result<u64> {
        self.0.total_count().await.map_err(|e| e.extend())
    }
}
