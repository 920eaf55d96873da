//! async-graphql boundary adapter
//!
//! Connection fields of any schema can be backed by [`ConnectionResolver`]:
//!
//! ```rust,ignore
//! #[Object]
//! impl QueryRoot {
//!     async fn books(
//!         &self,
//!         ctx: &Context<'_>,
//!         first: Option<i32>,
//!         last: Option<i32>,
//!         before: Option<String>,
//!         after: Option<String>,
//!         offset: Option<i32>,
//!         order_by: Option<Vec<OrderByInput>>,
//!         filter: Option<Json<serde_json::Value>>,
//!     ) -> Result<ConnectionObject> {
//!         let resolver = ctx.data::<ConnectionResolver>()?;
//!         let args = ConnectionArgs::from_graphql(first, last, before, after, offset, order_by, filter);
//!         let connection = resolver
//!             .resolve("Book", args, ctx.data::<RequestContext>()?, None)
//!             .await
//!             .map_err(|e| e.extend())?;
//!         Ok(connection.into())
//!     }
//! }
//! ```
//!
//! [`ConnectionResolver`]: crate::connection::ConnectionResolver

mod errors;
pub mod types;

pub use types::{ConnectionObject, EdgeObject, OrderByInput, PageInfoObject};

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_graphql::{
        Context, EmptyMutation, EmptySubscription, ErrorExtensions, Json, Object, Schema,
    };
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    use super::*;
    use crate::config::Config;
    use crate::connection::{ConnectionArgs, ConnectionResolver};
    use crate::context::RequestContext;
    use crate::model::{AttributeDescriptor, EntityDescriptor, EntityRegistry};
    use crate::storage::MemoryStorage;

    struct Query;

    #[Object]
    impl Query {
        async fn books(
            &self,
            ctx: &Context<'_>,
            first: Option<i32>,
            last: Option<i32>,
            before: Option<String>,
            after: Option<String>,
            offset: Option<i32>,
            order_by: Option<Vec<OrderByInput>>,
            filter: Option<Json<Value>>,
        ) -> async_graphql::Result<ConnectionObject> {
            let resolver = ctx.data::<ConnectionResolver>()?;
            let args =
                ConnectionArgs::from_graphql(first, last, before, after, offset, order_by, filter);
            let connection = resolver
                .resolve("Book", args, &RequestContext::anonymous(), None)
                .await
                .map_err(|e| e.extend())?;
            Ok(connection.into())
        }
    }

    fn schema() -> Schema<Query, EmptyMutation, EmptySubscription> {
        let registry = EntityRegistry::builder()
            .entity(
                EntityDescriptor::builder("Book")
                    .attribute(AttributeDescriptor::id("id").primary())
                    .attribute(AttributeDescriptor::string("title"))
                    .attribute(AttributeDescriptor::integer("published_year").field_name("year"))
                    .build()
                    .unwrap(),
            )
            .build()
            .unwrap();

        let storage = MemoryStorage::new();
        storage.insert_many(
            "Book",
            vec![
                json!({ "id": 1, "title": "Dune", "published_year": 1965 }),
                json!({ "id": 2, "title": "Emma", "published_year": 1815 }),
                json!({ "id": 3, "title": "Ulysses", "published_year": 1922 }),
                json!({ "id": 4, "title": "Neuromancer", "published_year": 1984 }),
            ],
        );

        let resolver = ConnectionResolver::new(registry, Arc::new(storage), &Config::default());
        Schema::build(Query, EmptyMutation, EmptySubscription)
            .data(resolver)
            .finish()
    }

    async fn execute(query: &str) -> Value {
        let response = schema().execute(query).await;
        serde_json::to_value(&response).unwrap()
    }

    #[tokio::test]
    async fn test_connection_query() {
        let response = execute(
            r#"{
                books(first: 2, orderBy: [{ attribute: "title" }], filter: { year__gte: 1900 }) {
                    nodes
                    edges { cursor }
                    pageInfo { hasNextPage hasPreviousPage startCursor endCursor }
                    totalCount
                }
            }"#,
        )
        .await;

        assert_eq!(response.get("errors"), None);
        let books = &response["data"]["books"];
        assert_eq!(
            books["nodes"],
            json!([
                { "id": 1, "title": "Dune", "year": 1965 },
                { "id": 4, "title": "Neuromancer", "year": 1984 },
            ])
        );
        assert_eq!(books["totalCount"], json!(3));
        assert_eq!(books["pageInfo"]["hasNextPage"], json!(true));
        assert_eq!(books["pageInfo"]["hasPreviousPage"], json!(false));
        assert_eq!(books["pageInfo"]["startCursor"], books["edges"][0]["cursor"]);
        assert_eq!(books["pageInfo"]["endCursor"], books["edges"][1]["cursor"]);
    }

    #[tokio::test]
    async fn test_follow_end_cursor() {
        let first = execute(r#"{ books(first: 3, orderBy: [{ attribute: "year", direction: DESC }]) { pageInfo { endCursor } } }"#).await;
        let cursor = first["data"]["books"]["pageInfo"]["endCursor"].as_str().unwrap().to_string();

        let next = execute(&format!(
            r#"{{ books(first: 3, after: "{cursor}", orderBy: [{{ attribute: "year", direction: DESC }}]) {{ nodes pageInfo {{ hasNextPage hasPreviousPage }} }} }}"#
        ))
        .await;

        assert_eq!(next["data"]["books"]["nodes"], json!([{ "id": 2, "title": "Emma", "year": 1815 }]));
        assert_eq!(
            next["data"]["books"]["pageInfo"],
            json!({ "hasNextPage": false, "hasPreviousPage": true })
        );
    }

    #[tokio::test]
    async fn test_errors_carry_code_and_path() {
        let response = execute("{ books(first: 1, last: 1) { totalCount } }").await;
        assert_eq!(
            response["errors"][0]["extensions"]["code"],
            json!("MUTUALLY_EXCLUSIVE_PAGINATION")
        );

        let response = execute(r#"{ books(filter: { OR: [{ colour: "red" }] }) { totalCount } }"#).await;
        let extensions = &response["errors"][0]["extensions"];
        assert_eq!(extensions["code"], json!("UNKNOWN_FILTER_ATTRIBUTE"));
        assert!(extensions["path"].as_str().unwrap().starts_with("OR[0]"));
    }
}
