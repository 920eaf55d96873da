//! Error extensions for GraphQL responses

use async_graphql::ErrorExtensions;

use crate::error::QueryError;

const INTERNAL_MESSAGE: &str = "internal storage error";

impl ErrorExtensions for QueryError {
    /// Client errors keep their message and gain `code` (and `path` for filter
    /// errors); storage failures are logged and reported without detail.
    fn extend(&self) -> async_graphql::Error {
        let message = if self.is_client_error() {
            self.to_string()
        } else {
            tracing::error!(error = %self, "Storage failure while resolving query");
            INTERNAL_MESSAGE.to_string()
        };

        async_graphql::Error::new(message).extend_with(|_, e| {
            e.set("code", self.code());
            if let Some(path) = self.path() {
                e.set("path", path);
            }
        })
    }
}
