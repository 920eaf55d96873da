//! Per-request context handed to pre-filter resolvers, permission policies and storage

use std::collections::HashMap;

use serde_json::Value;

/// Data about the caller of one API request.
///
/// Created once per request and dropped when the request completes.
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    /// Authenticated user, if any
    pub user_id: Option<String>,
    /// Roles granted to the caller
    pub roles: Vec<String>,
    /// Free-form request data (tenant, locale, feature flags, ...)
    pub attributes: HashMap<String, Value>,
}

impl RequestContext {
    /// Context for an unauthenticated caller
    pub fn anonymous() -> Self {
        Self::default()
    }

    /// Context for an authenticated user
    pub fn for_user(user_id: impl Into<String>) -> Self {
        Self {
            user_id: Some(user_id.into()),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }

    pub fn attribute(&self, key: &str) -> Option<&Value> {
        self.attributes.get(key)
    }
}
