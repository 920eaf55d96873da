//! Named, server-defined filter shortcuts
//!
//! Clients activate a pre-filter with `attr__pre_filter: { <name>: true }` (flag) or
//! `attr__pre_filter: { <name>: { ...params } }` (parameterized). The resolver turns
//! the activation into a list of IDs that constrains `attr`.

use std::fmt;
use std::future::Future;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RequestContext;
use crate::storage::StorageError;

/// How a pre-filter is activated by clients
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PreFilterKind {
    /// Boolean flag: `true` activates, `false`/`null` leaves it off
    Flag,
    /// Object of parameters: an object activates, `null`/`false` leaves it off
    Parameterized,
}

/// Resolves an activated pre-filter into the IDs it admits.
#[async_trait]
pub trait PreFilterResolver: Send + Sync {
    async fn resolve(
        &self,
        context: &RequestContext,
        params: Option<&Value>,
    ) -> Result<Vec<Value>, StorageError>;
}

#[async_trait]
impl<F, Fut> PreFilterResolver for F
where
    F: Fn(RequestContext, Option<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = Result<Vec<Value>, StorageError>> + Send,
{
    async fn resolve(
        &self,
        context: &RequestContext,
        params: Option<&Value>,
    ) -> Result<Vec<Value>, StorageError> {
        (self)(context.clone(), params.cloned()).await
    }
}

/// Activation state parsed from a client value
#[derive(Debug, Clone, PartialEq)]
pub enum Activation {
    Inactive,
    Active(Option<Value>),
}

/// A named pre-filter registered on an entity
#[derive(Clone)]
pub struct PreFilter {
    name: String,
    kind: PreFilterKind,
    description: Option<String>,
    resolver: Arc<dyn PreFilterResolver>,
}

impl PreFilter {
    pub fn flag(name: impl Into<String>, resolver: impl PreFilterResolver + 'static) -> Self {
        Self::new(name, PreFilterKind::Flag, resolver)
    }

    pub fn parameterized(
        name: impl Into<String>,
        resolver: impl PreFilterResolver + 'static,
    ) -> Self {
        Self::new(name, PreFilterKind::Parameterized, resolver)
    }

    fn new(
        name: impl Into<String>,
        kind: PreFilterKind,
        resolver: impl PreFilterResolver + 'static,
    ) -> Self {
        Self {
            name: name.into(),
            kind,
            description: None,
            resolver: Arc::new(resolver),
        }
    }

    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> PreFilterKind {
        self.kind
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Interpret the value a client supplied for this pre-filter
    pub fn activation(&self, value: &Value) -> Result<Activation, String> {
        match (self.kind, value) {
            (_, Value::Null) | (_, Value::Bool(false)) => Ok(Activation::Inactive),
            (_, Value::Bool(true)) => Ok(Activation::Active(None)),
            (PreFilterKind::Parameterized, Value::Object(_)) => {
                Ok(Activation::Active(Some(value.clone())))
            }
            (PreFilterKind::Flag, _) => Err(format!("pre-filter '{}' expects a boolean", self.name)),
            (PreFilterKind::Parameterized, _) => Err(format!(
                "pre-filter '{}' expects a boolean or an object of parameters",
                self.name
            )),
        }
    }

    pub async fn resolve(
        &self,
        context: &RequestContext,
        params: Option<&Value>,
    ) -> Result<Vec<Value>, StorageError> {
        self.resolver.resolve(context, params).await
    }
}

impl fmt::Debug for PreFilter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreFilter")
            .field("name", &self.name)
            .field("kind", &self.kind)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}
