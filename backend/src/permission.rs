//! Permission collaborator
//!
//! A policy contributes a row-level lookup constraint per entity and decides whether
//! a lookup under that constraint may proceed at all. The resolver consults the
//! policy only when the constraint is non-empty; deep filters never consult it.

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use crate::context::RequestContext;
use crate::filter::NormalizedFilter;
use crate::model::EntityDescriptor;
use crate::storage::StorageError;

#[async_trait]
pub trait PermissionPolicy: Send + Sync {
    /// Rows of `entity` the caller may see; an empty filter means unrestricted
    fn lookup_constraint(&self, entity: &EntityDescriptor, context: &RequestContext) -> NormalizedFilter;

    /// Whether a lookup restricted by `where_clause` may run
    async fn check_lookup_permission(
        &self,
        entity: &EntityDescriptor,
        where_clause: &NormalizedFilter,
        context: &RequestContext,
    ) -> Result<bool, StorageError>;
}

/// Restricts entities to rows owned by the calling user.
///
/// Anonymous callers are denied on owned entities; callers holding the bypass
/// role see everything.
#[derive(Debug, Clone, Default)]
pub struct OwnershipPolicy {
    owners: HashMap<String, String>,
    bypass_role: Option<String>,
}

impl OwnershipPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rows of `entity` belong to the user whose ID is stored in `attribute`
    pub fn owned_by(mut self, entity: impl Into<String>, attribute: impl Into<String>) -> Self {
        self.owners.insert(entity.into(), attribute.into());
        self
    }

    pub fn bypass_role(mut self, role: impl Into<String>) -> Self {
        self.bypass_role = Some(role.into());
        self
    }

    fn bypasses(&self, context: &RequestContext) -> bool {
        self.bypass_role
            .as_deref()
            .is_some_and(|role| context.has_role(role))
    }
}

#[async_trait]
impl PermissionPolicy for OwnershipPolicy {
    fn lookup_constraint(&self, entity: &EntityDescriptor, context: &RequestContext) -> NormalizedFilter {
        if self.bypasses(context) {
            return NormalizedFilter::all();
        }
        match self.owners.get(entity.name()) {
            Some(attribute) => {
                let owner = context.user_id.clone().map(Value::from).unwrap_or(Value::Null);
                NormalizedFilter::equals(attribute.clone(), owner)
            }
            None => NormalizedFilter::all(),
        }
    }

    async fn check_lookup_permission(
        &self,
        entity: &EntityDescriptor,
        _where_clause: &NormalizedFilter,
        context: &RequestContext,
    ) -> Result<bool, StorageError> {
        let allowed = context.user_id.is_some() || self.bypasses(context);
        if !allowed {
            tracing::debug!(entity = entity.name(), "Anonymous lookup denied");
        }
        Ok(allowed)
    }
}
