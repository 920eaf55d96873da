//! End-to-end connection resolution
//!
//! validate args -> resolve sort -> unique tiebreak -> decode cursors -> compile
//! filter -> permission gate -> storage `find` -> shape rows -> assemble

use std::sync::Arc;

use serde_json::Value;

use super::args::{ConnectionArgs, OrderBy};
use super::assembler::{Connection, TotalCount, connection_from_data};
use super::cursor::Cursor;
use super::sort::{force_sort_by_unique, keyset_order};
use crate::config::Config;
use crate::context::RequestContext;
use crate::error::{QueryError, Result};
use crate::filter::{FilterCompiler, NormalizedFilter};
use crate::model::{EntityDescriptor, EntityRegistry};
use crate::permission::PermissionPolicy;
use crate::storage::{FindArgs, ParentConnection, Storage, StorageError};

/// Resolves connection fields against an entity registry and a storage backend
#[derive(Clone)]
pub struct ConnectionResolver {
    registry: Arc<EntityRegistry>,
    storage: Arc<dyn Storage>,
    compiler: FilterCompiler,
    permissions: Option<Arc<dyn PermissionPolicy>>,
    max_page_size: i64,
    default_page_size: i64,
}

impl ConnectionResolver {
    pub fn new(
        registry: impl Into<Arc<EntityRegistry>>,
        storage: Arc<dyn Storage>,
        config: &Config,
    ) -> Self {
        let registry = registry.into();
        Self {
            compiler: FilterCompiler::new(registry.clone(), storage.clone()),
            registry,
            storage,
            permissions: None,
            max_page_size: config.max_page_size,
            default_page_size: config.default_page_size.min(config.max_page_size),
        }
    }

    /// Gate every lookup through `policy`
    pub fn with_permissions(mut self, policy: Arc<dyn PermissionPolicy>) -> Self {
        self.permissions = Some(policy);
        self
    }

    pub fn registry(&self) -> &Arc<EntityRegistry> {
        &self.registry
    }

    /// Resolve one page of `entity_name`.
    ///
    /// `parent` restricts the connection to rows referencing a parent row (nested
    /// connections). The returned connection's total count is not computed until
    /// requested.
    #[tracing::instrument(skip_all, fields(entity = %entity_name))]
    pub async fn resolve(
        &self,
        entity_name: &str,
        args: ConnectionArgs,
        context: &RequestContext,
        parent: Option<ParentConnection>,
    ) -> Result<Connection> {
        let entity = self.registry.require(entity_name)?.clone();
        args.validate(self.max_page_size)?;

        let mut order_by = resolve_order(&entity, &args.order_by)?;
        force_sort_by_unique(&mut order_by, &entity);

        let after = decode_cursor(args.after.as_deref(), &entity, &order_by)?;
        let before = decode_cursor(args.before.as_deref(), &entity, &order_by)?;
        let order_by = keyset_order(&order_by, &entity);

        let filter = match &args.filter {
            Some(raw) if !raw.is_null() => self.compiler.compile(&entity, raw, context).await?,
            _ => NormalizedFilter::all(),
        };
        let filter = self.apply_permissions(&entity, filter, context).await?;

        let (first, last) = match (args.first, args.last) {
            (None, None) => (Some(self.default_page_size), None),
            window => window,
        };

        let find_args = FindArgs {
            filter,
            order_by,
            first,
            last,
            offset: args.offset,
            after,
            before,
            projection: None,
            skip_permissions: false,
        };

        let page = self
            .storage
            .find(&entity, &find_args, context, parent.as_ref())
            .await?;

        tracing::debug!(
            rows = page.rows.len(),
            has_next_page = page.page_info.has_next_page,
            has_previous_page = page.page_info.has_previous_page,
            "Connection page fetched"
        );

        let nodes = page.rows.iter().map(|row| entity.to_public_row(row)).collect();
        let total_count = self.deferred_count(&entity, &find_args, context, parent);

        Ok(connection_from_data(
            nodes,
            &page.rows,
            &entity,
            &find_args.order_by,
            page.page_info,
            total_count,
        ))
    }

    /// Fetch a single row by primary key, shaped to public field names
    pub async fn resolve_node(
        &self,
        entity_name: &str,
        id: &Value,
        context: &RequestContext,
    ) -> Result<Option<Value>> {
        let entity = self.registry.require(entity_name)?;
        let constraint = self.apply_permissions(entity, NormalizedFilter::all(), context).await?;

        let row = if constraint.is_empty() {
            self.storage.find_one(entity, id, context).await?
        } else {
            let primary = entity.primary_attribute().ok_or_else(|| {
                StorageError::Unsupported(format!("entity '{}' has no primary attribute", entity.name()))
            })?;
            let args = FindArgs {
                first: Some(1),
                ..FindArgs::filtered(
                    NormalizedFilter::equals(primary.name.clone(), id.clone()).and_also(constraint),
                )
            };
            self.storage
                .find(entity, &args, context, None)
                .await?
                .rows
                .into_iter()
                .next()
        };

        Ok(row.map(|row| entity.to_public_row(&row)))
    }

    async fn apply_permissions(
        &self,
        entity: &EntityDescriptor,
        filter: NormalizedFilter,
        context: &RequestContext,
    ) -> Result<NormalizedFilter> {
        let Some(policy) = &self.permissions else {
            return Ok(filter);
        };

        let constraint = policy.lookup_constraint(entity, context);
        if constraint.is_empty() {
            return Ok(filter);
        }

        if !policy.check_lookup_permission(entity, &constraint, context).await? {
            return Err(QueryError::PermissionDenied {
                entity: entity.name().to_string(),
            });
        }
        Ok(filter.and_also(constraint))
    }

    fn deferred_count(
        &self,
        entity: &Arc<EntityDescriptor>,
        args: &FindArgs,
        context: &RequestContext,
        parent: Option<ParentConnection>,
    ) -> TotalCount {
        let storage = self.storage.clone();
        let entity = entity.clone();
        let args = args.clone();
        let context = context.clone();

        TotalCount::deferred(move || {
            let storage = storage.clone();
            let entity = entity.clone();
            let args = args.clone();
            let context = context.clone();
            let parent = parent.clone();
            async move {
                let total = storage
                    .count(&entity, &args, &context, parent.as_ref())
                    .await
                    .map_err(QueryError::from)?;
                tracing::debug!(entity = entity.name(), total, "Total count evaluated");
                Ok::<_, QueryError>(total)
            }
        })
    }
}

/// Map requested sort names (public or internal) to internal attribute names
fn resolve_order(entity: &EntityDescriptor, requested: &[OrderBy]) -> Result<Vec<OrderBy>> {
    let mut order_by: Vec<OrderBy> = Vec::with_capacity(requested.len() + 1);
    for order in requested {
        let attribute = entity
            .resolve(&order.attribute)
            .ok_or_else(|| QueryError::UnknownSortAttribute {
                entity: entity.name().to_string(),
                attribute: order.attribute.clone(),
            })?;
        if order_by.iter().any(|o| o.attribute == attribute.name) {
            continue;
        }
        order_by.push(OrderBy::new(attribute.name.clone(), order.direction));
    }
    Ok(order_by)
}

fn decode_cursor(
    encoded: Option<&str>,
    entity: &EntityDescriptor,
    order_by: &[OrderBy],
) -> Result<Option<Cursor>> {
    let Some(encoded) = encoded else {
        return Ok(None);
    };
    let cursor = Cursor::deserialize(encoded)?;
    cursor.validate_for(entity, order_by)?;
    Ok(Some(cursor))
}
