//! Recursive filter compilation
//!
//! A client filter level is compiled in two phases. The synchronous phase walks the
//! keys, validates them against the entity's attributes and collects plain
//! constraints, `AND`/`OR` branches and pending lookups (deep filters and
//! pre-filters). The async phase compiles branches and resolves lookups
//! concurrently; a level is complete only when every child has finished.
//!
//! Errors are raised before any storage call is made for the level, so an invalid
//! filter is never partially applied.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::fmt;
use std::sync::Arc;

use futures::future::{self, BoxFuture, FutureExt};
use serde_json::Value;

use super::normalized::{Constraint, NormalizedFilter};
use super::operator::{Comparison, FilterOperator, split_attribute_and_filter_operator};
use crate::context::RequestContext;
use crate::error::{QueryError, Result};
use crate::model::{Activation, AttributeDescriptor, EntityDescriptor, EntityRegistry, PreFilter, ValueType};
use crate::storage::{FindArgs, Storage};

/// Logical conjunction key
pub const AND_KEY: &str = "AND";
/// Logical disjunction key
pub const OR_KEY: &str = "OR";

/// Location of a node inside a client filter, rendered as `OR[1].author__filter`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterPath(Vec<String>);

impl FilterPath {
    pub fn root() -> Self {
        Self::default()
    }

    pub fn child(&self, segment: impl Into<String>) -> Self {
        let mut segments = self.0.clone();
        segments.push(segment.into());
        Self(segments)
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }
}

impl fmt::Display for FilterPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_empty() {
            f.write_str("(root)")
        } else {
            f.write_str(&self.0.join("."))
        }
    }
}

/// How an attribute is used at one filter level
#[derive(Debug, Default)]
struct Usage {
    exact: bool,
    operators: bool,
    lookups: usize,
}

impl Usage {
    fn conflicts(&self) -> bool {
        (self.exact && (self.operators || self.lookups > 0))
            || (self.operators && self.lookups > 0)
            || self.lookups > 1
    }
}

/// A constraint that needs a storage round trip to become an ID list
enum Lookup<'a> {
    Deep {
        attribute: &'a AttributeDescriptor,
        target: &'a EntityDescriptor,
        filter: &'a Value,
        path: FilterPath,
    },
    Pre {
        attribute: &'a AttributeDescriptor,
        pre_filter: &'a PreFilter,
        params: Option<Value>,
        path: FilterPath,
    },
}

/// Compiles client filters into [`NormalizedFilter`] trees.
///
/// Deep filters are resolved through the storage collaborator; the registry is
/// needed to find the target entity of a reference attribute.
#[derive(Clone)]
pub struct FilterCompiler {
    registry: Arc<EntityRegistry>,
    storage: Arc<dyn Storage>,
}

impl FilterCompiler {
    pub fn new(registry: Arc<EntityRegistry>, storage: Arc<dyn Storage>) -> Self {
        Self { registry, storage }
    }

    /// Compile `raw` against `entity`
    pub async fn compile(
        &self,
        entity: &EntityDescriptor,
        raw: &Value,
        context: &RequestContext,
    ) -> Result<NormalizedFilter> {
        self.compile_at(entity, raw, context, FilterPath::root()).await
    }

    /// Compile `raw` as the node found at `path`
    pub async fn compile_at(
        &self,
        entity: &EntityDescriptor,
        raw: &Value,
        context: &RequestContext,
        path: FilterPath,
    ) -> Result<NormalizedFilter> {
        self.compile_level(entity, raw, context, path).await
    }

    fn compile_level<'a>(
        &'a self,
        entity: &'a EntityDescriptor,
        raw: &'a Value,
        context: &'a RequestContext,
        path: FilterPath,
    ) -> BoxFuture<'a, Result<NormalizedFilter>> {
        async move {
            let node = match raw {
                Value::Object(node) => node,
                other => {
                    return Err(QueryError::InvalidFilter {
                        reason: format!("expected a filter object, got {}", json_kind(other)),
                        path: path.to_string(),
                    });
                }
            };
            if entity.attributes().is_empty() {
                return Err(QueryError::InvalidFilter {
                    reason: format!("entity '{}' has no filterable attributes", entity.name()),
                    path: path.to_string(),
                });
            }

            let mut attributes: BTreeMap<String, Constraint> = BTreeMap::new();
            let mut usage: BTreeMap<&str, Usage> = BTreeMap::new();
            let mut and_branches = Vec::new();
            let mut or_branches = Vec::new();
            let mut lookups = Vec::new();

            for (key, value) in node {
                if key == AND_KEY || key == OR_KEY {
                    let elements = value.as_array().ok_or_else(|| QueryError::InvalidFilterValue {
                        key: key.clone(),
                        reason: "expected an array of filter objects".to_string(),
                        path: path.to_string(),
                    })?;
                    let branches = if key == AND_KEY {
                        &mut and_branches
                    } else {
                        &mut or_branches
                    };
                    for (idx, element) in elements.iter().enumerate() {
                        branches.push((element, path.child(format!("{key}[{idx}]"))));
                    }
                    continue;
                }

                let key_path = path.child(key.clone());
                let split = split_attribute_and_filter_operator(key).map_err(|_| {
                    QueryError::InvalidFilterKey {
                        key: key.clone(),
                        path: key_path.to_string(),
                    }
                })?;

                let attribute = entity.attribute_by_field(split.attribute_name).ok_or_else(|| {
                    QueryError::UnknownFilterAttribute {
                        entity: entity.name().to_string(),
                        attribute: split.attribute_name.to_string(),
                        path: key_path.to_string(),
                    }
                })?;

                let operator = match split.operator {
                    None => None,
                    Some(keyword) => Some(FilterOperator::parse(keyword).ok_or_else(|| {
                        QueryError::UnknownFilterOperator {
                            key: key.clone(),
                            operator: keyword.to_string(),
                            path: key_path.to_string(),
                        }
                    })?),
                };

                let used = usage.entry(attribute.name.as_str()).or_default();
                match operator {
                    None => used.exact = true,
                    Some(operator) if operator.is_lookup() => used.lookups += 1,
                    Some(_) => used.operators = true,
                }
                if used.conflicts() {
                    return Err(QueryError::ConflictingFilterOperators {
                        attribute: attribute.field_name.clone(),
                        path: key_path.to_string(),
                    });
                }

                match operator {
                    None => {
                        check_exact_value(attribute, key, value, &key_path)?;
                        attributes.insert(attribute.name.clone(), Constraint::Equals(value.clone()));
                    }
                    Some(FilterOperator::Compare(comparison)) => {
                        if !attribute.supports(comparison) {
                            return Err(QueryError::UnsupportedFilterOperator {
                                attribute: attribute.field_name.clone(),
                                operator: comparison.keyword().to_string(),
                                path: key_path.to_string(),
                            });
                        }
                        check_operator_value(comparison, key, value, &key_path)?;
                        match attributes.entry(attribute.name.clone()) {
                            Entry::Occupied(mut entry) => {
                                if let Constraint::Operators(operators) = entry.get_mut() {
                                    operators.insert(comparison, value.clone());
                                }
                            }
                            Entry::Vacant(entry) => {
                                entry.insert(Constraint::op(comparison, value.clone()));
                            }
                        }
                    }
                    Some(FilterOperator::Filter) => {
                        let target = attribute.reference.as_deref().ok_or_else(|| {
                            QueryError::InvalidFilterValue {
                                key: key.clone(),
                                reason: format!(
                                    "'{}' does not reference another entity",
                                    attribute.field_name
                                ),
                                path: key_path.to_string(),
                            }
                        })?;
                        let target = self.registry.require(target)?;
                        lookups.push(Lookup::Deep {
                            attribute,
                            target: target.as_ref(),
                            filter: value,
                            path: key_path,
                        });
                    }
                    Some(FilterOperator::PreFilter) => {
                        if let Some(lookup) = pre_filter_lookup(entity, attribute, key, value, key_path)? {
                            lookups.push(lookup);
                        }
                    }
                }
            }

            tracing::debug!(
                entity = entity.name(),
                path = %path,
                constraints = attributes.len(),
                and = and_branches.len(),
                or = or_branches.len(),
                lookups = lookups.len(),
                "Compiling filter level"
            );

            let compile_all = |branches: Vec<(&'a Value, FilterPath)>| {
                future::try_join_all(
                    branches
                        .into_iter()
                        .map(|(element, path)| self.compile_level(entity, element, context, path)),
                )
            };

            let (and, or, resolved) = futures::try_join!(
                compile_all(and_branches),
                compile_all(or_branches),
                future::try_join_all(lookups.into_iter().map(|lookup| self.resolve_lookup(lookup, context))),
            )?;

            for (attribute, ids) in resolved {
                attributes.insert(attribute, Constraint::one_of(ids));
            }

            Ok(NormalizedFilter {
                attributes,
                and: and.into_iter().filter(|f| !f.is_empty()).collect(),
                or,
            })
        }
        .boxed()
    }

    /// Resolve a lookup into `(internal attribute, ids)`
    async fn resolve_lookup<'a>(
        &'a self,
        lookup: Lookup<'a>,
        context: &'a RequestContext,
    ) -> Result<(String, Vec<Value>)> {
        match lookup {
            Lookup::Deep {
                attribute,
                target,
                filter,
                path,
            } => {
                let nested = self.compile_level(target, filter, context, path.clone()).await?;
                // registry build guarantees reference targets have a primary attribute
                let primary = target
                    .primary_attribute()
                    .map(|a| a.name.clone())
                    .ok_or_else(|| QueryError::InvalidFilterValue {
                        key: attribute.field_name.clone(),
                        reason: format!("entity '{}' has no primary attribute", target.name()),
                        path: path.to_string(),
                    })?;

                let args = FindArgs {
                    filter: nested,
                    projection: Some(vec![primary.clone()]),
                    skip_permissions: true,
                    ..Default::default()
                };
                let page = self.storage.find(target, &args, context, None).await?;
                let ids: Vec<Value> = page
                    .rows
                    .into_iter()
                    .filter_map(|mut row| row.remove(&primary))
                    .filter(|id| !id.is_null())
                    .collect();

                tracing::debug!(
                    path = %path,
                    target = target.name(),
                    ids = ids.len(),
                    "Deep filter resolved"
                );
                Ok((attribute.name.clone(), ids))
            }
            Lookup::Pre {
                attribute,
                pre_filter,
                params,
                path,
            } => {
                let ids = pre_filter.resolve(context, params.as_ref()).await?;
                tracing::debug!(
                    path = %path,
                    pre_filter = pre_filter.name(),
                    ids = ids.len(),
                    "Pre-filter resolved"
                );
                Ok((attribute.name.clone(), ids))
            }
        }
    }
}

/// Validate a `__pre_filter` object; `None` when no named pre-filter is active
fn pre_filter_lookup<'a>(
    entity: &'a EntityDescriptor,
    attribute: &'a AttributeDescriptor,
    key: &str,
    value: &Value,
    path: FilterPath,
) -> Result<Option<Lookup<'a>>> {
    let requested = value.as_object().ok_or_else(|| QueryError::InvalidFilterValue {
        key: key.to_string(),
        reason: "expected an object of named pre-filters".to_string(),
        path: path.to_string(),
    })?;

    let mut active = Vec::new();
    for (name, flag) in requested {
        let pre_filter = entity.pre_filter(name).ok_or_else(|| QueryError::UnknownPreFilter {
            entity: entity.name().to_string(),
            name: name.clone(),
            path: path.to_string(),
        })?;
        let activation = pre_filter
            .activation(flag)
            .map_err(|reason| QueryError::InvalidFilterValue {
                key: key.to_string(),
                reason,
                path: path.to_string(),
            })?;
        if let Activation::Active(params) = activation {
            active.push((pre_filter, params));
        }
    }

    if active.len() > 1 {
        return Err(QueryError::AmbiguousPreFilter {
            attribute: attribute.field_name.clone(),
            names: active.iter().map(|(p, _)| p.name().to_string()).collect(),
            path: path.to_string(),
        });
    }

    Ok(active.pop().map(|(pre_filter, params)| Lookup::Pre {
        attribute,
        pre_filter,
        params,
        path,
    }))
}

fn check_exact_value(
    attribute: &AttributeDescriptor,
    key: &str,
    value: &Value,
    path: &FilterPath,
) -> Result<()> {
    if is_composite(value) && attribute.value_type != ValueType::Json {
        return Err(QueryError::InvalidFilterValue {
            key: key.to_string(),
            reason: format!("exact match expects a scalar, got {}", json_kind(value)),
            path: path.to_string(),
        });
    }
    Ok(())
}

fn check_operator_value(
    comparison: Comparison,
    key: &str,
    value: &Value,
    path: &FilterPath,
) -> Result<()> {
    let invalid = |reason: String| QueryError::InvalidFilterValue {
        key: key.to_string(),
        reason,
        path: path.to_string(),
    };

    if comparison.is_list() {
        let items = value
            .as_array()
            .ok_or_else(|| invalid(format!("'{comparison}' expects a list, got {}", json_kind(value))))?;
        if items.iter().any(is_composite) {
            return Err(invalid(format!("'{comparison}' expects a list of scalars")));
        }
        return Ok(());
    }

    match value {
        Value::String(_) => Ok(()),
        _ if comparison.is_text() => Err(invalid(format!(
            "'{comparison}' expects a string, got {}",
            json_kind(value)
        ))),
        Value::Null if comparison != Comparison::Ne => {
            Err(invalid(format!("'{comparison}' does not accept null")))
        }
        v if is_composite(v) => Err(invalid(format!(
            "'{comparison}' expects a scalar, got {}",
            json_kind(value)
        ))),
        _ => Ok(()),
    }
}

fn is_composite(value: &Value) -> bool {
    matches!(value, Value::Array(_) | Value::Object(_))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
