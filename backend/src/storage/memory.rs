//! In-process storage backend
//!
//! Evaluates normalized filters directly against JSON rows. Used by tests and by
//! embedders that keep small datasets in memory. Every `find` is recorded so callers
//! can inspect the arguments storage received.

use std::cmp::Ordering;
use std::collections::HashMap;

use async_trait::async_trait;
use parking_lot::{Mutex, RwLock};
use serde_json::Value;

use super::{FindArgs, ParentConnection, Row, Storage, StorageError, StoragePage};
use crate::connection::{OrderBy, PageWindow, SortDirection};
use crate::context::RequestContext;
use crate::filter::{Comparison, Constraint, NormalizedFilter};
use crate::model::EntityDescriptor;

/// A `find` call as received by [`MemoryStorage`]
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedFind {
    pub entity: String,
    pub args: FindArgs,
    pub parent: Option<ParentConnection>,
}

/// Storage backend holding rows in memory, keyed by entity name
#[derive(Debug, Default)]
pub struct MemoryStorage {
    rows: RwLock<HashMap<String, Vec<Row>>>,
    finds: Mutex<Vec<RecordedFind>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, entity: &str, row: Row) {
        self.rows.write().entry(entity.to_string()).or_default().push(row);
    }

    /// Insert JSON objects; other values are skipped
    pub fn insert_many(&self, entity: &str, rows: impl IntoIterator<Item = Value>) {
        let mut tables = self.rows.write();
        let table = tables.entry(entity.to_string()).or_default();
        for row in rows {
            match row {
                Value::Object(row) => table.push(row),
                other => tracing::warn!(entity, value = %other, "Skipping non-object row"),
            }
        }
    }

    pub fn len(&self, entity: &str) -> usize {
        self.rows.read().get(entity).map_or(0, Vec::len)
    }

    pub fn is_empty(&self, entity: &str) -> bool {
        self.len(entity) == 0
    }

    /// Every `find` received so far, oldest first
    pub fn recorded_finds(&self) -> Vec<RecordedFind> {
        self.finds.lock().clone()
    }

    pub fn clear_recorded_finds(&self) {
        self.finds.lock().clear();
    }

    fn matching_rows(&self, entity: &EntityDescriptor, filter: &NormalizedFilter) -> Vec<Row> {
        self.rows
            .read()
            .get(entity.name())
            .map(|rows| rows.iter().filter(|row| matches(row, filter)).cloned().collect())
            .unwrap_or_default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn find(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        _context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<StoragePage, StorageError> {
        self.finds.lock().push(RecordedFind {
            entity: entity.name().to_string(),
            args: args.clone(),
            parent: parent.cloned(),
        });

        let window = PageWindow::from_args(args);
        let order = window.order_for(&args.order_by);

        let mut rows = self.matching_rows(entity, &args.effective_filter(parent));
        rows.sort_by(|a, b| compare_rows(a, b, &order));

        let rows: Vec<Row> = rows
            .into_iter()
            .skip(window.offset as usize)
            .take(window.fetch_limit().map_or(usize::MAX, |limit| limit as usize))
            .collect();

        let mut page = window.finish(rows, args.after.is_some(), args.before.is_some());
        if let Some(projection) = &args.projection {
            for row in &mut page.rows {
                row.retain(|column, _| projection.contains(column));
            }
        }
        Ok(page)
    }

    async fn count(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        _context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<u64, StorageError> {
        Ok(self.matching_rows(entity, &args.base_filter(parent)).len() as u64)
    }

    async fn find_one(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        _context: &RequestContext,
    ) -> Result<Option<Row>, StorageError> {
        let primary = entity.primary_attribute().ok_or_else(|| {
            StorageError::Unsupported(format!("entity '{}' has no primary attribute", entity.name()))
        })?;
        let filter = NormalizedFilter::equals(primary.name.clone(), id.clone());
        Ok(self.matching_rows(entity, &filter).into_iter().next())
    }
}

/// Whether `row` satisfies `filter`
pub fn matches(row: &Row, filter: &NormalizedFilter) -> bool {
    filter.attributes.iter().all(|(attribute, constraint)| {
        let field = row.get(attribute).unwrap_or(&Value::Null);
        satisfies(field, constraint)
    }) && filter.and.iter().all(|f| matches(row, f))
        && (filter.or.is_empty() || filter.or.iter().any(|f| matches(row, f)))
}

fn satisfies(field: &Value, constraint: &Constraint) -> bool {
    match constraint {
        Constraint::Equals(expected) => values_equal(field, expected),
        Constraint::Operators(operators) => operators
            .iter()
            .all(|(comparison, operand)| compare(field, *comparison, operand)),
        Constraint::NoResult => false,
    }
}

fn compare(field: &Value, comparison: Comparison, operand: &Value) -> bool {
    let ordering = || compare_values(field, operand);
    let in_list = || {
        operand
            .as_array()
            .is_some_and(|items| items.iter().any(|item| values_equal(field, item)))
    };
    let text = |check: fn(&str, &str) -> bool| match (field, operand) {
        (Value::String(field), Value::String(operand)) => check(field, operand),
        _ => false,
    };

    match comparison {
        Comparison::Lt => ordering() == Some(Ordering::Less),
        Comparison::Lte => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
        Comparison::Gt => ordering() == Some(Ordering::Greater),
        Comparison::Gte => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        Comparison::Ne => !values_equal(field, operand),
        Comparison::In => !field.is_null() && in_list(),
        Comparison::NotIn => field.is_null() || !in_list(),
        Comparison::Contains => text(|f, o| f.contains(o)),
        Comparison::StartsWith => text(|f, o| f.starts_with(o)),
        Comparison::EndsWith => text(|f, o| f.ends_with(o)),
        Comparison::NotContains => text(|f, o| !f.contains(o)),
        Comparison::NotStartsWith => text(|f, o| !f.starts_with(o)),
        Comparison::NotEndsWith => text(|f, o| !f.ends_with(o)),
    }
}

fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(_), Value::Number(_)) => compare_values(a, b) == Some(Ordering::Equal),
        _ => a == b,
    }
}

/// Ordering between two values of the same kind; `None` across kinds
fn compare_values(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(a), Value::Number(b)) => match (a.as_i64(), b.as_i64()) {
            (Some(a), Some(b)) => Some(a.cmp(&b)),
            _ => a.as_f64()?.partial_cmp(&b.as_f64()?),
        },
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        (Value::Null, Value::Null) => Some(Ordering::Equal),
        _ => None,
    }
}

/// Total order used for sorting: null < bool < number < string < array < object
fn sort_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Bool(_) => 1,
        Value::Number(_) => 2,
        Value::String(_) => 3,
        Value::Array(_) => 4,
        Value::Object(_) => 5,
    }
}

fn compare_rows(a: &Row, b: &Row, order: &[OrderBy]) -> Ordering {
    for key in order {
        let left = a.get(&key.attribute).unwrap_or(&Value::Null);
        let right = b.get(&key.attribute).unwrap_or(&Value::Null);
        let ordering = compare_values(left, right)
            .unwrap_or_else(|| sort_rank(left).cmp(&sort_rank(right)));
        let ordering = match key.direction {
            SortDirection::Asc => ordering,
            SortDirection::Desc => ordering.reverse(),
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
    Ordering::Equal
}
