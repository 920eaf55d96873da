//! SQLite storage backend
//!
//! Renders each call with [`super::sql`], binds the values in placeholder order and
//! decodes rows dynamically according to the entity's attribute types.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::sqlite::{SqlitePool, SqliteRow};
use sqlx::{Column, Row as _, TypeInfo, ValueRef};

use super::sql::{self, SqlQuery};
use super::{FindArgs, ParentConnection, Row, Storage, StorageError, StoragePage};
use crate::connection::PageWindow;
use crate::context::RequestContext;
use crate::model::{EntityDescriptor, ValueType};

/// [`Storage`] over a SQLite connection pool; each entity maps to its table
#[derive(Debug, Clone)]
pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    async fn fetch(&self, query: &SqlQuery) -> Result<Vec<SqliteRow>, StorageError> {
        let mut q = sqlx::query(&query.sql);
        for value in &query.values {
            q = value.bind_to_query(q);
        }
        Ok(q.fetch_all(&self.pool).await?)
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn find(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        _context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<StoragePage, StorageError> {
        let query = sql::select_sql(entity, args, parent);
        tracing::debug!(sql = %query.sql, entity = entity.name(), "Executing entity query");

        let rows = self
            .fetch(&query)
            .await?
            .iter()
            .map(|row| decode_row(entity, row))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(PageWindow::from_args(args).finish(rows, args.after.is_some(), args.before.is_some()))
    }

    async fn count(
        &self,
        entity: &EntityDescriptor,
        args: &FindArgs,
        _context: &RequestContext,
        parent: Option<&ParentConnection>,
    ) -> Result<u64, StorageError> {
        let query = sql::count_sql(entity, args, parent);
        tracing::debug!(sql = %query.sql, entity = entity.name(), "Executing count query");

        let rows = self.fetch(&query).await?;
        let count: i64 = match rows.first() {
            Some(row) => row.try_get(0)?,
            None => 0,
        };
        Ok(count.max(0) as u64)
    }

    async fn find_one(
        &self,
        entity: &EntityDescriptor,
        id: &Value,
        _context: &RequestContext,
    ) -> Result<Option<Row>, StorageError> {
        let query = sql::find_one_sql(entity, id)?;
        tracing::debug!(sql = %query.sql, entity = entity.name(), "Executing lookup query");

        self.fetch(&query)
            .await?
            .first()
            .map(|row| decode_row(entity, row))
            .transpose()
    }
}

/// Decode a result row into JSON keyed by column name
fn decode_row(entity: &EntityDescriptor, row: &SqliteRow) -> Result<Row, StorageError> {
    let mut decoded = Row::new();
    for column in row.columns() {
        let name = column.name();
        let value_type = entity.attribute(name).map(|a| a.value_type);
        decoded.insert(name.to_string(), decode_column(row, column.ordinal(), name, value_type)?);
    }
    Ok(decoded)
}

fn decode_column(
    row: &SqliteRow,
    idx: usize,
    name: &str,
    value_type: Option<ValueType>,
) -> Result<Value, StorageError> {
    let storage_class = {
        let raw = row.try_get_raw(idx)?;
        if raw.is_null() {
            return Ok(Value::Null);
        }
        raw.type_info().name().to_string()
    };

    let decode_err = |reason: String| StorageError::Decode {
        column: name.to_string(),
        reason,
    };

    match storage_class.as_str() {
        "INTEGER" => {
            let v: i64 = row.try_get(idx)?;
            Ok(match value_type {
                Some(ValueType::Boolean) => Value::Bool(v != 0),
                Some(ValueType::Float) => serde_json::Number::from_f64(v as f64)
                    .map(Value::Number)
                    .unwrap_or(Value::Null),
                _ => Value::from(v),
            })
        }
        "REAL" => {
            let v: f64 = row.try_get(idx)?;
            serde_json::Number::from_f64(v)
                .map(Value::Number)
                .ok_or_else(|| decode_err(format!("non-finite real {v}")))
        }
        "TEXT" => {
            let v: String = row.try_get(idx)?;
            match value_type {
                Some(ValueType::Json) => {
                    serde_json::from_str(&v).map_err(|e| decode_err(e.to_string()))
                }
                _ => Ok(Value::String(v)),
            }
        }
        other => Err(decode_err(format!("unsupported storage class {other}"))),
    }
}
