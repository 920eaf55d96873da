//! SQL rendering of normalized filters
//!
//! Produces SQLite-dialect statements with numbered `?N` placeholders and the
//! values to bind, so no client value is ever interpolated into SQL text.

use std::fmt::Write as _;

use serde_json::Value;

use super::{FindArgs, ParentConnection, StorageError};
use crate::connection::PageWindow;
use crate::filter::{Comparison, Constraint, NormalizedFilter};
use crate::model::EntityDescriptor;

/// SQL value type for parameterized queries
#[derive(Debug, Clone, PartialEq)]
pub enum SqlValue {
    String(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    Null,
}

impl SqlValue {
    /// Convert a JSON value; arrays and objects are bound as JSON text
    pub fn from_json(value: &Value) -> Self {
        match value {
            Value::Null => SqlValue::Null,
            Value::Bool(b) => SqlValue::Bool(*b),
            Value::Number(n) => match n.as_i64() {
                Some(i) => SqlValue::Int(i),
                None => SqlValue::Float(n.as_f64().unwrap_or_default()),
            },
            Value::String(s) => SqlValue::String(s.clone()),
            other => SqlValue::String(other.to_string()),
        }
    }

    /// Bind this value to a sqlx query builder
    #[cfg(feature = "sqlite")]
    pub fn bind_to_query<'q>(
        &'q self,
        query: sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>>,
    ) -> sqlx::query::Query<'q, sqlx::Sqlite, sqlx::sqlite::SqliteArguments<'q>> {
        match self {
            SqlValue::String(s) => query.bind(s.as_str()),
            SqlValue::Int(i) => query.bind(*i),
            SqlValue::Float(f) => query.bind(*f),
            SqlValue::Bool(b) => query.bind(if *b { 1i32 } else { 0i32 }),
            SqlValue::Null => query.bind(None::<String>),
        }
    }
}

/// A rendered statement and its bind values, in placeholder order
#[derive(Debug, Clone, PartialEq)]
pub struct SqlQuery {
    pub sql: String,
    pub values: Vec<SqlValue>,
}

/// Quote an identifier, doubling embedded quotes
pub fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Render `filter` as a WHERE condition, appending bind values to `values`.
///
/// Returns `None` for a filter that matches every row.
pub fn render_where(filter: &NormalizedFilter, values: &mut Vec<SqlValue>) -> Option<String> {
    let mut parts = Vec::new();

    for (attribute, constraint) in &filter.attributes {
        let column = quote_ident(attribute);
        match constraint {
            Constraint::Equals(Value::Null) => parts.push(format!("{column} IS NULL")),
            Constraint::Equals(value) => {
                let param = bind(values, value);
                parts.push(format!("{column} = {param}"));
            }
            Constraint::Operators(operators) => {
                for (comparison, operand) in operators {
                    parts.push(render_comparison(&column, *comparison, operand, values));
                }
            }
            Constraint::NoResult => parts.push("0 = 1".to_string()),
        }
    }

    for nested in &filter.and {
        if let Some(condition) = render_where(nested, values) {
            parts.push(format!("({condition})"));
        }
    }

    if !filter.or.is_empty() {
        let mut branches = Vec::with_capacity(filter.or.len());
        for nested in &filter.or {
            match render_where(nested, values) {
                Some(condition) => branches.push(format!("({condition})")),
                // an unconstrained branch makes the whole disjunction true
                None => branches.push("1 = 1".to_string()),
            }
        }
        parts.push(format!("({})", branches.join(" OR ")));
    }

    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" AND "))
    }
}

fn bind(values: &mut Vec<SqlValue>, value: &Value) -> String {
    values.push(SqlValue::from_json(value));
    format!("?{}", values.len())
}

fn bind_list(values: &mut Vec<SqlValue>, items: &[Value]) -> String {
    items
        .iter()
        .map(|item| bind(values, item))
        .collect::<Vec<_>>()
        .join(", ")
}

fn render_comparison(
    column: &str,
    comparison: Comparison,
    operand: &Value,
    values: &mut Vec<SqlValue>,
) -> String {
    match comparison {
        Comparison::In => render_list(column, false, operand, values),
        Comparison::NotIn => render_list(column, true, operand, values),
        Comparison::Lt => format!("{column} < {}", bind(values, operand)),
        Comparison::Lte => format!("{column} <= {}", bind(values, operand)),
        Comparison::Gt => format!("{column} > {}", bind(values, operand)),
        Comparison::Gte => format!("{column} >= {}", bind(values, operand)),
        Comparison::Ne => format!("{column} IS NOT {}", bind(values, operand)),
        Comparison::Contains => format!("instr({column}, {}) > 0", bind(values, operand)),
        Comparison::NotContains => format!("instr({column}, {}) = 0", bind(values, operand)),
        Comparison::StartsWith => {
            let p = bind(values, operand);
            format!("substr({column}, 1, length({p})) = {p}")
        }
        Comparison::NotStartsWith => {
            let p = bind(values, operand);
            format!("substr({column}, 1, length({p})) <> {p}")
        }
        Comparison::EndsWith => {
            let p = bind(values, operand);
            format!("({column} IS NOT NULL AND (length({p}) = 0 OR substr({column}, -length({p})) = {p}))")
        }
        Comparison::NotEndsWith => {
            let p = bind(values, operand);
            format!("({column} IS NOT NULL AND length({p}) > 0 AND substr({column}, -length({p})) <> {p})")
        }
    }
}

/// `IN` / `NOT IN`; `NOT IN` also admits `NULL`
fn render_list(column: &str, negated: bool, operand: &Value, values: &mut Vec<SqlValue>) -> String {
    let items: &[Value] = operand.as_array().map(Vec::as_slice).unwrap_or_default();

    match (negated, items.is_empty()) {
        (false, true) => "0 = 1".to_string(),
        (false, false) => format!("{column} IN ({})", bind_list(values, items)),
        (true, true) => "1 = 1".to_string(),
        (true, false) => format!(
            "({column} IS NULL OR {column} NOT IN ({}))",
            bind_list(values, items)
        ),
    }
}

fn push_where(sql: &mut String, filter: &NormalizedFilter, values: &mut Vec<SqlValue>) {
    if let Some(condition) = render_where(filter, values) {
        sql.push_str(" WHERE ");
        sql.push_str(&condition);
    }
}

fn column_list(entity: &EntityDescriptor, projection: Option<&[String]>) -> String {
    let columns: Vec<String> = match projection {
        Some(columns) => columns.iter().map(|c| quote_ident(c)).collect(),
        None => entity.attributes().iter().map(|a| quote_ident(&a.name)).collect(),
    };
    columns.join(", ")
}

/// SELECT for a `find` call: effective filter, window ordering and look-ahead limit
pub fn select_sql(
    entity: &EntityDescriptor,
    args: &FindArgs,
    parent: Option<&ParentConnection>,
) -> SqlQuery {
    let window = PageWindow::from_args(args);
    let mut values = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(entity, args.projection.as_deref()),
        quote_ident(entity.table())
    );

    push_where(&mut sql, &args.effective_filter(parent), &mut values);

    let order = window.order_for(&args.order_by);
    if !order.is_empty() {
        let clauses: Vec<String> = order
            .iter()
            .map(|o| format!("{} {}", quote_ident(&o.attribute), o.direction.as_sql()))
            .collect();
        sql.push_str(" ORDER BY ");
        sql.push_str(&clauses.join(", "));
    }

    match (window.fetch_limit(), window.offset) {
        (Some(limit), 0) => {
            let _ = write!(sql, " LIMIT {limit}");
        }
        (Some(limit), offset) => {
            let _ = write!(sql, " LIMIT {limit} OFFSET {offset}");
        }
        (None, 0) => {}
        (None, offset) => {
            let _ = write!(sql, " LIMIT -1 OFFSET {offset}");
        }
    }

    SqlQuery { sql, values }
}

/// COUNT over the filter and parent constraint
pub fn count_sql(
    entity: &EntityDescriptor,
    args: &FindArgs,
    parent: Option<&ParentConnection>,
) -> SqlQuery {
    let mut values = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", quote_ident(entity.table()));
    push_where(&mut sql, &args.base_filter(parent), &mut values);
    SqlQuery { sql, values }
}

/// SELECT of one row by primary key
pub fn find_one_sql(entity: &EntityDescriptor, id: &Value) -> Result<SqlQuery, StorageError> {
    let primary = entity.primary_attribute().ok_or_else(|| {
        StorageError::Unsupported(format!("entity '{}' has no primary attribute", entity.name()))
    })?;

    let mut values = Vec::new();
    let mut sql = format!(
        "SELECT {} FROM {}",
        column_list(entity, None),
        quote_ident(entity.table())
    );
    push_where(
        &mut sql,
        &NormalizedFilter::equals(primary.name.clone(), id.clone()),
        &mut values,
    );
    sql.push_str(" LIMIT 1");
    Ok(SqlQuery { sql, values })
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::connection::{Cursor, OrderBy};
    use crate::model::AttributeDescriptor;

    fn book() -> EntityDescriptor {
        EntityDescriptor::builder("Book")
            .table("books")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::string("title"))
            .attribute(AttributeDescriptor::integer("year"))
            .build()
            .unwrap()
    }

    fn render(filter: &NormalizedFilter) -> (Option<String>, Vec<SqlValue>) {
        let mut values = Vec::new();
        let sql = render_where(filter, &mut values);
        (sql, values)
    }

    #[test]
    fn test_render_exact_and_operators() {
        let filter = NormalizedFilter::equals("title", "Dune")
            .with("year", Constraint::op(Comparison::Gte, json!(1960)))
            .with("id", Constraint::op(Comparison::In, json!([1, 2])));

        let (sql, values) = render(&filter);
        assert_eq!(
            sql.unwrap(),
            r#""id" IN (?1, ?2) AND "title" = ?3 AND "year" >= ?4"#
        );
        assert_eq!(
            values,
            vec![
                SqlValue::Int(1),
                SqlValue::Int(2),
                SqlValue::String("Dune".into()),
                SqlValue::Int(1960),
            ]
        );
    }

    #[test]
    fn test_render_groups_and_markers() {
        let filter = NormalizedFilter::any_of(vec![
            NormalizedFilter::equals("title", Value::Null),
            NormalizedFilter::attribute("year", Constraint::NoResult),
        ])
        .and_also(NormalizedFilter::attribute(
            "title",
            Constraint::op(Comparison::NotIn, json!(["x"])),
        ));

        let (sql, values) = render(&filter);
        assert_eq!(
            sql.unwrap(),
            r#"(("title" IS NULL OR "title" NOT IN (?1))) AND (("title" IS NULL) OR (0 = 1))"#
        );
        assert_eq!(values, vec![SqlValue::String("x".into())]);
    }

    #[test]
    fn test_render_text_operators_reuse_placeholder() {
        let (sql, values) = render(&NormalizedFilter::attribute(
            "title",
            Constraint::op(Comparison::StartsWith, json!("Du")),
        ));
        assert_eq!(sql.unwrap(), r#"substr("title", 1, length(?1)) = ?1"#);
        assert_eq!(values.len(), 1);
    }

    #[test]
    fn test_empty_filter_renders_nothing() {
        assert_eq!(render(&NormalizedFilter::all()), (None, vec![]));
        let (sql, _) = render(&NormalizedFilter::attribute("id", Constraint::op(Comparison::In, json!([]))));
        assert_eq!(sql.unwrap(), "0 = 1");
    }

    #[test]
    fn test_render_list_operators() {
        let (sql, values) = render(&NormalizedFilter::attribute(
            "id",
            Constraint::op(Comparison::NotIn, json!([])),
        ));
        assert_eq!(sql.unwrap(), "1 = 1");
        assert!(values.is_empty());

        let (sql, values) = render(&NormalizedFilter::attribute(
            "year",
            Constraint::op(Comparison::NotIn, json!([1965, 1984])),
        ));
        assert_eq!(sql.unwrap(), r#"("year" IS NULL OR "year" NOT IN (?1, ?2))"#);
        assert_eq!(values, vec![SqlValue::Int(1965), SqlValue::Int(1984)]);
    }

    #[test]
    fn test_select_sql_with_window_and_seek() {
        let args = FindArgs {
            filter: NormalizedFilter::equals("year", 1965),
            order_by: vec![OrderBy::asc("id")],
            first: Some(10),
            after: Some(Cursor::from_pairs("Book", vec![("id".into(), json!(5))])),
            ..Default::default()
        };

        let query = select_sql(&book(), &args, None);
        assert_eq!(
            query.sql,
            r#"SELECT "id", "title", "year" FROM "books" WHERE "year" = ?1 AND ("id" > ?2) ORDER BY "id" ASC LIMIT 11"#
        );
        assert_eq!(query.values, vec![SqlValue::Int(1965), SqlValue::Int(5)]);
    }

    #[test]
    fn test_select_sql_backward_with_offset() {
        let args = FindArgs {
            order_by: vec![OrderBy::desc("year"), OrderBy::asc("id")],
            last: Some(3),
            offset: Some(2),
            projection: Some(vec!["id".into()]),
            ..Default::default()
        };
        assert_eq!(
            select_sql(&book(), &args, None).sql,
            r#"SELECT "id" FROM "books" ORDER BY "year" ASC, "id" DESC LIMIT 4 OFFSET 2"#
        );

        let offset_only = FindArgs {
            offset: Some(5),
            ..Default::default()
        };
        assert_eq!(
            select_sql(&book(), &offset_only, None).sql,
            r#"SELECT "id", "title", "year" FROM "books" LIMIT -1 OFFSET 5"#
        );
    }

    #[test]
    fn test_count_ignores_window() {
        let args = FindArgs {
            filter: NormalizedFilter::equals("year", 1965),
            first: Some(1),
            after: Some(Cursor::from_pairs("Book", vec![("id".into(), json!(5))])),
            ..Default::default()
        };
        let query = count_sql(&book(), &args, Some(&ParentConnection::new("author_id", 3)));
        assert_eq!(
            query.sql,
            r#"SELECT COUNT(*) FROM "books" WHERE "year" = ?1 AND ("author_id" = ?2)"#
        );
    }

    #[test]
    fn test_quote_ident_escapes() {
        assert_eq!(quote_ident(r#"we"ird"#), r#""we""ird""#);
        let query = find_one_sql(&book(), &json!(7)).unwrap();
        assert_eq!(query.sql, r#"SELECT "id", "title", "year" FROM "books" WHERE "id" = ?1 LIMIT 1"#);
    }
}
