//! Opaque pagination cursors
//!
//! A cursor records the sort-key values of one row:
//!
//! ```json
//! { "Book": [["year", 2021], ["id", 17]] }
//! ```
//!
//! The entity-name key prevents reusing a cursor on another entity. At the wire
//! boundary the JSON form is base64 encoded.

use base64::{Engine, engine::general_purpose::STANDARD as BASE64};
use serde_json::Value;

use super::args::{OrderBy, SortDirection};
use crate::error::{QueryError, Result};
use crate::filter::{Comparison, Constraint, NormalizedFilter};
use crate::model::EntityDescriptor;
use crate::storage::Row;

/// Which side of a cursor a page lies on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SeekDirection {
    After,
    Before,
}

/// Decoded cursor: entity name plus ordered `(attribute, value)` pairs
#[derive(Debug, Clone, PartialEq)]
pub struct Cursor {
    entity: String,
    values: Vec<(String, Value)>,
}

impl Cursor {
    pub fn from_pairs(entity: impl Into<String>, values: Vec<(String, Value)>) -> Self {
        Self {
            entity: entity.into(),
            values,
        }
    }

    /// Cursor for `row` under `order_by`, terminated by the primary attribute.
    ///
    /// Missing row values are recorded as `null`.
    pub fn encode(
        entity_name: &str,
        primary: Option<&str>,
        order_by: &[OrderBy],
        row: &Row,
    ) -> Self {
        let value_of = |attribute: &str| row.get(attribute).cloned().unwrap_or(Value::Null);

        let mut values: Vec<(String, Value)> = order_by
            .iter()
            .map(|order| (order.attribute.clone(), value_of(&order.attribute)))
            .collect();

        if let Some(primary) = primary {
            if !values.iter().any(|(attribute, _)| attribute == primary) {
                values.push((primary.to_string(), value_of(primary)));
            }
        }

        Self::from_pairs(entity_name, values)
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn values(&self) -> &[(String, Value)] {
        &self.values
    }

    pub fn value(&self, attribute: &str) -> Option<&Value> {
        self.values
            .iter()
            .find(|(name, _)| name == attribute)
            .map(|(_, value)| value)
    }

    pub fn to_json(&self) -> Value {
        let pairs = self
            .values
            .iter()
            .map(|(attribute, value)| Value::Array(vec![Value::from(attribute.clone()), value.clone()]))
            .collect();

        let mut map = serde_json::Map::with_capacity(1);
        map.insert(self.entity.clone(), Value::Array(pairs));
        Value::Object(map)
    }

    pub fn from_json(value: &Value) -> Result<Self> {
        let map = value
            .as_object()
            .ok_or_else(|| QueryError::invalid_cursor("expected an object"))?;

        let mut entries = map.iter();
        let (entity, pairs) = match (entries.next(), entries.next()) {
            (Some(entry), None) => entry,
            (None, _) => return Err(QueryError::invalid_cursor("missing entity key")),
            (Some(_), Some(_)) => return Err(QueryError::invalid_cursor("more than one entity key")),
        };

        let pairs = pairs
            .as_array()
            .ok_or_else(|| QueryError::invalid_cursor("expected a list of attribute/value pairs"))?;
        if pairs.is_empty() {
            return Err(QueryError::invalid_cursor("cursor carries no values"));
        }

        let values = pairs
            .iter()
            .map(|pair| match pair.as_array().map(Vec::as_slice) {
                Some([Value::String(attribute), value]) => Ok((attribute.clone(), value.clone())),
                _ => Err(QueryError::invalid_cursor(
                    "each entry must be an [attribute, value] pair",
                )),
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Self::from_pairs(entity.clone(), values))
    }

    /// Opaque wire form
    pub fn serialize(&self) -> String {
        BASE64.encode(self.to_json().to_string())
    }

    pub fn deserialize(encoded: &str) -> Result<Self> {
        let bytes = BASE64
            .decode(encoded)
            .map_err(|_| QueryError::invalid_cursor("not valid base64"))?;
        let value: Value = serde_json::from_slice(&bytes)
            .map_err(|_| QueryError::invalid_cursor("not valid JSON"))?;
        Self::from_json(&value)
    }

    /// Check the cursor was issued for `entity` under the same sort order.
    ///
    /// The attributes must equal the `order_by` attributes in order, optionally
    /// followed by the primary attribute.
    pub fn validate_for(&self, entity: &EntityDescriptor, order_by: &[OrderBy]) -> Result<()> {
        if self.entity != entity.name() {
            return Err(QueryError::invalid_cursor(format!(
                "cursor was issued for entity '{}', not '{}'",
                self.entity,
                entity.name()
            )));
        }

        let attributes: Vec<&str> = self.values.iter().map(|(name, _)| name.as_str()).collect();
        let expected: Vec<&str> = order_by.iter().map(|o| o.attribute.as_str()).collect();

        let matches = attributes == expected
            || entity.primary_attribute().is_some_and(|primary| {
                !expected.contains(&primary.name.as_str())
                    && attributes.len() == expected.len() + 1
                    && attributes[..expected.len()] == expected[..]
                    && attributes[expected.len()] == primary.name
            });

        if !matches {
            return Err(QueryError::invalid_cursor(
                "cursor does not match the requested sort order",
            ));
        }
        Ok(())
    }

    /// Keyset filter selecting the rows strictly on `direction`'s side of this cursor.
    ///
    /// Expands to the lexicographic disjunction
    /// `k0 > v0 OR (k0 = v0 AND k1 > v1) OR ...` with each comparison flipped for
    /// descending keys and for `Before`. `null` sorts before every other value.
    pub fn seek_filter(&self, order_by: &[OrderBy], direction: SeekDirection) -> NormalizedFilter {
        let mut branches = Vec::with_capacity(self.values.len());

        for (idx, (attribute, value)) in self.values.iter().enumerate() {
            let sort = order_by
                .iter()
                .find(|order| order.attribute == *attribute)
                .map(|order| order.direction)
                .unwrap_or_default();
            let greater = matches!(
                (direction, sort),
                (SeekDirection::After, SortDirection::Asc) | (SeekDirection::Before, SortDirection::Desc)
            );

            let Some(step) = seek_step(attribute, value, greater) else {
                continue;
            };

            let mut branch = step;
            for (prefix_attribute, prefix_value) in &self.values[..idx] {
                branch
                    .attributes
                    .insert(prefix_attribute.clone(), Constraint::Equals(prefix_value.clone()));
            }
            branches.push(branch);
        }

        match branches.len() {
            0 => match self.values.first() {
                Some((attribute, _)) => NormalizedFilter::attribute(attribute.clone(), Constraint::NoResult),
                None => NormalizedFilter::all(),
            },
            1 => branches.remove(0),
            _ => NormalizedFilter::any_of(branches),
        }
    }
}

/// Rows whose `attribute` sorts strictly greater (or less) than `value`
fn seek_step(attribute: &str, value: &Value, greater: bool) -> Option<NormalizedFilter> {
    match (greater, value) {
        (true, Value::Null) => Some(NormalizedFilter::attribute(
            attribute,
            Constraint::op(Comparison::Ne, Value::Null),
        )),
        (true, value) => Some(NormalizedFilter::attribute(
            attribute,
            Constraint::op(Comparison::Gt, value.clone()),
        )),
        (false, Value::Null) => None,
        (false, value) => Some(NormalizedFilter::any_of(vec![
            NormalizedFilter::attribute(attribute, Constraint::op(Comparison::Lt, value.clone())),
            NormalizedFilter::equals(attribute, Value::Null),
        ])),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;
    use crate::model::AttributeDescriptor;

    fn book() -> EntityDescriptor {
        EntityDescriptor::builder("Book")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::string("title"))
            .attribute(AttributeDescriptor::integer("year"))
            .build()
            .unwrap()
    }

    fn row(value: Value) -> Row {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_encode_follows_order_and_appends_primary() {
        let order_by = vec![OrderBy::desc("year"), OrderBy::asc("title")];
        let cursor = Cursor::encode(
            "Book",
            Some("id"),
            &order_by,
            &row(json!({ "id": 9, "title": "Dune", "year": 1965 })),
        );

        assert_eq!(
            cursor.to_json(),
            json!({ "Book": [["year", 1965], ["title", "Dune"], ["id", 9]] })
        );
    }

    #[test]
    fn test_encode_does_not_duplicate_primary() {
        let order_by = vec![OrderBy::asc("title"), OrderBy::asc("id")];
        let cursor = Cursor::encode("Book", Some("id"), &order_by, &row(json!({ "id": 1, "title": "A" })));
        assert_eq!(cursor.values().len(), 2);
        assert_eq!(cursor.value("title"), Some(&json!("A")));
    }

    #[test]
    fn test_round_trip() {
        let order_by = vec![OrderBy::asc("title"), OrderBy::asc("id")];
        let rows = [
            json!({ "id": 1, "title": "Dune" }),
            json!({ "id": "b-2", "title": null }),
            json!({ "id": 3, "title": "Ünïcödé / + =" }),
        ];

        for value in rows {
            let cursor = Cursor::encode("Book", Some("id"), &order_by, &row(value));
            assert_eq!(Cursor::deserialize(&cursor.serialize()).unwrap(), cursor);
        }
    }

    #[test]
    fn test_deserialize_rejects_malformed_payloads() {
        let encode = |value: Value| BASE64.encode(value.to_string());

        for bad in [
            "%%%".to_string(),
            BASE64.encode("not json"),
            encode(json!([1, 2])),
            encode(json!({})),
            encode(json!({ "Book": [] })),
            encode(json!({ "Book": [["id"]] })),
            encode(json!({ "Book": [[1, 2]] })),
            encode(json!({ "Book": [["id", 1]], "Author": [["id", 1]] })),
        ] {
            assert_matches!(
                Cursor::deserialize(&bad),
                Err(QueryError::InvalidCursor { .. }),
                "{bad} should be rejected"
            );
        }
    }

    #[test]
    fn test_validate_for_entity_and_order() {
        let entity = book();
        let order_by = vec![OrderBy::asc("title"), OrderBy::asc("id")];
        let cursor = Cursor::from_pairs("Book", vec![("title".into(), json!("A")), ("id".into(), json!(1))]);
        assert!(cursor.validate_for(&entity, &order_by).is_ok());

        let foreign = Cursor::from_pairs("Author", cursor.values().to_vec());
        assert_matches!(foreign.validate_for(&entity, &order_by), Err(QueryError::InvalidCursor { .. }));

        let reordered = vec![OrderBy::asc("year"), OrderBy::asc("id")];
        assert_matches!(cursor.validate_for(&entity, &reordered), Err(QueryError::InvalidCursor { .. }));
    }

    #[test]
    fn test_validate_accepts_trailing_primary() {
        let entity = book();
        let cursor = Cursor::from_pairs("Book", vec![("title".into(), json!("A")), ("id".into(), json!(1))]);
        assert!(cursor.validate_for(&entity, &[OrderBy::asc("title")]).is_ok());
    }

    #[test]
    fn test_seek_filter_after_ascending() {
        let order_by = vec![OrderBy::asc("year"), OrderBy::asc("id")];
        let cursor = Cursor::from_pairs("Book", vec![("year".into(), json!(2000)), ("id".into(), json!(4))]);

        assert_eq!(
            cursor.seek_filter(&order_by, SeekDirection::After).to_json(),
            json!({
                "$or": [
                    { "year": { "$gt": 2000 } },
                    { "year": 2000, "id": { "$gt": 4 } },
                ]
            })
        );
    }

    #[test]
    fn test_seek_filter_before_descending_includes_nulls() {
        let order_by = vec![OrderBy::asc("title")];
        let cursor = Cursor::from_pairs("Book", vec![("title".into(), json!("M"))]);

        assert_eq!(
            cursor.seek_filter(&order_by, SeekDirection::Before).to_json(),
            json!({ "$or": [{ "title": { "$lt": "M" } }, { "title": null }] })
        );

        let desc = vec![OrderBy::desc("title")];
        assert_eq!(
            cursor.seek_filter(&desc, SeekDirection::Before).to_json(),
            json!({ "title": { "$gt": "M" } })
        );
    }

    #[test]
    fn test_seek_filter_null_values() {
        let order_by = vec![OrderBy::asc("title"), OrderBy::asc("id")];
        let cursor = Cursor::from_pairs("Book", vec![("title".into(), json!(null)), ("id".into(), json!(2))]);

        assert_eq!(
            cursor.seek_filter(&order_by, SeekDirection::After).to_json(),
            json!({
                "$or": [
                    { "title": { "$ne": null } },
                    { "title": null, "id": { "$gt": 2 } },
                ]
            })
        );

        let only_null = Cursor::from_pairs("Book", vec![("title".into(), json!(null))]);
        assert_eq!(
            only_null.seek_filter(&order_by, SeekDirection::Before).to_json(),
            json!({ "title": { "$noResult": true } })
        );
    }
}
