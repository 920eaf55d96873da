//! Normalized filter tree handed to storage backends
//!
//! The canonical JSON form uses internal attribute names and `$`-prefixed keys:
//!
//! ```json
//! { "last_name": "Doe", "first_name": { "$gte": "J" }, "$or": [ ... ] }
//! ```
//!
//! Each attribute carries exactly one [`Constraint`]: an exact match, a set of
//! comparison operators, or the never-matching `$noResult` marker.

use std::collections::BTreeMap;

use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;

use super::operator::{Comparison, NO_RESULT_SYMBOL};

/// Constraint on a single attribute
#[derive(Debug, Clone, PartialEq)]
pub enum Constraint {
    /// Exact match (`null` matches missing/NULL values)
    Equals(Value),
    /// One or more comparisons, all of which must hold
    Operators(BTreeMap<Comparison, Value>),
    /// Never matches; emitted when a lookup resolved to zero IDs
    NoResult,
}

impl Constraint {
    /// A single-operator constraint
    pub fn op(comparison: Comparison, value: impl Into<Value>) -> Self {
        let mut operators = BTreeMap::new();
        operators.insert(comparison, value.into());
        Constraint::Operators(operators)
    }

    /// ID membership constraint; an empty list becomes [`Constraint::NoResult`]
    pub fn one_of(ids: Vec<Value>) -> Self {
        if ids.is_empty() {
            Constraint::NoResult
        } else {
            Constraint::op(Comparison::In, Value::Array(ids))
        }
    }

    fn to_json(&self) -> Value {
        match self {
            Constraint::Equals(value) => value.clone(),
            Constraint::Operators(operators) => Value::Object(
                operators
                    .iter()
                    .map(|(c, v)| (c.symbol().to_string(), v.clone()))
                    .collect(),
            ),
            Constraint::NoResult => {
                let mut marker = serde_json::Map::new();
                marker.insert(NO_RESULT_SYMBOL.to_string(), Value::Bool(true));
                Value::Object(marker)
            }
        }
    }
}

/// A compiled filter level: attribute constraints plus nested `$and`/`$or` groups.
///
/// All attribute constraints and all `$and` members must hold; when `$or` is
/// non-empty at least one of its members must hold.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NormalizedFilter {
    pub attributes: BTreeMap<String, Constraint>,
    pub and: Vec<NormalizedFilter>,
    pub or: Vec<NormalizedFilter>,
}

impl NormalizedFilter {
    /// Filter that matches every row
    pub fn all() -> Self {
        Self::default()
    }

    /// Single-attribute filter
    pub fn attribute(name: impl Into<String>, constraint: Constraint) -> Self {
        Self::default().with(name, constraint)
    }

    /// Single-attribute exact match
    pub fn equals(name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::attribute(name, Constraint::Equals(value.into()))
    }

    pub fn with(mut self, name: impl Into<String>, constraint: Constraint) -> Self {
        self.attributes.insert(name.into(), constraint);
        self
    }

    /// Disjunction of `branches`
    pub fn any_of(branches: Vec<NormalizedFilter>) -> Self {
        Self {
            or: branches,
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty() && self.and.is_empty() && self.or.is_empty()
    }

    /// Conjoin two filters.
    ///
    /// Never merges constraints on the same attribute; a non-trivial `other` is
    /// appended as an `$and` member instead.
    pub fn and_also(mut self, other: NormalizedFilter) -> Self {
        if other.is_empty() {
            return self;
        }
        if self.is_empty() {
            return other;
        }
        self.and.push(other);
        self
    }

    /// Canonical JSON representation
    pub fn to_json(&self) -> Value {
        let mut map = serde_json::Map::new();
        for (name, constraint) in &self.attributes {
            map.insert(name.clone(), constraint.to_json());
        }
        if !self.and.is_empty() {
            map.insert(
                "$and".to_string(),
                Value::Array(self.and.iter().map(NormalizedFilter::to_json).collect()),
            );
        }
        if !self.or.is_empty() {
            map.insert(
                "$or".to_string(),
                Value::Array(self.or.iter().map(NormalizedFilter::to_json).collect()),
            );
        }
        Value::Object(map)
    }
}

impl Serialize for NormalizedFilter {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.to_json() {
            Value::Object(map) => {
                let mut out = serializer.serialize_map(Some(map.len()))?;
                for (key, value) in &map {
                    out.serialize_entry(key, value)?;
                }
                out.end()
            }
            other => other.serialize(serializer),
        }
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;
    use serde_json::json;

    use super::*;

    #[test]
    fn test_canonical_json_shape() {
        let filter = NormalizedFilter::equals("lastName", "Doe")
            .with("firstName", Constraint::op(Comparison::Gte, "J"))
            .with("authorId", Constraint::NoResult);

        assert_eq!(
            serde_json::to_value(&filter).unwrap(),
            json!({
                "lastName": "Doe",
                "firstName": { "$gte": "J" },
                "authorId": { "$noResult": true },
            })
        );
    }

    #[test]
    fn test_one_of_empty_is_no_result() {
        assert_eq!(Constraint::one_of(vec![]), Constraint::NoResult);
        assert_eq!(
            Constraint::one_of(vec![json!(1), json!(2)]),
            Constraint::op(Comparison::In, json!([1, 2]))
        );
    }

    #[test]
    fn test_and_also_keeps_constraints_apart() {
        let left = NormalizedFilter::equals("ownerId", "u-1");
        let right = NormalizedFilter::attribute("ownerId", Constraint::op(Comparison::Ne, "u-2"));

        let combined = left.clone().and_also(right.clone());
        assert_eq!(combined.attributes.get("ownerId"), left.attributes.get("ownerId"));
        assert_eq!(combined.and, vec![right.clone()]);

        assert_eq!(NormalizedFilter::all().and_also(right.clone()), right);
        assert_eq!(left.clone().and_also(NormalizedFilter::all()), left);
    }

    #[test]
    fn test_nested_groups_serialize() {
        let filter = NormalizedFilter::any_of(vec![
            NormalizedFilter::equals("a", 1),
            NormalizedFilter::equals("b", 2),
        ])
        .and_also(NormalizedFilter::equals("c", 3));

        assert_eq!(
            filter.to_json(),
            json!({ "$and": [{ "c": 3 }], "$or": [{ "a": 1 }, { "b": 2 }] })
        );
    }
}
