//! Filter key parsing and the operator vocabulary of the filter DSL
//!
//! A filter key is either a bare public field name (exact match) or
//! `<field>__<operator>`. The **last** `__` is the operator delimiter, so attribute
//! names may themselves contain double underscores.

use std::fmt;

use serde_json::Value;

use crate::error::{QueryError, Result};

/// Delimiter between attribute name and operator in a filter key
pub const OPERATOR_DELIMITER: &str = "__";

/// Normalized marker for a constraint that can never match
pub const NO_RESULT_SYMBOL: &str = "$noResult";

/// A filter key split into attribute name and optional operator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SplitKey<'a> {
    pub attribute_name: &'a str,
    pub operator: Option<&'a str>,
}

/// Split a filter key on the last [`OPERATOR_DELIMITER`].
///
/// A delimiter at position 0 is part of the attribute name, not a split point.
/// An empty operator segment (`"name__"`) is an error.
pub fn split_attribute_and_filter_operator(key: &str) -> Result<SplitKey<'_>> {
    match key.rfind(OPERATOR_DELIMITER) {
        Some(0) | None => Ok(SplitKey {
            attribute_name: key,
            operator: None,
        }),
        Some(pos) => {
            let attribute_name = &key[..pos];
            let operator = &key[pos + OPERATOR_DELIMITER.len()..];
            if operator.is_empty() {
                return Err(QueryError::InvalidFilterKey {
                    key: key.to_string(),
                    path: String::new(),
                });
            }
            Ok(SplitKey {
                attribute_name,
                operator: Some(operator),
            })
        }
    }
}

/// Split a key that arrived as an arbitrary JSON value; only strings are keys.
pub fn split_filter_key(key: &Value) -> Result<SplitKey<'_>> {
    match key {
        Value::String(s) => split_attribute_and_filter_operator(s),
        other => Err(QueryError::InvalidFilterKey {
            key: other.to_string(),
            path: String::new(),
        }),
    }
}

/// Value comparison operators, each mapping to exactly one normalized symbol
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Comparison {
    Lt,
    Lte,
    Gt,
    Gte,
    Ne,
    In,
    NotIn,
    Contains,
    StartsWith,
    EndsWith,
    NotContains,
    NotStartsWith,
    NotEndsWith,
}

impl Comparison {
    pub const ALL: [Comparison; 13] = [
        Comparison::Lt,
        Comparison::Lte,
        Comparison::Gt,
        Comparison::Gte,
        Comparison::Ne,
        Comparison::In,
        Comparison::NotIn,
        Comparison::Contains,
        Comparison::StartsWith,
        Comparison::EndsWith,
        Comparison::NotContains,
        Comparison::NotStartsWith,
        Comparison::NotEndsWith,
    ];

    /// The normalized (storage-facing) symbol
    pub fn symbol(self) -> &'static str {
        match self {
            Comparison::Lt => "$lt",
            Comparison::Lte => "$lte",
            Comparison::Gt => "$gt",
            Comparison::Gte => "$gte",
            Comparison::Ne => "$ne",
            Comparison::In => "$in",
            Comparison::NotIn => "$not_in",
            Comparison::Contains => "$contains",
            Comparison::StartsWith => "$starts_with",
            Comparison::EndsWith => "$ends_with",
            Comparison::NotContains => "$not_contains",
            Comparison::NotStartsWith => "$not_starts_with",
            Comparison::NotEndsWith => "$not_ends_with",
        }
    }

    /// The client-facing operator keyword (the part after `__`)
    pub fn keyword(self) -> &'static str {
        &self.symbol()[1..]
    }

    /// Parse a normalized symbol such as `$gte`
    pub fn from_symbol(symbol: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|c| c.symbol() == symbol)
    }

    /// List-valued operators take an array of values
    pub fn is_list(self) -> bool {
        matches!(self, Comparison::In | Comparison::NotIn)
    }

    /// String-matching operators
    pub fn is_text(self) -> bool {
        matches!(
            self,
            Comparison::Contains
                | Comparison::StartsWith
                | Comparison::EndsWith
                | Comparison::NotContains
                | Comparison::NotStartsWith
                | Comparison::NotEndsWith
        )
    }

    pub(crate) fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Every operator the filter DSL accepts after the delimiter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterOperator {
    /// Plain value comparison
    Compare(Comparison),
    /// `attr__filter`: deep filter on a referenced entity
    Filter,
    /// `attr__pre_filter`: named server-side filter
    PreFilter,
}

impl FilterOperator {
    pub fn parse(keyword: &str) -> Option<Self> {
        match keyword {
            "filter" => Some(FilterOperator::Filter),
            "pre_filter" => Some(FilterOperator::PreFilter),
            other => Comparison::ALL
                .into_iter()
                .find(|c| c.keyword() == other)
                .map(FilterOperator::Compare),
        }
    }

    /// Deep filters and pre-filters resolve to an ID list through a lookup
    pub fn is_lookup(self) -> bool {
        matches!(self, FilterOperator::Filter | FilterOperator::PreFilter)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;

    fn split(key: &str) -> (String, Option<String>) {
        let parts = split_attribute_and_filter_operator(key).unwrap();
        (
            parts.attribute_name.to_string(),
            parts.operator.map(str::to_string),
        )
    }

    #[test]
    fn test_split_simple_operator() {
        assert_eq!(split("firstName__gte"), ("firstName".into(), Some("gte".into())));
        assert_eq!(split("lastName"), ("lastName".into(), None));
    }

    #[test]
    fn test_split_uses_last_delimiter() {
        assert_eq!(
            split("some__long_attribute__name__lte"),
            ("some__long_attribute__name".into(), Some("lte".into()))
        );
        assert_eq!(split("is_active__ne"), ("is_active".into(), Some("ne".into())));
    }

    #[test]
    fn test_leading_delimiter_is_part_of_name() {
        assert_eq!(split("__test"), ("__test".into(), None));
        assert_eq!(split("__"), ("__".into(), None));
        assert_eq!(split("__test__gte"), ("__test".into(), Some("gte".into())));
    }

    #[test]
    fn test_empty_operator_segment_is_rejected() {
        for key in ["name__", "name___", "x____"] {
            assert_matches!(
                split_attribute_and_filter_operator(key),
                Err(QueryError::InvalidFilterKey { .. }),
                "{key} should be rejected"
            );
        }
    }

    #[test]
    fn test_non_string_keys_are_rejected() {
        assert_matches!(split_filter_key(&json!(42)), Err(QueryError::InvalidFilterKey { .. }));
        assert_matches!(split_filter_key(&json!(null)), Err(QueryError::InvalidFilterKey { .. }));
        assert_eq!(
            split_filter_key(&json!("age__lt")).unwrap().operator,
            Some("lt")
        );
    }

    #[test]
    fn test_operator_parsing_is_exhaustive() {
        for comparison in Comparison::ALL {
            assert_eq!(
                FilterOperator::parse(comparison.keyword()),
                Some(FilterOperator::Compare(comparison))
            );
            assert_eq!(Comparison::from_symbol(comparison.symbol()), Some(comparison));
        }
        assert_eq!(FilterOperator::parse("filter"), Some(FilterOperator::Filter));
        assert_eq!(FilterOperator::parse("pre_filter"), Some(FilterOperator::PreFilter));
        assert_eq!(FilterOperator::parse("between"), None);
        assert_eq!(FilterOperator::parse("GTE"), None);
    }

    #[test]
    fn test_lookup_operators() {
        assert!(FilterOperator::Filter.is_lookup());
        assert!(FilterOperator::PreFilter.is_lookup());
        assert!(!FilterOperator::Compare(Comparison::In).is_lookup());
    }

    #[test]
    fn test_comparison_bits_are_distinct() {
        let mut seen = 0u16;
        for comparison in Comparison::ALL {
            assert_eq!(seen & comparison.bit(), 0);
            seen |= comparison.bit();
        }
    }
}
