//! Attribute metadata: value types and filter capabilities

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::filter::Comparison;

/// Underlying value type of an attribute
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    /// Opaque identifier (integer or string)
    Id,
    String,
    Integer,
    Float,
    Boolean,
    /// RFC 3339 timestamp stored as text
    Timestamp,
    /// Arbitrary JSON document
    Json,
}

impl ValueType {
    /// Filter operators an attribute of this type supports by default
    pub fn default_capabilities(self) -> FilterCapabilities {
        use Comparison::*;

        match self {
            ValueType::Id => FilterCapabilities::of(&[Ne, In, NotIn]),
            ValueType::String => FilterCapabilities::all(),
            ValueType::Integer | ValueType::Float | ValueType::Timestamp => {
                FilterCapabilities::of(&[Lt, Lte, Gt, Gte, Ne, In, NotIn])
            }
            ValueType::Boolean => FilterCapabilities::of(&[Ne]),
            ValueType::Json => FilterCapabilities::none(),
        }
    }
}

impl fmt::Display for ValueType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueType::Id => "id",
            ValueType::String => "string",
            ValueType::Integer => "integer",
            ValueType::Float => "float",
            ValueType::Boolean => "boolean",
            ValueType::Timestamp => "timestamp",
            ValueType::Json => "json",
        };
        f.write_str(name)
    }
}

impl FromStr for ValueType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "id" => Ok(ValueType::Id),
            "string" | "text" => Ok(ValueType::String),
            "integer" | "int" => Ok(ValueType::Integer),
            "float" | "real" => Ok(ValueType::Float),
            "boolean" | "bool" => Ok(ValueType::Boolean),
            "timestamp" | "datetime" => Ok(ValueType::Timestamp),
            "json" => Ok(ValueType::Json),
            _ => Err(format!("Unknown value type: {}", s)),
        }
    }
}

/// Set of comparison operators an attribute accepts
#[derive(Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct FilterCapabilities(u16);

impl FilterCapabilities {
    pub fn none() -> Self {
        Self(0)
    }

    pub fn all() -> Self {
        Self::of(&Comparison::ALL)
    }

    pub fn of(comparisons: &[Comparison]) -> Self {
        Self(comparisons.iter().fold(0, |bits, c| bits | c.bit()))
    }

    pub fn with(self, comparison: Comparison) -> Self {
        Self(self.0 | comparison.bit())
    }

    pub fn without(self, comparison: Comparison) -> Self {
        Self(self.0 & !comparison.bit())
    }

    pub fn supports(self, comparison: Comparison) -> bool {
        self.0 & comparison.bit() != 0
    }

    pub fn iter(self) -> impl Iterator<Item = Comparison> {
        Comparison::ALL.into_iter().filter(move |c| self.supports(*c))
    }
}

impl fmt::Debug for FilterCapabilities {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter().map(Comparison::keyword)).finish()
    }
}

/// Metadata for one attribute of an entity. Immutable once the registry is built.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeDescriptor {
    /// Internal (storage) attribute name
    pub name: String,
    /// Public field name used in filter keys
    pub field_name: String,
    pub value_type: ValueType,
    /// Target entity when this attribute references another entity
    pub reference: Option<String>,
    pub primary: bool,
    pub unique: bool,
    pub capabilities: FilterCapabilities,
}

impl AttributeDescriptor {
    /// New attribute whose public name equals its internal name
    pub fn new(name: impl Into<String>, value_type: ValueType) -> Self {
        let name = name.into();
        Self {
            field_name: name.clone(),
            name,
            value_type,
            reference: None,
            primary: false,
            unique: false,
            capabilities: value_type.default_capabilities(),
        }
    }

    pub fn id(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Id)
    }

    pub fn string(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::String)
    }

    pub fn integer(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Integer)
    }

    pub fn boolean(name: impl Into<String>) -> Self {
        Self::new(name, ValueType::Boolean)
    }

    /// Mark as the entity's primary attribute (implies unique)
    pub fn primary(mut self) -> Self {
        self.primary = true;
        self.unique = true;
        self
    }

    pub fn unique(mut self) -> Self {
        self.unique = true;
        self
    }

    /// Override the public field name
    pub fn field_name(mut self, field_name: impl Into<String>) -> Self {
        self.field_name = field_name.into();
        self
    }

    /// Reference another entity; enables `__filter` deep filters
    pub fn reference(mut self, target: impl Into<String>) -> Self {
        self.reference = Some(target.into());
        self
    }

    pub fn capabilities(mut self, capabilities: FilterCapabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn is_reference(&self) -> bool {
        self.reference.is_some()
    }

    pub fn supports(&self, comparison: Comparison) -> bool {
        self.capabilities.supports(comparison)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_capabilities() {
        let title = AttributeDescriptor::string("title");
        assert!(title.supports(Comparison::Contains));
        assert!(title.supports(Comparison::NotIn));

        let year = AttributeDescriptor::integer("year");
        assert!(year.supports(Comparison::Gte));
        assert!(!year.supports(Comparison::StartsWith));

        let active = AttributeDescriptor::boolean("active");
        assert_eq!(active.capabilities.iter().collect::<Vec<_>>(), vec![Comparison::Ne]);

        assert_eq!(ValueType::Json.default_capabilities().iter().count(), 0);
    }

    #[test]
    fn test_capability_overrides() {
        let caps = FilterCapabilities::none()
            .with(Comparison::Lt)
            .with(Comparison::Gt)
            .without(Comparison::Lt);
        assert!(caps.supports(Comparison::Gt));
        assert!(!caps.supports(Comparison::Lt));
    }

    #[test]
    fn test_primary_implies_unique() {
        let id = AttributeDescriptor::id("id").primary();
        assert!(id.primary && id.unique);

        let author = AttributeDescriptor::id("author_id")
            .field_name("author")
            .reference("Author");
        assert_eq!(author.field_name, "author");
        assert_eq!(author.name, "author_id");
        assert!(author.is_reference());
    }

    #[test]
    fn test_value_type_parsing() {
        assert_eq!("Integer".parse::<ValueType>(), Ok(ValueType::Integer));
        assert_eq!("datetime".parse::<ValueType>(), Ok(ValueType::Timestamp));
        assert!("blob".parse::<ValueType>().is_err());
        assert_eq!(ValueType::Boolean.to_string(), "boolean");
    }
}
