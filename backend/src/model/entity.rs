//! Entity descriptors
//!
//! An [`EntityDescriptor`] is the immutable metadata for one entity: its attributes,
//! the public-to-internal name map used by the filter DSL, the primary attribute
//! and the named pre-filters clients may activate.

use std::collections::HashMap;

use serde_json::Value;

use super::attribute::AttributeDescriptor;
use super::pre_filter::PreFilter;
use super::registry::RegistryError;
use crate::storage::Row;

/// Implemented by types that describe an entity (usually via `#[derive(Entity)]`).
pub trait EntityModel {
    /// Public entity name, also used as the cursor key
    const ENTITY_NAME: &'static str;

    /// Builder pre-populated with the type's attributes
    fn entity_builder() -> EntityBuilder;

    fn entity_descriptor() -> Result<EntityDescriptor, RegistryError> {
        Self::entity_builder().build()
    }
}

/// Immutable entity metadata
#[derive(Debug, Clone)]
pub struct EntityDescriptor {
    name: String,
    table: String,
    attributes: Vec<AttributeDescriptor>,
    by_name: HashMap<String, usize>,
    by_field: HashMap<String, usize>,
    primary: Option<usize>,
    pre_filters: Vec<PreFilter>,
}

impl EntityDescriptor {
    pub fn builder(name: impl Into<String>) -> EntityBuilder {
        EntityBuilder::new(name)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Storage table (or collection) name
    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn attributes(&self) -> &[AttributeDescriptor] {
        &self.attributes
    }

    /// Look up an attribute by internal name
    pub fn attribute(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.by_name.get(name).map(|&idx| &self.attributes[idx])
    }

    /// Look up an attribute by public field name
    pub fn attribute_by_field(&self, field: &str) -> Option<&AttributeDescriptor> {
        self.by_field.get(field).map(|&idx| &self.attributes[idx])
    }

    /// Public field name first, then internal name
    pub fn resolve(&self, name: &str) -> Option<&AttributeDescriptor> {
        self.attribute_by_field(name).or_else(|| self.attribute(name))
    }

    pub fn primary_attribute(&self) -> Option<&AttributeDescriptor> {
        self.primary.map(|idx| &self.attributes[idx])
    }

    pub fn pre_filter(&self, name: &str) -> Option<&PreFilter> {
        self.pre_filters.iter().find(|p| p.name() == name)
    }

    pub fn pre_filters(&self) -> &[PreFilter] {
        &self.pre_filters
    }

    /// Rename a storage row's internal attribute names to public field names.
    ///
    /// Columns that are not attributes of this entity are dropped.
    pub fn to_public_row(&self, row: &Row) -> Value {
        let mut public = serde_json::Map::with_capacity(row.len());
        for attribute in &self.attributes {
            if let Some(value) = row.get(&attribute.name) {
                public.insert(attribute.field_name.clone(), value.clone());
            }
        }
        Value::Object(public)
    }
}

/// Builder for [`EntityDescriptor`]
#[derive(Debug, Clone)]
pub struct EntityBuilder {
    name: String,
    table: Option<String>,
    attributes: Vec<AttributeDescriptor>,
    pre_filters: Vec<PreFilter>,
}

impl EntityBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: None,
            attributes: Vec::new(),
            pre_filters: Vec::new(),
        }
    }

    /// Storage table name; defaults to the entity name
    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn attribute(mut self, attribute: AttributeDescriptor) -> Self {
        self.attributes.push(attribute);
        self
    }

    pub fn pre_filter(mut self, pre_filter: PreFilter) -> Self {
        self.pre_filters.push(pre_filter);
        self
    }

    pub fn build(self) -> Result<EntityDescriptor, RegistryError> {
        let mut by_name = HashMap::with_capacity(self.attributes.len());
        let mut by_field = HashMap::with_capacity(self.attributes.len());
        let mut primary = None;

        for (idx, attribute) in self.attributes.iter().enumerate() {
            if by_name.insert(attribute.name.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateAttribute {
                    entity: self.name,
                    attribute: attribute.name.clone(),
                });
            }
            if by_field.insert(attribute.field_name.clone(), idx).is_some() {
                return Err(RegistryError::DuplicateAttribute {
                    entity: self.name,
                    attribute: attribute.field_name.clone(),
                });
            }
            if attribute.primary {
                if primary.is_some() {
                    return Err(RegistryError::MultiplePrimary { entity: self.name });
                }
                primary = Some(idx);
            }
        }

        for (idx, pre_filter) in self.pre_filters.iter().enumerate() {
            if self.pre_filters[..idx]
                .iter()
                .any(|p| p.name() == pre_filter.name())
            {
                return Err(RegistryError::DuplicatePreFilter {
                    entity: self.name,
                    name: pre_filter.name().to_string(),
                });
            }
        }

        Ok(EntityDescriptor {
            table: self.table.unwrap_or_else(|| self.name.clone()),
            name: self.name,
            attributes: self.attributes,
            by_name,
            by_field,
            primary,
            pre_filters: self.pre_filters,
        })
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use serde_json::json;

    use super::*;
    use crate::context::RequestContext;
    use crate::storage::StorageError;

    fn author() -> EntityDescriptor {
        EntityDescriptor::builder("Author")
            .table("authors")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::string("first_name").field_name("firstName"))
            .attribute(AttributeDescriptor::string("email").unique())
            .build()
            .unwrap()
    }

    #[test]
    fn test_lookup_by_public_and_internal_name() {
        let entity = author();
        assert_eq!(entity.table(), "authors");
        assert_eq!(entity.attribute_by_field("firstName").unwrap().name, "first_name");
        assert!(entity.attribute_by_field("first_name").is_none());
        assert_eq!(entity.resolve("first_name").unwrap().field_name, "firstName");
        assert_eq!(entity.primary_attribute().unwrap().name, "id");
    }

    #[test]
    fn test_table_defaults_to_name() {
        let entity = EntityDescriptor::builder("Tag")
            .attribute(AttributeDescriptor::id("id").primary())
            .build()
            .unwrap();
        assert_eq!(entity.table(), "Tag");
    }

    #[test]
    fn test_build_rejects_duplicates() {
        let result = EntityDescriptor::builder("Author")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::string("id"))
            .build();
        assert_matches!(result, Err(RegistryError::DuplicateAttribute { .. }));

        let result = EntityDescriptor::builder("Author")
            .attribute(AttributeDescriptor::id("id").primary())
            .attribute(AttributeDescriptor::id("uuid").primary())
            .build();
        assert_matches!(result, Err(RegistryError::MultiplePrimary { .. }));

        let noop = |_ctx: RequestContext, _params: Option<Value>| async { Ok::<_, StorageError>(Vec::new()) };
        let result = EntityDescriptor::builder("Author")
            .attribute(AttributeDescriptor::id("id").primary())
            .pre_filter(PreFilter::flag("recent", noop))
            .pre_filter(PreFilter::flag("recent", noop))
            .build();
        assert_matches!(result, Err(RegistryError::DuplicatePreFilter { .. }));
    }

    #[test]
    fn test_to_public_row_renames_and_drops_unknown() {
        let entity = author();
        let row: Row = json!({ "id": 1, "first_name": "Ada", "password_hash": "x" })
            .as_object()
            .cloned()
            .unwrap();

        assert_eq!(
            entity.to_public_row(&row),
            json!({ "id": 1, "firstName": "Ada" })
        );
    }
}
