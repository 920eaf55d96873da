//! Start-up immutable registry of entity descriptors

use std::collections::HashMap;
use std::sync::Arc;

use thiserror::Error;

use super::entity::{EntityDescriptor, EntityModel};
use crate::error::QueryError;

/// Errors raised while building entity metadata
#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("entity '{name}' is registered more than once")]
    DuplicateEntity { name: String },

    #[error("attribute '{attribute}' is declared more than once on entity '{entity}'")]
    DuplicateAttribute { entity: String, attribute: String },

    #[error("entity '{entity}' declares more than one primary attribute")]
    MultiplePrimary { entity: String },

    #[error("pre-filter '{name}' is declared more than once on entity '{entity}'")]
    DuplicatePreFilter { entity: String, name: String },

    #[error("attribute '{entity}.{attribute}' references unknown entity '{target}'")]
    DanglingReference {
        entity: String,
        attribute: String,
        target: String,
    },

    #[error("referenced entity '{target}' has no primary attribute")]
    MissingPrimary { target: String },
}

/// All entity descriptors known to the API, keyed by entity name.
///
/// Built once and never mutated afterwards.
#[derive(Debug, Default)]
pub struct EntityRegistry {
    entities: HashMap<String, Arc<EntityDescriptor>>,
}

impl EntityRegistry {
    pub fn builder() -> RegistryBuilder {
        RegistryBuilder::default()
    }

    pub fn get(&self, name: &str) -> Option<&Arc<EntityDescriptor>> {
        self.entities.get(name)
    }

    /// Like [`EntityRegistry::get`], failing with [`QueryError::UnknownEntity`]
    pub fn require(&self, name: &str) -> Result<&Arc<EntityDescriptor>, QueryError> {
        self.get(name).ok_or_else(|| QueryError::UnknownEntity {
            name: name.to_string(),
        })
    }

    pub fn entities(&self) -> impl Iterator<Item = &EntityDescriptor> {
        self.entities.values().map(Arc::as_ref)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }
}

/// Collects entity descriptors and validates cross-entity references on build
#[derive(Default)]
pub struct RegistryBuilder {
    entities: Vec<Result<EntityDescriptor, RegistryError>>,
}

impl RegistryBuilder {
    pub fn entity(mut self, entity: EntityDescriptor) -> Self {
        self.entities.push(Ok(entity));
        self
    }

    /// Register a type implementing [`EntityModel`]; descriptor errors surface on build
    pub fn model<M: EntityModel>(mut self) -> Self {
        self.entities.push(M::entity_descriptor());
        self
    }

    pub fn build(self) -> Result<EntityRegistry, RegistryError> {
        let mut entities = HashMap::with_capacity(self.entities.len());
        for entity in self.entities {
            let entity = entity?;
            let name = entity.name().to_string();
            if entities.insert(name.clone(), Arc::new(entity)).is_some() {
                return Err(RegistryError::DuplicateEntity { name });
            }
        }

        for entity in entities.values() {
            for attribute in entity.attributes() {
                let Some(target) = &attribute.reference else {
                    continue;
                };
                let Some(target_entity) = entities.get(target) else {
                    return Err(RegistryError::DanglingReference {
                        entity: entity.name().to_string(),
                        attribute: attribute.name.clone(),
                        target: target.clone(),
                    });
                };
                if target_entity.primary_attribute().is_none() {
                    return Err(RegistryError::MissingPrimary {
                        target: target.clone(),
                    });
                }
            }
        }

        tracing::debug!(entities = entities.len(), "Entity registry built");
        Ok(EntityRegistry { entities })
    }
}
