//! Entity metadata consumed by the filter compiler and connection resolver

pub mod attribute;
pub mod entity;
pub mod pre_filter;
pub mod registry;

pub use attribute::{AttributeDescriptor, FilterCapabilities, ValueType};
pub use entity::{EntityBuilder, EntityDescriptor, EntityModel};
pub use pre_filter::{Activation, PreFilter, PreFilterKind, PreFilterResolver};
pub use registry::{EntityRegistry, RegistryBuilder, RegistryError};
