//! Relationship definitions between entities.

use super::types::Cardinality;
use rkyv::{Archive, Deserialize, Serialize};

/// A directed relationship from a source entity to a destination entity.
#[derive(
    Debug, Clone, PartialEq, Eq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct RelationshipDef {
    /// Relationship name (unique within the source entity).
    pub name: String,
    /// Source entity name.
    pub entity: String,
    /// Destination entity name.
    pub destination: String,
    /// Relationship cardinality.
    pub cardinality: Cardinality,
    /// Destination instances are exclusively owned by the source: copies
    /// cascade to them and so do deletes.
    #[serde(default)]
    pub owns: bool,
    /// Name of the inverse relationship on the destination entity.
    #[serde(default)]
    pub inverse: Option<String>,
    /// Attributes of the source entity holding the foreign key.
    #[serde(default)]
    pub source_attributes: Vec<String>,
    /// Whether the relationship is visible to callers.
    #[serde(default = "default_true")]
    pub class_property: bool,
}

fn default_true() -> bool {
    true
}

impl RelationshipDef {
    /// Create a to-one relationship.
    pub fn to_one(
        name: impl Into<String>,
        entity: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self::new(name, entity, destination, Cardinality::ToOne)
    }

    /// Create a to-many relationship.
    pub fn to_many(
        name: impl Into<String>,
        entity: impl Into<String>,
        destination: impl Into<String>,
    ) -> Self {
        Self::new(name, entity, destination, Cardinality::ToMany)
    }

    fn new(
        name: impl Into<String>,
        entity: impl Into<String>,
        destination: impl Into<String>,
        cardinality: Cardinality,
    ) -> Self {
        Self {
            name: name.into(),
            entity: entity.into(),
            destination: destination.into(),
            cardinality,
            owns: false,
            inverse: None,
            source_attributes: Vec::new(),
            class_property: true,
        }
    }

    /// Mark the destination instances as owned by the source.
    pub fn owned(mut self) -> Self {
        self.owns = true;
        self
    }

    /// Declare the inverse relationship on the destination entity.
    pub fn with_inverse(mut self, inverse: impl Into<String>) -> Self {
        self.inverse = Some(inverse.into());
        self
    }

    /// Add a foreign-key attribute on the source entity.
    pub fn with_source_attribute(mut self, attribute: impl Into<String>) -> Self {
        self.source_attributes.push(attribute.into());
        self
    }

    /// Hide the relationship from callers.
    pub fn hidden(mut self) -> Self {
        self.class_property = false;
        self
    }

    /// Check if this is a to-one relationship.
    pub fn is_to_one(&self) -> bool {
        self.cardinality == Cardinality::ToOne
    }

    /// Check if this is a to-many relationship.
    pub fn is_to_many(&self) -> bool {
        self.cardinality == Cardinality::ToMany
    }

    /// A to-one relationship without inverse.
    ///
    /// Nothing on the destination side records these references, so deleting
    /// a destination instance cannot be checked by ordinary inverse
    /// bookkeeping.
    pub fn is_dangling(&self) -> bool {
        self.is_to_one() && self.inverse.is_none()
    }
}
