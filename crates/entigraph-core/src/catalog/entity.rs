//! Entity definitions.

use super::attribute::AttributeDef;
use super::relationship::RelationshipDef;
use super::types::CopyStrategy;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;

/// `user_info` key opting an entity into the delete-safety guard.
pub const CHECK_DELETE_KEY: &str = "check_delete";

/// Creation timestamp attribute of stamped entities.
pub const CREATED_ATTRIBUTE: &str = "created";

/// Modification timestamp attribute of stamped entities.
pub const LAST_MODIFIED_ATTRIBUTE: &str = "last_modified";

/// An entity definition (record type).
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct EntityDef {
    /// Entity name (unique within schema).
    pub name: String,
    /// Names of the primary-key attributes.
    #[serde(default)]
    pub primary_key: Vec<String>,
    /// Attribute definitions, in declaration order.
    #[serde(default)]
    pub attributes: Vec<AttributeDef>,
    /// Relationship definitions, in declaration order.
    #[serde(default)]
    pub relationships: Vec<RelationshipDef>,
    /// Lifecycle rules.
    #[serde(default)]
    pub lifecycle: LifecycleRules,
    /// Free-form metadata flags.
    #[serde(default)]
    pub user_info: BTreeMap<String, String>,
}

/// Lifecycle rules for an entity.
#[derive(
    Debug, Clone, PartialEq, Default, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct LifecycleRules {
    /// The entity carries `created` / `last_modified` timestamps that are
    /// refreshed on every genuine copy.
    #[serde(default)]
    pub stamped: bool,
    /// Copy strategy declared by the entity. Falls back to the configured
    /// default copy mode when unset.
    #[serde(default)]
    pub copy_strategy: Option<CopyStrategy>,
}

impl EntityDef {
    /// Create a new entity definition.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            primary_key: Vec::new(),
            attributes: Vec::new(),
            relationships: Vec::new(),
            lifecycle: LifecycleRules::default(),
            user_info: BTreeMap::new(),
        }
    }

    /// Add a primary-key attribute name.
    pub fn with_primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.primary_key.push(attribute.into());
        self
    }

    /// Add an attribute to the entity.
    pub fn with_attribute(mut self, attribute: AttributeDef) -> Self {
        self.attributes.push(attribute);
        self
    }

    /// Add multiple attributes.
    pub fn with_attributes(mut self, attributes: impl IntoIterator<Item = AttributeDef>) -> Self {
        self.attributes.extend(attributes);
        self
    }

    /// Add a relationship. Its source entity is forced to this entity.
    pub fn with_relationship(mut self, mut relationship: RelationshipDef) -> Self {
        relationship.entity = self.name.clone();
        self.relationships.push(relationship);
        self
    }

    /// Enable creation/modification stamps.
    pub fn stamped(mut self) -> Self {
        self.lifecycle.stamped = true;
        self
    }

    /// Declare the copy strategy of this entity.
    pub fn with_copy_strategy(mut self, strategy: CopyStrategy) -> Self {
        self.lifecycle.copy_strategy = Some(strategy);
        self
    }

    /// Opt the entity into the delete-safety guard.
    pub fn with_check_delete(self) -> Self {
        self.with_user_info(CHECK_DELETE_KEY, "true")
    }

    /// Attach a metadata flag.
    pub fn with_user_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }

    /// Get an attribute by name.
    pub fn attribute(&self, name: &str) -> Option<&AttributeDef> {
        self.attributes.iter().find(|a| a.name == name)
    }

    /// Get a relationship by name.
    pub fn relationship(&self, name: &str) -> Option<&RelationshipDef> {
        self.relationships.iter().find(|r| r.name == name)
    }

    /// Attributes visible to callers.
    pub fn class_attributes(&self) -> impl Iterator<Item = &AttributeDef> {
        self.attributes.iter().filter(|a| a.class_property)
    }

    /// To-one relationships, in declaration order.
    pub fn to_one_relationships(&self) -> impl Iterator<Item = &RelationshipDef> {
        self.relationships.iter().filter(|r| r.is_to_one())
    }

    /// To-many relationships, in declaration order.
    pub fn to_many_relationships(&self) -> impl Iterator<Item = &RelationshipDef> {
        self.relationships.iter().filter(|r| r.is_to_many())
    }

    /// Check if the entity carries creation/modification stamps.
    pub fn is_stamped(&self) -> bool {
        self.lifecycle.stamped
    }

    /// Check if deleting an instance requires the dangling-reference probe.
    ///
    /// Defaults to false: unmarked entities are deleted without the check.
    pub fn check_delete_required(&self) -> bool {
        self.user_info
            .get(CHECK_DELETE_KEY)
            .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::ScalarType;

    #[test]
    fn test_entity_builder() {
        let entity = EntityDef::new("Order")
            .with_primary_key("id")
            .with_attribute(AttributeDef::required("id", ScalarType::Uuid))
            .with_attribute(AttributeDef::new("number", ScalarType::String))
            .with_relationship(RelationshipDef::to_many("lines", "ignored", "LineItem").owned())
            .stamped();

        assert_eq!(entity.name, "Order");
        assert_eq!(entity.attributes.len(), 2);
        assert_eq!(entity.relationships[0].entity, "Order");
        assert!(entity.is_stamped());
        assert!(!entity.check_delete_required());
    }

    #[test]
    fn test_lookups() {
        let entity = EntityDef::new("Order")
            .with_attribute(AttributeDef::new("number", ScalarType::String))
            .with_attribute(AttributeDef::new("customer_id", ScalarType::Uuid).hidden())
            .with_relationship(RelationshipDef::to_one("customer", "Order", "Customer"));

        assert!(entity.attribute("number").is_some());
        assert!(entity.attribute("missing").is_none());
        assert!(entity.relationship("customer").is_some());
        assert_eq!(entity.class_attributes().count(), 1);
        assert_eq!(entity.to_one_relationships().count(), 1);
        assert_eq!(entity.to_many_relationships().count(), 0);
    }

    #[test]
    fn test_check_delete_flag() {
        assert!(EntityDef::new("Parameter")
            .with_check_delete()
            .check_delete_required());
        assert!(!EntityDef::new("Parameter")
            .with_user_info(CHECK_DELETE_KEY, "no")
            .check_delete_required());
    }
}
