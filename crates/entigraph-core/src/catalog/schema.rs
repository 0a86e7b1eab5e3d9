//! Schema bundle - versioned snapshot of the entire schema.

use super::{
    EntityDef, RelationshipDef, ScalarType, CREATED_ATTRIBUTE, LAST_MODIFIED_ATTRIBUTE,
};
use crate::error::Error;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};

/// A versioned snapshot of the entire schema.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct SchemaBundle {
    /// Schema version (monotonically increasing).
    #[serde(default)]
    pub version: u64,
    /// Creation timestamp (microseconds since Unix epoch).
    #[serde(default)]
    pub created_at: u64,
    /// Entity definitions keyed by name.
    pub entities: BTreeMap<String, EntityDef>,
}

impl SchemaBundle {
    /// Create an empty schema bundle.
    pub fn new(version: u64) -> Self {
        Self {
            version,
            created_at: crate::storage::key::current_timestamp(),
            entities: BTreeMap::new(),
        }
    }

    /// Add an entity to the schema.
    pub fn with_entity(mut self, entity: EntityDef) -> Self {
        self.entities.insert(entity.name.clone(), entity);
        self
    }

    /// Get an entity by name.
    pub fn get_entity(&self, name: &str) -> Option<&EntityDef> {
        self.entities.get(name)
    }

    /// Get a relationship of an entity.
    pub fn get_relationship(&self, entity: &str, name: &str) -> Option<&RelationshipDef> {
        self.get_entity(entity).and_then(|e| e.relationship(name))
    }

    /// Every relationship of every entity.
    pub fn relationships(&self) -> impl Iterator<Item = &RelationshipDef> {
        self.entities.values().flat_map(|e| e.relationships.iter())
    }

    /// All relationships whose destination is the given entity.
    pub fn relationships_to<'a>(
        &'a self,
        entity: &'a str,
    ) -> impl Iterator<Item = &'a RelationshipDef> + 'a {
        self.relationships().filter(move |r| r.destination == entity)
    }

    /// List all entity names.
    pub fn entity_names(&self) -> Vec<&str> {
        self.entities.keys().map(|s| s.as_str()).collect()
    }

    /// Check the schema for dangling names.
    ///
    /// Every primary-key and foreign-key attribute must exist on its entity,
    /// every destination must exist, and a declared inverse must exist on the
    /// destination and lead back to the source entity.
    pub fn validate(&self) -> Result<(), Error> {
        for (key, entity) in &self.entities {
            if key != &entity.name {
                return Err(Error::InvalidSchema(format!(
                    "entity registered as '{}' is named '{}'",
                    key, entity.name
                )));
            }

            let mut seen = HashSet::new();
            for attribute in &entity.attributes {
                if !seen.insert(attribute.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate attribute {}.{}",
                        entity.name, attribute.name
                    )));
                }
            }

            for pk in &entity.primary_key {
                if entity.attribute(pk).is_none() {
                    return Err(Error::InvalidSchema(format!(
                        "primary key {}.{} is not an attribute",
                        entity.name, pk
                    )));
                }
            }

            if entity.is_stamped() {
                for stamp in [CREATED_ATTRIBUTE, LAST_MODIFIED_ATTRIBUTE] {
                    let declared = entity.attribute(stamp).map(|a| a.scalar_type);
                    if declared != Some(ScalarType::Timestamp) {
                        return Err(Error::InvalidSchema(format!(
                            "stamped entity {} needs a timestamp attribute '{}'",
                            entity.name, stamp
                        )));
                    }
                }
            }

            let mut seen = HashSet::new();
            for relationship in &entity.relationships {
                self.validate_relationship(entity, relationship)?;
                if !seen.insert(relationship.name.as_str()) {
                    return Err(Error::InvalidSchema(format!(
                        "duplicate relationship {}.{}",
                        entity.name, relationship.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_relationship(
        &self,
        entity: &EntityDef,
        relationship: &RelationshipDef,
    ) -> Result<(), Error> {
        if relationship.entity != entity.name {
            return Err(Error::InvalidSchema(format!(
                "relationship {}.{} declares source entity '{}'",
                entity.name, relationship.name, relationship.entity
            )));
        }

        let destination = self.get_entity(&relationship.destination).ok_or_else(|| {
            Error::InvalidSchema(format!(
                "relationship {}.{} points to unknown entity '{}'",
                entity.name, relationship.name, relationship.destination
            ))
        })?;

        for attribute in &relationship.source_attributes {
            if entity.attribute(attribute).is_none() {
                return Err(Error::InvalidSchema(format!(
                    "relationship {}.{} uses unknown source attribute '{}'",
                    entity.name, relationship.name, attribute
                )));
            }
        }

        if let Some(inverse_name) = &relationship.inverse {
            let inverse = destination.relationship(inverse_name).ok_or_else(|| {
                Error::InvalidSchema(format!(
                    "inverse {}.{} of {}.{} does not exist",
                    destination.name, inverse_name, entity.name, relationship.name
                ))
            })?;
            if inverse.destination != entity.name {
                return Err(Error::InvalidSchema(format!(
                    "inverse {}.{} leads to '{}', not back to '{}'",
                    destination.name, inverse_name, inverse.destination, entity.name
                )));
            }
        }

        Ok(())
    }

    /// Serialize the schema bundle to bytes.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a schema bundle from bytes.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Parse a schema bundle from its JSON description.
    pub fn from_json(json: &str) -> Result<Self, Error> {
        serde_json::from_str(json).map_err(|e| Error::Deserialization(e.to_string()))
    }

    /// Render the schema bundle as pretty-printed JSON.
    pub fn to_json(&self) -> Result<String, Error> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Serialization(e.to_string()))
    }
}

impl Default for SchemaBundle {
    fn default() -> Self {
        Self::new(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::AttributeDef;

    fn sample_schema() -> SchemaBundle {
        let customer = EntityDef::new("Customer")
            .with_primary_key("id")
            .with_attribute(AttributeDef::required("id", ScalarType::Uuid))
            .with_attribute(AttributeDef::new("name", ScalarType::String))
            .with_relationship(
                RelationshipDef::to_many("orders", "Customer", "Order").with_inverse("customer"),
            );

        let order = EntityDef::new("Order")
            .with_primary_key("id")
            .with_attribute(AttributeDef::required("id", ScalarType::Uuid))
            .with_attribute(AttributeDef::new("customer_id", ScalarType::Uuid).hidden())
            .with_relationship(
                RelationshipDef::to_one("customer", "Order", "Customer")
                    .with_source_attribute("customer_id")
                    .with_inverse("orders"),
            );

        SchemaBundle::new(1).with_entity(customer).with_entity(order)
    }

    #[test]
    fn test_schema_bundle_builder() {
        let schema = sample_schema();

        assert_eq!(schema.version, 1);
        assert_eq!(schema.entities.len(), 2);
        assert_eq!(schema.relationships().count(), 2);
        assert!(schema.validate().is_ok());
    }

    #[test]
    fn test_relationship_lookups() {
        let schema = sample_schema();

        assert!(schema.get_relationship("Order", "customer").is_some());
        assert!(schema.get_relationship("Order", "missing").is_none());
        assert_eq!(schema.relationships_to("Customer").count(), 1);
    }

    #[test]
    fn test_validate_unknown_destination() {
        let schema = sample_schema().with_entity(
            EntityDef::new("Invoice")
                .with_relationship(RelationshipDef::to_one("order", "Invoice", "Purchase")),
        );

        assert!(matches!(schema.validate(), Err(Error::InvalidSchema(_))));
    }

    #[test]
    fn test_validate_inverse_must_point_back() {
        let schema = sample_schema().with_entity(
            EntityDef::new("Invoice").with_relationship(
                RelationshipDef::to_one("customer", "Invoice", "Customer").with_inverse("orders"),
            ),
        );

        let err = schema.validate().unwrap_err();
        assert!(err.to_string().contains("not back to 'Invoice'"));
    }

    #[test]
    fn test_validate_unknown_primary_key() {
        let schema = SchemaBundle::new(1).with_entity(EntityDef::new("Tag").with_primary_key("id"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn test_validate_stamped_needs_timestamps() {
        let unstamped = EntityDef::new("Note").stamped();
        assert!(SchemaBundle::new(1).with_entity(unstamped).validate().is_err());

        let stamped = EntityDef::new("Note")
            .with_attribute(AttributeDef::new(CREATED_ATTRIBUTE, ScalarType::Timestamp))
            .with_attribute(AttributeDef::new(LAST_MODIFIED_ATTRIBUTE, ScalarType::Timestamp))
            .stamped();
        assert!(SchemaBundle::new(1).with_entity(stamped).validate().is_ok());
    }

    #[test]
    fn test_serialization_roundtrip() {
        let schema = sample_schema();
        let decoded = SchemaBundle::from_bytes(&schema.to_bytes().unwrap()).unwrap();
        assert_eq!(schema, decoded);

        let from_json = SchemaBundle::from_json(&schema.to_json().unwrap()).unwrap();
        assert_eq!(schema, from_json);
    }
}
