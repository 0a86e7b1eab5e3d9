//! Schema catalog with lazily derived indexes.

use super::{EntityDef, MetadataSource, RelationshipDef, SchemaBundle};
use crate::error::Error;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::{Arc, OnceLock};
use tracing::{debug, trace};

/// Destination entity name mapped to the to-one relationships without
/// inverse that point at it, across all entities.
#[derive(Debug, Default, Clone)]
pub struct ReverseDependencyIndex {
    by_destination: HashMap<String, Vec<RelationshipDef>>,
}

impl ReverseDependencyIndex {
    fn build(schema: &SchemaBundle) -> Self {
        let mut by_destination: HashMap<String, Vec<RelationshipDef>> = HashMap::new();
        for relationship in schema.relationships().filter(|r| r.is_dangling()) {
            by_destination
                .entry(relationship.destination.clone())
                .or_default()
                .push(relationship.clone());
        }
        Self { by_destination }
    }

    /// Dangling relationships whose destination is `entity`.
    pub fn dependents_of(&self, entity: &str) -> &[RelationshipDef] {
        self.by_destination
            .get(entity)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Iterate over every destination and its dangling relationships.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[RelationshipDef])> {
        self.by_destination
            .iter()
            .map(|(k, v)| (k.as_str(), v.as_slice()))
    }

    /// Number of destination entities with at least one dependent.
    pub fn len(&self) -> usize {
        self.by_destination.len()
    }

    /// Check if no entity has dangling dependents.
    pub fn is_empty(&self) -> bool {
        self.by_destination.is_empty()
    }
}

/// Read-only view over a validated schema.
///
/// The metadata is loaded once at construction. The derived indexes are built
/// on first use and never change afterwards, so a catalog can be shared across
/// threads through an `Arc`.
pub struct SchemaCatalog {
    schema: SchemaBundle,
    exposed_keys: RwLock<HashMap<String, Arc<BTreeSet<String>>>>,
    reverse_dependencies: OnceLock<ReverseDependencyIndex>,
}

impl SchemaCatalog {
    /// Load the schema from a metadata source.
    ///
    /// Fails without caching anything if the source cannot produce a schema or
    /// the schema does not validate.
    pub fn load(source: &dyn MetadataSource) -> Result<Self, Error> {
        let schema = source.load_schema()?;
        Self::from_schema(schema)
    }

    /// Build a catalog from an already loaded schema.
    pub fn from_schema(schema: SchemaBundle) -> Result<Self, Error> {
        schema.validate()?;
        debug!(
            version = schema.version,
            entities = schema.entities.len(),
            "schema catalog loaded"
        );
        Ok(Self {
            schema,
            exposed_keys: RwLock::new(HashMap::new()),
            reverse_dependencies: OnceLock::new(),
        })
    }

    /// The underlying schema.
    pub fn schema(&self) -> &SchemaBundle {
        &self.schema
    }

    /// Resolve an entity by name.
    pub fn entity(&self, name: &str) -> Result<&EntityDef, Error> {
        self.schema
            .get_entity(name)
            .ok_or_else(|| Error::invalid_state(format!("entity '{}' is not in the schema", name)))
    }

    /// Resolve a relationship of an entity.
    pub fn relationship(&self, entity: &str, name: &str) -> Result<&RelationshipDef, Error> {
        self.entity(entity)?
            .relationship(name)
            .ok_or_else(|| Error::UnknownRelationship {
                entity: entity.to_string(),
                relationship: name.to_string(),
            })
    }

    /// The inverse of a relationship, if one is declared.
    pub fn inverse_of(&self, relationship: &RelationshipDef) -> Option<&RelationshipDef> {
        let inverse = relationship.inverse.as_deref()?;
        self.schema
            .get_relationship(&relationship.destination, inverse)
    }

    /// Attributes of `entity` that copies must leave null.
    ///
    /// The set is the primary-key attributes plus every relationship source
    /// attribute, restricted to class-property attributes. Computed once per
    /// entity and cached.
    pub fn exposed_key_attributes(&self, entity: &str) -> Result<Arc<BTreeSet<String>>, Error> {
        if let Some(keys) = self.exposed_keys.read().get(entity) {
            return Ok(Arc::clone(keys));
        }

        let definition = self.entity(entity)?;
        let computed = Arc::new(compute_exposed_keys(definition));

        let mut cache = self.exposed_keys.write();
        let keys = cache
            .entry(entity.to_string())
            .or_insert_with(|| {
                trace!(entity, keys = computed.len(), "exposed key set built");
                computed
            });
        Ok(Arc::clone(keys))
    }

    /// Index of dangling to-one relationships by destination entity.
    pub fn reverse_dependency_index(&self) -> &ReverseDependencyIndex {
        self.reverse_dependencies.get_or_init(|| {
            let index = ReverseDependencyIndex::build(&self.schema);
            debug!(destinations = index.len(), "reverse dependency index built");
            index
        })
    }

    /// Dangling relationships pointing at `entity`.
    pub fn dangling_relationships_to(&self, entity: &str) -> &[RelationshipDef] {
        self.reverse_dependency_index().dependents_of(entity)
    }
}

impl std::fmt::Debug for SchemaCatalog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SchemaCatalog")
            .field("version", &self.schema.version)
            .field("entities", &self.schema.entity_names())
            .finish()
    }
}

fn compute_exposed_keys(entity: &EntityDef) -> BTreeSet<String> {
    let candidates: BTreeSet<&str> = entity
        .primary_key
        .iter()
        .chain(
            entity
                .relationships
                .iter()
                .flat_map(|r| r.source_attributes.iter()),
        )
        .map(String::as_str)
        .collect();

    entity
        .class_attributes()
        .filter(|a| candidates.contains(a.name.as_str()))
        .map(|a| a.name.clone())
        .collect()
}
