//! Schema catalog for entigraph.
//!
//! The catalog holds the entity, attribute and relationship metadata, and the
//! indexes derived from it that the copy engine and the delete guard consult.

mod attribute;
mod catalog;
mod entity;
mod relationship;
mod schema;
mod source;
mod types;

pub use attribute::{AttributeDef, COPYABLE_KEY};
pub use catalog::{ReverseDependencyIndex, SchemaCatalog};
pub use entity::{
    EntityDef, LifecycleRules, CHECK_DELETE_KEY, CREATED_ATTRIBUTE, LAST_MODIFIED_ATTRIBUTE,
};
pub use relationship::RelationshipDef;
pub use schema::SchemaBundle;
pub use source::{MetadataSource, SchemaFile, SchemaStore};
pub use types::{Cardinality, CopyStrategy, ScalarType};
