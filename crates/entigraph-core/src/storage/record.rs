//! Stored object records.

use crate::error::Error;
use crate::identity::Identity;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;

/// The persisted state of one instance.
#[derive(Debug, Clone, PartialEq, Archive, Serialize, Deserialize)]
pub struct ObjectRecord {
    /// Entity name.
    pub entity: String,
    /// Attribute values by name. Missing attributes read as null.
    pub attributes: BTreeMap<String, Value>,
    /// To-one links by relationship name.
    pub to_one: BTreeMap<String, Identity>,
    /// To-many links by relationship name, in insertion order.
    pub to_many: BTreeMap<String, Vec<Identity>>,
    /// Creation timestamp in microseconds since Unix epoch.
    pub created_at: u64,
    /// Last write timestamp in microseconds since Unix epoch.
    pub updated_at: u64,
}

impl ObjectRecord {
    /// Create an empty record with the current timestamp.
    pub fn new(entity: impl Into<String>) -> Self {
        let now = super::key::current_timestamp();
        Self {
            entity: entity.into(),
            attributes: BTreeMap::new(),
            to_one: BTreeMap::new(),
            to_many: BTreeMap::new(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Set an attribute value.
    #[cfg(test)]
    pub fn with_value(mut self, attribute: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(attribute.into(), value.into());
        self
    }

    /// Value of an attribute (null when unset).
    pub fn value(&self, attribute: &str) -> Value {
        self.attributes.get(attribute).cloned().unwrap_or_default()
    }

    /// Destination of a to-one relationship.
    pub fn to_one(&self, relationship: &str) -> Option<&Identity> {
        self.to_one.get(relationship)
    }

    /// Destinations of a to-many relationship.
    pub fn to_many(&self, relationship: &str) -> &[Identity] {
        self.to_many
            .get(relationship)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Check if the record links to `target` through `relationship`.
    pub fn references(&self, relationship: &str, target: &Identity) -> bool {
        self.to_one(relationship) == Some(target) || self.to_many(relationship).contains(target)
    }

    /// Serialize the record to bytes using rkyv.
    pub fn to_bytes(&self) -> Result<Vec<u8>, Error> {
        rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map(|v| v.to_vec())
            .map_err(|e| Error::Serialization(e.to_string()))
    }

    /// Deserialize a record from bytes using rkyv.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, Error> {
        rkyv::from_bytes::<Self, rkyv::rancor::Error>(bytes)
            .map_err(|e| Error::Deserialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_roundtrip() {
        let customer = Identity::new("Customer", [2; 16]);
        let line = Identity::new("LineItem", [3; 16]);

        let mut record = ObjectRecord::new("Order").with_value("number", "A-1");
        record.to_one.insert("customer".into(), customer.clone());
        record.to_many.insert("lines".into(), vec![line.clone()]);

        let decoded = ObjectRecord::from_bytes(&record.to_bytes().unwrap()).unwrap();
        assert_eq!(decoded, record);
        assert!(decoded.references("customer", &customer));
        assert!(decoded.references("lines", &line));
    }

    #[test]
    fn test_missing_values() {
        let record = ObjectRecord::new("Order");

        assert!(record.value("number").is_null());
        assert!(record.to_one("customer").is_none());
        assert!(record.to_many("lines").is_empty());
    }
}
