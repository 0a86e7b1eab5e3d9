//! Core type definitions for the catalog.

use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};

/// Scalar data types an attribute can hold.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ScalarType {
    /// Boolean value.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// UTF-8 string.
    String,
    /// Binary data.
    Bytes,
    /// Timestamp (microseconds since Unix epoch).
    Timestamp,
    /// UUID (128-bit identifier).
    Uuid,
}

impl ScalarType {
    /// Check if a value can be stored in an attribute of this type.
    ///
    /// Null is accepted by every type; whether it is allowed is decided by the
    /// attribute's `required` flag.
    pub fn accepts(&self, value: &Value) -> bool {
        matches!(
            (self, value),
            (_, Value::Null)
                | (ScalarType::Bool, Value::Bool(_))
                | (ScalarType::Int, Value::Int(_))
                | (ScalarType::Float, Value::Float(_))
                | (ScalarType::Float, Value::Int(_))
                | (ScalarType::String, Value::String(_))
                | (ScalarType::Bytes, Value::Bytes(_))
                | (ScalarType::Timestamp, Value::Timestamp(_))
                | (ScalarType::Uuid, Value::Uuid(_))
        )
    }

    /// Check if this type is numeric.
    pub fn is_numeric(&self) -> bool {
        matches!(self, ScalarType::Int | ScalarType::Float)
    }
}

/// Cardinality of a relationship, seen from its source entity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Cardinality {
    /// At most one destination instance.
    ToOne,
    /// An ordered collection of destination instances.
    ToMany,
}

/// How an instance of an entity is duplicated by the copy engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum CopyStrategy {
    /// The instance itself is returned. Used for shared lookup data.
    Reference,
    /// A new instance is created; only owned relationships are duplicated,
    /// one level deep.
    Shallow,
    /// A new instance is created; related instances are copied through the
    /// full engine.
    Deep,
}

impl std::fmt::Display for CopyStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CopyStrategy::Reference => write!(f, "reference"),
            CopyStrategy::Shallow => write!(f, "shallow"),
            CopyStrategy::Deep => write!(f, "deep"),
        }
    }
}
