//! Stable handles for object instances.

use crate::error::Error;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Size of an instance id in bytes.
pub const ID_SIZE: usize = 16;

/// Handle of one logical instance: its entity name and a 16-byte id.
///
/// The id is allocated once when the instance is created and never changes,
/// including when the instance is committed.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Archive, Serialize, Deserialize)]
pub struct Identity {
    entity: String,
    id: [u8; ID_SIZE],
}

impl Identity {
    /// Create an identity from its parts.
    pub fn new(entity: impl Into<String>, id: [u8; ID_SIZE]) -> Self {
        Self {
            entity: entity.into(),
            id,
        }
    }

    /// Entity name of the instance.
    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Raw id bytes.
    pub fn id(&self) -> &[u8; ID_SIZE] {
        &self.id
    }

    /// The id as a UUID value, used to fill generated keys.
    pub fn uuid_value(&self) -> Value {
        Value::Uuid(self.id)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.entity, hex::encode(self.id))
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self)
    }
}

impl FromStr for Identity {
    type Err = Error;

    /// Parse the `Entity:hex` form produced by `Display`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (entity, hex_id) = s
            .rsplit_once(':')
            .ok_or_else(|| Error::Deserialization(format!("identity '{}' lacks ':'", s)))?;
        if entity.is_empty() {
            return Err(Error::Deserialization(format!(
                "identity '{}' has no entity name",
                s
            )));
        }

        let bytes =
            hex::decode(hex_id).map_err(|e| Error::Deserialization(format!("{}: {}", s, e)))?;
        let id: [u8; ID_SIZE] = bytes.try_into().map_err(|_| {
            Error::Deserialization(format!("identity '{}' must carry {} id bytes", s, ID_SIZE))
        })?;

        Ok(Self::new(entity, id))
    }
}
