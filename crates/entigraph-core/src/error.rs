//! Core error types.

use thiserror::Error;

/// Core errors.
#[derive(Debug, Error)]
pub enum Error {
    /// A precondition was violated (absent instance, unresolved entity).
    ///
    /// These are programming errors and are never retried.
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// A delete was blocked by an instance referencing the target through a
    /// relationship without inverse.
    #[error(transparent)]
    Dependency(#[from] DependencyError),

    /// The schema metadata is inconsistent.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),

    /// Storage layer error.
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    /// Serialization error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Deserialization error.
    #[error("deserialization error: {0}")]
    Deserialization(String),

    /// Reading the schema source failed.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Record not found.
    #[error("record not found: {0}")]
    NotFound(String),

    /// The entity has no attribute with this name.
    #[error("unknown attribute {entity}.{attribute}")]
    UnknownAttribute {
        /// Entity name.
        entity: String,
        /// Attribute name.
        attribute: String,
    },

    /// A value does not fit the attribute's declared type.
    #[error("type mismatch for {entity}.{attribute}: expected {expected}")]
    TypeMismatch {
        /// Entity name.
        entity: String,
        /// Attribute name.
        attribute: String,
        /// Declared scalar type.
        expected: String,
    },

    /// The entity has no relationship with this name.
    #[error("unknown relationship {entity}.{relationship}")]
    UnknownRelationship {
        /// Entity name.
        entity: String,
        /// Relationship name.
        relationship: String,
    },
}

impl Error {
    /// Shorthand for an [`Error::InvalidState`].
    pub fn invalid_state(message: impl Into<String>) -> Self {
        Error::InvalidState(message.into())
    }

    /// Returns the dependency if this error blocked a delete.
    pub fn as_dependency(&self) -> Option<&DependencyError> {
        match self {
            Error::Dependency(dependency) => Some(dependency),
            _ => None,
        }
    }

    /// Check if this is a precondition violation.
    pub fn is_invalid_state(&self) -> bool {
        matches!(self, Error::InvalidState(_))
    }
}

/// A delete is blocked because another instance still references the target.
///
/// This is a business-rule failure: callers usually present it to an end user
/// rather than treating it as fatal.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unable to delete {entity}: there is a connection with the entity {referencing_entity} ({relationship})")]
pub struct DependencyError {
    /// Entity of the instance being deleted.
    pub entity: String,
    /// Entity owning the dangling relationship.
    pub referencing_entity: String,
    /// Relationship through which the reference exists.
    pub relationship: String,
}

impl DependencyError {
    /// Create a new dependency error.
    pub fn new(
        entity: impl Into<String>,
        referencing_entity: impl Into<String>,
        relationship: impl Into<String>,
    ) -> Self {
        Self {
            entity: entity.into(),
            referencing_entity: referencing_entity.into(),
            relationship: relationship.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dependency_message_names_referencing_entity() {
        let err = Error::from(DependencyError::new("Parameter", "Order", "parameter"));
        assert!(err.to_string().contains("Order"));
        assert_eq!(err.as_dependency().unwrap().referencing_entity, "Order");
        assert!(!err.is_invalid_state());
    }
}
