//! The data-access contract consumed by the copy engine and the delete guard.

use crate::error::Error;
use crate::identity::Identity;
use crate::value::Value;

/// Narrow view of a persistence session.
///
/// Implementations own instance state for one unit of work. Every operation
/// addressing an instance that the session does not know fails with
/// [`Error::InvalidState`].
pub trait ObjectSession {
    /// Allocate a new empty instance of `entity`.
    ///
    /// The instance is temporary until committed. Insertion side effects
    /// (defaults, initializers) run before this returns.
    fn create_instance(&mut self, entity: &str) -> Result<Identity, Error>;

    /// Check if the instance is live in this session.
    fn contains(&self, identity: &Identity) -> Result<bool, Error>;

    /// Check if the instance was allocated in this session and not yet
    /// persisted.
    fn is_temporary(&self, identity: &Identity) -> bool;

    /// Check if the instance is deleted but the deletion is not committed.
    fn is_pending_delete(&self, _identity: &Identity) -> bool {
        false
    }

    /// Read an attribute value.
    fn value(&self, identity: &Identity, attribute: &str) -> Result<Value, Error>;

    /// Write an attribute value.
    fn set_value(&mut self, identity: &Identity, attribute: &str, value: Value)
        -> Result<(), Error>;

    /// Destination of a to-one relationship.
    fn to_one(&self, identity: &Identity, relationship: &str) -> Result<Option<Identity>, Error>;

    /// Destinations of a to-many relationship, in order.
    fn to_many(&self, identity: &Identity, relationship: &str) -> Result<Vec<Identity>, Error>;

    /// Link `destination` through `relationship` and maintain the inverse.
    fn add_to_both_sides(
        &mut self,
        source: &Identity,
        relationship: &str,
        destination: &Identity,
    ) -> Result<(), Error>;

    /// Unlink `destination` from `relationship` and maintain the inverse.
    fn remove_from_both_sides(
        &mut self,
        source: &Identity,
        relationship: &str,
        destination: &Identity,
    ) -> Result<(), Error>;

    /// Delete an instance.
    fn delete(&mut self, identity: &Identity) -> Result<(), Error>;

    /// Count instances of `entity` whose `relationship` points at `target`,
    /// stopping at `limit`.
    fn probe_references(
        &self,
        entity: &str,
        relationship: &str,
        target: &Identity,
        limit: usize,
    ) -> Result<usize, Error>;

    /// Check whether at least one instance references `target`.
    fn probe_exists(
        &self,
        entity: &str,
        relationship: &str,
        target: &Identity,
    ) -> Result<bool, Error> {
        Ok(self.probe_references(entity, relationship, target, 1)? > 0)
    }
}
