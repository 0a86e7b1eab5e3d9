//! Unit of work over the storage engine.
//!
//! The unit of work is the arena the copy engine and the delete guard operate
//! on. Instances touched through it are held in memory until
//! [`UnitOfWork::commit`] writes them in one atomic batch; untouched instances
//! are read through to storage.

use super::ObjectSession;
use crate::catalog::{
    AttributeDef, RelationshipDef, SchemaCatalog, CREATED_ATTRIBUTE, LAST_MODIFIED_ATTRIBUTE,
};
use crate::constraint::DeleteGuard;
use crate::error::Error;
use crate::identity::Identity;
use crate::storage::key::current_timestamp;
use crate::storage::{ObjectRecord, StorageEngine, WriteOp};
use crate::value::Value;
use std::borrow::Cow;
use std::collections::{BTreeSet, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, trace};

/// Hook run on every new instance of an entity, inside [`ObjectSession::create_instance`].
pub type Initializer =
    Arc<dyn Fn(&mut dyn ObjectSession, &Identity) -> Result<(), Error> + Send + Sync>;

/// Counts of the writes performed by a commit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CommitSummary {
    /// Instances created in the unit of work.
    pub inserted: usize,
    /// Persisted instances rewritten.
    pub updated: usize,
    /// Persisted instances removed.
    pub deleted: usize,
}

/// Pending changes against a [`StorageEngine`].
pub struct UnitOfWork<'a> {
    engine: &'a StorageEngine,
    catalog: &'a SchemaCatalog,
    /// Instances created or modified in this unit of work.
    objects: HashMap<Identity, ObjectRecord>,
    /// Instances created in this unit of work.
    inserted: HashSet<Identity>,
    /// Persisted instances deleted in this unit of work.
    deleted: BTreeSet<Identity>,
    initializers: HashMap<String, Vec<Initializer>>,
}

impl<'a> UnitOfWork<'a> {
    /// Start an empty unit of work.
    pub fn new(engine: &'a StorageEngine, catalog: &'a SchemaCatalog) -> Self {
        Self {
            engine,
            catalog,
            objects: HashMap::new(),
            inserted: HashSet::new(),
            deleted: BTreeSet::new(),
            initializers: HashMap::new(),
        }
    }

    /// Register a hook run on every new instance of `entity`.
    pub fn on_insert<F>(&mut self, entity: impl Into<String>, initializer: F)
    where
        F: Fn(&mut dyn ObjectSession, &Identity) -> Result<(), Error> + Send + Sync + 'static,
    {
        self.initializers
            .entry(entity.into())
            .or_default()
            .push(Arc::new(initializer));
    }

    /// The schema catalog.
    pub fn catalog(&self) -> &'a SchemaCatalog {
        self.catalog
    }

    /// The storage engine.
    pub fn engine(&self) -> &'a StorageEngine {
        self.engine
    }

    /// Check if anything is pending.
    pub fn has_changes(&self) -> bool {
        !self.objects.is_empty() || !self.deleted.is_empty()
    }

    /// Write all pending changes atomically.
    ///
    /// Pending deletions are validated with the delete guard first. Primary
    /// and foreign keys are then regenerated from identities and links, and
    /// stamped entities get their timestamps refreshed.
    pub fn commit(&mut self) -> Result<CommitSummary, Error> {
        let guard = DeleteGuard::new(self.catalog);
        for identity in &self.deleted {
            guard.validate_delete(&*self, identity)?;
        }

        self.assign_primary_keys()?;
        self.assign_foreign_keys()?;
        self.stamp(current_timestamp())?;

        let mut summary = CommitSummary::default();
        let mut ops = Vec::with_capacity(self.objects.len() + self.deleted.len());
        for (identity, record) in &self.objects {
            if self.inserted.contains(identity) {
                summary.inserted += 1;
            } else {
                summary.updated += 1;
            }
            ops.push(WriteOp::Put {
                identity: identity.clone(),
                record: record.clone(),
            });
        }
        for identity in &self.deleted {
            summary.deleted += 1;
            ops.push(WriteOp::Delete {
                identity: identity.clone(),
            });
        }

        self.engine.apply(&ops)?;
        self.clear();

        info!(
            inserted = summary.inserted,
            updated = summary.updated,
            deleted = summary.deleted,
            "unit of work committed"
        );
        Ok(summary)
    }

    /// Discard all pending changes.
    pub fn rollback(&mut self) {
        debug!(
            pending = self.objects.len() + self.deleted.len(),
            "unit of work rolled back"
        );
        self.clear();
    }

    fn clear(&mut self) {
        self.objects.clear();
        self.inserted.clear();
        self.deleted.clear();
    }

    fn record(&self, identity: &Identity) -> Result<Cow<'_, ObjectRecord>, Error> {
        if self.deleted.contains(identity) {
            return Err(absent(identity));
        }
        if let Some(record) = self.objects.get(identity) {
            return Ok(Cow::Borrowed(record));
        }
        self.engine
            .get(identity)?
            .map(Cow::Owned)
            .ok_or_else(|| absent(identity))
    }

    fn record_mut(&mut self, identity: &Identity) -> Result<&mut ObjectRecord, Error> {
        if self.deleted.contains(identity) {
            return Err(absent(identity));
        }
        if !self.objects.contains_key(identity) {
            let record = self.engine.get(identity)?.ok_or_else(|| absent(identity))?;
            self.objects.insert(identity.clone(), record);
        }
        self.objects
            .get_mut(identity)
            .ok_or_else(|| absent(identity))
    }

    fn attribute_def(
        &self,
        identity: &Identity,
        attribute: &str,
    ) -> Result<&'a AttributeDef, Error> {
        let catalog: &'a SchemaCatalog = self.catalog;
        catalog
            .entity(identity.entity())?
            .attribute(attribute)
            .ok_or_else(|| Error::UnknownAttribute {
                entity: identity.entity().to_string(),
                attribute: attribute.to_string(),
            })
    }

    fn relationship_def(
        &self,
        identity: &Identity,
        relationship: &str,
    ) -> Result<&'a RelationshipDef, Error> {
        let catalog: &'a SchemaCatalog = self.catalog;
        catalog.relationship(identity.entity(), relationship)
    }

    /// Link one side only. Returns the to-one destination the link replaced.
    fn link_one_side(
        &mut self,
        from: &Identity,
        relationship: &RelationshipDef,
        to: &Identity,
    ) -> Result<Option<Identity>, Error> {
        let record = self.record_mut(from)?;
        if relationship.is_to_one() {
            let previous = record.to_one.insert(relationship.name.clone(), to.clone());
            Ok(previous.filter(|p| p != to))
        } else {
            let links = record.to_many.entry(relationship.name.clone()).or_default();
            if !links.contains(to) {
                links.push(to.clone());
            }
            Ok(None)
        }
    }

    fn unlink_one_side(
        &mut self,
        from: &Identity,
        relationship: &RelationshipDef,
        to: &Identity,
    ) -> Result<(), Error> {
        let record = self.record_mut(from)?;
        if relationship.is_to_one() {
            if record.to_one.get(&relationship.name) == Some(to) {
                record.to_one.remove(&relationship.name);
            }
        } else if let Some(links) = record.to_many.get_mut(&relationship.name) {
            links.retain(|l| l != to);
        }
        Ok(())
    }

    fn check_destination(
        &self,
        relationship: &RelationshipDef,
        destination: &Identity,
    ) -> Result<(), Error> {
        if destination.entity() != relationship.destination {
            return Err(Error::invalid_state(format!(
                "{}.{} expects {}, got {}",
                relationship.entity, relationship.name, relationship.destination, destination
            )));
        }
        if !self.contains(destination)? {
            return Err(absent(destination));
        }
        Ok(())
    }

    fn assign_primary_keys(&mut self) -> Result<(), Error> {
        let catalog = self.catalog;
        for (identity, record) in self.objects.iter_mut() {
            let entity = catalog.entity(identity.entity())?;
            let [key] = entity.primary_key.as_slice() else {
                continue;
            };
            let generated = identity.uuid_value();
            let accepts = entity
                .attribute(key)
                .is_some_and(|a| a.scalar_type.accepts(&generated));
            if accepts && record.value(key).is_null() {
                trace!(object = %identity, attribute = %key, "primary key generated");
                record.attributes.insert(key.clone(), generated);
            }
        }
        Ok(())
    }

    fn assign_foreign_keys(&mut self) -> Result<(), Error> {
        let catalog = self.catalog;
        let mut updates = Vec::new();
        for (identity, record) in &self.objects {
            let entity = catalog.entity(identity.entity())?;
            for relationship in entity.to_one_relationships() {
                let [column] = relationship.source_attributes.as_slice() else {
                    continue;
                };
                let value = match record.to_one(&relationship.name) {
                    Some(destination) => self.key_value_of(destination)?,
                    None => Value::Null,
                };
                updates.push((identity.clone(), column.clone(), value));
            }
        }

        for (identity, column, value) in updates {
            if let Some(record) = self.objects.get_mut(&identity) {
                record.attributes.insert(column, value);
            }
        }
        Ok(())
    }

    /// The value a foreign key pointing at `destination` holds: its single
    /// primary key when set, its identity otherwise.
    fn key_value_of(&self, destination: &Identity) -> Result<Value, Error> {
        let entity = self.catalog.entity(destination.entity())?;
        if let [key] = entity.primary_key.as_slice() {
            let value = match self.objects.get(destination) {
                Some(record) => record.value(key),
                None => self
                    .engine
                    .get(destination)?
                    .map(|r| r.value(key))
                    .unwrap_or_default(),
            };
            if !value.is_null() {
                return Ok(value);
            }
        }
        Ok(destination.uuid_value())
    }

    fn stamp(&mut self, now: u64) -> Result<(), Error> {
        let catalog = self.catalog;
        for (identity, record) in self.objects.iter_mut() {
            record.updated_at = now;
            if !catalog.entity(identity.entity())?.is_stamped() {
                continue;
            }
            if self.inserted.contains(identity) && record.value(CREATED_ATTRIBUTE).is_null() {
                record
                    .attributes
                    .insert(CREATED_ATTRIBUTE.to_string(), Value::Timestamp(now));
            }
            record
                .attributes
                .insert(LAST_MODIFIED_ATTRIBUTE.to_string(), Value::Timestamp(now));
        }
        Ok(())
    }
}

impl ObjectSession for UnitOfWork<'_> {
    fn create_instance(&mut self, entity: &str) -> Result<Identity, Error> {
        let catalog = self.catalog;
        let definition = catalog.entity(entity)?;

        let identity = Identity::new(entity, StorageEngine::generate_id());
        let mut record = ObjectRecord::new(entity);
        for attribute in &definition.attributes {
            if let Some(default) = &attribute.default {
                record
                    .attributes
                    .insert(attribute.name.clone(), default.clone());
            }
        }
        self.objects.insert(identity.clone(), record);
        self.inserted.insert(identity.clone());

        let initializers = self.initializers.get(entity).cloned().unwrap_or_default();
        for initializer in initializers {
            (*initializer)(&mut *self, &identity)?;
        }

        trace!(object = %identity, "instance created");
        Ok(identity)
    }

    fn contains(&self, identity: &Identity) -> Result<bool, Error> {
        if self.deleted.contains(identity) {
            return Ok(false);
        }
        if self.objects.contains_key(identity) {
            return Ok(true);
        }
        self.engine.contains(identity)
    }

    fn is_temporary(&self, identity: &Identity) -> bool {
        self.inserted.contains(identity)
    }

    fn is_pending_delete(&self, identity: &Identity) -> bool {
        self.deleted.contains(identity)
    }

    fn value(&self, identity: &Identity, attribute: &str) -> Result<Value, Error> {
        self.attribute_def(identity, attribute)?;
        Ok(self.record(identity)?.value(attribute))
    }

    fn set_value(
        &mut self,
        identity: &Identity,
        attribute: &str,
        value: Value,
    ) -> Result<(), Error> {
        let definition = self.attribute_def(identity, attribute)?;
        if !definition.scalar_type.accepts(&value) {
            return Err(Error::TypeMismatch {
                entity: identity.entity().to_string(),
                attribute: attribute.to_string(),
                expected: format!("{:?}", definition.scalar_type).to_lowercase(),
            });
        }
        self.record_mut(identity)?
            .attributes
            .insert(attribute.to_string(), value);
        Ok(())
    }

    fn to_one(&self, identity: &Identity, relationship: &str) -> Result<Option<Identity>, Error> {
        let definition = self.relationship_def(identity, relationship)?;
        if !definition.is_to_one() {
            return Err(Error::invalid_state(format!(
                "{}.{} is a to-many relationship",
                identity.entity(),
                relationship
            )));
        }
        Ok(self.record(identity)?.to_one(relationship).cloned())
    }

    fn to_many(&self, identity: &Identity, relationship: &str) -> Result<Vec<Identity>, Error> {
        let definition = self.relationship_def(identity, relationship)?;
        if !definition.is_to_many() {
            return Err(Error::invalid_state(format!(
                "{}.{} is a to-one relationship",
                identity.entity(),
                relationship
            )));
        }
        Ok(self.record(identity)?.to_many(relationship).to_vec())
    }

    fn add_to_both_sides(
        &mut self,
        source: &Identity,
        relationship: &str,
        destination: &Identity,
    ) -> Result<(), Error> {
        let catalog = self.catalog;
        let forward = self.relationship_def(source, relationship)?;
        self.check_destination(forward, destination)?;

        let displaced = self.link_one_side(source, forward, destination)?;
        if let Some(inverse) = catalog.inverse_of(forward) {
            // A to-one forward link moved away from its old destination.
            if let Some(old) = displaced {
                if self.contains(&old)? {
                    self.unlink_one_side(&old, inverse, source)?;
                }
            }
            // A to-one inverse link re-homes the destination.
            if let Some(old_source) = self.link_one_side(destination, inverse, source)? {
                if self.contains(&old_source)? {
                    self.unlink_one_side(&old_source, forward, destination)?;
                }
            }
        }

        trace!(source = %source, relationship, destination = %destination, "linked");
        Ok(())
    }

    fn remove_from_both_sides(
        &mut self,
        source: &Identity,
        relationship: &str,
        destination: &Identity,
    ) -> Result<(), Error> {
        let catalog = self.catalog;
        let forward = self.relationship_def(source, relationship)?;

        self.unlink_one_side(source, forward, destination)?;
        if let Some(inverse) = catalog.inverse_of(forward) {
            if self.contains(destination)? {
                self.unlink_one_side(destination, inverse, source)?;
            }
        }

        trace!(source = %source, relationship, destination = %destination, "unlinked");
        Ok(())
    }

    fn delete(&mut self, identity: &Identity) -> Result<(), Error> {
        if self.deleted.contains(identity) {
            return Ok(());
        }

        let catalog = self.catalog;
        let entity = catalog.entity(identity.entity())?;
        let record = self.record(identity)?.into_owned();
        // Marked first so cycles through owned relationships terminate.
        self.deleted.insert(identity.clone());

        for relationship in &entity.relationships {
            let linked: Vec<Identity> = if relationship.is_to_one() {
                record.to_one(&relationship.name).cloned().into_iter().collect()
            } else {
                record.to_many(&relationship.name).to_vec()
            };

            if let Some(inverse) = catalog.inverse_of(relationship) {
                for destination in &linked {
                    if self.contains(destination)? {
                        self.unlink_one_side(destination, inverse, identity)?;
                    }
                }
            }

            if relationship.owns {
                for destination in &linked {
                    if self.contains(destination)? {
                        self.delete(destination)?;
                    }
                }
            }
        }

        self.objects.remove(identity);
        if self.inserted.remove(identity) {
            self.deleted.remove(identity);
            debug!(object = %identity, "temporary object discarded");
        } else {
            debug!(object = %identity, "object marked for deletion");
        }
        Ok(())
    }

    fn probe_references(
        &self,
        entity: &str,
        relationship: &str,
        target: &Identity,
        limit: usize,
    ) -> Result<usize, Error> {
        self.catalog.relationship(entity, relationship)?;
        if limit == 0 {
            return Ok(0);
        }

        let mut count = 0;
        for (identity, record) in &self.objects {
            if identity.entity() == entity && record.references(relationship, target) {
                count += 1;
                if count >= limit {
                    return Ok(count);
                }
            }
        }

        for result in self.engine.scan_entity_type(entity) {
            let (identity, record) = result?;
            // Pending state shadows storage.
            if self.objects.contains_key(&identity) || self.deleted.contains(&identity) {
                continue;
            }
            if record.references(relationship, target) {
                count += 1;
                if count >= limit {
                    break;
                }
            }
        }

        trace!(entity, relationship, target = %target, count, "reference probe");
        Ok(count)
    }
}

fn absent(identity: &Identity) -> Error {
    Error::invalid_state(format!("{} is not registered in this unit of work", identity))
}
