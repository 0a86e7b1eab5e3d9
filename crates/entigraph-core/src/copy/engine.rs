//! Object-graph copy engine.

use super::{CopyContext, CopyMemo, CopyMode};
use crate::catalog::{
    CopyStrategy, EntityDef, RelationshipDef, SchemaCatalog, CREATED_ATTRIBUTE,
    LAST_MODIFIED_ATTRIBUTE,
};
use crate::error::Error;
use crate::identity::Identity;
use crate::session::ObjectSession;
use crate::storage::key::current_timestamp;
use crate::value::Value;
use tracing::{debug, trace};

/// Result of [`CopyEngine::copy_root`].
#[derive(Debug, Clone)]
pub struct CopyOutcome {
    /// The copy of the root instance.
    pub copy: Identity,
    /// Every original reached by the operation and its copy.
    pub memo: CopyMemo,
}

/// Copies the sub-graph reachable from an instance.
///
/// The engine is stateless apart from the catalog and the default mode. All
/// per-operation state lives in the [`CopyMemo`] the caller passes in, which
/// is what makes cyclic graphs terminate: a new instance is registered in the
/// memo before any of its relationships are walked.
#[derive(Debug, Clone, Copy)]
pub struct CopyEngine<'c> {
    catalog: &'c SchemaCatalog,
    default_mode: CopyMode,
}

impl<'c> CopyEngine<'c> {
    /// Create an engine.
    pub fn new(catalog: &'c SchemaCatalog, default_mode: CopyMode) -> Self {
        Self {
            catalog,
            default_mode,
        }
    }

    /// Mode used for entities that declare no strategy.
    pub fn default_mode(&self) -> CopyMode {
        self.default_mode
    }

    /// Copy an instance with a fresh memo.
    pub fn copy_root<S>(
        &self,
        session: &mut S,
        instance: &Identity,
        context: &CopyContext,
    ) -> Result<CopyOutcome, Error>
    where
        S: ObjectSession + ?Sized,
    {
        let mut memo = CopyMemo::new();
        let copy = self.copy(session, instance, &mut memo, context)?;
        debug!(
            original = %instance,
            copy = %copy,
            copied = memo.len(),
            "copy finished"
        );
        Ok(CopyOutcome { copy, memo })
    }

    /// Copy an instance, reusing the memoized copy when there is one.
    ///
    /// Genuine new copies of stamped entities get fresh `created` and
    /// `last_modified` timestamps.
    pub fn copy<S>(
        &self,
        session: &mut S,
        instance: &Identity,
        memo: &mut CopyMemo,
        context: &CopyContext,
    ) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        if let Some(copy) = memo.get(instance) {
            trace!(original = %instance, copy = %copy, "memo hit");
            return Ok(copy.clone());
        }

        let duplicate = self.duplicate(session, instance, memo, context)?;
        let copy = memo.register(instance.clone(), duplicate).clone();
        if &copy != instance {
            self.stamp(session, &copy)?;
        }
        Ok(copy)
    }

    /// Duplicate an instance with the strategy that applies to it.
    ///
    /// The strategy is taken from the context override for the entity, then
    /// from the entity declaration, then from the default mode.
    pub fn duplicate<S>(
        &self,
        session: &mut S,
        instance: &Identity,
        memo: &mut CopyMemo,
        context: &CopyContext,
    ) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;
        let entity = self.catalog.entity(instance.entity())?;
        let strategy = self.strategy_for(entity, context);

        debug!(
            object = %instance,
            %strategy,
            context = context.label().unwrap_or_default(),
            "duplicating"
        );

        match strategy {
            CopyStrategy::Reference => self.reference_copy(session, instance),
            CopyStrategy::Shallow => self.shallow_copy(session, instance, memo),
            CopyStrategy::Deep => self.deep_copy(session, instance, memo, context),
        }
    }

    /// The strategy [`duplicate`](Self::duplicate) uses for `entity`.
    pub fn strategy_for(&self, entity: &EntityDef, context: &CopyContext) -> CopyStrategy {
        context
            .override_for(&entity.name)
            .or(entity.lifecycle.copy_strategy)
            .unwrap_or_else(|| self.default_mode.into())
    }

    /// Return the instance itself.
    pub fn reference_copy<S>(&self, session: &S, instance: &Identity) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;
        Ok(instance.clone())
    }

    /// Copy attributes and duplicate owned relationships one level deep.
    ///
    /// Owned destinations are shallow-copied (or taken from the memo).
    /// Non-owned to-many destinations are shared with the original; non-owned
    /// to-one destinations are replaced by their memoized copy when there is
    /// one.
    pub fn shallow_copy<S>(
        &self,
        session: &mut S,
        instance: &Identity,
        memo: &mut CopyMemo,
    ) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;
        let entity = self.catalog.entity(instance.entity())?;

        let copy = self.new_instance(session, entity)?;
        memo.register(instance.clone(), copy.clone());
        self.copy_attributes(session, entity, instance, &copy)?;

        for relationship in entity.to_many_relationships().filter(|r| r.class_property) {
            for destination in session.to_many(instance, &relationship.name)? {
                let target = if relationship.owns {
                    self.owned_shallow_copy(session, &destination, memo)?
                } else {
                    destination
                };
                self.link(session, &copy, relationship, &target)?;
            }
        }

        for relationship in entity.to_one_relationships().filter(|r| r.class_property) {
            let Some(destination) = session.to_one(instance, &relationship.name)? else {
                continue;
            };
            let target = if relationship.owns {
                self.owned_shallow_copy(session, &destination, memo)?
            } else {
                memo.get(&destination).cloned().unwrap_or(destination)
            };
            self.link(session, &copy, relationship, &target)?;
        }

        trace!(original = %instance, copy = %copy, "shallow copy");
        Ok(copy)
    }

    /// Copy attributes and walk every relationship through [`copy`](Self::copy).
    ///
    /// To-many and owned to-one destinations are copied with the shared memo.
    /// Non-owned to-one destinations are replaced by their memoized copy when
    /// there is one and referenced otherwise.
    pub fn deep_copy<S>(
        &self,
        session: &mut S,
        instance: &Identity,
        memo: &mut CopyMemo,
        context: &CopyContext,
    ) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;
        let entity = self.catalog.entity(instance.entity())?;

        let copy = self.new_instance(session, entity)?;
        memo.register(instance.clone(), copy.clone());
        self.copy_attributes(session, entity, instance, &copy)?;

        for relationship in entity.to_many_relationships().filter(|r| r.class_property) {
            for destination in session.to_many(instance, &relationship.name)? {
                let target = self.copy(session, &destination, memo, context)?;
                self.link(session, &copy, relationship, &target)?;
            }
        }

        for relationship in entity.to_one_relationships().filter(|r| r.class_property) {
            let Some(destination) = session.to_one(instance, &relationship.name)? else {
                continue;
            };
            let target = if relationship.owns {
                self.copy(session, &destination, memo, context)?
            } else {
                memo.get(&destination).cloned().unwrap_or(destination)
            };
            self.link(session, &copy, relationship, &target)?;
        }

        trace!(original = %instance, copy = %copy, "deep copy");
        Ok(copy)
    }

    /// Allocate an empty instance of `entity`.
    ///
    /// Links set up by insertion side effects are removed on both sides, and
    /// removed instances that were only created by those side effects are
    /// deleted.
    pub fn new_instance<S>(&self, session: &mut S, entity: &EntityDef) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        let copy = session.create_instance(&entity.name)?;

        for relationship in &entity.relationships {
            let linked: Vec<Identity> = if relationship.is_to_many() {
                session.to_many(&copy, &relationship.name)?
            } else {
                session.to_one(&copy, &relationship.name)?.into_iter().collect()
            };

            for destination in linked {
                session.remove_from_both_sides(&copy, &relationship.name, &destination)?;
                if session.is_temporary(&destination) && session.contains(&destination)? {
                    trace!(object = %destination, "discarding initializer object");
                    session.delete(&destination)?;
                }
            }
        }

        Ok(copy)
    }

    /// Copy the copyable class attributes of `source` onto `copy`.
    ///
    /// Exposed key attributes are set to null instead, copyable or not.
    pub fn copy_attributes<S>(
        &self,
        session: &mut S,
        entity: &EntityDef,
        source: &Identity,
        copy: &Identity,
    ) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        let exposed_keys = self.catalog.exposed_key_attributes(&entity.name)?;

        for attribute in entity.class_attributes() {
            // Exposed keys are nulled even when not copyable.
            let value = if exposed_keys.contains(&attribute.name) {
                Value::Null
            } else if attribute.is_copyable() {
                session.value(source, &attribute.name)?
            } else {
                continue;
            };
            session.set_value(copy, &attribute.name, value)?;
        }

        Ok(())
    }

    fn owned_shallow_copy<S>(
        &self,
        session: &mut S,
        destination: &Identity,
        memo: &mut CopyMemo,
    ) -> Result<Identity, Error>
    where
        S: ObjectSession + ?Sized,
    {
        match memo.get(destination) {
            Some(copy) => Ok(copy.clone()),
            None => self.shallow_copy(session, destination, memo),
        }
    }

    /// Link `target` unless a nested copy already did.
    fn link<S>(
        &self,
        session: &mut S,
        copy: &Identity,
        relationship: &RelationshipDef,
        target: &Identity,
    ) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        let linked = if relationship.is_to_many() {
            session.to_many(copy, &relationship.name)?.contains(target)
        } else {
            session.to_one(copy, &relationship.name)?.as_ref() == Some(target)
        };

        if !linked {
            session.add_to_both_sides(copy, &relationship.name, target)?;
        }
        Ok(())
    }

    fn stamp<S>(&self, session: &mut S, copy: &Identity) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        if !self.catalog.entity(copy.entity())?.is_stamped() {
            return Ok(());
        }

        let now = Value::Timestamp(current_timestamp());
        session.set_value(copy, CREATED_ATTRIBUTE, now.clone())?;
        session.set_value(copy, LAST_MODIFIED_ATTRIBUTE, now)
    }

    fn ensure_registered<S>(&self, session: &S, instance: &Identity) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        if session.contains(instance)? {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot copy {}: not registered in the session",
                instance
            )))
        }
    }
}
