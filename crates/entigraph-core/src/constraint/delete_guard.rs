//! Delete-safety guard.
//!
//! A to-one relationship without inverse leaves no trace on its destination,
//! so deleting the destination would silently leave the referencing instances
//! pointing at nothing. Entities flagged with `check_delete` are protected by
//! probing every such relationship before the delete is accepted.

use crate::catalog::SchemaCatalog;
use crate::error::{DependencyError, Error};
use crate::identity::Identity;
use crate::session::ObjectSession;
use tracing::{debug, trace};

/// Checks deletions against the reverse-dependency index.
#[derive(Debug, Clone, Copy)]
pub struct DeleteGuard<'c> {
    catalog: &'c SchemaCatalog,
}

impl<'c> DeleteGuard<'c> {
    /// Create a guard over a catalog.
    pub fn new(catalog: &'c SchemaCatalog) -> Self {
        Self { catalog }
    }

    /// Check if deleting instances of this entity requires the probe.
    pub fn is_check_required(&self, instance: &Identity) -> Result<bool, Error> {
        Ok(self.catalog.entity(instance.entity())?.check_delete_required())
    }

    /// Probe every dangling relationship pointing at the instance's entity.
    ///
    /// Fails with the first referencing relationship found. Probe failures are
    /// returned unchanged.
    pub fn check_delete<S>(&self, session: &S, instance: &Identity) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;

        for relationship in self.catalog.dangling_relationships_to(instance.entity()) {
            trace!(
                object = %instance,
                entity = %relationship.entity,
                relationship = %relationship.name,
                "probing dangling relationship"
            );
            if session.probe_exists(&relationship.entity, &relationship.name, instance)? {
                debug!(
                    object = %instance,
                    referencing_entity = %relationship.entity,
                    relationship = %relationship.name,
                    "delete blocked"
                );
                return Err(DependencyError::new(
                    instance.entity(),
                    relationship.entity.as_str(),
                    relationship.name.as_str(),
                )
                .into());
            }
        }

        Ok(())
    }

    /// Run [`check_delete`](Self::check_delete) when the entity asks for it.
    pub fn validate_delete<S>(&self, session: &S, instance: &Identity) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        if self.is_check_required(instance)? {
            self.check_delete(session, instance)
        } else {
            self.ensure_registered(session, instance)
        }
    }

    /// Every dangling relationship currently referencing the instance.
    pub fn dependents<S>(
        &self,
        session: &S,
        instance: &Identity,
    ) -> Result<Vec<DependencyError>, Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.ensure_registered(session, instance)?;

        let mut dependents = Vec::new();
        for relationship in self.catalog.dangling_relationships_to(instance.entity()) {
            if session.probe_exists(&relationship.entity, &relationship.name, instance)? {
                dependents.push(DependencyError::new(
                    instance.entity(),
                    relationship.entity.as_str(),
                    relationship.name.as_str(),
                ));
            }
        }
        Ok(dependents)
    }

    fn ensure_registered<S>(&self, session: &S, instance: &Identity) -> Result<(), Error>
    where
        S: ObjectSession + ?Sized,
    {
        self.catalog.entity(instance.entity())?;
        if session.contains(instance)? || session.is_pending_delete(instance) {
            Ok(())
        } else {
            Err(Error::invalid_state(format!(
                "cannot check delete of {}: not registered in the session",
                instance
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{AttributeDef, EntityDef, RelationshipDef, ScalarType, SchemaBundle};
    use crate::session::UnitOfWork;
    use crate::storage::{StorageConfig, StorageEngine};

    fn schema() -> SchemaBundle {
        let parameter = EntityDef::new("Parameter")
            .with_attribute(AttributeDef::new("code", ScalarType::String))
            .with_check_delete();
        let currency = EntityDef::new("Currency")
            .with_attribute(AttributeDef::new("code", ScalarType::String));
        let order = EntityDef::new("Order")
            .with_relationship(RelationshipDef::to_one("parameter", "Order", "Parameter"))
            .with_relationship(RelationshipDef::to_one("currency", "Order", "Currency"));
        let invoice = EntityDef::new("Invoice")
            .with_relationship(RelationshipDef::to_one("parameter", "Invoice", "Parameter"));

        SchemaBundle::new(1)
            .with_entity(parameter)
            .with_entity(currency)
            .with_entity(order)
            .with_entity(invoice)
    }

    fn setup() -> (StorageEngine, SchemaCatalog) {
        let engine = StorageEngine::open(StorageConfig::temporary()).unwrap();
        let catalog = SchemaCatalog::from_schema(schema()).unwrap();
        (engine, catalog)
    }

    #[test]
    fn test_check_required_flag() {
        let (_engine, catalog) = setup();
        let guard = DeleteGuard::new(&catalog);

        assert!(guard
            .is_check_required(&Identity::new("Parameter", [0; 16]))
            .unwrap());
        assert!(!guard
            .is_check_required(&Identity::new("Currency", [0; 16]))
            .unwrap());
        assert!(guard
            .is_check_required(&Identity::new("Missing", [0; 16]))
            .unwrap_err()
            .is_invalid_state());
    }

    #[test]
    fn test_unreferenced_passes() {
        let (engine, catalog) = setup();
        let mut uow = UnitOfWork::new(&engine, &catalog);
        let parameter = uow.create_instance("Parameter").unwrap();

        let guard = DeleteGuard::new(&catalog);
        assert!(guard.check_delete(&uow, &parameter).is_ok());
        assert!(guard.dependents(&uow, &parameter).unwrap().is_empty());
    }

    #[test]
    fn test_referenced_fails() {
        let (engine, catalog) = setup();
        let mut uow = UnitOfWork::new(&engine, &catalog);
        let parameter = uow.create_instance("Parameter").unwrap();
        let order = uow.create_instance("Order").unwrap();
        uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();

        let guard = DeleteGuard::new(&catalog);
        let err = guard.check_delete(&uow, &parameter).unwrap_err();
        let dependency = err.as_dependency().unwrap();
        assert_eq!(dependency.entity, "Parameter");
        assert_eq!(dependency.referencing_entity, "Order");
        assert_eq!(dependency.relationship, "parameter");
    }

    #[test]
    fn test_validate_skips_unflagged_entity() {
        let (engine, catalog) = setup();
        let mut uow = UnitOfWork::new(&engine, &catalog);
        let currency = uow.create_instance("Currency").unwrap();
        let order = uow.create_instance("Order").unwrap();
        uow.add_to_both_sides(&order, "currency", &currency).unwrap();

        let guard = DeleteGuard::new(&catalog);
        assert!(guard.validate_delete(&uow, &currency).is_ok());
        assert!(guard.check_delete(&uow, &currency).is_err());
    }

    #[test]
    fn test_dependents_reports_all() {
        let (engine, catalog) = setup();
        let mut uow = UnitOfWork::new(&engine, &catalog);
        let parameter = uow.create_instance("Parameter").unwrap();
        let order = uow.create_instance("Order").unwrap();
        let invoice = uow.create_instance("Invoice").unwrap();
        uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
        uow.add_to_both_sides(&invoice, "parameter", &parameter).unwrap();

        let guard = DeleteGuard::new(&catalog);
        let mut referencing: Vec<_> = guard
            .dependents(&uow, &parameter)
            .unwrap()
            .into_iter()
            .map(|d| d.referencing_entity)
            .collect();
        referencing.sort();
        assert_eq!(referencing, vec!["Invoice".to_string(), "Order".to_string()]);
    }

    #[test]
    fn test_absent_instance_is_invalid_state() {
        let (engine, catalog) = setup();
        let uow = UnitOfWork::new(&engine, &catalog);

        let guard = DeleteGuard::new(&catalog);
        let ghost = Identity::new("Parameter", StorageEngine::generate_id());
        assert!(guard.check_delete(&uow, &ghost).unwrap_err().is_invalid_state());
        assert!(guard.validate_delete(&uow, &ghost).unwrap_err().is_invalid_state());
    }
}
