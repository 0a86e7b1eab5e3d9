//! Integration tests for the delete-safety guard.

use entigraph_core::catalog::{
    AttributeDef, EntityDef, RelationshipDef, ScalarType, SchemaBundle, SchemaCatalog,
};
use entigraph_core::constraint::DeleteGuard;
use entigraph_core::session::{ObjectSession, UnitOfWork};
use entigraph_core::storage::{StorageConfig, StorageEngine};
use entigraph_core::{Error, Identity};

struct TestContext {
    storage: StorageEngine,
    catalog: SchemaCatalog,
    _storage_dir: tempfile::TempDir,
}

impl TestContext {
    fn new() -> Self {
        let storage_dir = tempfile::tempdir().unwrap();
        let storage = StorageEngine::open(StorageConfig::new(storage_dir.path())).unwrap();
        let catalog = SchemaCatalog::from_schema(billing_schema()).unwrap();

        Self {
            storage,
            catalog,
            _storage_dir: storage_dir,
        }
    }

    fn unit_of_work(&self) -> UnitOfWork<'_> {
        UnitOfWork::new(&self.storage, &self.catalog)
    }

    fn guard(&self) -> DeleteGuard<'_> {
        DeleteGuard::new(&self.catalog)
    }
}

fn billing_schema() -> SchemaBundle {
    let parameter = EntityDef::new("Parameter")
        .with_attribute(AttributeDef::new("code", ScalarType::String))
        .with_check_delete();

    let currency =
        EntityDef::new("Currency").with_attribute(AttributeDef::new("code", ScalarType::String));

    let order = EntityDef::new("Order")
        .with_attribute(AttributeDef::new("number", ScalarType::String))
        .with_relationship(RelationshipDef::to_one("parameter", "Order", "Parameter"))
        .with_relationship(RelationshipDef::to_one("currency", "Order", "Currency"))
        .with_relationship(
            RelationshipDef::to_many("lines", "Order", "OrderLine")
                .owned()
                .with_inverse("order"),
        );

    let line = EntityDef::new("OrderLine")
        .with_attribute(AttributeDef::new("amount", ScalarType::Int))
        .with_relationship(
            RelationshipDef::to_one("order", "OrderLine", "Order").with_inverse("lines"),
        );

    let invoice = EntityDef::new("Invoice")
        .with_relationship(RelationshipDef::to_one("parameter", "Invoice", "Parameter"));

    SchemaBundle::new(1)
        .with_entity(parameter)
        .with_entity(currency)
        .with_entity(order)
        .with_entity(line)
        .with_entity(invoice)
}

fn create(uow: &mut UnitOfWork<'_>, entity: &str) -> Identity {
    uow.create_instance(entity).unwrap()
}

#[test]
fn test_reverse_dependency_index() {
    let ctx = TestContext::new();
    let index = ctx.catalog.reverse_dependency_index();

    let mut referencing: Vec<_> = index
        .dependents_of("Parameter")
        .iter()
        .map(|r| (r.entity.as_str(), r.name.as_str()))
        .collect();
    referencing.sort();
    assert_eq!(referencing, vec![("Invoice", "parameter"), ("Order", "parameter")]);

    // Relationships with an inverse are tracked by the inverse instead.
    assert!(index.dependents_of("Order").is_empty());
    assert_eq!(index.dependents_of("Currency").len(), 1);
}

#[test]
fn test_parameter_order_scenario() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();

    let used = create(&mut uow, "Parameter");
    let unused = create(&mut uow, "Parameter");
    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "parameter", &used).unwrap();
    uow.commit().unwrap();

    let guard = ctx.guard();
    let err = guard.check_delete(&uow, &used).unwrap_err();
    let dependency = err.as_dependency().unwrap();
    assert_eq!(dependency.entity, "Parameter");
    assert_eq!(dependency.referencing_entity, "Order");
    assert_eq!(dependency.relationship, "parameter");
    assert_eq!(
        err.to_string(),
        "unable to delete Parameter: there is a connection with the entity Order (parameter)"
    );

    assert!(guard.check_delete(&uow, &unused).is_ok());
    assert!(guard.validate_delete(&uow, &unused).is_ok());
}

#[test]
fn test_commit_blocked_by_stored_reference() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    uow.commit().unwrap();

    uow.delete(&parameter).unwrap();
    let err = uow.commit().unwrap_err();
    assert!(matches!(err, Error::Dependency(_)));
    assert!(ctx.storage.contains(&parameter).unwrap());

    uow.rollback();
    assert!(uow.contains(&parameter).unwrap());
}

#[test]
fn test_commit_allowed_when_referrer_deleted_too() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    uow.commit().unwrap();

    uow.delete(&order).unwrap();
    uow.delete(&parameter).unwrap();
    let summary = uow.commit().unwrap();

    assert_eq!(summary.deleted, 2);
    assert!(!ctx.storage.contains(&parameter).unwrap());
    assert!(!ctx.storage.contains(&order).unwrap());
}

#[test]
fn test_pending_reference_blocks_delete() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    uow.commit().unwrap();

    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();

    let guard = ctx.guard();
    assert!(guard.check_delete(&uow, &parameter).is_err());
    assert!(guard.validate_delete(&uow, &parameter).is_err());
}

#[test]
fn test_pending_unlink_shadows_storage() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    uow.commit().unwrap();

    uow.remove_from_both_sides(&order, "parameter", &parameter)
        .unwrap();
    assert!(ctx.guard().check_delete(&uow, &parameter).is_ok());

    uow.delete(&parameter).unwrap();
    uow.commit().unwrap();

    let stored = ctx.storage.get(&order).unwrap().unwrap();
    assert!(stored.to_one("parameter").is_none());
}

#[test]
fn test_unflagged_entity_is_not_checked() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let currency = create(&mut uow, "Currency");
    let order = create(&mut uow, "Order");
    uow.add_to_both_sides(&order, "currency", &currency).unwrap();
    uow.commit().unwrap();

    let guard = ctx.guard();
    assert!(!guard.is_check_required(&currency).unwrap());
    assert_eq!(guard.dependents(&uow, &currency).unwrap().len(), 1);

    uow.delete(&currency).unwrap();
    uow.commit().unwrap();

    // Nothing on the currency side knew about the order.
    let stored = ctx.storage.get(&order).unwrap().unwrap();
    assert_eq!(stored.to_one("currency"), Some(&currency));
    assert!(!ctx.storage.contains(&currency).unwrap());
}

#[test]
fn test_dependents_reports_every_relationship() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    let order = create(&mut uow, "Order");
    let invoice = create(&mut uow, "Invoice");
    uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    uow.add_to_both_sides(&invoice, "parameter", &parameter).unwrap();
    uow.commit().unwrap();

    let mut dependents: Vec<String> = ctx
        .guard()
        .dependents(&uow, &parameter)
        .unwrap()
        .into_iter()
        .map(|d| d.referencing_entity)
        .collect();
    dependents.sort();
    assert_eq!(dependents, vec!["Invoice", "Order"]);
}

#[test]
fn test_probe_is_bounded() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let parameter = create(&mut uow, "Parameter");
    for _ in 0..3 {
        let order = create(&mut uow, "Order");
        uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    }
    uow.commit().unwrap();
    // Two more pending in the unit of work.
    for _ in 0..2 {
        let order = create(&mut uow, "Order");
        uow.add_to_both_sides(&order, "parameter", &parameter).unwrap();
    }

    assert_eq!(uow.probe_references("Order", "parameter", &parameter, 1).unwrap(), 1);
    assert_eq!(uow.probe_references("Order", "parameter", &parameter, 4).unwrap(), 4);
    assert_eq!(uow.probe_references("Order", "parameter", &parameter, 100).unwrap(), 5);
    assert_eq!(uow.probe_references("Invoice", "parameter", &parameter, 100).unwrap(), 0);
    assert!(matches!(
        uow.probe_references("Order", "missing", &parameter, 1),
        Err(Error::UnknownRelationship { .. })
    ));
}

#[test]
fn test_delete_cascades_to_owned_lines() {
    let ctx = TestContext::new();
    let mut uow = ctx.unit_of_work();
    let order = create(&mut uow, "Order");
    let lines: Vec<Identity> = (0..3)
        .map(|amount| {
            let line = create(&mut uow, "OrderLine");
            uow.set_value(&line, "amount", (amount as i64).into()).unwrap();
            uow.add_to_both_sides(&order, "lines", &line).unwrap();
            line
        })
        .collect();
    uow.commit().unwrap();

    uow.delete(&order).unwrap();
    let summary = uow.commit().unwrap();

    assert_eq!(summary.deleted, 4);
    for line in &lines {
        assert!(!ctx.storage.contains(line).unwrap());
    }
    assert_eq!(ctx.storage.list_ids("OrderLine").count(), 0);
}

#[test]
fn test_guard_rejects_unknown_instances() {
    let ctx = TestContext::new();
    let uow = ctx.unit_of_work();
    let ghost = Identity::new("Parameter", StorageEngine::generate_id());

    assert!(ctx.guard().check_delete(&uow, &ghost).unwrap_err().is_invalid_state());
    assert!(ctx.guard().dependents(&uow, &ghost).unwrap_err().is_invalid_state());
}
