//! Subcommand implementations.

use crate::formatter::{EntitySummary, Formatter};
use entigraph_core::copy::CopyContext;
use entigraph_core::{Identity, ObjectSession, Registry, StorageConfig, StorageEngine};
use std::path::Path;
use tracing::debug;

type CommandResult = Result<String, Box<dyn std::error::Error>>;

/// Summarise every entity of the schema.
pub fn schema(registry: &Registry, formatter: &dyn Formatter) -> CommandResult {
    let catalog = registry.catalog();
    let copy_engine = registry.copy_engine();
    let context = CopyContext::new();

    let mut entities = Vec::new();
    for entity in catalog.schema().entities.values() {
        let exposed_keys = catalog.exposed_key_attributes(&entity.name)?;
        let dangling_from = catalog
            .dangling_relationships_to(&entity.name)
            .iter()
            .map(|r| format!("{}.{}", r.entity, r.name))
            .collect();

        entities.push(EntitySummary {
            name: entity.name.clone(),
            exposed_keys: exposed_keys.iter().cloned().collect(),
            check_delete: entity.check_delete_required(),
            copy_strategy: copy_engine.strategy_for(entity, &context).to_string(),
            dangling_from,
        });
    }

    Ok(formatter.format_schema(&entities))
}

/// List stored instances of an entity.
pub fn list(
    registry: &Registry,
    data: &Path,
    entity: &str,
    formatter: &dyn Formatter,
) -> CommandResult {
    registry.catalog().entity(entity)?;
    let storage = open_storage(data)?;

    let identities = storage
        .list_ids(entity)
        .map(|id| id.map(|id| Identity::new(entity, id)))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(formatter.format_identities(entity, &identities))
}

/// Report every instance blocking the deletion of `object`.
///
/// Fails when the deletion would be refused.
pub fn check_delete(
    registry: &Registry,
    data: &Path,
    object: &str,
    formatter: &dyn Formatter,
) -> CommandResult {
    let object: Identity = object.parse()?;
    let storage = open_storage(data)?;
    let uow = registry.unit_of_work(&storage);
    let guard = registry.delete_guard();

    let dependencies = guard.dependents(&uow, &object)?;
    let output = formatter.format_dependencies(&object, &dependencies);

    if guard.is_check_required(&object)? && !dependencies.is_empty() {
        println!("{}", output);
        return Err(Box::new(dependencies[0].clone()));
    }
    Ok(output)
}

/// Copy `object` and commit the copy.
pub fn copy(
    registry: &Registry,
    data: &Path,
    object: &str,
    label: Option<&str>,
    formatter: &dyn Formatter,
) -> CommandResult {
    let object: Identity = object.parse()?;
    let storage = open_storage(data)?;
    let mut uow = registry.unit_of_work(&storage);

    let mut context = CopyContext::new();
    if let Some(label) = label {
        context = context.with_label(label);
    }

    if !uow.contains(&object)? {
        return Err(format!("{} is not stored in {}", object, data.display()).into());
    }

    let outcome = registry.copy_engine().copy_root(&mut uow, &object, &context)?;
    let summary = uow.commit()?;
    storage.flush()?;
    debug!(
        inserted = summary.inserted,
        updated = summary.updated,
        "copy committed"
    );

    Ok(formatter.format_copy(&object, &outcome.copy, outcome.memo.len()))
}

fn open_storage(data: &Path) -> Result<StorageEngine, entigraph_core::Error> {
    StorageEngine::open(StorageConfig::new(data))
}
