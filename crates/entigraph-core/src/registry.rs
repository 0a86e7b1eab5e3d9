//! Process-level entry point.
//!
//! A [`Registry`] is built once at startup and handed by reference to
//! whatever needs the catalog, the settings or the authentication strategies.

use crate::catalog::{MetadataSource, SchemaCatalog};
use crate::config::Settings;
use crate::constraint::DeleteGuard;
use crate::copy::CopyEngine;
use crate::error::Error;
use crate::security::StrategyRegistry;
use crate::session::UnitOfWork;
use crate::storage::StorageEngine;
use std::sync::Arc;
use tracing::info;

/// Shared catalog, settings and authentication strategies.
#[derive(Debug)]
pub struct Registry {
    catalog: Arc<SchemaCatalog>,
    settings: Settings,
    authentication: StrategyRegistry,
}

impl Registry {
    /// Load the schema from `source` and build the registry.
    pub fn open(source: &dyn MetadataSource, settings: Settings) -> Result<Self, Error> {
        let catalog = SchemaCatalog::load(source)?;
        info!(
            version = catalog.schema().version,
            entities = catalog.schema().entities.len(),
            copy_mode = %settings.default_copy_mode,
            "registry opened"
        );
        Ok(Self::with_catalog(Arc::new(catalog), settings))
    }

    /// Build a registry over an already loaded catalog.
    pub fn with_catalog(catalog: Arc<SchemaCatalog>, settings: Settings) -> Self {
        Self {
            catalog,
            settings,
            authentication: StrategyRegistry::new(),
        }
    }

    /// Replace the authentication strategy registry.
    pub fn with_authentication(mut self, authentication: StrategyRegistry) -> Self {
        self.authentication = authentication;
        self
    }

    /// The schema catalog.
    pub fn catalog(&self) -> &Arc<SchemaCatalog> {
        &self.catalog
    }

    /// The settings.
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// A copy engine using the configured default mode.
    pub fn copy_engine(&self) -> CopyEngine<'_> {
        CopyEngine::new(&self.catalog, self.settings.default_copy_mode)
    }

    /// A delete guard over the catalog.
    pub fn delete_guard(&self) -> DeleteGuard<'_> {
        DeleteGuard::new(&self.catalog)
    }

    /// Start a unit of work against `engine`.
    pub fn unit_of_work<'a>(&'a self, engine: &'a StorageEngine) -> UnitOfWork<'a> {
        UnitOfWork::new(engine, &self.catalog)
    }

    /// Authentication strategies.
    pub fn authentication(&self) -> &StrategyRegistry {
        &self.authentication
    }
}
