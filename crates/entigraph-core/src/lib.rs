//! entigraph core - schema catalog, object-graph copy and delete safety.
//!
//! This crate provides a metadata-driven engine over entity graphs: a
//! [`SchemaCatalog`] of entities and relationships, a [`CopyEngine`] that
//! duplicates the sub-graph reachable from an instance, and a
//! [`DeleteGuard`] that refuses deletions which would leave inverse-less
//! references dangling. A sled-backed [`UnitOfWork`] implements the
//! [`ObjectSession`] contract both rely on.

#[cfg(feature = "mimalloc")]
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

pub mod catalog;
pub mod config;
pub mod constraint;
pub mod copy;
pub mod error;
pub mod identity;
pub mod registry;
pub mod security;
pub mod session;
pub mod storage;
pub mod value;

pub use catalog::{
    AttributeDef, Cardinality, CopyStrategy, EntityDef, LifecycleRules, MetadataSource,
    RelationshipDef, ReverseDependencyIndex, ScalarType, SchemaBundle, SchemaCatalog, SchemaFile,
    SchemaStore,
};
pub use config::Settings;
pub use constraint::DeleteGuard;
pub use copy::{CopyContext, CopyEngine, CopyMemo, CopyMode, CopyOutcome};
pub use error::{DependencyError, Error};
pub use identity::Identity;
pub use registry::Registry;
pub use session::{CommitSummary, ObjectSession, UnitOfWork};
pub use storage::{ObjectRecord, StorageConfig, StorageEngine, WriteOp};
pub use value::Value;

// Security exports
pub use security::{
    AuthStrategy, Authenticates, DirectoryBinder, PasswordCipher, SecurityError, SecurityResult,
    StrategyKind, StrategyRegistry,
};
