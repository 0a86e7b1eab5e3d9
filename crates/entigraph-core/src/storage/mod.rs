//! Storage layer for entigraph.
//!
//! This module provides a sled-based object store: one tree of rkyv-encoded
//! records keyed by instance id, and a type index for per-entity scans.

mod config;
mod engine;
mod record;

pub mod key;

pub use config::StorageConfig;
pub use engine::{StorageEngine, WriteOp};
pub use record::ObjectRecord;
