//! Graph copy engine.
//!
//! Copies the sub-graph reachable from a root instance. Each entity is
//! duplicated with a strategy (reference, shallow or deep) and a memo table
//! keeps exactly one copy per original, so shared and cyclic references
//! resolve to the same copy.

mod context;
mod engine;
mod memo;
mod mode;

pub use context::CopyContext;
pub use engine::{CopyEngine, CopyOutcome};
pub use memo::CopyMemo;
pub use mode::CopyMode;
