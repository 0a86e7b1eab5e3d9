//! Constraint enforcement module.
//!
//! This module guards deletions against instances that still reference the
//! target through relationships without inverse.

mod delete_guard;

pub use delete_guard::DeleteGuard;
