//! Persistence sessions.
//!
//! [`ObjectSession`] is the contract the copy engine and the delete guard are
//! written against; [`UnitOfWork`] implements it over the sled storage engine.

mod session;
mod unit_of_work;

pub use session::ObjectSession;
pub use unit_of_work::{CommitSummary, Initializer, UnitOfWork};
