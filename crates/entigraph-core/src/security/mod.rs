//! Password authentication strategies.
//!
//! A host picks one strategy per population of users (`simple`, `digested`,
//! `encrypted` or `ldap`) and fetches it by key from a [`StrategyRegistry`]:
//!
//! ```ignore
//! use entigraph_core::security::{Authenticates, StrategyKind, StrategyOptions, StrategyRegistry};
//!
//! let registry = StrategyRegistry::new();
//! let strategy = registry.strategy("staff", StrategyKind::Digested, &StrategyOptions::new())?;
//! let credential = strategy.encrypt_password("hunter2", "alice")?;
//! assert!(strategy.authenticate(&credential, "hunter2", "alice")?);
//! ```

mod error;
mod registry;
mod strategy;

pub use error::{SecurityError, SecurityResult};
pub use registry::StrategyRegistry;
pub use strategy::{
    AuthStrategy, Authenticates, DirectoryBinder, PasswordCipher, StrategyKind, StrategyOptions,
    BASE_DN_OPTION, LDAP_URL_OPTION, SECRET_KEY_OPTION,
};
