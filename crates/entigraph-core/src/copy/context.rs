//! Per-call copy context.

use crate::catalog::CopyStrategy;
use std::collections::HashMap;

/// Call-site information passed down a copy operation.
///
/// A context can carry a label for logging and per-entity strategy overrides
/// that take precedence over what the entity declares.
#[derive(Debug, Clone, Default)]
pub struct CopyContext {
    label: Option<String>,
    overrides: HashMap<String, CopyStrategy>,
}

impl CopyContext {
    /// Create an empty context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Label the call site.
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    /// Force a strategy for every instance of `entity` copied under this
    /// context.
    pub fn with_override(mut self, entity: impl Into<String>, strategy: CopyStrategy) -> Self {
        self.overrides.insert(entity.into(), strategy);
        self
    }

    /// The call-site label.
    pub fn label(&self) -> Option<&str> {
        self.label.as_deref()
    }

    /// The override for `entity`, if any.
    pub fn override_for(&self, entity: &str) -> Option<CopyStrategy> {
        self.overrides.get(entity).copied()
    }
}
