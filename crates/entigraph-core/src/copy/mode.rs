//! Copy modes.

use crate::catalog::CopyStrategy;
use crate::error::Error;
use std::fmt;
use std::str::FromStr;

/// Default duplication depth for entities that declare no strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CopyMode {
    /// Duplicate owned relationships one level deep; reference the rest.
    #[default]
    Shallow,
    /// Walk every relationship through the full copy engine.
    Deep,
}

impl From<CopyMode> for CopyStrategy {
    fn from(mode: CopyMode) -> Self {
        match mode {
            CopyMode::Shallow => CopyStrategy::Shallow,
            CopyMode::Deep => CopyStrategy::Deep,
        }
    }
}

impl FromStr for CopyMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "shallow" => Ok(CopyMode::Shallow),
            "deep" => Ok(CopyMode::Deep),
            other => Err(Error::Config(format!(
                "unknown copy mode '{}', expected 'shallow' or 'deep'",
                other
            ))),
        }
    }
}

impl fmt::Display for CopyMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyMode::Shallow => write!(f, "shallow"),
            CopyMode::Deep => write!(f, "deep"),
        }
    }
}
