//! Runtime settings.

use crate::copy::CopyMode;
use crate::error::Error;

/// Environment variable holding the default copy mode.
pub const DEFAULT_COPY_MODE_ENV: &str = "ENTIGRAPH_DEFAULT_COPY_MODE";

/// Settings read once at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Settings {
    /// Mode used for entities without a declared copy strategy.
    pub default_copy_mode: CopyMode,
}

impl Settings {
    /// Create settings with defaults (`shallow` copy mode).
    pub fn new() -> Self {
        Self::default()
    }

    /// Read settings from the process environment.
    ///
    /// An unset variable keeps the default; an unparsable one is a
    /// configuration error.
    pub fn from_env() -> Result<Self, Error> {
        match std::env::var(DEFAULT_COPY_MODE_ENV) {
            Ok(value) => Self::from_value(Some(&value)),
            Err(std::env::VarError::NotPresent) => Self::from_value(None),
            Err(std::env::VarError::NotUnicode(_)) => Err(Error::Config(format!(
                "{} is not valid unicode",
                DEFAULT_COPY_MODE_ENV
            ))),
        }
    }

    /// Build settings from a raw copy mode value.
    pub fn from_value(default_copy_mode: Option<&str>) -> Result<Self, Error> {
        let default_copy_mode = match default_copy_mode {
            Some(value) if !value.trim().is_empty() => value.parse()?,
            _ => CopyMode::default(),
        };
        Ok(Self { default_copy_mode })
    }

    /// Set the default copy mode.
    pub fn with_default_copy_mode(mut self, mode: CopyMode) -> Self {
        self.default_copy_mode = mode;
        self
    }
}
