//! Attribute definitions for entities.

use super::types::ScalarType;
use crate::value::Value;
use rkyv::{Archive, Deserialize, Serialize};
use std::collections::BTreeMap;

/// `user_info` key disabling the copy of an attribute when set to `"false"`.
pub const COPYABLE_KEY: &str = "copyable";

/// An attribute definition within an entity.
#[derive(
    Debug, Clone, PartialEq, Archive, Serialize, Deserialize, serde::Serialize, serde::Deserialize,
)]
pub struct AttributeDef {
    /// Attribute name.
    pub name: String,
    /// Attribute data type.
    #[serde(rename = "type")]
    pub scalar_type: ScalarType,
    /// Whether the attribute must hold a value when committed.
    #[serde(default)]
    pub required: bool,
    /// Value assigned when a new instance is created.
    #[serde(default)]
    pub default: Option<Value>,
    /// Whether the attribute is visible to callers. Hidden attributes are
    /// storage-only columns (typically foreign keys) and are never copied.
    #[serde(default = "default_true")]
    pub class_property: bool,
    /// Free-form metadata flags.
    #[serde(default)]
    pub user_info: BTreeMap<String, String>,
}

fn default_true() -> bool {
    true
}

impl AttributeDef {
    /// Create a new optional attribute.
    pub fn new(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            name: name.into(),
            scalar_type,
            required: false,
            default: None,
            class_property: true,
            user_info: BTreeMap::new(),
        }
    }

    /// Create a new required attribute.
    pub fn required(name: impl Into<String>, scalar_type: ScalarType) -> Self {
        Self {
            required: true,
            ..Self::new(name, scalar_type)
        }
    }

    /// Set the default value.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Hide the attribute from callers.
    pub fn hidden(mut self) -> Self {
        self.class_property = false;
        self
    }

    /// Exclude the attribute from copies.
    pub fn not_copyable(self) -> Self {
        self.with_user_info(COPYABLE_KEY, "false")
    }

    /// Attach a metadata flag.
    pub fn with_user_info(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.user_info.insert(key.into(), value.into());
        self
    }

    /// Whether the copy engine may copy this attribute's value.
    ///
    /// Attributes are copyable unless their metadata says `copyable = "false"`.
    pub fn is_copyable(&self) -> bool {
        self.user_info
            .get(COPYABLE_KEY)
            .map_or(true, |v| !v.eq_ignore_ascii_case("false"))
    }

    /// Check if this attribute has a default value.
    pub fn has_default(&self) -> bool {
        self.default.is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_attribute_builder() {
        let attr = AttributeDef::required("status", ScalarType::String).with_default("open");

        assert_eq!(attr.name, "status");
        assert!(attr.required);
        assert!(attr.class_property);
        assert!(attr.has_default());
        assert!(attr.is_copyable());
    }

    #[test]
    fn test_copyable_flag() {
        assert!(!AttributeDef::new("token", ScalarType::String)
            .not_copyable()
            .is_copyable());
        assert!(!AttributeDef::new("token", ScalarType::String)
            .with_user_info(COPYABLE_KEY, "FALSE")
            .is_copyable());
        assert!(AttributeDef::new("token", ScalarType::String)
            .with_user_info(COPYABLE_KEY, "true")
            .is_copyable());
    }

    #[test]
    fn test_json_defaults() {
        let attr: AttributeDef =
            serde_json::from_str(r#"{ "name": "total", "type": "float" }"#).unwrap();

        assert!(attr.class_property);
        assert!(!attr.required);
        assert!(attr.user_info.is_empty());
    }
}
