//! Build configuration.
//!
//! Controls the policy knobs of the [`SchemaBuilder`](crate::SchemaBuilder):
//! whether single-union messages are promoted to oneofs automatically, and
//! which suffix marks the unspecified enum option.
//!
//! # Example YAML
//!
//! ```yaml
//! oneof_promotion:
//!   auto_promote: true
//!   union_name: type
//! enum_unspecified_suffix: UNSPECIFIED
//! ```

use serde::{Deserialize, Serialize};

/// Policy for treating a whole message as a oneof.
///
/// Without an explicit annotation, a message is promoted when
/// `auto_promote` is on, it declares exactly one non-synthetic union named
/// `union_name`, every union member is message-typed, and no field lives
/// outside the union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OneofPromotion {
    pub auto_promote: bool,
    pub union_name: String,
}

impl Default for OneofPromotion {
    fn default() -> Self {
        Self {
            auto_promote: true,
            union_name: "type".to_string(),
        }
    }
}

/// Builder configuration.
///
/// # Examples
///
/// ```
/// use msgshape_core::BuildConfig;
///
/// let config = BuildConfig::from_yaml_str("oneof_promotion:\n  auto_promote: false\n").unwrap();
/// assert!(!config.oneof_promotion.auto_promote);
/// assert_eq!(config.oneof_promotion.union_name, "type");
/// assert_eq!(config.enum_unspecified_suffix, "UNSPECIFIED");
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuildConfig {
    pub oneof_promotion: OneofPromotion,
    /// Suffix the zero enum option must end with.
    pub enum_unspecified_suffix: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            oneof_promotion: OneofPromotion::default(),
            enum_unspecified_suffix: "UNSPECIFIED".to_string(),
        }
    }
}

impl BuildConfig {
    /// Parses a configuration from YAML. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_yaml::Error`] for malformed YAML or wrong types.
    pub fn from_yaml_str(yaml: &str) -> Result<Self, serde_yaml::Error> {
        serde_yaml::from_str(yaml)
    }

    /// Parses a configuration from JSON. Missing keys take their defaults.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_json::Error`] for malformed JSON or wrong types.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Serializes the configuration to YAML.
    ///
    /// # Errors
    ///
    /// Returns the [`serde_yaml::Error`] if serialization fails.
    pub fn to_yaml_string(&self) -> Result<String, serde_yaml::Error> {
        serde_yaml::to_string(self)
    }
}
