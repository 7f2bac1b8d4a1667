//! Configuration types for connect-decrypt
//!
//! Two layers: the raw encrypted-field property map (a JSON object of
//! "encrypted field path" -> "decrypted field path" strings, as it arrives
//! from connector config) and the typed task configuration around it.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::ConfigError;
use crate::types::SensitiveString;

/// Default bound on dotted-path segments walked during field resolution
pub const DEFAULT_MAX_PATH_DEPTH: usize = 32;

/// One configured `(encrypted field path, decrypted field path)` pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PathPair {
    /// Dotted path of the encrypted binary value in the source document
    pub source: String,
    /// Dotted path the plaintext is written to
    pub target: String,
}

/// An ordered, immutable collection of field-path pairs
///
/// Built once at configure time from the raw property-map string. Entry
/// order is preserved from the input object so decryption order is
/// deterministic; correctness does not depend on it because each pair is
/// resolved independently.
#[derive(Debug, Clone, Default)]
pub struct PropertyMap {
    pairs: Vec<PathPair>,
}

impl PropertyMap {
    /// Create an empty property map (no encrypted fields configured)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Parse a raw property-map string.
    ///
    /// Input that does not parse as a JSON object yields an empty map, the
    /// same as an unset setting: no encrypted fields configured. A parsed
    /// object is validated strictly: every value must be a string and every
    /// key must be a non-empty field path.
    pub fn parse(raw: &str) -> Result<Self, ConfigError> {
        let parsed: serde_json::Value = match serde_json::from_str(raw) {
            Ok(value) => value,
            Err(_) => return Ok(Self::empty()),
        };
        let serde_json::Value::Object(entries) = parsed else {
            return Ok(Self::empty());
        };

        let mut pairs = Vec::with_capacity(entries.len());
        for (field_path, value) in entries {
            if field_path.is_empty() {
                return Err(ConfigError::EmptySourcePath);
            }
            let serde_json::Value::String(target) = value else {
                return Err(ConfigError::non_string_value(field_path));
            };
            pairs.push(PathPair {
                source: field_path,
                target,
            });
        }
        Ok(Self { pairs })
    }

    /// Iterate pairs in configured order
    pub fn iter(&self) -> impl Iterator<Item = &PathPair> {
        self.pairs.iter()
    }

    /// Number of configured pairs
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Check whether no pairs are configured
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<'a> IntoIterator for &'a PropertyMap {
    type Item = &'a PathPair;
    type IntoIter = std::slice::Iter<'a, PathPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.pairs.iter()
    }
}

/// Task configuration for the field decrypter
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct DecryptConfig {
    /// JSON object mapping encrypted field paths to decrypted field paths,
    /// e.g. `{"card.number": "card.number_plain"}`
    #[serde(default)]
    pub property_map: String,

    /// Maximum dotted-path segments walked while resolving a field; paths
    /// deeper than this resolve as absent
    #[serde(default = "default_max_path_depth")]
    #[validate(range(min = 1, max = 256))]
    pub max_path_depth: usize,
}

fn default_max_path_depth() -> usize {
    DEFAULT_MAX_PATH_DEPTH
}

impl Default for DecryptConfig {
    fn default() -> Self {
        Self {
            property_map: String::new(),
            max_path_depth: DEFAULT_MAX_PATH_DEPTH,
        }
    }
}

impl DecryptConfig {
    /// Create a config for a raw property-map string with default limits
    pub fn with_property_map(property_map: impl Into<String>) -> Self {
        Self {
            property_map: property_map.into(),
            ..Default::default()
        }
    }
}

/// Connection and credential settings for a key-vault-backed provider
///
/// The core never interprets these; they are the shape a host passes to its
/// `ProviderFactory` implementation. Credentials are `SensitiveString` so
/// they redact in logs and config dumps.
#[derive(Debug, Clone, Deserialize, Serialize, Validate, JsonSchema)]
pub struct KeyVaultSettings {
    /// Key vault endpoint, e.g. `mongodb://keyvault:27017`
    #[validate(length(min = 1))]
    pub endpoint: String,

    /// Namespace of the key vault collection (database.collection)
    #[serde(default)]
    pub key_vault_namespace: Option<String>,

    /// Username for vault authentication
    #[serde(default)]
    pub username: Option<String>,

    /// Password for vault authentication
    #[serde(default)]
    pub password: Option<SensitiveString>,

    /// API key for KMS providers that use token auth
    #[serde(default)]
    pub api_key: Option<SensitiveString>,
}
