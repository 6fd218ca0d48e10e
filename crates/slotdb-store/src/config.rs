//! Writer configuration
//!
//! Settings are a flat string key/value bag with typed getters, plus the
//! serializer registry recorded in the store metadata. Values are parsed when
//! read, so a bad value surfaces as an error at the point it is used.
//!
//! # Example
//!
//! ```
//! use slotdb_store::{Configuration, config::LOAD_FACTOR};
//!
//! let config = Configuration::default().with(LOAD_FACTOR, "0.5");
//! assert_eq!(config.get_f64(LOAD_FACTOR).ok(), Some(0.5));
//! ```

use crate::error::ConfigError;
use crate::serializer::SerializerRegistry;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::str::FromStr;

/// Target ratio of keys to slots in every index table, in (0, 1)
pub const LOAD_FACTOR: &str = "load.factor";

/// Parent directory for the writer's scratch directory
pub const TEMP_DIR: &str = "tmp.dir";

/// Default [`LOAD_FACTOR`]
pub const DEFAULT_LOAD_FACTOR: f64 = 0.75;

/// Settings bag read by the store writer
#[derive(Debug, Clone, PartialEq)]
pub struct Configuration {
    values: BTreeMap<String, String>,
    serializers: SerializerRegistry,
}

impl Default for Configuration {
    fn default() -> Self {
        let mut values = BTreeMap::new();
        values.insert(LOAD_FACTOR.to_string(), DEFAULT_LOAD_FACTOR.to_string());
        Self {
            values,
            serializers: SerializerRegistry::new(),
        }
    }
}

impl Configuration {
    /// Create a configuration holding the default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a configuration with no settings at all
    pub fn empty() -> Self {
        Self {
            values: BTreeMap::new(),
            serializers: SerializerRegistry::new(),
        }
    }

    /// Parse a JSON object of string values on top of the defaults
    ///
    /// ```
    /// use slotdb_store::Configuration;
    ///
    /// let config = Configuration::from_json(r#"{"load.factor": "0.9"}"#).unwrap();
    /// assert_eq!(config.get("load.factor"), Some("0.9"));
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let overrides: BTreeMap<String, String> = serde_json::from_str(json)?;
        let mut config = Self::default();
        config.values.extend(overrides);
        Ok(config)
    }

    /// Set a value, returning `self` for chaining
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.set(key, value);
        self
    }

    /// Set a value
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Raw value for `key`
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    /// Raw value for `key`, or `default` when unset
    pub fn get_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.get(key).unwrap_or(default)
    }

    /// Whether `key` is set
    pub fn contains(&self, key: &str) -> bool {
        self.values.contains_key(key)
    }

    /// Required `f64` value
    pub fn get_f64(&self, key: &str) -> Result<f64, ConfigError> {
        self.parse(key, "floating point number")
    }

    /// `f64` value, or `default` when unset
    pub fn get_f64_or(&self, key: &str, default: f64) -> Result<f64, ConfigError> {
        self.parse_or(key, default, "floating point number")
    }

    /// Required `bool` value (`true` or `false`)
    pub fn get_bool(&self, key: &str) -> Result<bool, ConfigError> {
        self.parse(key, "boolean")
    }

    /// `bool` value, or `default` when unset
    pub fn get_bool_or(&self, key: &str, default: bool) -> Result<bool, ConfigError> {
        self.parse_or(key, default, "boolean")
    }

    /// Required `i32` value
    pub fn get_i32(&self, key: &str) -> Result<i32, ConfigError> {
        self.parse(key, "32-bit integer")
    }

    /// Required `i64` value
    pub fn get_i64(&self, key: &str) -> Result<i64, ConfigError> {
        self.parse(key, "64-bit integer")
    }

    /// `i64` value, or `default` when unset
    pub fn get_i64_or(&self, key: &str, default: i64) -> Result<i64, ConfigError> {
        self.parse_or(key, default, "64-bit integer")
    }

    /// Path value, if set
    pub fn get_path(&self, key: &str) -> Option<PathBuf> {
        self.get(key).map(PathBuf::from)
    }

    /// Registered value serializers
    pub fn serializers(&self) -> &SerializerRegistry {
        &self.serializers
    }

    /// Mutable access to the serializer registry
    pub fn serializers_mut(&mut self) -> &mut SerializerRegistry {
        &mut self.serializers
    }

    /// Replace the serializer registry
    #[must_use]
    pub fn with_serializers(mut self, serializers: SerializerRegistry) -> Self {
        self.serializers = serializers;
        self
    }

    fn parse<T: FromStr>(&self, key: &str, expected: &'static str) -> Result<T, ConfigError> {
        let raw = self
            .get(key)
            .ok_or_else(|| ConfigError::MissingKey(key.to_string()))?;
        parse_value(key, raw, expected)
    }

    fn parse_or<T: FromStr>(
        &self,
        key: &str,
        default: T,
        expected: &'static str,
    ) -> Result<T, ConfigError> {
        match self.get(key) {
            Some(raw) => parse_value(key, raw, expected),
            None => Ok(default),
        }
    }
}

fn parse_value<T: FromStr>(key: &str, raw: &str, expected: &'static str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value: raw.to_string(),
        expected,
    })
}
