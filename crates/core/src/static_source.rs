//! File-backed and fixed attribute sources.
//!
//! The backing file format maps a key value to the attributes stored for it:
//!
//! ```toml
//! [entries.edalquist]
//! phone = ["777-7777"]
//! studentId = ["123456789"]
//!
//! [entries.awp9]
//! phone = ["888-8888"]
//! studentId = ["987654321"]
//! ```

use std::collections::{HashMap, HashSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::{AttributeMap, AttributeValue};
use crate::default_query::KeyedLookup;
use crate::errors::{ConfigError, SourceError};
use crate::source::AttributeSource;

/// On-disk layout of a backing file.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct BackingFileData {
    /// The `[entries]` table mapping key value -> attributes.
    #[serde(default)]
    pub entries: HashMap<String, AttributeMap>,
}

/// In-memory `key value -> attributes` table, usually wrapped in a
/// [`DefaultQuerySource`](crate::default_query::DefaultQuerySource).
#[derive(Debug, Clone, Default)]
pub struct BackingMapLookup {
    entries: HashMap<String, AttributeMap>,
}

impl BackingMapLookup {
    pub fn new(entries: HashMap<String, AttributeMap>) -> Self {
        Self { entries }
    }

    /// Load a backing file from disk.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading attribute backing file");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let data: BackingFileData = toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;

        debug!(count = data.entries.len(), "loaded backing entries");
        Ok(Self::new(data.entries))
    }

    /// Write the table back to disk in TOML format.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<(), ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "saving attribute backing file");

        let data = BackingFileData {
            entries: self.entries.clone(),
        };
        let toml_str = toml::to_string_pretty(&data).map_err(|e| ConfigError::ParseError {
            path: path.display().to_string(),
            detail: e.to_string(),
        })?;
        std::fs::write(path, toml_str)?;

        debug!(count = self.entries.len(), "saved backing entries");
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KeyedLookup for BackingMapLookup {
    fn lookup(&self, key: &AttributeValue) -> Result<Option<AttributeMap>, SourceError> {
        // Unknown keys are "not found", which is an empty answer.
        Ok(Some(
            self.entries
                .get(&key.to_string())
                .cloned()
                .unwrap_or_default(),
        ))
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Ok(self
            .entries
            .values()
            .flat_map(|attrs| attrs.keys().cloned())
            .collect())
    }
}

/// A source that answers every query with the same attributes.
#[derive(Debug, Clone)]
pub struct StaticSource {
    name: String,
    attributes: AttributeMap,
}

impl StaticSource {
    pub fn new(name: impl Into<String>, attributes: AttributeMap) -> Self {
        Self {
            name: name.into(),
            attributes,
        }
    }
}

impl AttributeSource for StaticSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, _seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        Ok(Some(self.attributes.clone()))
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Ok(self.attributes.keys().cloned().collect())
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        HashSet::new()
    }
}
