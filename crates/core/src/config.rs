//! TOML-based configuration for a person directory.
//!
//! A config file describes the resolver policy and the ordered source list:
//!
//! ```toml
//! [logging]
//! level = "info"
//!
//! [resolver]
//! merger = "multivalued_union"
//! stop_on_first_success = false
//! recover_from_source_failure = true
//! mode = "cascading"
//!
//! [[sources]]
//! kind = "file"
//! name = "campus"
//! path = "campus.toml"
//! query_attribute = "username"
//! ```
//!
//! Relative `path` values are resolved against the config file's directory.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::attributes::{AttributeMap, AttributeValue};
use crate::default_query::DefaultQuerySource;
use crate::errors::{ConfigError, CoreError};
use crate::merger::MergeStrategy;
use crate::person::{PersonDirectory, DEFAULT_USERNAME_ATTRIBUTE};
use crate::resolver::{AggregatingResolver, QueryMode, ResolverPolicy};
use crate::rules::{AttributeRule, RuleEngine, SimpleAttributeRule};
use crate::source::SharedSource;
use crate::static_source::{BackingMapLookup, StaticSource};

// ---------------------------------------------------------------------------
// Top-level config
// ---------------------------------------------------------------------------

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DirectoryConfig {
    /// Logging settings.
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Resolver policy and merge strategy.
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Attribute sources, queried in this order.
    #[serde(default)]
    pub sources: Vec<SourceConfig>,

    /// Directory relative source paths are resolved against (not serialized).
    #[serde(skip)]
    pub base_dir: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum tracing level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "warn".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ---------------------------------------------------------------------------
// Resolver
// ---------------------------------------------------------------------------

/// Resolver configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Name used in logs and errors.
    #[serde(default = "default_resolver_name")]
    pub name: String,

    /// Merge strategy name (`multivalued_union`, `no_overwrite`, `replace`,
    /// `noop`).
    #[serde(default = "default_merger")]
    pub merger: String,

    /// Stop after the first source that answers.
    #[serde(default)]
    pub stop_on_first_success: bool,

    /// Skip failing sources instead of aborting the query.
    #[serde(default = "default_true")]
    pub recover_from_source_failure: bool,

    /// `cascading` or `merging`.
    #[serde(default)]
    pub mode: QueryMode,

    /// Attribute holding a person's primary name.
    #[serde(default = "default_username_attribute")]
    pub username_attribute: String,
}

fn default_resolver_name() -> String {
    "directory".into()
}
fn default_merger() -> String {
    MergeStrategy::default().to_string()
}
fn default_true() -> bool {
    true
}
fn default_username_attribute() -> String {
    DEFAULT_USERNAME_ATTRIBUTE.into()
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            name: default_resolver_name(),
            merger: default_merger(),
            stop_on_first_success: false,
            recover_from_source_failure: true,
            mode: QueryMode::default(),
            username_attribute: default_username_attribute(),
        }
    }
}

impl ResolverConfig {
    pub fn policy(&self) -> ResolverPolicy {
        ResolverPolicy {
            stop_on_first_success: self.stop_on_first_success,
            recover_from_source_failure: self.recover_from_source_failure,
            mode: self.mode,
        }
    }
}

// ---------------------------------------------------------------------------
// Sources
// ---------------------------------------------------------------------------

/// One entry of the `[[sources]]` array.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum SourceConfig {
    /// A TOML backing file searched by one query attribute.
    File {
        name: String,
        path: PathBuf,
        #[serde(default = "default_username_attribute")]
        query_attribute: String,
    },
    /// Fixed attributes returned for every query.
    Static {
        name: String,
        #[serde(default)]
        attributes: AttributeMap,
    },
    /// A first-match-wins rule list.
    Rules { name: String, rules: Vec<RuleConfig> },
}

impl SourceConfig {
    pub fn name(&self) -> &str {
        match self {
            SourceConfig::File { name, .. }
            | SourceConfig::Static { name, .. }
            | SourceConfig::Rules { name, .. } => name,
        }
    }
}

/// A `SimpleAttributeRule` as written in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RuleConfig {
    pub when_key: String,
    pub when_pattern: String,
    pub set_key: String,
    pub set_value: AttributeValue,
}

// ---------------------------------------------------------------------------
// Loading & building
// ---------------------------------------------------------------------------

impl DirectoryConfig {
    /// Load a [`DirectoryConfig`] from a TOML file at the given path.
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        info!(path = %path.display(), "loading configuration");

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.display().to_string()));
        }

        let contents = std::fs::read_to_string(path)?;
        let mut config: DirectoryConfig =
            toml::from_str(&contents).map_err(|e| ConfigError::ParseError {
                path: path.display().to_string(),
                detail: e.to_string(),
            })?;
        config.base_dir = path.parent().map(Path::to_path_buf);

        debug!(sources = config.sources.len(), "configuration parsed successfully");
        Ok(config)
    }

    /// Validate that all required fields are present and sane.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.resolver.merger.parse::<MergeStrategy>() {
            return Err(ConfigError::InvalidValue {
                field: "resolver.merger".into(),
                detail: e.to_string(),
            });
        }
        if self.resolver.username_attribute.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "resolver.username_attribute".into(),
                detail: "username attribute must not be empty".into(),
            });
        }
        if self.sources.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "sources".into(),
                detail: "at least one attribute source must be configured".into(),
            });
        }

        let mut seen = HashSet::new();
        for (i, source) in self.sources.iter().enumerate() {
            if source.name().is_empty() {
                return Err(ConfigError::InvalidValue {
                    field: format!("sources[{}].name", i),
                    detail: "source name must not be empty".into(),
                });
            }
            if !seen.insert(source.name()) {
                return Err(ConfigError::InvalidValue {
                    field: format!("sources[{}].name", i),
                    detail: format!("duplicate source name '{}'", source.name()),
                });
            }
            match source {
                SourceConfig::File {
                    path,
                    query_attribute,
                    ..
                } => {
                    if path.as_os_str().is_empty() {
                        return Err(ConfigError::InvalidValue {
                            field: format!("sources[{}].path", i),
                            detail: "backing file path must not be empty".into(),
                        });
                    }
                    if query_attribute.is_empty() {
                        return Err(ConfigError::InvalidValue {
                            field: format!("sources[{}].query_attribute", i),
                            detail: "query attribute must not be empty".into(),
                        });
                    }
                }
                SourceConfig::Rules { rules, .. } if rules.is_empty() => {
                    return Err(ConfigError::InvalidValue {
                        field: format!("sources[{}].rules", i),
                        detail: "rule list must not be empty".into(),
                    });
                }
                _ => {}
            }
        }

        Ok(())
    }

    /// Convenience: load and validate in one call.
    pub fn load_and_validate<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let config = Self::load_from_file(path)?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve a source path against the config file's directory.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        match &self.base_dir {
            Some(base) if path.is_relative() => base.join(path),
            _ => path.to_path_buf(),
        }
    }

    /// Instantiate every configured source, loading backing files from disk.
    pub fn build_sources(&self) -> Result<Vec<SharedSource>, CoreError> {
        let mut sources: Vec<SharedSource> = Vec::with_capacity(self.sources.len());
        for source in &self.sources {
            match source {
                SourceConfig::File {
                    name,
                    path,
                    query_attribute,
                } => {
                    let lookup = BackingMapLookup::load(self.resolve_path(path))?;
                    sources.push(Arc::new(DefaultQuerySource::new(
                        name.clone(),
                        query_attribute.clone(),
                        lookup,
                    )));
                }
                SourceConfig::Static { name, attributes } => {
                    sources.push(Arc::new(StaticSource::new(name.clone(), attributes.clone())));
                }
                SourceConfig::Rules { name, rules } => {
                    let rules = rules
                        .iter()
                        .map(|r| {
                            SimpleAttributeRule::new(
                                r.when_key.clone(),
                                &r.when_pattern,
                                r.set_key.clone(),
                                r.set_value.clone(),
                            )
                            .map(|rule| Arc::new(rule) as Arc<dyn AttributeRule>)
                        })
                        .collect::<Result<Vec<_>, _>>()?;
                    sources.push(Arc::new(RuleEngine::new(name.clone(), rules)?));
                }
            }
            debug!(source = source.name(), "built attribute source");
        }
        Ok(sources)
    }

    /// Build the resolver described by this config.
    pub fn build_resolver(&self) -> Result<AggregatingResolver, CoreError> {
        let mut resolver = AggregatingResolver::new(self.resolver.name.clone())
            .with_policy(self.resolver.policy())
            .with_sources(self.build_sources()?);
        resolver.set_merge_strategy(&self.resolver.merger)?;
        Ok(resolver)
    }

    /// Build a ready-to-query [`PersonDirectory`].
    pub fn build_directory(&self) -> Result<PersonDirectory, CoreError> {
        let resolver = self.build_resolver()?;
        info!(
            resolver = %self.resolver.name,
            sources = self.sources.len(),
            merger = %self.resolver.merger,
            "person directory ready"
        );
        Ok(PersonDirectory::with_username_attribute(
            resolver,
            self.resolver.username_attribute.clone(),
        ))
    }
}
