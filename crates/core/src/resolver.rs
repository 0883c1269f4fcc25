//! The aggregating resolver.
//!
//! [`AggregatingResolver`] fans a query out to an ordered list of attribute
//! sources, folds each partial answer into an accumulator with the configured
//! merger, and applies the continuation policy:
//!
//! - `stop_on_first_success`: stop after the first source that answers.
//! - `recover_from_source_failure`: skip failing sources instead of aborting.
//!
//! Sources are queried one at a time on the calling thread, in configured
//! order. Reconfiguring takes `&mut self`, so it cannot overlap a query.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::attributes::AttributeMap;
use crate::errors::{AttributeError, SourceError};
use crate::merger::{AttributeMerger, MergeStrategy};
use crate::source::{AttributeSource, SharedSource};

/// How later sources are seeded.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QueryMode {
    /// Once the accumulator holds attributes, later sources are queried with
    /// it instead of the caller's seed.
    #[default]
    Cascading,
    /// Every source is queried with the caller's seed.
    Merging,
}

/// Continuation policy applied during one query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverPolicy {
    #[serde(default)]
    pub stop_on_first_success: bool,
    #[serde(default = "default_true")]
    pub recover_from_source_failure: bool,
    #[serde(default)]
    pub mode: QueryMode,
}

fn default_true() -> bool {
    true
}

impl Default for ResolverPolicy {
    fn default() -> Self {
        Self {
            stop_on_first_success: false,
            recover_from_source_failure: true,
            mode: QueryMode::default(),
        }
    }
}

/// A source failure that was recovered during a query.
#[derive(Debug)]
pub struct RecoveredFailure {
    pub source_name: String,
    pub cause: SourceError,
}

/// Outcome of [`AggregatingResolver::resolve_detailed`].
#[derive(Debug, Default)]
pub struct Resolution {
    /// The merged attributes.
    pub attributes: AttributeMap,
    /// Names of the sources whose answers were merged, in order.
    pub answered: Vec<String>,
    /// Failures skipped under `recover_from_source_failure`, in order.
    pub failures: Vec<RecoveredFailure>,
}

/// Queries an ordered list of sources and merges their answers.
pub struct AggregatingResolver {
    name: String,
    sources: Option<Vec<SharedSource>>,
    merger: Arc<dyn AttributeMerger>,
    policy: ResolverPolicy,
}

impl AggregatingResolver {
    /// Create a resolver with no sources, the `replace` merger, and the
    /// default policy. Sources must be set before the first query.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sources: None,
            merger: Arc::new(MergeStrategy::default()),
            policy: ResolverPolicy::default(),
        }
    }

    /// Builder-style source list.
    pub fn with_sources(mut self, sources: Vec<SharedSource>) -> Self {
        self.set_sources(sources);
        self
    }

    /// Builder-style merger.
    pub fn with_merger(mut self, merger: Arc<dyn AttributeMerger>) -> Self {
        self.set_merger(merger);
        self
    }

    /// Builder-style policy.
    pub fn with_policy(mut self, policy: ResolverPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn set_sources(&mut self, sources: Vec<SharedSource>) {
        debug!(resolver = %self.name, count = sources.len(), "configured attribute sources");
        self.sources = Some(sources);
    }

    pub fn set_merger(&mut self, merger: Arc<dyn AttributeMerger>) {
        debug!(resolver = %self.name, ?merger, "configured merger");
        self.merger = merger;
    }

    /// Select one of the built-in strategies by name.
    ///
    /// Fails with `InvalidArgument` for an empty or unknown name and leaves the
    /// current merger in place.
    pub fn set_merge_strategy(&mut self, name: &str) -> Result<(), AttributeError> {
        let strategy: MergeStrategy = name.parse()?;
        self.set_merger(Arc::new(strategy));
        Ok(())
    }

    pub fn set_stop_on_first_success(&mut self, stop: bool) {
        self.policy.stop_on_first_success = stop;
    }

    pub fn set_recover_from_source_failure(&mut self, recover: bool) {
        self.policy.recover_from_source_failure = recover;
    }

    pub fn set_query_mode(&mut self, mode: QueryMode) {
        self.policy.mode = mode;
    }

    pub fn sources(&self) -> Option<&[SharedSource]> {
        self.sources.as_deref()
    }

    pub fn merger(&self) -> &Arc<dyn AttributeMerger> {
        &self.merger
    }

    pub fn policy(&self) -> ResolverPolicy {
        self.policy
    }

    fn configured_sources(&self) -> Result<&[SharedSource], AttributeError> {
        match self.sources.as_deref() {
            Some(sources) if !sources.is_empty() => Ok(sources),
            _ => Err(AttributeError::InvalidState(format!(
                "resolver '{}' has no attribute sources configured",
                self.name
            ))),
        }
    }

    /// Resolve `seed` against every configured source and return the merged
    /// attributes.
    pub fn resolve(&self, seed: &AttributeMap) -> Result<AttributeMap, AttributeError> {
        self.resolve_detailed(seed).map(|resolution| resolution.attributes)
    }

    /// Like [`resolve`](Self::resolve), also reporting which sources answered
    /// and which failures were recovered.
    pub fn resolve_detailed(&self, seed: &AttributeMap) -> Result<Resolution, AttributeError> {
        let sources = self.configured_sources()?;
        let mut resolution = Resolution::default();

        for source in sources {
            let query_seed = match self.policy.mode {
                QueryMode::Cascading if !resolution.attributes.is_empty() => &resolution.attributes,
                _ => seed,
            };

            match source.query(query_seed) {
                Ok(Some(partial)) => {
                    debug!(
                        resolver = %self.name,
                        source = source.name(),
                        attributes = partial.len(),
                        "source answered"
                    );
                    self.merger.merge(&mut resolution.attributes, &partial);
                    resolution.answered.push(source.name().to_string());

                    if self.policy.stop_on_first_success {
                        debug!(resolver = %self.name, source = source.name(), "stopping on first success");
                        break;
                    }
                }
                Ok(None) => {
                    debug!(resolver = %self.name, source = source.name(), "source had no result");
                }
                Err(cause) => {
                    let cause = self.recover(&**source, cause)?;
                    resolution.failures.push(RecoveredFailure {
                        source_name: source.name().to_string(),
                        cause,
                    });
                }
            }
        }

        info!(
            resolver = %self.name,
            answered = resolution.answered.len(),
            failed = resolution.failures.len(),
            attributes = resolution.attributes.len(),
            "resolved attributes"
        );
        Ok(resolution)
    }

    /// Union of every source's possible attribute names.
    ///
    /// Always visits every source: `stop_on_first_success` does not apply to
    /// schema discovery. Failures follow `recover_from_source_failure`.
    pub fn possible_attribute_names(&self) -> Result<HashSet<String>, AttributeError> {
        let sources = self.configured_sources()?;
        let mut names = HashSet::new();

        for source in sources {
            match source.possible_attribute_names() {
                Ok(source_names) => names.extend(source_names),
                Err(cause) => {
                    self.recover(&**source, cause)?;
                }
            }
        }

        Ok(names)
    }

    /// Union of every source's query attributes. Informational only; the
    /// resolver itself does not filter sources by it.
    pub fn available_query_attributes(&self) -> HashSet<String> {
        self.sources
            .iter()
            .flatten()
            .flat_map(|source| source.available_query_attributes())
            .collect()
    }

    /// Apply the recover policy to a failed source. Returns the cause when it
    /// is recovered, or the error that aborts the query. Configuration errors
    /// from a nested resolver abort regardless of policy.
    fn recover(
        &self,
        source: &dyn AttributeSource,
        cause: SourceError,
    ) -> Result<SourceError, AttributeError> {
        if self.policy.recover_from_source_failure && !cause.is_configuration_error() {
            warn!(
                resolver = %self.name,
                source = source.name(),
                error = %cause,
                "recovering from attribute source failure"
            );
            Ok(cause)
        } else {
            warn!(
                resolver = %self.name,
                source = source.name(),
                error = %cause,
                "attribute source failed, aborting"
            );
            Err(AttributeError::SourceFailure {
                source_name: source.name().to_string(),
                cause,
            })
        }
    }
}

impl fmt::Debug for AggregatingResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source_names: Option<Vec<&str>> = self
            .sources
            .as_ref()
            .map(|sources| sources.iter().map(|s| s.name()).collect());
        f.debug_struct("AggregatingResolver")
            .field("name", &self.name)
            .field("sources", &source_names)
            .field("merger", &self.merger)
            .field("policy", &self.policy)
            .finish()
    }
}

impl AttributeSource for AggregatingResolver {
    fn name(&self) -> &str {
        &self.name
    }

    /// `None` when no inner source answered, so an enclosing resolver does
    /// not count this resolver as a success.
    fn query(&self, seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        let resolution = self.resolve_detailed(seed)?;
        if resolution.answered.is_empty() {
            return Ok(None);
        }
        Ok(Some(resolution.attributes))
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Ok(AggregatingResolver::possible_attribute_names(self)?)
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        AggregatingResolver::available_query_attributes(self)
    }
}
