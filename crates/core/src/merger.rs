//! Attribute merge strategies.
//!
//! A merger folds one source's partial result into the accumulator built up by
//! the resolver. Strategies are stateless and selected by name.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::trace;

use crate::attributes::AttributeMap;
use crate::errors::AttributeError;

/// Combines an incoming attribute map into an accumulator.
///
/// Implementations mutate `accumulator` in place and must leave `incoming`
/// untouched.
pub trait AttributeMerger: Send + Sync + fmt::Debug {
    fn merge(&self, accumulator: &mut AttributeMap, incoming: &AttributeMap);
}

/// The built-in merge strategies.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeStrategy {
    /// Append incoming values after existing ones, without deduplication.
    MultivaluedUnion,
    /// Only copy keys the accumulator does not have yet.
    NoOverwrite,
    /// Incoming values replace the accumulator's values key by key.
    #[default]
    Replace,
    /// Leave the accumulator unchanged.
    NoOp,
}

impl MergeStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergeStrategy::MultivaluedUnion => "multivalued_union",
            MergeStrategy::NoOverwrite => "no_overwrite",
            MergeStrategy::Replace => "replace",
            MergeStrategy::NoOp => "noop",
        }
    }
}

impl fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for MergeStrategy {
    type Err = AttributeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => Err(AttributeError::InvalidArgument(
                "merge strategy name must not be empty".into(),
            )),
            "multivalued_union" | "multivalued" => Ok(MergeStrategy::MultivaluedUnion),
            "no_overwrite" | "additive" => Ok(MergeStrategy::NoOverwrite),
            "replace" => Ok(MergeStrategy::Replace),
            "noop" | "no_op" => Ok(MergeStrategy::NoOp),
            other => Err(AttributeError::InvalidArgument(format!(
                "unknown merge strategy '{}'",
                other
            ))),
        }
    }
}

impl AttributeMerger for MergeStrategy {
    fn merge(&self, accumulator: &mut AttributeMap, incoming: &AttributeMap) {
        trace!(strategy = %self, incoming = incoming.len(), "merging attributes");
        match self {
            MergeStrategy::MultivaluedUnion => {
                for (key, values) in incoming {
                    accumulator
                        .entry(key.clone())
                        .or_default()
                        .extend(values.iter().cloned());
                }
            }
            MergeStrategy::NoOverwrite => {
                for (key, values) in incoming {
                    if !accumulator.contains_key(key) {
                        accumulator.insert(key.clone(), values.clone());
                    }
                }
            }
            MergeStrategy::Replace => {
                for (key, values) in incoming {
                    accumulator.insert(key.clone(), values.clone());
                }
            }
            MergeStrategy::NoOp => {}
        }
    }
}
