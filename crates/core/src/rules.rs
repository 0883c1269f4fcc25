//! First-match-wins attribute rules.
//!
//! A [`RuleEngine`] holds an ordered, immutable list of [`AttributeRule`]s.
//! Evaluating a seed runs the first rule that applies to it and nothing else.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use regex_lite::Regex;
use tracing::debug;

use crate::attributes::{AttributeMap, AttributeValue};
use crate::errors::{AttributeError, SourceError};
use crate::source::AttributeSource;

/// A (predicate, transform) pair over a seed attribute map.
pub trait AttributeRule: Send + Sync + fmt::Debug {
    /// Whether this rule should handle `seed`.
    fn applies_to(&self, seed: &AttributeMap) -> bool;

    /// Produce attributes for `seed`, or `None` for "no result".
    fn evaluate(&self, seed: &AttributeMap) -> Option<AttributeMap>;

    /// Every attribute name this rule may produce.
    fn possible_attribute_names(&self) -> HashSet<String>;

    /// Seed attributes this rule inspects.
    fn query_attributes(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// Sets `set_key = [set_value]` when some value of `when_key` fully matches
/// `when_pattern`.
#[derive(Debug, Clone)]
pub struct SimpleAttributeRule {
    when_key: String,
    when_pattern: Regex,
    set_key: String,
    set_value: AttributeValue,
}

impl SimpleAttributeRule {
    pub fn new(
        when_key: impl Into<String>,
        when_pattern: &str,
        set_key: impl Into<String>,
        set_value: impl Into<AttributeValue>,
    ) -> Result<Self, AttributeError> {
        let when_key = when_key.into();
        let set_key = set_key.into();
        if when_key.is_empty() {
            return Err(AttributeError::InvalidArgument(
                "rule 'when_key' must not be empty".into(),
            ));
        }
        if set_key.is_empty() {
            return Err(AttributeError::InvalidArgument(
                "rule 'set_key' must not be empty".into(),
            ));
        }
        let when_pattern = Regex::new(&format!("^(?:{})$", when_pattern)).map_err(|e| {
            AttributeError::InvalidArgument(format!(
                "rule pattern '{}' is not a valid regular expression: {}",
                when_pattern, e
            ))
        })?;

        Ok(Self {
            when_key,
            when_pattern,
            set_key,
            set_value: set_value.into(),
        })
    }
}

impl AttributeRule for SimpleAttributeRule {
    fn applies_to(&self, seed: &AttributeMap) -> bool {
        seed.get(&self.when_key).is_some_and(|values| {
            values
                .iter()
                .any(|v| self.when_pattern.is_match(&v.to_string()))
        })
    }

    fn evaluate(&self, _seed: &AttributeMap) -> Option<AttributeMap> {
        Some(AttributeMap::from([(
            self.set_key.clone(),
            vec![self.set_value.clone()],
        )]))
    }

    fn possible_attribute_names(&self) -> HashSet<String> {
        HashSet::from([self.set_key.clone()])
    }

    fn query_attributes(&self) -> HashSet<String> {
        HashSet::from([self.when_key.clone()])
    }
}

type Predicate = dyn Fn(&AttributeMap) -> bool + Send + Sync;
type Transform = dyn Fn(&AttributeMap) -> Option<AttributeMap> + Send + Sync;

/// A rule built from closures.
pub struct FnRule {
    label: String,
    predicate: Box<Predicate>,
    transform: Box<Transform>,
    names: HashSet<String>,
}

impl FnRule {
    pub fn new<P, T, I, S>(label: impl Into<String>, predicate: P, transform: T, names: I) -> Self
    where
        P: Fn(&AttributeMap) -> bool + Send + Sync + 'static,
        T: Fn(&AttributeMap) -> Option<AttributeMap> + Send + Sync + 'static,
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            label: label.into(),
            predicate: Box::new(predicate),
            transform: Box::new(transform),
            names: names.into_iter().map(Into::into).collect(),
        }
    }
}

impl fmt::Debug for FnRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FnRule")
            .field("label", &self.label)
            .field("names", &self.names)
            .finish_non_exhaustive()
    }
}

impl AttributeRule for FnRule {
    fn applies_to(&self, seed: &AttributeMap) -> bool {
        (self.predicate)(seed)
    }

    fn evaluate(&self, seed: &AttributeMap) -> Option<AttributeMap> {
        (self.transform)(seed)
    }

    fn possible_attribute_names(&self) -> HashSet<String> {
        self.names.clone()
    }
}

/// Ordered rule list evaluated first-match-wins.
///
/// Also usable as an [`AttributeSource`] inside a resolver.
#[derive(Debug, Clone)]
pub struct RuleEngine {
    name: String,
    rules: Arc<[Arc<dyn AttributeRule>]>,
}

impl RuleEngine {
    /// Fails with `InvalidArgument` when `rules` is empty.
    pub fn new(
        name: impl Into<String>,
        rules: Vec<Arc<dyn AttributeRule>>,
    ) -> Result<Self, AttributeError> {
        let name = name.into();
        if rules.is_empty() {
            return Err(AttributeError::InvalidArgument(format!(
                "rule engine '{}' requires at least one rule",
                name
            )));
        }
        debug!(engine = %name, rules = rules.len(), "created rule engine");
        Ok(Self {
            name,
            rules: rules.into(),
        })
    }

    pub fn rules(&self) -> &[Arc<dyn AttributeRule>] {
        &self.rules
    }

    /// Result of the first applicable rule, or `None` when none applies.
    pub fn evaluate(&self, seed: &AttributeMap) -> Option<AttributeMap> {
        let (index, rule) = self
            .rules
            .iter()
            .enumerate()
            .find(|(_, rule)| rule.applies_to(seed))?;
        debug!(engine = %self.name, index, ?rule, "evaluating rule");
        rule.evaluate(seed)
    }

    /// Union of every rule's declared names, independent of any seed.
    pub fn possible_attribute_names(&self) -> HashSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.possible_attribute_names())
            .collect()
    }
}

impl AttributeSource for RuleEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        Ok(self.evaluate(seed))
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Ok(RuleEngine::possible_attribute_names(self))
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        self.rules
            .iter()
            .flat_map(|rule| rule.query_attributes())
            .collect()
    }
}
