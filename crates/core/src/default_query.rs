//! Default-query decorator for single-key lookups.
//!
//! Many backends can only be searched by one attribute (a username, a student
//! id). [`DefaultQuerySource`] lets such a [`KeyedLookup`] take part in
//! multi-attribute queries by pulling its key out of the seed map.

use std::collections::HashSet;

use tracing::debug;

use crate::attributes::{first_value, AttributeMap, AttributeValue};
use crate::errors::SourceError;
use crate::source::AttributeSource;

/// A backend that can only be searched by a single key value.
pub trait KeyedLookup: Send + Sync {
    /// Attributes stored for `key`, `Ok(Some(empty))` or `Ok(None)` when the
    /// key is unknown.
    fn lookup(&self, key: &AttributeValue) -> Result<Option<AttributeMap>, SourceError>;

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError>;
}

/// Wraps a [`KeyedLookup`] so it satisfies the full [`AttributeSource`]
/// contract, querying by the seed's value for `default_attribute`.
pub struct DefaultQuerySource<L> {
    name: String,
    default_attribute: String,
    inner: L,
}

impl<L: KeyedLookup> DefaultQuerySource<L> {
    pub fn new(name: impl Into<String>, default_attribute: impl Into<String>, inner: L) -> Self {
        Self {
            name: name.into(),
            default_attribute: default_attribute.into(),
            inner,
        }
    }

    pub fn default_attribute(&self) -> &str {
        &self.default_attribute
    }

    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: KeyedLookup> AttributeSource for DefaultQuerySource<L> {
    fn name(&self) -> &str {
        &self.name
    }

    fn query(&self, seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        // Only the first value of a multi-valued key is used.
        let Some(key) = first_value(seed, &self.default_attribute) else {
            debug!(
                source = %self.name,
                attribute = %self.default_attribute,
                "seed has no value for default attribute, skipping lookup"
            );
            return Ok(None);
        };

        debug!(source = %self.name, attribute = %self.default_attribute, %key, "default-attribute lookup");
        self.inner.lookup(key)
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        self.inner.possible_attribute_names()
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        HashSet::from([self.default_attribute.clone()])
    }
}
