//! Person lookup on top of the aggregating resolver.
//!
//! [`PersonDirectory`] turns a username into a seed, resolves it, and wraps
//! the merged attributes into a [`PersonAttributes`] record.

use std::collections::HashSet;

use tracing::debug;

use crate::attributes::{attribute_map, first_value, AttributeMap, PersonAttributes};
use crate::errors::AttributeError;
use crate::resolver::AggregatingResolver;

/// Attribute carrying a person's primary name unless configured otherwise.
pub const DEFAULT_USERNAME_ATTRIBUTE: &str = "username";

/// Person-oriented facade over an [`AggregatingResolver`].
#[derive(Debug)]
pub struct PersonDirectory {
    resolver: AggregatingResolver,
    username_attribute: String,
}

impl PersonDirectory {
    pub fn new(resolver: AggregatingResolver) -> Self {
        Self::with_username_attribute(resolver, DEFAULT_USERNAME_ATTRIBUTE)
    }

    pub fn with_username_attribute(
        resolver: AggregatingResolver,
        username_attribute: impl Into<String>,
    ) -> Self {
        Self {
            resolver,
            username_attribute: username_attribute.into(),
        }
    }

    pub fn resolver(&self) -> &AggregatingResolver {
        &self.resolver
    }

    pub fn resolver_mut(&mut self) -> &mut AggregatingResolver {
        &mut self.resolver
    }

    pub fn username_attribute(&self) -> &str {
        &self.username_attribute
    }

    /// Resolve a single person by username. `Ok(None)` when no source knows
    /// anything about them.
    pub fn get_person(&self, uid: &str) -> Result<Option<PersonAttributes>, AttributeError> {
        let seed = attribute_map([(self.username_attribute.as_str(), vec![uid])]);
        let attributes = self.resolver.resolve(&seed)?;
        if attributes.is_empty() {
            debug!(uid, "no attributes found for person");
            return Ok(None);
        }

        let name = first_value(&attributes, &self.username_attribute)
            .map(ToString::to_string)
            .unwrap_or_else(|| uid.to_string());
        Ok(Some(PersonAttributes::new(
            name,
            &self.username_attribute,
            attributes,
        )))
    }

    /// Resolve the people matching `criteria`.
    ///
    /// Aggregated queries produce at most one merged record. Fails with
    /// `InvalidState` when neither the result nor the criteria name the person.
    pub fn get_people_with_attributes(
        &self,
        criteria: &AttributeMap,
    ) -> Result<Vec<PersonAttributes>, AttributeError> {
        let attributes = self.resolver.resolve(criteria)?;
        if attributes.is_empty() {
            return Ok(Vec::new());
        }

        let name = first_value(&attributes, &self.username_attribute)
            .or_else(|| first_value(criteria, &self.username_attribute))
            .map(ToString::to_string)
            .ok_or_else(|| {
                AttributeError::InvalidState(format!(
                    "resolved attributes carry no '{}' value to name the person",
                    self.username_attribute
                ))
            })?;

        Ok(vec![PersonAttributes::new(
            name,
            &self.username_attribute,
            attributes,
        )])
    }

    pub fn possible_attribute_names(&self) -> Result<HashSet<String>, AttributeError> {
        self.resolver.possible_attribute_names()
    }
}
