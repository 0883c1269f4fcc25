//! The attribute source contract.
//!
//! Everything the resolver fans out to implements [`AttributeSource`]:
//! file-backed lookups, rule engines, decorators, and other resolvers.

use std::collections::HashSet;
use std::sync::Arc;

use crate::attributes::AttributeMap;
use crate::errors::SourceError;

/// A collaborator that can answer attribute queries and declare its schema.
pub trait AttributeSource: Send + Sync {
    /// Identity of this source, used in logs and in `SourceFailure`.
    fn name(&self) -> &str;

    /// Look up attributes for the identity described by `seed`.
    ///
    /// Returns `Ok(Some(empty))` when the identity is simply not found and
    /// `Ok(None)` when this source cannot answer a query shaped like `seed`.
    fn query(&self, seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError>;

    /// Names of every attribute this source may return.
    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError>;

    /// Names of the attributes this source accepts as query input.
    fn available_query_attributes(&self) -> HashSet<String>;
}

/// Shared handle to a source, as held by the resolver.
pub type SharedSource = Arc<dyn AttributeSource>;
