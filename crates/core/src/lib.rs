//! persondir core library.
//!
//! This crate resolves person attributes by querying an ordered list of
//! attribute sources and merging their partial answers: the source contract,
//! merge strategies, first-match rule engines, the default-query decorator,
//! the aggregating resolver, and TOML configuration.

pub mod attributes;
pub mod config;
pub mod default_query;
pub mod errors;
pub mod merger;
pub mod person;
pub mod resolver;
pub mod rules;
pub mod source;
pub mod static_source;

// Re-exports for convenience.
pub use attributes::{AttributeMap, AttributeValue, PersonAttributes};
pub use config::DirectoryConfig;
pub use errors::{AttributeError, CoreError, SourceError};
pub use merger::{AttributeMerger, MergeStrategy};
pub use person::PersonDirectory;
pub use resolver::AggregatingResolver;
pub use source::AttributeSource;
