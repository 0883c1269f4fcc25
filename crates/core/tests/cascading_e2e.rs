//! End-to-end tests for cascading attribute resolution.
//!
//! These tests exercise the real `AggregatingResolver` with:
//! - File-backed sources loaded from TOML backing files in a temp dir
//! - A directory built from a TOML config file
//! - Sources that fail, to check recovery and fail-fast behaviour
//!
//! No network I/O: every source is in memory or on local disk.

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::Arc;

use tempfile::TempDir;

use persondir_core::attributes::attribute_map;
use persondir_core::config::DirectoryConfig;
use persondir_core::default_query::DefaultQuerySource;
use persondir_core::rules::{AttributeRule, RuleEngine, SimpleAttributeRule};
use persondir_core::source::SharedSource;
use persondir_core::static_source::BackingMapLookup;
use persondir_core::{
    AggregatingResolver, AttributeError, AttributeMap, AttributeSource, AttributeValue,
    MergeStrategy, SourceError,
};

// ===========================================================================
// Helpers
// ===========================================================================

const CAMPUS: &str = r#"
[entries.edalquist]
phone = ["777-7777"]
studentId = ["123456789"]

[entries.awp9]
phone = ["888-8888"]
studentId = ["987654321"]

[entries.erider]
phone = ["666-6666"]
studentId = ["000000000"]
"#;

const REGISTRAR: &str = r#"
[entries."123456789"]
phone = ["777-7777x777"]
major = ["CS"]

[entries."987654321"]
phone = ["888-8887x888"]
major = ["ME"]

[entries."000000000"]
phone = ["666-6666x666"]
major = ["EE"]
"#;

fn write_fixtures(dir: &Path) {
    std::fs::write(dir.join("campus.toml"), CAMPUS).unwrap();
    std::fs::write(dir.join("registrar.toml"), REGISTRAR).unwrap();
}

fn campus_source(dir: &Path) -> SharedSource {
    let lookup = BackingMapLookup::load(dir.join("campus.toml")).unwrap();
    Arc::new(DefaultQuerySource::new("campus", "username", lookup))
}

fn registrar_source(dir: &Path) -> SharedSource {
    let lookup = BackingMapLookup::load(dir.join("registrar.toml")).unwrap();
    Arc::new(DefaultQuerySource::new("registrar", "studentId", lookup))
}

/// A source that can never answer.
struct SilentSource;

impl AttributeSource for SilentSource {
    fn name(&self) -> &str {
        "silent"
    }

    fn query(&self, _seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        Ok(None)
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Ok(HashSet::new())
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        HashSet::new()
    }
}

/// A source whose backend is down.
struct UnreachableSource;

impl AttributeSource for UnreachableSource {
    fn name(&self) -> &str {
        "unreachable"
    }

    fn query(&self, _seed: &AttributeMap) -> Result<Option<AttributeMap>, SourceError> {
        Err(SourceError::Unavailable("ldap://ldap.example.edu: connection refused".into()))
    }

    fn possible_attribute_names(&self) -> Result<HashSet<String>, SourceError> {
        Err(SourceError::Unavailable("ldap://ldap.example.edu: connection refused".into()))
    }

    fn available_query_attributes(&self) -> HashSet<String> {
        HashSet::from(["uid".to_string()])
    }
}

fn username(uid: &str) -> AttributeMap {
    attribute_map([("username", vec![uid])])
}

fn expected_edalquist() -> AttributeMap {
    attribute_map([
        ("phone", vec!["777-7777", "777-7777x777"]),
        ("studentId", vec!["123456789"]),
        ("major", vec!["CS"]),
    ])
}

// ===========================================================================
// Tests
// ===========================================================================

#[test]
fn test_cascading_query_merges_both_sources() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let resolver = AggregatingResolver::new("campus-directory")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![
            campus_source(dir.path()),
            Arc::new(SilentSource),
            registrar_source(dir.path()),
        ]);

    let result = resolver.resolve(&username("edalquist")).unwrap();
    assert_eq!(result, expected_edalquist());
}

#[test]
fn test_failing_source_is_recovered() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let mut resolver = AggregatingResolver::new("campus-directory")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![
            campus_source(dir.path()),
            Arc::new(UnreachableSource),
            registrar_source(dir.path()),
        ]);
    resolver.set_recover_from_source_failure(true);

    let resolution = resolver.resolve_detailed(&username("edalquist")).unwrap();
    assert_eq!(resolution.attributes, expected_edalquist());
    assert_eq!(resolution.answered, vec!["campus", "registrar"]);
    assert_eq!(resolution.failures.len(), 1);
    assert_eq!(resolution.failures[0].source_name, "unreachable");

    resolver.set_recover_from_source_failure(false);
    let err = resolver.resolve(&username("edalquist")).unwrap_err();
    assert!(matches!(
        err,
        AttributeError::SourceFailure { ref source_name, cause: SourceError::Unavailable(_) }
            if source_name == "unreachable"
    ));
}

#[test]
fn test_stop_on_first_success_returns_first_answer_only() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let mut resolver = AggregatingResolver::new("campus-directory")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![
            Arc::new(UnreachableSource),
            campus_source(dir.path()),
            registrar_source(dir.path()),
        ]);
    resolver.set_stop_on_first_success(true);

    let result = resolver.resolve(&username("awp9")).unwrap();
    assert_eq!(
        result,
        attribute_map([("phone", vec!["888-8888"]), ("studentId", vec!["987654321"])])
    );

    // Schema discovery still visits every source.
    let names = resolver.possible_attribute_names().unwrap();
    assert_eq!(
        names,
        HashSet::from([
            "phone".to_string(),
            "studentId".to_string(),
            "major".to_string()
        ])
    );
}

#[test]
fn test_unknown_person_resolves_empty() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let resolver = AggregatingResolver::new("campus-directory")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![campus_source(dir.path()), registrar_source(dir.path())]);

    let result = resolver.resolve(&username("nobody")).unwrap();
    assert!(result.is_empty());
}

#[test]
fn test_rule_engine_as_source_sees_cascaded_attributes() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let rules: Vec<Arc<dyn AttributeRule>> = vec![
        Arc::new(SimpleAttributeRule::new("major", "CS|EE", "college", "engineering").unwrap()),
        Arc::new(SimpleAttributeRule::new("major", ".*", "college", "letters and science").unwrap()),
    ];
    let engine = RuleEngine::new("college", rules).unwrap();

    let resolver = AggregatingResolver::new("campus-directory")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![
            campus_source(dir.path()),
            registrar_source(dir.path()),
            Arc::new(engine),
        ]);

    let edalquist = resolver.resolve(&username("edalquist")).unwrap();
    assert_eq!(edalquist["college"], vec![AttributeValue::from("engineering")]);

    let awp9 = resolver.resolve(&username("awp9")).unwrap();
    assert_eq!(awp9["college"], vec![AttributeValue::from("letters and science")]);
}

#[test]
fn test_nested_resolvers() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let inner = AggregatingResolver::new("inner")
        .with_merger(Arc::new(MergeStrategy::MultivaluedUnion))
        .with_sources(vec![campus_source(dir.path()), registrar_source(dir.path())]);

    let defaults = BackingMapLookup::new(HashMap::from([(
        "edalquist".to_string(),
        attribute_map([("affiliation", vec!["student"])]),
    )]));

    let mut outer = AggregatingResolver::new("outer")
        .with_merger(Arc::new(MergeStrategy::NoOverwrite))
        .with_sources(vec![
            Arc::new(inner),
            Arc::new(DefaultQuerySource::new("affiliations", "username", defaults)),
        ]);
    outer.set_query_mode(persondir_core::resolver::QueryMode::Merging);

    let result = outer.resolve(&username("edalquist")).unwrap();
    let mut expected = expected_edalquist();
    expected.insert("affiliation".into(), vec![AttributeValue::from("student")]);
    assert_eq!(result, expected);
}

#[test]
fn test_directory_from_config_file() {
    let dir = TempDir::new().unwrap();
    write_fixtures(dir.path());

    let config = r#"
[resolver]
name = "campus-directory"
merger = "multivalued_union"

[[sources]]
kind = "file"
name = "campus"
path = "campus.toml"
query_attribute = "username"

[[sources]]
kind = "file"
name = "registrar"
path = "registrar.toml"
query_attribute = "studentId"
"#;
    let config_path = dir.path().join("persondir.toml");
    std::fs::write(&config_path, config).unwrap();

    let directory = DirectoryConfig::load_and_validate(&config_path)
        .unwrap()
        .build_directory()
        .unwrap();

    let person = directory.get_person("edalquist").unwrap().unwrap();
    assert_eq!(person.name(), "edalquist");
    assert_eq!(
        person.values("phone").unwrap(),
        &[
            AttributeValue::from("777-7777"),
            AttributeValue::from("777-7777x777")
        ]
    );
    assert_eq!(person.value("major"), Some(&AttributeValue::from("CS")));
    assert_eq!(person.value("username"), Some(&AttributeValue::from("edalquist")));

    assert!(directory.get_person("nobody").unwrap().is_none());
}
