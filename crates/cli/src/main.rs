//! persondir command-line tool.
//!
//! Looks people up through a configured attribute directory, lists the
//! attribute names it can produce, and generates / validates configuration
//! files.

mod style;

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use comfy_table::{presets::UTF8_FULL, Cell, ContentArrangement, Table};
use tracing::debug;
use tracing_subscriber::EnvFilter;

use persondir_core::attributes::{attribute_map, AttributeMap};
use persondir_core::config::{DirectoryConfig, SourceConfig};
use persondir_core::static_source::BackingMapLookup;
use persondir_core::{PersonAttributes, PersonDirectory};

// ---------------------------------------------------------------------------
// CLI argument definitions
// ---------------------------------------------------------------------------

/// persondir command-line tool.
#[derive(Parser, Debug)]
#[command(
    name = "persondir",
    version,
    about = "Resolve person attributes across configured attribute sources"
)]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long, global = true, default_value = "./persondir.toml")]
    config: PathBuf,

    /// Override the log level from the config file (trace, debug, info, warn, error).
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Print results as JSON instead of a table.
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Resolve one person by username.
    Lookup {
        /// Username to look up.
        uid: String,
    },

    /// Resolve people matching attribute criteria.
    Search {
        /// Criteria as `name=value`; repeat a name for multiple values.
        #[arg(required = true)]
        criteria: Vec<String>,
    },

    /// List every attribute name the configured sources can produce.
    Names,

    /// Generate a sample configuration and backing file.
    Init {
        /// Directory to write `persondir.toml` and `people.toml` into.
        #[arg(short, long, default_value = ".")]
        output: PathBuf,
    },

    /// Validate a configuration file.
    Validate,
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> ExitCode {
    let cli = Cli::parse();

    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{}", style::error(&format!("{:#}", e)));
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<()> {
    let query = match cli.command {
        Commands::Init { output } => {
            init_tracing(cli.log_level.as_deref(), None);
            return cmd_init(&output);
        }
        Commands::Validate => {
            init_tracing(cli.log_level.as_deref(), None);
            return cmd_validate(&cli.config);
        }
        Commands::Lookup { uid } => Query::Lookup(uid),
        Commands::Search { criteria } => Query::Search(criteria),
        Commands::Names => Query::Names,
    };

    let config = DirectoryConfig::load_and_validate(&cli.config)
        .context("failed to load configuration file")?;
    init_tracing(cli.log_level.as_deref(), Some(&config.logging.level));

    let directory = config
        .build_directory()
        .context("failed to build attribute directory")?;

    match query {
        Query::Lookup(uid) => cmd_lookup(&directory, &uid, cli.json),
        Query::Search(criteria) => cmd_search(&directory, &criteria, cli.json),
        Query::Names => cmd_names(&directory, cli.json),
    }
}

/// Subcommands that run against a built directory.
enum Query {
    Lookup(String),
    Search(Vec<String>),
    Names,
}

fn init_tracing(cli_level: Option<&str>, config_level: Option<&str>) {
    let level = cli_level.or(config_level).unwrap_or("warn");
    let filter = EnvFilter::try_new(level).unwrap_or_else(|_| EnvFilter::new("warn"));

    // A subscriber may already be installed when `run` is called more than once.
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .without_time()
        .with_writer(std::io::stderr)
        .try_init();
}

// ---------------------------------------------------------------------------
// Subcommand implementations
// ---------------------------------------------------------------------------

fn cmd_lookup(directory: &PersonDirectory, uid: &str, json: bool) -> Result<()> {
    let person = directory
        .get_person(uid)
        .with_context(|| format!("failed to resolve attributes for '{}'", uid))?;

    match person {
        Some(person) => print_people(&[person], json),
        None if json => {
            println!("null");
            Ok(())
        }
        None => {
            println!("{}", style::warn(&format!("No attributes found for '{}'", uid)));
            Ok(())
        }
    }
}

fn cmd_search(directory: &PersonDirectory, criteria: &[String], json: bool) -> Result<()> {
    let criteria = parse_criteria(criteria)?;
    debug!(?criteria, "searching");

    let people = directory
        .get_people_with_attributes(&criteria)
        .context("failed to resolve attributes")?;

    if people.is_empty() && !json {
        println!("{}", style::warn("No matching people found"));
        return Ok(());
    }
    print_people(&people, json)
}

fn cmd_names(directory: &PersonDirectory, json: bool) -> Result<()> {
    let mut names: Vec<String> = directory
        .possible_attribute_names()
        .context("failed to collect attribute names")?
        .into_iter()
        .collect();
    names.sort();

    if json {
        println!("{}", serde_json::to_string_pretty(&names)?);
    } else {
        println!("{}", style::header(&format!("Attribute names ({})", names.len())));
        for name in &names {
            println!("  {}", name);
        }
    }
    Ok(())
}

fn cmd_init(output: &Path) -> Result<()> {
    let config_path = output.join("persondir.toml");
    let people_path = output.join("people.toml");

    for path in [&config_path, &people_path] {
        if path.exists() {
            anyhow::bail!(
                "file already exists: {}. Use a different directory or remove the existing file.",
                path.display()
            );
        }
    }

    std::fs::create_dir_all(output).context("failed to create output directory")?;
    std::fs::write(&config_path, DEFAULT_CONFIG).context("failed to write config file")?;

    let sample = BackingMapLookup::new(
        [(
            "jdoe".to_string(),
            attribute_map([("mail", vec!["jdoe@example.com"]), ("displayName", vec!["John Doe"])]),
        )]
        .into_iter()
        .collect(),
    );
    sample
        .save(&people_path)
        .context("failed to write sample backing file")?;

    println!("{}", style::success(&format!("Configuration written to {}", config_path.display())));
    println!("{}", style::success(&format!("Sample people written to {}", people_path.display())));
    println!();
    println!("Next steps:");
    println!("  1. Edit the config file to describe your attribute sources");
    println!("  2. Validate with: persondir validate --config {}", config_path.display());
    println!("  3. Try a lookup:  persondir lookup jdoe --config {}", config_path.display());

    Ok(())
}

fn cmd_validate(config_path: &Path) -> Result<()> {
    println!("Validating configuration: {}", config_path.display());
    println!();

    let config =
        DirectoryConfig::load_from_file(config_path).context("failed to parse configuration")?;
    println!("  {}", style::success("TOML structure is valid"));

    if let Err(e) = config.validate() {
        println!("  {}", style::error(&format!("Validation error: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All required fields are valid"));

    if let Err(e) = config.build_resolver() {
        println!("  {}", style::error(&format!("Could not build sources: {}", e)));
        anyhow::bail!("configuration validation failed");
    }
    println!("  {}", style::success("All sources load"));

    println!();
    println!("Configuration summary:");
    println!("  Merger        : {}", config.resolver.merger);
    println!("  Mode          : {:?}", config.resolver.mode);
    println!("  Stop on first : {}", config.resolver.stop_on_first_success);
    println!("  Recover       : {}", config.resolver.recover_from_source_failure);
    println!("  Sources       :");
    for source in &config.sources {
        let detail = match source {
            SourceConfig::File {
                path,
                query_attribute,
                ..
            } => format!("file {} (by {})", path.display(), query_attribute),
            SourceConfig::Static { attributes, .. } => {
                format!("static ({} attributes)", attributes.len())
            }
            SourceConfig::Rules { rules, .. } => format!("rules ({} rules)", rules.len()),
        };
        println!("    - {:<16} {}", source.name(), style::dim(&detail));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse `name=value` pairs into an attribute map, preserving value order.
fn parse_criteria(criteria: &[String]) -> Result<AttributeMap> {
    let mut map = AttributeMap::new();
    for item in criteria {
        let (name, value) = item
            .split_once('=')
            .filter(|(name, _)| !name.is_empty())
            .with_context(|| format!("invalid criterion '{}': expected name=value", item))?;
        map.entry(name.to_string())
            .or_default()
            .push(value.to_string().into());
    }
    Ok(map)
}

fn print_people(people: &[PersonAttributes], json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(people)?);
        return Ok(());
    }

    for person in people {
        println!();
        println!("{}", style::header(person.name()));

        let mut table = Table::new();
        table.load_preset(UTF8_FULL);
        table.set_content_arrangement(ContentArrangement::Dynamic);
        table.set_header(vec!["Attribute", "Values"]);

        let mut names: Vec<&String> = person.attributes().keys().collect();
        names.sort();
        for name in names {
            let values = person.attributes()[name]
                .iter()
                .map(ToString::to_string)
                .collect::<Vec<_>>()
                .join(", ");
            table.add_row(vec![Cell::new(name), Cell::new(values)]);
        }
        println!("{}", table);
    }
    println!();
    Ok(())
}

const DEFAULT_CONFIG: &str = r#"# persondir configuration

[logging]
level = "warn"

[resolver]
name = "directory"
# multivalued_union | no_overwrite | replace | noop
merger = "multivalued_union"
stop_on_first_success = false
recover_from_source_failure = true
# cascading | merging
mode = "cascading"
username_attribute = "username"

[[sources]]
kind = "file"
name = "people"
path = "people.toml"
query_attribute = "username"

[[sources]]
kind = "static"
name = "defaults"
[sources.attributes]
affiliation = ["member"]
"#;
