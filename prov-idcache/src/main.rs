//! prov-idcache - Identifier cache inspection tool
//!
//! Loads a persisted identifier cache and answers questions about it:
//! counts, the identifiers of one entity, and ranked resolution of a set
//! of identifiers. `compact` rewrites the file in normalized form.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing::info;

use prov_common::config::{self, TomlConfig, CACHE_FILE_ENV};
use prov_idcache::{
    BlankEntityFactory, CacheStore, CandidateState, IdentifierProxy, IdentifierResolver,
    ProvEntity, ResolverOptions,
};

/// Command-line arguments for prov-idcache
#[derive(Parser, Debug)]
#[command(name = "prov-idcache")]
#[command(about = "Inspect and query the provenance identifier cache")]
#[command(version)]
struct Args {
    /// Bootstrap TOML config (defaults to the platform config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Identifier cache file
    #[arg(long, env = CACHE_FILE_ENV)]
    cache_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print entity and identifier counts
    Stats,

    /// Print the identifiers indexed for one entity
    Lookup {
        /// System id of the entity
        system_id: String,
    },

    /// Rank cached entities against identifiers given as schema:type:value[|context]
    ///
    /// A `|` or `\` inside a value or context is escaped with `\`.
    Resolve {
        /// Maximum number of candidates (defaults to the configured limit)
        #[arg(short, long)]
        limit: Option<usize>,

        #[arg(required = true)]
        identifiers: Vec<IdentifierProxy>,
    },

    /// Rewrite the cache, dropping invalid identifiers
    Compact,
}

fn main() -> Result<()> {
    let args = Args::parse();

    let config_path = args.config.clone().unwrap_or_else(config::default_config_path);
    let toml_config: TomlConfig = config::load_toml_config(&config_path)
        .with_context(|| format!("Failed to load config {}", config_path.display()))?;

    prov_common::logging::init(&toml_config.logging);
    info!(
        "Starting prov-idcache v{} (config: {})",
        env!("CARGO_PKG_VERSION"),
        config_path.display()
    );

    let cache_file = config::resolve_cache_file(args.cache_file.as_deref(), &toml_config);
    info!("Cache file: {}", cache_file.display());

    let resolver = IdentifierResolver::<ProvEntity>::new()
        .with_store(CacheStore::json_lines(&cache_file))
        .with_factory(BlankEntityFactory)
        .with_options(ResolverOptions::from(&toml_config.resolver));

    // Surface read failures here instead of silently continuing empty
    let loaded = resolver
        .read_cache()
        .with_context(|| format!("Failed to read cache {}", cache_file.display()))?;

    match args.command {
        Command::Stats => {
            let guard = resolver.lock()?;
            let stats = guard.stats();
            println!("records loaded: {}", loaded);
            println!("entities:       {}", stats.entities);
            println!("  persons:      {}", stats.persons);
            println!("  resources:    {}", stats.resources);
            println!("  tools:        {}", stats.tools);
            println!("identifiers:    {}", stats.identifiers);
        }
        Command::Lookup { system_id } => {
            let system_id = prov_common::uuid_utils::parse(&system_id)?;
            let guard = resolver.lock()?;
            let proxy = guard
                .find(system_id)
                .with_context(|| format!("No cached entity with id {}", system_id))?;
            println!("{}", proxy);
            for identifier in guard.identifiers_of(&proxy).unwrap_or_default() {
                println!("  {}", identifier);
            }
        }
        Command::Resolve { limit, identifiers } => {
            let limit = limit.unwrap_or(toml_config.resolver.candidate_limit);
            let mut guard = resolver.lock()?;
            let candidates = guard.resolve(limit, identifiers.as_slice())?;
            if candidates.is_empty() {
                println!("no match");
            }
            for candidate in candidates {
                let state = match candidate.state {
                    CandidateState::Live(_) => "live",
                    CandidateState::Stub(_) => "stub",
                    CandidateState::Detached => "detached",
                };
                println!("{:.3}  {}  [{}]", candidate.relevance, candidate.proxy, state);
            }
        }
        Command::Compact => {
            let written = resolver
                .write_cache()
                .with_context(|| format!("Failed to write cache {}", cache_file.display()))?;
            println!("compacted {} records into {} entries", loaded, written);
        }
    }

    Ok(())
}
