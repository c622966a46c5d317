//! Configuration loading and cache file resolution
//!
//! Bootstrap configuration lives in a small TOML file. Every field has a
//! built-in default, so a missing file is not an error: the tools start
//! with defaults and log where they looked.
//!
//! Cache file location is resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable (`PROV_IDCACHE_FILE`)
//! 3. TOML config file (`cache_file` key)
//! 4. OS-dependent compiled default (fallback)

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Environment variable overriding the cache file location
pub const CACHE_FILE_ENV: &str = "PROV_IDCACHE_FILE";

/// File name of the bootstrap configuration
pub const CONFIG_FILE_NAME: &str = "prov-idcache.toml";

/// File name of the persisted identifier cache
pub const CACHE_FILE_NAME: &str = "identifiers.jsonl";

/// Bootstrap configuration loaded from TOML file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Persisted identifier cache location (optional)
    ///
    /// If not specified, falls back to environment → OS default
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cache_file: Option<PathBuf>,

    /// Resolver tuning
    #[serde(default)]
    pub resolver: ResolverConfig,

    /// Logging configuration (optional)
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolver tuning knobs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Default maximum number of ranked candidates per resolve call
    #[serde(default = "default_candidate_limit")]
    pub candidate_limit: usize,

    /// Build blank entities for matches that have no live object
    #[serde(default)]
    pub instantiate_missing: bool,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            candidate_limit: default_candidate_limit(),
            instantiate_missing: false,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_candidate_limit() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

/// Load bootstrap configuration from `path`
///
/// A missing file yields `TomlConfig::default()`. A file that exists but
/// does not parse is a configuration error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        info!(path = %path.display(), "Config file not found, using defaults");
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read TOML failed: {}", e)))?;
    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed: {}", e)))?;

    if config.resolver.candidate_limit == 0 {
        return Err(Error::Config(
            "resolver.candidate_limit must be at least 1".to_string(),
        ));
    }

    debug!(path = %path.display(), "Loaded config file");
    Ok(config)
}

/// Write bootstrap configuration atomically (temp file + rename)
pub fn write_toml_config(config: &TomlConfig, path: &Path) -> Result<()> {
    let content = toml::to_string_pretty(config)
        .map_err(|e| Error::Config(format!("Serialize TOML failed: {}", e)))?;

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }

    let temp_path = path.with_extension("toml.tmp");
    std::fs::write(&temp_path, content)?;
    std::fs::rename(&temp_path, path)?;

    debug!(path = %path.display(), "Wrote config file");
    Ok(())
}

/// Default configuration file path for the platform
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .map(|d| d.join("prov").join(CONFIG_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from(CONFIG_FILE_NAME))
}

/// OS-dependent default cache file path
pub fn default_cache_file() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("prov").join(CACHE_FILE_NAME))
        .unwrap_or_else(|| PathBuf::from("./prov_data").join(CACHE_FILE_NAME))
}

/// Resolve the cache file location
///
/// Empty CLI or environment values are treated as unset.
pub fn resolve_cache_file(cli_arg: Option<&Path>, toml_config: &TomlConfig) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg.filter(|p| !p.as_os_str().is_empty()) {
        debug!(path = %path.display(), "Cache file from command line");
        return path.to_path_buf();
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(CACHE_FILE_ENV) {
        if !path.trim().is_empty() {
            debug!(path = %path, "Cache file from {}", CACHE_FILE_ENV);
            return PathBuf::from(path);
        }
    }

    // Priority 3: TOML config file
    if let Some(path) = &toml_config.cache_file {
        debug!(path = %path.display(), "Cache file from TOML config");
        return path.clone();
    }

    // Priority 4: OS-dependent compiled default
    default_cache_file()
}
