use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use chrono::{DateTime, TimeZone};
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::path::{Path, PathBuf};

/// Placeholder in `database-path` replaced by the run's start time
const TIMESTAMP_PLACEHOLDER: &str = "{timestamp}";

/// Loads, parses and validates a configuration file
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
///
/// # Example
///
/// ```no_run
/// use std::path::Path;
/// use jobcrawl::config::load_config;
///
/// let config = load_config(Path::new("jobcrawl.toml")).unwrap();
/// println!("Max depth: {}", config.crawler.max_depth);
/// ```
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let config = read_config(path)?;
    validate(&config)?;
    Ok(config)
}

/// Reads and parses a configuration file without validating it
///
/// Used by the CLI, which layers command-line overrides on top of the file
/// before validating the merged result.
pub fn read_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parses TOML configuration content; missing keys take their defaults
pub fn parse_config(content: &str) -> Result<Config, ConfigError> {
    Ok(toml::from_str(content)?)
}

/// Computes a SHA-256 hash of the effective configuration
///
/// The hash is recorded on the run row so runs made with different settings
/// can be told apart.
pub fn compute_config_hash(config: &Config) -> Result<String, ConfigError> {
    let serialized = toml::to_string(config)?;
    let mut hasher = Sha256::new();
    hasher.update(serialized.as_bytes());
    Ok(hex::encode(hasher.finalize()))
}

/// Expands the `{timestamp}` placeholder of a database path template
///
/// # Example
///
/// ```
/// use chrono::{TimeZone, Utc};
/// use jobcrawl::config::resolve_database_path;
///
/// let now = Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap();
/// let path = resolve_database_path("jobs_{timestamp}.db", &now);
/// assert_eq!(path.to_str(), Some("jobs_2024-03-01_09-30-00.db"));
/// ```
pub fn resolve_database_path<Tz>(template: &str, now: &DateTime<Tz>) -> PathBuf
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    if !template.contains(TIMESTAMP_PLACEHOLDER) {
        return PathBuf::from(template);
    }
    let stamp = now.format("%Y-%m-%d_%H-%M-%S").to_string();
    PathBuf::from(template.replace(TIMESTAMP_PLACEHOLDER, &stamp))
}
