//! Configuration loader
//!
//! ## Loading Strategy
//! 1. Read `.env` if present
//! 2. Load the file named by `CALRECON_CONFIG`, or the first file found by
//!    [`probe_config_paths`], or fall back to defaults
//! 3. Apply `CALRECON_*` environment overrides
//! 4. Validate
//!
//! ## Environment Variables
//! - `CALRECON_CONFIG`: Explicit config file path
//! - `CALRECON_DB_PATH`: Database file path
//! - `CALRECON_DB_POOL_SIZE`: Connection pool size
//! - `CALRECON_CALENDAR_TOKEN`: Calendar API bearer token
//! - `CALRECON_FEED_URL`: Schedule feed base URL
//! - `CALRECON_SCAN_INTERVAL`: Drift scan interval in seconds
//! - `CALRECON_LOG_LEVEL`: Default log level
//! - `CALRECON_LOG_JSON`: JSON log output (true/false)

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calrecon_domain::{Config, ReconError, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["calrecon.toml", "calrecon.json", "config.toml", "config.json"];

/// Load configuration using the full layering strategy.
///
/// # Errors
/// Returns `ReconError::Config` if a named file is missing or malformed, an
/// override does not parse, or the merged result fails validation.
pub fn load() -> Result<Config> {
    if let Ok(path) = dotenvy::dotenv() {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let mut config = match std::env::var_os("CALRECON_CONFIG") {
        Some(path) => load_from_file(Some(PathBuf::from(path)))?,
        None => match probe_config_paths() {
            Some(path) => load_from_file(Some(path))?,
            None => {
                tracing::info!("no config file found, using defaults");
                Config::default()
            }
        },
    };

    apply_env_overrides(&mut config)?;
    config.validate()?;
    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations. Format is detected by
/// extension (`.toml` or `.json`).
///
/// # Errors
/// Returns `ReconError::Config` if the file is missing or cannot be parsed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(ReconError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            ReconError::Config("No config file found in any of the standard locations".into())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| ReconError::Config(format!("Failed to read config file: {e}")))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| ReconError::Config(format!("Invalid TOML format: {e}"))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| ReconError::Config(format!("Invalid JSON format: {e}"))),
        _ => Err(ReconError::Config(format!("Unsupported config format: {extension}"))),
    }
}

/// First existing config file in the working directory, then next to the
/// executable.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        dirs.push(cwd);
    }
    if let Some(exe_dir) =
        std::env::current_exe().ok().and_then(|exe| exe.parent().map(Path::to_path_buf))
    {
        dirs.push(exe_dir);
    }

    dirs.iter()
        .flat_map(|dir| CONFIG_FILE_NAMES.iter().map(move |name| dir.join(name)))
        .find(|path| path.exists())
}

/// Apply `CALRECON_*` overrides on top of `config`.
///
/// # Errors
/// Returns `ReconError::Config` when a numeric override does not parse.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Some(path) = env_opt("CALRECON_DB_PATH") {
        config.database.path = path;
    }
    if let Some(size) = env_parse("CALRECON_DB_POOL_SIZE")? {
        config.database.pool_size = size;
    }
    if let Some(token) = env_opt("CALRECON_CALENDAR_TOKEN") {
        config.calendar.access_token = Some(token);
    }
    if let Some(url) = env_opt("CALRECON_FEED_URL") {
        config.feed.base_url = url;
    }
    if let Some(interval) = env_parse("CALRECON_SCAN_INTERVAL")? {
        config.reconcile.scan_interval_secs = interval;
    }
    if let Some(level) = env_opt("CALRECON_LOG_LEVEL") {
        config.logging.level = level;
    }
    config.logging.json = env_bool("CALRECON_LOG_JSON", config.logging.json);
    Ok(())
}

/// Non-empty environment variable
fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn env_parse<T>(key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    env_opt(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ReconError::Config(format!("Invalid {key}: {e}")))
        })
        .transpose()
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    env_opt(key)
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
