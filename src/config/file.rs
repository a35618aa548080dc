//! Config file discovery and TOML loading.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::{ConfigError, EngineConfig};

/// Loaded config metadata.
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    /// Path that was consulted, if one could be resolved.
    pub path: Option<PathBuf>,
    pub config: EngineConfig,
    /// Whether values came from a file rather than built-in defaults.
    pub loaded_from_file: bool,
}

/// Resolves the default config path.
///
/// Priority:
/// 1. `$XDG_CONFIG_HOME/citeforge/config.toml`
/// 2. `$HOME/.config/citeforge/config.toml`
#[must_use]
pub fn resolve_default_config_path() -> Option<PathBuf> {
    if let Some(xdg_config_home) = env_var_non_empty_os("XDG_CONFIG_HOME") {
        return Some(
            PathBuf::from(xdg_config_home)
                .join("citeforge")
                .join("config.toml"),
        );
    }

    let home = env_var_non_empty_os("HOME")?;
    Some(
        PathBuf::from(home)
            .join(".config")
            .join("citeforge")
            .join("config.toml"),
    )
}

fn env_var_non_empty_os(name: &str) -> Option<std::ffi::OsString> {
    let value = env::var_os(name)?;
    if value.is_empty() { None } else { Some(value) }
}

/// Loads configuration from `explicit` when given, otherwise from the default
/// path if it exists, otherwise built-in defaults. The result is validated.
///
/// # Errors
///
/// Returns [`ConfigError`] when an explicit file is missing, a file cannot be
/// parsed, or a value is out of range.
pub fn load_config(explicit: Option<&Path>) -> Result<LoadedConfig, ConfigError> {
    let (path, required) = match explicit {
        Some(path) => (Some(path.to_path_buf()), true),
        None => (resolve_default_config_path(), false),
    };

    let Some(path_ref) = path.as_deref() else {
        return Ok(LoadedConfig {
            path,
            config: EngineConfig::default(),
            loaded_from_file: false,
        });
    };

    if !required && !path_ref.exists() {
        debug!(path = %path_ref.display(), "no config file; using defaults");
        return Ok(LoadedConfig {
            path,
            config: EngineConfig::default(),
            loaded_from_file: false,
        });
    }

    let raw = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
        path: path_ref.to_path_buf(),
        source,
    })?;
    let config = parse_config_str(&raw).map_err(|source| ConfigError::Parse {
        path: path_ref.to_path_buf(),
        source,
    })?;
    config.validate()?;

    debug!(path = %path_ref.display(), "loaded config file");
    Ok(LoadedConfig {
        path,
        config,
        loaded_from_file: true,
    })
}

/// Parses TOML text into an [`EngineConfig`] without validating ranges.
///
/// # Errors
///
/// Returns the TOML error for syntax problems or unknown keys.
pub fn parse_config_str(raw: &str) -> Result<EngineConfig, toml::de::Error> {
    toml::from_str(raw)
}
