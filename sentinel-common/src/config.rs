//! Configuration loading and credential resolution
//!
//! Each setting resolves in priority order:
//! 1. Command-line argument or environment variable (merged by the CLI parser)
//! 2. TOML config file
//! 3. Compiled default
//!
//! The inference service credential has no compiled default; startup fails
//! with instructions when it is missing.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default inference model
pub const DEFAULT_MODEL: &str = "gemini-3-pro-preview";

/// Default inference service endpoint (Gemini REST API)
pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";

/// Default HTTP listen address for the scanner UI
pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:5780";

/// Environment variable carrying the inference service credential
pub const API_KEY_ENV_VAR: &str = "SENTINEL_API_KEY";

/// On-disk TOML configuration
///
/// Every field is optional; a missing file is equivalent to an empty one.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TomlConfig {
    /// Inference service credential
    #[serde(default)]
    pub api_key: Option<String>,

    /// Inference model identifier
    #[serde(default)]
    pub model: Option<String>,

    /// Inference service base URL
    #[serde(default)]
    pub base_url: Option<String>,

    /// HTTP listen address
    #[serde(default)]
    pub bind_address: Option<String>,

    /// Request timeout; unset means the client waits for the service
    #[serde(default)]
    pub request_timeout_seconds: Option<u64>,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging section of the TOML config
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub api_key: Option<String>,
    pub model: Option<String>,
    pub base_url: Option<String>,
    pub bind_address: Option<String>,
}

/// Fully resolved service settings
#[derive(Debug, Clone)]
pub struct ServiceSettings {
    pub api_key: String,
    pub model: String,
    pub base_url: String,
    pub bind_address: String,
    pub request_timeout: Option<Duration>,
    pub log_level: String,
}

/// Default config file location: `<config dir>/sentinel/config.toml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("sentinel").join("config.toml"))
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Config file to read: the explicit path if given, else the default
/// location when a file exists there
pub fn locate_config(explicit: Option<&Path>) -> Option<PathBuf> {
    explicit
        .map(Path::to_path_buf)
        .or_else(|| default_config_path().filter(|p| p.exists()))
}

/// Load configuration from an explicit path or the default location
///
/// An explicit path must exist. A missing default file yields defaults.
/// A file that exists but does not parse is always an error.
///
/// Runs before the tracing subscriber is installed, so it does not log;
/// callers report the path from [`locate_config`] once logging is up.
pub fn load_config(explicit: Option<&Path>) -> Result<TomlConfig> {
    match locate_config(explicit) {
        Some(path) => load_toml_config(&path),
        None => Ok(TomlConfig::default()),
    }
}

/// Validate credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve the inference service credential
///
/// **Priority:** CLI/ENV → TOML
pub fn resolve_api_key(override_key: Option<&str>, toml_config: &TomlConfig) -> Result<String> {
    let override_key = override_key.filter(|k| is_valid_key(k));
    let toml_key = toml_config.api_key.as_deref().filter(|k| is_valid_key(k));

    if override_key.is_some() && toml_key.is_some() {
        warn!("API key found in both environment/CLI and TOML config. Using environment/CLI.");
    }

    if let Some(key) = override_key {
        info!("API key loaded from command line or environment");
        return Ok(key.trim().to_string());
    }

    if let Some(key) = toml_key {
        info!("API key loaded from TOML config");
        return Ok(key.trim().to_string());
    }

    Err(Error::Config(format!(
        "Inference service API key not configured. Please configure using one of:\n\
         1. Command line: --api-key your-key-here\n\
         2. Environment: {}=your-key-here\n\
         3. TOML config: {} (api_key = \"your-key\")",
        API_KEY_ENV_VAR,
        default_config_path()
            .map(|p| p.display().to_string())
            .unwrap_or_else(|| "sentinel/config.toml".to_string())
    )))
}

/// Merge overrides, TOML values and compiled defaults
pub fn resolve_settings(overrides: &Overrides, toml_config: &TomlConfig) -> Result<ServiceSettings> {
    let api_key = resolve_api_key(overrides.api_key.as_deref(), toml_config)?;

    let model = pick(&overrides.model, &toml_config.model, DEFAULT_MODEL);
    let base_url = pick(&overrides.base_url, &toml_config.base_url, DEFAULT_BASE_URL)
        .trim_end_matches('/')
        .to_string();
    let bind_address = pick(
        &overrides.bind_address,
        &toml_config.bind_address,
        DEFAULT_BIND_ADDRESS,
    );

    let request_timeout = match toml_config.request_timeout_seconds {
        Some(0) => {
            return Err(Error::Config(
                "request_timeout_seconds must be greater than zero".to_string(),
            ))
        }
        Some(secs) => Some(Duration::from_secs(secs)),
        None => None,
    };

    Ok(ServiceSettings {
        api_key,
        model,
        base_url,
        bind_address,
        request_timeout,
        log_level: toml_config.logging.level.clone(),
    })
}

fn pick(first: &Option<String>, second: &Option<String>, default: &str) -> String {
    first
        .as_deref()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| second.as_deref().filter(|v| !v.trim().is_empty()))
        .unwrap_or(default)
        .trim()
        .to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   \t"));
    }

    #[test]
    fn test_override_wins_over_toml() {
        let toml_config = TomlConfig {
            api_key: Some("toml-key".to_string()),
            ..Default::default()
        };
        let key = resolve_api_key(Some("cli-key"), &toml_config).unwrap();
        assert_eq!(key, "cli-key");
    }

    #[test]
    fn test_blank_override_falls_through_to_toml() {
        let toml_config = TomlConfig {
            api_key: Some("toml-key".to_string()),
            ..Default::default()
        };
        let key = resolve_api_key(Some("  "), &toml_config).unwrap();
        assert_eq!(key, "toml-key");
    }

    #[test]
    fn test_missing_key_is_config_error() {
        let err = resolve_api_key(None, &TomlConfig::default()).unwrap_err();
        match err {
            Error::Config(msg) => assert!(msg.contains(API_KEY_ENV_VAR)),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_settings_defaults() {
        let overrides = Overrides {
            api_key: Some("k".to_string()),
            ..Default::default()
        };
        let settings = resolve_settings(&overrides, &TomlConfig::default()).unwrap();

        assert_eq!(settings.model, DEFAULT_MODEL);
        assert_eq!(settings.base_url, DEFAULT_BASE_URL);
        assert_eq!(settings.bind_address, DEFAULT_BIND_ADDRESS);
        assert_eq!(settings.request_timeout, None);
        assert_eq!(settings.log_level, "info");
    }

    #[test]
    fn test_zero_timeout_rejected() {
        let toml_config = TomlConfig {
            api_key: Some("k".to_string()),
            request_timeout_seconds: Some(0),
            ..Default::default()
        };
        assert!(resolve_settings(&Overrides::default(), &toml_config).is_err());
    }
}
