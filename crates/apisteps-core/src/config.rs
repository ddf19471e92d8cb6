//! Project configuration for apisteps

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::dictionary::DataDictionary;

/// Environment variable overriding `timeout_ms`.
pub const TIMEOUT_ENV: &str = "APISTEPS_TIMEOUT";

const DEFAULT_TIMEOUT_MS: u64 = 60_000;

/// Project configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// OpenAPI document path (local file, JSON or YAML)
    pub spec: PathBuf,

    /// Base URL requests are sent to
    pub base_url: String,

    /// Request timeout in milliseconds
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Run each exchange on a background thread
    #[serde(default)]
    pub fork: bool,

    /// Headers sent with every request (Auth, API keys, etc.)
    #[serde(default)]
    pub headers: BTreeMap<String, String>,

    /// Initial scenario variables (path parameter values, etc.)
    #[serde(default)]
    pub variables: HashMap<String, String>,

    /// Fixed values written into generated request bodies
    #[serde(default)]
    pub outbound_dictionary: DataDictionary,

    /// Fixed values expected in response bodies
    #[serde(default)]
    pub inbound_dictionary: DataDictionary,
}

const fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            spec: PathBuf::from("openapi.yaml"),
            base_url: "http://localhost:8080".to_string(),
            timeout_ms: DEFAULT_TIMEOUT_MS,
            fork: false,
            headers: BTreeMap::new(),
            variables: HashMap::new(),
            outbound_dictionary: DataDictionary::new(),
            inbound_dictionary: DataDictionary::new(),
        }
    }
}

impl Config {
    /// Load config from file, then apply the `APISTEPS_TIMEOUT` override
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read or parsed
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Io(path.to_path_buf(), e.to_string()))?;

        let mut config: Self = if path.extension().is_some_and(|ext| ext == "json") {
            serde_json::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        } else {
            toml::from_str(&content).map_err(|e| ConfigError::Parse(e.to_string()))?
        };
        config.apply_timeout_override(std::env::var(TIMEOUT_ENV).ok().as_deref());
        Ok(config)
    }

    /// Load from the first default location found in `dir` (.apisteps.toml)
    ///
    /// # Errors
    ///
    /// Returns error if a candidate file exists but cannot be read or parsed
    pub fn load_default_in(dir: &Path) -> Result<Self, ConfigError> {
        let candidates = [".apisteps.toml", ".apisteps.json", "apisteps.toml"];

        for name in candidates {
            let path = dir.join(name);
            if path.exists() {
                return Self::load(&path);
            }
        }

        // No config file, return default
        let mut config = Self::default();
        config.apply_timeout_override(std::env::var(TIMEOUT_ENV).ok().as_deref());
        Ok(config)
    }

    /// Load from the current directory
    ///
    /// # Errors
    ///
    /// See [`Config::load_default_in`]
    pub fn load_default() -> Result<Self, ConfigError> {
        Self::load_default_in(Path::new("."))
    }

    /// Replace `timeout_ms` when `raw` is a number of milliseconds.
    pub fn apply_timeout_override(&mut self, raw: Option<&str>) {
        let Some(raw) = raw else { return };
        match raw.trim().parse::<u64>() {
            Ok(ms) => self.timeout_ms = ms,
            Err(_) => tracing::warn!(value = raw, "ignoring non-numeric {TIMEOUT_ENV}"),
        }
    }

    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Create example config file
    #[must_use]
    pub fn example() -> &'static str {
        r#"# apisteps configuration

# OpenAPI document (local file path, JSON or YAML)
spec = "openapi.yaml"

# Server requests are sent to
base_url = "http://localhost:8080"

# Request timeout in milliseconds (APISTEPS_TIMEOUT overrides)
timeout_ms = 60000

# Run each exchange on a background thread
# fork = true

# Headers sent with every request (auth, api keys)
[headers]
Authorization = "Bearer your-token-here"
# X-API-Key = "your-api-key"

# Scenario variables: a path parameter with the same name is sent as this value
[variables]
# petId = "1"

# Fixed values written into generated request bodies (dotted member paths)
[outbound_dictionary]
# "name" = "Rex"
# "owner.city" = "Berlin"

# Fixed values expected in response bodies
[inbound_dictionary]
# "status" = "available"
"#
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Cannot read {0}: {1}")]
    Io(PathBuf, String),
    #[error("Parse error: {0}")]
    Parse(String),
}
