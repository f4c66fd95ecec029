//! Configuration management for commsift
//!
//! Loads the TOML configuration, applies `COMMSIFT_SECTION__KEY` environment
//! overrides and named profiles, then validates the result.

use crate::error::{CommsiftError, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

mod validator;

pub use validator::ConfigValidator;

/// Schema version of the configuration file layout
pub const CONFIG_SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub parsing: ParsingConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub correlation: CorrelationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub profiles: HashMap<String, ProfileOverrides>,
}

/// Metadata about the configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetaConfig {
    pub schema_version: String,
    #[serde(default = "current_timestamp")]
    pub created_at: String,
    #[serde(default = "current_timestamp")]
    pub last_modified: String,
}

fn current_timestamp() -> String {
    chrono::Utc::now().to_rfc3339()
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    /// Cache file name, relative to `data_dir`
    pub cache_file: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("~/.commsift"),
            cache_file: "analysis_cache.json".to_string(),
        }
    }
}

/// Result cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub enabled: bool,
    /// Entries stored under a different version read as absent
    pub schema_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            schema_version: "1".to_string(),
        }
    }
}

/// Parser configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ParsingConfig {
    /// Read ambiguous WhatsApp dates as D/M before M/D
    pub whatsapp_day_first: bool,
    /// Bytes inspected when sniffing the delimiter of a Slack CSV export
    pub csv_sniff_bytes: usize,
}

impl Default for ParsingConfig {
    fn default() -> Self {
        Self {
            whatsapp_day_first: true,
            csv_sniff_bytes: 1024,
        }
    }
}

/// Incident flagging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    pub risk_threshold: f64,
    pub critical_keywords: Vec<String>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            risk_threshold: 7.0,
            critical_keywords: [
                "attack",
                "leak",
                "fraud",
                "harm",
                "blackmail",
                "threat",
                "extortion",
            ]
            .iter()
            .map(|k| k.to_string())
            .collect(),
        }
    }
}

/// Cross-platform identity merging
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CorrelationConfig {
    /// Normalized sender name to canonical identity
    #[serde(default)]
    pub aliases: BTreeMap<String, String>,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Also write logs to `<data_dir>/logs/commsift.log`
    pub file_logging: bool,
    /// Default filter directive when `RUST_LOG` is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            file_logging: false,
            level: "info".to_string(),
        }
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_threshold: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_enabled: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub whatsapp_day_first: Option<bool>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(CommsiftError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Load from `path` when it exists, otherwise start from defaults
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        tracing::debug!("No config at {:?}, using defaults", path);
        let mut config = Self::default();
        config.apply_env_overrides();
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| CommsiftError::Io {
                source: e,
                context: format!("Failed to create config directory: {:?}", parent),
            })?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| CommsiftError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| CommsiftError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(threshold) = overrides.risk_threshold {
            self.analysis.risk_threshold = threshold;
        }
        if let Some(enabled) = overrides.cache_enabled {
            self.cache.enabled = enabled;
        }
        if let Some(day_first) = overrides.whatsapp_day_first {
            self.parsing.whatsapp_day_first = day_first;
        }

        ConfigValidator::validate(self)
    }

    /// Apply environment variable overrides
    /// Environment variables in format: COMMSIFT_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    /// Apply `COMMSIFT_*` pairs from any source; bad values are logged and skipped
    pub fn apply_overrides<I>(&mut self, vars: I)
    where
        I: IntoIterator<Item = (String, String)>,
    {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("COMMSIFT_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "STORAGE__DATA_DIR" => {
                self.storage.data_dir = PathBuf::from(value);
            }
            "STORAGE__CACHE_FILE" => {
                self.storage.cache_file = value.to_string();
            }
            "CACHE__ENABLED" => {
                self.cache.enabled = parse_value(path, value, "boolean")?;
            }
            "CACHE__SCHEMA_VERSION" => {
                self.cache.schema_version = value.to_string();
            }
            "PARSING__WHATSAPP_DAY_FIRST" => {
                self.parsing.whatsapp_day_first = parse_value(path, value, "boolean")?;
            }
            "PARSING__CSV_SNIFF_BYTES" => {
                self.parsing.csv_sniff_bytes = parse_value(path, value, "integer")?;
            }
            "ANALYSIS__RISK_THRESHOLD" => {
                self.analysis.risk_threshold = parse_value(path, value, "number")?;
            }
            "ANALYSIS__CRITICAL_KEYWORDS" => {
                self.analysis.critical_keywords = value
                    .split(',')
                    .map(|k| k.trim().to_lowercase())
                    .filter(|k| !k.is_empty())
                    .collect();
            }
            "LOGGING__FILE_LOGGING" => {
                self.logging.file_logging = parse_value(path, value, "boolean")?;
            }
            "LOGGING__LEVEL" => {
                self.logging.level = value.to_string();
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Data directory with `~/` expanded
    pub fn data_dir(&self) -> Result<PathBuf> {
        expand_path(&self.storage.data_dir)
    }

    /// Full path of the result cache file
    pub fn cache_path(&self) -> Result<PathBuf> {
        Ok(self.data_dir()?.join(&self.storage.cache_file))
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir().ok_or_else(|| {
            CommsiftError::Config("Cannot determine config directory".to_string())
        })?;

        Ok(config_dir.join("commsift").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            meta: MetaConfig {
                schema_version: CONFIG_SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            storage: StorageConfig::default(),
            cache: CacheConfig::default(),
            parsing: ParsingConfig::default(),
            analysis: AnalysisConfig::default(),
            correlation: CorrelationConfig::default(),
            logging: LoggingConfig::default(),
            profiles: HashMap::new(),
        }
    }
}

fn parse_value<T: std::str::FromStr>(path: &str, value: &str, kind: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| CommsiftError::InvalidConfigValue {
            path: path.to_string(),
            message: format!("Cannot parse '{}' as {}", value, kind),
        })
}

/// Expand a leading `~/` to the user's home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| CommsiftError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| CommsiftError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
