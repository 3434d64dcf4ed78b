//! Configuration management for qtriage
//!
//! Loads the TOML config, applies `QTRIAGE_*` environment overrides and
//! profile overrides, then validates the result.

use crate::error::{Result, TriageError};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

mod validator;

pub use validator::ConfigValidator;

/// Current config schema version
pub const SCHEMA_VERSION: &str = "1.0.0";

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    #[serde(rename = "_meta")]
    pub meta: MetaConfig,
    pub backend: BackendConfig,
    pub upload: UploadConfig,
    pub export: ExportConfig,
    pub references: ReferencesConfig,
    pub notifications: NotificationsConfig,
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

/// Backend QA service endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    pub base_url: String,
    pub batch_endpoint: String,
    pub query_endpoint: String,
    pub history_endpoint: String,
    /// Request timeout, e.g. "120s"
    pub timeout: String,
}

impl BackendConfig {
    pub fn timeout_duration(&self) -> Result<Duration> {
        parse_duration(&self.timeout).ok_or_else(|| TriageError::InvalidConfigValue {
            path: "backend.timeout".to_string(),
            message: format!("Invalid duration: {}", self.timeout),
        })
    }
}

/// Questionnaire upload settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UploadConfig {
    /// Accepted file extensions, lowercase, without dot
    pub allowed_extensions: Vec<String>,
}

/// CSV export settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExportConfig {
    pub output_dir: PathBuf,
}

/// Reference resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// Document mapping table (TOML); the built-in table is used when missing
    pub mapping_file: PathBuf,
}

/// User-visible notification settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationsConfig {
    /// How long an error notification stays visible, e.g. "3s"
    pub dismiss_after: String,
}

impl NotificationsConfig {
    pub fn dismiss_duration(&self) -> Result<Duration> {
        parse_duration(&self.dismiss_after).ok_or_else(|| TriageError::InvalidConfigValue {
            path: "notifications.dismiss_after".to_string(),
            message: format!("Invalid duration: {}", self.dismiss_after),
        })
    }
}

/// Profile-specific configuration overrides
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProfileOverrides {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<String>,
}

impl Config {
    /// Load configuration from a file
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(TriageError::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = std::fs::read_to_string(path).map_err(|e| TriageError::Io {
            source: e,
            context: format!("Failed to read config file: {:?}", path),
        })?;
        let mut config: Config = toml::from_str(&content)?;

        // Apply environment variable overrides
        config.apply_env_overrides();

        ConfigValidator::validate(&config)?;

        Ok(config)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(|e| TriageError::Io {
            source: e,
            context: format!("Failed to write config file: {:?}", path),
        })?;
        Ok(())
    }

    /// Load configuration with a specific profile applied
    pub fn load_with_profile(path: &Path, profile: &str) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_profile(profile)?;
        ConfigValidator::validate(&config)?;
        Ok(config)
    }

    /// Apply a profile's overrides to the configuration
    pub fn apply_profile(&mut self, profile: &str) -> Result<()> {
        let overrides = self
            .profiles
            .get(profile)
            .cloned()
            .ok_or_else(|| TriageError::Config(format!("Unknown profile: {}", profile)))?;

        if let Some(base_url) = overrides.base_url {
            self.backend.base_url = base_url;
        }
        if let Some(timeout) = overrides.timeout {
            self.backend.timeout = timeout;
        }
        Ok(())
    }

    /// Apply environment variable overrides
    /// Environment variables in format: QTRIAGE_SECTION__KEY=value
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(std::env::vars());
    }

    fn apply_overrides(&mut self, vars: impl Iterator<Item = (String, String)>) {
        for (key, value) in vars {
            if let Some(config_key) = key.strip_prefix("QTRIAGE_") {
                if let Err(e) = self.set_value_from_env(config_key, &value) {
                    tracing::warn!("Failed to apply env override {}: {}", key, e);
                }
            }
        }
    }

    fn set_value_from_env(&mut self, path: &str, value: &str) -> Result<()> {
        match path {
            "BACKEND__BASE_URL" => {
                self.backend.base_url = value.to_string();
            }
            "BACKEND__TIMEOUT" => {
                if parse_duration(value).is_none() {
                    return Err(TriageError::InvalidConfigValue {
                        path: path.to_string(),
                        message: format!("Cannot parse '{}' as duration", value),
                    });
                }
                self.backend.timeout = value.to_string();
            }
            "EXPORT__OUTPUT_DIR" => {
                self.export.output_dir = PathBuf::from(value);
            }
            "REFERENCES__MAPPING_FILE" => {
                self.references.mapping_file = PathBuf::from(value);
            }
            _ => {
                tracing::debug!("Unknown env config key: {}", path);
            }
        }
        Ok(())
    }

    /// Full URL of a backend endpoint path
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!(
            "{}/{}",
            self.backend.base_url.trim_end_matches('/'),
            endpoint.trim_start_matches('/')
        )
    }

    /// Get the default configuration file path
    pub fn default_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| TriageError::Config("Cannot determine config directory".to_string()))?;

        Ok(config_dir.join("qtriage").join("config.toml"))
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = PathBuf::from("~/.config/qtriage");

        Self {
            meta: MetaConfig {
                schema_version: SCHEMA_VERSION.to_string(),
                created_at: current_timestamp(),
                last_modified: current_timestamp(),
            },
            backend: BackendConfig {
                base_url: "http://localhost:8080".to_string(),
                batch_endpoint: "/analyze-questionnaire/".to_string(),
                query_endpoint: "/analyze/".to_string(),
                history_endpoint: "/history/".to_string(),
                timeout: "120s".to_string(),
            },
            upload: UploadConfig {
                allowed_extensions: ["csv", "xlsx", "xls", "pdf"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect(),
            },
            export: ExportConfig {
                output_dir: PathBuf::from("."),
            },
            references: ReferencesConfig {
                mapping_file: config_dir.join("documents.toml"),
            },
            notifications: NotificationsConfig {
                dismiss_after: "3s".to_string(),
            },
            profiles: HashMap::new(),
        }
    }
}

/// Parse duration strings like "500ms", "3s", "10m", "1h" or bare seconds
pub fn parse_duration(s: &str) -> Option<Duration> {
    let s = s.trim();
    let (number, unit) = match s.find(|c: char| !c.is_ascii_digit()) {
        Some(idx) => s.split_at(idx),
        None => (s, "s"),
    };
    let value: u64 = number.parse().ok()?;

    match unit {
        "ms" => Some(Duration::from_millis(value)),
        "s" => Some(Duration::from_secs(value)),
        "m" => value.checked_mul(60).map(Duration::from_secs),
        "h" => value.checked_mul(3600).map(Duration::from_secs),
        _ => None,
    }
}

/// Expand a leading `~/` to the home directory
pub fn expand_path(path: &Path) -> Result<PathBuf> {
    let path_str = path
        .to_str()
        .ok_or_else(|| TriageError::Config("Invalid path encoding".to_string()))?;

    if let Some(stripped) = path_str.strip_prefix("~/") {
        let home = dirs::home_dir()
            .ok_or_else(|| TriageError::Config("Cannot determine home directory".to_string()))?;
        Ok(home.join(stripped))
    } else {
        Ok(path.to_path_buf())
    }
}
