use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::error::{AppError, ConfigError};

/// Default Firestore REST endpoint.
pub const DEFAULT_FIRESTORE_ENDPOINT: &str = "https://firestore.googleapis.com";

/// Configuration validation errors
#[derive(Debug, Clone)]
pub struct ConfigValidationError {
    pub field: String,
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

/// Result of config validation
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub errors: Vec<ConfigValidationError>,
    pub warnings: Vec<ConfigValidationError>,
}

impl ValidationResult {
    /// Returns true if there are no errors (warnings are OK)
    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    pub fn add_warning(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(ConfigValidationError {
            field: field.into(),
            message: message.into(),
        });
    }

    /// Get a user-friendly message summarizing all errors
    pub fn error_summary(&self) -> String {
        self.errors
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Application configuration directory
    pub config_dir: PathBuf,

    /// Remote document store settings
    pub firebase: FirebaseConfig,

    /// Scheduler view preferences
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

/// Firebase project settings.
///
/// The credential fields are opaque: they are forwarded to the remote store
/// as-is and only checked for presence.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FirebaseConfig {
    pub api_key: Option<String>,
    pub auth_domain: Option<String>,
    #[serde(default)]
    pub project_id: String,
    pub storage_bucket: Option<String>,
    pub messaging_sender_id: Option<String>,
    pub app_id: Option<String>,

    /// Firebase ID token sent as a bearer token (optional)
    pub auth_token: Option<String>,

    #[serde(default = "default_database_id")]
    pub database_id: String,

    #[serde(default = "default_endpoint")]
    pub endpoint: String,

    /// Collection holding appointment documents
    #[serde(default = "default_collection")]
    pub collection: String,

    /// Per-request timeout. Unset means requests wait indefinitely.
    pub request_timeout_secs: Option<u64>,
}

fn default_database_id() -> String {
    "(default)".to_string()
}

fn default_endpoint() -> String {
    DEFAULT_FIRESTORE_ENDPOINT.to_string()
}

fn default_collection() -> String {
    "appointments".to_string()
}

impl FirebaseConfig {
    /// Create settings for a project with every other field at its default.
    pub fn for_project(project_id: impl Into<String>) -> Self {
        Self {
            project_id: project_id.into(),
            database_id: default_database_id(),
            endpoint: default_endpoint(),
            collection: default_collection(),
            ..Self::default()
        }
    }

    /// Check if an API key is configured (not a placeholder)
    pub fn has_api_key(&self) -> bool {
        self.api_key
            .as_deref()
            .is_some_and(|k| !k.is_empty() && !k.starts_with("YOUR_"))
    }

    /// Override settings from `FIREBASE_*` style variables.
    ///
    /// `lookup` is `std::env::var` in production; tests pass a map.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        let set = |target: &mut Option<String>, key: &str| {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *target = Some(value);
            }
        };

        set(&mut self.api_key, "FIREBASE_API_KEY");
        set(&mut self.auth_domain, "FIREBASE_AUTH_DOMAIN");
        set(&mut self.storage_bucket, "FIREBASE_STORAGE_BUCKET");
        set(&mut self.messaging_sender_id, "FIREBASE_MESSAGING_SENDER_ID");
        set(&mut self.app_id, "FIREBASE_APP_ID");
        set(&mut self.auth_token, "FIREBASE_AUTH_TOKEN");

        if let Some(project_id) = lookup("FIREBASE_PROJECT_ID").filter(|v| !v.is_empty()) {
            self.project_id = project_id;
        }

        if let Some(host) = lookup("FIRESTORE_EMULATOR_HOST").filter(|v| !v.is_empty()) {
            tracing::info!("Using Firestore emulator at {}", host);
            self.endpoint = format!("http://{}", host);
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// Locale tag handed to the scheduler widget
    #[serde(default = "default_locale")]
    pub locale: String,

    /// First visible hour in day and week views
    #[serde(default = "default_start_day_hour")]
    pub start_day_hour: u32,

    /// Last visible hour in day and week views (exclusive)
    #[serde(default = "default_end_day_hour")]
    pub end_day_hour: u32,

    /// JSON message bundle passed to the widget unmodified
    pub messages_path: Option<PathBuf>,
}

fn default_locale() -> String {
    "pl-PL".to_string()
}

fn default_start_day_hour() -> u32 {
    9
}

fn default_end_day_hour() -> u32 {
    18
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            locale: default_locale(),
            start_day_hour: default_start_day_hour(),
            end_day_hour: default_end_day_hour(),
            messages_path: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        let config_dir = dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("appointly");

        Self {
            config_dir,
            firebase: FirebaseConfig::for_project(""),
            scheduler: SchedulerConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location, creating it if missing
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    /// Load configuration from `path`, writing defaults there if it doesn't exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            let config = Self::default();
            config.save_to(path)?;
            return Ok(config);
        }

        let contents = std::fs::read_to_string(path).map_err(AppError::Io)?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| ConfigError::ParseError(format!("{}: {}", path.display(), e)))?;

        Ok(config)
    }

    /// Load configuration, apply environment overrides and validate it
    ///
    /// Returns an error if validation fails with critical errors.
    pub fn load_validated() -> Result<(Self, ValidationResult)> {
        let mut config = Self::load()?;
        config.firebase.apply_env(|key| std::env::var(key).ok());

        let validation = config.validate();

        if !validation.is_valid() {
            return Err(ConfigError::Invalid(validation.error_summary()).into());
        }

        for warning in &validation.warnings {
            tracing::warn!("Config warning: {}", warning);
        }

        Ok((config, validation))
    }

    pub fn validate(&self) -> ValidationResult {
        let mut result = ValidationResult::default();

        if self.firebase.project_id.trim().is_empty() {
            result.add_error(
                "firebase.project_id",
                "Project id is required (set FIREBASE_PROJECT_ID)",
            );
        }

        self.validate_url(&self.firebase.endpoint, "firebase.endpoint", &mut result);

        if self.firebase.collection.trim().is_empty() {
            result.add_error("firebase.collection", "Collection name cannot be empty");
        }

        if self.firebase.database_id.trim().is_empty() {
            result.add_error("firebase.database_id", "Database id cannot be empty");
        }

        if !self.firebase.has_api_key() {
            result.add_warning(
                "firebase.api_key",
                "No API key configured - requests rely on open security rules",
            );
        }

        if self.firebase.request_timeout_secs == Some(0) {
            result.add_error(
                "firebase.request_timeout_secs",
                "Timeout must be greater than 0 (omit it to disable)",
            );
        }

        if self.scheduler.end_day_hour > 24 {
            result.add_error("scheduler.end_day_hour", "End hour must be at most 24");
        }

        if self.scheduler.start_day_hour >= self.scheduler.end_day_hour {
            result.add_error(
                "scheduler.start_day_hour",
                format!(
                    "Start hour ({}) must be before end hour ({})",
                    self.scheduler.start_day_hour, self.scheduler.end_day_hour
                ),
            );
        }

        if self.scheduler.locale.trim().is_empty() {
            result.add_warning("scheduler.locale", "Locale is empty, widget defaults apply");
        }

        if let Some(path) = &self.scheduler.messages_path {
            if !path.is_file() {
                result.add_warning(
                    "scheduler.messages_path",
                    format!("Messages file does not exist: {}", path.display()),
                );
            }
        }

        result
    }

    fn validate_url(&self, url_str: &str, field_name: &str, result: &mut ValidationResult) {
        match Url::parse(url_str) {
            Ok(url) => {
                if url.scheme() != "http" && url.scheme() != "https" {
                    result.add_error(
                        field_name,
                        format!("URL must use http or https scheme, got: {}", url.scheme()),
                    );
                }

                if url.host().is_none() {
                    result.add_error(field_name, "URL must have a host");
                }

                if url.port() == Some(0) {
                    result.add_error(field_name, "Port cannot be 0");
                }
            }
            Err(e) => {
                result.add_error(field_name, format!("Invalid URL: {}", e));
            }
        }
    }

    /// Save configuration to the default location
    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self).context("Failed to serialize config")?;

        std::fs::write(path, contents).context("Failed to write config file")?;

        Ok(())
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("Failed to get config directory")?
            .join("appointly");

        Ok(config_dir.join("config.toml"))
    }
}
