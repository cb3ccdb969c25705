//! services/studio/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use curriculum_core::store::AutosavePolicy;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;
use url::Url;

/// A custom error type for configuration loading failures.
#[derive(Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    pub allowed_origin: String,
    pub log_level: Level,
    pub course_api_url: Url,
    pub media_upload_url: Url,
    pub media_upload_preset: String,
    pub media_delete_url: Option<Url>,
    pub cache_database_url: String,
    pub autosave_debounce: Duration,
    pub autosave_policy: AutosavePolicy,
    pub upload_concurrency: usize,
    pub http_timeout: Duration,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable source.
    pub fn from_lookup(var: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |name: &str| var(name).ok_or_else(|| ConfigError::MissingVar(name.to_string()));
        let invalid = |name: &str, reason: String| ConfigError::InvalidValue(name.to_string(), reason);
        let parse_url = |name: &str, value: String| -> Result<Url, ConfigError> {
            Url::parse(&value).map_err(|e| invalid(name, e.to_string()))
        };

        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "127.0.0.1:4000".to_string());
        let bind_address = bind_address_str
            .parse::<SocketAddr>()
            .map_err(|e| invalid("BIND_ADDRESS", e.to_string()))?;

        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:3000".to_string());

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            invalid(
                "RUST_LOG",
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Remote Services ---
        let course_api_url = parse_url("COURSE_API_URL", required("COURSE_API_URL")?)?;
        let media_upload_url = parse_url("MEDIA_UPLOAD_URL", required("MEDIA_UPLOAD_URL")?)?;
        let media_upload_preset = required("MEDIA_UPLOAD_PRESET")?;
        let media_delete_url = var("MEDIA_DELETE_URL")
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_url("MEDIA_DELETE_URL", value))
            .transpose()?;

        let cache_database_url = var("CACHE_DATABASE_URL")
            .unwrap_or_else(|| "sqlite://studio-cache.db?mode=rwc".to_string());

        // --- Draft Engine Tuning ---
        let autosave_ms = parse_number(&var, "AUTOSAVE_DEBOUNCE_MS", 2500)?;
        if autosave_ms == 0 {
            return Err(invalid("AUTOSAVE_DEBOUNCE_MS", "must be greater than 0".to_string()));
        }
        let autosave_policy = match var("AUTOSAVE_POLICY").as_deref().map(str::trim) {
            None | Some("") | Some("any_change") => AutosavePolicy::AnyChange,
            Some("structural_only") => AutosavePolicy::StructuralOnly,
            Some(other) => {
                return Err(invalid(
                    "AUTOSAVE_POLICY",
                    format!("'{}' is not one of any_change, structural_only", other),
                ))
            }
        };
        let upload_concurrency = parse_number(&var, "UPLOAD_CONCURRENCY", 1)?;
        if upload_concurrency == 0 {
            return Err(invalid("UPLOAD_CONCURRENCY", "must be at least 1".to_string()));
        }
        let http_timeout_secs = parse_number(&var, "HTTP_TIMEOUT_SECS", 60)?;

        Ok(Self {
            bind_address,
            allowed_origin,
            log_level,
            course_api_url,
            media_upload_url,
            media_upload_preset,
            media_delete_url,
            cache_database_url,
            autosave_debounce: Duration::from_millis(autosave_ms),
            autosave_policy,
            upload_concurrency: upload_concurrency as usize,
            http_timeout: Duration::from_secs(http_timeout_secs),
        })
    }
}

fn parse_number(
    var: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64, ConfigError> {
    match var(name) {
        Some(value) => value.trim().parse::<u64>().map_err(|e| {
            ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", value, e))
        }),
        None => Ok(default),
    }
}
