//! Configuration loading for the Beam Analytics backend.
//!
//! Loads layered `.env` files and environment variables prefixed with
//! `BEAM_`, producing a typed [`AppConfig`].

use std::{collections::BTreeMap, env, net::SocketAddr, path::PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

const ENV_PREFIX: &str = "BEAM_";

/// Secret used to sign tokens when the `local` or `test` profile runs without
/// `BEAM_JWT_SECRET`.
pub const DEV_JWT_SECRET: &str = "beam-local-development-secret";

const JWT_ALGORITHMS: &[&str] = &["HS256", "HS384", "HS512"];

/// Application configuration derived from `BEAM_*` environment variables.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AppConfig {
    #[serde(default = "default_profile")]
    pub profile: String,
    #[serde(default = "default_api_bind_addr")]
    pub api_bind_addr: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default = "default_log_format")]
    pub log_format: String,
    #[serde(default = "default_database_url")]
    pub database_url: String,
    #[serde(default = "default_db_max_connections")]
    pub db_max_connections: u32,
    #[serde(default = "default_db_acquire_timeout_ms")]
    pub db_acquire_timeout_ms: u64,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
    #[serde(default = "default_trial_days")]
    pub trial_days: i64,
    #[serde(default)]
    pub jwt: JwtConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub webhook: WebhookConfig,
    #[serde(default)]
    pub ai: AiConfig,
}

/// Token signing parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct JwtConfig {
    /// HMAC secret. Required outside the `local` and `test` profiles.
    ///
    /// Environment variable: `BEAM_JWT_SECRET`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,

    /// One of `HS256`, `HS384`, `HS512` (default: `HS256`)
    ///
    /// Environment variable: `BEAM_JWT_ALGORITHM`
    #[serde(default = "default_jwt_algorithm")]
    pub algorithm: String,

    /// Environment variable: `BEAM_JWT_ACCESS_TTL_MINUTES`
    #[serde(default = "default_access_ttl_minutes")]
    pub access_ttl_minutes: i64,

    /// Environment variable: `BEAM_JWT_REFRESH_TTL_DAYS`
    #[serde(default = "default_refresh_ttl_days")]
    pub refresh_ttl_days: i64,
}

/// Object storage connection settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct StorageConfig {
    /// Custom S3-compatible endpoint (MinIO, Azurite gateway, ...).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,
    #[serde(default = "default_storage_region")]
    pub region: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,
    /// Storage is considered configured only when a bucket is set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bucket: Option<String>,
    #[serde(default = "default_force_path_style")]
    pub force_path_style: bool,
    /// Lifetime of minted upload URLs.
    #[serde(default = "default_sas_ttl_minutes")]
    pub sas_ttl_minutes: u64,
}

/// Upload notification relay settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct WebhookConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Sent as `X-Webhook-Secret` when present.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[serde(default = "default_webhook_timeout_seconds")]
    pub timeout_seconds: u64,
}

/// Chat-completions provider used for AI summaries.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub struct AiConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
    #[serde(default = "default_ai_api_base")]
    pub api_base: String,
    #[serde(default = "default_ai_model")]
    pub model: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            profile: default_profile(),
            api_bind_addr: default_api_bind_addr(),
            log_level: default_log_level(),
            log_format: default_log_format(),
            database_url: default_database_url(),
            db_max_connections: default_db_max_connections(),
            db_acquire_timeout_ms: default_db_acquire_timeout_ms(),
            max_upload_bytes: default_max_upload_bytes(),
            trial_days: default_trial_days(),
            jwt: JwtConfig::default(),
            storage: StorageConfig::default(),
            webhook: WebhookConfig::default(),
            ai: AiConfig::default(),
        }
    }
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: None,
            algorithm: default_jwt_algorithm(),
            access_ttl_minutes: default_access_ttl_minutes(),
            refresh_ttl_days: default_refresh_ttl_days(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_storage_region(),
            access_key: None,
            secret_key: None,
            bucket: None,
            force_path_style: default_force_path_style(),
            sas_ttl_minutes: default_sas_ttl_minutes(),
        }
    }
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            url: None,
            secret: None,
            timeout_seconds: default_webhook_timeout_seconds(),
        }
    }
}

impl Default for AiConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: default_ai_api_base(),
            model: default_ai_model(),
        }
    }
}

impl JwtConfig {
    /// Validate token configuration bounds
    pub fn validate(&self, profile: &str) -> Result<(), ConfigError> {
        if !JWT_ALGORITHMS.contains(&self.algorithm.as_str()) {
            return Err(ConfigError::InvalidJwtAlgorithm {
                value: self.algorithm.clone(),
            });
        }

        if self.secret.is_none() && !is_dev_profile(profile) {
            return Err(ConfigError::MissingJwtSecret);
        }

        if self.access_ttl_minutes <= 0 {
            return Err(ConfigError::InvalidTtl {
                field: "JWT_ACCESS_TTL_MINUTES",
                value: self.access_ttl_minutes,
            });
        }

        if self.refresh_ttl_days <= 0 {
            return Err(ConfigError::InvalidTtl {
                field: "JWT_REFRESH_TTL_DAYS",
                value: self.refresh_ttl_days,
            });
        }

        Ok(())
    }

    /// Returns the configured secret, falling back to [`DEV_JWT_SECRET`].
    pub fn secret_or_dev(&self) -> &str {
        self.secret.as_deref().unwrap_or(DEV_JWT_SECRET)
    }
}

impl StorageConfig {
    /// True when a bucket is configured and blob operations can be served.
    pub fn is_configured(&self) -> bool {
        self.bucket.as_deref().is_some_and(|b| !b.is_empty())
    }
}

impl AppConfig {
    /// Returns the configured bind address as a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, std::net::AddrParseError> {
        self.api_bind_addr.parse()
    }

    /// True for the `local` and `test` profiles.
    pub fn is_dev_profile(&self) -> bool {
        is_dev_profile(&self.profile)
    }

    /// Returns a redacted JSON representation (secrets are redacted).
    pub fn redacted_json(&self) -> serde_json::Result<String> {
        let mut config = self.clone();
        if config.jwt.secret.is_some() {
            config.jwt.secret = Some("[REDACTED]".to_string());
        }
        if config.storage.access_key.is_some() {
            config.storage.access_key = Some("[REDACTED]".to_string());
        }
        if config.storage.secret_key.is_some() {
            config.storage.secret_key = Some("[REDACTED]".to_string());
        }
        if config.webhook.secret.is_some() {
            config.webhook.secret = Some("[REDACTED]".to_string());
        }
        if config.ai.api_key.is_some() {
            config.ai.api_key = Some("[REDACTED]".to_string());
        }
        // Connection strings may embed credentials
        config.database_url = redact_url_password(&config.database_url);
        serde_json::to_string_pretty(&config)
    }

    /// Validates the configuration, returning an error if required settings are missing.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.jwt.validate(&self.profile)?;

        if self.storage.sas_ttl_minutes == 0 {
            return Err(ConfigError::InvalidTtl {
                field: "SAS_TTL_MINUTES",
                value: 0,
            });
        }

        if self.trial_days < 0 {
            return Err(ConfigError::InvalidTtl {
                field: "TRIAL_DAYS",
                value: self.trial_days,
            });
        }

        if self.max_upload_bytes == 0 {
            return Err(ConfigError::InvalidUploadLimit);
        }

        if self.webhook.timeout_seconds == 0 {
            return Err(ConfigError::InvalidTtl {
                field: "WEBHOOK_TIMEOUT_SECONDS",
                value: 0,
            });
        }

        Ok(())
    }
}

fn is_dev_profile(profile: &str) -> bool {
    matches!(profile, "local" | "test")
}

fn redact_url_password(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(mut parsed) if parsed.password().is_some() => {
            let _ = parsed.set_password(Some("REDACTED"));
            parsed.to_string()
        }
        _ => raw.to_string(),
    }
}

fn default_profile() -> String {
    "local".to_string()
}

fn default_api_bind_addr() -> String {
    "0.0.0.0:8000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "json".to_string()
}

fn default_database_url() -> String {
    "sqlite://beam.db?mode=rwc".to_string()
}

fn default_db_max_connections() -> u32 {
    10
}

fn default_db_acquire_timeout_ms() -> u64 {
    5000
}

fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

fn default_trial_days() -> i64 {
    14
}

fn default_jwt_algorithm() -> String {
    "HS256".to_string()
}

fn default_access_ttl_minutes() -> i64 {
    60
}

fn default_refresh_ttl_days() -> i64 {
    7
}

fn default_storage_region() -> String {
    "us-east-1".to_string()
}

fn default_force_path_style() -> bool {
    true
}

fn default_sas_ttl_minutes() -> u64 {
    15
}

fn default_webhook_timeout_seconds() -> u64 {
    10
}

fn default_ai_api_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ai_model() -> String {
    "gpt-4o-mini".to_string()
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to load environment file {path}: {source}")]
    EnvFile {
        path: PathBuf,
        source: dotenvy::Error,
    },
    #[error("invalid api bind address '{value}': {source}")]
    InvalidBindAddr {
        value: String,
        source: std::net::AddrParseError,
    },
    #[error("JWT secret is missing; set BEAM_JWT_SECRET environment variable")]
    MissingJwtSecret,
    #[error("unsupported JWT algorithm '{value}'; expected one of HS256, HS384, HS512")]
    InvalidJwtAlgorithm { value: String },
    #[error("{field} must be positive, got {value}")]
    InvalidTtl { field: &'static str, value: i64 },
    #[error("max upload size must be positive")]
    InvalidUploadLimit,
    #[error("invalid value '{value}' for {key}")]
    InvalidValue { key: &'static str, value: String },
}

/// Loads configuration using layered `.env` files and `BEAM_*` env vars.
pub struct ConfigLoader {
    base_dir: PathBuf,
}

impl ConfigLoader {
    /// Creates a new loader rooted at the current working directory.
    pub fn new() -> Self {
        Self {
            base_dir: env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
        }
    }

    /// Creates a loader rooted at the provided directory (useful for tests).
    pub fn with_base_dir(base_dir: PathBuf) -> Self {
        Self { base_dir }
    }

    /// Loads, validates and returns the layered configuration.
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        let (mut layered, profile_hint) = self.collect_layered_env()?;

        // Overlay process environment last so it wins.
        for (key, value) in env::vars() {
            if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                layered.insert(stripped.to_string(), value);
            }
        }

        let profile = layered
            .remove("PROFILE")
            .filter(|v| !v.is_empty())
            .unwrap_or(profile_hint);
        let api_bind_addr = layered
            .remove("API_BIND_ADDR")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_api_bind_addr);
        let log_level = layered
            .remove("LOG_LEVEL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_level);
        let log_format = layered
            .remove("LOG_FORMAT")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_log_format);
        let database_url = layered
            .remove("DATABASE_URL")
            .filter(|v| !v.is_empty())
            .unwrap_or_else(default_database_url);
        let db_max_connections = layered
            .remove("DB_MAX_CONNECTIONS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_max_connections);
        let db_acquire_timeout_ms = layered
            .remove("DB_ACQUIRE_TIMEOUT_MS")
            .and_then(|v| v.parse().ok())
            .unwrap_or_else(default_db_acquire_timeout_ms);
        let max_upload_bytes = parse_number(&mut layered, "MAX_UPLOAD_BYTES")?
            .unwrap_or_else(default_max_upload_bytes);
        let trial_days =
            parse_number(&mut layered, "TRIAL_DAYS")?.unwrap_or_else(default_trial_days);

        let jwt = JwtConfig {
            secret: non_empty(layered.remove("JWT_SECRET")),
            algorithm: non_empty(layered.remove("JWT_ALGORITHM"))
                .map(|v| v.to_ascii_uppercase())
                .unwrap_or_else(default_jwt_algorithm),
            access_ttl_minutes: parse_number(&mut layered, "JWT_ACCESS_TTL_MINUTES")?
                .unwrap_or_else(default_access_ttl_minutes),
            refresh_ttl_days: parse_number(&mut layered, "JWT_REFRESH_TTL_DAYS")?
                .unwrap_or_else(default_refresh_ttl_days),
        };

        let force_path_style = match non_empty(layered.remove("STORAGE_FORCE_PATH_STYLE")) {
            Some(raw) => parse_bool(&raw).ok_or(ConfigError::InvalidValue {
                key: "STORAGE_FORCE_PATH_STYLE",
                value: raw,
            })?,
            None => default_force_path_style(),
        };
        let storage = StorageConfig {
            endpoint: non_empty(layered.remove("STORAGE_ENDPOINT")),
            region: non_empty(layered.remove("STORAGE_REGION"))
                .unwrap_or_else(default_storage_region),
            access_key: non_empty(layered.remove("STORAGE_ACCESS_KEY")),
            secret_key: non_empty(layered.remove("STORAGE_SECRET_KEY")),
            bucket: non_empty(layered.remove("STORAGE_BUCKET")),
            force_path_style,
            sas_ttl_minutes: parse_number(&mut layered, "SAS_TTL_MINUTES")?
                .unwrap_or_else(default_sas_ttl_minutes),
        };

        let webhook = WebhookConfig {
            url: non_empty(layered.remove("WEBHOOK_URL")),
            secret: non_empty(layered.remove("WEBHOOK_SECRET")),
            timeout_seconds: parse_number(&mut layered, "WEBHOOK_TIMEOUT_SECONDS")?
                .unwrap_or_else(default_webhook_timeout_seconds),
        };

        let ai = AiConfig {
            api_key: non_empty(layered.remove("AI_API_KEY")),
            api_base: non_empty(layered.remove("AI_API_BASE"))
                .map(|v| v.trim_end_matches('/').to_string())
                .unwrap_or_else(default_ai_api_base),
            model: non_empty(layered.remove("AI_MODEL")).unwrap_or_else(default_ai_model),
        };

        let config = AppConfig {
            profile,
            api_bind_addr,
            log_level,
            log_format,
            database_url,
            db_max_connections,
            db_acquire_timeout_ms,
            max_upload_bytes,
            trial_days,
            jwt,
            storage,
            webhook,
            ai,
        };

        config.validate()?;

        match config.bind_addr() {
            Ok(_) => Ok(config),
            Err(source) => Err(ConfigError::InvalidBindAddr {
                value: config.api_bind_addr.clone(),
                source,
            }),
        }
    }

    fn collect_layered_env(&self) -> Result<(BTreeMap<String, String>, String), ConfigError> {
        let mut values = BTreeMap::new();

        self.merge_dotenv(self.base_dir.join(".env"), &mut values)?;
        self.merge_dotenv(self.base_dir.join(".env.local"), &mut values)?;

        let profile = env::var("BEAM_PROFILE")
            .ok()
            .filter(|v| !v.is_empty())
            .or_else(|| values.get("PROFILE").cloned())
            .unwrap_or_else(default_profile);

        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}", &profile)),
            &mut values,
        )?;
        self.merge_dotenv(
            self.base_dir.join(format!(".env.{}.local", &profile)),
            &mut values,
        )?;

        Ok((values, profile))
    }

    fn merge_dotenv(
        &self,
        path: PathBuf,
        values: &mut BTreeMap<String, String>,
    ) -> Result<(), ConfigError> {
        match dotenvy::from_path_iter(&path) {
            Ok(iter) => {
                for item in iter {
                    let (key, value) = item.map_err(|source| ConfigError::EnvFile {
                        path: path.clone(),
                        source,
                    })?;
                    if let Some(stripped) = key.strip_prefix(ENV_PREFIX) {
                        values.insert(stripped.to_string(), value);
                    }
                }
                Ok(())
            }
            Err(dotenvy::Error::Io(ref io_err))
                if io_err.kind() == std::io::ErrorKind::NotFound =>
            {
                Ok(())
            }
            Err(err) => Err(ConfigError::EnvFile { path, source: err }),
        }
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.and_then(|val| {
        let trimmed = val.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(trimmed.to_string())
        }
    })
}

fn parse_number<T: std::str::FromStr>(
    layered: &mut BTreeMap<String, String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match non_empty(layered.remove(key)) {
        Some(raw) => raw
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value: raw }),
        None => Ok(None),
    }
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_validates_in_local_profile() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.jwt.secret_or_dev(), DEV_JWT_SECRET);
        config.bind_addr().expect("default bind addr parses");
    }

    #[test]
    fn test_production_profile_requires_jwt_secret() {
        let mut config = AppConfig {
            profile: "production".to_string(),
            ..AppConfig::default()
        };
        assert!(matches!(
            config.validate(),
            Err(ConfigError::MissingJwtSecret)
        ));

        config.jwt.secret = Some("s3cret".to_string());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_jwt_algorithm_must_be_hmac() {
        let mut jwt = JwtConfig::default();
        jwt.algorithm = "RS256".to_string();
        assert!(matches!(
            jwt.validate("local"),
            Err(ConfigError::InvalidJwtAlgorithm { .. })
        ));
    }

    #[test]
    fn test_zero_ttls_are_rejected() {
        let mut config = AppConfig::default();
        config.jwt.access_ttl_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.storage.sas_ttl_minutes = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.max_upload_bytes = 0;
        assert!(matches!(
            config.validate(),
            Err(ConfigError::InvalidUploadLimit)
        ));
    }

    #[test]
    fn test_redacted_json_hides_secrets() {
        let mut config = AppConfig::default();
        config.jwt.secret = Some("jwt-secret-value".to_string());
        config.storage.secret_key = Some("storage-secret-value".to_string());
        config.webhook.secret = Some("webhook-secret-value".to_string());
        config.ai.api_key = Some("sk-live-value".to_string());
        config.database_url = "postgres://beam:hunter2@db:5432/beam".to_string();

        let json = config.redacted_json().unwrap();
        assert!(!json.contains("jwt-secret-value"));
        assert!(!json.contains("storage-secret-value"));
        assert!(!json.contains("webhook-secret-value"));
        assert!(!json.contains("sk-live-value"));
        assert!(!json.contains("hunter2"));
        assert!(json.contains("[REDACTED]"));
    }

    #[test]
    fn test_storage_is_configured_only_with_bucket() {
        let mut storage = StorageConfig::default();
        assert!(!storage.is_configured());
        storage.bucket = Some(String::new());
        assert!(!storage.is_configured());
        storage.bucket = Some("uploads".to_string());
        assert!(storage.is_configured());
    }

    #[test]
    fn test_parse_bool_variants() {
        assert_eq!(parse_bool("TRUE"), Some(true));
        assert_eq!(parse_bool("off"), Some(false));
        assert_eq!(parse_bool("maybe"), None);
    }
}
