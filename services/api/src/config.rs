//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use patient_portal_core::Locale;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// Upper bound for `SESSION_TTL_DAYS`.
pub const MAX_SESSION_TTL_DAYS: i64 = 3650;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    pub bind_address: SocketAddr,
    /// Unset means the in-memory store and identity adapters are used.
    pub database_url: Option<String>,
    pub log_level: Level,
    /// `host:port` of the diagnosis inference server.
    pub diagnosis_host: String,
    /// Further hosts a request may name instead of `diagnosis_host`.
    pub diagnosis_allowed_hosts: Vec<String>,
    pub diagnosis_timeout: Option<Duration>,
    pub default_locale: Locale,
    pub cors_origin: String,
    pub session_ttl_days: i64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_address: SocketAddr::from(([0, 0, 0, 0], 3000)),
            database_url: None,
            log_level: Level::INFO,
            diagnosis_host: "127.0.0.1:5021".to_string(),
            diagnosis_allowed_hosts: Vec::new(),
            diagnosis_timeout: None,
            default_locale: Locale::En,
            cors_origin: "http://localhost:3000".to_string(),
            session_ttl_days: 30,
        }
    }
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from any key/value source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // --- Load Server and Database Settings ---
        let bind_address = match lookup("BIND_ADDRESS") {
            Some(value) => value.parse::<SocketAddr>().map_err(|e| {
                ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
            })?,
            None => defaults.bind_address,
        };

        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());

        let log_level_str = lookup("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        // --- Load Diagnosis Server Settings ---
        let diagnosis_host = lookup("DIAGNOSIS_HOST").unwrap_or(defaults.diagnosis_host);
        if diagnosis_host.trim().is_empty() {
            return Err(ConfigError::InvalidValue(
                "DIAGNOSIS_HOST".to_string(),
                "must not be empty".to_string(),
            ));
        }

        let diagnosis_allowed_hosts = lookup("DIAGNOSIS_ALLOWED_HOSTS")
            .map(|value| {
                value
                    .split(',')
                    .map(str::trim)
                    .filter(|host| !host.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        let diagnosis_timeout = match lookup("DIAGNOSIS_TIMEOUT_SECS") {
            Some(value) => {
                let secs = value.parse::<u64>().map_err(|e| {
                    ConfigError::InvalidValue("DIAGNOSIS_TIMEOUT_SECS".to_string(), e.to_string())
                })?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        // --- Load Web Settings ---
        let default_locale = match lookup("DEFAULT_LOCALE") {
            Some(value) => Locale::parse(&value).ok_or_else(|| {
                ConfigError::InvalidValue(
                    "DEFAULT_LOCALE".to_string(),
                    format!("'{}' is not one of: en, ar", value),
                )
            })?,
            None => defaults.default_locale,
        };

        let cors_origin = lookup("CORS_ORIGIN").unwrap_or(defaults.cors_origin);

        let session_ttl_days = match lookup("SESSION_TTL_DAYS") {
            Some(value) => value
                .parse::<i64>()
                .ok()
                .filter(|days| (1..=MAX_SESSION_TTL_DAYS).contains(days))
                .filter(|days| chrono::TimeDelta::try_days(*days).is_some())
                .ok_or_else(|| {
                    ConfigError::InvalidValue(
                        "SESSION_TTL_DAYS".to_string(),
                        format!(
                            "'{}' is not a number of days between 1 and {}",
                            value, MAX_SESSION_TTL_DAYS
                        ),
                    )
                })?,
            None => defaults.session_ttl_days,
        };

        Ok(Self {
            bind_address,
            database_url,
            log_level,
            diagnosis_host,
            diagnosis_allowed_hosts,
            diagnosis_timeout,
            default_locale,
            cors_origin,
            session_ttl_days,
        })
    }

    /// Whether a request may send diagnoses to `host`.
    pub fn is_allowed_diagnosis_host(&self, host: &str) -> bool {
        host == self.diagnosis_host || self.diagnosis_allowed_hosts.iter().any(|h| h == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = load(&[]).unwrap();
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.database_url, None);
        assert_eq!(config.diagnosis_host, "127.0.0.1:5021");
        assert_eq!(config.diagnosis_timeout, None);
        assert_eq!(config.session_ttl_days, 30);
        assert!(config.diagnosis_allowed_hosts.is_empty());
    }

    #[test]
    fn values_are_read_from_the_environment() {
        let config = load(&[
            ("DATABASE_URL", "postgres://localhost/portal"),
            ("DIAGNOSIS_HOST", "192.168.1.39:5021"),
            ("DIAGNOSIS_ALLOWED_HOSTS", "10.0.0.7:5021, ,gpu-box:5021"),
            ("DIAGNOSIS_TIMEOUT_SECS", "15"),
            ("DEFAULT_LOCALE", "ar"),
            ("RUST_LOG", "debug"),
        ])
        .unwrap();
        assert_eq!(config.database_url.as_deref(), Some("postgres://localhost/portal"));
        assert_eq!(config.diagnosis_host, "192.168.1.39:5021");
        assert_eq!(config.diagnosis_allowed_hosts, ["10.0.0.7:5021", "gpu-box:5021"]);
        assert!(config.is_allowed_diagnosis_host("192.168.1.39:5021"));
        assert!(config.is_allowed_diagnosis_host("gpu-box:5021"));
        assert!(!config.is_allowed_diagnosis_host("169.254.169.254:80"));
        assert_eq!(config.diagnosis_timeout, Some(Duration::from_secs(15)));
        assert_eq!(config.default_locale, Locale::Ar);
        assert_eq!(config.log_level, Level::DEBUG);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[("BIND_ADDRESS", "nowhere")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "BIND_ADDRESS"
        ));
        assert!(matches!(
            load(&[("DEFAULT_LOCALE", "fr")]),
            Err(ConfigError::InvalidValue(var, _)) if var == "DEFAULT_LOCALE"
        ));
        for days in ["0", "-3", "3651", "999999999999"] {
            assert!(matches!(
                load(&[("SESSION_TTL_DAYS", days)]),
                Err(ConfigError::InvalidValue(var, _)) if var == "SESSION_TTL_DAYS"
            ));
        }
        assert_eq!(
            load(&[("SESSION_TTL_DAYS", "3650")]).unwrap().session_ttl_days,
            MAX_SESSION_TTL_DAYS
        );
    }
}
