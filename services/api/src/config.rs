//! services/api/src/config.rs
//!
//! Defines the application's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use booking_core::SlotPolicy;
use chrono::NaiveTime;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
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
    pub hospital_api_url: String,
    pub log_level: Level,
    pub slot_policy: SlotPolicy,
    pub backend_timeout: Duration,
    pub allowed_origin: String,
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
        Self::from_vars(|name| std::env::var(name).ok())
    }

    /// Builds the configuration from any variable lookup.
    pub fn from_vars<F>(var: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // --- Server Settings ---
        let bind_address_str = var("BIND_ADDRESS").unwrap_or_else(|| "0.0.0.0:3000".to_string());
        let bind_address = bind_address_str.parse::<SocketAddr>().map_err(|e| {
            ConfigError::InvalidValue("BIND_ADDRESS".to_string(), e.to_string())
        })?;

        let log_level_str = var("RUST_LOG").unwrap_or_else(|| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        let allowed_origin =
            var("ALLOWED_ORIGIN").unwrap_or_else(|| "http://localhost:5173".to_string());

        // --- Hospital Backend ---
        let hospital_api_url = var("HOSPITAL_API_URL")
            .map(|url| url.trim_end_matches('/').to_string())
            .filter(|url| !url.is_empty())
            .ok_or_else(|| ConfigError::MissingVar("HOSPITAL_API_URL".to_string()))?;

        let timeout_secs = parse_number(&var, "BACKEND_TIMEOUT_SECS", 10)?;
        let backend_timeout = Duration::from_secs(timeout_secs);

        // --- Clinic Hours ---
        let open = parse_time(&var, "CLINIC_OPEN_TIME", "09:00")?;
        let close = parse_time(&var, "CLINIC_CLOSE_TIME", "17:00")?;
        let step = parse_number(&var, "SLOT_STEP_MINUTES", 30)?;
        let step = u32::try_from(step).map_err(|e| {
            ConfigError::InvalidValue("SLOT_STEP_MINUTES".to_string(), e.to_string())
        })?;
        let slot_policy = SlotPolicy::new(open, close, step).map_err(|e| {
            let name = if open > close { "CLINIC_CLOSE_TIME" } else { "SLOT_STEP_MINUTES" };
            ConfigError::InvalidValue(name.to_string(), e.to_string())
        })?;

        Ok(Self {
            bind_address,
            hospital_api_url,
            log_level,
            slot_policy,
            backend_timeout,
            allowed_origin,
        })
    }
}

fn parse_time<F>(var: &F, name: &str, default: &str) -> Result<NaiveTime, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    let raw = var(name).unwrap_or_else(|| default.to_string());
    NaiveTime::parse_from_str(&raw, "%H:%M")
        .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e)))
}

fn parse_number<F>(var: &F, name: &str, default: u64) -> Result<u64, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(name) {
        Some(raw) => raw
            .trim()
            .parse::<u64>()
            .map_err(|e| ConfigError::InvalidValue(name.to_string(), format!("'{}': {}", raw, e))),
        None => Ok(default),
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
        Config::from_vars(|name| vars.get(name).cloned())
    }

    #[test]
    fn defaults_apply_when_only_backend_is_set() {
        let config = load(&[("HOSPITAL_API_URL", "http://backend:8000/api/v1/")]).unwrap();
        assert_eq!(config.hospital_api_url, "http://backend:8000/api/v1");
        assert_eq!(config.bind_address.port(), 3000);
        assert_eq!(config.log_level, Level::INFO);
        assert_eq!(config.slot_policy, SlotPolicy::default());
        assert_eq!(config.backend_timeout, Duration::from_secs(10));
    }

    #[test]
    fn backend_url_is_required() {
        assert!(matches!(load(&[]), Err(ConfigError::MissingVar(name)) if name == "HOSPITAL_API_URL"));
    }

    #[test]
    fn clinic_hours_are_parsed() {
        let config = load(&[
            ("HOSPITAL_API_URL", "http://backend"),
            ("CLINIC_OPEN_TIME", "08:00"),
            ("CLINIC_CLOSE_TIME", "12:30"),
            ("SLOT_STEP_MINUTES", "15"),
        ])
        .unwrap();
        assert_eq!(config.slot_policy.open(), NaiveTime::from_hms_opt(8, 0, 0).unwrap());
        assert_eq!(config.slot_policy.close(), NaiveTime::from_hms_opt(12, 30, 0).unwrap());
        assert_eq!(config.slot_policy.step_minutes(), 15);
    }

    #[test]
    fn invalid_values_are_reported() {
        assert!(matches!(
            load(&[("HOSPITAL_API_URL", "http://backend"), ("CLINIC_OPEN_TIME", "nine")]),
            Err(ConfigError::InvalidValue(name, _)) if name == "CLINIC_OPEN_TIME"
        ));
        assert!(matches!(
            load(&[("HOSPITAL_API_URL", "http://backend"), ("SLOT_STEP_MINUTES", "0")]),
            Err(ConfigError::InvalidValue(_, _))
        ));
        assert!(matches!(
            load(&[("HOSPITAL_API_URL", "http://backend"), ("RUST_LOG", "chatty")]),
            Err(ConfigError::InvalidValue(name, _)) if name == "RUST_LOG"
        ));
    }
}
