//! Pipeline configuration.
//!
//! Every knob has a default, so `PipelineConfig::default()` is a working
//! setup. Hosts can embed the types in their own serde config or load them
//! from the environment with [`PipelineConfig::from_env`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Default maximum serialized argument size (1 MiB).
pub const DEFAULT_MAX_REQUEST_SIZE: usize = 1_048_576;
/// Default slow-operation threshold in milliseconds.
pub const DEFAULT_SLOW_THRESHOLD_MS: u64 = 1_000;

/// Options controlling [`IngressValidator`](crate::IngressValidator).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngressValidationOptions {
    /// Run the sanitizer and validate the cleaned data.
    pub enable_sanitization: bool,
    /// Reserved. Carried for configuration compatibility, not enforced here.
    pub enable_rate_limiting: bool,
    /// Emit audit records for blocked requests and altered input.
    pub enable_audit_logging: bool,
    /// Maximum serialized argument size in bytes.
    pub max_request_size: usize,
    /// Content types transports may accept.
    pub allowed_content_types: Vec<String>,
}

impl Default for IngressValidationOptions {
    fn default() -> Self {
        Self {
            enable_sanitization: true,
            enable_rate_limiting: false,
            enable_audit_logging: true,
            max_request_size: DEFAULT_MAX_REQUEST_SIZE,
            allowed_content_types: vec!["application/json".to_string()],
        }
    }
}

impl IngressValidationOptions {
    /// Returns a copy with `overrides` applied. Neither input is modified.
    pub fn merged(&self, overrides: &IngressOverrides) -> Self {
        Self {
            enable_sanitization: overrides
                .enable_sanitization
                .unwrap_or(self.enable_sanitization),
            enable_rate_limiting: overrides
                .enable_rate_limiting
                .unwrap_or(self.enable_rate_limiting),
            enable_audit_logging: overrides
                .enable_audit_logging
                .unwrap_or(self.enable_audit_logging),
            max_request_size: overrides.max_request_size.unwrap_or(self.max_request_size),
            allowed_content_types: overrides
                .allowed_content_types
                .clone()
                .unwrap_or_else(|| self.allowed_content_types.clone()),
        }
    }

    /// Returns true if `content_type` (parameters ignored) is allowed.
    pub fn allows_content_type(&self, content_type: &str) -> bool {
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim();
        self.allowed_content_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(essence))
    }
}

/// Per-call overrides. `None` keeps the validator's setting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct IngressOverrides {
    /// Override for `enable_sanitization`.
    pub enable_sanitization: Option<bool>,
    /// Override for `enable_rate_limiting`.
    pub enable_rate_limiting: Option<bool>,
    /// Override for `enable_audit_logging`.
    pub enable_audit_logging: Option<bool>,
    /// Override for `max_request_size`.
    pub max_request_size: Option<usize>,
    /// Override for `allowed_content_types`.
    pub allowed_content_types: Option<Vec<String>>,
}

/// Options controlling [`RequestLogger`](crate::RequestLogger).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct LoggerConfig {
    /// Operations slower than this emit a WARN alert.
    pub slow_threshold_ms: u64,
    /// Include redacted arguments in request records.
    pub detailed_logging: bool,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            slow_threshold_ms: DEFAULT_SLOW_THRESHOLD_MS,
            detailed_logging: false,
        }
    }
}

impl LoggerConfig {
    /// Slow-operation threshold as a `Duration`.
    pub fn slow_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_threshold_ms)
    }
}

/// Complete configuration for the ingress pipeline.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    /// Validator options.
    pub ingress: IngressValidationOptions,
    /// Request logger options.
    pub logging: LoggerConfig,
}

impl PipelineConfig {
    /// Loads configuration from process environment variables.
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `INGRESS_MAX_REQUEST_SIZE` | `ingress.max_request_size` |
    /// | `INGRESS_ENABLE_SANITIZATION` | `ingress.enable_sanitization` |
    /// | `INGRESS_ENABLE_AUDIT_LOGGING` | `ingress.enable_audit_logging` |
    /// | `INGRESS_ENABLE_RATE_LIMITING` | `ingress.enable_rate_limiting` |
    /// | `SLOW_OPERATION_THRESHOLD_MS` | `logging.slow_threshold_ms` |
    /// | `DETAILED_LOGGING` | `logging.detailed_logging` |
    ///
    /// Unset variables keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key lookup.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidValue`] for unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(raw) = lookup("INGRESS_MAX_REQUEST_SIZE") {
            config.ingress.max_request_size = parse_number("INGRESS_MAX_REQUEST_SIZE", &raw)?;
        }
        if let Some(raw) = lookup("INGRESS_ENABLE_SANITIZATION") {
            config.ingress.enable_sanitization = parse_flag("INGRESS_ENABLE_SANITIZATION", &raw)?;
        }
        if let Some(raw) = lookup("INGRESS_ENABLE_AUDIT_LOGGING") {
            config.ingress.enable_audit_logging = parse_flag("INGRESS_ENABLE_AUDIT_LOGGING", &raw)?;
        }
        if let Some(raw) = lookup("INGRESS_ENABLE_RATE_LIMITING") {
            config.ingress.enable_rate_limiting = parse_flag("INGRESS_ENABLE_RATE_LIMITING", &raw)?;
        }
        if let Some(raw) = lookup("SLOW_OPERATION_THRESHOLD_MS") {
            config.logging.slow_threshold_ms = parse_number("SLOW_OPERATION_THRESHOLD_MS", &raw)?;
        }
        if let Some(raw) = lookup("DETAILED_LOGGING") {
            config.logging.detailed_logging = parse_flag("DETAILED_LOGGING", &raw)?;
        }

        Ok(config)
    }
}

fn parse_flag(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key,
            value: raw.to_string(),
            reason: "expected a boolean",
        }),
    }
}

fn parse_number<T: std::str::FromStr>(key: &'static str, raw: &str) -> Result<T, ConfigError> {
    raw.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key,
        value: raw.to_string(),
        reason: "expected a non-negative integer",
    })
}
