use std::fmt;

use serde::Serialize;

/// Classification of an ingress outcome that did not pass cleanly.
///
/// Every failed [`ValidationResult`](crate::ValidationResult) carries one of
/// these so callers can decide whether to retry, fix the input, or give up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RejectionKind {
    /// Serialized arguments exceed the configured maximum size.
    SizeExceeded,
    /// A blocking threat rule matched somewhere in the arguments.
    SecurityThreatDetected,
    /// Sanitization altered the input. Informational only.
    SanitizationWarning,
    /// The registered tool schema rejected the arguments.
    SchemaValidationError,
    /// A tool-specific semantic rule rejected the arguments.
    RuntimeValidationError,
    /// The pipeline itself failed. Surfaced to callers as an opaque failure.
    InternalValidationError,
}

impl RejectionKind {
    /// Returns a stable label for logs and metrics.
    pub const fn label(self) -> &'static str {
        match self {
            Self::SizeExceeded => "size_exceeded",
            Self::SecurityThreatDetected => "security_threat_detected",
            Self::SanitizationWarning => "sanitization_warning",
            Self::SchemaValidationError => "schema_validation_error",
            Self::RuntimeValidationError => "runtime_validation_error",
            Self::InternalValidationError => "internal_validation_error",
        }
    }

    /// Returns true when the request is blocked outright rather than rejected.
    pub const fn is_blocking(self) -> bool {
        matches!(
            self,
            Self::SizeExceeded | Self::SecurityThreatDetected | Self::InternalValidationError
        )
    }

    /// Returns true when resubmitting corrected input can succeed.
    ///
    /// Oversized payloads must be shrunk, threats are never retried and
    /// internal failures are not the caller's to fix.
    pub const fn is_retryable(self) -> bool {
        matches!(
            self,
            Self::SchemaValidationError | Self::RuntimeValidationError
        )
    }
}

impl fmt::Display for RejectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Error returned by a [`ToolSchema`](crate::ToolSchema) when arguments do not conform.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SchemaError {
    /// No schema is registered for the tool.
    #[error("No schema registered for tool '{0}'")]
    UnknownTool(String),
    /// The arguments failed validation.
    #[error("Schema validation failed: {}", .0.join("; "))]
    Invalid(Vec<String>),
    /// The schema document itself could not be compiled.
    #[error("invalid schema: {0}")]
    Compile(String),
}

/// Error raised while loading pipeline configuration.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    /// An environment variable held a value that could not be parsed.
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        /// Variable name.
        key: &'static str,
        /// Raw value found.
        value: String,
        /// Why it was rejected.
        reason: &'static str,
    },
}

/// Failure inside the ingress pipeline itself.
///
/// These never reach callers directly; the validator logs them and returns an
/// opaque blocked result.
#[derive(Debug, thiserror::Error)]
pub(crate) enum InternalError {
    #[error("failed to serialize arguments: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("stage panicked: {0}")]
    Panic(String),
}
