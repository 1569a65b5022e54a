//! Ingress validation and request telemetry for tool-call servers.
//!
//! Every tool call passes through two layers:
//! - **Ingress validation**: untrusted arguments ([`Tainted<T>`]) go through a
//!   size check, a threat scan, sanitization, a per-tool schema and runtime
//!   rules. Only a successful [`ValidationResult`] yields [`Verified<T>`] data.
//! - **Request telemetry**: [`RequestLogger`] runs the business operation on
//!   verified data, tagging every record with a per-request correlation id and
//!   timing it with a [`PerformanceMonitor`].
//!
//! # Core Types
//!
//! - [`IngressValidator`]: the validation pipeline
//! - [`ThreatScanner`] / [`RuleSet`]: versioned XSS, SQL injection and size rules
//! - [`Sanitizer`]: strips markup and encodes HTML entities
//! - [`SchemaRegistry`] / [`ToolSchema`]: per-tool argument schemas
//! - [`RuntimeTypeValidator`]: semantic rules beyond the schema
//! - [`RequestLogger`]: wraps operations with structured telemetry
//! - [`telemetry::TelemetrySink`]: where records go
//!
//! # Examples
//!
//! ```
//! use ingress_guard::{IngressValidator, JsonSchemaTool, RequestSource, Tainted, ValidationContext};
//! use serde_json::json;
//!
//! let validator = IngressValidator::builder()
//!     .schema("search", JsonSchemaTool::compile(&json!({"type": "object"})).unwrap())
//!     .build();
//! let ctx = ValidationContext::new("search", "req-7", RequestSource::Http);
//!
//! let result = validator.validate_ingress_request(
//!     "search",
//!     Tainted::new(json!({"q": "x' OR '1'='1"})),
//!     &ctx,
//!     None,
//! );
//! assert!(result.blocked);
//! assert_eq!(result.reason.as_deref(), Some("Security threat detected"));
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod config;
mod context;
mod correlation;
mod error;
mod ingress;
mod path;
mod performance;
mod redact;
mod request_logger;
mod runtime;
mod sanitizer;
mod schema;
mod tainted;
pub mod telemetry;
mod threat;
mod verified;

pub use config::{
    IngressOverrides, IngressValidationOptions, LoggerConfig, PipelineConfig,
    DEFAULT_MAX_REQUEST_SIZE, DEFAULT_SLOW_THRESHOLD_MS,
};
pub use context::{PartialRequestContext, RequestContext, RequestSource, ValidationContext};
pub use correlation::{
    CorrelationId, CorrelationIdManager, CorrelationIdRejection, MAX_CLIENT_CORRELATION_ID_LENGTH,
};
pub use error::{ConfigError, RejectionKind, SchemaError};
pub use ingress::{
    IngressStage, IngressValidator, IngressValidatorBuilder, ValidationResult, REASON_INTERNAL,
    REASON_THREAT, REASON_TOO_LARGE,
};
pub use performance::{
    CpuUsage, MemoryUsage, PerformanceGuard, PerformanceMonitor, PerformanceSample,
    ResourceSnapshot,
};
pub use redact::{sanitize_args, MAX_LOGGED_STRING_CHARS, REDACTED, TRUNCATION_MARKER};
pub use request_logger::{
    OperationError, ProtocolError, RequestLogger, INTERNAL_ERROR, INVALID_PARAMS, METHOD_NOT_FOUND,
};
pub use runtime::{
    canonical_name_is_identifier, context_content_not_blank, ids_are_uuid_shaped,
    project_name_has_no_slash, task_title_is_not_placeholder, RuntimeReport, RuntimeRule,
    RuntimeTypeValidator,
};
pub use sanitizer::{Sanitized, Sanitizer};
pub use schema::{JsonSchemaTool, SchemaRegistry, ToolSchema};
pub use tainted::Tainted;
pub use threat::{
    Matcher, RuleSet, ScanReport, Severity, ThreatKind, ThreatMatch, ThreatRule, ThreatScanner,
    DEFAULT_RULESET_VERSION, MAX_ARRAY_ITEMS, MAX_OBJECT_KEYS, MAX_STRING_CHARS,
};
pub use verified::Verified;
