//! The ingress validation pipeline.
//!
//! [`IngressValidator`] is the single entry point for untrusted tool
//! arguments. It runs, in order: size check, threat scan, sanitization,
//! schema validation, runtime rules. Every outcome is a [`ValidationResult`];
//! the pipeline never returns an error and never panics to the caller.
//!
//! Only a successful result can be turned into [`Verified`] data.

use std::cell::Cell;
use std::fmt;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::{IngressOverrides, IngressValidationOptions};
use crate::context::ValidationContext;
use crate::error::{InternalError, RejectionKind};
use crate::runtime::RuntimeTypeValidator;
use crate::sanitizer::Sanitizer;
use crate::schema::{SchemaRegistry, ToolSchema};
use crate::tainted::Tainted;
use crate::telemetry::{LogLevel, LogRecord, TelemetrySink, TracingSink, AUDIT_COMPONENT};
use crate::threat::{RuleSet, ThreatScanner};
use crate::verified::Verified;

/// Reason attached to oversized requests.
pub const REASON_TOO_LARGE: &str = "Request too large";
/// Reason attached to requests carrying a blocking threat.
pub const REASON_THREAT: &str = "Security threat detected";
/// Opaque reason attached to internal pipeline failures.
pub const REASON_INTERNAL: &str = "Internal validation error";

/// Where a request is in its lifecycle.
///
/// The ingress stages are traced at DEBUG as the validator moves through
/// them; the operation stages are traced by
/// [`RequestLogger`](crate::RequestLogger).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum IngressStage {
    /// Arguments arrived.
    Received,
    /// Size limit checked.
    SizeChecked,
    /// Threat scan finished.
    Scanned,
    /// Terminal: rejected before validation.
    Blocked,
    /// Strings cleaned (or sanitization skipped).
    Sanitized,
    /// Schema accepted the arguments.
    SchemaValidated,
    /// Runtime rules accepted the arguments.
    RuntimeValidated,
    /// Terminal: arguments accepted.
    Passed,
    /// Terminal: schema or runtime rules refused the arguments.
    Rejected,
    /// Wrapped operation started.
    OperationStarted,
    /// Wrapped operation returned `Ok`.
    OperationSucceeded,
    /// Wrapped operation returned `Err`.
    OperationFailed,
    /// Performance sample emitted.
    PerformanceRecorded,
}

impl IngressStage {
    /// Stable label for logs.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Received => "RECEIVED",
            Self::SizeChecked => "SIZE_CHECKED",
            Self::Scanned => "SCANNED",
            Self::Blocked => "BLOCKED",
            Self::Sanitized => "SANITIZED",
            Self::SchemaValidated => "SCHEMA_VALIDATED",
            Self::RuntimeValidated => "RUNTIME_VALIDATED",
            Self::Passed => "PASSED",
            Self::Rejected => "REJECTED",
            Self::OperationStarted => "OPERATION_STARTED",
            Self::OperationSucceeded => "OPERATION_SUCCEEDED",
            Self::OperationFailed => "OPERATION_FAILED",
            Self::PerformanceRecorded => "PERFORMANCE_RECORDED",
        }
    }

    /// True for stages that end a request.
    ///
    /// `Passed` hands off to `OperationStarted`, and `PerformanceRecorded`
    /// follows an operation outcome, so neither ends a request.
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            Self::Blocked | Self::Rejected | Self::OperationSucceeded | Self::OperationFailed
        )
    }
}

impl fmt::Display for IngressStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of [`IngressValidator::validate_ingress_request`].
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationResult {
    /// True only when every stage accepted the arguments.
    pub success: bool,
    /// Processed arguments. Present on success and on schema/runtime
    /// rejection (partially processed); absent when blocked.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    /// Human-readable errors.
    pub errors: Vec<String>,
    /// Non-blocking findings.
    pub warnings: Vec<String>,
    /// Paths of strings the sanitizer changed.
    pub sanitized_fields: Vec<String>,
    /// True when the request must not be retried as-is.
    pub blocked: bool,
    /// Short reason for blocked requests.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    /// Classification of the outcome, if it was not a clean pass.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<RejectionKind>,
}

impl ValidationResult {
    fn blocked(reason: &str, errors: Vec<String>, warnings: Vec<String>, kind: RejectionKind) -> Self {
        Self {
            success: false,
            data: None,
            errors,
            warnings,
            sanitized_fields: Vec::new(),
            blocked: true,
            reason: Some(reason.to_string()),
            kind: Some(kind),
        }
    }

    fn internal() -> Self {
        Self::blocked(
            REASON_INTERNAL,
            vec![REASON_INTERNAL.to_string()],
            Vec::new(),
            RejectionKind::InternalValidationError,
        )
    }

    /// Converts a successful result into verified data.
    ///
    /// # Errors
    ///
    /// Returns the result unchanged if validation did not succeed.
    pub fn into_verified(self) -> Result<Verified<Value>, Self> {
        match self {
            Self {
                success: true,
                data: Some(data),
                ..
            } => Ok(Verified::new_unchecked(data)),
            other => Err(other),
        }
    }
}

/// Validates untrusted tool arguments.
///
/// # Examples
///
/// ```
/// use ingress_guard::{IngressValidator, JsonSchemaTool, RequestSource, Tainted, ValidationContext};
/// use serde_json::json;
///
/// let validator = IngressValidator::builder()
///     .schema(
///         "task_create",
///         JsonSchemaTool::compile(&json!({
///             "type": "object",
///             "required": ["title"],
///             "properties": {"title": {"type": "string"}}
///         }))
///         .unwrap(),
///     )
///     .build();
///
/// let ctx = ValidationContext::new("task_create", "req-1", RequestSource::Stdio);
/// let result = validator.validate_ingress_request(
///     "task_create",
///     Tainted::new(json!({"title": "Write <b>docs</b>"})),
///     &ctx,
///     None,
/// );
///
/// assert!(result.success);
/// let data = result.into_verified().unwrap().into_inner();
/// assert_eq!(data["title"], "Write docs");
/// ```
pub struct IngressValidator {
    schemas: SchemaRegistry,
    runtime: RuntimeTypeValidator,
    scanner: ThreatScanner,
    sanitizer: Sanitizer,
    options: IngressValidationOptions,
    sink: Arc<dyn TelemetrySink>,
}

impl IngressValidator {
    /// Creates a validator with default options, rules and sink.
    pub fn new(schemas: SchemaRegistry) -> Self {
        Self::builder().schemas(schemas).build()
    }

    /// Starts building a validator.
    pub fn builder() -> IngressValidatorBuilder {
        IngressValidatorBuilder::default()
    }

    /// Effective options (before per-call overrides).
    pub fn options(&self) -> &IngressValidationOptions {
        &self.options
    }

    /// Runs the full pipeline.
    ///
    /// `overrides` apply to this call only. The result is always returned;
    /// internal failures surface as an opaque blocked result and are logged
    /// at ERROR with the request's context.
    pub fn validate_ingress_request(
        &self,
        tool_name: &str,
        args: Tainted<Value>,
        context: &ValidationContext,
        overrides: Option<&IngressOverrides>,
    ) -> ValidationResult {
        let options = match overrides {
            Some(overrides) => self.options.merged(overrides),
            None => self.options.clone(),
        };
        let stage = Cell::new(IngressStage::Received);

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            self.run(tool_name, args.peek(), context, &options, &stage)
        }));

        let error = match outcome {
            Ok(Ok(result)) => return result,
            Ok(Err(error)) => error,
            Err(payload) => InternalError::Panic(panic_message(payload.as_ref())),
        };

        self.sink.emit(
            &LogRecord::new(LogLevel::Error, AUDIT_COMPONENT, "Ingress validation failed internally")
                .with_correlation_id(context.request_id())
                .with_operation(tool_name)
                .with_metadata(json!({
                    "toolName": tool_name,
                    "requestId": context.request_id(),
                    "clientId": context.client_id(),
                    "source": context.source(),
                    "timestamp": context.timestamp(),
                    "stage": stage.get(),
                    "error": error.to_string(),
                })),
        );
        ValidationResult::internal()
    }

    fn run(
        &self,
        tool_name: &str,
        raw: &Value,
        context: &ValidationContext,
        options: &IngressValidationOptions,
        stage: &Cell<IngressStage>,
    ) -> Result<ValidationResult, InternalError> {
        let advance = |next: IngressStage| {
            tracing::debug!(
                target: "ingress_audit",
                request_id = %context.request_id(),
                tool = %tool_name,
                from = %stage.get(),
                to = %next,
                "stage transition"
            );
            stage.set(next);
        };

        // 1. size
        let size = serde_json::to_vec(raw)?.len();
        if size > options.max_request_size {
            advance(IngressStage::Blocked);
            return Ok(ValidationResult::blocked(
                REASON_TOO_LARGE,
                vec![format!(
                    "Request size {} bytes exceeds maximum {} bytes",
                    size, options.max_request_size
                )],
                Vec::new(),
                RejectionKind::SizeExceeded,
            ));
        }
        advance(IngressStage::SizeChecked);

        // 2. threats
        let scan = self.scanner.scan(raw);
        advance(IngressStage::Scanned);
        if scan.blocked {
            self.sink.emit(
                &LogRecord::new(LogLevel::Warn, AUDIT_COMPONENT, "Security threat blocked")
                    .with_correlation_id(context.request_id())
                    .with_operation(tool_name)
                    .with_metadata(json!({
                        "toolName": tool_name,
                        "requestId": context.request_id(),
                        "clientId": context.client_id(),
                        "threats": &scan.errors,
                        "rules": scan.matches.iter().map(|m| m.rule_id.as_str()).collect::<Vec<_>>(),
                        "ruleSetVersion": self.scanner.rules().version(),
                        "source": context.source(),
                    })),
            );
            advance(IngressStage::Blocked);
            return Ok(ValidationResult::blocked(
                REASON_THREAT,
                scan.errors,
                scan.warnings,
                RejectionKind::SecurityThreatDetected,
            ));
        }
        let warnings = scan.warnings;

        // 3. sanitize
        let (data, sanitized_fields) = if options.enable_sanitization {
            let sanitized = self.sanitizer.sanitize(raw);
            (sanitized.data, sanitized.sanitized_fields)
        } else {
            (raw.clone(), Vec::new())
        };
        advance(IngressStage::Sanitized);

        // 4. schema
        let parsed = match self.schemas.parse(tool_name, &data) {
            Ok(parsed) => parsed,
            Err(error) => {
                advance(IngressStage::Rejected);
                return Ok(ValidationResult {
                    success: false,
                    data: Some(data),
                    errors: vec![error.to_string()],
                    warnings,
                    sanitized_fields,
                    blocked: false,
                    reason: None,
                    kind: Some(RejectionKind::SchemaValidationError),
                });
            }
        };
        advance(IngressStage::SchemaValidated);

        // 5. runtime rules
        let report = self.runtime.validate(tool_name, &parsed);
        if !report.success {
            advance(IngressStage::Rejected);
            return Ok(ValidationResult {
                success: false,
                data: Some(parsed),
                errors: report.errors,
                warnings,
                sanitized_fields,
                blocked: false,
                reason: None,
                kind: Some(RejectionKind::RuntimeValidationError),
            });
        }
        advance(IngressStage::RuntimeValidated);

        let noteworthy = !warnings.is_empty() || !sanitized_fields.is_empty();
        if options.enable_audit_logging && noteworthy {
            self.sink.emit(
                &LogRecord::new(LogLevel::Info, AUDIT_COMPONENT, "Request passed with modifications")
                    .with_correlation_id(context.request_id())
                    .with_operation(tool_name)
                    .with_metadata(json!({
                        "toolName": tool_name,
                        "requestId": context.request_id(),
                        "warnings": &warnings,
                        "sanitizedFields": &sanitized_fields,
                        "source": context.source(),
                    })),
            );
        }
        advance(IngressStage::Passed);

        Ok(ValidationResult {
            success: true,
            data: Some(parsed),
            errors: Vec::new(),
            warnings,
            sanitized_fields,
            blocked: false,
            reason: None,
            kind: noteworthy.then_some(RejectionKind::SanitizationWarning),
        })
    }

    /// Presence-only shape check for latency-sensitive callers.
    ///
    /// True when `args` is an object holding a non-null value for every field
    /// the tool's schema requires. Tools without a schema never pass. This
    /// performs no threat scan and no sanitization.
    pub fn quick_validate(&self, tool_name: &str, args: &Value) -> bool {
        let (Some(schema), Some(object)) = (self.schemas.get(tool_name), args.as_object()) else {
            return false;
        };
        schema
            .required_fields()
            .iter()
            .all(|field| object.get(field).is_some_and(|v| !v.is_null()))
    }
}

impl fmt::Debug for IngressValidator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("IngressValidator")
            .field("schemas", &self.schemas)
            .field("runtime", &self.runtime)
            .field("rule_set", &self.scanner.rules().version())
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}

/// Builder for [`IngressValidator`].
pub struct IngressValidatorBuilder {
    schemas: SchemaRegistry,
    runtime: RuntimeTypeValidator,
    rules: Option<RuleSet>,
    options: IngressValidationOptions,
    sink: Arc<dyn TelemetrySink>,
}

impl Default for IngressValidatorBuilder {
    fn default() -> Self {
        Self {
            schemas: SchemaRegistry::new(),
            runtime: RuntimeTypeValidator::with_defaults(),
            rules: None,
            options: IngressValidationOptions::default(),
            sink: Arc::new(TracingSink),
        }
    }
}

impl IngressValidatorBuilder {
    /// Registers a schema for one tool.
    pub fn schema(mut self, tool: impl Into<String>, schema: impl ToolSchema + 'static) -> Self {
        self.schemas.register(tool, schema);
        self
    }

    /// Replaces the whole schema registry.
    pub fn schemas(mut self, schemas: SchemaRegistry) -> Self {
        self.schemas = schemas;
        self
    }

    /// Adds a runtime rule for one tool.
    pub fn runtime_rule<F>(mut self, tool: impl Into<String>, rule: F) -> Self
    where
        F: Fn(&Value, &mut Vec<String>) + Send + Sync + 'static,
    {
        self.runtime = self.runtime.register(tool, rule);
        self
    }

    /// Replaces the runtime validator (drops the built-in rules).
    pub fn runtime(mut self, runtime: RuntimeTypeValidator) -> Self {
        self.runtime = runtime;
        self
    }

    /// Uses a custom threat rule set.
    pub fn rules(mut self, rules: RuleSet) -> Self {
        self.rules = Some(rules);
        self
    }

    /// Sets the default options.
    pub fn options(mut self, options: IngressValidationOptions) -> Self {
        self.options = options;
        self
    }

    /// Routes audit records to `sink`.
    pub fn sink(mut self, sink: Arc<dyn TelemetrySink>) -> Self {
        self.sink = sink;
        self
    }

    /// Finishes the validator.
    pub fn build(self) -> IngressValidator {
        IngressValidator {
            schemas: self.schemas,
            runtime: self.runtime,
            scanner: self
                .rules
                .map_or_else(ThreatScanner::new, ThreatScanner::with_rules),
            sanitizer: Sanitizer::new(),
            options: self.options,
            sink: self.sink,
        }
    }
}
