//! Request/response logging around business operations.
//!
//! [`RequestLogger::wrap_operation`] is the only way to run an operation on
//! validated arguments with telemetry attached. It takes [`Verified`] data,
//! so unvalidated input cannot reach the wrapped operation.

use std::error::Error as StdError;
use std::fmt;
use std::future::Future;
use std::io;
use std::sync::Arc;
use std::time::Instant;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::LoggerConfig;
use crate::context::{PartialRequestContext, RequestContext};
use crate::correlation::CorrelationIdManager;
use crate::ingress::IngressStage;
use crate::performance::{PerformanceMonitor, PerformanceSample, ResourceSnapshot};
use crate::redact::sanitize_args;
use crate::telemetry::{LogLevel, LogRecord, TelemetrySink, TracingSink, REQUEST_COMPONENT};
use crate::verified::Verified;

/// JSON-RPC "invalid params" code.
pub const INVALID_PARAMS: i64 = -32602;
/// JSON-RPC "internal error" code.
pub const INTERNAL_ERROR: i64 = -32603;
/// JSON-RPC "method not found" code.
pub const METHOD_NOT_FOUND: i64 = -32601;

/// Error returned by a wrapped operation.
///
/// Only the reporting hooks live here; the error value itself is handed back
/// to the caller untouched.
pub trait OperationError: fmt::Display {
    /// Short type name for telemetry.
    fn error_type(&self) -> &'static str {
        "Error"
    }

    /// Protocol error code, if the error carries one.
    fn error_code(&self) -> Option<i64> {
        None
    }

    /// True if the error is already a protocol-level error.
    fn is_protocol_error(&self) -> bool {
        false
    }
}

/// A protocol-level error with a JSON-RPC style code.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct ProtocolError {
    /// Error code.
    pub code: i64,
    /// Message for the client.
    pub message: String,
}

impl ProtocolError {
    /// Creates an error with an explicit code.
    pub fn new(code: i64, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    /// Shorthand for [`INVALID_PARAMS`].
    pub fn invalid_params(message: impl Into<String>) -> Self {
        Self::new(INVALID_PARAMS, message)
    }

    /// Shorthand for [`INTERNAL_ERROR`].
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(INTERNAL_ERROR, message)
    }
}

impl OperationError for ProtocolError {
    fn error_type(&self) -> &'static str {
        "ProtocolError"
    }

    fn error_code(&self) -> Option<i64> {
        Some(self.code)
    }

    fn is_protocol_error(&self) -> bool {
        true
    }
}

impl OperationError for Box<dyn StdError + Send + Sync> {}

impl OperationError for io::Error {
    fn error_type(&self) -> &'static str {
        "IoError"
    }
}

impl OperationError for serde_json::Error {
    fn error_type(&self) -> &'static str {
        "SerializationError"
    }
}

/// Wraps operations with request, response, performance and slow-operation
/// records.
///
/// One logger is shared by all requests. Each call gets its own correlation
/// id; nothing about one call is visible to another.
pub struct RequestLogger {
    config: LoggerConfig,
    monitor: PerformanceMonitor,
    sink: Arc<dyn TelemetrySink>,
}

impl RequestLogger {
    /// Creates a logger that writes through `tracing`.
    pub fn new(config: LoggerConfig) -> Self {
        Self::with_sink(config, Arc::new(TracingSink))
    }

    /// Creates a logger that writes to `sink`.
    pub fn with_sink(config: LoggerConfig, sink: Arc<dyn TelemetrySink>) -> Self {
        Self {
            config,
            monitor: PerformanceMonitor::new(),
            sink,
        }
    }

    /// Logger settings.
    pub fn config(&self) -> &LoggerConfig {
        &self.config
    }

    /// The monitor backing this logger.
    pub fn monitor(&self) -> &PerformanceMonitor {
        &self.monitor
    }

    /// Runs `operation` with full request telemetry.
    ///
    /// A fresh correlation id is generated and passed to the operation inside
    /// its [`RequestContext`]. The operation's result, success or error, is
    /// returned unchanged. If the returned future is dropped before
    /// completion, its performance baseline is discarded.
    ///
    /// # Examples
    ///
    /// ```
    /// use ingress_guard::{LoggerConfig, PartialRequestContext, ProtocolError, RequestLogger, Verified};
    /// # use ingress_guard::{IngressValidator, JsonSchemaTool, RequestSource, Tainted, ValidationContext};
    /// use serde_json::json;
    ///
    /// # let validator = IngressValidator::builder()
    /// #     .schema("ping", JsonSchemaTool::compile(&json!({"type": "object"})).unwrap())
    /// #     .build();
    /// # let ctx = ValidationContext::new("ping", "r-1", RequestSource::Stdio);
    /// # let args: Verified<_> = validator
    /// #     .validate_ingress_request("ping", Tainted::new(json!({})), &ctx, None)
    /// #     .into_verified()
    /// #     .unwrap();
    /// let logger = RequestLogger::new(LoggerConfig::default());
    /// let rt = tokio::runtime::Builder::new_current_thread().build().unwrap();
    ///
    /// let out: Result<&str, ProtocolError> = rt.block_on(logger.wrap_operation(
    ///     "ping",
    ///     &args,
    ///     |ctx| async move {
    ///         assert_eq!(ctx.tool, "ping");
    ///         Ok("pong")
    ///     },
    ///     PartialRequestContext::new(),
    /// ));
    /// assert_eq!(out, Ok("pong"));
    /// ```
    pub async fn wrap_operation<F, Fut, T, E>(
        &self,
        tool: &str,
        args: &Verified<Value>,
        operation: F,
        partial: PartialRequestContext,
    ) -> Result<T, E>
    where
        F: FnOnce(RequestContext) -> Fut,
        Fut: Future<Output = Result<T, E>>,
        T: Serialize,
        E: OperationError,
    {
        let args = args.as_ref();
        let mut ids = CorrelationIdManager::new();
        let correlation_id = match partial.correlation_id.clone() {
            Some(upstream) => {
                ids.set(upstream.clone());
                upstream
            }
            None => ids.generate(),
        };
        let operation_id = format!("{}_{}", tool, correlation_id.short());
        let guard = self.monitor.start(operation_id.clone());
        let context = RequestContext::new(correlation_id.clone(), tool, args.clone(), partial);
        let session_id = context.session_id.clone();
        let project_id = context.project_id.clone();

        let record = |level: LogLevel, message: &str, metadata: Value| {
            self.sink.emit(
                &LogRecord::new(level, REQUEST_COMPONENT, message)
                    .with_correlation_id(correlation_id.as_str())
                    .with_session_id(session_id.as_deref())
                    .with_project_id(project_id.as_deref())
                    .with_operation(tool)
                    .with_metadata(metadata),
            );
        };
        let stage = |stage: IngressStage| {
            tracing::debug!(
                target: "ingress_request",
                correlation_id = %correlation_id,
                tool = %tool,
                stage = %stage,
                "stage transition"
            );
        };

        let mut request = json!({
            "argsSize": serialized_len(args),
            "hasArgs": has_args(args),
        });
        if self.config.detailed_logging {
            request["args"] = sanitize_args(args);
        }
        record(LogLevel::Info, "Request received", request);
        stage(IngressStage::OperationStarted);

        let started = Instant::now();
        let outcome = operation(context).await;
        let response_time_ms = millis(started);

        match &outcome {
            Ok(value) => {
                stage(IngressStage::OperationSucceeded);
                record(
                    LogLevel::Info,
                    "Request completed",
                    json!({
                        "success": true,
                        "responseTimeMs": response_time_ms,
                        "resultSize": serialized_len(value),
                    }),
                );
            }
            Err(error) => {
                stage(IngressStage::OperationFailed);
                record(
                    LogLevel::Error,
                    "Request failed",
                    json!({
                        "success": false,
                        "responseTimeMs": response_time_ms,
                        "errorType": error.error_type(),
                        "errorCode": error.error_code(),
                        "errorMessage": error.to_string(),
                        "isProtocolError": error.is_protocol_error(),
                    }),
                );
            }
        }

        if let Some(sample) = guard.finish() {
            let mut metrics = performance_metadata(&sample);
            metrics["operationId"] = json!(operation_id);
            record(LogLevel::Info, "Performance metrics", metrics);
            stage(IngressStage::PerformanceRecorded);

            if sample.duration > self.config.slow_threshold() {
                let threshold_ms = self.config.slow_threshold_ms;
                let duration_ms = sample.duration_ms();
                record(
                    LogLevel::Warn,
                    "Slow operation detected",
                    json!({
                        "durationMs": duration_ms,
                        "thresholdMs": threshold_ms,
                        "overThresholdByMs": duration_ms.saturating_sub(threshold_ms),
                        "currentUsage": ResourceSnapshot::capture(),
                    }),
                );
            }
        }

        outcome
    }
}

impl Default for RequestLogger {
    fn default() -> Self {
        Self::new(LoggerConfig::default())
    }
}

impl fmt::Debug for RequestLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestLogger")
            .field("config", &self.config)
            .field("monitor", &self.monitor)
            .finish_non_exhaustive()
    }
}

fn performance_metadata(sample: &PerformanceSample) -> Value {
    serde_json::to_value(sample).unwrap_or_else(|_| json!({"durationMs": sample.duration_ms()}))
}

fn serialized_len<T: Serialize + ?Sized>(value: &T) -> usize {
    serde_json::to_vec(value).map_or(0, |bytes| bytes.len())
}

fn has_args(args: &Value) -> bool {
    match args {
        Value::Null => false,
        Value::Object(map) => !map.is_empty(),
        Value::Array(items) => !items.is_empty(),
        _ => true,
    }
}

fn millis(since: Instant) -> u64 {
    u64::try_from(since.elapsed().as_millis()).unwrap_or(u64::MAX)
}
