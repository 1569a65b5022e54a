//! Telemetry record schema.

use std::fmt;

use serde::Serialize;
use serde_json::Value;

/// Severity of a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Stage transitions and other detail.
    Debug,
    /// Normal request flow and audit notes.
    Info,
    /// Blocked requests and slow operations.
    Warn,
    /// Internal failures and failed operations.
    Error,
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
        }
    }
}

/// One structured telemetry record.
///
/// # Example
///
/// ```
/// use ingress_guard::telemetry::{LogLevel, LogRecord};
/// use serde_json::json;
///
/// let record = LogRecord::new(LogLevel::Warn, "request_logger", "Slow operation detected")
///     .with_correlation_id("c0ffee00-0000-4000-8000-000000000000")
///     .with_operation("task_create")
///     .with_metadata(json!({"durationMs": 1500}));
///
/// assert_eq!(record.level(), LogLevel::Warn);
/// assert_eq!(record.metadata()["durationMs"], 1500);
/// ```
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogRecord {
    level: LogLevel,
    message: String,
    correlation_id: Option<String>,
    session_id: Option<String>,
    project_id: Option<String>,
    component: &'static str,
    operation: Option<String>,
    metadata: Value,
}

impl LogRecord {
    /// Creates a record with empty metadata.
    pub fn new(level: LogLevel, component: &'static str, message: impl Into<String>) -> Self {
        Self {
            level,
            message: message.into(),
            correlation_id: None,
            session_id: None,
            project_id: None,
            component,
            operation: None,
            metadata: Value::Null,
        }
    }

    /// Sets the correlation id.
    pub fn with_correlation_id(mut self, id: impl Into<String>) -> Self {
        self.correlation_id = Some(id.into());
        self
    }

    /// Sets the session id when known.
    pub fn with_session_id(mut self, id: Option<&str>) -> Self {
        self.session_id = id.map(str::to_string);
        self
    }

    /// Sets the project id when known.
    pub fn with_project_id(mut self, id: Option<&str>) -> Self {
        self.project_id = id.map(str::to_string);
        self
    }

    /// Sets the operation (usually the tool name).
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.operation = Some(operation.into());
        self
    }

    /// Sets the metadata payload.
    ///
    /// Caller must ensure it contains nothing sensitive.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Returns the level.
    pub fn level(&self) -> LogLevel {
        self.level
    }

    /// Returns the message.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns the correlation id, if set.
    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    /// Returns the session id, if set.
    pub fn session_id(&self) -> Option<&str> {
        self.session_id.as_deref()
    }

    /// Returns the project id, if set.
    pub fn project_id(&self) -> Option<&str> {
        self.project_id.as_deref()
    }

    /// Returns the emitting component.
    pub fn component(&self) -> &'static str {
        self.component
    }

    /// Returns the operation, if set.
    pub fn operation(&self) -> Option<&str> {
        self.operation.as_deref()
    }

    /// Returns the metadata payload.
    pub fn metadata(&self) -> &Value {
        &self.metadata
    }
}

impl fmt::Display for LogRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.level, self.component, self.message)?;
        if let Some(id) = &self.correlation_id {
            write!(f, " (correlation_id={})", id)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn levels_are_ordered() {
        assert!(LogLevel::Debug < LogLevel::Info);
        assert!(LogLevel::Warn < LogLevel::Error);
        assert_eq!(LogLevel::Warn.to_string(), "warn");
    }

    #[test]
    fn record_minimal() {
        let record = LogRecord::new(LogLevel::Info, "ingress_validator", "ok");
        assert_eq!(record.message(), "ok");
        assert_eq!(record.component(), "ingress_validator");
        assert!(record.correlation_id().is_none());
        assert!(record.operation().is_none());
        assert!(record.metadata().is_null());
    }

    #[test]
    fn record_builder_pattern() {
        let record = LogRecord::new(LogLevel::Error, "request_logger", "Operation failed")
            .with_correlation_id("abc")
            .with_session_id(Some("s-1"))
            .with_project_id(None)
            .with_operation("task_create")
            .with_metadata(json!({"errorCode": -32602}));

        assert_eq!(record.correlation_id(), Some("abc"));
        assert_eq!(record.session_id(), Some("s-1"));
        assert_eq!(record.project_id(), None);
        assert_eq!(record.operation(), Some("task_create"));
        assert_eq!(record.metadata()["errorCode"], -32602);
    }

    #[test]
    fn display_includes_correlation() {
        let record = LogRecord::new(LogLevel::Warn, "request_logger", "slow").with_correlation_id("c-1");
        assert_eq!(
            record.to_string(),
            "[warn] request_logger: slow (correlation_id=c-1)"
        );
    }

    #[test]
    fn serializes_camel_case() {
        let record = LogRecord::new(LogLevel::Info, "x", "m").with_correlation_id("c");
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["correlationId"], "c");
        assert_eq!(json["level"], "info");
    }
}
