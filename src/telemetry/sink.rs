//! Telemetry sinks.

use std::sync::Arc;

use super::{LogLevel, LogRecord};

/// Destination for telemetry records.
///
/// Implementations must not panic and should return quickly; they are called
/// inline on the request path.
pub trait TelemetrySink: Send + Sync {
    /// Accepts one record.
    fn emit(&self, record: &LogRecord);
}

impl<S: TelemetrySink + ?Sized> TelemetrySink for Arc<S> {
    fn emit(&self, record: &LogRecord) {
        (**self).emit(record);
    }
}

/// Component name of ingress validator audit records, also its tracing target.
pub const AUDIT_COMPONENT: &str = "ingress_audit";

/// Component name of request logger records, also its tracing target.
pub const REQUEST_COMPONENT: &str = "ingress_request";

/// Forwards records to `tracing` as structured events.
///
/// Records from [`AUDIT_COMPONENT`] go to target `ingress_audit`; everything
/// else goes to `ingress_request`. Ids and operation become fields, metadata
/// is rendered as JSON.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! forward {
    ($target:literal, $record:expr) => {{
        let record = $record;
        let correlation_id = record.correlation_id().unwrap_or("-");
        let session_id = record.session_id().unwrap_or("-");
        let project_id = record.project_id().unwrap_or("-");
        let operation = record.operation().unwrap_or("-");
        let metadata = record.metadata();
        match record.level() {
            LogLevel::Debug => tracing::debug!(
                target: $target,
                correlation_id, session_id, project_id, operation, %metadata,
                "{}", record.message()
            ),
            LogLevel::Info => tracing::info!(
                target: $target,
                correlation_id, session_id, project_id, operation, %metadata,
                "{}", record.message()
            ),
            LogLevel::Warn => tracing::warn!(
                target: $target,
                correlation_id, session_id, project_id, operation, %metadata,
                "{}", record.message()
            ),
            LogLevel::Error => tracing::error!(
                target: $target,
                correlation_id, session_id, project_id, operation, %metadata,
                "{}", record.message()
            ),
        }
    }};
}

impl TelemetrySink for TracingSink {
    fn emit(&self, record: &LogRecord) {
        if record.component() == AUDIT_COMPONENT {
            forward!("ingress_audit", record);
        } else {
            forward!("ingress_request", record);
        }
    }
}
