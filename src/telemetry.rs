//! Structured telemetry for the ingress pipeline.
//!
//! This module provides:
//! - `LogRecord`: a leveled message plus correlation ids and metadata
//! - `TelemetrySink`: where records go
//! - `TracingSink`: forwards records to `tracing` (the default)
//! - `TelemetryTrail`: in-memory recorder for inspection and tests
//!
//! Records carry only identifiers, sizes, timings and redacted data. Raw
//! arguments never appear unless they went through
//! [`sanitize_args`](crate::sanitize_args) first.

mod record;
mod sink;
mod trail;

pub use record::{LogLevel, LogRecord};
pub use sink::{TelemetrySink, TracingSink, AUDIT_COMPONENT, REQUEST_COMPONENT};
pub use trail::TelemetryTrail;
