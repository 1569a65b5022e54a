//! In-memory telemetry recorder.

use std::sync::{Mutex, MutexGuard, PoisonError};

use super::{LogLevel, LogRecord, TelemetrySink};

/// In-memory recorder for telemetry records.
///
/// Stores records in emission order. Intended for tests and for hosts that
/// want to inspect what a request produced; production hosts normally use
/// [`TracingSink`](super::TracingSink).
///
/// # Example
///
/// ```
/// use ingress_guard::telemetry::{LogLevel, LogRecord, TelemetrySink, TelemetryTrail};
///
/// let trail = TelemetryTrail::new();
/// trail.emit(&LogRecord::new(LogLevel::Info, "ingress_request", "Request started"));
///
/// assert_eq!(trail.len(), 1);
/// assert_eq!(trail.count_at(LogLevel::Info), 1);
/// ```
#[derive(Debug, Default)]
pub struct TelemetryTrail {
    records: Mutex<Vec<LogRecord>>,
}

impl TelemetryTrail {
    /// Creates an empty trail.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Vec<LogRecord>> {
        self.records.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns a snapshot of all records.
    pub fn records(&self) -> Vec<LogRecord> {
        self.lock().clone()
    }

    /// Returns records at exactly `level`.
    pub fn at_level(&self, level: LogLevel) -> Vec<LogRecord> {
        self.lock()
            .iter()
            .filter(|r| r.level() == level)
            .cloned()
            .collect()
    }

    /// Counts records at exactly `level`.
    pub fn count_at(&self, level: LogLevel) -> usize {
        self.lock().iter().filter(|r| r.level() == level).count()
    }

    /// Returns the first record whose message contains `needle`.
    pub fn find(&self, needle: &str) -> Option<LogRecord> {
        self.lock()
            .iter()
            .find(|r| r.message().contains(needle))
            .cloned()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true if nothing has been recorded.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Clears all records.
    pub fn clear(&self) {
        self.lock().clear();
    }
}

impl TelemetrySink for TelemetryTrail {
    fn emit(&self, record: &LogRecord) {
        self.lock().push(record.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn record(level: LogLevel, message: &str) -> LogRecord {
        LogRecord::new(level, "ingress_request", message)
    }

    #[test]
    fn trail_starts_empty() {
        let trail = TelemetryTrail::new();
        assert!(trail.is_empty());
        assert_eq!(trail.len(), 0);
        assert!(trail.find("anything").is_none());
    }

    #[test]
    fn trail_keeps_emission_order() {
        let trail = TelemetryTrail::new();
        trail.emit(&record(LogLevel::Info, "first"));
        trail.emit(&record(LogLevel::Warn, "second"));

        let records = trail.records();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].message(), "first");
        assert_eq!(records[1].message(), "second");
    }

    #[test]
    fn trail_filters_by_level() {
        let trail = TelemetryTrail::new();
        trail.emit(&record(LogLevel::Info, "a"));
        trail.emit(&record(LogLevel::Warn, "Slow operation detected"));
        trail.emit(&record(LogLevel::Info, "b"));

        assert_eq!(trail.count_at(LogLevel::Info), 2);
        assert_eq!(trail.count_at(LogLevel::Error), 0);
        assert_eq!(trail.at_level(LogLevel::Warn)[0].message(), "Slow operation detected");
        assert_eq!(trail.find("Slow").map(|r| r.level()), Some(LogLevel::Warn));
    }

    #[test]
    fn trail_can_be_cleared() {
        let trail = TelemetryTrail::new();
        trail.emit(&record(LogLevel::Error, "boom"));
        trail.clear();
        assert!(trail.is_empty());
    }

    #[test]
    fn trail_is_shareable_across_threads() {
        let trail = Arc::new(TelemetryTrail::new());
        let handles: Vec<_> = (0..4)
            .map(|i| {
                let trail = Arc::clone(&trail);
                thread::spawn(move || trail.emit(&record(LogLevel::Debug, &format!("t{i}"))))
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }
        assert_eq!(trail.len(), 4);
    }
}
