//! Per-operation timing and resource sampling.
//!
//! [`PerformanceMonitor::start`] records a baseline keyed by operation id and
//! returns a [`PerformanceGuard`]. The baseline is consumed exactly once:
//! either by [`PerformanceGuard::finish`] / [`PerformanceMonitor::end`], which
//! produce a [`PerformanceSample`], or by dropping the guard, which discards
//! it. No exit path leaves a baseline behind.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use serde::Serialize;

/// CPU time consumed by the process, in microseconds.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CpuUsage {
    /// User-mode time.
    pub user_micros: u64,
    /// Kernel-mode time.
    pub system_micros: u64,
}

/// Process memory footprint, in bytes.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemoryUsage {
    /// Resident set size.
    pub resident_bytes: u64,
    /// Virtual memory size.
    pub virtual_bytes: u64,
}

/// Point-in-time process resource reading.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceSnapshot {
    /// Cumulative CPU time.
    pub cpu: CpuUsage,
    /// Current memory.
    pub memory: MemoryUsage,
}

impl ResourceSnapshot {
    /// Reads current process usage.
    ///
    /// Linux reads `/proc/self/stat` and `/proc/self/statm`. Other platforms,
    /// or unreadable files, report zeros.
    pub fn capture() -> Self {
        probe::capture()
    }
}

/// Measurements for one completed operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceSample {
    /// Wall-clock time between start and end.
    #[serde(serialize_with = "serialize_millis", rename = "durationMs")]
    pub duration: Duration,
    /// CPU time consumed between start and end.
    pub cpu_usage: CpuUsage,
    /// Memory at end.
    pub memory_usage: MemoryUsage,
    /// Change in resident memory between start and end.
    pub resident_delta_bytes: i64,
}

impl PerformanceSample {
    /// Duration in whole milliseconds.
    pub fn duration_ms(&self) -> u64 {
        u64::try_from(self.duration.as_millis()).unwrap_or(u64::MAX)
    }
}

fn serialize_millis<S: serde::Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
    s.serialize_u64(u64::try_from(d.as_millis()).unwrap_or(u64::MAX))
}

#[derive(Debug)]
struct Baseline {
    token: u64,
    started: Instant,
    resources: ResourceSnapshot,
}

/// Tracks in-flight operation baselines.
///
/// # Examples
///
/// ```
/// use ingress_guard::PerformanceMonitor;
///
/// let monitor = PerformanceMonitor::new();
/// let guard = monitor.start("task_create_1a2b3c4d");
/// let sample = guard.finish().expect("first end yields a sample");
/// assert!(sample.duration_ms() < 60_000);
/// assert_eq!(monitor.in_flight(), 0);
/// ```
#[derive(Debug, Default)]
pub struct PerformanceMonitor {
    samples: Mutex<HashMap<String, Baseline>>,
    next_token: AtomicU64,
}

impl PerformanceMonitor {
    /// Creates an empty monitor.
    pub fn new() -> Self {
        Self::default()
    }

    fn samples(&self) -> MutexGuard<'_, HashMap<String, Baseline>> {
        // Entries are plain data; a panic mid-insert cannot corrupt them.
        self.samples.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Records a baseline for `operation_id`.
    ///
    /// Starting an id that is already in flight replaces the old baseline;
    /// the older guard then has nothing left to consume.
    #[must_use = "dropping the guard immediately discards the sample"]
    pub fn start(&self, operation_id: impl Into<String>) -> PerformanceGuard<'_> {
        let operation_id = operation_id.into();
        let token = self.next_token.fetch_add(1, Ordering::Relaxed);
        let baseline = Baseline {
            token,
            started: Instant::now(),
            resources: ResourceSnapshot::capture(),
        };
        if self.samples().insert(operation_id.clone(), baseline).is_some() {
            tracing::debug!(operation_id = %operation_id, "replaced in-flight performance baseline");
        }
        PerformanceGuard {
            monitor: self,
            operation_id,
            token,
            finished: false,
        }
    }

    /// Consumes the baseline for `operation_id` and returns its sample.
    ///
    /// Returns `None` if the id was never started or was already consumed.
    pub fn end(&self, operation_id: &str) -> Option<PerformanceSample> {
        let baseline = self.samples().remove(operation_id)?;
        Some(measure(&baseline))
    }

    /// Number of baselines not yet consumed.
    pub fn in_flight(&self) -> usize {
        self.samples().len()
    }

    fn discard(&self, operation_id: &str, token: u64) {
        let mut samples = self.samples();
        if samples.get(operation_id).is_some_and(|b| b.token == token) {
            samples.remove(operation_id);
            tracing::debug!(operation_id = %operation_id, "discarded unfinished performance baseline");
        }
    }
}

fn measure(baseline: &Baseline) -> PerformanceSample {
    let duration = baseline.started.elapsed();
    let now = ResourceSnapshot::capture();
    let before = baseline.resources;
    let resident_delta = i128::from(now.memory.resident_bytes) - i128::from(before.memory.resident_bytes);
    PerformanceSample {
        duration,
        cpu_usage: CpuUsage {
            user_micros: now.cpu.user_micros.saturating_sub(before.cpu.user_micros),
            system_micros: now.cpu.system_micros.saturating_sub(before.cpu.system_micros),
        },
        memory_usage: now.memory,
        resident_delta_bytes: i64::try_from(resident_delta).unwrap_or(i64::MAX),
    }
}

/// Scoped ownership of one in-flight baseline.
///
/// Dropping an unfinished guard discards its baseline, so panics, early
/// returns and cancelled futures cannot leak entries.
#[derive(Debug)]
pub struct PerformanceGuard<'a> {
    monitor: &'a PerformanceMonitor,
    operation_id: String,
    token: u64,
    finished: bool,
}

impl PerformanceGuard<'_> {
    /// Returns the operation id this guard owns.
    pub fn operation_id(&self) -> &str {
        &self.operation_id
    }

    /// Ends the operation and returns its sample.
    ///
    /// Returns `None` if the baseline was already consumed through
    /// [`PerformanceMonitor::end`] or replaced by a newer start.
    pub fn finish(mut self) -> Option<PerformanceSample> {
        self.finished = true;
        let mut samples = self.monitor.samples();
        let owned = samples
            .get(&self.operation_id)
            .is_some_and(|b| b.token == self.token);
        if !owned {
            return None;
        }
        let baseline = samples.remove(&self.operation_id)?;
        drop(samples);
        Some(measure(&baseline))
    }
}

impl Drop for PerformanceGuard<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.monitor.discard(&self.operation_id, self.token);
        }
    }
}

#[cfg(target_os = "linux")]
mod probe {
    use super::{CpuUsage, MemoryUsage, ResourceSnapshot};

    // USER_HZ is 100 on every mainstream Linux configuration.
    const MICROS_PER_TICK: u64 = 1_000_000 / 100;
    const PAGE_SIZE: u64 = 4096;

    pub(super) fn capture() -> ResourceSnapshot {
        ResourceSnapshot {
            cpu: cpu().unwrap_or_default(),
            memory: memory().unwrap_or_default(),
        }
    }

    fn cpu() -> Option<CpuUsage> {
        let stat = std::fs::read_to_string("/proc/self/stat").ok()?;
        parse_stat(&stat)
    }

    fn memory() -> Option<MemoryUsage> {
        let statm = std::fs::read_to_string("/proc/self/statm").ok()?;
        parse_statm(&statm)
    }

    /// Fields after the `(comm)` entry start at field 3 (state); utime and
    /// stime are fields 14 and 15.
    pub(super) fn parse_stat(stat: &str) -> Option<CpuUsage> {
        let rest = &stat[stat.rfind(')')? + 1..];
        let fields: Vec<&str> = rest.split_whitespace().collect();
        let utime: u64 = fields.get(11)?.parse().ok()?;
        let stime: u64 = fields.get(12)?.parse().ok()?;
        Some(CpuUsage {
            user_micros: utime * MICROS_PER_TICK,
            system_micros: stime * MICROS_PER_TICK,
        })
    }

    pub(super) fn parse_statm(statm: &str) -> Option<MemoryUsage> {
        let mut fields = statm.split_whitespace();
        let size: u64 = fields.next()?.parse().ok()?;
        let resident: u64 = fields.next()?.parse().ok()?;
        Some(MemoryUsage {
            resident_bytes: resident * PAGE_SIZE,
            virtual_bytes: size * PAGE_SIZE,
        })
    }
}

#[cfg(not(target_os = "linux"))]
mod probe {
    use super::ResourceSnapshot;

    pub(super) fn capture() -> ResourceSnapshot {
        ResourceSnapshot::default()
    }
}
