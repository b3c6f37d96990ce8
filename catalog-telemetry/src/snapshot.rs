//! Before/after resource readings around a unit of work.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::alloc::allocator_stats;
use crate::registry::TelemetryRegistry;

/// Resource usage at one instant. Never mutated after capture.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    /// Bytes currently held through the global allocator.
    pub allocated_bytes: u64,
    /// Resident set size reported by the OS.
    pub system_bytes: u64,
    /// Tasks alive on the current tokio runtime.
    pub live_tasks: u64,
    /// Cumulative allocation calls.
    pub allocation_count: u64,
    /// Cumulative deallocation calls.
    pub deallocation_count: u64,
    pub captured_at: Instant,
}

impl MetricsSnapshot {
    /// Read every counter. Cheap enough to call twice per request.
    pub fn capture() -> Self {
        let alloc = allocator_stats();

        Self {
            allocated_bytes: alloc.live_bytes,
            system_bytes: resident_memory_bytes(),
            live_tasks: live_task_count(),
            allocation_count: alloc.allocations,
            deallocation_count: alloc.deallocations,
            captured_at: Instant::now(),
        }
    }

    /// Field-wise difference from `self` to `later`. Fields that shrank
    /// report zero.
    pub fn delta_to(&self, later: &MetricsSnapshot) -> MetricsDelta {
        MetricsDelta {
            allocated_bytes: later.allocated_bytes.saturating_sub(self.allocated_bytes),
            system_bytes: later.system_bytes.saturating_sub(self.system_bytes),
            live_tasks: later.live_tasks.saturating_sub(self.live_tasks),
            allocations: later.allocation_count.saturating_sub(self.allocation_count),
            deallocations: later
                .deallocation_count
                .saturating_sub(self.deallocation_count),
            elapsed: later.captured_at.saturating_duration_since(self.captured_at),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetricsDelta {
    pub allocated_bytes: u64,
    pub system_bytes: u64,
    pub live_tasks: u64,
    pub allocations: u64,
    pub deallocations: u64,
    pub elapsed: Duration,
}

#[cfg(target_os = "linux")]
fn resident_memory_bytes() -> u64 {
    let Ok(status) = std::fs::read_to_string("/proc/self/status") else {
        return 0;
    };

    status
        .lines()
        .find(|line| line.starts_with("VmRSS:"))
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|kb| kb.parse::<u64>().ok())
        .map_or(0, |kb| kb * 1024)
}

#[cfg(not(target_os = "linux"))]
fn resident_memory_bytes() -> u64 {
    0
}

fn live_task_count() -> u64 {
    tokio::runtime::Handle::try_current()
        .map(|handle| handle.metrics().num_alive_tasks() as u64)
        .unwrap_or(0)
}

/// Wraps a request in a pair of snapshots and exports the result.
#[derive(Clone)]
pub struct RequestMeter {
    registry: Arc<TelemetryRegistry>,
}

/// A measurement that has started but not finished.
#[derive(Debug)]
#[must_use = "call RequestMeter::finish to record the measurement"]
pub struct InFlight {
    before: MetricsSnapshot,
}

impl InFlight {
    pub fn before(&self) -> &MetricsSnapshot {
        &self.before
    }
}

impl RequestMeter {
    pub fn new(registry: Arc<TelemetryRegistry>) -> Self {
        Self { registry }
    }

    pub fn begin(&self) -> InFlight {
        InFlight {
            before: MetricsSnapshot::capture(),
        }
    }

    /// Capture the "after" snapshot, export process gauges and the
    /// per-request allocation histogram, and hand back the delta for logging.
    pub fn finish(&self, in_flight: InFlight) -> MetricsDelta {
        let after = MetricsSnapshot::capture();
        let delta = in_flight.before.delta_to(&after);

        self.registry.record_process(&after);
        self.registry.record_request_allocation(&delta);

        delta
    }
}
