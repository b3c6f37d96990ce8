//! Classification of data-access calls for slow-operation warnings.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    /// Queries returning a collection.
    BulkRead,
    /// Lookup of a single entity.
    PointRead,
    Write,
}

/// Per-kind latency budgets, in milliseconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlowOperationThresholds {
    pub bulk_read_ms: u64,
    pub point_read_ms: u64,
    pub write_ms: u64,
}

impl Default for SlowOperationThresholds {
    fn default() -> Self {
        Self {
            bulk_read_ms: 100,
            point_read_ms: 50,
            write_ms: 100,
        }
    }
}

impl SlowOperationThresholds {
    pub fn threshold(&self, kind: OperationKind) -> Duration {
        let ms = match kind {
            OperationKind::BulkRead => self.bulk_read_ms,
            OperationKind::PointRead => self.point_read_ms,
            OperationKind::Write => self.write_ms,
        };
        Duration::from_millis(ms)
    }

    /// Strictly greater than the budget counts as slow.
    pub fn is_slow(&self, kind: OperationKind, elapsed: Duration) -> bool {
        elapsed > self.threshold(kind)
    }
}
