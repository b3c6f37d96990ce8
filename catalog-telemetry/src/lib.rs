//! Request telemetry for the catalog service: redaction, correlation,
//! per-request resource metering, inventory metrics and business events.

pub mod aggregators;
pub mod alloc;
pub mod correlation;
pub mod error;
pub mod events;
pub mod masking;
pub mod operations;
pub mod registry;
pub mod snapshot;

pub use aggregators::*;
pub use alloc::{allocator_stats, AllocatorStats, CountingAllocator};
pub use correlation::*;
pub use error::*;
pub use events::*;
pub use masking::*;
pub use operations::*;
pub use registry::*;
pub use snapshot::*;
