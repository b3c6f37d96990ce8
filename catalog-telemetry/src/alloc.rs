//! Process-wide allocation counters.
//!
//! Install [`CountingAllocator`] as the `#[global_allocator]` in the binary to
//! make [`allocator_stats`] report real numbers. Without it every counter
//! reads zero.

use std::alloc::{GlobalAlloc, Layout, System};
use std::sync::atomic::{AtomicU64, Ordering};

static LIVE_BYTES: AtomicU64 = AtomicU64::new(0);
static ALLOCATIONS: AtomicU64 = AtomicU64::new(0);
static DEALLOCATIONS: AtomicU64 = AtomicU64::new(0);

/// Wraps the system allocator and keeps running totals in relaxed atomics.
pub struct CountingAllocator;

unsafe impl GlobalAlloc for CountingAllocator {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn alloc_zeroed(&self, layout: Layout) -> *mut u8 {
        let ptr = System.alloc_zeroed(layout);
        if !ptr.is_null() {
            record_alloc(layout.size());
        }
        ptr
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        System.dealloc(ptr, layout);
        LIVE_BYTES.fetch_sub(layout.size() as u64, Ordering::Relaxed);
        DEALLOCATIONS.fetch_add(1, Ordering::Relaxed);
    }

    unsafe fn realloc(&self, ptr: *mut u8, layout: Layout, new_size: usize) -> *mut u8 {
        let new_ptr = System.realloc(ptr, layout, new_size);
        if !new_ptr.is_null() {
            let old_size = layout.size();
            if new_size >= old_size {
                LIVE_BYTES.fetch_add((new_size - old_size) as u64, Ordering::Relaxed);
            } else {
                LIVE_BYTES.fetch_sub((old_size - new_size) as u64, Ordering::Relaxed);
            }
        }
        new_ptr
    }
}

#[inline]
fn record_alloc(size: usize) {
    LIVE_BYTES.fetch_add(size as u64, Ordering::Relaxed);
    ALLOCATIONS.fetch_add(1, Ordering::Relaxed);
}

/// Point-in-time view of the allocation counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocatorStats {
    pub live_bytes: u64,
    pub allocations: u64,
    pub deallocations: u64,
}

pub fn allocator_stats() -> AllocatorStats {
    AllocatorStats {
        live_bytes: LIVE_BYTES.load(Ordering::Relaxed),
        allocations: ALLOCATIONS.load(Ordering::Relaxed),
        deallocations: DEALLOCATIONS.load(Ordering::Relaxed),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counting_allocator_tracks_live_bytes() {
        let allocator = CountingAllocator;
        let layout = Layout::from_size_align(256, 8).unwrap();
        let before = allocator_stats();

        unsafe {
            let ptr = allocator.alloc(layout);
            assert!(!ptr.is_null());
            let during = allocator_stats();
            assert!(during.allocations > before.allocations);
            allocator.dealloc(ptr, layout);
        }

        let after = allocator_stats();
        assert!(after.deallocations > before.deallocations);
    }
}
