use std::sync::Arc;

use sluice_dtype::DType;
use test_case::test_case;

use crate::{AccessMode, AllocationStats, Allocator, Buffer, BufferOptions, CpuAllocator, TrackingAllocator};

fn tracking() -> Arc<TrackingAllocator> {
    Arc::new(TrackingAllocator::new(Box::new(CpuAllocator)))
}

#[test]
fn test_tracking_counts_live_and_peak() {
    let allocator = tracking();
    let a = Buffer::allocate(allocator.clone(), DType::Float32, vec![16], BufferOptions::default()).unwrap();
    let b = Buffer::allocate(allocator.clone(), DType::UInt8, vec![8], BufferOptions::default()).unwrap();

    let stats = allocator.stats().unwrap();
    assert_eq!(stats, AllocationStats { live_buffers: 2, live_bytes: 72, peak_bytes: 72, total_allocations: 2 });

    drop(a);
    let stats = allocator.stats().unwrap();
    assert_eq!(stats.live_buffers, 1);
    assert_eq!(stats.live_bytes, 8);
    assert_eq!(stats.peak_bytes, 72);

    drop(b);
    let stats = allocator.stats().unwrap();
    assert_eq!(stats.live_buffers, 0);
    assert_eq!(stats.live_bytes, 0);
    assert_eq!(stats.total_allocations, 2);
}

#[test]
fn test_lazy_buffers_are_not_counted() {
    let allocator = tracking();
    let buffer = Buffer::new(allocator.clone(), DType::Float32, vec![4], BufferOptions::default());
    assert_eq!(allocator.stats().unwrap().total_allocations, 0);

    buffer.ensure_allocated().unwrap();
    buffer.ensure_allocated().unwrap();
    assert_eq!(allocator.stats().unwrap().total_allocations, 1);
}

#[test]
fn test_zero_sized_allocation_rejected() {
    let result = CpuAllocator.alloc(0, &BufferOptions::default());
    assert!(matches!(result, Err(crate::Error::InvalidBufferSize { size: 0 })));

    let allocator = tracking();
    assert!(allocator.alloc(0, &BufferOptions::default()).is_err());
    assert_eq!(allocator.stats().unwrap(), AllocationStats::default());
}

#[test]
fn test_access_mode_copy_directions() {
    assert!(AccessMode::ReadOnly.copies_in() && !AccessMode::ReadOnly.copies_out());
    assert!(AccessMode::ReadWrite.copies_in() && AccessMode::ReadWrite.copies_out());
    assert!(!AccessMode::WriteOnly.copies_in() && AccessMode::WriteOnly.copies_out());
    assert_eq!(AccessMode::WriteOnly.to_string(), "write-only");
}

#[test]
fn test_untracked_allocator_has_no_stats() {
    assert!(CpuAllocator.stats().is_none());
}

#[test_case(AccessMode::ReadOnly, false; "read only")]
#[test_case(AccessMode::ReadWrite, false; "read write")]
#[test_case(AccessMode::WriteOnly, true; "write only")]
fn test_uncopied_buffers_are_zeroed(access: AccessMode, zero_init: bool) {
    let options = BufferOptions::with_access(access);
    assert_eq!(options.access, access);
    assert_eq!(options.zero_init, zero_init);

    let buffer = Buffer::allocate(tracking(), DType::UInt32, vec![4], options).unwrap();
    let mut host = vec![0xffu8; 16];
    buffer.copyout(&mut host).unwrap();
    assert_eq!(host, vec![0u8; 16]);
}
