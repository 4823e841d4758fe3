use std::cell::RefCell;
use std::fmt;
#[cfg(feature = "cuda")]
use std::sync::Arc;

#[cfg(feature = "cuda")]
use cudarc::driver::{CudaContext, CudaSlice, CudaStream};
use parking_lot::Mutex;
use snafu::ensure;
#[cfg(feature = "cuda")]
use snafu::ResultExt;

#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;
use crate::error::{InvalidBufferSizeSnafu, Result};

/// How a kernel uses one of its buffer arguments.
///
/// The mode decides copy direction: `ReadOnly` and `ReadWrite` are filled from
/// the host before the first launch, `ReadWrite` and `WriteOnly` are copied back
/// after the last one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessMode {
    ReadOnly,
    ReadWrite,
    WriteOnly,
}

impl AccessMode {
    /// Host payload is copied into the device buffer at staging time.
    pub const fn copies_in(self) -> bool {
        matches!(self, Self::ReadOnly | Self::ReadWrite)
    }

    /// Device contents are copied back to the host after the final launch.
    pub const fn copies_out(self) -> bool {
        matches!(self, Self::ReadWrite | Self::WriteOnly)
    }

    pub const fn is_writable(self) -> bool {
        self.copies_out()
    }
}

impl fmt::Display for AccessMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::ReadOnly => "read-only",
            Self::ReadWrite => "read-write",
            Self::WriteOnly => "write-only",
        })
    }
}

/// Opaque handle to device memory.
///
/// Uses `RefCell` for interior mutability with runtime borrow checking.
/// Safe for single-threaded use (Buffer is !Send + !Sync).
#[derive(Debug)]
pub enum RawBuffer {
    Cpu {
        data: RefCell<Box<[u8]>>,
    },
    #[cfg(feature = "cuda")]
    Cuda {
        data: RefCell<CudaSlice<u8>>,
        stream: Arc<CudaStream>,
    },
}

impl RawBuffer {
    /// Get the size of the buffer in bytes.
    pub fn size(&self) -> usize {
        match self {
            RawBuffer::Cpu { data } => data.borrow().len(),
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, .. } => data.borrow().len(),
        }
    }
}

/// Options for buffer allocation.
#[derive(Debug, Clone, Copy)]
pub struct BufferOptions {
    /// Whether to zero-initialize the buffer. Set for buffers the host never
    /// fills, so a kernel that skips an element reads back zero.
    pub zero_init: bool,
    pub access: AccessMode,
}

impl Default for BufferOptions {
    fn default() -> Self {
        Self { zero_init: false, access: AccessMode::ReadWrite }
    }
}

impl BufferOptions {
    pub fn with_access(access: AccessMode) -> Self {
        Self { zero_init: !access.copies_in(), access }
    }
}

pub trait Allocator: Send + Sync + fmt::Debug {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer>;
    fn free(&self, _buffer: RawBuffer) {}
    fn synchronize(&self) -> Result<()> {
        Ok(())
    }
    fn name(&self) -> &str;

    /// Allocation accounting, when the allocator keeps any.
    fn stats(&self) -> Option<AllocationStats> {
        None
    }
}

/// CPU allocator using system memory.
#[derive(Debug, Clone)]
pub struct CpuAllocator;

impl Allocator for CpuAllocator {
    fn alloc(&self, size: usize, _options: &BufferOptions) -> Result<RawBuffer> {
        ensure!(size > 0, InvalidBufferSizeSnafu { size });
        let data = vec![0u8; size].into_boxed_slice();
        Ok(RawBuffer::Cpu { data: RefCell::new(data) })
    }

    fn name(&self) -> &str {
        "CPU"
    }
}

/// CUDA allocator using GPU memory.
#[cfg(feature = "cuda")]
#[derive(Debug, Clone)]
pub struct CudaAllocator {
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    device_id: usize,
}

#[cfg(feature = "cuda")]
impl CudaAllocator {
    pub fn new(device_id: usize) -> Result<Self> {
        let context = CudaContext::new(device_id).context(CudaSnafu)?;
        let stream = context.default_stream();
        Ok(Self { context, stream, device_id })
    }

    pub fn device_id(&self) -> usize {
        self.device_id
    }

    pub fn context(&self) -> &Arc<CudaContext> {
        &self.context
    }

    /// The single ordered queue every copy and launch goes through.
    pub fn stream(&self) -> &Arc<CudaStream> {
        &self.stream
    }
}

#[cfg(feature = "cuda")]
impl Allocator for CudaAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        ensure!(size > 0, InvalidBufferSizeSnafu { size });
        let data = if options.zero_init { self.stream.alloc_zeros::<u8>(size) } else { unsafe { self.stream.alloc::<u8>(size) } }
            .context(CudaSnafu)?;

        Ok(RawBuffer::Cuda { data: RefCell::new(data), stream: Arc::clone(&self.stream) })
    }

    fn synchronize(&self) -> Result<()> {
        self.stream.synchronize().context(CudaSnafu)
    }

    fn name(&self) -> &str {
        "CUDA"
    }
}

/// Snapshot of allocation accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AllocationStats {
    pub live_buffers: usize,
    pub live_bytes: usize,
    pub peak_bytes: usize,
    /// Allocations served since the allocator was created.
    pub total_allocations: usize,
}

/// Allocator wrapper that counts live and peak device memory.
///
/// Buffers are never cached: every `free` goes straight to the inner allocator.
#[derive(Debug)]
pub struct TrackingAllocator {
    inner: Box<dyn Allocator>,
    stats: Mutex<AllocationStats>,
    name: String,
}

impl TrackingAllocator {
    pub fn new(inner: Box<dyn Allocator>) -> Self {
        let name = inner.name().to_string();
        Self { inner, stats: Mutex::new(AllocationStats::default()), name }
    }
}

impl Allocator for TrackingAllocator {
    fn alloc(&self, size: usize, options: &BufferOptions) -> Result<RawBuffer> {
        let raw = self.inner.alloc(size, options)?;

        let mut stats = self.stats.lock();
        stats.live_buffers += 1;
        stats.live_bytes += size;
        stats.peak_bytes = stats.peak_bytes.max(stats.live_bytes);
        stats.total_allocations += 1;
        tracing::trace!(allocator = %self.name, size, live_bytes = stats.live_bytes, "allocated device buffer");

        Ok(raw)
    }

    fn free(&self, buffer: RawBuffer) {
        let size = buffer.size();
        self.inner.free(buffer);

        let mut stats = self.stats.lock();
        stats.live_buffers = stats.live_buffers.saturating_sub(1);
        stats.live_bytes = stats.live_bytes.saturating_sub(size);
        tracing::trace!(allocator = %self.name, size, live_bytes = stats.live_bytes, "released device buffer");
    }

    fn synchronize(&self) -> Result<()> {
        self.inner.synchronize()
    }

    fn name(&self) -> &str {
        &self.name
    }

    fn stats(&self) -> Option<AllocationStats> {
        Some(*self.stats.lock())
    }
}
