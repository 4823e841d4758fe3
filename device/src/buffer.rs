use std::marker::PhantomData;
use std::rc::Rc;
use std::sync::{Arc, OnceLock};

use sluice_dtype::DType;
use smallvec::SmallVec;
use snafu::{OptionExt, ensure};
#[cfg(feature = "cuda")]
use snafu::ResultExt;

use crate::allocator::{AccessMode, Allocator, BufferOptions, RawBuffer};
#[cfg(feature = "cuda")]
use crate::error::CudaSnafu;
use crate::error::{NotAllocatedSnafu, Result, SizeMismatchSnafu};

/// Shared allocation behind one or more `Buffer` handles.
#[derive(Debug)]
struct BufferData {
    /// Lazily-initialized raw buffer.
    raw: OnceLock<RawBuffer>,
    allocator: Arc<dyn Allocator>,
    /// Total size of the underlying allocation in bytes.
    total_size: usize,
    options: BufferOptions,
}

impl BufferData {
    fn new(allocator: Arc<dyn Allocator>, size: usize, options: BufferOptions) -> Self {
        Self { raw: OnceLock::new(), allocator, total_size: size, options }
    }

    fn ensure_allocated(&self) -> Result<()> {
        if self.raw.get().is_some() {
            return Ok(());
        }

        let raw = self.allocator.alloc(self.total_size, &self.options)?;
        if let Err(raw) = self.raw.set(raw) {
            self.allocator.free(raw);
        }

        Ok(())
    }

    fn is_allocated(&self) -> bool {
        self.raw.get().is_some()
    }

    fn raw(&self) -> Result<&RawBuffer> {
        self.raw.get().context(NotAllocatedSnafu)
    }
}

impl Drop for BufferData {
    fn drop(&mut self) {
        if let Some(raw) = self.raw.take() {
            self.allocator.free(raw);
        }
    }
}

/// A device buffer mirroring one host array for the duration of a dispatch.
///
/// Memory is returned to the allocator when the last handle is dropped.
/// This type is `!Send + !Sync`: a dispatch issues all of its work from one thread.
#[derive(Debug, Clone)]
pub struct Buffer {
    data: Rc<BufferData>,
    /// Size in bytes.
    size: usize,
    dtype: DType,
    shape: SmallVec<[usize; 4]>,
    _not_send_sync: PhantomData<Rc<()>>,
}

impl Buffer {
    /// Create a new buffer with lazy allocation.
    pub fn new(allocator: Arc<dyn Allocator>, dtype: DType, shape: Vec<usize>, options: BufferOptions) -> Self {
        let size = dtype.bytes() * shape.iter().product::<usize>();
        Self {
            data: Rc::new(BufferData::new(allocator, size, options)),
            size,
            dtype,
            shape: SmallVec::from_vec(shape),
            _not_send_sync: PhantomData,
        }
    }

    /// Create a new buffer with immediate allocation.
    pub fn allocate(
        allocator: Arc<dyn Allocator>,
        dtype: DType,
        shape: Vec<usize>,
        options: BufferOptions,
    ) -> Result<Self> {
        let buffer = Self::new(allocator, dtype, shape, options);
        buffer.ensure_allocated()?;
        Ok(buffer)
    }

    pub fn ensure_allocated(&self) -> Result<()> {
        self.data.ensure_allocated()
    }

    pub fn is_allocated(&self) -> bool {
        self.data.is_allocated()
    }

    /// Size in bytes.
    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of elements of `dtype`.
    pub fn len(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }

    pub fn dtype(&self) -> DType {
        self.dtype.clone()
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn access(&self) -> AccessMode {
        self.data.options.access
    }

    pub fn allocator(&self) -> &dyn Allocator {
        &*self.data.allocator
    }

    /// Backend memory handle. Fails if the buffer was never allocated.
    pub fn raw(&self) -> Result<&RawBuffer> {
        self.data.raw()
    }

    /// Copy data from host memory into this buffer.
    pub fn copyin(&mut self, src: &[u8]) -> Result<()> {
        self.ensure_allocated()?;

        let expected = self.size;
        let actual = src.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match self.data.raw()? {
            RawBuffer::Cpu { data } => {
                data.borrow_mut().copy_from_slice(src);
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream } => {
                let mut cuda_data = data.borrow_mut();
                stream.memcpy_htod(src, &mut *cuda_data).context(CudaSnafu)
            }
        }
    }

    /// Copy data from this buffer to host memory, blocking until it lands.
    pub fn copyout(&self, dst: &mut [u8]) -> Result<()> {
        self.ensure_allocated()?;

        let expected = self.size;
        let actual = dst.len();
        ensure!(expected == actual, SizeMismatchSnafu { expected, actual });

        match self.data.raw()? {
            RawBuffer::Cpu { data } => {
                dst.copy_from_slice(&data.borrow());
                Ok(())
            }
            #[cfg(feature = "cuda")]
            RawBuffer::Cuda { data, stream } => {
                let cuda_data = data.borrow();
                stream.memcpy_dtoh(&*cuda_data, dst).context(CudaSnafu)?;
                stream.synchronize().context(CudaSnafu)
            }
        }
    }

    /// Wait for all queued work touching this buffer's device.
    pub fn synchronize(&self) -> Result<()> {
        self.data.allocator.synchronize()
    }
}
