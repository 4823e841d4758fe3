//! Buffer Lifecycle Manager: host arrays to device buffers and back.
//!
//! [`StagedBuffers::stage`] checks the memory budget, then allocates one
//! device buffer per array in kernel parameter order. Read-only and
//! read-write payloads are copied in; write-only buffers are left
//! uninitialized. [`StagedBuffers::readback`] copies every writable buffer
//! back into its host array. Dropping the staged set releases device memory,
//! so a failed dispatch frees everything without touching the host.

use std::collections::HashSet;

use sluice_device::{AccessMode, Buffer, BufferOptions, Device};
use snafu::{OptionExt, ResultExt, ensure};

use crate::arrays::NamedArray;
use crate::error::{
    DeviceSnafu, DuplicateArraySnafu, InvalidBufferSizeSnafu, InvalidConfigSnafu, OutOfDeviceMemorySnafu, Result,
    StagingSnafu,
};

/// One device buffer mirroring a host array.
#[derive(Debug)]
pub struct StagedBuffer {
    pub name: String,
    pub access: AccessMode,
    pub buffer: Buffer,
}

/// Device buffers of one dispatch, in kernel parameter order.
#[derive(Debug)]
pub struct StagedBuffers {
    entries: Vec<StagedBuffer>,
}

impl StagedBuffers {
    /// Allocate and fill device buffers for `arrays`, in order.
    ///
    /// All checks run before the first allocation.
    pub fn stage(device: &Device, arrays: &[&NamedArray<'_>]) -> Result<Self> {
        check_budget(device, arrays)?;

        let mut entries = Vec::with_capacity(arrays.len());
        for array in arrays {
            let options = BufferOptions::with_access(array.access());
            let mut buffer = Buffer::allocate(device.allocator.clone(), array.dtype(), vec![array.len()], options)
                .context(StagingSnafu { name: array.name() })?;
            if array.access().copies_in() {
                buffer.copyin(array.bytes()).context(StagingSnafu { name: array.name() })?;
            }
            tracing::debug!(array = %array.name(), access = %array.access(), bytes = array.size(), "staged buffer");
            entries.push(StagedBuffer { name: array.name().to_string(), access: array.access(), buffer });
        }
        Ok(Self { entries })
    }

    /// Buffers in kernel parameter order, ready to pass to a launch.
    pub fn buffers(&self) -> Vec<&Buffer> {
        self.entries.iter().map(|e| &e.buffer).collect()
    }

    pub fn get(&self, name: &str) -> Option<&StagedBuffer> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total_bytes(&self) -> usize {
        self.entries.iter().map(|e| e.buffer.size()).sum()
    }

    /// Copy every writable buffer back into the matching host array.
    ///
    /// Blocks until the device queue is drained. Read-only arrays are skipped.
    pub fn readback(&self, device: &Device, arrays: &mut [NamedArray<'_>]) -> Result<()> {
        device.synchronize().context(DeviceSnafu)?;
        for array in arrays.iter_mut().filter(|a| a.access().copies_out()) {
            let name = array.name().to_string();
            let staged =
                self.get(&name).with_context(|| InvalidConfigSnafu { reason: format!("array `{name}` was never staged") })?;
            let Some(host) = array.bytes_mut() else { continue };
            staged.buffer.copyout(host).context(StagingSnafu { name: name.as_str() })?;
            tracing::trace!(array = %name, bytes = host.len(), "read back buffer");
        }
        Ok(())
    }
}

fn check_budget(device: &Device, arrays: &[&NamedArray<'_>]) -> Result<()> {
    let mut seen = HashSet::with_capacity(arrays.len());
    let mut total = 0usize;
    for array in arrays {
        ensure!(seen.insert(array.name()), DuplicateArraySnafu { name: array.name() });
        ensure!(!array.is_empty(), InvalidBufferSizeSnafu { name: array.name() });
        ensure!(
            array.size() <= device.info.max_alloc_size,
            OutOfDeviceMemorySnafu {
                what: format!("array `{}`", array.name()),
                requested: array.size(),
                limit: device.info.max_alloc_size
            }
        );
        total += array.size();
    }
    ensure!(
        total <= device.info.global_mem_size,
        OutOfDeviceMemorySnafu { what: "dispatch", requested: total, limit: device.info.global_mem_size }
    );
    Ok(())
}
