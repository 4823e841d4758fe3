//! Named host arrays handed to a dispatch.
//!
//! Each array carries its access mode. Read-only arrays borrow the host slice
//! shared; writable arrays borrow it exclusively so read-back can land in place.

use std::fmt;

use bytemuck::{NoUninit, Pod};
use sluice_device::AccessMode;
use sluice_dtype::{DType, HasDType};

enum HostData<'a> {
    Shared(&'a [u8]),
    Exclusive(&'a mut [u8]),
}

/// One `(name, payload, access mode)` entry of a dispatch.
pub struct NamedArray<'a> {
    name: String,
    access: AccessMode,
    dtype: DType,
    len: usize,
    data: HostData<'a>,
}

impl fmt::Debug for NamedArray<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NamedArray")
            .field("name", &self.name)
            .field("access", &self.access)
            .field("dtype", &self.dtype)
            .field("len", &self.len)
            .finish()
    }
}

impl<'a> NamedArray<'a> {
    /// Copied to the device before the first launch, never read back.
    pub fn read_only<T: HasDType + NoUninit>(name: impl Into<String>, data: &'a [T]) -> Self {
        Self {
            name: name.into(),
            access: AccessMode::ReadOnly,
            dtype: T::DTYPE,
            len: data.len(),
            data: HostData::Shared(bytemuck::cast_slice(data)),
        }
    }

    /// Copied in before the first launch and back after the last.
    pub fn read_write<T: HasDType + Pod>(name: impl Into<String>, data: &'a mut [T]) -> Self {
        Self::exclusive(name, AccessMode::ReadWrite, data)
    }

    /// Allocated uninitialized on the device and copied back after the last launch.
    pub fn write_only<T: HasDType + Pod>(name: impl Into<String>, data: &'a mut [T]) -> Self {
        Self::exclusive(name, AccessMode::WriteOnly, data)
    }

    fn exclusive<T: HasDType + Pod>(name: impl Into<String>, access: AccessMode, data: &'a mut [T]) -> Self {
        let len = data.len();
        Self { name: name.into(), access, dtype: T::DTYPE, len, data: HostData::Exclusive(bytemuck::cast_slice_mut(data)) }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn access(&self) -> AccessMode {
        self.access
    }

    pub fn dtype(&self) -> DType {
        self.dtype.clone()
    }

    /// Number of `dtype` elements.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Payload size in bytes.
    pub fn size(&self) -> usize {
        self.bytes().len()
    }

    pub fn bytes(&self) -> &[u8] {
        match &self.data {
            HostData::Shared(bytes) => bytes,
            HostData::Exclusive(bytes) => bytes,
        }
    }

    /// Writable view, `None` for read-only arrays.
    pub(crate) fn bytes_mut(&mut self) -> Option<&mut [u8]> {
        match &mut self.data {
            HostData::Shared(_) => None,
            HostData::Exclusive(bytes) => Some(bytes),
        }
    }
}
