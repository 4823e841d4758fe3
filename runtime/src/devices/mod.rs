//! Device implementations for different backends.

pub mod cpu;
#[cfg(feature = "cuda")]
pub mod cuda;

pub use cpu::{CpuDeviceConfig, Defines, HostKernelFn, HostKernelTable, KernelArgs, create_cpu_device};
#[cfg(feature = "cuda")]
pub use cuda::create_cuda_device;

use sluice_device::{Device, DeviceSpec};

use crate::error::Result;

/// Open the device named by `spec`.
///
/// `CPU` serves `kernels` with the default [`CpuDeviceConfig`]; `CUDA:n`
/// compiles programs with NVRTC and ignores `kernels`. A build without the
/// `cuda` feature rejects CUDA devices.
pub fn open(spec: &DeviceSpec, kernels: HostKernelTable) -> Result<Device> {
    match spec {
        DeviceSpec::Cpu => Ok(create_cpu_device(CpuDeviceConfig::default(), kernels)),
        #[cfg(feature = "cuda")]
        DeviceSpec::Cuda { device_id } => create_cuda_device(*device_id),
        #[cfg(not(feature = "cuda"))]
        DeviceSpec::Cuda { .. } => {
            crate::error::InvalidConfigSnafu { reason: format!("{spec} requested but built without CUDA support") }.fail()
        }
    }
}
