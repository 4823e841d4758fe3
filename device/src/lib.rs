//! Device layer: memory, programs and launches for one compute device.

pub mod allocator;
pub mod buffer;
pub mod device;
pub mod error;
pub mod queue;
pub mod registry;
pub mod sync;


#[cfg(feature = "cuda")]
pub use allocator::CudaAllocator;
pub use allocator::{AccessMode, AllocationStats, Allocator, BufferOptions, CpuAllocator, RawBuffer, TrackingAllocator};
pub use buffer::Buffer;
pub use device::{CompiledProgram, Compiler, Device, DeviceInfo, Kernel, Program, ProgramSource, SourceFragment};
pub use error::{Error, Result};
pub use queue::ExecParams;
pub use registry::{DEVICE_ENV_VAR, DeviceSpec, DeviceSpecExt};
#[cfg(feature = "cuda")]
pub use sync::cuda::CudaLaunchEvent;
pub use sync::{CpuEvent, Event};
