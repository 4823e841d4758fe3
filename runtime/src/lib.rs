//! Adaptive dispatch of chunked compute jobs.
//!
//! A job launches one kernel entry point over a work domain of seed points.
//! The [`Dispatcher`] specializes the program from a parameter record, stages
//! the caller's arrays on the device, and launches the domain in chunks sized
//! so that each launch stays under a time budget. Results are read back into
//! the caller's arrays only once every chunk has completed.
//!
//! Two backends are provided: a CPU reference device running Rust host
//! kernels, and (with the `cuda` feature) an NVRTC-compiled CUDA device.
//!
//! # Example
//!
//! ```ignore
//! use sluice_runtime::{DispatchConfig, Dispatcher, HostKernelTable, NamedArray, jobs};
//!
//! let kernels = HostKernelTable::new().with("map_channel_heads", |gid, args| {
//!     let [row, col] = args.read::<[f32; 2]>(0, gid)?;
//!     // ...
//!     Ok(())
//! });
//! let device = Arc::new(sluice_runtime::devices::open(&DeviceSpec::Cpu, kernels)?);
//! let dispatcher = Dispatcher::new(device, DispatchConfig::default());
//!
//! let job = jobs::builtin("map_channel_heads").unwrap();
//! let query = job.seed_query(&record, shape, &mask, &mapping_in, pad)?;
//! let mut arrays = [
//!     NamedArray::read_only("mask", &mask),
//!     NamedArray::read_only("uv", &uv),
//!     NamedArray::read_write("mapping", &mut mapping),
//! ];
//! let report = dispatcher.run(&job, &query, &SeedOptions::default(), &record, &mut arrays)?;
//! ```

pub mod arrays;
pub mod devices;
pub mod dispatch;
pub mod error;
pub mod jobs;
pub mod staging;


pub use arrays::NamedArray;
pub use devices::{CpuDeviceConfig, Defines, HostKernelFn, HostKernelTable, KernelArgs, create_cpu_device};
pub use dispatch::{ChunkRecord, DispatchConfig, DispatchReport, Dispatcher};
pub use error::*;
pub use jobs::{ArgRole, ArgSpec, JobSpec, KernelSignature, SeedRule};
pub use staging::{StagedBuffer, StagedBuffers};
