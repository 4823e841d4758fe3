//! Device abstraction: one compute device with its allocator and program compiler.
//!
//! A [`Device`] owns:
//! - **Allocator**: device memory for staged buffers, wrapped in allocation accounting
//! - **Compiler**: turns a [`ProgramSource`] plus `-D NAME=value` options into a [`Program`]
//!
//! Programs expose named entry points as [`Kernel`]s; each launch returns an
//! [`Event`] carrying completion and profiling time.

use std::fmt;
use std::sync::Arc;

use sluice_dtype::DeviceSpec;

use crate::allocator::{AllocationStats, Allocator, TrackingAllocator};
use crate::buffer::Buffer;
use crate::error::Result;
use crate::queue::ExecParams;
use crate::sync::Event;

/// One named piece of kernel source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceFragment {
    pub name: String,
    pub text: String,
}

/// Kernel program source assembled from named fragments.
///
/// Fragments are concatenated in order; the device compiler sees one translation unit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProgramSource {
    pub name: String,
    pub fragments: Vec<SourceFragment>,
}

impl ProgramSource {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), fragments: Vec::new() }
    }

    pub fn with_fragment(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.push(name, text);
        self
    }

    pub fn push(&mut self, name: impl Into<String>, text: impl Into<String>) {
        self.fragments.push(SourceFragment { name: name.into(), text: text.into() });
    }

    pub fn fragment_names(&self) -> impl Iterator<Item = &str> {
        self.fragments.iter().map(|f| f.name.as_str())
    }

    /// The concatenated translation unit.
    pub fn render(&self) -> String {
        let mut out = String::with_capacity(self.fragments.iter().map(|f| f.text.len() + 1).sum());
        for fragment in &self.fragments {
            out.push_str(&fragment.text);
            if !fragment.text.ends_with('\n') {
                out.push('\n');
            }
        }
        out
    }
}

/// Output of a successful build. A non-empty `build_log` carries warnings.
pub struct CompiledProgram {
    pub program: Box<dyn Program>,
    pub build_log: String,
}

impl fmt::Debug for CompiledProgram {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledProgram").field("program", &self.program.name()).field("build_log", &self.build_log).finish()
    }
}

/// A compiler that builds program source into an executable program.
///
/// Build errors are reported as `Error::BuildFailed` with the raw compiler log.
pub trait Compiler: Send + Sync {
    fn compile(&self, source: &ProgramSource, options: &[String]) -> Result<CompiledProgram>;
}

/// A built program holding one or more entry points.
///
/// Programs are used from the thread that built them and need not be `Send`.
pub trait Program {
    fn name(&self) -> &str;

    fn entry_points(&self) -> Vec<String>;

    /// Look up an entry point. Fails with `Error::EntryPointNotFound` when absent.
    fn kernel(&self, entry: &str) -> Result<Box<dyn Kernel>>;
}

/// A launchable entry point.
pub trait Kernel {
    fn name(&self) -> &str;

    /// Enqueue one launch over `params`, passing `buffers` in kernel parameter order.
    fn launch(&self, buffers: &[&Buffer], params: &ExecParams) -> Result<Box<dyn Event>>;
}

/// Capacity limits a dispatch is checked against before it allocates.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceInfo {
    pub name: String,
    /// Total device memory in bytes.
    pub global_mem_size: usize,
    /// Largest single allocation in bytes.
    pub max_alloc_size: usize,
    pub max_work_group_size: usize,
}

/// A device that owns an allocator and a compiler.
pub struct Device {
    pub spec: DeviceSpec,
    pub info: DeviceInfo,
    /// Memory allocator for this device, with allocation accounting.
    pub allocator: Arc<dyn Allocator>,
    pub compiler: Arc<dyn Compiler>,
}

impl fmt::Debug for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Device").field("spec", &self.spec).field("info", &self.info).finish_non_exhaustive()
    }
}

impl Device {
    pub fn new(spec: DeviceSpec, info: DeviceInfo, allocator: Box<dyn Allocator>, compiler: Arc<dyn Compiler>) -> Self {
        tracing::debug!(
            device = %spec,
            device.name = %info.name,
            global_mem_size = info.global_mem_size,
            max_alloc_size = info.max_alloc_size,
            max_work_group_size = info.max_work_group_size,
            "device created"
        );
        let allocator: Arc<dyn Allocator> = Arc::new(TrackingAllocator::new(allocator));
        Self { spec, info, allocator, compiler }
    }

    /// Base device key without the ordinal, e.g. `"CUDA"` for `CUDA:1`.
    pub fn base_device_key(&self) -> &'static str {
        self.spec.base_type()
    }

    pub fn allocation_stats(&self) -> AllocationStats {
        self.allocator.stats().unwrap_or_default()
    }

    /// Block until every queued copy and launch has completed.
    pub fn synchronize(&self) -> Result<()> {
        self.allocator.synchronize()
    }
}
