//! CPU reference device running host kernels.
//!
//! Host kernels are plain Rust closures registered by entry point name in a
//! [`HostKernelTable`]. The "compiler" reads the `-D` option list back into a
//! define table the kernels can query, so a host kernel sees exactly the
//! constants a device program would be built with. A launch runs every work
//! item of the chunk in order and reports its wall time.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use bon::bon;
use bytemuck::Pod;
use sluice_codegen::{DefineValue, parse_build_options};
use sluice_device::error::{ArgumentAccessSnafu, ArgumentIndexSnafu, ElementOutOfBoundsSnafu, EntryPointNotFoundSnafu};
use sluice_device::{
    Buffer, CompiledProgram, Compiler, CpuAllocator, CpuEvent, Device, DeviceInfo, DeviceSpec, Event, ExecParams, Kernel,
    Program, ProgramSource, RawBuffer,
};
use snafu::{OptionExt, ensure};

use crate::error::{InvalidConfigSnafu, Result};

/// Body of a host kernel: called once per global id.
pub type HostKernelFn = Arc<dyn Fn(usize, &KernelArgs<'_>) -> sluice_device::Result<()> + Send + Sync>;

/// Host kernels by entry point name.
#[derive(Clone, Default)]
pub struct HostKernelTable {
    kernels: HashMap<String, HostKernelFn>,
}

impl fmt::Debug for HostKernelTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostKernelTable").field("entry_points", &self.names()).finish()
    }
}

impl HostKernelTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<F>(mut self, name: impl Into<String>, kernel: F) -> Self
    where
        F: Fn(usize, &KernelArgs<'_>) -> sluice_device::Result<()> + Send + Sync + 'static,
    {
        self.register(name, kernel);
        self
    }

    /// Register `kernel` under `name`, replacing any previous one.
    pub fn register<F>(&mut self, name: impl Into<String>, kernel: F)
    where
        F: Fn(usize, &KernelArgs<'_>) -> sluice_device::Result<()> + Send + Sync + 'static,
    {
        self.kernels.insert(name.into(), Arc::new(kernel));
    }

    pub fn get(&self, name: &str) -> Option<&HostKernelFn> {
        self.kernels.get(name)
    }

    /// Entry point names, sorted.
    pub fn names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.kernels.keys().cloned().collect();
        names.sort();
        names
    }
}

/// Build-time constants of a host program.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Defines {
    values: BTreeMap<String, DefineValue>,
}

impl Defines {
    pub fn get(&self, name: &str) -> Option<DefineValue> {
        self.values.get(name).copied()
    }

    pub fn is_defined(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    pub fn uint(&self, name: &str) -> Option<u64> {
        match self.get(name)? {
            DefineValue::UInt(v) => Some(v),
            _ => None,
        }
    }

    pub fn int(&self, name: &str) -> Option<i64> {
        match self.get(name)? {
            DefineValue::Int(v) => Some(v),
            DefineValue::UInt(v) => i64::try_from(v).ok(),
            _ => None,
        }
    }

    pub fn float(&self, name: &str) -> Option<f32> {
        match self.get(name)? {
            DefineValue::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Arguments of one host launch: the buffers in parameter order plus the defines.
pub struct KernelArgs<'a> {
    buffers: &'a [&'a Buffer],
    defines: &'a Defines,
}

impl<'a> KernelArgs<'a> {
    pub fn defines(&self) -> &Defines {
        self.defines
    }

    pub fn count(&self) -> usize {
        self.buffers.len()
    }

    fn slot(&self, index: usize) -> sluice_device::Result<&'a Buffer> {
        self.buffers.get(index).copied().context(ArgumentIndexSnafu { index, count: self.buffers.len() })
    }

    /// Number of elements of argument `index`.
    pub fn len(&self, index: usize) -> sluice_device::Result<usize> {
        Ok(self.slot(index)?.len())
    }

    /// Read element `element` of argument `index` as `T`.
    pub fn read<T: Pod>(&self, index: usize, element: usize) -> sluice_device::Result<T> {
        let buffer = self.slot(index)?;
        let data = host_bytes(buffer)?.borrow();
        let range = element_range::<T>(index, element, data.len())?;
        Ok(bytemuck::pod_read_unaligned(&data[range]))
    }

    /// Boolean arrays are stored one byte per element.
    pub fn read_bool(&self, index: usize, element: usize) -> sluice_device::Result<bool> {
        Ok(self.read::<u8>(index, element)? != 0)
    }

    /// Write `value` to element `element` of argument `index`.
    ///
    /// Read-only arguments reject writes with `ArgumentAccess`.
    pub fn write<T: Pod>(&self, index: usize, element: usize, value: T) -> sluice_device::Result<()> {
        let buffer = self.slot(index)?;
        ensure!(buffer.access().is_writable(), ArgumentAccessSnafu { index, access: buffer.access() });
        let mut data = host_bytes(buffer)?.borrow_mut();
        let range = element_range::<T>(index, element, data.len())?;
        data[range].copy_from_slice(bytemuck::bytes_of(&value));
        Ok(())
    }
}

fn element_range<T>(index: usize, element: usize, len: usize) -> sluice_device::Result<std::ops::Range<usize>> {
    let width = size_of::<T>();
    let offset = element.saturating_mul(width);
    let end = offset.saturating_add(width);
    ensure!(end <= len, ElementOutOfBoundsSnafu { index, offset, end, len });
    Ok(offset..end)
}

fn host_bytes(buffer: &Buffer) -> sluice_device::Result<&std::cell::RefCell<Box<[u8]>>> {
    match buffer.raw()? {
        RawBuffer::Cpu { data } => Ok(data),
        #[cfg(feature = "cuda")]
        RawBuffer::Cuda { .. } => {
            sluice_device::error::RuntimeSnafu { message: "host kernels need host memory" }.fail()
        }
    }
}

/// Compiler turning `-D` options into a define table.
#[derive(Debug)]
struct HostCompiler {
    kernels: Arc<HostKernelTable>,
    max_work_group_size: usize,
    profiling: bool,
}

impl Compiler for HostCompiler {
    fn compile(&self, source: &ProgramSource, options: &[String]) -> sluice_device::Result<CompiledProgram> {
        let parsed = parse_build_options(options)
            .map_err(|err| sluice_device::Error::BuildFailed { log: format!("{}: error: {err}", source.name) })?;

        let mut log = Vec::new();
        let mut values = BTreeMap::new();
        for define in parsed {
            if let Some(previous) = values.insert(define.name.clone(), define.value) {
                log.push(format!("{}: warning: `{}` redefined (was `{previous}`)", source.name, define.name));
            }
        }
        tracing::trace!(program = %source.name, fragments = source.fragments.len(), defines = values.len(), "built host program");

        let program = HostProgram {
            name: source.name.clone(),
            defines: Arc::new(Defines { values }),
            kernels: Arc::clone(&self.kernels),
            max_work_group_size: self.max_work_group_size,
            profiling: self.profiling,
        };
        Ok(CompiledProgram { program: Box::new(program), build_log: log.join("\n") })
    }
}

struct HostProgram {
    name: String,
    defines: Arc<Defines>,
    kernels: Arc<HostKernelTable>,
    max_work_group_size: usize,
    profiling: bool,
}

impl Program for HostProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_points(&self) -> Vec<String> {
        self.kernels.names()
    }

    fn kernel(&self, entry: &str) -> sluice_device::Result<Box<dyn Kernel>> {
        let func = self.kernels.get(entry).context(EntryPointNotFoundSnafu { name: entry, program: &self.name })?;
        Ok(Box::new(HostKernel {
            name: entry.to_string(),
            func: Arc::clone(func),
            defines: Arc::clone(&self.defines),
            max_work_group_size: self.max_work_group_size,
            profiling: self.profiling,
        }))
    }
}

struct HostKernel {
    name: String,
    func: HostKernelFn,
    defines: Arc<Defines>,
    max_work_group_size: usize,
    profiling: bool,
}

impl Kernel for HostKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, buffers: &[&Buffer], params: &ExecParams) -> sluice_device::Result<Box<dyn Event>> {
        params.validate(self.max_work_group_size)?;
        let args = KernelArgs { buffers, defines: &self.defines };

        let start = Instant::now();
        for gid in params.range_1d() {
            (self.func)(gid, &args)?;
        }
        let elapsed = self.profiling.then(|| start.elapsed());

        Ok(Box::new(CpuEvent::completed(elapsed)))
    }
}

/// Limits and behavior of the CPU device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CpuDeviceConfig {
    pub global_mem_size: usize,
    pub max_alloc_size: usize,
    pub max_work_group_size: usize,
    /// Record launch wall time. When off, every event reports no timing.
    pub profiling: bool,
}

#[bon]
impl CpuDeviceConfig {
    #[builder]
    pub fn new(
        #[builder(default = 4 << 30)] global_mem_size: usize,
        #[builder(default = 1 << 30)] max_alloc_size: usize,
        #[builder(default = 1024)] max_work_group_size: usize,
        #[builder(default = true)] profiling: bool,
    ) -> Result<Self> {
        ensure!(max_work_group_size > 0, InvalidConfigSnafu { reason: "max_work_group_size must be positive" });
        ensure!(
            max_alloc_size <= global_mem_size,
            InvalidConfigSnafu {
                reason: format!("max_alloc_size {max_alloc_size} exceeds global_mem_size {global_mem_size}")
            }
        );
        Ok(Self { global_mem_size, max_alloc_size, max_work_group_size, profiling })
    }
}

impl Default for CpuDeviceConfig {
    fn default() -> Self {
        Self { global_mem_size: 4 << 30, max_alloc_size: 1 << 30, max_work_group_size: 1024, profiling: true }
    }
}

/// Create a CPU device serving `kernels`.
pub fn create_cpu_device(config: CpuDeviceConfig, kernels: HostKernelTable) -> Device {
    let info = DeviceInfo {
        name: "host".to_string(),
        global_mem_size: config.global_mem_size,
        max_alloc_size: config.max_alloc_size,
        max_work_group_size: config.max_work_group_size,
    };
    let compiler = Arc::new(HostCompiler {
        kernels: Arc::new(kernels),
        max_work_group_size: config.max_work_group_size,
        profiling: config.profiling,
    });
    Device::new(DeviceSpec::Cpu, info, Box::new(CpuAllocator), compiler)
}
