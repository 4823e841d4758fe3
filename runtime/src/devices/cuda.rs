//! CUDA device: NVRTC compilation and stream launches.
//!
//! CUDA has no global work offset, so every kernel receives the chunk offset as
//! a trailing `unsigned int` parameter and adds it to its global id. Launch
//! time comes from a start/end event pair recorded around the launch.

use std::sync::Arc;

use cudarc::driver::sys::{CUdevice_attribute, CUevent_flags};
use cudarc::driver::{CudaContext, CudaFunction, CudaModule, CudaStream, LaunchConfig, PushKernelArg};
use cudarc::nvrtc::{CompileError, CompileOptions, compile_ptx_with_opts};
use sluice_device::error::{CudaSnafu, InvalidLaunchSnafu, RuntimeSnafu};
use sluice_device::{
    Buffer, CompiledProgram, Compiler, CudaAllocator, CudaLaunchEvent, Device, DeviceInfo, DeviceSpec, Event,
    ExecParams, Kernel, Program, ProgramSource, RawBuffer,
};
use snafu::{OptionExt, ResultExt};

use crate::error::{DeviceSnafu, Result};

#[derive(Debug)]
struct NvrtcCompiler {
    context: Arc<CudaContext>,
    stream: Arc<CudaStream>,
    max_work_group_size: usize,
}

impl Compiler for NvrtcCompiler {
    fn compile(&self, source: &ProgramSource, options: &[String]) -> sluice_device::Result<CompiledProgram> {
        let opts = CompileOptions { options: options.to_vec(), ..Default::default() };
        let ptx = compile_ptx_with_opts(source.render(), opts).map_err(|err| sluice_device::Error::BuildFailed {
            log: match err {
                CompileError::CompileError { log, .. } => log.to_string_lossy().into_owned(),
                other => other.to_string(),
            },
        })?;

        let text = ptx.to_src();
        let entry_points = text
            .lines()
            .filter_map(|line| line.split_once(".entry ").map(|(_, rest)| rest))
            .map(|rest| rest.trim_end_matches(|c: char| c == '(' || c.is_whitespace()).to_string())
            .collect();
        let module = self.context.load_module(ptx).context(CudaSnafu)?;
        tracing::trace!(program = %source.name, "loaded CUDA module");

        let program = CudaProgram {
            name: source.name.clone(),
            module,
            entry_points,
            stream: Arc::clone(&self.stream),
            max_work_group_size: self.max_work_group_size,
        };
        Ok(CompiledProgram { program: Box::new(program), build_log: String::new() })
    }
}

struct CudaProgram {
    name: String,
    module: Arc<CudaModule>,
    entry_points: Vec<String>,
    stream: Arc<CudaStream>,
    max_work_group_size: usize,
}

impl Program for CudaProgram {
    fn name(&self) -> &str {
        &self.name
    }

    fn entry_points(&self) -> Vec<String> {
        self.entry_points.clone()
    }

    fn kernel(&self, entry: &str) -> sluice_device::Result<Box<dyn Kernel>> {
        let function = self.module.load_function(entry).map_err(|_| sluice_device::Error::EntryPointNotFound {
            name: entry.to_string(),
            program: self.name.clone(),
        })?;
        Ok(Box::new(CudaKernel {
            name: entry.to_string(),
            function,
            stream: Arc::clone(&self.stream),
            max_work_group_size: self.max_work_group_size,
        }))
    }
}

struct CudaKernel {
    name: String,
    function: CudaFunction,
    stream: Arc<CudaStream>,
    max_work_group_size: usize,
}

impl Kernel for CudaKernel {
    fn name(&self) -> &str {
        &self.name
    }

    fn launch(&self, buffers: &[&Buffer], params: &ExecParams) -> sluice_device::Result<Box<dyn Event>> {
        params.validate(self.max_work_group_size)?;
        let offset = u32::try_from(params.global_offset[0])
            .ok()
            .context(InvalidLaunchSnafu { message: "chunk offset exceeds 32 bits" })?;
        let config = LaunchConfig {
            grid_dim: ((params.global_size[0] / params.local_size[0]) as u32, 1, 1),
            block_dim: (params.local_size[0] as u32, 1, 1),
            shared_mem_bytes: 0,
        };

        let slices = buffers
            .iter()
            .map(|buffer| match buffer.raw()? {
                RawBuffer::Cuda { data, .. } => Ok(data.borrow()),
                RawBuffer::Cpu { .. } => RuntimeSnafu { message: "CUDA kernels need device memory" }.fail(),
            })
            .collect::<sluice_device::Result<Vec<_>>>()?;

        let timing = Some(CUevent_flags::CU_EVENT_DEFAULT);
        let start = self.stream.record_event(timing).context(CudaSnafu)?;
        let mut builder = self.stream.launch_builder(&self.function);
        for slice in &slices {
            builder.arg(&**slice);
        }
        builder.arg(&offset);
        unsafe { builder.launch(config) }.context(CudaSnafu)?;
        let end = self.stream.record_event(timing).context(CudaSnafu)?;

        Ok(Box::new(CudaLaunchEvent::new(start, end)))
    }
}

/// Create a CUDA device on GPU `device_id`, using its default stream as the
/// single ordered queue.
pub fn create_cuda_device(device_id: usize) -> Result<Device> {
    let allocator = CudaAllocator::new(device_id).context(DeviceSnafu)?;
    let context = Arc::clone(allocator.context());
    let stream = Arc::clone(allocator.stream());

    context.bind_to_thread().context(CudaSnafu).context(DeviceSnafu)?;
    let (_, total) = cudarc::driver::result::mem_get_info().context(CudaSnafu).context(DeviceSnafu)?;
    let max_threads = context
        .attribute(CUdevice_attribute::CU_DEVICE_ATTRIBUTE_MAX_THREADS_PER_BLOCK)
        .context(CudaSnafu)
        .context(DeviceSnafu)?;
    let name = context.name().unwrap_or_else(|_| format!("CUDA:{device_id}"));

    let info = DeviceInfo {
        name,
        global_mem_size: total,
        max_alloc_size: total,
        max_work_group_size: usize::try_from(max_threads).unwrap_or(1),
    };
    let compiler = Arc::new(NvrtcCompiler { context, stream, max_work_group_size: info.max_work_group_size });
    Ok(Device::new(DeviceSpec::Cuda { device_id }, info, Box::new(allocator), compiler))
}
