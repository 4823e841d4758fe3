use std::sync::Arc;

use sluice_dtype::{DType, DeviceSpec};

use crate::{
    Buffer, BufferOptions, CompiledProgram, Compiler, CpuAllocator, Device, DeviceInfo, ProgramSource, Result,
};

struct RejectingCompiler;

impl Compiler for RejectingCompiler {
    fn compile(&self, source: &ProgramSource, _options: &[String]) -> Result<CompiledProgram> {
        crate::error::BuildFailedSnafu { log: format!("cannot build {}", source.name) }.fail()
    }
}

fn device() -> Device {
    let info = DeviceInfo { name: "test".into(), global_mem_size: 1 << 20, max_alloc_size: 1 << 18, max_work_group_size: 64 };
    Device::new(DeviceSpec::Cpu, info, Box::new(CpuAllocator), Arc::new(RejectingCompiler))
}

#[test]
fn test_device_tracks_allocations() {
    let device = device();
    assert_eq!(device.base_device_key(), "CPU");

    let buffer = Buffer::allocate(device.allocator.clone(), DType::Float32, vec![8], BufferOptions::default()).unwrap();
    assert_eq!(device.allocation_stats().live_bytes, 32);

    drop(buffer);
    assert_eq!(device.allocation_stats().live_bytes, 0);
    device.synchronize().unwrap();
}

#[test]
fn test_build_failure_carries_log() {
    let device = device();
    let source = ProgramSource::new("demo").with_fragment("a.cl", "kernel");
    match device.compiler.compile(&source, &[]) {
        Err(crate::Error::BuildFailed { log }) => assert_eq!(log, "cannot build demo"),
        other => panic!("unexpected: {:?}", other.map(|p| p.build_log)),
    }
}

#[test]
fn test_program_source_renders_in_order() {
    let mut source = ProgramSource::new("demo").with_fragment("a.cl", "int a;").with_fragment("b.cl", "int b;\n");
    source.push("c.cl", "int c;");

    assert_eq!(source.fragment_names().collect::<Vec<_>>(), ["a.cl", "b.cl", "c.cl"]);
    assert_eq!(source.render(), "int a;\nint b;\nint c;\n");
}
