use snafu::Snafu;

use crate::allocator::AccessMode;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    #[snafu(display("size mismatch: expected {expected}, got {actual}"))]
    SizeMismatch { expected: usize, actual: usize },

    /// Invalid device specification.
    #[snafu(display("invalid device: {device}"))]
    InvalidDevice { device: String },

    /// Buffer is not allocated.
    #[snafu(display("buffer not allocated"))]
    NotAllocated,

    /// Zero-sized or otherwise unusable allocation request.
    #[snafu(display("invalid buffer size: {size} bytes"))]
    InvalidBufferSize { size: usize },

    /// Program failed to build; `log` carries the compiler diagnostics verbatim.
    #[snafu(display("program build failed:\n{log}"))]
    BuildFailed { log: String },

    #[snafu(display("entry point `{name}` not found in program `{program}`"))]
    EntryPointNotFound { name: String, program: String },

    #[snafu(display("launch geometry rejected: {message}"))]
    InvalidLaunch { message: String },

    /// Kernel touched an argument slot it has no access to.
    #[snafu(display("argument {index} is {access} and cannot be written"))]
    ArgumentAccess { index: usize, access: AccessMode },

    #[snafu(display("argument {index} out of range: kernel received {count} buffers"))]
    ArgumentIndex { index: usize, count: usize },

    #[snafu(display("element access at byte {offset}..{end} exceeds argument {index} of {len} bytes"))]
    ElementOutOfBounds { index: usize, offset: usize, end: usize, len: usize },

    #[snafu(display("runtime error: {message}"))]
    Runtime { message: String },

    #[cfg(feature = "cuda")]
    /// CUDA-specific errors.
    #[snafu(display("CUDA error: {source}"))]
    Cuda { source: cudarc::driver::DriverError },
}
