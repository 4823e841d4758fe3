//! Error types for dispatch.
//!
//! The variants keep "nothing to do" ([`Error::EmptyWorkDomain`]) apart from
//! configuration problems raised before any device work and from compute
//! failures (`BuildFailure`, `LaunchFailure`).

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// No work item satisfies the seed predicate. Nothing was allocated.
    #[snafu(display("work domain is empty: nothing to dispatch"))]
    EmptyWorkDomain,

    /// A field the kernel program needs is absent from the parameter record.
    #[snafu(display("missing parameter `{field}`"))]
    MissingParameter { field: String },

    #[snafu(display("specialization failed: {source}"))]
    Codegen { source: sluice_codegen::Error },

    #[snafu(display("seed selection failed: {source}"))]
    Schedule { source: sluice_schedule::Error },

    /// The device compiler rejected the program; `log` is its raw diagnostic.
    #[snafu(display("kernel build failed:\n{log}"))]
    BuildFailure { log: String },

    #[snafu(display("launch of chunk [{offset}, {}) failed: {source}", offset + size))]
    LaunchFailure { offset: usize, size: usize, source: sluice_device::Error },

    #[snafu(display("staging `{name}` failed: {source}"))]
    Staging { name: String, source: sluice_device::Error },

    #[snafu(display("{what} needs {requested} bytes, device allows {limit}"))]
    OutOfDeviceMemory { what: String, requested: usize, limit: usize },

    /// Caller arrays do not match the kernel's parameter list.
    #[snafu(display("arguments do not match kernel `{kernel}`: {reason}"))]
    ArgumentMismatch { kernel: String, reason: String },

    #[snafu(display("array `{name}` is supplied twice"))]
    DuplicateArray { name: String },

    #[snafu(display("grid array `{name}` holds {actual} elements, padded grid has {expected}"))]
    GridSizeMismatch { name: String, expected: usize, actual: usize },

    #[snafu(display("array `{name}` is empty"))]
    InvalidBufferSize { name: String },

    #[snafu(display("invalid configuration: {reason}"))]
    InvalidConfig { reason: String },

    #[snafu(display("dispatch exceeded the limit of {limit} chunks"))]
    ChunkLimitExceeded { limit: usize },

    #[snafu(display("device error: {source}"))]
    Device { source: sluice_device::Error },
}

impl Error {
    /// True when the call had nothing to do, as opposed to failing.
    pub fn is_no_work(&self) -> bool {
        matches!(self, Self::EmptyWorkDomain)
    }
}

impl From<sluice_codegen::Error> for Error {
    fn from(source: sluice_codegen::Error) -> Self {
        match source {
            sluice_codegen::Error::MissingParameter { field } => Self::MissingParameter { field },
            source => Self::Codegen { source },
        }
    }
}

impl From<sluice_schedule::Error> for Error {
    fn from(source: sluice_schedule::Error) -> Self {
        match source {
            sluice_schedule::Error::EmptyWorkDomain => Self::EmptyWorkDomain,
            source => Self::Schedule { source },
        }
    }
}

impl From<sluice_device::Error> for Error {
    fn from(source: sluice_device::Error) -> Self {
        match source {
            sluice_device::Error::BuildFailed { log } => Self::BuildFailure { log },
            source => Self::Device { source },
        }
    }
}
