//! Compute device selection.

use std::fmt;

/// Which compute device a dispatch runs on.
///
/// Selection is an explicit value handed to the dispatcher. The default is the
/// CPU reference device; `sluice_device::DeviceSpecExt::from_env` is available
/// for callers that want environment-driven selection.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum DeviceSpec {
    /// Host reference device.
    #[default]
    Cpu,
    /// CUDA device by ordinal.
    Cuda { device_id: usize },
}

impl DeviceSpec {
    /// Canonical string form, e.g. `"CPU"` or `"CUDA:1"`.
    pub fn canonicalize(&self) -> String {
        match self {
            DeviceSpec::Cpu => "CPU".to_string(),
            DeviceSpec::Cuda { device_id } => format!("CUDA:{device_id}"),
        }
    }

    /// Device family without the ordinal.
    pub fn base_type(&self) -> &'static str {
        match self {
            DeviceSpec::Cpu => "CPU",
            DeviceSpec::Cuda { .. } => "CUDA",
        }
    }

    pub fn is_cpu(&self) -> bool {
        matches!(self, DeviceSpec::Cpu)
    }
}

impl fmt::Display for DeviceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.canonicalize())
    }
}
