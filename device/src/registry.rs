pub use sluice_dtype::DeviceSpec;

use crate::error::{InvalidDeviceSnafu, Result};

/// Environment variable read by [`DeviceSpecExt::from_env`].
pub const DEVICE_ENV_VAR: &str = "SLUICE_DEVICE";

/// Extension trait for DeviceSpec to add parsing functionality.
///
/// This is in the device crate because parsing depends on error types that are
/// device-specific.
pub trait DeviceSpecExt: Sized {
    /// Parse a device string into a DeviceSpec.
    ///
    /// Examples:
    /// - "CPU" -> DeviceSpec::Cpu
    /// - "CUDA:0" -> DeviceSpec::Cuda { device_id: 0 }
    /// - "cuda" / "gpu" -> DeviceSpec::Cuda { device_id: 0 }
    fn parse(s: &str) -> Result<Self>;

    /// Device named by `SLUICE_DEVICE`, or the CPU device when it is unset.
    ///
    /// Nothing in this workspace calls this implicitly; callers opt in and hand
    /// the result to the dispatcher.
    fn from_env() -> Result<Self>;
}

impl DeviceSpecExt for DeviceSpec {
    fn parse(s: &str) -> Result<Self> {
        let upper = s.trim().to_uppercase();
        let (base, ordinal) = match upper.split_once(':') {
            Some((base, ordinal)) => (base, Some(ordinal)),
            None => (upper.as_str(), None),
        };

        match (base, ordinal) {
            ("CPU", None) => Ok(DeviceSpec::Cpu),
            ("CUDA" | "GPU", None) => Ok(DeviceSpec::Cuda { device_id: 0 }),
            ("CUDA" | "GPU", Some(ordinal)) => match ordinal.parse() {
                Ok(device_id) => Ok(DeviceSpec::Cuda { device_id }),
                Err(_) => InvalidDeviceSnafu { device: s }.fail(),
            },
            _ => InvalidDeviceSnafu { device: s }.fail(),
        }
    }

    fn from_env() -> Result<Self> {
        match std::env::var(DEVICE_ENV_VAR) {
            Ok(value) if !value.trim().is_empty() => Self::parse(&value),
            _ => Ok(DeviceSpec::default()),
        }
    }
}
