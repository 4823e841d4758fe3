use test_case::test_case;

use crate::{DEVICE_ENV_VAR, DeviceSpec, DeviceSpecExt};

#[test_case("CPU", DeviceSpec::Cpu; "upper cpu")]
#[test_case("cpu", DeviceSpec::Cpu; "lower cpu")]
#[test_case("CUDA", DeviceSpec::Cuda { device_id: 0 }; "bare cuda")]
#[test_case("cuda:1", DeviceSpec::Cuda { device_id: 1 }; "cuda ordinal")]
#[test_case("GPU:2", DeviceSpec::Cuda { device_id: 2 }; "gpu alias")]
#[test_case(" CPU ", DeviceSpec::Cpu; "surrounding whitespace")]
fn test_parse_device(input: &str, expected: DeviceSpec) {
    assert_eq!(DeviceSpec::parse(input).unwrap(), expected);
}

#[test_case("TPU"; "unknown family")]
#[test_case("CUDA:x"; "bad ordinal")]
#[test_case("CPU:0"; "cpu has no ordinal")]
#[test_case(""; "empty")]
fn test_parse_rejects(input: &str) {
    assert!(matches!(DeviceSpec::parse(input), Err(crate::Error::InvalidDevice { .. })));
}

#[test]
fn test_from_env_is_opt_in() {
    // Only test in this crate that touches the variable.
    unsafe { std::env::remove_var(DEVICE_ENV_VAR) };
    assert_eq!(DeviceSpec::from_env().unwrap(), DeviceSpec::Cpu);

    unsafe { std::env::set_var(DEVICE_ENV_VAR, "cuda:3") };
    assert_eq!(DeviceSpec::from_env().unwrap(), DeviceSpec::Cuda { device_id: 3 });

    unsafe { std::env::set_var(DEVICE_ENV_VAR, "metal") };
    assert!(DeviceSpec::from_env().is_err());

    unsafe { std::env::remove_var(DEVICE_ENV_VAR) };
}
