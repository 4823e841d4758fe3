//! Parameter record to build-macro specialization.

use snafu::ensure;

use crate::defines::{Define, is_identifier};
use crate::error::{InvalidParameterSnafu, Result};
use crate::params::{IntegrationParams, KdeParams, ParameterRecord};

/// Which macro table a program is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum JobType {
    /// Streamline tracing and everything built on it (mapping, counting, labeling).
    #[default]
    Integration,
    /// Kernel density estimation.
    Kde,
}

/// Sense of streamline integration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Direction {
    #[default]
    Downstream,
    Upstream,
}

impl Direction {
    pub const fn sign(self) -> i8 {
        match self {
            Self::Downstream => 1,
            Self::Upstream => -1,
        }
    }

    pub fn from_sign(sign: i64) -> Result<Self> {
        match sign {
            1 => Ok(Self::Downstream),
            -1 => Ok(Self::Upstream),
            other => InvalidParameterSnafu { field: "downup_sign", reason: format!("{other} is not +1 or -1") }.fail(),
        }
    }
}

/// Selector macro enabling one kernel entry point, e.g. `KERNEL_COUNT_DOWNCHANNELS`.
pub fn kernel_selector(kernel_name: &str) -> Result<Define> {
    ensure!(
        is_identifier(kernel_name),
        InvalidParameterSnafu { field: "kernel_name", reason: format!("`{kernel_name}` is not an identifier") }
    );
    Ok(Define::flag(format!("KERNEL_{}", kernel_name.to_uppercase())))
}

/// Produce the ordered build macros for `kernel_name`.
///
/// The list starts with the kernel selector, continues with every parameter of
/// the job's macro table in a fixed order, and ends with `DEBUG` when the record
/// asks for it. Any missing field fails here, before a device is touched.
/// `direction` only affects integration jobs.
pub fn specialize(
    record: &ParameterRecord,
    kernel_name: &str,
    job_type: JobType,
    direction: Direction,
) -> Result<Vec<Define>> {
    let selector = kernel_selector(kernel_name)?;
    let defines = match job_type {
        JobType::Integration => integration_defines(selector, &IntegrationParams::from_record(record)?, direction),
        JobType::Kde => kde_defines(selector, &KdeParams::from_record(record)?)?,
    };

    tracing::debug!(kernel.name = %kernel_name, job = ?job_type, direction = direction.sign(), defines = defines.len(), "specialized kernel");
    Ok(defines)
}

pub fn integration_defines(selector: Define, p: &IntegrationParams, direction: Direction) -> Vec<Define> {
    let sign = direction.sign();
    let mut d = Vec::with_capacity(51);
    d.push(selector);
    d.push(Define::uint("N_SEED_POINTS", p.n_seed_points));
    d.push(Define::int("DOWNUP_SIGN", sign));
    d.push(Define::float("INTEGRATOR_STEP_FACTOR", p.integrator_step_factor));
    d.push(Define::float("MAX_INTEGRATION_STEP_ERROR", p.max_integration_step_error));
    d.push(Define::float("ADJUSTED_MAX_ERROR", p.adjusted_max_error));
    d.push(Define::float("MAX_LENGTH", p.max_length));
    d.push(Define::float("PIXEL_SIZE", p.pixel_size));
    d.push(Define::float("INTEGRATION_HALT_THRESHOLD", p.integration_halt_threshold));
    d.push(Define::uint("PAD_WIDTH", p.pad_width));
    d.push(Define::float("PAD_WIDTH_PP5", p.pad_width_pp5));
    d.push(Define::uint("NX", p.nx));
    d.push(Define::uint("NY", p.ny));
    d.push(Define::float("NXF", p.nxf));
    d.push(Define::float("NYF", p.nyf));
    d.push(Define::uint("NX_PADDED", p.nx_padded));
    d.push(Define::uint("NY_PADDED", p.ny_padded));
    d.push(Define::uint("NXY_PADDED", p.nxy_padded));
    d.push(Define::float("X_MAX", p.x_max));
    d.push(Define::float("Y_MAX", p.y_max));
    d.push(Define::float("GRID_SCALE", p.grid_scale));
    d.push(Define::float("COMBO_FACTOR", p.combo_factor * f64::from(sign)));
    d.push(Define::float("DT_MAX", p.dt_max));
    d.push(Define::uint("MAX_N_STEPS", p.max_n_steps));
    d.push(Define::uint("TRAJECTORY_RESOLUTION", p.trajectory_resolution));
    d.push(Define::uint("SEEDS_CHUNK_OFFSET", p.seeds_chunk_offset));
    d.push(Define::uint("SUBPIXEL_SEED_POINT_DENSITY", p.subpixel_seed_point_density));
    d.push(Define::float("SUBPIXEL_SEED_HALFSPAN", p.subpixel_seed_halfspan));
    d.push(Define::float("SUBPIXEL_SEED_STEP", p.subpixel_seed_step));
    d.push(Define::float("JITTER_MAGNITUDE", p.jitter_magnitude));
    d.push(Define::uint("INTERCHANNEL_MAX_N_STEPS", p.interchannel_max_n_steps));
    d.push(Define::uint("SEGMENTATION_THRESHOLD", p.segmentation_threshold));
    d.push(Define::uint("LEFT_FLANK_ADDITION", p.left_flank_addition));
    for (field, bit) in p.flags.entries() {
        d.push(Define::uint(field.to_uppercase(), bit));
    }
    if p.debug {
        d.push(Define::flag("DEBUG"));
    }
    d
}

pub fn kde_defines(selector: Define, p: &KdeParams) -> Result<Vec<Define>> {
    ensure!(
        is_identifier(&p.kdf_kernel),
        InvalidParameterSnafu { field: "kdf_kernel", reason: format!("`{}` is not an identifier", p.kdf_kernel) }
    );

    let mut d = Vec::with_capacity(21);
    d.push(selector);
    d.push(Define::float("KDF_BANDWIDTH", p.kdf_bandwidth));
    d.push(Define::flag(format!("KDF_IS_{}", p.kdf_kernel.to_uppercase())));
    d.push(Define::uint("N_DATA", p.n_data));
    d.push(Define::uint("N_HIST_BINS", p.n_hist_bins));
    d.push(Define::uint("N_PDF_POINTS", p.n_pdf_points));
    d.push(Define::float("X_MIN", p.x_min));
    d.push(Define::float("X_MAX", p.x_max));
    d.push(Define::float("X_RANGE", p.x_range));
    d.push(Define::float("BIN_DX", p.bin_dx));
    d.push(Define::float("PDF_DX", p.pdf_dx));
    d.push(Define::float("KDF_WIDTH_X", p.kdf_width_x));
    d.push(Define::uint("N_KDF_PART_POINTS_X", p.n_kdf_part_points_x));
    d.push(Define::float("Y_MIN", p.y_min));
    d.push(Define::float("Y_MAX", p.y_max));
    d.push(Define::float("Y_RANGE", p.y_range));
    d.push(Define::float("BIN_DY", p.bin_dy));
    d.push(Define::float("PDF_DY", p.pdf_dy));
    d.push(Define::float("KDF_WIDTH_Y", p.kdf_width_y));
    d.push(Define::uint("N_KDF_PART_POINTS_Y", p.n_kdf_part_points_y));
    if p.debug {
        d.push(Define::flag("DEBUG"));
    }
    Ok(d)
}
