//! Parameter records and their typed per-job views.
//!
//! A [`ParameterRecord`] is the flat `name -> scalar` mapping shared by the
//! specializer and the kernel. The typed views ([`IntegrationParams`],
//! [`KdeParams`], [`SchedulerTuning`]) enumerate which fields each job needs,
//! apply defaults for optional ones, and validate everything once, before any
//! device resource is touched.

use std::collections::BTreeMap;
use std::fmt;

use bon::bon;
use snafu::{OptionExt, ensure};

use crate::error::{InvalidParameterSnafu, MissingParameterSnafu, Result};

/// One scalar field of a parameter record.
#[derive(Debug, Clone, PartialEq)]
pub enum ParamValue {
    UInt(u64),
    Int(i64),
    Float(f64),
    Bool(bool),
    Text(String),
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UInt(v) => write!(f, "{v}"),
            Self::Int(v) => write!(f, "{v}"),
            Self::Float(v) => write!(f, "{v}"),
            Self::Bool(v) => write!(f, "{v}"),
            Self::Text(v) => f.write_str(v),
        }
    }
}

macro_rules! impl_param_from {
    ($($ty:ty => $variant:ident as $as:ty),* $(,)?) => {
        $(
            impl From<$ty> for ParamValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value as $as)
                }
            }
        )*
    };
}

impl_param_from! {
    u8 => UInt as u64, u16 => UInt as u64, u32 => UInt as u64, u64 => UInt as u64, usize => UInt as u64,
    i8 => Int as i64, i16 => Int as i64, i32 => Int as i64, i64 => Int as i64,
    f32 => Float as f64, f64 => Float as f64,
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Flat mapping from field names to scalar values.
///
/// Iteration order is by name, so anything derived from a record is deterministic.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParameterRecord {
    fields: BTreeMap<String, ParamValue>,
}

impl ParameterRecord {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a field, returning the previous value.
    pub fn set(&mut self, field: impl Into<String>, value: impl Into<ParamValue>) -> Option<ParamValue> {
        self.fields.insert(field.into(), value.into())
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.set(field, value);
        self
    }

    pub fn get(&self, field: &str) -> Option<&ParamValue> {
        self.fields.get(field)
    }

    pub fn contains(&self, field: &str) -> bool {
        self.fields.contains_key(field)
    }

    pub fn remove(&mut self, field: &str) -> Option<ParamValue> {
        self.fields.remove(field)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ParamValue)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    fn require(&self, field: &str) -> Result<&ParamValue> {
        self.fields.get(field).context(MissingParameterSnafu { field })
    }

    /// Non-negative integer field. Integral floats and booleans are accepted.
    pub fn uint(&self, field: &str) -> Result<u64> {
        match self.require(field)? {
            ParamValue::UInt(v) => Ok(*v),
            ParamValue::Int(v) => u64::try_from(*v)
                .map_err(|_| InvalidParameterSnafu { field, reason: format!("{v} is negative") }.build()),
            ParamValue::Bool(v) => Ok(u64::from(*v)),
            ParamValue::Float(v) if v.fract() == 0.0 && *v >= 0.0 && *v <= u64::MAX as f64 => Ok(*v as u64),
            other => InvalidParameterSnafu { field, reason: format!("{other} is not an unsigned integer") }.fail(),
        }
    }

    /// Unsigned field that must fit 32 bits, e.g. a pixel-class bit flag.
    pub fn uint32(&self, field: &str) -> Result<u32> {
        let value = self.uint(field)?;
        u32::try_from(value).map_err(|_| InvalidParameterSnafu { field, reason: format!("{value} exceeds 32 bits") }.build())
    }

    pub fn int(&self, field: &str) -> Result<i64> {
        match self.require(field)? {
            ParamValue::Int(v) => Ok(*v),
            ParamValue::UInt(v) => i64::try_from(*v)
                .map_err(|_| InvalidParameterSnafu { field, reason: format!("{v} overflows i64") }.build()),
            ParamValue::Bool(v) => Ok(i64::from(*v)),
            ParamValue::Float(v) if v.fract() == 0.0 && v.abs() <= i64::MAX as f64 => Ok(*v as i64),
            other => InvalidParameterSnafu { field, reason: format!("{other} is not an integer") }.fail(),
        }
    }

    /// Numeric field that must be representable as a finite single-precision float.
    pub fn float(&self, field: &str) -> Result<f64> {
        let value = match self.require(field)? {
            ParamValue::Float(v) => *v,
            ParamValue::UInt(v) => *v as f64,
            ParamValue::Int(v) => *v as f64,
            other => return InvalidParameterSnafu { field, reason: format!("{other} is not a number") }.fail(),
        };
        ensure!(
            (value as f32).is_finite(),
            InvalidParameterSnafu { field, reason: format!("{value} is not a finite single-precision number") }
        );
        Ok(value)
    }

    pub fn flag(&self, field: &str) -> Result<bool> {
        match self.require(field)? {
            ParamValue::Bool(v) => Ok(*v),
            ParamValue::UInt(v) => Ok(*v != 0),
            ParamValue::Int(v) => Ok(*v != 0),
            other => InvalidParameterSnafu { field, reason: format!("{other} is not a flag") }.fail(),
        }
    }

    pub fn text(&self, field: &str) -> Result<&str> {
        match self.require(field)? {
            ParamValue::Text(v) => Ok(v),
            other => InvalidParameterSnafu { field, reason: format!("{other} is not text") }.fail(),
        }
    }

    /// Optional flag, `false` when absent.
    pub fn flag_or_default(&self, field: &str) -> Result<bool> {
        if self.contains(field) { self.flag(field) } else { Ok(false) }
    }

    fn uint_or(&self, field: &str, default: u64) -> Result<u64> {
        if self.contains(field) { self.uint(field) } else { Ok(default) }
    }

    fn float_or(&self, field: &str, default: f64) -> Result<f64> {
        if self.contains(field) { self.float(field) } else { Ok(default) }
    }
}

impl<K: Into<String>, V: Into<ParamValue>> FromIterator<(K, V)> for ParameterRecord {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { fields: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

/// Pixel-class bit flags shared by the classification array and the kernels.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClassFlags {
    pub is_channel: u32,
    pub is_thinchannel: u32,
    pub is_interchannel: u32,
    pub is_channelhead: u32,
    pub is_channeltail: u32,
    pub is_majorconfluence: u32,
    pub is_minorconfluence: u32,
    pub is_majorinflow: u32,
    pub is_minorinflow: u32,
    pub is_leftflank: u32,
    pub is_rightflank: u32,
    pub is_midslope: u32,
    pub is_ridge: u32,
    pub was_channelhead: u32,
    pub is_loop: u32,
    pub is_blockage: u32,
}

impl ClassFlags {
    /// Record field names in macro order.
    pub const FIELDS: [&'static str; 16] = [
        "is_channel",
        "is_thinchannel",
        "is_interchannel",
        "is_channelhead",
        "is_channeltail",
        "is_majorconfluence",
        "is_minorconfluence",
        "is_majorinflow",
        "is_minorinflow",
        "is_leftflank",
        "is_rightflank",
        "is_midslope",
        "is_ridge",
        "was_channelhead",
        "is_loop",
        "is_blockage",
    ];

    pub fn from_record(record: &ParameterRecord) -> Result<Self> {
        Ok(Self {
            is_channel: record.uint32("is_channel")?,
            is_thinchannel: record.uint32("is_thinchannel")?,
            is_interchannel: record.uint32("is_interchannel")?,
            is_channelhead: record.uint32("is_channelhead")?,
            is_channeltail: record.uint32("is_channeltail")?,
            is_majorconfluence: record.uint32("is_majorconfluence")?,
            is_minorconfluence: record.uint32("is_minorconfluence")?,
            is_majorinflow: record.uint32("is_majorinflow")?,
            is_minorinflow: record.uint32("is_minorinflow")?,
            is_leftflank: record.uint32("is_leftflank")?,
            is_rightflank: record.uint32("is_rightflank")?,
            is_midslope: record.uint32("is_midslope")?,
            is_ridge: record.uint32("is_ridge")?,
            was_channelhead: record.uint32("was_channelhead")?,
            is_loop: record.uint32("is_loop")?,
            is_blockage: record.uint32("is_blockage")?,
        })
    }

    /// `(field, bit)` pairs in macro order.
    pub fn entries(&self) -> [(&'static str, u32); 16] {
        [
            (Self::FIELDS[0], self.is_channel),
            (Self::FIELDS[1], self.is_thinchannel),
            (Self::FIELDS[2], self.is_interchannel),
            (Self::FIELDS[3], self.is_channelhead),
            (Self::FIELDS[4], self.is_channeltail),
            (Self::FIELDS[5], self.is_majorconfluence),
            (Self::FIELDS[6], self.is_minorconfluence),
            (Self::FIELDS[7], self.is_majorinflow),
            (Self::FIELDS[8], self.is_minorinflow),
            (Self::FIELDS[9], self.is_leftflank),
            (Self::FIELDS[10], self.is_rightflank),
            (Self::FIELDS[11], self.is_midslope),
            (Self::FIELDS[12], self.is_ridge),
            (Self::FIELDS[13], self.was_channelhead),
            (Self::FIELDS[14], self.is_loop),
            (Self::FIELDS[15], self.is_blockage),
        ]
    }
}

/// Everything a streamline integration kernel is compiled against.
#[derive(Debug, Clone, PartialEq)]
pub struct IntegrationParams {
    pub n_seed_points: u64,
    pub integrator_step_factor: f64,
    pub max_integration_step_error: f64,
    pub adjusted_max_error: f64,
    pub max_length: f64,
    pub pixel_size: f64,
    pub integration_halt_threshold: f64,
    pub pad_width: u64,
    pub pad_width_pp5: f64,
    pub nx: u64,
    pub ny: u64,
    pub nxf: f64,
    pub nyf: f64,
    pub nx_padded: u64,
    pub ny_padded: u64,
    pub nxy_padded: u64,
    pub x_max: f64,
    pub y_max: f64,
    pub grid_scale: f64,
    /// Unsigned; the direction sign is applied when rendering.
    pub combo_factor: f64,
    pub dt_max: f64,
    pub max_n_steps: u64,
    pub trajectory_resolution: u64,
    /// Defaults to 0.
    pub seeds_chunk_offset: u64,
    pub subpixel_seed_point_density: u64,
    pub subpixel_seed_halfspan: f64,
    pub subpixel_seed_step: f64,
    pub jitter_magnitude: f64,
    pub interchannel_max_n_steps: u64,
    pub segmentation_threshold: u64,
    pub left_flank_addition: u64,
    pub flags: ClassFlags,
    /// Defaults to `false`.
    pub debug: bool,
}

impl IntegrationParams {
    pub fn from_record(record: &ParameterRecord) -> Result<Self> {
        Ok(Self {
            n_seed_points: record.uint("n_seed_points")?,
            integrator_step_factor: record.float("integrator_step_factor")?,
            max_integration_step_error: record.float("max_integration_step_error")?,
            adjusted_max_error: record.float("adjusted_max_error")?,
            max_length: record.float("max_length")?,
            pixel_size: record.float("pixel_size")?,
            integration_halt_threshold: record.float("integration_halt_threshold")?,
            pad_width: record.uint("pad_width")?,
            pad_width_pp5: record.float("pad_width_pp5")?,
            nx: record.uint("nx")?,
            ny: record.uint("ny")?,
            nxf: record.float("nxf")?,
            nyf: record.float("nyf")?,
            nx_padded: record.uint("nx_padded")?,
            ny_padded: record.uint("ny_padded")?,
            nxy_padded: record.uint("nxy_padded")?,
            x_max: record.float("x_max")?,
            y_max: record.float("y_max")?,
            grid_scale: record.float("grid_scale")?,
            combo_factor: record.float("combo_factor")?,
            dt_max: record.float("dt_max")?,
            max_n_steps: record.uint("max_n_steps")?,
            trajectory_resolution: record.uint("trajectory_resolution")?,
            seeds_chunk_offset: record.uint_or("seeds_chunk_offset", 0)?,
            subpixel_seed_point_density: record.uint("subpixel_seed_point_density")?,
            subpixel_seed_halfspan: record.float("subpixel_seed_halfspan")?,
            subpixel_seed_step: record.float("subpixel_seed_step")?,
            jitter_magnitude: record.float("jitter_magnitude")?,
            interchannel_max_n_steps: record.uint("interchannel_max_n_steps")?,
            segmentation_threshold: record.uint("segmentation_threshold")?,
            left_flank_addition: record.uint("left_flank_addition")?,
            flags: ClassFlags::from_record(record)?,
            debug: record.flag_or_default("debug")?,
        })
    }
}

/// Everything a kernel-density-estimation kernel is compiled against.
#[derive(Debug, Clone, PartialEq)]
pub struct KdeParams {
    pub kdf_bandwidth: f64,
    /// Smoothing kernel name, e.g. `tophat` or `gaussian`.
    pub kdf_kernel: String,
    pub n_data: u64,
    pub n_hist_bins: u64,
    pub n_pdf_points: u64,
    pub x_min: f64,
    pub x_max: f64,
    pub x_range: f64,
    pub bin_dx: f64,
    pub pdf_dx: f64,
    pub kdf_width_x: f64,
    pub n_kdf_part_points_x: u64,
    pub y_min: f64,
    pub y_max: f64,
    pub y_range: f64,
    pub bin_dy: f64,
    pub pdf_dy: f64,
    pub kdf_width_y: f64,
    pub n_kdf_part_points_y: u64,
    pub debug: bool,
}

impl KdeParams {
    pub fn from_record(record: &ParameterRecord) -> Result<Self> {
        Ok(Self {
            kdf_bandwidth: record.float("kdf_bandwidth")?,
            kdf_kernel: record.text("kdf_kernel")?.to_string(),
            n_data: record.uint("n_data")?,
            n_hist_bins: record.uint("n_hist_bins")?,
            n_pdf_points: record.uint("n_pdf_points")?,
            x_min: record.float("x_min")?,
            x_max: record.float("x_max")?,
            x_range: record.float("x_range")?,
            bin_dx: record.float("bin_dx")?,
            pdf_dx: record.float("pdf_dx")?,
            kdf_width_x: record.float("kdf_width_x")?,
            n_kdf_part_points_x: record.uint("n_kdf_part_points_x")?,
            y_min: record.float("y_min")?,
            y_max: record.float("y_max")?,
            y_range: record.float("y_range")?,
            bin_dy: record.float("bin_dy")?,
            pdf_dy: record.float("pdf_dy")?,
            kdf_width_y: record.float("kdf_width_y")?,
            n_kdf_part_points_y: record.uint("n_kdf_part_points_y")?,
            debug: record.flag_or_default("debug")?,
        })
    }
}

/// Launch tuning carried in the parameter record.
#[derive(Debug, Clone, PartialEq)]
pub struct SchedulerTuning {
    /// Work-group size; every chunk is a multiple of it.
    pub n_work_items: usize,
    /// Work groups in the first chunk.
    pub chunk_size_factor: usize,
    /// Per-launch time ceiling in seconds.
    pub max_time_per_kernel: f64,
}

#[bon]
impl SchedulerTuning {
    #[builder]
    pub fn new(
        n_work_items: usize,
        #[builder(default = 10)] chunk_size_factor: usize,
        #[builder(default = 4.0)] max_time_per_kernel: f64,
    ) -> Result<Self> {
        ensure!(n_work_items > 0, InvalidParameterSnafu { field: "n_work_items", reason: "must be positive" });
        ensure!(chunk_size_factor > 0, InvalidParameterSnafu { field: "chunk_size_factor", reason: "must be positive" });
        ensure!(
            max_time_per_kernel.is_finite() && max_time_per_kernel > 0.0,
            InvalidParameterSnafu { field: "max_time_per_kernel", reason: format!("{max_time_per_kernel} is not a positive duration") }
        );
        Ok(Self { n_work_items, chunk_size_factor, max_time_per_kernel })
    }

    /// `n_work_items` is required; the other two fall back to 10 groups and 4 seconds.
    pub fn from_record(record: &ParameterRecord) -> Result<Self> {
        let n_work_items = to_usize("n_work_items", record.uint("n_work_items")?)?;
        let chunk_size_factor = to_usize("chunk_size_factor", record.uint_or("chunk_size_factor", 10)?)?;
        let max_time_per_kernel = record.float_or("max_time_per_kernel", 4.0)?;
        Self::builder()
            .n_work_items(n_work_items)
            .chunk_size_factor(chunk_size_factor)
            .max_time_per_kernel(max_time_per_kernel)
            .build()
    }
}

fn to_usize(field: &str, value: u64) -> Result<usize> {
    usize::try_from(value).map_err(|_| InvalidParameterSnafu { field, reason: format!("{value} overflows usize") }.build())
}
