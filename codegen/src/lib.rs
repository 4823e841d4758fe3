//! Kernel specialization for sluice.
//!
//! Turns a caller-owned [`ParameterRecord`] into the ordered list of
//! compile-time constants a kernel program is built with, and assembles the
//! program source from named fragments.
//!
//! # Architecture
//!
//! - **params**: the flat record plus typed, validated per-job views
//! - **specialize**: per-job macro tables (integration, density estimation)
//! - **defines**: `-D NAME=value` rendering and parsing
//! - **source**: fragment loading
//!
//! # Usage
//!
//! ```ignore
//! use sluice_codegen::{Direction, JobType, build_options, specialize};
//!
//! let defines = specialize(&record, "count_downchannels", JobType::Integration, Direction::Downstream)?;
//! let options = build_options(&defines);
//! ```

pub mod defines;
pub mod error;
pub mod params;
pub mod source;
pub mod specialize;


pub use defines::{Define, DefineValue, build_options, parse_build_options};
pub use error::*;
pub use params::{ClassFlags, IntegrationParams, KdeParams, ParamValue, ParameterRecord, SchedulerTuning};
pub use source::ProgramSourceExt;
pub use specialize::{Direction, JobType, kernel_selector, specialize};
