//! Error types for kernel specialization.

use std::path::PathBuf;

use snafu::Snafu;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Errors raised while turning a parameter record into build inputs.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum Error {
    /// A field the kernel program references is absent from the record.
    #[snafu(display("missing parameter `{field}`"))]
    MissingParameter { field: String },

    #[snafu(display("invalid parameter `{field}`: {reason}"))]
    InvalidParameter { field: String, reason: String },

    /// A `-D` build option that cannot be read back as `NAME` or `NAME=value`.
    #[snafu(display("malformed build option `{option}`"))]
    MalformedOption { option: String },

    #[snafu(display("kernel source fragment not found: {}", path.display()))]
    FragmentNotFound { path: PathBuf },

    #[snafu(display("failed to read kernel source fragment {}: {source}", path.display()))]
    ReadFragment { path: PathBuf, source: std::io::Error },
}
