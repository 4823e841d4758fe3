//! Program source assembly from named fragments on disk.

use std::path::Path;

use sluice_device::ProgramSource;
use snafu::ResultExt;

use crate::error::{FragmentNotFoundSnafu, ReadFragmentSnafu, Result};

/// Loading helpers for [`ProgramSource`].
///
/// Lives here rather than in the device crate so file handling and its errors
/// stay with the specializer.
pub trait ProgramSourceExt: Sized {
    /// Read `fragments` from `dir`, in the given order.
    fn from_dir(name: &str, dir: impl AsRef<Path>, fragments: &[&str]) -> Result<Self>;
}

impl ProgramSourceExt for ProgramSource {
    fn from_dir(name: &str, dir: impl AsRef<Path>, fragments: &[&str]) -> Result<Self> {
        let dir = dir.as_ref();
        let mut source = ProgramSource::new(name);
        for fragment in fragments {
            let path = dir.join(fragment);
            let text = match std::fs::read_to_string(&path) {
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => return FragmentNotFoundSnafu { path }.fail(),
                result => result.context(ReadFragmentSnafu { path: path.clone() })?,
            };
            tracing::trace!(program = %name, fragment = %fragment, bytes = text.len(), "loaded kernel fragment");
            source.push(*fragment, text);
        }
        Ok(source)
    }
}
