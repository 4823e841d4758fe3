//! Launch geometry for one kernel submission.
//!
//! A dispatch issues a 1-D range `[offset, offset + global)` in work groups of
//! `local` items. Devices without a native global offset (CUDA) receive the
//! offset as a trailing kernel argument instead.

use snafu::ensure;

use crate::error::{InvalidLaunchSnafu, Result};

/// Kernel execution parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecParams {
    /// Global work size (total number of work items per dimension).
    pub global_size: [usize; 3],
    /// Local work size (work group size per dimension).
    pub local_size: [usize; 3],
    /// First global id of the launch per dimension.
    pub global_offset: [usize; 3],
}

impl ExecParams {
    /// Create 1D execution parameters.
    pub fn new_1d(global: usize, local: usize) -> Self {
        Self { global_size: [global, 1, 1], local_size: [local, 1, 1], global_offset: [0; 3] }
    }

    /// 1D chunk of a larger work domain starting at `offset`.
    pub fn chunk_1d(offset: usize, global: usize, local: usize) -> Self {
        Self { global_offset: [offset, 0, 0], ..Self::new_1d(global, local) }
    }

    pub fn total_items(&self) -> usize {
        self.global_size.iter().product()
    }

    pub fn group_size(&self) -> usize {
        self.local_size.iter().product()
    }

    /// Half-open range of global ids covered along the first dimension.
    pub fn range_1d(&self) -> std::ops::Range<usize> {
        self.global_offset[0]..self.global_offset[0] + self.global_size[0]
    }

    /// Check that the geometry is launchable on a device with the given work-group limit.
    pub fn validate(&self, max_work_group_size: usize) -> Result<()> {
        ensure!(self.local_size.iter().all(|&l| l > 0), InvalidLaunchSnafu { message: "local size must be non-zero" });
        ensure!(
            self.group_size() <= max_work_group_size,
            InvalidLaunchSnafu {
                message: format!("work group of {} items exceeds device limit {max_work_group_size}", self.group_size())
            }
        );
        ensure!(
            self.global_size.iter().zip(&self.local_size).all(|(g, l)| g % l == 0),
            InvalidLaunchSnafu {
                message: format!(
                    "global size {:?} is not a multiple of local size {:?}",
                    self.global_size, self.local_size
                )
            }
        );
        Ok(())
    }
}

impl Default for ExecParams {
    fn default() -> Self {
        Self::new_1d(1, 1)
    }
}
