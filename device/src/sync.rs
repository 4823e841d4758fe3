//! Completion events for submitted kernels.
//!
//! Each launch returns an [`Event`]. The dispatcher waits on it before sizing
//! the next chunk and reads its profiling time. Profiling is best effort: an
//! event that cannot report a duration returns `None` and the caller keeps its
//! previous chunk size.

use std::fmt;
use std::time::Duration;

use crate::error::Result;

pub trait Event: fmt::Debug {
    /// Block until the launch has finished executing.
    fn wait(&self) -> Result<()>;

    /// Device-side execution time of the launch, if profiling recorded one.
    fn elapsed(&self) -> Option<Duration>;
}

/// Event of a host launch. The work has already run when the event is handed out.
#[derive(Debug, Clone, Copy, Default)]
pub struct CpuEvent {
    elapsed: Option<Duration>,
}

impl CpuEvent {
    pub fn completed(elapsed: Option<Duration>) -> Self {
        Self { elapsed }
    }
}

impl Event for CpuEvent {
    fn wait(&self) -> Result<()> {
        Ok(())
    }

    fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }
}

#[cfg(feature = "cuda")]
pub mod cuda {
    //! CUDA launch events recorded on the device's stream.

    use std::time::Duration;

    use cudarc::driver::CudaEvent;
    use snafu::ResultExt;

    use super::Event;
    use crate::error::{CudaSnafu, Result};

    /// Start/end event pair bracketing one kernel launch.
    #[derive(Debug)]
    pub struct CudaLaunchEvent {
        start: CudaEvent,
        end: CudaEvent,
    }

    impl CudaLaunchEvent {
        pub fn new(start: CudaEvent, end: CudaEvent) -> Self {
            Self { start, end }
        }
    }

    impl Event for CudaLaunchEvent {
        fn wait(&self) -> Result<()> {
            self.end.synchronize().context(CudaSnafu)
        }

        fn elapsed(&self) -> Option<Duration> {
            match self.start.elapsed_ms(&self.end) {
                Ok(ms) if ms.is_finite() && ms >= 0.0 => Some(Duration::from_secs_f64(f64::from(ms) / 1e3)),
                Ok(_) => None,
                Err(err) => {
                    tracing::debug!(error = %err, "CUDA event timing unavailable");
                    None
                }
            }
        }
    }
}
