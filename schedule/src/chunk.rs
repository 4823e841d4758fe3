//! Adaptive chunk sizing.
//!
//! [`ChunkController`] walks the work domain `[0, work_size)` in contiguous
//! chunks. The first chunk is `local_size * chunk_size_factor` items; every
//! later chunk is sized from the measured time of the previous one so that a
//! single launch stays under `max_time_per_launch`. Chunk sizes are always
//! multiples of `local_size`, and at least one work group is issued per step.

use std::time::Duration;

use bon::bon;
use snafu::{OptionExt, ensure};

use crate::error::{EmptyWorkDomainSnafu, InvalidPolicySnafu, NoChunkInFlightSnafu, Result};

/// One launch: the sub-range `[offset, offset + size)` of the work domain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ChunkPlan {
    pub offset: usize,
    pub size: usize,
}

impl ChunkPlan {
    pub const fn end(&self) -> usize {
        self.offset + self.size
    }
}

/// Duration of the most recently completed chunk.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TimingSample {
    pub chunk_size: usize,
    pub elapsed: Duration,
}

impl TimingSample {
    pub fn time_per_item(&self) -> f64 {
        self.elapsed.as_secs_f64() / self.chunk_size as f64
    }
}

/// How per-item time is estimated from samples.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ThroughputEstimator {
    /// Use the latest sample only.
    #[default]
    Latest,
    /// Exponential moving average; `alpha` weights the newest sample.
    Smoothed { alpha: f64 },
}

impl ThroughputEstimator {
    fn update(self, previous: Option<f64>, sample: f64) -> f64 {
        match (self, previous) {
            (Self::Smoothed { alpha }, Some(previous)) => alpha * sample + (1.0 - alpha) * previous,
            _ => sample,
        }
    }
}

/// Launch-sizing policy of one dispatch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ChunkPolicy {
    pub local_size: usize,
    pub chunk_size_factor: usize,
    pub max_time_per_launch: Duration,
    pub estimator: ThroughputEstimator,
}

#[bon]
impl ChunkPolicy {
    #[builder]
    pub fn new(
        /// Launch granularity (work-group size).
        local_size: usize,
        /// Work groups in the first chunk.
        #[builder(default = 10)]
        chunk_size_factor: usize,
        #[builder(default = Duration::from_secs(4))] max_time_per_launch: Duration,
        #[builder(default)] estimator: ThroughputEstimator,
    ) -> Result<Self> {
        ensure!(local_size > 0, InvalidPolicySnafu { reason: "local_size must be positive" });
        ensure!(chunk_size_factor > 0, InvalidPolicySnafu { reason: "chunk_size_factor must be positive" });
        ensure!(!max_time_per_launch.is_zero(), InvalidPolicySnafu { reason: "max_time_per_launch must be positive" });
        ensure!(
            local_size.checked_mul(chunk_size_factor).is_some(),
            InvalidPolicySnafu {
                reason: format!("first chunk of {chunk_size_factor} groups of {local_size} items overflows usize")
            }
        );
        if let ThroughputEstimator::Smoothed { alpha } = estimator {
            ensure!(
                alpha > 0.0 && alpha <= 1.0,
                InvalidPolicySnafu { reason: format!("smoothing factor {alpha} is outside (0, 1]") }
            );
        }
        Ok(Self { local_size, chunk_size_factor, max_time_per_launch, estimator })
    }
}

/// Issues chunk plans and resizes them from timing feedback.
///
/// At most one chunk is in flight: [`next_chunk`](Self::next_chunk) must be
/// followed by [`complete`](Self::complete) before the next plan is issued.
#[derive(Debug, Clone)]
pub struct ChunkController {
    policy: ChunkPolicy,
    work_size: usize,
    offset: usize,
    chunk_size: usize,
    in_flight: Option<ChunkPlan>,
    time_per_item: Option<f64>,
    issued: usize,
}

impl ChunkController {
    /// `n_items` is rounded up to a whole number of work groups.
    pub fn new(policy: ChunkPolicy, n_items: usize) -> Result<Self> {
        ensure!(n_items > 0, EmptyWorkDomainSnafu);
        let local = policy.local_size;
        ensure!(local > 0, InvalidPolicySnafu { reason: "local_size must be positive" });
        let work_size = n_items.div_ceil(local).checked_mul(local).context(InvalidPolicySnafu {
            reason: format!("{n_items} items rounded up to groups of {local} overflow usize"),
        })?;
        let chunk_size = local.saturating_mul(policy.chunk_size_factor.max(1)).min(work_size);
        Ok(Self { policy, work_size, offset: 0, chunk_size, in_flight: None, time_per_item: None, issued: 0 })
    }

    pub fn policy(&self) -> &ChunkPolicy {
        &self.policy
    }

    /// Total items covered, a multiple of `local_size`.
    pub fn work_size(&self) -> usize {
        self.work_size
    }

    /// Start of the next chunk.
    pub fn offset(&self) -> usize {
        self.offset
    }

    /// Size the next chunk will have.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn remaining(&self) -> usize {
        self.work_size - self.offset
    }

    pub fn is_done(&self) -> bool {
        self.offset >= self.work_size && self.in_flight.is_none()
    }

    pub fn issued(&self) -> usize {
        self.issued
    }

    /// Current per-item time estimate, if any chunk was timed.
    pub fn time_per_item(&self) -> Option<f64> {
        self.time_per_item
    }

    /// Predicted duration of the next chunk from the current estimate.
    pub fn predicted(&self) -> Option<Duration> {
        self.time_per_item.map(|tpi| Duration::from_secs_f64(tpi * self.chunk_size as f64))
    }

    /// Plan the next chunk and advance the offset past it.
    ///
    /// Returns `None` once the domain is covered or while a chunk is in flight.
    pub fn next_chunk(&mut self) -> Option<ChunkPlan> {
        if self.in_flight.is_some() || self.offset >= self.work_size {
            return None;
        }
        let plan = ChunkPlan { offset: self.offset, size: self.chunk_size.min(self.remaining()) };
        self.offset = plan.end();
        self.in_flight = Some(plan);
        self.issued += 1;
        Some(plan)
    }

    /// Record completion of the in-flight chunk and size the next one.
    ///
    /// Without a timing sample the previous size is kept (clamped to what is left).
    pub fn complete(&mut self, elapsed: Option<Duration>) -> Result<()> {
        let Some(plan) = self.in_flight.take() else {
            return NoChunkInFlightSnafu.fail();
        };

        let local = self.policy.local_size;
        let remaining = self.remaining();
        let remaining_groups = remaining.div_ceil(local);

        let Some(elapsed) = elapsed else {
            self.chunk_size = self.chunk_size.min(remaining).max(local);
            return Ok(());
        };

        let sample = TimingSample { chunk_size: plan.size, elapsed };
        let tpi = self.policy.estimator.update(self.time_per_item, sample.time_per_item());
        self.time_per_item = Some(tpi);

        let groups = if tpi > 0.0 {
            let budget_groups = self.policy.max_time_per_launch.as_secs_f64() / (tpi * local as f64);
            (budget_groups.floor() as usize).min(remaining_groups)
        } else {
            remaining_groups
        };
        self.chunk_size = groups.max(1) * local;

        tracing::trace!(
            chunk.offset = plan.offset,
            chunk.size = plan.size,
            elapsed_s = elapsed.as_secs_f64(),
            time_per_item = tpi,
            next = self.chunk_size,
            "resized chunk"
        );
        Ok(())
    }
}
