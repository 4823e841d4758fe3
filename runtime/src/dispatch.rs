//! Adaptive Dispatch Scheduler.
//!
//! A dispatch runs three phases on one device:
//!
//! 1. **Build**: read the launch tuning, specialize the program, check the
//!    caller arrays against the kernel signature, stage buffers and compile.
//!    Every configuration error is raised before the first allocation.
//! 2. **Dispatch loop**: launch the work domain in contiguous chunks, waiting
//!    for each one and sizing the next from its measured time so a launch
//!    stays under `max_time_per_kernel`.
//! 3. **Read-back**: copy writable buffers into the host arrays.
//!
//! Host arrays are only written during read-back, so any failure leaves them
//! as they were. Device buffers are released on every exit path.
//!
//! # Example
//!
//! ```ignore
//! let device = Arc::new(create_cpu_device(CpuDeviceConfig::default(), kernels));
//! let dispatcher = Dispatcher::new(device, DispatchConfig::default());
//!
//! let job = jobs::builtin("map_channel_heads").unwrap();
//! let query = job.seed_query(&record, shape, &mask, &mapping, pad)?;
//! let report = dispatcher.run(&job, &query, &SeedOptions::default(), &record, &mut arrays)?;
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use bon::bon;
use sluice_codegen::{ParameterRecord, SchedulerTuning, build_options, specialize};
use sluice_device::{Device, ExecParams};
use sluice_schedule::{ChunkController, ChunkPolicy, SeedOptions, SeedQuery, ThroughputEstimator, WorkDomain};
use snafu::{OptionExt, ResultExt, ensure};

use crate::arrays::NamedArray;
use crate::error::{ArgumentMismatchSnafu, ChunkLimitExceededSnafu, InvalidConfigSnafu, LaunchFailureSnafu, Result};
use crate::jobs::{ArgRole, JobSpec};
use crate::staging::StagedBuffers;

/// Dispatcher settings that do not come from the parameter record.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchConfig {
    pub estimator: ThroughputEstimator,
    /// Abort once more than this many chunks were issued.
    pub max_chunks: Option<usize>,
    /// Directory holding program source fragments. Host kernels need none.
    pub kernel_dir: Option<PathBuf>,
}

#[bon]
impl DispatchConfig {
    #[builder]
    pub fn new(
        #[builder(default)] estimator: ThroughputEstimator,
        max_chunks: Option<usize>,
        #[builder(into)] kernel_dir: Option<PathBuf>,
    ) -> Result<Self> {
        ensure!(max_chunks != Some(0), InvalidConfigSnafu { reason: "max_chunks must be positive" });
        Ok(Self { estimator, max_chunks, kernel_dir })
    }
}

/// One launch of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChunkRecord {
    pub offset: usize,
    pub size: usize,
    /// Device time, `None` when profiling was unavailable.
    pub elapsed: Option<Duration>,
}

/// Outcome of a completed dispatch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchReport {
    /// Real work items, excluding padding.
    pub n_seeds: usize,
    /// Items launched, rounded up to whole work groups.
    pub work_size: usize,
    pub chunks: Vec<ChunkRecord>,
    /// Sum of measured chunk times.
    pub cumulative_time: Duration,
    /// Chunks without a timing sample.
    pub timing_gaps: usize,
    pub build_log: String,
}

impl DispatchReport {
    pub fn n_chunks(&self) -> usize {
        self.chunks.len()
    }

    /// Items covered by the launched chunks.
    pub fn covered(&self) -> usize {
        self.chunks.iter().map(|c| c.size).sum()
    }
}

/// Issues dispatches on one device.
///
/// The device is chosen by the caller; see [`crate::devices::open`] for
/// opening one from a [`sluice_device::DeviceSpec`].
#[derive(Debug, Clone)]
pub struct Dispatcher {
    device: Arc<Device>,
    config: DispatchConfig,
}

impl Dispatcher {
    pub fn new(device: Arc<Device>, config: DispatchConfig) -> Self {
        Self { device, config }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    pub fn config(&self) -> &DispatchConfig {
        &self.config
    }

    /// Select seeds with `query` and dispatch `job` over them.
    ///
    /// Seeds are padded to `n_work_items` unless `seed_options` names another
    /// granularity.
    pub fn run(
        &self,
        job: &JobSpec,
        query: &SeedQuery<'_>,
        seed_options: &SeedOptions,
        record: &ParameterRecord,
        arrays: &mut [NamedArray<'_>],
    ) -> Result<DispatchReport> {
        let tuning = SchedulerTuning::from_record(record)?;
        let mut options = seed_options.clone();
        options.granularity.get_or_insert(tuning.n_work_items);
        let domain = WorkDomain::select(query, &options)?;
        self.dispatch(job, &domain, record, arrays)
    }

    /// Dispatch `job` over a prebuilt work domain.
    ///
    /// `arrays` are the caller's kernel arguments in parameter order, seed
    /// points excluded. `n_seed_points` is taken from the domain.
    pub fn dispatch(
        &self,
        job: &JobSpec,
        domain: &WorkDomain,
        record: &ParameterRecord,
        arrays: &mut [NamedArray<'_>],
    ) -> Result<DispatchReport> {
        let kernel_name = job.kernel_name.as_str();

        // Build: everything that can be checked without the device.
        let tuning = SchedulerTuning::from_record(record)?;
        let record = record.clone().with("n_seed_points", domain.n_seeds());
        let defines = specialize(&record, kernel_name, job.job_type, job.direction)?;
        job.signature.check(kernel_name, arrays)?;
        if job.signature.has_grid_args() {
            let grid_len = usize::try_from(record.uint("nxy_padded")?)
                .ok()
                .context(InvalidConfigSnafu { reason: "nxy_padded overflows usize" })?;
            job.signature.check_grid(arrays, grid_len)?;
        }

        let local_size = tuning.n_work_items;
        let max_work_group_size = self.device.info.max_work_group_size;
        ensure!(
            local_size <= max_work_group_size,
            InvalidConfigSnafu {
                reason: format!("n_work_items {local_size} exceeds device work-group limit {max_work_group_size}")
            }
        );
        let max_time = Duration::try_from_secs_f64(tuning.max_time_per_kernel)
            .ok()
            .context(InvalidConfigSnafu { reason: format!("max_time_per_kernel {} is out of range", tuning.max_time_per_kernel) })?;
        let policy = ChunkPolicy::builder()
            .local_size(local_size)
            .chunk_size_factor(tuning.chunk_size_factor)
            .max_time_per_launch(max_time)
            .estimator(self.config.estimator)
            .build()?;
        let mut chunks = ChunkController::new(policy, domain.n_seeds())?;
        let work_size = chunks.work_size();
        let source = job.source(self.config.kernel_dir.as_deref())?;

        let mut points = domain.seed_points();
        points.resize(points.len().max(work_size), [0.0; 2]);
        let seed_args: Vec<NamedArray<'_>> = job
            .signature
            .args()
            .iter()
            .filter(|a| a.role == ArgRole::Seeds)
            .map(|a| NamedArray::read_only(a.name.as_str(), &points))
            .collect();

        let staged = {
            let mut seeds = seed_args.iter();
            let mut host = arrays.iter();
            let mut ordered = Vec::with_capacity(job.signature.len());
            for arg in job.signature.args() {
                let array = match arg.role {
                    ArgRole::Seeds => seeds.next(),
                    ArgRole::Host { .. } => host.next(),
                };
                ordered.push(array.context(ArgumentMismatchSnafu {
                    kernel: kernel_name,
                    reason: format!("no array for parameter `{}`", arg.name),
                })?);
            }
            StagedBuffers::stage(&self.device, &ordered)?
        };

        let options = build_options(&defines);
        tracing::debug!(kernel.name = %kernel_name, program = %source.name, options = %options.join(" "), "compiling kernel program");
        let compiled = self.device.compiler.compile(&source, &options)?;
        if !compiled.build_log.trim().is_empty() {
            tracing::warn!(kernel.name = %kernel_name, log = %compiled.build_log, "kernel build produced diagnostics");
        }
        let kernel = compiled.program.kernel(kernel_name)?;

        // Dispatch loop: one chunk in flight, each sized from the previous one's time.
        let buffers = staged.buffers();
        let mut records = Vec::new();
        let mut cumulative_time = Duration::ZERO;
        let mut timing_gaps = 0;
        while let Some(plan) = chunks.next_chunk() {
            if let Some(limit) = self.config.max_chunks {
                ensure!(chunks.issued() <= limit, ChunkLimitExceededSnafu { limit });
            }
            tracing::debug!(
                kernel.name = %kernel_name,
                progress = plan.offset * 100 / work_size,
                chunk.offset = plan.offset,
                chunk.size = plan.size,
                chunk.end = plan.end(),
                estimated_s = chunks.predicted().map(|t| t.as_secs_f64()),
                "enqueue chunk"
            );

            let params = ExecParams::chunk_1d(plan.offset, plan.size, local_size);
            let failed = LaunchFailureSnafu { offset: plan.offset, size: plan.size };
            let event = kernel.launch(&buffers, &params).context(failed)?;
            event.wait().context(failed)?;

            let elapsed = event.elapsed();
            match elapsed {
                Some(t) => {
                    cumulative_time += t;
                    tracing::debug!(chunk.offset = plan.offset, chunk.size = plan.size, elapsed_s = t.as_secs_f64(), "chunk completed");
                }
                None => {
                    timing_gaps += 1;
                    tracing::debug!(chunk.offset = plan.offset, chunk.size = plan.size, "profiling unavailable, keeping chunk size");
                }
            }
            chunks.complete(elapsed)?;
            records.push(ChunkRecord { offset: plan.offset, size: plan.size, elapsed });
        }

        // Read-back.
        staged.readback(&self.device, arrays)?;

        tracing::info!(
            kernel.name = %kernel_name,
            n_seeds = domain.n_seeds(),
            work_size,
            chunks = records.len(),
            cumulative_s = cumulative_time.as_secs_f64(),
            timing_gaps,
            "dispatch complete"
        );
        Ok(DispatchReport {
            n_seeds: domain.n_seeds(),
            work_size,
            chunks: records,
            cumulative_time,
            timing_gaps,
            build_log: compiled.build_log,
        })
    }
}
