//! Job definitions: which program to build, which entry point to launch, how
//! seeds are picked, and the kernel's buffer parameter list.
//!
//! The built-in catalog covers the channel-network jobs; anything else
//! (density estimation included) is described with [`JobSpec::builder`].

use std::path::Path;

use bon::bon;
use sluice_codegen::{Direction, JobType, ParameterRecord, ProgramSourceExt};
use sluice_device::{AccessMode, ProgramSource};
use sluice_schedule::{FlagTest, GridShape, SeedQuery};
use smallvec::SmallVec;
use snafu::ensure;

use crate::arrays::NamedArray;
use crate::error::{ArgumentMismatchSnafu, GridSizeMismatchSnafu, Result};

/// Where a kernel parameter's payload comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgRole {
    /// The work domain's `float2` seed points, supplied by the dispatcher.
    Seeds,
    /// A caller array. Grid arrays hold one element per padded grid cell.
    Host { grid: bool },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArgSpec {
    pub name: String,
    pub access: AccessMode,
    pub role: ArgRole,
}

/// Ordered buffer parameter list of a kernel entry point.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KernelSignature {
    args: SmallVec<[ArgSpec; 8]>,
}

impl KernelSignature {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only seed point parameter.
    pub fn seeds(mut self, name: impl Into<String>) -> Self {
        self.args.push(ArgSpec { name: name.into(), access: AccessMode::ReadOnly, role: ArgRole::Seeds });
        self
    }

    /// Caller array with one element per padded grid cell.
    pub fn grid(mut self, name: impl Into<String>, access: AccessMode) -> Self {
        self.args.push(ArgSpec { name: name.into(), access, role: ArgRole::Host { grid: true } });
        self
    }

    /// Caller array of arbitrary length.
    pub fn host(mut self, name: impl Into<String>, access: AccessMode) -> Self {
        self.args.push(ArgSpec { name: name.into(), access, role: ArgRole::Host { grid: false } });
        self
    }

    pub fn args(&self) -> &[ArgSpec] {
        &self.args
    }

    pub fn len(&self) -> usize {
        self.args.len()
    }

    pub fn is_empty(&self) -> bool {
        self.args.is_empty()
    }

    /// Parameters the caller supplies, in order.
    pub fn host_args(&self) -> impl Iterator<Item = &ArgSpec> {
        self.args.iter().filter(|a| matches!(a.role, ArgRole::Host { .. }))
    }

    pub fn has_grid_args(&self) -> bool {
        self.args.iter().any(|a| a.role == ArgRole::Host { grid: true })
    }

    /// Check caller arrays against the parameter list: same names, same order,
    /// same access modes.
    pub fn check(&self, kernel: &str, arrays: &[NamedArray<'_>]) -> Result<()> {
        let expected: Vec<&ArgSpec> = self.host_args().collect();
        ensure!(
            expected.len() == arrays.len(),
            ArgumentMismatchSnafu {
                kernel,
                reason: format!("expected {} arrays ({}), got {}", expected.len(), names(&expected), arrays.len())
            }
        );
        for (position, (spec, array)) in expected.iter().zip(arrays).enumerate() {
            ensure!(
                spec.name == array.name(),
                ArgumentMismatchSnafu {
                    kernel,
                    reason: format!("array {position} is `{}`, kernel expects `{}`", array.name(), spec.name)
                }
            );
            ensure!(
                spec.access == array.access(),
                ArgumentMismatchSnafu {
                    kernel,
                    reason: format!("`{}` is {}, kernel declares it {}", spec.name, array.access(), spec.access)
                }
            );
        }
        Ok(())
    }

    /// Grid arrays must hold exactly `grid_len` elements.
    pub fn check_grid(&self, arrays: &[NamedArray<'_>], grid_len: usize) -> Result<()> {
        for (spec, array) in self.host_args().zip(arrays) {
            if spec.role == (ArgRole::Host { grid: true }) {
                ensure!(
                    array.len() == grid_len,
                    GridSizeMismatchSnafu { name: array.name(), expected: grid_len, actual: array.len() }
                );
            }
        }
        Ok(())
    }
}

fn names(args: &[&ArgSpec]) -> String {
    args.iter().map(|a| a.name.as_str()).collect::<Vec<_>>().join(", ")
}

/// How a job picks its seeds.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum SeedRule {
    /// Every unmasked cell.
    #[default]
    MaskOnly,
    /// Unmasked cells whose classification has the named record flag set.
    FlagSet(String),
    /// Unmasked cells whose classification lacks the named record flag.
    FlagUnset(String),
}

impl SeedRule {
    /// Resolve the flag bit from `record`.
    pub fn flag_test(&self, record: &ParameterRecord) -> Result<Option<FlagTest>> {
        Ok(match self {
            Self::MaskOnly => None,
            Self::FlagSet(field) => Some(FlagTest::Set(record.uint32(field)?)),
            Self::FlagUnset(field) => Some(FlagTest::Unset(record.uint32(field)?)),
        })
    }
}

/// One kind of dispatch.
#[derive(Debug, Clone, PartialEq)]
pub struct JobSpec {
    pub name: String,
    /// Entry point launched, also the `KERNEL_*` selector.
    pub kernel_name: String,
    pub job_type: JobType,
    pub direction: Direction,
    /// Source fragments concatenated into the program, in order.
    pub fragments: Vec<String>,
    pub signature: KernelSignature,
    pub seeds: SeedRule,
}

#[bon]
impl JobSpec {
    #[builder]
    pub fn new(
        #[builder(into)] name: String,
        /// Defaults to the job name.
        #[builder(into)]
        kernel_name: Option<String>,
        #[builder(default)] job_type: JobType,
        #[builder(default)] direction: Direction,
        fragments: Vec<String>,
        signature: KernelSignature,
        #[builder(default)] seeds: SeedRule,
    ) -> Self {
        let kernel_name = kernel_name.unwrap_or_else(|| name.clone());
        Self { name, kernel_name, job_type, direction, fragments, signature, seeds }
    }

    pub fn with_direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Program source for this job.
    ///
    /// With a directory, fragment files are read from it. Without one, the
    /// source lists the fragment names only, which is all host kernels need.
    pub fn source(&self, dir: Option<&Path>) -> Result<ProgramSource> {
        let fragments: Vec<&str> = self.fragments.iter().map(String::as_str).collect();
        Ok(match dir {
            Some(dir) => ProgramSource::from_dir(&self.name, dir, &fragments)?,
            None => fragments.iter().fold(ProgramSource::new(&self.name), |source, name| source.with_fragment(*name, "")),
        })
    }

    /// Seed query for this job over the given grid.
    ///
    /// `mapping` is only consulted by flag-based rules.
    pub fn seed_query<'a>(
        &self,
        record: &ParameterRecord,
        shape: GridShape,
        mask: &'a [bool],
        mapping: &'a [u32],
        pad: i32,
    ) -> Result<SeedQuery<'a>> {
        let query = SeedQuery::builder().shape(shape).mask(mask).pad(pad);
        let query = match self.seeds.flag_test(record)? {
            Some(test) => query.mapping((mapping, test)).build(),
            None => query.build(),
        };
        Ok(query?)
    }
}

/// Names of the built-in jobs.
pub const BUILTIN_JOBS: [&str; 6] =
    ["map_channel_heads", "prune_channel_heads", "count_downchannels", "flag_downchannels", "link_hillslopes", "label_confluences"];

const TRACE_FRAGMENTS: [&str; 5] = ["essentials.cl", "updatetraj.cl", "computestep.cl", "rungekutta.cl", "channelheads.cl"];
const COUNT_FRAGMENTS: [&str; 5] = ["essentials.cl", "trajectoryfns.cl", "computestep.cl", "integrationfns.cl", "countlink.cl"];
const FLAG_FRAGMENTS: [&str; 4] = ["essentials.cl", "trajectoryfns.cl", "integrationfns.cl", "countlink.cl"];
const LABEL_FRAGMENTS: [&str; 3] = ["essentials.cl", "trajectoryfns.cl", "label.cl"];

fn fragments(names: &[&str]) -> Vec<String> {
    names.iter().map(|n| n.to_string()).collect()
}

fn channel_heads_signature() -> KernelSignature {
    KernelSignature::new()
        .seeds("seed_point")
        .grid("mask", AccessMode::ReadOnly)
        .grid("uv", AccessMode::ReadOnly)
        .grid("mapping", AccessMode::ReadWrite)
}

fn count_link_signature() -> KernelSignature {
    channel_heads_signature().grid("count", AccessMode::ReadWrite).grid("link", AccessMode::ReadWrite)
}

/// Look up a built-in job by name.
pub fn builtin(name: &str) -> Option<JobSpec> {
    let job = |fragment_names: &[&str], signature: KernelSignature, seeds: SeedRule| {
        JobSpec::builder()
            .name(name)
            .fragments(fragments(fragment_names))
            .signature(signature)
            .seeds(seeds)
            .build()
    };
    let channelhead = || SeedRule::FlagSet("is_channelhead".to_string());

    Some(match name {
        "map_channel_heads" => job(&TRACE_FRAGMENTS, channel_heads_signature(), SeedRule::MaskOnly),
        "prune_channel_heads" => job(&TRACE_FRAGMENTS, channel_heads_signature(), channelhead()),
        "count_downchannels" => job(&COUNT_FRAGMENTS, count_link_signature(), channelhead()),
        "flag_downchannels" => job(&FLAG_FRAGMENTS, count_link_signature(), channelhead()),
        "link_hillslopes" => {
            job(&COUNT_FRAGMENTS, count_link_signature(), SeedRule::FlagUnset("is_thinchannel".to_string()))
        }
        "label_confluences" => job(
            &LABEL_FRAGMENTS,
            KernelSignature::new()
                .seeds("seed_point")
                .grid("mask", AccessMode::ReadOnly)
                .grid("uv", AccessMode::ReadOnly)
                .grid("slt", AccessMode::ReadOnly)
                .grid("mapping", AccessMode::ReadWrite)
                .grid("count", AccessMode::ReadWrite)
                .grid("link", AccessMode::ReadWrite),
            SeedRule::FlagSet("is_thinchannel".to_string()),
        ),
        _ => return None,
    })
}

/// Every built-in job.
pub fn catalog() -> Vec<JobSpec> {
    BUILTIN_JOBS.iter().filter_map(|name| builtin(name)).collect()
}
