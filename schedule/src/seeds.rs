//! Seed selection: which grid cells a dispatch processes.
//!
//! A [`SeedQuery`] combines an exclusion mask and/or a bit-flag test over a
//! classification array. [`select_seeds`] scans the grid and returns matching
//! coordinates shifted by the border pad; [`WorkDomain::build`] then applies
//! the optional seeded shuffle, truncation and padding to launch granularity.

use bon::bon;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rayon::prelude::*;
use snafu::ensure;

use crate::error::{EmptyWorkDomainSnafu, InvalidGranularitySnafu, NoPredicateSnafu, Result, ShapeMismatchSnafu};

/// Grids at least this large are scanned on the rayon pool.
pub const PARALLEL_SCAN_THRESHOLD: usize = 1 << 16;

/// Grid dimensions of the row-major host arrays.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub const fn len(&self) -> usize {
        self.rows * self.cols
    }

    pub const fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Flat row-major index of the `k`-th cell visited in `order`.
    fn visit(&self, order: ScanOrder, k: usize) -> (usize, usize) {
        match order {
            ScanOrder::RowMajor => (k / self.cols, k % self.cols),
            ScanOrder::ColumnMajor => (k % self.rows, k / self.rows),
        }
    }
}

/// Order in which matching coordinates are emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ScanOrder {
    /// Row by row (C order).
    #[default]
    RowMajor,
    /// Column by column (Fortran order).
    ColumnMajor,
}

/// Bit test applied to each cell of the classification array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FlagTest {
    /// Any bit of the flag is set: `(mapping & flag) != 0`.
    Set(u32),
    /// Any bit of the flag is clear: `(!mapping & flag) != 0`.
    Unset(u32),
}

impl FlagTest {
    #[inline]
    pub const fn holds(self, value: u32) -> bool {
        match self {
            Self::Set(flag) => value & flag != 0,
            Self::Unset(flag) => !value & flag != 0,
        }
    }
}

/// Predicate over the grid selecting work items.
///
/// Mask-only selects cells whose mask is `false`; flag-only selects cells
/// passing the flag test; combined requires both.
#[derive(Debug, Clone, Copy)]
pub struct SeedQuery<'a> {
    shape: GridShape,
    order: ScanOrder,
    mask: Option<&'a [bool]>,
    mapping: Option<(&'a [u32], FlagTest)>,
    pad: i32,
}

#[bon]
impl<'a> SeedQuery<'a> {
    #[builder]
    pub fn new(
        shape: GridShape,
        #[builder(default)] order: ScanOrder,
        /// Exclusion mask; `true` cells are never selected.
        mask: Option<&'a [bool]>,
        /// Classification array and the bit test applied to it.
        mapping: Option<(&'a [u32], FlagTest)>,
        /// Border width subtracted from both coordinates.
        #[builder(default)]
        pad: i32,
    ) -> Result<Self> {
        ensure!(mask.is_some() || mapping.is_some(), NoPredicateSnafu);
        if let Some(mask) = mask {
            ensure!(mask.len() == shape.len(), ShapeMismatchSnafu { array: "mask", expected: shape.len(), actual: mask.len() });
        }
        if let Some((mapping, _)) = mapping {
            ensure!(
                mapping.len() == shape.len(),
                ShapeMismatchSnafu { array: "mapping", expected: shape.len(), actual: mapping.len() }
            );
        }
        Ok(Self { shape, order, mask, mapping, pad })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    #[inline]
    fn selects(&self, flat: usize) -> bool {
        let unmasked = self.mask.is_none_or(|mask| !mask[flat]);
        let flagged = self.mapping.is_none_or(|(mapping, test)| test.holds(mapping[flat]));
        unmasked && flagged
    }

    #[inline]
    fn probe(&self, k: usize) -> Option<[i32; 2]> {
        let (row, col) = self.shape.visit(self.order, k);
        self.selects(row * self.shape.cols + col).then(|| [row as i32 - self.pad, col as i32 - self.pad])
    }
}

/// Coordinates satisfying `query`, in scan order, shifted by the pad.
///
/// Fails with `EmptyWorkDomain` when nothing matches.
pub fn select_seeds(query: &SeedQuery<'_>) -> Result<Vec<[i32; 2]>> {
    let n = query.shape.len();
    let coords: Vec<[i32; 2]> = if n >= PARALLEL_SCAN_THRESHOLD {
        (0..n).into_par_iter().filter_map(|k| query.probe(k)).collect()
    } else {
        (0..n).filter_map(|k| query.probe(k)).collect()
    };

    ensure!(!coords.is_empty(), EmptyWorkDomainSnafu);
    tracing::debug!(grid.rows = query.shape.rows, grid.cols = query.shape.cols, seeds = coords.len(), "selected seeds");
    Ok(coords)
}

/// Post-selection treatment of the coordinate list.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SeedOptions {
    /// Shuffle with this RNG seed before truncation.
    pub shuffle_seed: Option<u64>,
    /// Keep at most this many seeds.
    pub max_count: Option<usize>,
    /// Pad the length up to a multiple of this launch granularity.
    pub granularity: Option<usize>,
}

#[bon]
impl SeedOptions {
    #[builder]
    pub fn new(shuffle_seed: Option<u64>, max_count: Option<usize>, granularity: Option<usize>) -> Result<Self> {
        if let Some(granularity) = granularity {
            ensure!(granularity > 0, InvalidGranularitySnafu { granularity });
        }
        Ok(Self { shuffle_seed, max_count, granularity })
    }
}

/// Ordered, immutable set of work items for one dispatch.
///
/// Entries past `n_seeds` are inert padding (zero coordinates); kernels bound
/// their work by `n_seeds`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkDomain {
    coords: Vec<[i32; 2]>,
    n_seeds: usize,
}

impl WorkDomain {
    /// Select seeds for `query` and apply `options`.
    pub fn select(query: &SeedQuery<'_>, options: &SeedOptions) -> Result<Self> {
        Self::build(select_seeds(query)?, options)
    }

    /// Shuffle, truncate and pad an already selected coordinate list.
    pub fn build(mut coords: Vec<[i32; 2]>, options: &SeedOptions) -> Result<Self> {
        if let Some(seed) = options.shuffle_seed {
            let mut rng = StdRng::seed_from_u64(seed);
            coords.shuffle(&mut rng);
        }
        if let Some(max_count) = options.max_count {
            coords.truncate(max_count);
        }
        ensure!(!coords.is_empty(), EmptyWorkDomainSnafu);

        let n_seeds = coords.len();
        if let Some(granularity) = options.granularity {
            ensure!(granularity > 0, InvalidGranularitySnafu { granularity });
            coords.resize(n_seeds.div_ceil(granularity) * granularity, [0, 0]);
        }

        tracing::debug!(seeds = n_seeds, padded = coords.len(), shuffled = options.shuffle_seed.is_some(), "built work domain");
        Ok(Self { coords, n_seeds })
    }

    /// Real seeds, excluding padding.
    pub fn n_seeds(&self) -> usize {
        self.n_seeds
    }

    /// Length including padding.
    pub fn len(&self) -> usize {
        self.coords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.coords.is_empty()
    }

    pub fn padding(&self) -> usize {
        self.coords.len() - self.n_seeds
    }

    /// Real seed coordinates.
    pub fn seeds(&self) -> &[[i32; 2]] {
        &self.coords[..self.n_seeds]
    }

    /// All entries, padding included.
    pub fn coords(&self) -> &[[i32; 2]] {
        &self.coords
    }

    /// Kernel payload: one `float2` per entry, padding included.
    pub fn seed_points(&self) -> Vec<[f32; 2]> {
        self.coords.iter().map(|&[a, b]| [a as f32, b as f32]).collect()
    }
}
