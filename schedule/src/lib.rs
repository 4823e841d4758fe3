//! Work-domain scheduling for sluice.
//!
//! Device-free logic shared by every backend:
//!
//! - [`seeds`] - Seed Selection: mask / flag predicates over the grid, seeded
//!   shuffling, truncation and padding to the launch granularity
//! - [`chunk`] - adaptive chunk sizing from per-launch timing feedback
//!
//! # Example
//!
//! ```ignore
//! use sluice_schedule::{ChunkController, ChunkPolicy, GridShape, SeedOptions, SeedQuery, WorkDomain};
//!
//! let query = SeedQuery::builder().shape(GridShape::new(4, 4)).mask(&mask).build()?;
//! let domain = WorkDomain::select(&query, &SeedOptions::builder().granularity(8).build()?)?;
//!
//! let mut chunks = ChunkController::new(ChunkPolicy::builder().local_size(8).build()?, domain.n_seeds())?;
//! while let Some(plan) = chunks.next_chunk() {
//!     let elapsed = launch(plan)?;
//!     chunks.complete(elapsed)?;
//! }
//! ```

pub mod chunk;
pub mod error;
pub mod seeds;


pub use chunk::{ChunkController, ChunkPlan, ChunkPolicy, ThroughputEstimator, TimingSample};
pub use error::*;
pub use seeds::{FlagTest, GridShape, ScanOrder, SeedOptions, SeedQuery, WorkDomain, select_seeds};
