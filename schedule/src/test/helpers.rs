//! Test utilities for seed selection and chunk sizing.

use std::time::Duration;

use crate::chunk::{ChunkController, ChunkPlan};
use crate::seeds::GridShape;

/// Row-major mask with the given cells set to `true` (excluded).
pub fn mask_excluding(shape: GridShape, excluded: &[(usize, usize)]) -> Vec<bool> {
    let mut mask = vec![false; shape.len()];
    for &(row, col) in excluded {
        mask[row * shape.cols + col] = true;
    }
    mask
}

/// Drive `controller` to completion, timing each chunk with `timing`.
///
/// Panics if the controller issues more than `guard` chunks.
pub fn drain(
    controller: &mut ChunkController,
    guard: usize,
    mut timing: impl FnMut(ChunkPlan) -> Option<Duration>,
) -> Vec<ChunkPlan> {
    let mut plans = Vec::new();
    while let Some(plan) = controller.next_chunk() {
        plans.push(plan);
        assert!(plans.len() <= guard, "controller issued more than {guard} chunks");
        controller.complete(timing(plan)).expect("chunk is in flight");
    }
    plans
}

/// Check that `plans` tile `[0, work_size)` without gaps or overlap.
pub fn assert_tiles(plans: &[ChunkPlan], work_size: usize) {
    let mut expected = 0;
    for plan in plans {
        assert_eq!(plan.offset, expected, "chunk starts at {} instead of {expected}", plan.offset);
        assert!(plan.size > 0, "empty chunk at {}", plan.offset);
        expected = plan.end();
    }
    assert_eq!(expected, work_size);
}

/// Simulated device running every item in `per_item`.
pub fn linear_timing(per_item: Duration) -> impl FnMut(ChunkPlan) -> Option<Duration> {
    move |plan| Some(per_item * plan.size as u32)
}
