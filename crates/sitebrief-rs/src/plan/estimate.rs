//! Upfront credit estimate for a run.
//!
//! One credit per step, plus `max_depth` credits for every self-expanding
//! step. This is an upper bound used for admission signaling only; the
//! credit service remains the authority on every individual request.

use crate::plan::PromptSpec;

/// Worst-case credits consumed by running `steps` with the given expansion
/// depth budget.
pub fn estimate(steps: &[PromptSpec], max_depth: u32) -> u64 {
    let base = steps.len() as u64;
    let expanding = steps.iter().filter(|s| s.self_expand).count() as u64;
    base + expanding * u64::from(max_depth)
}
