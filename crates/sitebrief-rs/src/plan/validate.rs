//! Static dependency checks.
//!
//! A dependency index is valid only if it is strictly less than the index of
//! the step declaring it. Checking against linear position (instead of a
//! separately declared order) makes the dependency graph a DAG consistent
//! with execution order by construction: no cycles, no forward references.

use crate::error::ExecutorError;
use crate::plan::PromptSpec;

/// Check every step's dependency declaration.
///
/// Returns the first offending `(step, dependency)` pair found, scanning
/// steps in order and each step's dependencies in declaration order.
pub fn validate(steps: &[PromptSpec]) -> Result<(), ExecutorError> {
    for (index, step) in steps.iter().enumerate() {
        if let Some(dependency) = step.depends_on.first_at_or_above(index) {
            return Err(ExecutorError::Validation {
                step: index,
                label: step.label.clone(),
                dependency,
            });
        }
    }
    Ok(())
}
