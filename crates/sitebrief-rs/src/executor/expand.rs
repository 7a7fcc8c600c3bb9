//! Self-expansion: one follow-on generation derived from a step's output.
//!
//! An expansion is a nested, sequential sub-run of the same engine on a
//! single derived step, with one less level of depth budget. Its failures
//! stay inside it.

use crate::executor::events::ExecutorEvent;
use crate::executor::orchestrator::Orchestrator;
use crate::executor::state::StepResult;
use crate::plan::PromptSpec;
use tracing::warn;

/// Instruction prepended to the parent output in an expansion prompt.
pub const EXPANSION_INSTRUCTION: &str = "Using the content below as your starting point, \
write additional focused follow-on prompts that would deepen this part of the brief. \
Cover angles the content does not already address. Give each prompt a short title \
followed by the prompt text, one per paragraph.";

/// Build the derived step for `parent`, seeded with its output.
///
/// The derived step never expands further on its own; deeper expansion
/// is bounded by the depth budget of the sub-run.
pub fn expansion_spec(parent: &PromptSpec, output: &str) -> PromptSpec {
    PromptSpec::new(
        format!("{} (expanded)", parent.label),
        format!(
            "{EXPANSION_INSTRUCTION}\n\n### {} ###\n{output}",
            parent.label
        ),
    )
    .with_self_expand(false)
}

/// Outputs of an expansion sub-run that reach the parent run.
#[derive(Debug, Default)]
pub(super) struct Expansion {
    pub results: Vec<StepResult>,
    pub remaining_credits: Option<u64>,
}

impl Orchestrator<'_> {
    /// Run the expansion sub-run for a successful self-expanding step.
    ///
    /// Returns nothing when the step does not expand, the depth budget is
    /// spent, or the sub-run failed. A failed sub-run never affects the
    /// parent run; any partial sub-run output is discarded with it.
    pub(super) async fn maybe_expand(
        &self,
        step: &PromptSpec,
        index: usize,
        content: &str,
        depth_remaining: u32,
        level: u32,
        span_id: String,
    ) -> Expansion {
        if !step.self_expand || depth_remaining == 0 {
            return Expansion::default();
        }

        self.event_handler.on_event(&ExecutorEvent::ExpansionStarted {
            parent: index,
            label: &step.label,
            depth_remaining,
        });

        let derived = [expansion_spec(step, content)];
        let report = self
            .execute(&derived, depth_remaining - 1, level + 1, span_id)
            .await;

        match report.error {
            Some(ref error) => {
                warn!(
                    "[{}] expansion of '{}' failed: {error}",
                    report.run_id, step.label
                );
                self.event_handler.on_event(&ExecutorEvent::ExpansionFailed {
                    parent: index,
                    label: &step.label,
                    error,
                });
                Expansion::default()
            }
            None => {
                self.event_handler
                    .on_event(&ExecutorEvent::ExpansionCompleted {
                        parent: index,
                        produced: report.results.len(),
                    });
                Expansion {
                    results: report.results,
                    remaining_credits: report.remaining_credits,
                }
            }
        }
    }
}
