//! Run state machine: `Idle → Running → {Completed, Aborted}`.
//!
//! [`RunState`] is created fresh for every invocation and mutated only by
//! the orchestrator. The decision whether a step outcome continues or halts
//! the run is made in one place, [`Transition::from`], so the abort policy
//! is a declared mapping rather than scattered control flow.

use crate::error::ExecutorError;
use crate::executor::runner::StepOutcome;
use crate::plan::PromptSpec;
use serde::Serialize;

/// Lifecycle of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Idle,
    Running,
    Completed,
    Aborted,
}

impl std::fmt::Display for RunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RunStatus::Idle => write!(f, "idle"),
            RunStatus::Running => write!(f, "running"),
            RunStatus::Completed => write!(f, "completed"),
            RunStatus::Aborted => write!(f, "aborted"),
        }
    }
}

/// One generated output.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StepResult {
    /// Position of the producing step in its own run's step list.
    pub index: usize,
    pub label: String,
    pub content: Option<String>,
    pub succeeded: bool,
    /// 0 for top-level steps, 1 for their expansions, and so on.
    pub depth: u32,
}

/// What the run does next after a step outcome.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Store the content and move to the next step.
    Advance {
        content: String,
        remaining_credits: Option<u64>,
    },
    /// Stop the run with this error.
    Halt(ExecutorError),
}

impl From<StepOutcome> for Transition {
    fn from(outcome: StepOutcome) -> Self {
        match outcome {
            StepOutcome::Success {
                content,
                remaining_credits,
            } => Transition::Advance {
                content,
                remaining_credits,
            },
            StepOutcome::QuotaExceeded { message } => {
                Transition::Halt(ExecutorError::QuotaExceeded { message })
            }
            StepOutcome::SecurityFailure { message } => {
                Transition::Halt(ExecutorError::SecurityFailure { message })
            }
            StepOutcome::SecurityTokenUnavailable { message } => {
                Transition::Halt(ExecutorError::SecurityTokenUnavailable { message })
            }
            StepOutcome::GenericFailure { message } => {
                Transition::Halt(ExecutorError::Generation { message })
            }
        }
    }
}

/// Mutable state of one run.
#[derive(Debug)]
pub struct RunState {
    pub status: RunStatus,
    /// Steps of this run that completed successfully (expansions excluded).
    pub executed_count: usize,
    /// Every output in emission order, expansions directly after their parent.
    pub results: Vec<StepResult>,
    /// Output of step `i` of this run, for context composition. Keyed by
    /// step index, so expansion results never shift dependency lookups.
    pub step_outputs: Vec<Option<String>>,
    pub error: Option<ExecutorError>,
    pub user_message: String,
    pub has_credits: bool,
    /// Last credit balance the gateway reported.
    pub remaining_credits: Option<u64>,
    total_steps: usize,
    depth: u32,
}

impl RunState {
    /// Fresh `Idle` state for a run of `total_steps` steps at nesting `depth`.
    pub fn new(total_steps: usize, depth: u32) -> Self {
        Self {
            status: RunStatus::Idle,
            executed_count: 0,
            results: Vec::new(),
            step_outputs: vec![None; total_steps],
            error: None,
            user_message: String::new(),
            has_credits: true,
            remaining_credits: None,
            total_steps,
            depth,
        }
    }

    /// `Idle → Running`.
    pub fn start(&mut self) {
        debug_assert_eq!(self.status, RunStatus::Idle);
        self.status = RunStatus::Running;
        self.user_message = format!("Generating {} step(s)...", self.total_steps);
    }

    /// Record a successful step.
    pub fn record_success(
        &mut self,
        index: usize,
        step: &PromptSpec,
        content: String,
        remaining_credits: Option<u64>,
    ) {
        if let Some(slot) = self.step_outputs.get_mut(index) {
            *slot = Some(content.clone());
        }
        self.results.push(StepResult {
            index,
            label: step.label.clone(),
            content: Some(content),
            succeeded: true,
            depth: self.depth,
        });
        self.executed_count += 1;
        if remaining_credits.is_some() {
            self.remaining_credits = remaining_credits;
        }
        self.user_message = format!(
            "Completed step {} of {}: {}",
            index + 1,
            self.total_steps,
            step.label
        );
    }

    /// Append expansion outputs after the parent's own result.
    pub fn append_expansion(&mut self, results: Vec<StepResult>) {
        self.results.extend(results);
    }

    /// `Idle | Running → Aborted`. Accumulated results are kept.
    pub fn halt(&mut self, error: ExecutorError) {
        if error.is_quota() {
            self.has_credits = false;
        }
        self.user_message = error.user_message();
        self.error = Some(error);
        self.status = RunStatus::Aborted;
    }

    /// `Running → Completed`, unless the run already halted.
    pub fn finish(&mut self) {
        if self.status == RunStatus::Running {
            self.status = RunStatus::Completed;
            self.user_message = format!("All {} step(s) completed.", self.total_steps);
        }
    }
}
