//! The run orchestrator: validation, sequencing, abort policy, reload.

use crate::api::tracing::{expansion_span_id, generate_run_id};
use crate::error::{ExecutorError, Recovery};
use crate::executor::config::{ExecutorConfig, RunContext};
use crate::executor::events::{EventHandler, ExecutorEvent, NoopHandler};
use crate::executor::runner::StepRunner;
use crate::executor::state::{RunState, RunStatus, StepResult, Transition};
use crate::plan::{self, PromptSpec};
use crate::{ChallengeIssuer, Generator};
use futures::future::BoxFuture;
use serde::Serialize;
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

// ── Reloader ───────────────────────────────────────────────────────

/// Environment-reload hook, invoked after a security failure.
///
/// A rejected security token means the whole client session is suspect, so
/// the only recovery offered is to start a fresh one.
pub trait Reloader: Send + Sync {
    fn reload(&self);
}

/// A reloader backed by a closure.
pub struct FnReloader<F>(F)
where
    F: Fn() + Send + Sync;

impl<F> FnReloader<F>
where
    F: Fn() + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> Reloader for FnReloader<F>
where
    F: Fn() + Send + Sync,
{
    fn reload(&self) {
        (self.0)();
    }
}

// ── RunReport ──────────────────────────────────────────────────────

/// Terminal state of a run.
#[derive(Debug, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub status: RunStatus,
    /// Every output in emission order. Partial when the run aborted.
    pub results: Vec<StepResult>,
    /// Steps of this run that succeeded. Expansion outputs are not counted.
    pub executed_count: usize,
    /// `None` when the run completed.
    pub error: Option<ExecutorError>,
    pub user_message: String,
    /// `false` once the credit service reported the caller out of credits.
    pub has_credits: bool,
    pub remaining_credits: Option<u64>,
    /// Worst-case credit cost computed before the run started.
    pub credits_required: u64,
    /// RFC 3339 timestamps.
    pub started_at: String,
    pub finished_at: String,
    /// Pending environment reload, set after a security failure.
    #[serde(skip)]
    pub reload_task: Option<JoinHandle<()>>,
}

impl RunReport {
    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }

    /// What the caller should do next.
    pub fn recovery(&self) -> Recovery {
        self.error
            .as_ref()
            .map(ExecutorError::recovery)
            .unwrap_or(Recovery::None)
    }

    /// Content of the successful results, in emission order.
    pub fn contents(&self) -> Vec<&str> {
        self.results
            .iter()
            .filter_map(|r| r.content.as_deref())
            .collect()
    }
}

// ── Orchestrator ───────────────────────────────────────────────────

/// Sequential executor for a list of dependent prompt steps.
///
/// ```ignore
/// let report = Orchestrator::new(&gateway, &challenge, ExecutorConfig::default())
///     .with_context(RunContext::anonymous().with_user("u-1"))
///     .with_event_handler(&LoggingHandler)
///     .run(&steps)
///     .await;
/// ```
///
/// Each call to [`run`](Self::run) owns a fresh [`RunState`]; an
/// orchestrator can be reused for any number of runs.
pub struct Orchestrator<'a> {
    pub(super) generator: &'a dyn Generator,
    pub(super) challenge: &'a dyn ChallengeIssuer,
    pub(super) config: ExecutorConfig,
    pub(super) context: RunContext,
    pub(super) event_handler: &'a dyn EventHandler,
    stop_signal: Option<Box<dyn Fn() -> bool + Send + Sync + 'a>>,
    reloader: Option<Arc<dyn Reloader>>,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        challenge: &'a dyn ChallengeIssuer,
        config: ExecutorConfig,
    ) -> Self {
        Self {
            generator,
            challenge,
            config,
            context: RunContext::anonymous(),
            event_handler: &NoopHandler,
            stop_signal: None,
            reloader: None,
        }
    }

    /// Set the caller identity and fingerprint forwarded with every request.
    pub fn with_context(mut self, context: RunContext) -> Self {
        self.context = context;
        self
    }

    pub fn with_event_handler(mut self, handler: &'a dyn EventHandler) -> Self {
        self.event_handler = handler;
        self
    }

    /// Set a cancellation check, polled before every step and before every
    /// expansion. Returning `true` aborts the run with
    /// [`ExecutorError::Cancelled`], keeping the results produced so far.
    pub fn with_stop_signal(mut self, signal: impl Fn() -> bool + Send + Sync + 'a) -> Self {
        self.stop_signal = Some(Box::new(signal));
        self
    }

    /// Set the hook called after a security failure.
    pub fn with_reloader(mut self, reloader: Arc<dyn Reloader>) -> Self {
        self.reloader = Some(reloader);
        self
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    pub(super) fn is_stopped(&self) -> bool {
        self.stop_signal.as_ref().is_some_and(|signal| signal())
    }

    /// Execute `steps` in order and return the terminal report.
    ///
    /// Never returns `Err`: every failure is folded into the report's
    /// `error`, and whatever was produced before the failure is kept.
    pub async fn run(&self, steps: &[PromptSpec]) -> RunReport {
        let run_id = generate_run_id();
        let mut report = self
            .execute(steps, self.config.max_depth, 0, run_id)
            .await;

        if matches!(report.error, Some(ExecutorError::SecurityFailure { .. })) {
            report.reload_task = self.schedule_reload();
        }
        report
    }

    fn schedule_reload(&self) -> Option<JoinHandle<()>> {
        let Some(reloader) = self.reloader.clone() else {
            debug!("Security failure with no reloader configured");
            return None;
        };
        let delay = self.config.reload_delay;
        self.event_handler
            .on_event(&ExecutorEvent::ReloadScheduled { after: delay });
        Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            info!("Reloading environment after security failure");
            reloader.reload();
        }))
    }

    /// One run (or expansion sub-run) at nesting `level`.
    ///
    /// Boxed so that self-expansion can re-enter it.
    pub(super) fn execute<'s>(
        &'s self,
        steps: &'s [PromptSpec],
        depth_remaining: u32,
        level: u32,
        run_id: String,
    ) -> BoxFuture<'s, RunReport> {
        Box::pin(async move {
            let started_at = chrono::Utc::now().to_rfc3339();
            let credits_required = plan::estimate(steps, depth_remaining);
            let total = steps.len();
            let mut state = RunState::new(total, level);

            self.event_handler.on_event(&ExecutorEvent::RunStarted {
                run_id: &run_id,
                steps: total,
                credits_required,
                depth: level,
            });

            if let Err(e) = plan::validate(steps) {
                self.event_handler.on_event(&ExecutorEvent::ValidationFailed {
                    run_id: &run_id,
                    error: &e,
                });
                state.halt(e);
                return self.finish(state, run_id, level, credits_required, started_at);
            }

            state.start();
            let runner = StepRunner::new(
                self.generator,
                self.challenge,
                &self.config.challenge_action,
                &self.config.retry,
            );
            let model = self.config.routing.model_for_level(level);

            for (index, step) in steps.iter().enumerate() {
                if self.is_stopped() {
                    info!("[{run_id}] stop signal received before step {}", index + 1);
                    state.halt(ExecutorError::Cancelled);
                    break;
                }

                self.event_handler.on_event(&ExecutorEvent::StepStarted {
                    index,
                    total,
                    label: &step.label,
                    depth: level,
                });

                let composed = plan::compose(&step.depends_on, &state.step_outputs, steps);
                let prompt = plan::context::final_prompt(step, &composed);
                let hint = plan::estimate(&steps[index..], depth_remaining);

                let outcome = runner
                    .run_step(step, prompt, &self.context, hint, model)
                    .await;

                match Transition::from(outcome) {
                    Transition::Advance {
                        content,
                        remaining_credits,
                    } => {
                        self.event_handler.on_event(&ExecutorEvent::StepCompleted {
                            index,
                            total,
                            label: &step.label,
                            chars: content.chars().count(),
                            remaining_credits,
                            depth: level,
                        });
                        state.record_success(index, step, content.clone(), remaining_credits);

                        if step.self_expand && depth_remaining > 0 {
                            if self.is_stopped() {
                                info!("[{run_id}] stop signal received before expansion");
                                state.halt(ExecutorError::Cancelled);
                                break;
                            }
                            let span = expansion_span_id(&run_id, index);
                            let expansion = self
                                .maybe_expand(step, index, &content, depth_remaining, level, span)
                                .await;
                            if let Some(credits) = expansion.remaining_credits {
                                state.remaining_credits = Some(credits);
                            }
                            state.append_expansion(expansion.results);
                        }
                    }
                    Transition::Halt(error) => {
                        self.event_handler.on_event(&ExecutorEvent::StepFailed {
                            index,
                            label: &step.label,
                            error: &error,
                            depth: level,
                        });
                        state.halt(error);
                        break;
                    }
                }
            }

            state.finish();
            self.finish(state, run_id, level, credits_required, started_at)
        })
    }

    fn finish(
        &self,
        state: RunState,
        run_id: String,
        level: u32,
        credits_required: u64,
        started_at: String,
    ) -> RunReport {
        self.event_handler.on_event(&ExecutorEvent::RunFinished {
            run_id: &run_id,
            status: state.status,
            executed: state.executed_count,
            depth: level,
        });
        if let Some(ref error) = state.error {
            if level == 0 {
                warn!("[{run_id}] run aborted after {} step(s): {error}", state.executed_count);
            } else {
                debug!("[{run_id}] sub-run aborted: {error}");
            }
        }

        RunReport {
            run_id,
            status: state.status,
            results: state.results,
            executed_count: state.executed_count,
            error: state.error,
            user_message: state.user_message,
            has_credits: state.has_credits,
            remaining_credits: state.remaining_credits,
            credits_required,
            started_at,
            finished_at: chrono::Utc::now().to_rfc3339(),
            reload_task: None,
        }
    }
}
