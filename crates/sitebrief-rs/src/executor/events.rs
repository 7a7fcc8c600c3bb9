//! Events emitted by the [`Orchestrator`](super::Orchestrator) during a run.
//!
//! Callers implement [`EventHandler`] to drive progress bars, status lines,
//! or metrics. Handlers are observe-only: the abort policy is fixed by the
//! engine and cannot be overridden from an event.
//!
//! | Handler | Use case |
//! |---------|----------|
//! | [`NoopHandler`] | Tests or fire-and-forget runs |
//! | [`LoggingHandler`] | Structured logging via `tracing` |
//! | [`FnEventHandler`] | Quick closures for simple callbacks |
//! | [`CompositeEventHandler`] | Compose multiple handlers in order |

use crate::error::ExecutorError;
use crate::executor::state::RunStatus;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Events emitted during a run.
///
/// `depth` is the nesting level of the run that emitted the event:
/// 0 for the caller's run, 1 for a self-expansion sub-run, and so on.
#[derive(Debug)]
pub enum ExecutorEvent<'a> {
    /// A run (or expansion sub-run) is starting.
    RunStarted {
        run_id: &'a str,
        steps: usize,
        credits_required: u64,
        depth: u32,
    },
    /// The plan failed dependency validation; nothing will execute.
    ValidationFailed {
        run_id: &'a str,
        error: &'a ExecutorError,
    },
    /// A step is about to be sent to the gateway.
    StepStarted {
        index: usize,
        total: usize,
        label: &'a str,
        depth: u32,
    },
    /// A step produced content.
    StepCompleted {
        index: usize,
        total: usize,
        label: &'a str,
        chars: usize,
        remaining_credits: Option<u64>,
        depth: u32,
    },
    /// A step halted its run.
    StepFailed {
        index: usize,
        label: &'a str,
        error: &'a ExecutorError,
        depth: u32,
    },
    /// A self-expanding step is spawning its follow-on sub-run.
    ExpansionStarted {
        parent: usize,
        label: &'a str,
        depth_remaining: u32,
    },
    /// The expansion sub-run produced results.
    ExpansionCompleted { parent: usize, produced: usize },
    /// The expansion sub-run failed. The parent run continues.
    ExpansionFailed {
        parent: usize,
        label: &'a str,
        error: &'a ExecutorError,
    },
    /// A run reached a terminal state.
    RunFinished {
        run_id: &'a str,
        status: RunStatus,
        executed: usize,
        depth: u32,
    },
    /// A security failure scheduled an environment reload.
    ReloadScheduled { after: Duration },
}

/// Handler for executor events.
///
/// ```ignore
/// struct Progress;
///
/// impl EventHandler for Progress {
///     fn on_event(&self, event: &ExecutorEvent<'_>) {
///         if let ExecutorEvent::StepCompleted { index, total, .. } = event {
///             println!("{}/{}", index + 1, total);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called for each event during the run. The default does nothing.
    fn on_event(&self, event: &ExecutorEvent<'_>) {
        let _ = event;
    }
}

/// A no-op event handler.
pub struct NoopHandler;
impl EventHandler for NoopHandler {}

/// An event handler backed by a closure.
pub struct FnEventHandler<F>(F)
where
    F: Fn(&ExecutorEvent<'_>) + Send + Sync;

impl<F> FnEventHandler<F>
where
    F: Fn(&ExecutorEvent<'_>) + Send + Sync,
{
    pub fn new(f: F) -> Self {
        Self(f)
    }
}

impl<F> EventHandler for FnEventHandler<F>
where
    F: Fn(&ExecutorEvent<'_>) + Send + Sync,
{
    fn on_event(&self, event: &ExecutorEvent<'_>) {
        (self.0)(event);
    }
}

/// An event handler that delegates to multiple inner handlers, in
/// registration order.
pub struct CompositeEventHandler {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl CompositeEventHandler {
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// Add a handler to the chain.
    pub fn with(mut self, handler: impl EventHandler + 'static) -> Self {
        self.handlers.push(Box::new(handler));
        self
    }

    /// Conditionally add a handler to the chain.
    pub fn with_if(self, condition: bool, handler: impl EventHandler + 'static) -> Self {
        if condition { self.with(handler) } else { self }
    }
}

impl Default for CompositeEventHandler {
    fn default() -> Self {
        Self::new()
    }
}

impl EventHandler for CompositeEventHandler {
    fn on_event(&self, event: &ExecutorEvent<'_>) {
        for handler in &self.handlers {
            handler.on_event(event);
        }
    }
}

/// An event handler that logs events via `tracing`.
pub struct LoggingHandler;

impl EventHandler for LoggingHandler {
    fn on_event(&self, event: &ExecutorEvent<'_>) {
        match event {
            ExecutorEvent::RunStarted {
                run_id,
                steps,
                credits_required,
                depth,
            } => {
                if *depth == 0 {
                    info!("[{run_id}] run started: {steps} step(s), up to {credits_required} credit(s)");
                } else {
                    debug!("[{run_id}] expansion sub-run started at depth {depth}");
                }
            }
            ExecutorEvent::ValidationFailed { run_id, error } => {
                warn!("[{run_id}] plan rejected: {error}");
            }
            ExecutorEvent::StepStarted {
                index,
                total,
                label,
                depth,
            } => {
                debug!("step {}/{} '{label}' started (depth {depth})", index + 1, total);
            }
            ExecutorEvent::StepCompleted {
                index,
                total,
                label,
                chars,
                remaining_credits,
                ..
            } => {
                let credits = remaining_credits
                    .map(|c| format!(", {c} credit(s) left"))
                    .unwrap_or_default();
                info!(
                    "step {}/{} '{label}' completed: {chars} chars{credits}",
                    index + 1,
                    total
                );
            }
            ExecutorEvent::StepFailed {
                index,
                label,
                error,
                ..
            } => {
                warn!("step {} '{label}' failed: {error}", index + 1);
            }
            ExecutorEvent::ExpansionStarted {
                parent,
                label,
                depth_remaining,
            } => {
                debug!(
                    "expanding step {} '{label}' ({depth_remaining} level(s) left)",
                    parent + 1
                );
            }
            ExecutorEvent::ExpansionCompleted { parent, produced } => {
                debug!("expansion of step {} produced {produced} result(s)", parent + 1);
            }
            ExecutorEvent::ExpansionFailed {
                parent,
                label,
                error,
            } => {
                warn!(
                    "expansion of step {} '{label}' failed, continuing: {error}",
                    parent + 1
                );
            }
            ExecutorEvent::RunFinished {
                run_id,
                status,
                executed,
                depth,
            } => {
                if *depth == 0 {
                    info!("[{run_id}] run {status}: {executed} step(s) executed");
                } else {
                    debug!("[{run_id}] expansion sub-run {status}");
                }
            }
            ExecutorEvent::ReloadScheduled { after } => {
                warn!(
                    "security context rejected; environment reload in {:.1}s",
                    after.as_secs_f64()
                );
            }
        }
    }
}
