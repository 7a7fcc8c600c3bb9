//! The execution engine.
//!
//! [`Orchestrator`] is the entry point. For each step, in input order, it
//! composes the dependency context ([`crate::plan::compose`]), runs the step
//! through the [`StepRunner`], optionally expands a successful step into a
//! nested sub-run, and feeds the outcome into the [`RunState`] state machine.
//! Observers attach through [`EventHandler`].

pub mod config;
pub mod events;
pub mod expand;
pub mod orchestrator;
pub mod runner;
pub mod state;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{ExecutorConfig, RunContext};
pub use events::{
    CompositeEventHandler, EventHandler, ExecutorEvent, FnEventHandler, LoggingHandler,
    NoopHandler,
};
pub use expand::{EXPANSION_INSTRUCTION, expansion_spec};
pub use orchestrator::{FnReloader, Orchestrator, Reloader, RunReport};
pub use runner::{StepOutcome, StepRunner, classify};
pub use state::{RunState, RunStatus, StepResult, Transition};
