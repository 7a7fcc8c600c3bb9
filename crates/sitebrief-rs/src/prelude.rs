//! Convenience re-exports for common `sitebrief-rs` types.
//!
//! Meant to be glob-imported by programs that run plans:
//!
//! ```ignore
//! use sitebrief_rs::prelude::*;
//! ```
//!
//! Lower-level pieces (the step runner, the run state machine, the retry
//! policy) are left out; import those from their modules directly.

// ── Plans ───────────────────────────────────────────────────────────
pub use crate::plan::{DependencySet, Plan, PromptSpec, compose, estimate, validate};

// ── Collaborators ───────────────────────────────────────────────────
pub use crate::{
    ChallengeIssuer, GatewayReply, GenerationCall, Generator, HttpChallengeIssuer, HttpGateway,
    StaticChallenge,
};

// ── Execution ───────────────────────────────────────────────────────
pub use crate::api::router::RoutingStrategy;
pub use crate::executor::{
    CompositeEventHandler, EventHandler, ExecutorConfig, ExecutorEvent, FnEventHandler,
    FnReloader, LoggingHandler, NoopHandler, Orchestrator, Reloader, RunContext, RunReport,
    RunStatus, StepResult,
};

// ── Errors & output ─────────────────────────────────────────────────
pub use crate::document::render as render_document;
pub use crate::error::{ExecutorError, Recovery};
