//! Gateway plumbing shared by every run: retry policy, model routing, and
//! correlation ids.
//!
//! - [`retry`]: backoff for transport failures (no HTTP reply at all).
//!   Classified gateway replies are never retried.
//! - [`router`]: [`RoutingStrategy`] picks the `pickedModel` for a step,
//!   optionally a different one for self-expansion sub-runs.
//! - [`tracing`]: run ids and expansion span ids for correlated logs.

pub mod retry;
pub mod router;
pub mod tracing;

pub use retry::RetryConfig;
pub use router::RoutingStrategy;
pub use self::tracing::{expansion_span_id, generate_run_id};
