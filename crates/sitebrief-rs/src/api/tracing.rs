//! Correlation ids for runs.
//!
//! Each top-level run gets a `run_id`; each self-expansion sub-run gets a
//! span id derived from its parent's id and the expanding step's index, so a
//! single grep finds every log line of a run including its expansions.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::SystemTime;

/// Generate a unique id for a run.
pub fn generate_run_id() -> String {
    let ts = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .as_nanos();
    // Counter disambiguates ids created within the same nanosecond.
    static COUNTER: AtomicU64 = AtomicU64::new(0);
    let count = COUNTER.fetch_add(1, Ordering::Relaxed);
    format!("run-{ts:x}-{count:04x}")
}

/// Span id for the expansion sub-run of step `parent_index`.
pub fn expansion_span_id(run_id: &str, parent_index: usize) -> String {
    format!("{run_id}:x{parent_index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_ids_are_unique() {
        let a = generate_run_id();
        let b = generate_run_id();
        assert_ne!(a, b);
        assert!(a.starts_with("run-"));
    }

    #[test]
    fn expansion_spans_nest() {
        let span = expansion_span_id("run-abc-0001", 2);
        assert_eq!(span, "run-abc-0001:x2");
        assert_eq!(expansion_span_id(&span, 0), "run-abc-0001:x2:x0");
    }
}
