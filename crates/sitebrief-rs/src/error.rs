//! Error taxonomy for prompt runs.
//!
//! Every halting condition of a run is an [`ExecutorError`] variant. Each
//! variant maps to exactly one [`Recovery`] so callers (CLI, web handlers,
//! UIs) can decide what to offer the user without matching on message text.
//!
//! Failures inside a self-expansion sub-run are absent here: they are
//! logged and reported as an
//! [`ExecutorEvent::ExpansionFailed`](crate::executor::events::ExecutorEvent::ExpansionFailed)
//! event, never returned to the caller.

use serde::Serialize;
use thiserror::Error;

/// Why a run stopped before processing all of its steps.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ExecutorError {
    /// A step declared a dependency on itself or on a later step.
    /// Detected before any network call.
    #[error(
        "step {step} ('{label}') depends on step {dependency}, which is not an earlier step"
    )]
    Validation {
        step: usize,
        label: String,
        dependency: usize,
    },
    /// The credit service rejected the request: the caller is out of credits.
    #[error("quota exceeded: {message}")]
    QuotaExceeded { message: String },
    /// The gateway rejected the security token.
    #[error("security check failed: {message}")]
    SecurityFailure { message: String },
    /// No security token could be obtained from the challenge issuer.
    #[error("security token unavailable: {message}")]
    SecurityTokenUnavailable { message: String },
    /// Network or backend failure that is not a quota or security signal.
    #[error("generation failed: {message}")]
    Generation { message: String },
    /// The caller's stop signal fired between steps.
    #[error("run cancelled")]
    Cancelled,
}

/// The recovery path a caller should offer for a halted run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Recovery {
    /// Fix the plan's dependency declarations; nothing was executed.
    FixPlan,
    /// Buy or wait for more credits. No automatic retry.
    TopUpCredits,
    /// The security context is assumed poisoned; a full reload is scheduled.
    ReloadEnvironment,
    /// Transient problem; the user may start the run again.
    RetryManually,
    /// Nothing to do (the caller asked to stop).
    None,
}

impl ExecutorError {
    /// Recovery policy for this error.
    pub fn recovery(&self) -> Recovery {
        match self {
            ExecutorError::Validation { .. } => Recovery::FixPlan,
            ExecutorError::QuotaExceeded { .. } => Recovery::TopUpCredits,
            ExecutorError::SecurityFailure { .. } => Recovery::ReloadEnvironment,
            ExecutorError::SecurityTokenUnavailable { .. } | ExecutorError::Generation { .. } => {
                Recovery::RetryManually
            }
            ExecutorError::Cancelled => Recovery::None,
        }
    }

    /// Status line shown to the user when a run halts with this error.
    ///
    /// Quota messages come from the credit service and are surfaced verbatim.
    pub fn user_message(&self) -> String {
        match self {
            ExecutorError::Validation { .. } => format!("The plan is invalid: {self}."),
            ExecutorError::QuotaExceeded { message } => message.clone(),
            ExecutorError::SecurityFailure { .. } => {
                "Security verification failed. Reloading to start a fresh session.".to_string()
            }
            ExecutorError::SecurityTokenUnavailable { .. } => {
                "Security verification is not available right now. Please try again.".to_string()
            }
            ExecutorError::Generation { message } => {
                format!("Generation failed ({message}). Please try again.")
            }
            ExecutorError::Cancelled => "Run cancelled.".to_string(),
        }
    }

    /// Whether this error means the caller has no credits left.
    pub fn is_quota(&self) -> bool {
        matches!(self, ExecutorError::QuotaExceeded { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_error_has_one_recovery() {
        let quota = ExecutorError::QuotaExceeded {
            message: "Out of credits".into(),
        };
        assert_eq!(quota.recovery(), Recovery::TopUpCredits);
        assert!(quota.is_quota());

        let security = ExecutorError::SecurityFailure {
            message: "bad token".into(),
        };
        assert_eq!(security.recovery(), Recovery::ReloadEnvironment);

        let generic = ExecutorError::Generation {
            message: "HTTP 502".into(),
        };
        assert_eq!(generic.recovery(), Recovery::RetryManually);
        assert!(!generic.is_quota());

        assert_eq!(ExecutorError::Cancelled.recovery(), Recovery::None);
    }

    #[test]
    fn quota_message_is_verbatim() {
        let err = ExecutorError::QuotaExceeded {
            message: "You have used all 20 credits for today.".into(),
        };
        assert_eq!(err.user_message(), "You have used all 20 credits for today.");
    }

    #[test]
    fn validation_names_the_offending_pair() {
        let err = ExecutorError::Validation {
            step: 1,
            label: "Audience".into(),
            dependency: 3,
        };
        let text = err.to_string();
        assert!(text.contains("step 1"));
        assert!(text.contains("step 3"));
        assert!(text.contains("Audience"));
        assert_eq!(err.recovery(), Recovery::FixPlan);
    }

    #[test]
    fn serializes_with_kind_tag() {
        let err = ExecutorError::Generation {
            message: "timeout".into(),
        };
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["kind"], "generation");
        assert_eq!(json["message"], "timeout");

        let json = serde_json::to_value(ExecutorError::Cancelled).unwrap();
        assert_eq!(json["kind"], "cancelled");
    }
}
