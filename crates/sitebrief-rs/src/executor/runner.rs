//! Execution of a single step: token, request, classification.
//!
//! The runner never touches run state. It returns a [`StepOutcome`] and the
//! orchestrator decides what that outcome means for the run.

use crate::api::retry::RetryConfig;
use crate::executor::config::RunContext;
use crate::plan::PromptSpec;
use crate::{
    ChallengeIssuer, GatewayReply, GenerationCall, GenerationRequest, Generator,
    SECURITY_REJECTION_SENTINEL,
};
use tracing::{debug, warn};

/// Classified result of one generation attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepOutcome {
    /// Content generated. `remaining_credits` is what the credit service
    /// reported after charging, when it said.
    Success {
        content: String,
        remaining_credits: Option<u64>,
    },
    /// The caller is out of credits.
    QuotaExceeded { message: String },
    /// The gateway rejected the security token.
    SecurityFailure { message: String },
    /// The challenge issuer could not produce a token.
    SecurityTokenUnavailable { message: String },
    /// Anything else: transport failure, unexpected status, empty reply.
    GenericFailure { message: String },
}

/// Classify a gateway reply.
///
/// Order matters: the security sentinel wins over any status, then quota
/// (429 or an explicit `quotaExceeded` flag), then success, then everything
/// else is a generic failure.
pub fn classify(reply: &GatewayReply) -> StepOutcome {
    let body = &reply.body;
    let error_text = body.get("error").and_then(|v| v.as_str());
    let message_text = body.get("message").and_then(|v| v.as_str());

    if [error_text, message_text]
        .iter()
        .flatten()
        .any(|t| t.contains(SECURITY_REJECTION_SENTINEL))
    {
        return StepOutcome::SecurityFailure {
            message: error_text.or(message_text).unwrap_or_default().to_string(),
        };
    }

    let quota_flag = body
        .get("quotaExceeded")
        .and_then(|v| v.as_bool())
        .unwrap_or(false);
    if reply.status == 429 || quota_flag {
        return StepOutcome::QuotaExceeded {
            message: message_text
                .or(error_text)
                .unwrap_or("Credit limit reached.")
                .to_string(),
        };
    }

    if reply.is_success() {
        return match body.get("content").and_then(|v| v.as_str()) {
            Some(content) => StepOutcome::Success {
                content: content.to_string(),
                remaining_credits: body.get("remainingCredits").and_then(|v| v.as_u64()),
            },
            None => StepOutcome::GenericFailure {
                message: "empty generation response".to_string(),
            },
        };
    }

    StepOutcome::GenericFailure {
        message: error_text
            .or(message_text)
            .map(String::from)
            .unwrap_or_else(|| format!("HTTP {}", reply.status)),
    }
}

/// Runs individual steps against the collaborators.
pub struct StepRunner<'a> {
    generator: &'a dyn Generator,
    challenge: &'a dyn ChallengeIssuer,
    challenge_action: &'a str,
    retry: &'a RetryConfig,
}

impl<'a> StepRunner<'a> {
    pub fn new(
        generator: &'a dyn Generator,
        challenge: &'a dyn ChallengeIssuer,
        challenge_action: &'a str,
        retry: &'a RetryConfig,
    ) -> Self {
        Self {
            generator,
            challenge,
            challenge_action,
            retry,
        }
    }

    /// Execute one step with its already-composed prompt.
    ///
    /// `credits_required` is the cost of this and all remaining steps, sent
    /// as a hint so the credit service can pre-charge or reject up front.
    /// Each attempt acquires a fresh one-time token.
    pub async fn run_step(
        &self,
        step: &PromptSpec,
        composed_prompt: String,
        ctx: &RunContext,
        credits_required: u64,
        model: Option<&str>,
    ) -> StepOutcome {
        let mut attempt = 0;
        loop {
            let token = match self.challenge.issue(self.challenge_action).await {
                Ok(token) => token,
                Err(e) => {
                    warn!("No security token for step '{}': {e}", step.label);
                    return StepOutcome::SecurityTokenUnavailable { message: e };
                }
            };

            let call = GenerationCall {
                request: GenerationRequest {
                    prompt: composed_prompt.clone(),
                    client_fingerprint: ctx.client_fingerprint.clone(),
                    security_token: token,
                    picked_model: model.map(String::from),
                },
                user_id: ctx.user_id.clone(),
                auth_token: ctx.auth_token.clone(),
                credits_required,
            };

            match self.generator.generate(&call).await {
                Ok(reply) => {
                    let outcome = classify(&reply);
                    debug!(
                        "Step '{}' classified as {} (HTTP {})",
                        step.label,
                        outcome_name(&outcome),
                        reply.status
                    );
                    return outcome;
                }
                Err(e) if self.retry.should_retry(attempt, &e) => {
                    let delay = self.retry.delay_for_attempt(attempt);
                    warn!(
                        "Step '{}' transport error (attempt {}): {e}. Retrying in {:.1}s",
                        step.label,
                        attempt + 1,
                        delay.as_secs_f64()
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return StepOutcome::GenericFailure { message: e },
            }
        }
    }
}

fn outcome_name(outcome: &StepOutcome) -> &'static str {
    match outcome {
        StepOutcome::Success { .. } => "success",
        StepOutcome::QuotaExceeded { .. } => "quota_exceeded",
        StepOutcome::SecurityFailure { .. } => "security_failure",
        StepOutcome::SecurityTokenUnavailable { .. } => "security_token_unavailable",
        StepOutcome::GenericFailure { .. } => "generic_failure",
    }
}
