//! Configuration for the [`Orchestrator`](super::Orchestrator).
//!
//! ```ignore
//! let config = ExecutorConfig::default()
//!     .with_max_depth(2)
//!     .with_reload_delay(Duration::from_secs(2))
//!     .with_routing(RoutingStrategy::Single("gpt-4o".into()))
//!     .with_retries(1);
//! ```

use crate::api::retry::RetryConfig;
use crate::api::router::RoutingStrategy;
use std::time::Duration;

/// Engine settings. Read-only for the lifetime of a run.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Expansion depth budget for top-level runs. `0` disables
    /// self-expansion entirely. Default: `1`.
    pub max_depth: u32,
    /// Delay between a security failure and the environment reload.
    /// Default: 1500 ms.
    pub reload_delay: Duration,
    /// Action label sent to the challenge issuer. Default: `"generate"`.
    pub challenge_action: String,
    /// Model routing for `pickedModel`.
    pub routing: RoutingStrategy,
    /// Transport retry policy. Default: no retries.
    pub retry: RetryConfig,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            max_depth: 1,
            reload_delay: Duration::from_millis(1500),
            challenge_action: crate::DEFAULT_CHALLENGE_ACTION.to_string(),
            routing: RoutingStrategy::default(),
            retry: RetryConfig::default(),
        }
    }
}

impl ExecutorConfig {
    pub fn with_max_depth(mut self, max_depth: u32) -> Self {
        self.max_depth = max_depth;
        self
    }

    pub fn with_reload_delay(mut self, delay: Duration) -> Self {
        self.reload_delay = delay;
        self
    }

    pub fn with_challenge_action(mut self, action: impl Into<String>) -> Self {
        self.challenge_action = action.into();
        self
    }

    pub fn with_routing(mut self, routing: RoutingStrategy) -> Self {
        self.routing = routing;
        self
    }

    /// Enable transport retries with default backoff timings.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retry = RetryConfig::with_retries(retries);
        self
    }
}

/// Per-caller data forwarded with every generation request.
#[derive(Debug, Clone, Default)]
pub struct RunContext {
    /// Opaque client fingerprint, forwarded untouched.
    pub client_fingerprint: serde_json::Value,
    /// Caller identity; `None` for anonymous callers.
    pub user_id: Option<String>,
    /// Bearer credential; `None` when unauthenticated.
    pub auth_token: Option<String>,
}

impl RunContext {
    /// An anonymous caller with an empty fingerprint.
    pub fn anonymous() -> Self {
        Self {
            client_fingerprint: serde_json::json!({}),
            user_id: None,
            auth_token: None,
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    pub fn with_auth_token(mut self, token: impl Into<String>) -> Self {
        self.auth_token = Some(token.into());
        self
    }

    pub fn with_fingerprint(mut self, fingerprint: serde_json::Value) -> Self {
        self.client_fingerprint = fingerprint;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = ExecutorConfig::default();
        assert_eq!(config.max_depth, 1);
        assert_eq!(config.reload_delay, Duration::from_millis(1500));
        assert_eq!(config.challenge_action, "generate");
        assert_eq!(config.retry.max_retries, 0);
        assert_eq!(config.routing, RoutingStrategy::GatewayDefault);
    }

    #[test]
    fn builder_methods() {
        let config = ExecutorConfig::default()
            .with_max_depth(3)
            .with_retries(2)
            .with_challenge_action("brief");
        assert_eq!(config.max_depth, 3);
        assert_eq!(config.retry.max_retries, 2);
        assert_eq!(config.challenge_action, "brief");
    }

    #[test]
    fn anonymous_context_has_no_identity() {
        let ctx = RunContext::anonymous();
        assert!(ctx.user_id.is_none());
        assert!(ctx.auth_token.is_none());
        assert!(ctx.client_fingerprint.is_object());

        let ctx = ctx.with_user("u-1").with_auth_token("jwt");
        assert_eq!(ctx.user_id.as_deref(), Some("u-1"));
        assert_eq!(ctx.auth_token.as_deref(), Some("jwt"));
    }
}
