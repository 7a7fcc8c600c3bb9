//! Dependent multi-step prompt executor for website and landing-page briefs.
//!
//! `sitebrief-rs` runs an ordered list of generation steps against an AI
//! gateway. Each step may read the outputs of any subset of earlier steps,
//! may spawn one follow-on generation from its own output (self-expansion,
//! bounded by a depth budget), and is metered by an external credit service
//! that can reject any request. The core abstraction is the
//! [`Orchestrator`](executor::Orchestrator): a sequential scheduler with
//! upfront validation, admission signaling, and per-failure recovery policy.
//!
//! # Getting started
//!
//! ```ignore
//! use sitebrief_rs::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), String> {
//!     let gateway = HttpGateway::new("https://example.com/api/generate")?;
//!     let token = std::env::var("SITEBRIEF_CHALLENGE_TOKEN").map_err(|e| e.to_string())?;
//!     let challenge = StaticChallenge::new(token);
//!
//!     let steps = vec![
//!         PromptSpec::new("Audience", "Describe the target audience of a bakery website."),
//!         PromptSpec::new("Sections", "Propose the page sections.")
//!             .with_depends_on(DependencySet::explicit([0]))
//!             .with_self_expand(true),
//!     ];
//!
//!     let report = Orchestrator::new(&gateway, &challenge, ExecutorConfig::default())
//!         .with_event_handler(&LoggingHandler)
//!         .run(&steps)
//!         .await;
//!
//!     println!("{}", render_document(Some("Bakery"), &report.results));
//!     Ok(())
//! }
//! ```
//!
//! # Where to find things
//!
//! - **Describe a plan:** [`PromptSpec`](plan::PromptSpec),
//!   [`DependencySet`](plan::DependencySet), and [`Plan`](plan::Plan) for
//!   JSON plan files.
//! - **Check a plan without running it:** [`plan::validate`] and
//!   [`plan::estimate`].
//! - **Run a plan:** [`Orchestrator`](executor::Orchestrator) with an
//!   [`ExecutorConfig`](executor::ExecutorConfig) and
//!   [`RunContext`](executor::RunContext). The result is a
//!   [`RunReport`](executor::RunReport).
//! - **Observe a run:** implement [`EventHandler`](executor::EventHandler) or
//!   use [`LoggingHandler`](executor::LoggingHandler).
//! - **Plug in collaborators:** implement [`Generator`] for the AI gateway and
//!   [`ChallengeIssuer`] for security tokens, or use [`HttpGateway`],
//!   [`HttpChallengeIssuer`], and [`StaticChallenge`].
//! - **Handle failures:** [`ExecutorError`](error::ExecutorError) and its
//!   [`Recovery`](error::Recovery) policy.

pub mod api;
pub mod document;
pub mod error;
pub mod executor;
pub mod plan;
pub mod prelude;

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;
use std::time::{Duration, Instant};
use tracing::{debug, trace};

// ── Constants ──────────────────────────────────────────────────────

/// Action label sent to the challenge issuer when none is configured.
pub const DEFAULT_CHALLENGE_ACTION: &str = "generate";

/// Marker the gateway puts in its error body when it rejects the security
/// token. Distinguishes a security failure from any other failure.
pub const SECURITY_REJECTION_SENTINEL: &str = "security_check_failed";

/// Header carrying the caller's identity (omitted for anonymous callers).
pub const USER_ID_HEADER: &str = "X-User-Id";

/// Header carrying the credits needed for this and all remaining steps.
pub const CREDITS_REQUIRED_HEADER: &str = "X-Credits-Required";

// ── Wire types ─────────────────────────────────────────────────────

/// JSON body of a generation request.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct GenerationRequest {
    pub prompt: String,
    /// Opaque client fingerprint, forwarded untouched.
    pub client_fingerprint: serde_json::Value,
    /// One-time security token for this request.
    pub security_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub picked_model: Option<String>,
}

/// A generation request plus its transport-level metadata.
#[derive(Debug, Clone)]
pub struct GenerationCall {
    pub request: GenerationRequest,
    /// Caller identity; `None` for anonymous callers.
    pub user_id: Option<String>,
    /// Bearer credential; `None` when unauthenticated.
    pub auth_token: Option<String>,
    /// Credits required for this and all remaining steps of the run.
    pub credits_required: u64,
}

/// What the gateway sent back, before classification.
#[derive(Debug, Clone, PartialEq)]
pub struct GatewayReply {
    pub status: u16,
    pub body: serde_json::Value,
}

impl GatewayReply {
    pub fn new(status: u16, body: serde_json::Value) -> Self {
        Self { status, body }
    }

    /// A 200 reply carrying generated content.
    pub fn success(content: impl Into<String>, remaining_credits: u64) -> Self {
        Self::new(
            200,
            serde_json::json!({
                "content": content.into(),
                "remainingCredits": remaining_credits,
            }),
        )
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

// ── Collaborator traits ────────────────────────────────────────────

/// Boxed future returned by [`Generator::generate`].
///
/// `Err` means no reply arrived (transport failure). Any reply the gateway
/// did send, including error statuses, is `Ok` and classified by the
/// step runner.
pub type GenerateFuture<'a> = Pin<Box<dyn Future<Output = Result<GatewayReply, String>> + Send + 'a>>;

/// Boxed future returned by [`ChallengeIssuer::issue`].
pub type ChallengeFuture<'a> = Pin<Box<dyn Future<Output = Result<String, String>> + Send + 'a>>;

/// The AI gateway: turns one prompt into generated content.
pub trait Generator: Send + Sync {
    fn generate<'a>(&'a self, call: &'a GenerationCall) -> GenerateFuture<'a>;
}

/// The security-challenge issuer: produces a one-time token per request.
pub trait ChallengeIssuer: Send + Sync {
    fn issue<'a>(&'a self, action: &'a str) -> ChallengeFuture<'a>;
}

// ── HTTP gateway ───────────────────────────────────────────────────

/// Async HTTP client for the generation gateway.
pub struct HttpGateway {
    pub(crate) client: reqwest::Client,
    pub(crate) endpoint: String,
}

impl HttpGateway {
    /// Create a client posting to `endpoint` with a 120s timeout.
    pub fn new(endpoint: impl Into<String>) -> Result<Self, String> {
        Self::with_timeout(endpoint, Duration::from_secs(120))
    }

    pub fn with_timeout(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitebrief-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(timeout)
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn post(&self, call: &GenerationCall) -> Result<GatewayReply, String> {
        debug!(
            "Generation request: prompt={} chars, model={}, credits_required={}, user={}",
            call.request.prompt.len(),
            call.request.picked_model.as_deref().unwrap_or("(gateway default)"),
            call.credits_required,
            call.user_id.as_deref().unwrap_or("(anonymous)"),
        );

        let start = Instant::now();

        let mut request = self
            .client
            .post(&self.endpoint)
            .header(CREDITS_REQUIRED_HEADER, call.credits_required.to_string())
            .json(&call.request);
        if let Some(ref user_id) = call.user_id {
            request = request.header(USER_ID_HEADER, user_id);
        }
        if let Some(ref token) = call.auth_token {
            request = request.bearer_auth(token);
        }

        let resp = request
            .send()
            .await
            .map_err(|e| format!("request failed: {e}"))?;

        let status = resp.status();
        let text = resp
            .text()
            .await
            .map_err(|e| format!("failed to read response: {e}"))?;

        debug!(
            "Generation response: HTTP {} in {:.1}s ({} bytes)",
            status,
            start.elapsed().as_secs_f64(),
            text.len()
        );

        Ok(GatewayReply {
            status: status.as_u16(),
            body: parse_body(&text),
        })
    }
}

impl Generator for HttpGateway {
    fn generate<'a>(&'a self, call: &'a GenerationCall) -> GenerateFuture<'a> {
        Box::pin(self.post(call))
    }
}

/// Parse a reply body. Non-JSON text is kept as `{"error": text}` so the
/// classifier still sees what the server said.
fn parse_body(text: &str) -> serde_json::Value {
    if text.trim().is_empty() {
        return serde_json::Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| {
        trace!("Non-JSON gateway body: {text}");
        serde_json::json!({ "error": text })
    })
}

// ── Challenge issuers ──────────────────────────────────────────────

/// Challenge issuer that fetches tokens over HTTP.
///
/// Posts `{"action": <label>}` and expects `{"token": <string>}`.
pub struct HttpChallengeIssuer {
    client: reqwest::Client,
    endpoint: String,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: Option<String>,
}

impl HttpChallengeIssuer {
    pub fn new(endpoint: impl Into<String>) -> Result<Self, String> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("sitebrief-rs/", env!("CARGO_PKG_VERSION")))
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| format!("failed to build HTTP client: {e}"))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    async fn fetch(&self, action: &str) -> Result<String, String> {
        let resp = self
            .client
            .post(&self.endpoint)
            .json(&serde_json::json!({ "action": action }))
            .send()
            .await
            .map_err(|e| format!("challenge request failed: {e}"))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(format!("challenge issuer HTTP {status}"));
        }

        let parsed: TokenResponse = resp
            .json()
            .await
            .map_err(|e| format!("failed to parse challenge response: {e}"))?;

        match parsed.token {
            Some(token) if !token.is_empty() => Ok(token),
            _ => Err("challenge issuer returned no token".to_string()),
        }
    }
}

impl ChallengeIssuer for HttpChallengeIssuer {
    fn issue<'a>(&'a self, action: &'a str) -> ChallengeFuture<'a> {
        Box::pin(self.fetch(action))
    }
}

/// Challenge issuer that always returns the same token.
#[derive(Debug, Clone)]
pub struct StaticChallenge {
    token: String,
}

impl StaticChallenge {
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            token: token.into(),
        }
    }
}

impl ChallengeIssuer for StaticChallenge {
    fn issue<'a>(&'a self, _action: &'a str) -> ChallengeFuture<'a> {
        let token = self.token.clone();
        Box::pin(async move {
            if token.is_empty() {
                Err("no security token configured".to_string())
            } else {
                Ok(token)
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_uses_camel_case_and_skips_missing_model() {
        let req = GenerationRequest {
            prompt: "hi".into(),
            client_fingerprint: serde_json::json!({"screen": "1920x1080"}),
            security_token: "tok".into(),
            picked_model: None,
        };
        let json = serde_json::to_value(&req).unwrap();
        assert_eq!(json["securityToken"], "tok");
        assert_eq!(json["clientFingerprint"]["screen"], "1920x1080");
        assert!(json.get("pickedModel").is_none());

        let with_model = GenerationRequest {
            picked_model: Some("gpt-4o".into()),
            ..req
        };
        let json = serde_json::to_value(&with_model).unwrap();
        assert_eq!(json["pickedModel"], "gpt-4o");
    }

    #[test]
    fn parse_body_keeps_plain_text_errors() {
        assert_eq!(parse_body(""), serde_json::Value::Null);
        assert_eq!(parse_body("Bad Gateway")["error"], "Bad Gateway");
        assert_eq!(parse_body(r#"{"content": "x"}"#)["content"], "x");
    }

    #[test]
    fn success_reply_shape() {
        let reply = GatewayReply::success("alpha", 9);
        assert!(reply.is_success());
        assert_eq!(reply.body["content"], "alpha");
        assert_eq!(reply.body["remainingCredits"], 9);
        assert!(!GatewayReply::new(429, serde_json::Value::Null).is_success());
    }

    #[tokio::test]
    async fn static_challenge_returns_token() {
        let issuer = StaticChallenge::new("abc");
        assert_eq!(issuer.issue("generate").await.unwrap(), "abc");

        let empty = StaticChallenge::new("");
        assert!(empty.issue("generate").await.is_err());
    }
}
