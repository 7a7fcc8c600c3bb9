//! Integration tests for the HTTP collaborators.
//!
//! These tests start a real axum server on a random port that plays both
//! the generation gateway and the challenge issuer, then drive full runs
//! through `HttpGateway` and `HttpChallengeIssuer`.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{Value, json};
use sitebrief_rs::prelude::*;

enum Reply {
    Json(u16, Value),
    Text(u16, &'static str),
}

/// One recorded generation request.
#[derive(Clone, Debug)]
struct Recorded {
    headers: HeaderMap,
    body: Value,
}

#[derive(Default)]
struct Mock {
    replies: Mutex<VecDeque<Reply>>,
    requests: Mutex<Vec<Recorded>>,
    tokens_issued: AtomicUsize,
    challenge_down: AtomicBool,
}

impl Mock {
    fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }
}

async fn generate(
    State(mock): State<Arc<Mock>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    mock.requests
        .lock()
        .unwrap()
        .push(Recorded { headers, body });
    let reply = mock.replies.lock().unwrap().pop_front();
    match reply {
        Some(Reply::Json(status, value)) => {
            (StatusCode::from_u16(status).unwrap(), Json(value)).into_response()
        }
        Some(Reply::Text(status, text)) => {
            (StatusCode::from_u16(status).unwrap(), text).into_response()
        }
        None => (StatusCode::INTERNAL_SERVER_ERROR, "no reply scripted").into_response(),
    }
}

async fn challenge(State(mock): State<Arc<Mock>>, Json(body): Json<Value>) -> Response {
    if mock.challenge_down.load(Ordering::SeqCst) {
        return (StatusCode::SERVICE_UNAVAILABLE, "down").into_response();
    }
    assert_eq!(body["action"], "generate");
    let n = mock.tokens_issued.fetch_add(1, Ordering::SeqCst) + 1;
    Json(json!({ "token": format!("tok-{n}") })).into_response()
}

/// Helper: spawn the mock on port 0 (random available port).
async fn spawn_mock(replies: Vec<Reply>) -> (Arc<Mock>, String) {
    let mock = Arc::new(Mock {
        replies: Mutex::new(replies.into()),
        ..Default::default()
    });
    let app = Router::new()
        .route("/api/generate", post(generate))
        .route("/api/challenge", post(challenge))
        .with_state(mock.clone());

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    (mock, format!("http://{addr}"))
}

fn ok(content: &str, remaining: u64) -> Reply {
    Reply::Json(200, json!({ "content": content, "remainingCredits": remaining }))
}

fn header<'a>(rec: &'a Recorded, name: &str) -> Option<&'a str> {
    rec.headers.get(name).and_then(|v| v.to_str().ok())
}

fn two_steps() -> Vec<PromptSpec> {
    vec![
        PromptSpec::new("Audience", "Who visits a neighbourhood bakery site?"),
        PromptSpec::new("Sections", "Propose the page sections.")
            .with_depends_on(DependencySet::explicit([0])),
    ]
}

// ── Request shape ────────────────────────────────────────────────────

#[tokio::test]
async fn run_sends_headers_tokens_and_context() {
    let (mock, base) = spawn_mock(vec![ok("locals", 9), ok("hero, menu", 8)]).await;
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let issuer = HttpChallengeIssuer::new(format!("{base}/api/challenge")).unwrap();
    let ctx = RunContext::anonymous()
        .with_user("u-1")
        .with_auth_token("jwt-abc")
        .with_fingerprint(json!({ "tz": "Europe/Berlin" }));

    let report = Orchestrator::new(&gateway, &issuer, ExecutorConfig::default())
        .with_context(ctx)
        .run(&two_steps())
        .await;

    assert!(report.is_completed(), "{:?}", report.error);
    assert_eq!(report.executed_count, 2);
    assert_eq!(report.remaining_credits, Some(8));

    let requests = mock.requests();
    assert_eq!(requests.len(), 2);

    let first = &requests[0];
    assert_eq!(header(first, "authorization"), Some("Bearer jwt-abc"));
    assert_eq!(header(first, "x-user-id"), Some("u-1"));
    assert_eq!(header(first, "x-credits-required"), Some("2"));
    assert_eq!(first.body["securityToken"], "tok-1");
    assert_eq!(first.body["clientFingerprint"]["tz"], "Europe/Berlin");
    assert!(first.body.get("pickedModel").is_none());

    let second = &requests[1];
    assert_eq!(header(second, "x-credits-required"), Some("1"));
    assert_eq!(second.body["securityToken"], "tok-2");
    let prompt = second.body["prompt"].as_str().unwrap();
    assert!(prompt.starts_with("Propose the page sections."));
    assert!(prompt.contains("### Audience ###\nlocals"));
}

#[tokio::test]
async fn anonymous_run_omits_identity_headers() {
    let (mock, base) = spawn_mock(vec![ok("locals", 1)]).await;
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let challenge = StaticChallenge::new("fixed");
    let config = ExecutorConfig::default()
        .with_routing(RoutingStrategy::Single("openai/gpt-4o".into()));

    let steps = vec![PromptSpec::new("Audience", "a")];
    let report = Orchestrator::new(&gateway, &challenge, config)
        .run(&steps)
        .await;
    assert!(report.is_completed());

    let requests = mock.requests();
    assert!(header(&requests[0], "authorization").is_none());
    assert!(header(&requests[0], "x-user-id").is_none());
    assert_eq!(requests[0].body["securityToken"], "fixed");
    assert_eq!(requests[0].body["pickedModel"], "openai/gpt-4o");
}

// ── Classification over the wire ─────────────────────────────────────

#[tokio::test]
async fn http_429_halts_the_run() {
    let (mock, base) = spawn_mock(vec![
        ok("locals", 0),
        Reply::Json(429, json!({ "message": "You have used all your credits." })),
    ])
    .await;
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let challenge = StaticChallenge::new("fixed");

    let report = Orchestrator::new(&gateway, &challenge, ExecutorConfig::default())
        .run(&two_steps())
        .await;
    assert_eq!(report.status, RunStatus::Aborted);
    assert_eq!(report.results.len(), 1);
    assert!(!report.has_credits);
    assert_eq!(report.user_message, "You have used all your credits.");
    assert_eq!(report.recovery(), Recovery::TopUpCredits);
    assert_eq!(mock.requests().len(), 2);
}

#[tokio::test]
async fn security_rejection_triggers_reload() {
    let (_mock, base) = spawn_mock(vec![Reply::Json(
        403,
        json!({ "error": "security_check_failed" }),
    )])
    .await;
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let issuer = HttpChallengeIssuer::new(format!("{base}/api/challenge")).unwrap();
    let reloaded = Arc::new(AtomicBool::new(false));
    let flag = reloaded.clone();
    let config = ExecutorConfig::default().with_reload_delay(Duration::from_millis(10));

    let mut report = Orchestrator::new(&gateway, &issuer, config)
        .with_reloader(Arc::new(FnReloader::new(move || {
            flag.store(true, Ordering::SeqCst)
        })))
        .run(&two_steps())
        .await;
    assert!(matches!(
        report.error,
        Some(ExecutorError::SecurityFailure { .. })
    ));
    assert!(!reloaded.load(Ordering::SeqCst));

    report.reload_task.take().unwrap().await.unwrap();
    assert!(reloaded.load(Ordering::SeqCst));
}

#[tokio::test]
async fn plain_text_error_body_is_reported() {
    let (_mock, base) = spawn_mock(vec![Reply::Text(502, "Bad Gateway")]).await;
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let challenge = StaticChallenge::new("fixed");

    let report = Orchestrator::new(&gateway, &challenge, ExecutorConfig::default())
        .run(&two_steps())
        .await;
    assert_eq!(
        report.error,
        Some(ExecutorError::Generation {
            message: "Bad Gateway".into()
        })
    );
    assert_eq!(report.recovery(), Recovery::RetryManually);
}

// ── Challenge issuer ─────────────────────────────────────────────────

#[tokio::test]
async fn challenge_outage_stops_before_generation() {
    let (mock, base) = spawn_mock(vec![ok("locals", 1)]).await;
    mock.challenge_down.store(true, Ordering::SeqCst);
    let gateway = HttpGateway::new(format!("{base}/api/generate")).unwrap();
    let issuer = HttpChallengeIssuer::new(format!("{base}/api/challenge")).unwrap();

    let report = Orchestrator::new(&gateway, &issuer, ExecutorConfig::default())
        .run(&two_steps())
        .await;
    assert!(matches!(
        report.error,
        Some(ExecutorError::SecurityTokenUnavailable { .. })
    ));
    assert!(report.reload_task.is_none());
    assert!(mock.requests().is_empty());
}

#[tokio::test]
async fn unreachable_gateway_is_a_generation_failure() {
    // Bind then drop a listener to get a port nobody is serving.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let gateway =
        HttpGateway::with_timeout(format!("http://{addr}/api/generate"), Duration::from_secs(2))
            .unwrap();
    let challenge = StaticChallenge::new("fixed");

    let report = Orchestrator::new(&gateway, &challenge, ExecutorConfig::default())
        .run(&two_steps())
        .await;
    match report.error {
        Some(ExecutorError::Generation { ref message }) => {
            assert!(message.starts_with("request failed"), "{message}");
        }
        ref other => panic!("unexpected error: {other:?}"),
    }
    assert!(report.results.is_empty());
}
