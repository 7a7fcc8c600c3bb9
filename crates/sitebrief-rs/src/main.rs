//! Validate, estimate, and run website-brief prompt plans.
//!
//! Secrets come from the environment: `SITEBRIEF_AUTH_TOKEN` (bearer
//! credential, optional) and `SITEBRIEF_CHALLENGE_TOKEN` (fixed security
//! token, used when no `--challenge-url` is given).
//!
//! # Examples
//!
//! ```sh
//! # Check dependency declarations without any network call
//! sitebrief validate plan.json
//!
//! # Worst-case credit cost with two levels of self-expansion
//! sitebrief estimate plan.json --max-depth 2
//!
//! # Run a plan and print the assembled brief
//! SITEBRIEF_CHALLENGE_TOKEN=... sitebrief run plan.json \
//!   --gateway-url https://example.com/api/generate --format markdown
//!
//! # Route expansions to a cheaper model, with verbose logs
//! RUST_LOG=sitebrief_rs=debug sitebrief run plan.json \
//!   --gateway-url https://example.com/api/generate \
//!   --challenge-url https://example.com/api/challenge \
//!   --model openai/gpt-4o --expansion-model openai/gpt-4o-mini
//! ```

use clap::{Args, Parser, Subcommand, ValueEnum};
use sitebrief_rs::api::router::RoutingStrategy;
use sitebrief_rs::executor::{
    CompositeEventHandler, EventHandler, ExecutorConfig, ExecutorEvent, FnReloader,
    LoggingHandler, Orchestrator, RunContext, RunReport,
};
use sitebrief_rs::plan::{self, Plan};
use sitebrief_rs::{ChallengeIssuer, HttpChallengeIssuer, HttpGateway, StaticChallenge, document};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

const AUTH_TOKEN_ENV: &str = "SITEBRIEF_AUTH_TOKEN";
const CHALLENGE_TOKEN_ENV: &str = "SITEBRIEF_CHALLENGE_TOKEN";

/// Dependent multi-step prompt executor for website planning briefs.
#[derive(Parser)]
#[command(name = "sitebrief", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Check a plan's dependency declarations
    Validate {
        /// Plan file (JSON)
        plan: PathBuf,
    },
    /// Print the worst-case credit cost of a plan
    Estimate {
        /// Plan file (JSON)
        plan: PathBuf,
        /// Self-expansion depth budget
        #[arg(long, default_value_t = 1)]
        max_depth: u32,
    },
    /// Execute a plan against the generation gateway
    Run(RunArgs),
}

#[derive(Args)]
struct RunArgs {
    /// Plan file (JSON)
    plan: PathBuf,

    // ── Collaborators ──────────────────────────────────────────
    /// Generation gateway endpoint
    #[arg(long)]
    gateway_url: String,

    /// Challenge issuer endpoint. Falls back to SITEBRIEF_CHALLENGE_TOKEN
    #[arg(long)]
    challenge_url: Option<String>,

    /// Action label sent to the challenge issuer
    #[arg(long, default_value = sitebrief_rs::DEFAULT_CHALLENGE_ACTION)]
    challenge_action: String,

    // ── Engine ─────────────────────────────────────────────────
    /// Self-expansion depth budget (0 disables expansion)
    #[arg(long, default_value_t = 1)]
    max_depth: u32,

    /// Model for every step (omit to let the gateway choose)
    #[arg(long)]
    model: Option<String>,

    /// Model for self-expansion sub-runs
    #[arg(long)]
    expansion_model: Option<String>,

    /// Retries for transport failures (no reply at all)
    #[arg(long, default_value_t = 0)]
    retries: u32,

    /// Delay before the session reset after a security failure (ms)
    #[arg(long, default_value_t = 1500)]
    reload_delay_ms: u64,

    // ── Caller ─────────────────────────────────────────────────
    /// Caller identity forwarded to the credit service
    #[arg(long)]
    user_id: Option<String>,

    /// Client fingerprint as a JSON object
    #[arg(long)]
    fingerprint: Option<String>,

    // ── Output ─────────────────────────────────────────────────
    /// Output format
    #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
    format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    Text,
    Json,
    Markdown,
}

/// Initialize the tracing subscriber. Reads `RUST_LOG`, defaults to `warn`,
/// writes compact lines to stderr.
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}

/// Prints step progress to stderr.
struct CliEventHandler;

impl EventHandler for CliEventHandler {
    fn on_event(&self, event: &ExecutorEvent<'_>) {
        match event {
            ExecutorEvent::RunStarted {
                steps,
                credits_required,
                depth: 0,
                ..
            } => {
                eprintln!("  [run] {steps} step(s), up to {credits_required} credit(s)");
            }
            ExecutorEvent::StepStarted {
                index,
                total,
                label,
                depth,
            } => {
                let indent = "  ".repeat(*depth as usize);
                eprintln!("  {indent}[{}/{total}] {label}", index + 1);
            }
            ExecutorEvent::ExpansionFailed { label, .. } => {
                eprintln!("  [expand] '{label}' skipped");
            }
            _ => {}
        }
    }
}

fn load_plan(path: &Path) -> Result<Plan, String> {
    Plan::load(path)
}

fn cmd_validate(path: &Path) -> Result<(), String> {
    let plan = load_plan(path)?;
    plan::validate(&plan.steps).map_err(|e| e.to_string())?;
    println!("OK: {} step(s), dependencies valid", plan.steps.len());
    Ok(())
}

fn cmd_estimate(path: &Path, max_depth: u32) -> Result<(), String> {
    let plan = load_plan(path)?;
    plan::validate(&plan.steps).map_err(|e| e.to_string())?;
    println!(
        "{} credit(s): {} step(s), {} self-expanding, max depth {max_depth}",
        plan::estimate(&plan.steps, max_depth),
        plan.steps.len(),
        plan.expanding_steps(),
    );
    Ok(())
}

fn build_challenge(args: &RunArgs) -> Result<Box<dyn ChallengeIssuer>, String> {
    if let Some(ref url) = args.challenge_url {
        return Ok(Box::new(HttpChallengeIssuer::new(url.clone())?));
    }
    let token = std::env::var(CHALLENGE_TOKEN_ENV).map_err(|_| {
        format!("no security token source: pass --challenge-url or set {CHALLENGE_TOKEN_ENV}")
    })?;
    Ok(Box::new(StaticChallenge::new(token)))
}

fn build_context(args: &RunArgs) -> Result<RunContext, String> {
    let mut ctx = RunContext::anonymous();
    if let Some(ref user_id) = args.user_id {
        ctx = ctx.with_user(user_id.clone());
    }
    if let Ok(token) = std::env::var(AUTH_TOKEN_ENV)
        && !token.is_empty()
    {
        ctx = ctx.with_auth_token(token);
    }
    if let Some(ref raw) = args.fingerprint {
        let value: serde_json::Value =
            serde_json::from_str(raw).map_err(|e| format!("invalid --fingerprint JSON: {e}"))?;
        ctx = ctx.with_fingerprint(value);
    }
    Ok(ctx)
}

fn format_report(
    report: &RunReport,
    title: Option<&str>,
    format: OutputFormat,
) -> Result<String, String> {
    match format {
        OutputFormat::Json => serde_json::to_string_pretty(report)
            .map(|s| format!("{s}\n"))
            .map_err(|e| format!("failed to serialize report: {e}")),
        OutputFormat::Markdown => Ok(document::render(title, &report.results)),
        OutputFormat::Text => {
            let mut out = String::new();
            for result in &report.results {
                let Some(ref content) = result.content else {
                    continue;
                };
                let marker = if result.depth > 0 { "  +" } else { "" };
                out.push_str(&format!("{marker}[{}] {}\n", result.index + 1, result.label));
                out.push_str(content.trim_end());
                out.push_str("\n\n");
            }
            out.push_str(&format!(
                "{}: {} ({} step(s) executed",
                report.run_id, report.status, report.executed_count
            ));
            if let Some(credits) = report.remaining_credits {
                out.push_str(&format!(", {credits} credit(s) left"));
            }
            out.push_str(")\n");
            Ok(out)
        }
    }
}

async fn cmd_run(args: &RunArgs) -> Result<(), String> {
    let plan = load_plan(&args.plan)?;
    let gateway = HttpGateway::new(args.gateway_url.clone())?;
    let challenge = build_challenge(args)?;
    let context = build_context(args)?;

    let config = ExecutorConfig::default()
        .with_max_depth(args.max_depth)
        .with_reload_delay(Duration::from_millis(args.reload_delay_ms))
        .with_challenge_action(args.challenge_action.clone())
        .with_routing(RoutingStrategy::from_parts(
            args.model.clone(),
            args.expansion_model.clone(),
        ))
        .with_retries(args.retries);

    let stop = Arc::new(AtomicBool::new(false));
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                eprintln!("  Stopping after the current step...");
                stop.store(true, Ordering::SeqCst);
            }
        });
    }

    let handler = CompositeEventHandler::new()
        .with(CliEventHandler)
        .with(LoggingHandler);

    let reloader = FnReloader::new(|| {
        eprintln!("  Security session reset. Obtain a fresh challenge token and run again.");
    });

    let orchestrator = Orchestrator::new(&gateway, challenge.as_ref(), config)
        .with_context(context)
        .with_event_handler(&handler)
        .with_stop_signal(move || stop.load(Ordering::SeqCst))
        .with_reloader(Arc::new(reloader));

    let mut report = orchestrator.run(&plan.steps).await;
    print!("{}", format_report(&report, plan.title.as_deref(), args.format)?);

    if let Some(task) = report.reload_task.take() {
        task.await
            .map_err(|e| format!("environment reload task failed: {e}"))?;
    }

    if report.is_completed() {
        Ok(())
    } else {
        Err(report.user_message)
    }
}

#[tokio::main]
async fn main() {
    init_tracing();
    let cli = Cli::parse();

    let result = match cli.command {
        Command::Validate { ref plan } => cmd_validate(plan),
        Command::Estimate { ref plan, max_depth } => cmd_estimate(plan, max_depth),
        Command::Run(ref args) => cmd_run(args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {e}");
        process::exit(1);
    }
}
