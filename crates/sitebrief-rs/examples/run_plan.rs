//! Run a small bakery-site plan against a live gateway.
//!
//! Builds a three-step plan in code, runs it with tracing output, and prints
//! the assembled Markdown brief.
//!
//! # Usage
//!
//! ```bash
//! SITEBRIEF_GATEWAY_URL=https://example.com/api/generate \
//! SITEBRIEF_CHALLENGE_TOKEN=... cargo run --example run_plan
//! ```

use sitebrief_rs::prelude::*;

#[tokio::main]
async fn main() -> Result<(), String> {
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    // 1. Collaborators: the gateway and a fixed security token.
    let endpoint = std::env::var("SITEBRIEF_GATEWAY_URL")
        .map_err(|_| "Set SITEBRIEF_GATEWAY_URL to your generation endpoint")?;
    let token = std::env::var("SITEBRIEF_CHALLENGE_TOKEN")
        .map_err(|_| "Set SITEBRIEF_CHALLENGE_TOKEN to a security token")?;
    let gateway = HttpGateway::new(endpoint)?;
    let challenge = StaticChallenge::new(token);

    // 2. The plan. "Sections" reads "Audience"; "Tone" reads everything so far.
    let steps = vec![
        PromptSpec::new(
            "Audience",
            "Describe the target audience of a neighbourhood bakery website.",
        ),
        PromptSpec::new("Sections", "Propose the sections of the home page.")
            .with_depends_on(DependencySet::explicit([0]))
            .with_self_expand(true),
        PromptSpec::new("Tone", "Recommend a tone of voice for the copy.")
            .with_depends_on(DependencySet::Prefix(1)),
    ];

    let config = ExecutorConfig::default().with_max_depth(1);
    println!("Worst case: {} credit(s)", estimate(&steps, config.max_depth));

    // 3. Run.
    let report = Orchestrator::new(&gateway, &challenge, config)
        .with_event_handler(&LoggingHandler)
        .run(&steps)
        .await;

    println!("{}", render_document(Some("Bakery website brief"), &report.results));
    if let Some(err) = report.error {
        return Err(err.user_message());
    }
    Ok(())
}
