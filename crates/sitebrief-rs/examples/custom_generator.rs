//! Plug a custom generator into the orchestrator.
//!
//! Demonstrates implementing the `Generator` trait with an in-process
//! backend, so a plan can be exercised end-to-end without any network.
//! The generator echoes the first line of each prompt and charges one
//! credit per call from a fixed allowance, returning 429 once it runs out.
//!
//! # Usage
//!
//! ```bash
//! cargo run --example custom_generator
//! ```

use sitebrief_rs::prelude::*;
use sitebrief_rs::GenerateFuture;
use std::sync::atomic::{AtomicU64, Ordering};

/// Echo backend with a credit allowance.
struct EchoGenerator {
    credits: AtomicU64,
}

impl Generator for EchoGenerator {
    fn generate<'a>(&'a self, call: &'a GenerationCall) -> GenerateFuture<'a> {
        Box::pin(async move {
            let left = self.credits.load(Ordering::SeqCst);
            if left == 0 {
                return Ok(GatewayReply::new(
                    429,
                    serde_json::json!({ "message": "Echo allowance used up." }),
                ));
            }
            self.credits.store(left - 1, Ordering::SeqCst);

            let first_line = call.request.prompt.lines().next().unwrap_or_default();
            Ok(GatewayReply::success(format!("Echo: {first_line}"), left - 1))
        })
    }
}

#[tokio::main]
async fn main() {
    let generator = EchoGenerator {
        credits: AtomicU64::new(3),
    };
    let challenge = StaticChallenge::new("local");

    let steps = vec![
        PromptSpec::new("Audience", "Who is this site for?").with_self_expand(true),
        PromptSpec::new("Goals", "What should visitors do?")
            .with_depends_on(DependencySet::explicit([0])),
        PromptSpec::new("Tone", "How should the copy sound?")
            .with_depends_on(DependencySet::Prefix(1)),
    ];

    // Four credits are needed in the worst case; only three are available,
    // so the last step is rejected and the partial results are kept.
    let report = Orchestrator::new(&generator, &challenge, ExecutorConfig::default())
        .run(&steps)
        .await;

    println!("status: {} ({} step(s) executed)", report.status, report.executed_count);
    println!("{}", report.user_message);
    for result in &report.results {
        println!(
            "  {} -> {}",
            result.label,
            result.content.as_deref().unwrap_or("-")
        );
    }
}
