//! Context composition for dependent steps.
//!
//! A step that depends on earlier steps receives their outputs appended to
//! its own prompt text, each under a header naming the source step's label:
//!
//! ```text
//! <prompt text>
//!
//! --- CONTEXT FROM PREVIOUS STEPS ---
//!
//! ### Audience ###
//! <output of the Audience step>
//!
//! ### Goals ###
//! <output of the Goals step>
//!
//! --- END OF CONTEXT ---
//! ```
//!
//! Blocks follow the order the dependencies were *declared*, not numeric
//! index order: plan authors control emphasis by ordering the list.

use crate::plan::{DependencySet, PromptSpec};

/// Opening marker of the composed context section.
pub const CONTEXT_BEGIN: &str = "--- CONTEXT FROM PREVIOUS STEPS ---";
/// Closing marker of the composed context section.
pub const CONTEXT_END: &str = "--- END OF CONTEXT ---";

/// Render the labeled context block for a step's dependencies.
///
/// `prior_outputs[i]` is the stored output of step `i`, if it ran and
/// succeeded. Dependencies with no stored output, an empty output, or no
/// matching step are skipped silently. Returns an empty string (no markers)
/// when nothing remains.
///
/// The output is a pure function of its inputs.
pub fn compose(
    depends_on: &DependencySet,
    prior_outputs: &[Option<String>],
    steps: &[PromptSpec],
) -> String {
    let blocks: Vec<String> = depends_on
        .resolve_below(prior_outputs.len())
        .into_iter()
        .filter_map(|index| {
            let content = prior_outputs.get(index)?.as_deref()?;
            if content.is_empty() {
                return None;
            }
            let label = &steps.get(index)?.label;
            Some(format!("### {label} ###\n{content}"))
        })
        .collect();

    if blocks.is_empty() {
        String::new()
    } else {
        format!(
            "\n\n{CONTEXT_BEGIN}\n\n{}\n\n{CONTEXT_END}",
            blocks.join("\n\n")
        )
    }
}

/// The full prompt sent to the gateway: the step's own text followed by its
/// composed context.
pub fn final_prompt(step: &PromptSpec, composed: &str) -> String {
    format!("{}{composed}", step.prompt_text)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plan() -> Vec<PromptSpec> {
        vec![
            PromptSpec::new("Audience", "Who is the site for?"),
            PromptSpec::new("Goals", "What should visitors do?"),
            PromptSpec::new("Tone", "How should it sound?"),
        ]
    }

    fn outputs(values: &[Option<&str>]) -> Vec<Option<String>> {
        values.iter().map(|v| v.map(String::from)).collect()
    }

    #[test]
    fn no_dependencies_yields_empty_string() {
        let prior = outputs(&[Some("alpha")]);
        assert_eq!(compose(&DependencySet::None, &prior, &plan()), "");
    }

    #[test]
    fn blocks_follow_declaration_order() {
        let prior = outputs(&[Some("alpha"), Some("beta")]);
        let text = compose(&DependencySet::explicit([1, 0]), &prior, &plan());
        let goals = text.find("### Goals ###").unwrap();
        let audience = text.find("### Audience ###").unwrap();
        assert!(goals < audience, "declared order must win: {text}");
        assert!(text.starts_with("\n\n--- CONTEXT FROM PREVIOUS STEPS ---"));
        assert!(text.ends_with("--- END OF CONTEXT ---"));
    }

    #[test]
    fn exact_layout() {
        let prior = outputs(&[Some("alpha"), Some("beta")]);
        let text = compose(&DependencySet::Prefix(1), &prior, &plan());
        assert_eq!(
            text,
            "\n\n--- CONTEXT FROM PREVIOUS STEPS ---\n\n\
             ### Audience ###\nalpha\n\n\
             ### Goals ###\nbeta\n\n\
             --- END OF CONTEXT ---"
        );
    }

    #[test]
    fn missing_and_empty_outputs_are_skipped() {
        let prior = outputs(&[Some(""), None]);
        assert_eq!(compose(&DependencySet::Prefix(1), &prior, &plan()), "");

        // Index past the end of both lists.
        assert_eq!(compose(&DependencySet::explicit([7]), &prior, &plan()), "");

        let prior = outputs(&[None, Some("beta")]);
        let text = compose(&DependencySet::Prefix(1), &prior, &plan());
        assert!(text.contains("beta"));
        assert!(!text.contains("Audience"));
    }

    #[test]
    fn prefix_zero_includes_only_first_step() {
        let prior = outputs(&[Some("alpha"), Some("beta")]);
        let text = compose(&DependencySet::Prefix(0), &prior, &plan());
        assert!(text.contains("### Audience ###\nalpha"));
        assert!(!text.contains("beta"));
    }

    #[test]
    fn oversized_prefix_stays_within_prior_outputs() {
        let prior = outputs(&[Some("alpha"), Some("beta")]);
        let text = compose(&DependencySet::Prefix(usize::MAX), &prior, &plan());
        assert!(text.contains("### Audience ###\nalpha"));
        assert!(text.contains("### Goals ###\nbeta"));
    }

    #[test]
    fn compose_is_deterministic() {
        let prior = outputs(&[Some("alpha"), Some("beta")]);
        let deps = DependencySet::explicit([1, 0]);
        assert_eq!(
            compose(&deps, &prior, &plan()),
            compose(&deps, &prior, &plan())
        );
    }

    #[test]
    fn final_prompt_appends_context() {
        let steps = plan();
        let prompt = final_prompt(&steps[2], "\n\nCTX");
        assert_eq!(prompt, "How should it sound?\n\nCTX");
        assert_eq!(final_prompt(&steps[0], ""), "Who is the site for?");
    }
}
