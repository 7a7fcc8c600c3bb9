//! Assembly of the final multi-section Markdown brief.

use crate::executor::state::StepResult;

/// Render a run's results as one Markdown document.
///
/// Emits `# title` (when given), then a `## label` section per successful
/// result, in result order. Expansion sections sit right after their
/// parent's section.
pub fn render(title: Option<&str>, results: &[StepResult]) -> String {
    let mut sections = Vec::new();
    if let Some(title) = title.filter(|t| !t.trim().is_empty()) {
        sections.push(format!("# {}", title.trim()));
    }
    for result in results.iter().filter(|r| r.succeeded) {
        let Some(content) = result.content.as_deref() else {
            continue;
        };
        sections.push(format!("## {}\n\n{}", result.label, content.trim_end()));
    }

    let mut doc = sections.join("\n\n");
    if !doc.is_empty() {
        doc.push('\n');
    }
    doc
}
