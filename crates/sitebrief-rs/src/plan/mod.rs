//! Prompt plans: the ordered list of generation steps a run executes.
//!
//! A plan is a list of [`PromptSpec`]s. Each step may depend on the outputs
//! of strictly earlier steps via a [`DependencySet`], and may be flagged
//! `self_expand` to spawn one follow-on generation from its own output.
//!
//! The static checks and pure computations over a plan live in submodules:
//!
//! - [`validate`]: rejects forward and self references before any I/O.
//! - [`context`]: renders the labeled context block for a step.
//! - [`estimate`]: worst-case credit cost of a run.

pub mod context;
pub mod estimate;
pub mod validate;

pub use context::compose;
pub use estimate::estimate;
pub use validate::validate;

use serde::{Deserialize, Serialize};
use std::path::Path;

// ── DependencySet ──────────────────────────────────────────────────

/// Which earlier steps a step reads from.
///
/// In plan files this is written as `null` (or omitted), a single integer
/// (legacy prefix shorthand), or an array of integers.
#[derive(Serialize, Deserialize, Clone, Debug, Default, PartialEq, Eq)]
#[serde(from = "Option<RawDependsOn>", into = "Option<RawDependsOn>")]
pub enum DependencySet {
    /// No dependencies.
    #[default]
    None,
    /// All steps with index `0..=n` (legacy shorthand).
    Prefix(usize),
    /// Exactly these earlier steps, in declaration order.
    Explicit(Vec<usize>),
}

/// Wire shape of `dependsOn`: a number or a list of numbers.
#[derive(Serialize, Deserialize, Clone, Debug)]
#[serde(untagged)]
enum RawDependsOn {
    Prefix(usize),
    Explicit(Vec<usize>),
}

impl From<Option<RawDependsOn>> for DependencySet {
    fn from(raw: Option<RawDependsOn>) -> Self {
        match raw {
            None => DependencySet::None,
            Some(RawDependsOn::Prefix(n)) => DependencySet::Prefix(n),
            Some(RawDependsOn::Explicit(indices)) => DependencySet::explicit(indices),
        }
    }
}

impl From<DependencySet> for Option<RawDependsOn> {
    fn from(set: DependencySet) -> Self {
        match set {
            DependencySet::None => None,
            DependencySet::Prefix(n) => Some(RawDependsOn::Prefix(n)),
            DependencySet::Explicit(indices) => Some(RawDependsOn::Explicit(indices)),
        }
    }
}

impl DependencySet {
    /// Build an explicit set, dropping repeated indices but keeping the
    /// first-declared order.
    pub fn explicit(indices: impl IntoIterator<Item = usize>) -> Self {
        let mut seen = std::collections::HashSet::new();
        let ordered: Vec<usize> = indices.into_iter().filter(|i| seen.insert(*i)).collect();
        DependencySet::Explicit(ordered)
    }

    /// Resolve to the concrete list of step indices, in declaration order.
    ///
    /// Only call this on a validated set: a prefix is materialized in full.
    pub fn resolve(&self) -> Vec<usize> {
        match self {
            DependencySet::None => Vec::new(),
            DependencySet::Prefix(n) => (0..=*n).collect(),
            DependencySet::Explicit(indices) => indices.clone(),
        }
    }

    /// Resolved members below `bound`, in declaration order. Never
    /// materializes more than `bound` indices, so it is safe on sets that
    /// have not been validated.
    pub fn resolve_below(&self, bound: usize) -> Vec<usize> {
        match self {
            DependencySet::None => Vec::new(),
            DependencySet::Prefix(n) => (0..bound.min(n.saturating_add(1))).collect(),
            DependencySet::Explicit(indices) => {
                indices.iter().copied().filter(|&d| d < bound).collect()
            }
        }
    }

    /// The first member that is not below `bound`, in declaration order.
    ///
    /// A prefix is checked arithmetically: `Prefix(n)` with `n >= bound`
    /// contains `bound` itself, which is its first offending member.
    pub fn first_at_or_above(&self, bound: usize) -> Option<usize> {
        match self {
            DependencySet::None => None,
            DependencySet::Prefix(n) => (*n >= bound).then_some(bound),
            DependencySet::Explicit(indices) => indices.iter().copied().find(|&d| d >= bound),
        }
    }

    pub fn is_none(&self) -> bool {
        matches!(self, DependencySet::None)
    }
}

// ── PromptSpec ─────────────────────────────────────────────────────

/// One unit of generation work.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PromptSpec {
    /// The step's own prompt. Composed context is appended to it.
    pub prompt_text: String,
    /// Human-readable name, used as the context block header and as the
    /// section title in the assembled document.
    pub label: String,
    #[serde(default, skip_serializing_if = "DependencySet::is_none")]
    pub depends_on: DependencySet,
    /// Spawn one follow-on generation from this step's output.
    #[serde(default)]
    pub self_expand: bool,
}

impl PromptSpec {
    pub fn new(label: impl Into<String>, prompt_text: impl Into<String>) -> Self {
        Self {
            prompt_text: prompt_text.into(),
            label: label.into(),
            depends_on: DependencySet::None,
            self_expand: false,
        }
    }

    /// Set the dependency declaration.
    pub fn with_depends_on(mut self, depends_on: DependencySet) -> Self {
        self.depends_on = depends_on;
        self
    }

    /// Set the self-expansion flag.
    pub fn with_self_expand(mut self, self_expand: bool) -> Self {
        self.self_expand = self_expand;
        self
    }
}

// ── Plan ───────────────────────────────────────────────────────────

/// A titled list of steps, as loaded from a plan file.
#[derive(Serialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct Plan {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    pub steps: Vec<PromptSpec>,
}

/// Accept both `[...]` and `{"title": ..., "steps": [...]}`.
#[derive(Deserialize)]
#[serde(untagged)]
enum PlanFile {
    Titled {
        #[serde(default)]
        title: Option<String>,
        steps: Vec<PromptSpec>,
    },
    Bare(Vec<PromptSpec>),
}

impl Plan {
    /// Parse a plan from JSON text.
    pub fn from_json(text: &str) -> Result<Self, String> {
        let file: PlanFile =
            serde_json::from_str(text).map_err(|e| format!("failed to parse plan: {e}"))?;
        Ok(match file {
            PlanFile::Titled { title, steps } => Plan { title, steps },
            PlanFile::Bare(steps) => Plan { title: None, steps },
        })
    }

    /// Read and parse a plan file.
    pub fn load(path: &Path) -> Result<Self, String> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read plan file '{}': {e}", path.display()))?;
        Self::from_json(&text)
    }

    /// Count of steps flagged for self-expansion.
    pub fn expanding_steps(&self) -> usize {
        self.steps.iter().filter(|s| s.self_expand).count()
    }
}
