//! Model selection per step.
//!
//! The gateway accepts an optional `pickedModel`. Top-level steps and
//! self-expansion sub-runs can be routed to different models, e.g. a
//! cheaper model for the follow-on prompt lists.

/// Model routing strategy.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum RoutingStrategy {
    /// Omit `pickedModel`; the gateway chooses.
    #[default]
    GatewayDefault,
    /// Use one model for every step.
    Single(String),
    /// Use `expansion` inside self-expansion sub-runs. Top-level steps use
    /// `primary`, or the gateway's choice when it is `None`.
    Expansion {
        primary: Option<String>,
        expansion: String,
    },
}

impl RoutingStrategy {
    /// Model for a step at the given nesting level (0 = top-level run).
    pub fn model_for_level(&self, level: u32) -> Option<&str> {
        match self {
            RoutingStrategy::GatewayDefault => None,
            RoutingStrategy::Single(model) => Some(model),
            RoutingStrategy::Expansion { primary, expansion } => {
                if level == 0 {
                    primary.as_deref()
                } else {
                    Some(expansion)
                }
            }
        }
    }

    /// Build a strategy from optional CLI-style inputs.
    pub fn from_parts(model: Option<String>, expansion_model: Option<String>) -> Self {
        match (model, expansion_model) {
            (None, None) => RoutingStrategy::GatewayDefault,
            (Some(m), None) => RoutingStrategy::Single(m),
            (primary, Some(expansion)) => RoutingStrategy::Expansion { primary, expansion },
        }
    }
}
