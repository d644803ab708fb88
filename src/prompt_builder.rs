//! PromptBuilder: deterministic assembly of `{system_prompt, user_prompt}`
//! pairs from a static role document and a ViewState snapshot.

use crate::view_store::{ComponentCategory, ViewState};

/// The static role document: domain knowledge and response-format rules.
/// Kept as a constant rather than a loaded file since, unlike the per-agent
/// prompt files this codebase loads from disk, ViberCode has exactly one
/// fixed role with no per-session variation.
const ROLE_DOCUMENT: &str = include_str!("../prompts/role.md");

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    General,
    Component,
}

impl Mode {
    fn directive(&self) -> &'static str {
        match self {
            Mode::General => {
                "Mode: general. Respond conversationally and only propose a ui_update block when the user explicitly asks for a UI change."
            }
            Mode::Component => {
                "Mode: component. Prefer emitting a ui_update block whenever the request can be expressed as one."
            }
        }
    }
}

/// A `{system_prompt, user_prompt}` pair ready to hand to an [`crate::llm_client::LlmClient`].
#[derive(Debug, Clone)]
pub struct PromptPair {
    pub system_prompt: String,
    pub user_prompt: String,
}

pub struct PromptBuilder;

impl PromptBuilder {
    /// Assemble a prompt pair. Same `(view, mode, user_message)` always
    /// produces byte-identical output.
    pub fn build(view: &ViewState, mode: Mode, user_message: &str) -> PromptPair {
        let state_json =
            serde_json::to_string_pretty(view).expect("ViewState serialization is infallible");
        let summary = Self::summarize(view);

        let system_prompt = format!(
            "{role}\n\n## Current view state\n```json\n{state_json}\n```\n\n## Summary\n{summary}\n\n## {directive}",
            role = ROLE_DOCUMENT.trim_end(),
            directive = mode.directive(),
        );

        PromptPair {
            system_prompt,
            user_prompt: user_message.to_string(),
        }
    }

    fn summarize(view: &ViewState) -> String {
        let total = view.components.len();
        let atoms = view
            .components
            .iter()
            .filter(|c| c.category == ComponentCategory::Atom)
            .count();
        let molecules = view
            .components
            .iter()
            .filter(|c| c.category == ComponentCategory::Molecule)
            .count();
        let organisms = view
            .components
            .iter()
            .filter(|c| c.category == ComponentCategory::Organism)
            .count();

        let selected = if view.canvas.selected_id.is_empty() {
            "none".to_string()
        } else {
            view.canvas.selected_id.clone()
        };

        format!(
            "{total} component(s) total ({atoms} atom, {molecules} molecule, {organisms} organism). Active theme: {theme}. Viewport: {viewport:?}. Selected: {selected}.",
            theme = view.theme.name,
            viewport = view.canvas.viewport,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::view_store::ViewState;

    #[test]
    fn same_input_produces_byte_identical_output() {
        let view = ViewState::default();
        let first = PromptBuilder::build(&view, Mode::General, "hello");
        let second = PromptBuilder::build(&view, Mode::General, "hello");
        assert_eq!(first.system_prompt, second.system_prompt);
        assert_eq!(first.user_prompt, second.user_prompt);
    }

    #[test]
    fn summary_reports_component_count() {
        let view = ViewState::default();
        let prompt = PromptBuilder::build(&view, Mode::Component, "add a button");
        assert!(prompt.system_prompt.contains("0 component(s) total"));
        assert!(prompt.system_prompt.contains("Mode: component"));
    }
}
