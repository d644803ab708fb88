//! The heuristic responder (spec §4.4a): a deterministic keyword-matching
//! fallback used when no LLM backend is configured.

use crate::view_store::{Component, ComponentCategory, ComponentType, Mutation, Position, ViewState};

/// Result of a heuristic match: reply text plus an optional mutation to
/// submit to the ViewStore.
pub struct HeuristicReply {
    pub content: String,
    pub mutation: Option<Mutation>,
}

const ADD_KEYWORDS: &[&str] = &["add", "agregar", "añadir", "anadir", "crear", "nuevo", "nueva"];
const REMOVE_KEYWORDS: &[&str] = &["remove", "eliminar", "quitar", "borrar", "delete"];
const THEME_KEYWORDS: &[&str] = &["theme", "tema"];
const STATUS_KEYWORDS: &[&str] = &["status", "estado"];
const HELP_KEYWORDS: &[&str] = &["help", "ayuda"];

/// Component-type keywords, most specific first so e.g. "animated text"
/// matches before the plain "text" entry.
const COMPONENT_KEYWORDS: &[(&[&str], ComponentType)] = &[
    (&["animated text", "animated-text", "texto animado"], ComponentType::AnimatedText),
    (&["button", "botón", "boton"], ComponentType::Button),
    (&["text", "texto"], ComponentType::Text),
    (&["image", "imagen"], ComponentType::Image),
    (&["input", "entrada", "campo"], ComponentType::Input),
    (&["card", "tarjeta"], ComponentType::Card),
    (&["form", "formulario"], ComponentType::Form),
    (&["navigation", "navegación", "navegacion", "nav"], ComponentType::Navigation),
    (&["hero", "héroe", "heroe"], ComponentType::Hero),
    (&["gallery", "galería", "galeria"], ComponentType::Gallery),
];

const NAMED_COLORS: &[(&[&str], &str)] = &[
    (&["red", "rojo"], "#ef4444"),
    (&["blue", "azul"], "#3b82f6"),
    (&["green", "verde"], "#22c55e"),
    (&["purple", "morado", "púrpura", "purpura"], "#a855f7"),
    (&["orange", "naranja"], "#f97316"),
    (&["pink", "rosa"], "#ec4899"),
    (&["dark", "oscuro"], "#0f172a"),
    (&["light", "claro"], "#f8fafc"),
];

const HELP_TEXT: &str = "I can: \"add <component>\" (button, text, animated text, image, input, card, form, navigation, hero, gallery), \"change theme to <color>\", \"remove <id>\", \"status\", or \"help\".";

/// Match `content` against the canonical command set and produce a reply.
pub fn respond(content: &str, view: &ViewState) -> HeuristicReply {
    let lower = content.to_lowercase();

    if contains_any(&lower, HELP_KEYWORDS) {
        return HeuristicReply {
            content: HELP_TEXT.to_string(),
            mutation: None,
        };
    }

    if contains_any(&lower, STATUS_KEYWORDS) {
        return HeuristicReply {
            content: format!(
                "{} component(s) on the canvas. Theme: {}. Viewport: {:?}.",
                view.components.len(),
                view.theme.name,
                view.canvas.viewport
            ),
            mutation: None,
        };
    }

    if contains_any(&lower, ADD_KEYWORDS) {
        if let Some(component_type) = find_component_type(&lower) {
            let component = Component {
                id: String::new(),
                component_type,
                category: ComponentCategory::Atom,
                properties: Default::default(),
                position: Position { x: 100, y: 100 },
                size: component_type.default_size(),
            };
            return HeuristicReply {
                content: format!("Added a {} component.", component_type.as_str()),
                mutation: Some(Mutation::AddComponent(component)),
            };
        }
    }

    if contains_any(&lower, REMOVE_KEYWORDS) {
        if let Some(id) = find_existing_component_id(&lower, view) {
            return HeuristicReply {
                content: format!("Removed component {id}."),
                mutation: Some(Mutation::RemoveComponent { id }),
            };
        }
        return HeuristicReply {
            content: "I couldn't find a component with that id to remove.".to_string(),
            mutation: None,
        };
    }

    if contains_any(&lower, THEME_KEYWORDS) {
        if let Some(color) = find_color(&lower) {
            let mut theme = view.theme.clone();
            theme.colors.primary = color.to_string();
            return HeuristicReply {
                content: format!("Updated the theme's primary color to {color}."),
                mutation: Some(Mutation::SetTheme(theme)),
            };
        }
        return HeuristicReply {
            content: "I didn't recognize that color. Try red, blue, green, purple, orange, pink, dark, or light.".to_string(),
            mutation: None,
        };
    }

    HeuristicReply {
        content: format!("I didn't understand that. {HELP_TEXT}"),
        mutation: None,
    }
}

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn find_component_type(lower: &str) -> Option<ComponentType> {
    COMPONENT_KEYWORDS
        .iter()
        .find(|(keywords, _)| contains_any(lower, keywords))
        .map(|(_, kind)| *kind)
}

fn find_color(lower: &str) -> Option<&'static str> {
    if let Some((_, hex)) = NAMED_COLORS.iter().find(|(names, _)| contains_any(lower, names)) {
        return Some(hex);
    }
    None
}

fn find_existing_component_id(lower: &str, view: &ViewState) -> Option<String> {
    view.components
        .iter()
        .find(|c| lower.contains(&c.id.to_lowercase()))
        .map(|c| c.id.clone())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn agregar_boton_adds_a_button() {
        let view = ViewState::default();
        let reply = respond("agregar botón", &view);
        match reply.mutation {
            Some(Mutation::AddComponent(component)) => {
                assert_eq!(component.component_type, ComponentType::Button);
                assert_eq!(component.category, ComponentCategory::Atom);
                assert_eq!(component.position, Position { x: 100, y: 100 });
            }
            other => panic!("expected AddComponent, got {other:?}"),
        }
    }

    #[test]
    fn unknown_input_yields_help_pointer() {
        let view = ViewState::default();
        let reply = respond("asdkjasdj", &view);
        assert!(reply.mutation.is_none());
        assert!(reply.content.contains("add <component>"));
    }

    #[test]
    fn help_keyword_lists_commands() {
        let view = ViewState::default();
        let reply = respond("help", &view);
        assert_eq!(reply.content, HELP_TEXT);
    }

    #[test]
    fn remove_without_matching_id_is_a_no_op_reply() {
        let view = ViewState::default();
        let reply = respond("remove button_ghost", &view);
        assert!(reply.mutation.is_none());
    }
}
