//! Fenced-JSON action extraction and validation (spec §4.4 step 4, §6.2).
//!
//! Two-stage parse: locate the first fenced block whose content parses as a
//! JSON object, then validate its shape against the `ui_update` schema.
//! Malformed or ambiguous blocks degrade to plain text — never `eval`.

use crate::view_store::{Component, ComponentPatch, Layout, Theme};

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionKind {
    AddComponent,
    UpdateComponent,
    RemoveComponent,
    UpdateTheme,
    UpdateLayout,
}

/// A validated `ui_update` block, ready to turn into a [`crate::view_store::Mutation`].
#[derive(Debug, Clone)]
pub struct UiAction {
    pub kind: ActionKind,
    pub data: serde_json::Value,
    pub explanation: String,
}

/// Data payload for `remove_component` and the id half of `update_component`.
#[derive(Deserialize)]
pub struct RemoveComponentData {
    pub id: String,
}

#[derive(Deserialize)]
pub struct UpdateComponentData {
    pub id: String,
    #[serde(flatten)]
    pub patch: ComponentPatch,
}

/// Find the first fenced (triple-backtick) block in `text` whose content
/// parses as a `ui_update` action, validate it, and return both the action
/// and the byte span of the whole fence (markers included) so the caller can
/// strip it from the response text.
pub fn extract_ui_action(text: &str) -> Option<(UiAction, (usize, usize))> {
    for (start, end, inner) in iter_fenced_blocks(text) {
        let Some(json_text) = locate_json_object(&inner) else {
            continue;
        };
        let Ok(value) = serde_json::from_str::<serde_json::Value>(json_text) else {
            continue;
        };
        let Some(action) = validate_ui_update(&value) else {
            continue;
        };
        return Some((action, (start, end)));
    }
    None
}

fn validate_ui_update(value: &serde_json::Value) -> Option<UiAction> {
    let object = value.as_object()?;
    if object.get("type")?.as_str()? != "ui_update" {
        return None;
    }
    let kind = match object.get("action")?.as_str()? {
        "add_component" => ActionKind::AddComponent,
        "update_component" => ActionKind::UpdateComponent,
        "remove_component" => ActionKind::RemoveComponent,
        "update_theme" => ActionKind::UpdateTheme,
        "update_layout" => ActionKind::UpdateLayout,
        _ => return None,
    };
    let data = object.get("data")?.clone();
    if !data.is_object() {
        return None;
    }

    // Structural validation per kind, beyond "data is an object". Failing
    // here means the whole block degrades to plain text.
    match kind {
        ActionKind::AddComponent => {
            serde_json::from_value::<Component>(data.clone()).ok()?;
        }
        ActionKind::UpdateComponent => {
            serde_json::from_value::<UpdateComponentData>(data.clone()).ok()?;
        }
        ActionKind::RemoveComponent => {
            serde_json::from_value::<RemoveComponentData>(data.clone()).ok()?;
        }
        ActionKind::UpdateTheme => {
            serde_json::from_value::<Theme>(data.clone()).ok()?;
        }
        ActionKind::UpdateLayout => {
            serde_json::from_value::<Layout>(data.clone()).ok()?;
        }
    }

    let explanation = object
        .get("explanation")
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string();

    Some(UiAction {
        kind,
        data,
        explanation,
    })
}

/// Yield `(fence_start, fence_end, inner_content)` for every triple-backtick
/// fenced block in `text`, in order. Assumes well-formed, non-nested fences.
fn iter_fenced_blocks(text: &str) -> Vec<(usize, usize, &str)> {
    const FENCE: &str = "```";
    let mut blocks = Vec::new();
    let mut cursor = 0usize;

    while let Some(open_rel) = text[cursor..].find(FENCE) {
        let open = cursor + open_rel;
        let after_marker = open + FENCE.len();

        let content_start = match text[after_marker..].find('\n') {
            Some(newline_rel) => after_marker + newline_rel + 1,
            None => after_marker,
        };

        let Some(close_rel) = text[content_start..].find(FENCE) else {
            break;
        };
        let close = content_start + close_rel;
        let end = close + FENCE.len();

        blocks.push((open, end, &text[content_start..close]));
        cursor = end;
    }

    blocks
}

/// Locate the first balanced `{ ... }` object in `s`, respecting string
/// escaping so braces inside string literals don't confuse the scan.
fn locate_json_object(s: &str) -> Option<&str> {
    let bytes = s.as_bytes();
    let start = s.find('{')?;

    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&s[start..=offset]);
                }
            }
            _ => {}
        }
    }

    None
}

/// Remove the byte span `[start, end)` from `text` and trim the result.
pub fn strip_span(text: &str, span: (usize, usize)) -> String {
    let (start, end) = span;
    let mut out = String::with_capacity(text.len() - (end - start));
    out.push_str(&text[..start]);
    out.push_str(&text[end..]);
    out.trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_valid_add_component_block() {
        let text = "Sure, here:\n```json\n{\"type\":\"ui_update\",\"action\":\"add_component\",\"data\":{\"id\":\"button_x\",\"type\":\"button\",\"category\":\"atom\",\"properties\":{},\"position\":{\"x\":100,\"y\":100},\"size\":{\"w\":160,\"h\":40}},\"explanation\":\"adding a button\"}\n```\nDone.";
        let (action, span) = extract_ui_action(text).expect("block should parse");
        assert_eq!(action.kind, ActionKind::AddComponent);
        let stripped = strip_span(text, span);
        assert_eq!(stripped, "Sure, here:\n\nDone.");
    }

    #[test]
    fn ignores_non_ui_update_fences() {
        let text = "```json\n{\"foo\":\"bar\"}\n```";
        assert!(extract_ui_action(text).is_none());
    }

    #[test]
    fn ignores_malformed_json() {
        let text = "```json\n{\"type\":\"ui_update\", oops\n```";
        assert!(extract_ui_action(text).is_none());
    }

    #[test]
    fn rejects_add_component_missing_required_fields() {
        let text = "```json\n{\"type\":\"ui_update\",\"action\":\"add_component\",\"data\":{\"id\":\"button_x\"}}\n```";
        assert!(extract_ui_action(text).is_none());
    }

    #[test]
    fn plain_text_with_no_fence_yields_none() {
        assert!(extract_ui_action("just a regular reply").is_none());
    }
}
