//! ViewStore: authoritative in-memory ViewState with serialized mutation and
//! lock-free snapshots.

use crate::error::{Result, ViewStoreError};

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex, broadcast};

use std::sync::Arc;

/// Horizontal/vertical step of the placement grid, in pixels (spec §4.1).
const GRID_STEP: i64 = 200;
const GRID_ORIGIN: i64 = 100;
/// Columns scanned per row before wrapping to the next row.
const GRID_COLUMNS: i64 = 20;
/// Hard cap on candidate slots scanned by [`find_free_slot`], so a
/// pathologically full canvas fails fast instead of looping forever.
/// See DESIGN.md open-question decision #1.
const MAX_SLOT_CANDIDATES: usize = 1000;

/// The closed set of component types (§3 Component).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum ComponentType {
    Button,
    Text,
    AnimatedText,
    Image,
    Input,
    Card,
    Form,
    Navigation,
    Hero,
    Gallery,
}

impl ComponentType {
    pub const ALL: [ComponentType; 10] = [
        ComponentType::Button,
        ComponentType::Text,
        ComponentType::AnimatedText,
        ComponentType::Image,
        ComponentType::Input,
        ComponentType::Card,
        ComponentType::Form,
        ComponentType::Navigation,
        ComponentType::Hero,
        ComponentType::Gallery,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ComponentType::Button => "button",
            ComponentType::Text => "text",
            ComponentType::AnimatedText => "animated-text",
            ComponentType::Image => "image",
            ComponentType::Input => "input",
            ComponentType::Card => "card",
            ComponentType::Form => "form",
            ComponentType::Navigation => "navigation",
            ComponentType::Hero => "hero",
            ComponentType::Gallery => "gallery",
        }
    }

    pub fn parse(value: &str) -> Option<ComponentType> {
        ComponentType::ALL.into_iter().find(|t| t.as_str() == value)
    }

    /// Default size used when a caller doesn't specify one.
    pub fn default_size(&self) -> Size {
        match self {
            ComponentType::Button => Size { w: 160, h: 40 },
            ComponentType::Text | ComponentType::AnimatedText => Size { w: 200, h: 24 },
            ComponentType::Image => Size { w: 300, h: 200 },
            ComponentType::Input => Size { w: 240, h: 40 },
            ComponentType::Card => Size { w: 320, h: 220 },
            ComponentType::Form => Size { w: 360, h: 400 },
            ComponentType::Navigation => Size { w: 600, h: 60 },
            ComponentType::Hero => Size { w: 800, h: 400 },
            ComponentType::Gallery => Size { w: 600, h: 400 },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ComponentCategory {
    Atom,
    Molecule,
    Organism,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Position {
    pub x: i64,
    pub y: i64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Size {
    pub w: i64,
    pub h: i64,
}

fn rects_overlap(a_pos: Position, a_size: Size, b_pos: Position, b_size: Size) -> bool {
    a_pos.x < b_pos.x + b_size.w
        && b_pos.x < a_pos.x + a_size.w
        && a_pos.y < b_pos.y + b_size.h
        && b_pos.y < a_pos.y + a_size.h
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Component {
    pub id: String,
    #[serde(rename = "type")]
    pub component_type: ComponentType,
    pub category: ComponentCategory,
    #[serde(default)]
    pub properties: serde_json::Map<String, serde_json::Value>,
    pub position: Position,
    pub size: Size,
}

impl Component {
    /// Validate the id-prefix rule from §4.4: the prefix before the first
    /// `_` (or the whole id, if there is no `_`) must name a known type.
    pub fn validate_id(id: &str) -> bool {
        let prefix = id.split('_').next().unwrap_or(id);
        ComponentType::parse(prefix).is_some()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ThemeColors {
    pub primary: String,
    pub secondary: String,
    pub accent: String,
    pub background: String,
    pub surface: String,
    pub text: String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ThemeEffects {
    pub glow: bool,
    pub gradients: bool,
    pub animations: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Theme {
    pub id: String,
    pub name: String,
    pub colors: ThemeColors,
    pub effects: ThemeEffects,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            id: "default".into(),
            name: "Default".into(),
            colors: ThemeColors {
                primary: "#6366f1".into(),
                secondary: "#8b5cf6".into(),
                accent: "#ec4899".into(),
                background: "#0f172a".into(),
                surface: "#1e293b".into(),
                text: "#f8fafc".into(),
            },
            effects: ThemeEffects {
                glow: false,
                gradients: true,
                animations: true,
            },
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Layout {
    pub grid: i64,
    pub row_height: i64,
    pub margin: [i64; 2],
    pub container_padding: [i64; 2],
    pub show_grid: bool,
    pub snap_to_grid: bool,
}

impl Default for Layout {
    fn default() -> Self {
        Self {
            grid: 12,
            row_height: 30,
            margin: [10, 10],
            container_padding: [10, 10],
            show_grid: true,
            snap_to_grid: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, schemars::JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum Viewport {
    Desktop,
    Tablet,
    Mobile,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, schemars::JsonSchema)]
pub struct PanOffset {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, schemars::JsonSchema)]
pub struct Canvas {
    pub viewport: Viewport,
    pub zoom: f64,
    pub pan_offset: PanOffset,
    #[serde(default)]
    pub selected_id: String,
}

impl Default for Canvas {
    fn default() -> Self {
        Self {
            viewport: Viewport::Desktop,
            zoom: 1.0,
            pan_offset: PanOffset { x: 0.0, y: 0.0 },
            selected_id: String::new(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ViewState {
    pub components: Vec<Component>,
    #[serde(default)]
    pub theme: Theme,
    #[serde(default)]
    pub layout: Layout,
    #[serde(default)]
    pub canvas: Canvas,
}

/// A patch applied to an existing component by `update_component`.
#[derive(Debug, Clone, Default, Serialize, Deserialize, schemars::JsonSchema)]
pub struct ComponentPatch {
    pub properties: Option<serde_json::Map<String, serde_json::Value>>,
    pub position: Option<Position>,
    pub size: Option<Size>,
}

/// One atomic change submitted to [`ViewStore::apply`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Mutation {
    AddComponent(Component),
    UpdateComponent { id: String, patch: ComponentPatch },
    RemoveComponent { id: String },
    SetTheme(Theme),
    SetLayout(Layout),
    SetCanvas(Canvas),
    /// Wholesale replacement, backing the JSON-RPC `view_state_set` tool.
    /// Not named in §4.1's operation list but required by §6.3's external
    /// interface; validated exactly as strictly as the five named mutations.
    ReplaceAll(ViewState),
}

/// Describes what changed, emitted to subscribers after a successful `apply`.
#[derive(Debug, Clone, Serialize)]
pub struct ChangeSet {
    pub mutation: MutationSummary,
}

/// A subscriber-facing summary of an applied mutation. Mirrors [`Mutation`]
/// but carries the resolved component id (after collision-shift / id
/// assignment), which the caller's `Mutation` may not have had.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum MutationSummary {
    AddComponent { component: Component },
    UpdateComponent { id: String },
    RemoveComponent { id: String },
    SetTheme,
    SetLayout,
    SetCanvas,
    ReplaceAll,
}

/// Authoritative, concurrency-safe holder of the current [`ViewState`].
pub struct ViewStore {
    state: ArcSwap<ViewState>,
    write_lock: Mutex<()>,
    changes: broadcast::Sender<ChangeSet>,
}

impl ViewStore {
    pub fn new() -> Self {
        Self::with_state(ViewState::default())
    }

    pub fn with_state(initial: ViewState) -> Self {
        let (changes, _rx) = broadcast::channel(256);
        Self {
            state: ArcSwap::new(Arc::new(initial)),
            write_lock: Mutex::new(()),
            changes,
        }
    }

    /// Returns a deep copy of the current state. Never blocks on writers
    /// longer than the `Arc` clone itself.
    pub fn snapshot(&self) -> ViewState {
        (**self.state.load()).clone()
    }

    /// Register a sink for every committed change. Dropping the returned
    /// receiver unsubscribes.
    pub fn subscribe(&self) -> broadcast::Receiver<ChangeSet> {
        self.changes.subscribe()
    }

    /// Atomically validate and apply one mutation, publish the new snapshot,
    /// and notify subscribers.
    pub async fn apply(&self, mutation: Mutation) -> Result<(ViewState, ChangeSet)> {
        let _guard = self.write_lock.lock().await;
        let current = self.state.load_full();
        let mut next = (*current).clone();

        let summary = match mutation {
            Mutation::AddComponent(mut component) => {
                if component.id.is_empty() {
                    component.id = self.generate_id(&next, component.component_type);
                } else if next.components.iter().any(|c| c.id == component.id) {
                    return Err(ViewStoreError::DuplicateComponentId(component.id).into());
                } else if !Component::validate_id(&component.id) {
                    return Err(ViewStoreError::InvalidMutation(format!(
                        "component id '{}' does not start with a known component type",
                        component.id
                    ))
                    .into());
                }

                let resolved_position =
                    find_free_slot(&next.components, component.position, component.size)?;
                component.position = resolved_position;
                next.components.push(component.clone());
                MutationSummary::AddComponent { component }
            }
            Mutation::UpdateComponent { id, patch } => {
                let existing = next
                    .components
                    .iter_mut()
                    .find(|c| c.id == id)
                    .ok_or_else(|| ViewStoreError::UnknownComponentId(id.clone()))?;
                if let Some(properties) = patch.properties {
                    existing.properties = properties;
                }
                if let Some(position) = patch.position {
                    existing.position = position;
                }
                if let Some(size) = patch.size {
                    existing.size = size;
                }
                MutationSummary::UpdateComponent { id }
            }
            Mutation::RemoveComponent { id } => {
                let before = next.components.len();
                next.components.retain(|c| c.id != id);
                if next.components.len() == before {
                    return Err(ViewStoreError::UnknownComponentId(id).into());
                }
                if next.canvas.selected_id == id {
                    next.canvas.selected_id.clear();
                }
                MutationSummary::RemoveComponent { id }
            }
            Mutation::SetTheme(theme) => {
                next.theme = theme;
                MutationSummary::SetTheme
            }
            Mutation::SetLayout(layout) => {
                if layout.grid < 1 {
                    return Err(ViewStoreError::InvalidMutation(
                        "layout.grid must be >= 1".into(),
                    )
                    .into());
                }
                next.layout = layout;
                MutationSummary::SetLayout
            }
            Mutation::SetCanvas(canvas) => {
                if !canvas.selected_id.is_empty()
                    && !next.components.iter().any(|c| c.id == canvas.selected_id)
                {
                    return Err(ViewStoreError::InvalidMutation(format!(
                        "selected_id '{}' does not match any live component",
                        canvas.selected_id
                    ))
                    .into());
                }
                next.canvas = canvas;
                MutationSummary::SetCanvas
            }
            Mutation::ReplaceAll(candidate) => {
                validate_view_state(&candidate)?;
                next = candidate;
                MutationSummary::ReplaceAll
            }
        };

        self.state.store(Arc::new(next.clone()));
        let change_set = ChangeSet { mutation: summary };
        let _ = self.changes.send(change_set.clone());
        Ok((next, change_set))
    }

    fn generate_id(&self, state: &ViewState, component_type: ComponentType) -> String {
        let base = component_type.as_str();
        if !state.components.iter().any(|c| c.id == base) {
            return base.to_string();
        }
        loop {
            let candidate = format!("{base}_{}", &uuid::Uuid::new_v4().simple().to_string()[..8]);
            if !state.components.iter().any(|c| c.id == candidate) {
                return candidate;
            }
        }
    }
}

impl Default for ViewStore {
    fn default() -> Self {
        Self::new()
    }
}

/// Full invariant check for a candidate [`ViewState`] arriving wholesale
/// (`view_state_set`). See DESIGN.md open-question decision #2: ids are held
/// to the same prefix rule as `add_component`.
fn validate_view_state(state: &ViewState) -> Result<()> {
    let mut seen = std::collections::HashSet::with_capacity(state.components.len());
    for component in &state.components {
        if !Component::validate_id(&component.id) {
            return Err(ViewStoreError::InvalidMutation(format!(
                "component id '{}' does not start with a known component type",
                component.id
            ))
            .into());
        }
        if !seen.insert(component.id.clone()) {
            return Err(ViewStoreError::DuplicateComponentId(component.id.clone()).into());
        }
    }
    if state.layout.grid < 1 {
        return Err(ViewStoreError::InvalidMutation("layout.grid must be >= 1".into()).into());
    }
    if !state.canvas.selected_id.is_empty()
        && !state
            .components
            .iter()
            .any(|c| c.id == state.canvas.selected_id)
    {
        return Err(ViewStoreError::InvalidMutation(format!(
            "selected_id '{}' does not match any live component",
            state.canvas.selected_id
        ))
        .into());
    }
    Ok(())
}

/// Find the first free slot on the placement grid for `size`, starting from
/// `proposed` if it doesn't overlap anything, else scanning the grid. See
/// DESIGN.md open-question decision #1 for the row-wrap behavior.
fn find_free_slot(
    existing: &[Component],
    proposed: Position,
    size: Size,
) -> Result<Position, ViewStoreError> {
    if !existing
        .iter()
        .any(|c| rects_overlap(proposed, size, c.position, c.size))
    {
        return Ok(proposed);
    }

    let mut checked = 0usize;
    let mut row = 0i64;
    loop {
        for col in 0..GRID_COLUMNS {
            checked += 1;
            if checked > MAX_SLOT_CANDIDATES {
                return Err(ViewStoreError::NoFreeSlot(MAX_SLOT_CANDIDATES));
            }
            let candidate = Position {
                x: GRID_ORIGIN + col * GRID_STEP,
                y: GRID_ORIGIN + row * GRID_STEP,
            };
            if !existing
                .iter()
                .any(|c| rects_overlap(candidate, size, c.position, c.size))
            {
                return Ok(candidate);
            }
        }
        row += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn button(id: &str, x: i64, y: i64) -> Component {
        Component {
            id: id.into(),
            component_type: ComponentType::Button,
            category: ComponentCategory::Atom,
            properties: Default::default(),
            position: Position { x, y },
            size: Size { w: 160, h: 40 },
        }
    }

    #[tokio::test]
    async fn add_component_assigns_default_id_when_empty() {
        let store = ViewStore::new();
        let mut component = button("", 100, 100);
        component.id.clear();
        let (state, _changes) = store
            .apply(Mutation::AddComponent(component))
            .await
            .unwrap();
        assert_eq!(state.components.len(), 1);
        assert!(Component::validate_id(&state.components[0].id));
    }

    #[tokio::test]
    async fn collision_shifts_to_first_free_slot() {
        let store = ViewStore::new();
        store
            .apply(Mutation::AddComponent(button("button_a", 100, 100)))
            .await
            .unwrap();

        let (state, _) = store
            .apply(Mutation::AddComponent(button("button_b", 100, 100)))
            .await
            .unwrap();

        assert_eq!(state.components.len(), 2);
        let shifted = state.components.iter().find(|c| c.id == "button_b").unwrap();
        assert_eq!(shifted.position, Position { x: 300, y: 100 });
    }

    #[tokio::test]
    async fn duplicate_id_is_rejected() {
        let store = ViewStore::new();
        store
            .apply(Mutation::AddComponent(button("button_a", 100, 100)))
            .await
            .unwrap();
        let result = store
            .apply(Mutation::AddComponent(button("button_a", 500, 500)))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn remove_unknown_component_errors() {
        let store = ViewStore::new();
        let result = store
            .apply(Mutation::RemoveComponent { id: "button_x".into() })
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn remove_component_clears_selection() {
        let store = ViewStore::new();
        store
            .apply(Mutation::AddComponent(button("button_a", 100, 100)))
            .await
            .unwrap();
        store
            .apply(Mutation::SetCanvas(Canvas {
                selected_id: "button_a".into(),
                ..Canvas::default()
            }))
            .await
            .unwrap();
        let (state, _) = store
            .apply(Mutation::RemoveComponent { id: "button_a".into() })
            .await
            .unwrap();
        assert!(state.canvas.selected_id.is_empty());
    }

    #[tokio::test]
    async fn set_canvas_rejects_unknown_selection() {
        let store = ViewStore::new();
        let result = store
            .apply(Mutation::SetCanvas(Canvas {
                selected_id: "button_ghost".into(),
                ..Canvas::default()
            }))
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn replace_all_validates_component_ids() {
        let store = ViewStore::new();
        let mut state = ViewState::default();
        state.components.push(button("not-a-type", 100, 100));
        let result = store.apply(Mutation::ReplaceAll(state)).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn snapshot_reflects_latest_committed_state() {
        let store = ViewStore::new();
        assert!(store.snapshot().components.is_empty());
        store
            .apply(Mutation::AddComponent(button("button_a", 100, 100)))
            .await
            .unwrap();
        assert_eq!(store.snapshot().components.len(), 1);
    }
}
