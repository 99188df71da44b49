use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use winit::keyboard::KeyCode;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EditorAction {
    /// Held: pointer drags pan the view regardless of the armed tool.
    PanModifier,
    DeleteSelected,
    Cancel,
    ArmDraw,
    ArmExpand,
    ArmShrink,
    ArmDelete,
    ZoomIn,
    ZoomOut,
}

impl EditorAction {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::PanModifier => "Pan (hold)",
            Self::DeleteSelected => "Delete Selected",
            Self::Cancel => "Cancel",
            Self::ArmDraw => "Draw Tool",
            Self::ArmExpand => "Expand Grid Tool",
            Self::ArmShrink => "Shrink Grid Tool",
            Self::ArmDelete => "Delete Tool",
            Self::ZoomIn => "Zoom In",
            Self::ZoomOut => "Zoom Out",
        }
    }

    pub fn all() -> &'static [EditorAction] {
        use EditorAction::*;
        &[
            PanModifier, DeleteSelected, Cancel, ArmDraw, ArmExpand,
            ArmShrink, ArmDelete, ZoomIn, ZoomOut,
        ]
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct KeyBind {
    pub code: KeyCode,
    pub shift: bool,
}

impl KeyBind {
    pub fn new(code: KeyCode) -> Self {
        Self { code, shift: false }
    }

    pub fn with_shift(code: KeyCode) -> Self {
        Self { code, shift: true }
    }

    pub fn display_name(&self) -> String {
        if self.shift {
            format!("Shift+{:?}", self.code)
        } else {
            format!("{:?}", self.code)
        }
    }
}

impl Serialize for KeyBind {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.display_name())
    }
}

impl<'de> Deserialize<'de> for KeyBind {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let (shift, key_str) = if let Some(rest) = s.strip_prefix("Shift+") {
            (true, rest)
        } else {
            (false, s.as_str())
        };
        let code = keycode_from_str(key_str).ok_or_else(|| {
            serde::de::Error::custom(format!("Unknown key code: {key_str}"))
        })?;
        Ok(KeyBind { code, shift })
    }
}

/// Keys accepted in the config file, named by their `Debug` form.
const NAMED_KEYS: &[KeyCode] = &[
    KeyCode::KeyA, KeyCode::KeyB, KeyCode::KeyC, KeyCode::KeyD, KeyCode::KeyE,
    KeyCode::KeyF, KeyCode::KeyG, KeyCode::KeyH, KeyCode::KeyI, KeyCode::KeyJ,
    KeyCode::KeyK, KeyCode::KeyL, KeyCode::KeyM, KeyCode::KeyN, KeyCode::KeyO,
    KeyCode::KeyP, KeyCode::KeyQ, KeyCode::KeyR, KeyCode::KeyS, KeyCode::KeyT,
    KeyCode::KeyU, KeyCode::KeyV, KeyCode::KeyW, KeyCode::KeyX, KeyCode::KeyY,
    KeyCode::KeyZ,
    KeyCode::Digit0, KeyCode::Digit1, KeyCode::Digit2, KeyCode::Digit3, KeyCode::Digit4,
    KeyCode::Digit5, KeyCode::Digit6, KeyCode::Digit7, KeyCode::Digit8, KeyCode::Digit9,
    KeyCode::Minus, KeyCode::Equal, KeyCode::BracketLeft, KeyCode::BracketRight,
    KeyCode::Escape, KeyCode::Tab, KeyCode::Space, KeyCode::Enter,
    KeyCode::Backspace, KeyCode::Delete, KeyCode::Home, KeyCode::End,
    KeyCode::ArrowUp, KeyCode::ArrowDown, KeyCode::ArrowLeft, KeyCode::ArrowRight,
    KeyCode::ShiftLeft, KeyCode::ShiftRight, KeyCode::ControlLeft, KeyCode::ControlRight,
    KeyCode::AltLeft, KeyCode::AltRight,
    KeyCode::NumpadAdd, KeyCode::NumpadSubtract,
];

fn keycode_from_str(s: &str) -> Option<KeyCode> {
    NAMED_KEYS.iter().copied().find(|code| format!("{code:?}") == s)
}

/// Default key map. An action may have several keys (Delete and Backspace
/// both delete the selection).
pub fn default_bindings() -> HashMap<EditorAction, Vec<KeyBind>> {
    use EditorAction::*;
    HashMap::from([
        (PanModifier, vec![KeyBind::new(KeyCode::Space)]),
        (
            DeleteSelected,
            vec![KeyBind::new(KeyCode::Delete), KeyBind::new(KeyCode::Backspace)],
        ),
        (Cancel, vec![KeyBind::new(KeyCode::Escape)]),
        (ArmDraw, vec![KeyBind::new(KeyCode::KeyB)]),
        (ArmExpand, vec![KeyBind::new(KeyCode::KeyE)]),
        (ArmShrink, vec![KeyBind::with_shift(KeyCode::KeyE)]),
        (ArmDelete, vec![KeyBind::new(KeyCode::KeyX)]),
        (ZoomIn, vec![KeyBind::new(KeyCode::Equal)]),
        (ZoomOut, vec![KeyBind::new(KeyCode::Minus)]),
    ])
}

/// An action edge produced by one key event.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActionEdge {
    pub action: EditorAction,
    pub pressed: bool,
}

pub struct InputState {
    pub bindings: HashMap<EditorAction, Vec<KeyBind>>,
    reverse_map: HashMap<KeyCode, Vec<EditorAction>>,
    active_actions: HashSet<EditorAction>,
    just_pressed_actions: HashSet<EditorAction>,
    pub shift_held: bool,
}

impl InputState {
    pub fn new(bindings: HashMap<EditorAction, Vec<KeyBind>>) -> Self {
        let reverse_map = build_reverse_map(&bindings);
        Self {
            bindings,
            reverse_map,
            active_actions: HashSet::new(),
            just_pressed_actions: HashSet::new(),
            shift_held: false,
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(default_bindings())
    }

    /// Feed one key event. Returns the action edges it caused; auto-repeat
    /// presses of an already active action produce no edge.
    pub fn on_key_event(&mut self, code: KeyCode, pressed: bool) -> Vec<ActionEdge> {
        if code == KeyCode::ShiftLeft || code == KeyCode::ShiftRight {
            self.shift_held = pressed;
        }

        let mut edges = Vec::new();
        let Some(actions) = self.reverse_map.get(&code) else {
            return edges;
        };
        for &action in actions {
            if pressed {
                // On press: require modifier match for one of this action's binds on `code`
                let matches = self
                    .bindings
                    .get(&action)
                    .map(|binds| binds.iter().any(|b| b.code == code && b.shift == self.shift_held))
                    .unwrap_or(false);
                if !matches {
                    continue;
                }
                if self.active_actions.insert(action) {
                    self.just_pressed_actions.insert(action);
                    edges.push(ActionEdge { action, pressed: true });
                }
            } else if self.active_actions.remove(&action) {
                // On release: always deactivate to prevent stuck actions
                edges.push(ActionEdge { action, pressed: false });
            }
        }
        edges
    }

    pub fn is_active(&self, action: EditorAction) -> bool {
        self.active_actions.contains(&action)
    }

    pub fn just_pressed(&self, action: EditorAction) -> bool {
        self.just_pressed_actions.contains(&action)
    }

    pub fn end_frame(&mut self) {
        self.just_pressed_actions.clear();
    }

    /// Focus loss: drop every held action so nothing stays stuck.
    pub fn release_all(&mut self) -> Vec<ActionEdge> {
        self.shift_held = false;
        self.active_actions
            .drain()
            .map(|action| ActionEdge { action, pressed: false })
            .collect()
    }

    pub fn rebind(&mut self, action: EditorAction, binds: Vec<KeyBind>) {
        self.bindings.insert(action, binds);
        self.reverse_map = build_reverse_map(&self.bindings);
    }
}

fn build_reverse_map(
    bindings: &HashMap<EditorAction, Vec<KeyBind>>,
) -> HashMap<KeyCode, Vec<EditorAction>> {
    let mut map: HashMap<KeyCode, Vec<EditorAction>> = HashMap::new();
    for (&action, binds) in bindings {
        for bind in binds {
            let entry = map.entry(bind.code).or_default();
            if !entry.contains(&action) {
                entry.push(action);
            }
        }
    }
    map
}
