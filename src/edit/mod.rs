pub mod input;
pub mod machine;
pub mod mode;

pub use input::{default_bindings, ActionEdge, EditorAction, InputState, KeyBind};
pub use machine::{Edit, InteractionMachine, DEFAULT_ZOOM_STEP};
pub use mode::{Mode, Stroke, Tool};
