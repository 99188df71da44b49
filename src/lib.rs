//! Hex and square tile map editing: coordinate geometry, a pan/zoom view,
//! the grid model, a pointer-driven interaction machine, and persistence
//! that copes with whichever storage shape a deployment has.

pub mod config;
pub mod edit;
pub mod editor;
pub mod geometry;
pub mod map;
pub mod persist;
pub mod view;

pub use config::EditorConfig;
pub use editor::{Editor, LoadState, SaveEvent};
