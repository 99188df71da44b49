pub mod viewport;

pub use viewport::{FrameGate, ViewTransform, Viewport};
