pub mod coord;
pub mod layout;
pub mod outline;

pub use coord::{CellCoord, Cube, ParseCoordError, Square};
pub use layout::{Corners, GridLayout, GridType, HexOrientation};
pub use outline::{boundary_edges, Edge};

use glam::DVec2;

/// Axis-aligned rectangle. Used for world-space bounds and screen-space zones.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Rect {
    pub min: DVec2,
    pub max: DVec2,
}

impl Rect {
    pub fn new(a: DVec2, b: DVec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    pub fn from_origin_size(origin: DVec2, size: DVec2) -> Self {
        Self::new(origin, origin + size)
    }

    pub fn contains(&self, p: DVec2) -> bool {
        p.x >= self.min.x && p.x <= self.max.x && p.y >= self.min.y && p.y <= self.max.y
    }

    pub fn including(self, p: DVec2) -> Self {
        Self {
            min: self.min.min(p),
            max: self.max.max(p),
        }
    }

    pub fn center(&self) -> DVec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> DVec2 {
        self.max - self.min
    }
}
