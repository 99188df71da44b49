use glam::DVec2;

use crate::geometry::CellCoord;
use crate::map::{LayerKind, TileId};

/// The armed tool. A single-select toggle group: arming one disarms the rest.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Tool {
    /// No paint tool: pointer-down on a tile drags it, on empty space pans.
    #[default]
    Select,
    Draw { tile_type: String },
    Expand,
    Shrink,
    Delete,
}

impl Tool {
    /// Whether this tool can be used with the given active layer kind.
    pub fn allowed_on(&self, kind: LayerKind) -> bool {
        match self {
            Self::Select => true,
            Self::Expand | Self::Shrink => kind == LayerKind::Grid,
            Self::Draw { .. } | Self::Delete => kind.holds_tiles(),
        }
    }
}

/// Progress of a paint stroke. `last_cell` suppresses re-applying the
/// operation while the pointer stays inside one cell.
#[derive(Clone, Debug, PartialEq)]
pub struct Stroke {
    pub last_cell: Option<CellCoord>,
    pub last_world: DVec2,
}

impl Stroke {
    pub fn start(world: DVec2) -> Self {
        Self {
            last_cell: None,
            last_world: world,
        }
    }
}

/// The current pointer gesture. Exactly one at a time.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum Mode {
    #[default]
    Idle,
    /// `anchor` is the last pointer position while the button is held.
    Panning { anchor: Option<DVec2> },
    /// A new tile dragged from the palette.
    DraggingPalette { tile_type: String, pointer: DVec2 },
    /// An existing tile being relocated. `crossed` turns true once the
    /// pointer leaves the origin cell; an uncrossed release is a click.
    DraggingPlaced {
        id: TileId,
        origin: CellCoord,
        pointer: DVec2,
        crossed: bool,
    },
    PaintingDraw { tile_type: String, stroke: Stroke },
    PaintingExpand { stroke: Stroke },
    PaintingShrink { stroke: Stroke },
    DeletingDrag { stroke: Stroke },
}

impl Mode {
    pub fn is_idle(&self) -> bool {
        matches!(self, Self::Idle)
    }

    pub fn is_panning(&self) -> bool {
        matches!(self, Self::Panning { .. })
    }

    pub fn is_drag(&self) -> bool {
        matches!(self, Self::DraggingPalette { .. } | Self::DraggingPlaced { .. })
    }

    pub fn stroke_mut(&mut self) -> Option<&mut Stroke> {
        match self {
            Self::PaintingDraw { stroke, .. }
            | Self::PaintingExpand { stroke }
            | Self::PaintingShrink { stroke }
            | Self::DeletingDrag { stroke } => Some(stroke),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Panning { .. } => "panning",
            Self::DraggingPalette { .. } => "dragging-palette",
            Self::DraggingPlaced { .. } => "dragging-placed",
            Self::PaintingDraw { .. } => "painting-draw",
            Self::PaintingExpand { .. } => "painting-expand",
            Self::PaintingShrink { .. } => "painting-shrink",
            Self::DeletingDrag { .. } => "deleting-drag",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_layer_gating() {
        assert!(Tool::Expand.allowed_on(LayerKind::Grid));
        assert!(!Tool::Shrink.allowed_on(LayerKind::Tiles));
        assert!(Tool::Delete.allowed_on(LayerKind::Image));
        assert!(!Tool::Draw { tile_type: "stone".into() }.allowed_on(LayerKind::Grid));
        assert!(Tool::Select.allowed_on(LayerKind::Grid));
    }

    #[test]
    fn test_stroke_access() {
        let mut m = Mode::PaintingShrink { stroke: Stroke::start(DVec2::ZERO) };
        assert!(m.stroke_mut().is_some());
        assert!(Mode::Idle.clone().stroke_mut().is_none());
        assert_eq!(m.name(), "painting-shrink");
    }
}
