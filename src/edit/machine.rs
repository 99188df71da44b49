use glam::DVec2;
use winit::keyboard::KeyCode;

use super::input::{ActionEdge, EditorAction, InputState};
use super::mode::{Mode, Stroke, Tool};
use crate::geometry::{CellCoord, GridLayout, Rect};
use crate::map::{GridModel, LayerId, MoveOutcome, Rejection, TileId};
use crate::view::{FrameGate, ViewTransform, Viewport};

pub const DEFAULT_ZOOM_STEP: f64 = 1.1;

/// Upper bound on cells sampled along one pointer-move segment.
const MAX_STROKE_SAMPLES: usize = 4096;

/// A grid mutation (or notable non-mutation) produced by one input event.
#[derive(Clone, Debug, PartialEq)]
pub enum Edit {
    Placed(TileId),
    Moved(TileId, MoveOutcome),
    Deleted(TileId),
    Expanded(CellCoord),
    Shrunk(CellCoord),
    Selected(TileId),
    Cancelled,
}

/// Turns pointer, wheel and key events into grid edits.
///
/// Single-threaded: each handler runs to completion, so the mode is never
/// observed mid-transition.
pub struct InteractionMachine {
    pub viewport: Viewport,
    mode: Mode,
    /// Mode interrupted by the pan modifier, restored on release.
    suspended: Option<Mode>,
    tool: Tool,
    input: InputState,
    delete_zone: Option<Rect>,
    pointer: Option<DVec2>,
    zoom_step: f64,
    frames: FrameGate,
    log_pointer: bool,
}

impl Default for InteractionMachine {
    fn default() -> Self {
        Self::new(InputState::with_defaults(), Viewport::new())
    }
}

impl InteractionMachine {
    pub fn new(input: InputState, viewport: Viewport) -> Self {
        Self {
            viewport,
            mode: Mode::Idle,
            suspended: None,
            tool: Tool::Select,
            input,
            delete_zone: None,
            pointer: None,
            zoom_step: DEFAULT_ZOOM_STEP,
            frames: FrameGate::new(),
            log_pointer: false,
        }
    }

    pub fn with_zoom_step(mut self, step: f64) -> Self {
        if step.is_finite() && step > 1.0 {
            self.zoom_step = step;
        }
        self
    }

    pub fn with_pointer_logging(mut self, enabled: bool) -> Self {
        self.log_pointer = enabled;
        self
    }

    pub fn mode(&self) -> &Mode {
        &self.mode
    }

    pub fn tool(&self) -> &Tool {
        &self.tool
    }

    pub fn input(&self) -> &InputState {
        &self.input
    }

    pub fn set_delete_zone(&mut self, zone: Option<Rect>) {
        self.delete_zone = zone;
    }

    pub fn is_over_delete_zone(&self, screen: DVec2) -> bool {
        self.delete_zone.map(|z| z.contains(screen)).unwrap_or(false)
    }

    fn pan_held(&self) -> bool {
        self.input.is_active(EditorAction::PanModifier)
    }

    fn set_mode(&mut self, mode: Mode) {
        if self.log_pointer && self.mode.name() != mode.name() {
            log::debug!("mode {} -> {}", self.mode.name(), mode.name());
        }
        self.mode = mode;
    }

    fn push_view(&mut self) {
        self.frames.push(self.viewport.transform());
    }

    /// Called once per animation frame; yields the latest view transform if
    /// it changed since the previous frame.
    pub fn on_animation_frame(&mut self) -> Option<ViewTransform> {
        self.frames.on_frame()
    }

    fn cell_at(&self, layout: &GridLayout, screen: DVec2) -> CellCoord {
        layout.point_to_cell(self.viewport.screen_to_world(screen))
    }

    // Tools

    /// Arm a tool. Arming disarms every other tool; arming the armed tool
    /// again disarms it. Refused (with a status message) when the active
    /// layer does not fit the tool.
    pub fn arm(&mut self, tool: Tool, grid: &mut GridModel) -> bool {
        if tool != Tool::Select && self.tool == tool {
            self.tool = Tool::Select;
            return true;
        }
        let kind = grid.active_layer_kind();
        if !tool.allowed_on(kind) {
            let reason = match tool {
                Tool::Expand | Tool::Shrink => Rejection::GridLayerInactive,
                _ => Rejection::TileLayerInactive,
            };
            grid.set_status(reason);
            return false;
        }
        self.tool = tool;
        true
    }

    pub fn disarm(&mut self) {
        self.tool = Tool::Select;
    }

    /// Switch the active layer, disarming a tool that no longer applies.
    pub fn set_active_layer(&mut self, id: &LayerId, grid: &mut GridModel) -> bool {
        if !grid.set_active_layer(id) {
            return false;
        }
        if !self.tool.allowed_on(grid.active_layer_kind()) {
            log::debug!("disarming {:?}: not usable on layer {id}", self.tool);
            self.tool = Tool::Select;
        }
        true
    }

    /// Start dragging a new tile out of the palette.
    pub fn begin_palette_drag(&mut self, tile_type: &str, screen: DVec2) {
        if !self.mode.is_idle() {
            log::debug!("palette drag ignored during {}", self.mode.name());
            return;
        }
        self.tool = Tool::Select;
        self.pointer = Some(screen);
        self.set_mode(Mode::DraggingPalette {
            tile_type: tile_type.to_string(),
            pointer: screen,
        });
    }

    // Pointer

    pub fn pointer_down(&mut self, screen: DVec2, grid: &mut GridModel) -> Vec<Edit> {
        self.pointer = Some(screen);
        if self.log_pointer {
            log::debug!("pointer down at {screen:?} in {}", self.mode.name());
        }

        if self.pan_held() {
            self.set_mode(Mode::Panning { anchor: Some(screen) });
            return Vec::new();
        }
        if !self.mode.is_idle() {
            return Vec::new();
        }

        let layout = grid.layout();
        let world = self.viewport.screen_to_world(screen);
        let cell = layout.point_to_cell(world);
        let kind = grid.active_layer_kind();

        if !self.tool.allowed_on(kind) {
            self.tool = Tool::Select;
        }
        let stroke = Stroke::start(world);
        let next = match &self.tool {
            Tool::Select => {
                let active = grid.active_layer().clone();
                let hit = grid.tile_at(&active, cell).map(|t| t.id.clone());
                match hit {
                    Some(id) => Mode::DraggingPlaced {
                        id,
                        origin: cell,
                        pointer: screen,
                        crossed: false,
                    },
                    None => {
                        grid.clear_selection();
                        Mode::Panning { anchor: Some(screen) }
                    }
                }
            }
            Tool::Draw { tile_type } => Mode::PaintingDraw {
                tile_type: tile_type.clone(),
                stroke,
            },
            Tool::Expand => Mode::PaintingExpand { stroke },
            Tool::Shrink => Mode::PaintingShrink { stroke },
            Tool::Delete => Mode::DeletingDrag { stroke },
        };
        self.set_mode(next);

        let mut edits = Vec::new();
        if self.mode.stroke_mut().is_some() {
            self.paint_cell(cell, grid, &mut edits);
        }
        edits
    }

    pub fn pointer_move(&mut self, screen: DVec2, grid: &mut GridModel) -> Vec<Edit> {
        self.pointer = Some(screen);
        let mut edits = Vec::new();
        let layout = grid.layout();

        if let Some(from) = self.mode.stroke_mut().map(|s| s.last_world) {
            let world = self.viewport.screen_to_world(screen);
            for cell in cells_along(&layout, from, world) {
                self.paint_cell(cell, grid, &mut edits);
            }
            if let Some(stroke) = self.mode.stroke_mut() {
                stroke.last_world = world;
            }
            return edits;
        }

        match &mut self.mode {
            Mode::Panning { anchor: Some(anchor) } => {
                let delta = screen - *anchor;
                *anchor = screen;
                self.viewport.pan_by(delta);
                self.push_view();
            }
            Mode::Panning { anchor: None } | Mode::Idle => {}
            Mode::DraggingPalette { pointer, .. } => {
                *pointer = screen;
            }
            Mode::DraggingPlaced {
                origin,
                pointer,
                crossed,
                ..
            } => {
                *pointer = screen;
                let cell = layout.point_to_cell(self.viewport.screen_to_world(screen));
                if cell != *origin {
                    *crossed = true;
                }
            }
            Mode::PaintingDraw { .. }
            | Mode::PaintingExpand { .. }
            | Mode::PaintingShrink { .. }
            | Mode::DeletingDrag { .. } => {}
        }
        edits
    }

    pub fn pointer_up(&mut self, screen: DVec2, grid: &mut GridModel) -> Vec<Edit> {
        self.pointer = Some(screen);
        if self.log_pointer {
            log::debug!("pointer up at {screen:?} in {}", self.mode.name());
        }
        let mut edits = Vec::new();

        if self.mode.is_panning() && self.pan_held() {
            // Button released mid-pan; an interrupted gesture ends here too
            self.set_mode(Mode::Panning { anchor: None });
            if let Some(prior) = self.suspended.take() {
                edits.extend(self.finish(prior, screen, grid));
            }
            return edits;
        }

        let mode = std::mem::take(&mut self.mode);
        edits.extend(self.finish(mode, screen, grid));
        self.set_mode(Mode::Idle);
        edits
    }

    /// Pointer left the canvas: drops are cancelled, strokes end.
    pub fn pointer_leave(&mut self) -> Vec<Edit> {
        self.pointer = None;
        let mut edits = Vec::new();
        if self.mode.is_drag() {
            edits.push(Edit::Cancelled);
        }
        if self.pan_held() {
            if let Some(prior) = self.suspended.as_mut() {
                if prior.is_drag() {
                    edits.push(Edit::Cancelled);
                }
                *prior = Mode::Idle;
            }
            self.set_mode(Mode::Panning { anchor: None });
        } else {
            self.set_mode(Mode::Idle);
        }
        edits
    }

    /// Wheel zoom anchored at the pointer. Positive `notches` zoom out.
    pub fn wheel(&mut self, screen: DVec2, notches: f64) {
        self.pointer = Some(screen);
        self.viewport.zoom_by(screen, notches, self.zoom_step);
        self.push_view();
    }

    /// Finalise a gesture at pointer-up. The caller picks the next mode.
    fn finish(&mut self, mode: Mode, screen: DVec2, grid: &mut GridModel) -> Vec<Edit> {
        let mut edits = Vec::new();
        match mode {
            Mode::DraggingPalette { tile_type, .. } => {
                if self.is_over_delete_zone(screen) {
                    edits.push(Edit::Cancelled);
                } else {
                    let cell = self.cell_at(&grid.layout(), screen);
                    let layer = grid.active_layer().clone();
                    match grid.place(cell, &tile_type, &layer) {
                        Some(id) => edits.push(Edit::Placed(id)),
                        None => edits.push(Edit::Cancelled),
                    }
                }
            }
            Mode::DraggingPlaced {
                id, origin, crossed, ..
            } => {
                if self.is_over_delete_zone(screen) {
                    if grid.remove(&id).is_some() {
                        edits.push(Edit::Deleted(id));
                    }
                } else {
                    let cell = self.cell_at(&grid.layout(), screen);
                    if !crossed && cell == origin {
                        grid.select(&id);
                        edits.push(Edit::Selected(id));
                    } else {
                        match grid.move_tile(&id, cell) {
                            Some(outcome) => {
                                grid.select(&id);
                                edits.push(Edit::Moved(id, outcome));
                            }
                            None => edits.push(Edit::Cancelled),
                        }
                    }
                }
            }
            Mode::Idle
            | Mode::Panning { .. }
            | Mode::PaintingDraw { .. }
            | Mode::PaintingExpand { .. }
            | Mode::PaintingShrink { .. }
            | Mode::DeletingDrag { .. } => {}
        }
        edits
    }

    /// Apply the current stroke's operation to `cell` unless it was the
    /// last cell painted.
    fn paint_cell(&mut self, cell: CellCoord, grid: &mut GridModel, edits: &mut Vec<Edit>) {
        let Some(stroke) = self.mode.stroke_mut() else {
            return;
        };
        if stroke.last_cell == Some(cell) {
            return;
        }
        stroke.last_cell = Some(cell);

        let layer = grid.active_layer().clone();
        match &self.mode {
            Mode::PaintingDraw { tile_type, .. } => {
                // Strokes skip cells they cannot fill instead of spamming status
                if grid.is_allowed(cell) && grid.tile_at(&layer, cell).is_none() {
                    if let Some(id) = grid.place(cell, tile_type, &layer) {
                        edits.push(Edit::Placed(id));
                    }
                }
            }
            Mode::PaintingExpand { .. } => {
                if grid.expand(cell) {
                    edits.push(Edit::Expanded(cell));
                }
            }
            Mode::PaintingShrink { .. } => {
                if grid.shrink(cell).is_some() {
                    edits.push(Edit::Shrunk(cell));
                }
            }
            Mode::DeletingDrag { .. } => {
                if let Some(id) = grid.tile_at(&layer, cell).map(|t| t.id.clone()) {
                    if grid.remove(&id).is_some() {
                        edits.push(Edit::Deleted(id));
                    }
                }
            }
            _ => {}
        }
    }

    // Keyboard

    pub fn key(&mut self, code: KeyCode, pressed: bool, grid: &mut GridModel) -> Vec<Edit> {
        let edges = self.input.on_key_event(code, pressed);
        self.apply_edges(edges, grid)
    }

    /// Window lost focus: release held keys (restoring a pan-suspended mode).
    pub fn focus_lost(&mut self, grid: &mut GridModel) -> Vec<Edit> {
        let edges = self.input.release_all();
        self.apply_edges(edges, grid)
    }

    fn apply_edges(&mut self, edges: Vec<ActionEdge>, grid: &mut GridModel) -> Vec<Edit> {
        let mut edits = Vec::new();
        for edge in edges {
            match (edge.action, edge.pressed) {
                (EditorAction::PanModifier, true) => {
                    if !self.mode.is_panning() {
                        let prior = std::mem::take(&mut self.mode);
                        // A live gesture means the button is down: pan from here
                        let anchor = if prior.is_idle() { None } else { self.pointer };
                        self.suspended = Some(prior);
                        self.set_mode(Mode::Panning { anchor });
                    }
                }
                (EditorAction::PanModifier, false) => {
                    let prior = self.suspended.take().unwrap_or(Mode::Idle);
                    let mut restored = prior;
                    // Re-base a restored stroke so the pan does not paint a
                    // line across the cells the view slid over
                    if let (Some(stroke), Some(p)) = (restored.stroke_mut(), self.pointer) {
                        stroke.last_world = self.viewport.screen_to_world(p);
                    }
                    self.set_mode(restored);
                }
                (EditorAction::DeleteSelected, true) => {
                    if let Some(id) = grid.selected().cloned() {
                        if grid.remove(&id).is_some() {
                            edits.push(Edit::Deleted(id));
                        }
                    }
                }
                (EditorAction::Cancel, true) => {
                    if self.mode.is_drag() {
                        self.set_mode(Mode::Idle);
                        edits.push(Edit::Cancelled);
                    } else {
                        self.disarm();
                        grid.clear_selection();
                    }
                }
                (EditorAction::ArmDraw, true) => {
                    // Hotkey re-arms the last drawn tile type
                    if let Tool::Draw { tile_type } = self.last_draw_tool() {
                        self.arm(Tool::Draw { tile_type }, grid);
                    }
                }
                (EditorAction::ArmExpand, true) => {
                    self.arm(Tool::Expand, grid);
                }
                (EditorAction::ArmShrink, true) => {
                    self.arm(Tool::Shrink, grid);
                }
                (EditorAction::ArmDelete, true) => {
                    self.arm(Tool::Delete, grid);
                }
                (EditorAction::ZoomIn, true) | (EditorAction::ZoomOut, true) => {
                    let notches = if edge.action == EditorAction::ZoomIn { -1.0 } else { 1.0 };
                    let anchor = self.pointer.unwrap_or(self.viewport.pan);
                    self.viewport.zoom_by(anchor, notches, self.zoom_step);
                    self.push_view();
                }
                _ => {}
            }
        }
        edits
    }

    fn last_draw_tool(&self) -> Tool {
        match (&self.tool, &self.mode, &self.suspended) {
            (Tool::Draw { tile_type }, _, _)
            | (_, Mode::PaintingDraw { tile_type, .. }, _)
            | (_, _, Some(Mode::PaintingDraw { tile_type, .. })) => Tool::Draw {
                tile_type: tile_type.clone(),
            },
            _ => Tool::Select,
        }
    }
}

/// Cells crossed moving from `from` to `to` in world space, in order,
/// consecutive duplicates removed. Starts with the cell under `from`.
fn cells_along(layout: &GridLayout, from: DVec2, to: DVec2) -> Vec<CellCoord> {
    let step = (layout.size * 0.25).max(f64::EPSILON);
    let dist = (to - from).length();
    let n = ((dist / step).ceil() as usize).clamp(1, MAX_STROKE_SAMPLES);
    let mut cells: Vec<CellCoord> = Vec::new();
    for i in 0..=n {
        let p = from.lerp(to, i as f64 / n as f64);
        let cell = layout.point_to_cell(p);
        if cells.last() != Some(&cell) {
            cells.push(cell);
        }
    }
    cells
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::{Cube, GridType, Square};
    use crate::map::{LayerKind, MapConfiguration, MapDefaults, GRID_LAYER_ID, TILES_LAYER_ID};

    fn hex(q: i32, r: i32) -> CellCoord {
        CellCoord::Hex(Cube::new(q, r))
    }

    fn tiles_layer() -> LayerId {
        TILES_LAYER_ID.into()
    }

    /// Screen point over the centre of `cell` at the machine's current view.
    fn screen_of(m: &InteractionMachine, grid: &GridModel, cell: CellCoord) -> DVec2 {
        m.viewport.world_to_screen(grid.layout().cell_to_point(cell))
    }

    fn square_grid() -> GridModel {
        GridModel::from_config(MapConfiguration::new(&MapDefaults {
            grid_type: GridType::Square,
            columns: 10,
            rows: 10,
            cell_size: 10.0,
            ..Default::default()
        }))
    }

    #[test]
    fn test_arming_is_exclusive() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        assert!(m.arm(Tool::Draw { tile_type: "stone".into() }, &mut grid));
        assert!(m.arm(Tool::Delete, &mut grid));
        assert_eq!(m.tool(), &Tool::Delete);
        // Toggle off
        assert!(m.arm(Tool::Delete, &mut grid));
        assert_eq!(m.tool(), &Tool::Select);
    }

    #[test]
    fn test_expand_needs_grid_layer() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        assert!(!m.arm(Tool::Expand, &mut grid));
        assert_eq!(grid.status(), Some(&Rejection::GridLayerInactive));

        assert!(m.set_active_layer(&GRID_LAYER_ID.into(), &mut grid));
        assert!(m.arm(Tool::Expand, &mut grid));
        assert!(m.arm(Tool::Shrink, &mut grid));
        assert_eq!(m.tool(), &Tool::Shrink);

        // Leaving the grid layer disarms shape tools
        assert!(m.set_active_layer(&tiles_layer(), &mut grid));
        assert_eq!(m.tool(), &Tool::Select);
    }

    #[test]
    fn test_palette_drop_places() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let target = screen_of(&m, &grid, hex(1, 0));
        m.begin_palette_drag("stone", DVec2::new(-500.0, -500.0));
        m.pointer_move(target, &mut grid);
        let edits = m.pointer_up(target, &mut grid);
        assert!(matches!(edits.as_slice(), [Edit::Placed(_)]));
        assert_eq!(grid.tile_at(&tiles_layer(), hex(1, 0)).unwrap().tile_type, "stone");
        assert!(m.mode().is_idle());
    }

    #[test]
    fn test_palette_drop_outside_cancels() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let outside = screen_of(&m, &grid, hex(6, 0));
        m.begin_palette_drag("stone", outside);
        let edits = m.pointer_up(outside, &mut grid);
        assert_eq!(edits, vec![Edit::Cancelled]);
        assert_eq!(grid.tile_count(), 0);
        assert_eq!(grid.status(), Some(&Rejection::OutOfBounds(hex(6, 0))));
    }

    #[test]
    fn test_palette_drop_on_occupied_cancels() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        grid.place(hex(0, 0), "water", &tiles_layer()).unwrap();
        let p = screen_of(&m, &grid, hex(0, 0));
        m.begin_palette_drag("stone", p);
        assert_eq!(m.pointer_up(p, &mut grid), vec![Edit::Cancelled]);
        assert_eq!(grid.tile_count(), 1);
        assert_eq!(grid.tile_at(&tiles_layer(), hex(0, 0)).unwrap().tile_type, "water");
    }

    #[test]
    fn test_palette_drop_ignores_other_layers() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let decor = grid.add_layer("Decor", LayerKind::Tiles).unwrap();
        grid.place(hex(0, 0), "tree", &decor).unwrap();
        let p = screen_of(&m, &grid, hex(0, 0));
        m.begin_palette_drag("stone", p);
        assert!(matches!(m.pointer_up(p, &mut grid).as_slice(), [Edit::Placed(_)]));
        assert_eq!(grid.tile_count(), 2);
    }

    #[test]
    fn test_drag_placed_swaps() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let b = grid.place(hex(1, 0), "water", &tiles_layer()).unwrap();
        let from = screen_of(&m, &grid, hex(0, 0));
        let to = screen_of(&m, &grid, hex(1, 0));

        m.pointer_down(from, &mut grid);
        assert!(matches!(m.mode(), Mode::DraggingPlaced { .. }));
        m.pointer_move(to, &mut grid);
        let edits = m.pointer_up(to, &mut grid);
        assert_eq!(edits, vec![Edit::Moved(a.clone(), MoveOutcome::Swapped(b.clone()))]);
        assert_eq!(grid.tile(&a).unwrap().cell, hex(1, 0));
        assert_eq!(grid.tile(&b).unwrap().cell, hex(0, 0));
    }

    #[test]
    fn test_drag_placed_outside_cancels() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let from = screen_of(&m, &grid, hex(0, 0));
        let to = screen_of(&m, &grid, hex(8, 0));
        m.pointer_down(from, &mut grid);
        m.pointer_move(to, &mut grid);
        assert_eq!(m.pointer_up(to, &mut grid), vec![Edit::Cancelled]);
        assert_eq!(grid.tile(&a).unwrap().cell, hex(0, 0));
    }

    #[test]
    fn test_click_selects_and_key_deletes() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let p = screen_of(&m, &grid, hex(0, 0));
        m.pointer_down(p, &mut grid);
        assert_eq!(m.pointer_up(p + DVec2::new(1.0, 1.0), &mut grid), vec![Edit::Selected(a.clone())]);
        assert_eq!(grid.selected(), Some(&a));

        let edits = m.key(KeyCode::Delete, true, &mut grid);
        assert_eq!(edits, vec![Edit::Deleted(a)]);
        assert_eq!(grid.tile_count(), 0);
        assert!(grid.selected().is_none());
    }

    #[test]
    fn test_delete_zone_overrides_drop() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let from = screen_of(&m, &grid, hex(0, 0));
        let over = screen_of(&m, &grid, hex(1, 0));
        // The zone sits on top of a valid, empty cell
        m.set_delete_zone(Some(Rect::new(over - DVec2::splat(5.0), over + DVec2::splat(5.0))));
        m.pointer_down(from, &mut grid);
        m.pointer_move(over, &mut grid);
        assert_eq!(m.pointer_up(over, &mut grid), vec![Edit::Deleted(a)]);
        assert_eq!(grid.tile_count(), 0);
    }

    #[test]
    fn test_paint_draw_fires_once_per_cell() {
        let mut grid = square_grid();
        let mut m = InteractionMachine::default();
        m.arm(Tool::Draw { tile_type: "grass".into() }, &mut grid);

        m.pointer_down(DVec2::new(1.0, 1.0), &mut grid);
        assert_eq!(grid.tile_count(), 1);
        let rev = grid.revision();
        // Slow drag inside the same cell
        for i in 2..9 {
            m.pointer_move(DVec2::new(i as f64, 1.0), &mut grid);
        }
        assert_eq!(grid.revision(), rev);

        // Fast move across three cells in one event
        let edits = m.pointer_move(DVec2::new(35.0, 1.0), &mut grid);
        assert_eq!(edits.len(), 3);
        m.pointer_up(DVec2::new(35.0, 1.0), &mut grid);
        assert_eq!(grid.tile_count(), 4);
        assert!(m.mode().is_idle());
        for x in 0..4 {
            assert!(grid.tile_at(&tiles_layer(), Square::new(x, 0).into()).is_some());
        }
    }

    #[test]
    fn test_paint_expand_and_shrink() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        m.set_active_layer(&GRID_LAYER_ID.into(), &mut grid);
        let n = grid.allowed_count();

        m.arm(Tool::Expand, &mut grid);
        let p = screen_of(&m, &grid, hex(4, 0));
        assert_eq!(m.pointer_down(p, &mut grid), vec![Edit::Expanded(hex(4, 0))]);
        m.pointer_up(p, &mut grid);
        assert_eq!(grid.allowed_count(), n + 1);

        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        m.arm(Tool::Shrink, &mut grid);
        let p = screen_of(&m, &grid, hex(0, 0));
        assert_eq!(m.pointer_down(p, &mut grid), vec![Edit::Shrunk(hex(0, 0))]);
        m.pointer_up(p, &mut grid);
        assert_eq!(grid.tile_count(), 0);
        assert!(!grid.is_allowed(hex(0, 0)));
    }

    #[test]
    fn test_delete_drag() {
        let mut grid = square_grid();
        let mut m = InteractionMachine::default();
        for x in 0..3 {
            grid.place(Square::new(x, 0).into(), "wall", &tiles_layer()).unwrap();
        }
        m.arm(Tool::Delete, &mut grid);
        m.pointer_down(DVec2::new(5.0, 5.0), &mut grid);
        m.pointer_move(DVec2::new(25.0, 5.0), &mut grid);
        m.pointer_up(DVec2::new(25.0, 5.0), &mut grid);
        assert_eq!(grid.tile_count(), 0);
    }

    #[test]
    fn test_pan_modifier_suspends_and_restores() {
        let mut grid = square_grid();
        let mut m = InteractionMachine::default();
        m.arm(Tool::Draw { tile_type: "grass".into() }, &mut grid);
        m.pointer_down(DVec2::new(5.0, 5.0), &mut grid);
        assert!(matches!(m.mode(), Mode::PaintingDraw { .. }));

        m.key(KeyCode::Space, true, &mut grid);
        assert!(m.mode().is_panning());
        // The button is still down, so the same gesture now pans
        m.pointer_move(DVec2::new(50.0, 5.0), &mut grid);
        assert_eq!(m.viewport.pan, DVec2::new(45.0, 0.0));
        assert_eq!(grid.tile_count(), 1);

        m.key(KeyCode::Space, false, &mut grid);
        assert!(matches!(m.mode(), Mode::PaintingDraw { .. }));
        // The stroke resumes from the current pointer, not across the pan
        m.pointer_move(DVec2::new(55.0, 5.0), &mut grid);
        assert_eq!(grid.tile_count(), 2);
    }

    #[test]
    fn test_pan_modifier_during_tile_drag() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let id = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        let p = screen_of(&m, &grid, hex(0, 0));
        m.pointer_down(p, &mut grid);
        assert!(matches!(m.mode(), Mode::DraggingPlaced { .. }));

        m.key(KeyCode::Space, true, &mut grid);
        m.pointer_move(p + DVec2::new(100.0, 0.0), &mut grid);
        assert_eq!(m.viewport.pan, DVec2::new(100.0, 0.0));

        // Released mid-pan: the drag finishes where the pointer sits, which
        // after the pan is still over the tile's own cell
        m.pointer_up(p + DVec2::new(100.0, 0.0), &mut grid);
        assert!(m.mode().is_panning());
        assert_eq!(grid.tile(&id).unwrap().cell, hex(0, 0));
        m.key(KeyCode::Space, false, &mut grid);
        assert!(m.mode().is_idle());
    }

    #[test]
    fn test_pan_modifier_drag_pans() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        m.key(KeyCode::Space, true, &mut grid);
        let p = screen_of(&m, &grid, hex(0, 0));
        // Would start a tile drag without the modifier
        m.pointer_down(p, &mut grid);
        m.pointer_move(p + DVec2::new(30.0, -10.0), &mut grid);
        assert_eq!(m.viewport.pan, DVec2::new(30.0, -10.0));
        m.pointer_up(p + DVec2::new(30.0, -10.0), &mut grid);
        assert!(m.mode().is_panning());
        m.key(KeyCode::Space, false, &mut grid);
        assert!(m.mode().is_idle());
        assert_eq!(grid.tiles().next().unwrap().cell, hex(0, 0));
    }

    #[test]
    fn test_empty_space_pans_when_idle() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        m.pointer_down(DVec2::new(0.0, 0.0), &mut grid);
        assert!(m.mode().is_panning());
        m.pointer_move(DVec2::new(10.0, 20.0), &mut grid);
        m.pointer_up(DVec2::new(10.0, 20.0), &mut grid);
        assert_eq!(m.viewport.pan, DVec2::new(10.0, 20.0));
        assert!(m.mode().is_idle());
        assert_eq!(m.on_animation_frame().map(|t| t.pan), Some(DVec2::new(10.0, 20.0)));
    }

    #[test]
    fn test_wheel_zoom_keeps_anchor() {
        let mut m = InteractionMachine::default();
        let anchor = DVec2::new(100.0, 100.0);
        let before = m.viewport.screen_to_world(anchor);
        m.wheel(anchor, -3.0);
        assert!(m.viewport.scale > 1.0);
        assert!((m.viewport.screen_to_world(anchor) - before).length() < 1e-9);
    }

    #[test]
    fn test_escape_cancels_drag() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        m.begin_palette_drag("stone", DVec2::ZERO);
        assert_eq!(m.key(KeyCode::Escape, true, &mut grid), vec![Edit::Cancelled]);
        assert!(m.mode().is_idle());
        m.pointer_up(DVec2::ZERO, &mut grid);
        assert_eq!(grid.tile_count(), 0);
    }

    #[test]
    fn test_leave_cancels_placed_drag() {
        let mut grid = GridModel::default();
        let mut m = InteractionMachine::default();
        let a = grid.place(hex(0, 0), "stone", &tiles_layer()).unwrap();
        m.pointer_down(screen_of(&m, &grid, hex(0, 0)), &mut grid);
        m.pointer_move(screen_of(&m, &grid, hex(1, 0)), &mut grid);
        assert_eq!(m.pointer_leave(), vec![Edit::Cancelled]);
        assert_eq!(grid.tile(&a).unwrap().cell, hex(0, 0));
    }

    #[test]
    fn test_cells_along_dedupes() {
        let layout = GridLayout::square(10.0);
        let cells = cells_along(&layout, DVec2::new(1.0, 1.0), DVec2::new(29.0, 1.0));
        assert_eq!(
            cells,
            vec![
                Square::new(0, 0).into(),
                Square::new(1, 0).into(),
                Square::new(2, 0).into()
            ]
        );
    }
}
