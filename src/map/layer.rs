use serde::{Deserialize, Serialize};
use std::fmt;

pub const GRID_LAYER_ID: &str = "grid";
pub const TILES_LAYER_ID: &str = "tiles";

#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerId(pub String);

impl LayerId {
    pub fn generate() -> Self {
        Self(format!("layer-{}", uuid::Uuid::new_v4()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for LayerId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Grid,
    Tiles,
    Image,
    Background,
}

impl LayerKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Grid => "grid",
            Self::Tiles => "tiles",
            Self::Image => "image",
            Self::Background => "background",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "grid" => Some(Self::Grid),
            "tiles" | "tile" | "widgets" => Some(Self::Tiles),
            "image" => Some(Self::Image),
            "background" | "bg" => Some(Self::Background),
            _ => None,
        }
    }

    /// Whether tiles may be placed on a layer of this kind.
    pub fn holds_tiles(self) -> bool {
        self != Self::Grid
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    pub id: LayerId,
    pub name: String,
    pub kind: LayerKind,
    pub visible: bool,
    pub order: u32,
}

impl Layer {
    pub fn new(id: LayerId, name: impl Into<String>, kind: LayerKind, order: u32) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            visible: true,
            order,
        }
    }

    pub fn default_grid() -> Self {
        Self::new(GRID_LAYER_ID.into(), "Grid", LayerKind::Grid, 0)
    }

    pub fn default_tiles() -> Self {
        Self::new(TILES_LAYER_ID.into(), "Tiles", LayerKind::Tiles, 1)
    }
}

/// Ordered layer list. Holds exactly one `Grid` layer at all times.
#[derive(Clone, Debug, PartialEq)]
pub struct LayerStack {
    layers: Vec<Layer>,
}

impl Default for LayerStack {
    fn default() -> Self {
        Self {
            layers: vec![Layer::default_grid(), Layer::default_tiles()],
        }
    }
}

impl LayerStack {
    /// Build from an arbitrary list, repairing it so that exactly one grid
    /// layer and at least one tiles layer exist and ids are unique.
    pub fn from_layers(layers: Vec<Layer>) -> Self {
        let mut out: Vec<Layer> = Vec::with_capacity(layers.len() + 2);
        let mut seen_grid = false;
        for mut layer in layers {
            if out.iter().any(|l| l.id == layer.id) {
                log::warn!("dropping duplicate layer id {}", layer.id);
                continue;
            }
            if layer.kind == LayerKind::Grid {
                if seen_grid {
                    log::warn!("demoting extra grid layer {} to tiles", layer.id);
                    layer.kind = LayerKind::Tiles;
                } else {
                    seen_grid = true;
                }
            }
            out.push(layer);
        }
        out.sort_by_key(|l| l.order);

        if !seen_grid {
            let mut grid = Layer::default_grid();
            if out.iter().any(|l| l.id == grid.id) {
                grid.id = LayerId::generate();
            }
            out.insert(0, grid);
        }
        if !out.iter().any(|l| l.kind == LayerKind::Tiles) {
            let mut tiles = Layer::default_tiles();
            if out.iter().any(|l| l.id == tiles.id) {
                tiles.id = LayerId::generate();
            }
            out.push(tiles);
        }

        let mut stack = Self { layers: out };
        stack.renumber();
        stack
    }

    fn renumber(&mut self) {
        for (i, layer) in self.layers.iter_mut().enumerate() {
            layer.order = i as u32;
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &Layer> {
        self.layers.iter()
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn to_vec(&self) -> Vec<Layer> {
        self.layers.clone()
    }

    pub fn get(&self, id: &LayerId) -> Option<&Layer> {
        self.layers.iter().find(|l| &l.id == id)
    }

    fn get_mut(&mut self, id: &LayerId) -> Option<&mut Layer> {
        self.layers.iter_mut().find(|l| &l.id == id)
    }

    pub fn grid(&self) -> &Layer {
        // from_layers and remove() keep exactly one grid layer
        self.layers
            .iter()
            .find(|l| l.kind == LayerKind::Grid)
            .unwrap_or(&self.layers[0])
    }

    pub fn first_of_kind(&self, kind: LayerKind) -> Option<&Layer> {
        self.layers.iter().find(|l| l.kind == kind)
    }

    /// Add a layer on top. Grid layers cannot be added.
    pub fn add(&mut self, name: impl Into<String>, kind: LayerKind) -> Option<LayerId> {
        if kind == LayerKind::Grid {
            return None;
        }
        let id = LayerId::generate();
        let order = self.layers.len() as u32;
        self.layers.push(Layer::new(id.clone(), name, kind, order));
        Some(id)
    }

    /// Remove a layer. The grid layer is never removed.
    pub fn remove(&mut self, id: &LayerId) -> Option<Layer> {
        let idx = self.layers.iter().position(|l| &l.id == id)?;
        if self.layers[idx].kind == LayerKind::Grid {
            return None;
        }
        let removed = self.layers.remove(idx);
        self.renumber();
        Some(removed)
    }

    pub fn rename(&mut self, id: &LayerId, name: impl Into<String>) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.name = name.into();
                true
            }
            None => false,
        }
    }

    pub fn set_visible(&mut self, id: &LayerId, visible: bool) -> bool {
        match self.get_mut(id) {
            Some(layer) => {
                layer.visible = visible;
                true
            }
            None => false,
        }
    }

    /// Move one step toward the top (higher order). Returns false at the edge.
    pub fn raise(&mut self, id: &LayerId) -> bool {
        let Some(idx) = self.layers.iter().position(|l| &l.id == id) else {
            return false;
        };
        if idx + 1 >= self.layers.len() {
            return false;
        }
        self.layers.swap(idx, idx + 1);
        self.renumber();
        true
    }

    /// Move one step toward the bottom (lower order). Returns false at the edge.
    pub fn lower(&mut self, id: &LayerId) -> bool {
        let Some(idx) = self.layers.iter().position(|l| &l.id == id) else {
            return false;
        };
        if idx == 0 {
            return false;
        }
        self.layers.swap(idx, idx - 1);
        self.renumber();
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_stack() {
        let stack = LayerStack::default();
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.grid().id.as_str(), GRID_LAYER_ID);
        assert_eq!(stack.first_of_kind(LayerKind::Tiles).unwrap().id.as_str(), TILES_LAYER_ID);
    }

    #[test]
    fn test_from_empty_synthesizes_defaults() {
        let stack = LayerStack::from_layers(vec![]);
        assert_eq!(stack.len(), 2);
        assert_eq!(stack.grid().kind, LayerKind::Grid);
        assert!(stack.first_of_kind(LayerKind::Tiles).is_some());
    }

    #[test]
    fn test_from_layers_demotes_extra_grid() {
        let stack = LayerStack::from_layers(vec![
            Layer::new("a".into(), "A", LayerKind::Grid, 0),
            Layer::new("b".into(), "B", LayerKind::Grid, 1),
        ]);
        let grids = stack.iter().filter(|l| l.kind == LayerKind::Grid).count();
        assert_eq!(grids, 1);
        assert_eq!(stack.grid().id.as_str(), "a");
        assert_eq!(stack.get(&"b".into()).unwrap().kind, LayerKind::Tiles);
    }

    #[test]
    fn test_from_layers_adds_grid_without_id_clash() {
        let stack = LayerStack::from_layers(vec![Layer::new("grid".into(), "Oops", LayerKind::Image, 3)]);
        assert_eq!(stack.len(), 3);
        assert_ne!(stack.grid().id.as_str(), "grid");
        let orders: Vec<u32> = stack.iter().map(|l| l.order).collect();
        assert_eq!(orders, vec![0, 1, 2]);
    }

    #[test]
    fn test_grid_layer_cannot_be_removed_or_added() {
        let mut stack = LayerStack::default();
        assert!(stack.remove(&GRID_LAYER_ID.into()).is_none());
        assert!(stack.add("Second grid", LayerKind::Grid).is_none());
        assert_eq!(stack.len(), 2);
    }

    #[test]
    fn test_add_remove_layer() {
        let mut stack = LayerStack::default();
        let id = stack.add("Decor", LayerKind::Image).unwrap();
        assert_eq!(stack.get(&id).unwrap().order, 2);
        assert!(stack.remove(&id).is_some());
        assert!(stack.get(&id).is_none());
    }

    #[test]
    fn test_raise_lower() {
        let mut stack = LayerStack::default();
        let tiles: LayerId = TILES_LAYER_ID.into();
        assert!(!stack.raise(&tiles));
        assert!(stack.lower(&tiles));
        assert_eq!(stack.get(&tiles).unwrap().order, 0);
        assert!(!stack.lower(&tiles));
    }

    #[test]
    fn test_rename_and_visibility() {
        let mut stack = LayerStack::default();
        let tiles: LayerId = TILES_LAYER_ID.into();
        assert!(stack.rename(&tiles, "Terrain"));
        assert!(stack.set_visible(&tiles, false));
        let layer = stack.get(&tiles).unwrap();
        assert_eq!(layer.name, "Terrain");
        assert!(!layer.visible);
        assert!(!stack.rename(&"missing".into(), "x"));
    }

    #[test]
    fn test_kind_parse() {
        assert_eq!(LayerKind::parse("Tiles"), Some(LayerKind::Tiles));
        assert_eq!(LayerKind::parse("widgets"), Some(LayerKind::Tiles));
        assert_eq!(LayerKind::parse("nope"), None);
        assert!(!LayerKind::Grid.holds_tiles());
    }
}
