use std::collections::HashMap;

use glam::DVec2;

use super::coord::CellCoord;
use super::layout::GridLayout;

/// A world-space line segment on a cell polygon.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Edge {
    pub a: DVec2,
    pub b: DVec2,
}

/// Quantize a point so that corners shared by adjacent cells hash equal
/// despite floating-point drift.
fn point_key(p: DVec2) -> (i64, i64) {
    ((p.x * 1e3).round() as i64, (p.y * 1e3).round() as i64)
}

/// Direction-independent edge key.
fn edge_key(a: DVec2, b: DVec2) -> ((i64, i64), (i64, i64)) {
    let (ka, kb) = (point_key(a), point_key(b));
    if ka <= kb {
        (ka, kb)
    } else {
        (kb, ka)
    }
}

/// Outline of a cell set: every polygon edge that belongs to exactly one
/// cell. Edges shared by two cells are interior and dropped.
///
/// Output order follows the input cell order, so a sorted input yields a
/// stable outline.
pub fn boundary_edges<'a>(
    layout: &GridLayout,
    cells: impl IntoIterator<Item = &'a CellCoord>,
) -> Vec<Edge> {
    let mut counts: HashMap<((i64, i64), (i64, i64)), usize> = HashMap::new();
    let mut edges: Vec<(((i64, i64), (i64, i64)), Edge)> = Vec::new();

    for &cell in cells {
        let corners = layout.cell_corners(cell);
        let n = corners.len();
        for i in 0..n {
            let (a, b) = (corners[i], corners[(i + 1) % n]);
            let key = edge_key(a, b);
            let count = counts.entry(key).or_insert(0);
            if *count == 0 {
                edges.push((key, Edge { a, b }));
            }
            *count += 1;
        }
    }

    edges
        .into_iter()
        .filter(|(key, _)| counts.get(key) == Some(&1))
        .map(|(_, edge)| edge)
        .collect()
}
