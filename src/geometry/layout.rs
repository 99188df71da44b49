use glam::DVec2;
use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use super::coord::{CellCoord, Cube, Square};
use super::Rect;

const SQRT_3: f64 = 1.732_050_807_568_877_2;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GridType {
    Square,
    #[default]
    Hex,
}

impl GridType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Square => "square",
            Self::Hex => "hex",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HexOrientation {
    #[default]
    Pointy,
    Flat,
}

impl HexOrientation {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pointy => "pointy",
            Self::Flat => "flat",
        }
    }

    /// Angle of corner 0, in degrees.
    fn start_angle(self) -> f64 {
        match self {
            Self::Pointy => -30.0,
            Self::Flat => 0.0,
        }
    }
}

/// Cell corner polygon: six points for hex, four for square.
pub type Corners = SmallVec<[DVec2; 6]>;

/// World-space layout of a grid. For hex grids `size` is the centre-to-corner
/// distance; for square grids it is the edge length.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct GridLayout {
    pub grid_type: GridType,
    pub orientation: HexOrientation,
    pub size: f64,
    pub origin: DVec2,
}

impl GridLayout {
    pub fn hex(size: f64, orientation: HexOrientation) -> Self {
        Self {
            grid_type: GridType::Hex,
            orientation,
            size,
            origin: DVec2::ZERO,
        }
    }

    pub fn square(size: f64) -> Self {
        Self {
            grid_type: GridType::Square,
            orientation: HexOrientation::default(),
            size,
            origin: DVec2::ZERO,
        }
    }

    pub fn with_origin(mut self, origin: DVec2) -> Self {
        self.origin = origin;
        self
    }

    /// Centre of the cell in world space.
    pub fn cell_to_point(&self, cell: CellCoord) -> DVec2 {
        match cell {
            CellCoord::Hex(c) => self.hex_to_point(c),
            CellCoord::Square(c) => self.square_to_point(c),
        }
    }

    /// The cell containing a world point.
    pub fn point_to_cell(&self, point: DVec2) -> CellCoord {
        match self.grid_type {
            GridType::Hex => CellCoord::Hex(self.point_to_hex(point)),
            GridType::Square => CellCoord::Square(self.point_to_square(point)),
        }
    }

    pub fn cell_corners(&self, cell: CellCoord) -> Corners {
        match cell {
            CellCoord::Hex(c) => {
                let center = self.hex_to_point(c);
                let start = self.orientation.start_angle();
                (0..6)
                    .map(|i| {
                        let angle = (start + 60.0 * i as f64).to_radians();
                        center + DVec2::new(angle.cos(), angle.sin()) * self.size
                    })
                    .collect()
            }
            CellCoord::Square(c) => {
                let min = self.origin + DVec2::new(c.x as f64, c.y as f64) * self.size;
                let s = self.size;
                SmallVec::from_slice(&[
                    min,
                    min + DVec2::new(s, 0.0),
                    min + DVec2::new(s, s),
                    min + DVec2::new(0.0, s),
                ])
            }
        }
    }

    pub fn hex_to_point(&self, c: Cube) -> DVec2 {
        let (q, r) = (c.q as f64, c.r as f64);
        let local = match self.orientation {
            HexOrientation::Pointy => DVec2::new(SQRT_3 * q + SQRT_3 / 2.0 * r, 1.5 * r),
            HexOrientation::Flat => DVec2::new(1.5 * q, SQRT_3 / 2.0 * q + SQRT_3 * r),
        };
        self.origin + local * self.size
    }

    pub fn point_to_hex(&self, point: DVec2) -> Cube {
        let p = (point - self.origin) / self.size;
        let (q, r) = match self.orientation {
            HexOrientation::Pointy => (SQRT_3 / 3.0 * p.x - p.y / 3.0, 2.0 / 3.0 * p.y),
            HexOrientation::Flat => (2.0 / 3.0 * p.x, -p.x / 3.0 + SQRT_3 / 3.0 * p.y),
        };
        Cube::round(q, r, -q - r)
    }

    fn square_to_point(&self, c: Square) -> DVec2 {
        self.origin + (DVec2::new(c.x as f64, c.y as f64) + DVec2::splat(0.5)) * self.size
    }

    fn point_to_square(&self, point: DVec2) -> Square {
        let p = (point - self.origin) / self.size;
        Square::new(p.x.floor() as i32, p.y.floor() as i32)
    }

    /// World-space bounding box of the given cells' polygons, or `None` if empty.
    pub fn bounds<'a>(&self, cells: impl IntoIterator<Item = &'a CellCoord>) -> Option<Rect> {
        let mut rect: Option<Rect> = None;
        for &cell in cells {
            for corner in self.cell_corners(cell) {
                rect = Some(match rect {
                    Some(r) => r.including(corner),
                    None => Rect::new(corner, corner),
                });
            }
        }
        rect
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn close(a: DVec2, b: DVec2) -> bool {
        (a - b).length() < 1e-9
    }

    #[test]
    fn test_origin_hex_at_layout_origin() {
        let layout = GridLayout::hex(40.0, HexOrientation::Pointy).with_origin(DVec2::new(10.0, 20.0));
        assert!(close(layout.cell_to_point(Cube::ORIGIN.into()), DVec2::new(10.0, 20.0)));
    }

    #[test]
    fn test_pointy_neighbor_spacing() {
        let layout = GridLayout::hex(10.0, HexOrientation::Pointy);
        let east = layout.hex_to_point(Cube::new(1, 0));
        assert!(close(east, DVec2::new(SQRT_3 * 10.0, 0.0)));
    }

    #[test]
    fn test_flat_neighbor_spacing() {
        let layout = GridLayout::hex(10.0, HexOrientation::Flat);
        let p = layout.hex_to_point(Cube::new(1, 0));
        assert!(close(p, DVec2::new(15.0, SQRT_3 / 2.0 * 10.0)));
    }

    #[test]
    fn test_corners_at_size_from_center() {
        for orientation in [HexOrientation::Pointy, HexOrientation::Flat] {
            let layout = GridLayout::hex(25.0, orientation);
            let cell = CellCoord::Hex(Cube::new(2, -1));
            let center = layout.cell_to_point(cell);
            let corners = layout.cell_corners(cell);
            assert_eq!(corners.len(), 6);
            for c in &corners {
                assert!(((*c - center).length() - 25.0).abs() < 1e-9);
            }
        }
    }

    #[test]
    fn test_pointy_has_vertex_at_top() {
        let layout = GridLayout::hex(10.0, HexOrientation::Pointy);
        let corners = layout.cell_corners(Cube::ORIGIN.into());
        assert!(corners.iter().any(|c| close(*c, DVec2::new(0.0, -10.0))));
    }

    #[test]
    fn test_square_point_to_cell_floors() {
        let layout = GridLayout::square(32.0);
        assert_eq!(layout.point_to_cell(DVec2::new(0.0, 0.0)), Square::new(0, 0).into());
        assert_eq!(layout.point_to_cell(DVec2::new(31.9, 63.9)), Square::new(0, 1).into());
        assert_eq!(layout.point_to_cell(DVec2::new(-0.1, 32.0)), Square::new(-1, 1).into());
    }

    #[test]
    fn test_square_corners() {
        let layout = GridLayout::square(10.0);
        let corners = layout.cell_corners(Square::new(1, 2).into());
        assert_eq!(corners.len(), 4);
        assert!(close(corners[0], DVec2::new(10.0, 20.0)));
        assert!(close(corners[2], DVec2::new(20.0, 30.0)));
    }

    #[test]
    fn test_point_near_corner_resolves_to_adjacent_cell() {
        let layout = GridLayout::hex(10.0, HexOrientation::Pointy);
        let center = layout.hex_to_point(Cube::new(1, 0));
        // Slightly inside the east neighbour, not the origin
        let p = center - DVec2::new(SQRT_3 * 10.0 / 2.0 - 0.5, 0.0);
        assert_eq!(layout.point_to_hex(p), Cube::new(1, 0));
    }

    #[test]
    fn test_bounds() {
        let layout = GridLayout::square(10.0);
        let cells = [CellCoord::Square(Square::new(0, 0)), CellCoord::Square(Square::new(2, 1))];
        let rect = layout.bounds(cells.iter()).unwrap();
        assert!(close(rect.min, DVec2::ZERO));
        assert!(close(rect.max, DVec2::new(30.0, 20.0)));
        assert!(layout.bounds(std::iter::empty()).is_none());
    }

    proptest! {
        #[test]
        fn prop_hex_round_trip(q in -200i32..200, r in -200i32..200, size in 1.0f64..200.0, flat in any::<bool>()) {
            let orientation = if flat { HexOrientation::Flat } else { HexOrientation::Pointy };
            let layout = GridLayout::hex(size, orientation).with_origin(DVec2::new(13.5, -7.25));
            let cell = CellCoord::Hex(Cube::new(q, r));
            prop_assert_eq!(layout.point_to_cell(layout.cell_to_point(cell)), cell);
        }

        #[test]
        fn prop_square_round_trip(x in -500i32..500, y in -500i32..500, size in 1.0f64..200.0) {
            let layout = GridLayout::square(size);
            let cell = CellCoord::Square(Square::new(x, y));
            prop_assert_eq!(layout.point_to_cell(layout.cell_to_point(cell)), cell);
        }

        #[test]
        fn prop_corner_jitter_stays_in_cell(q in -50i32..50, r in -50i32..50, i in 0usize..6) {
            let layout = GridLayout::hex(20.0, HexOrientation::Pointy);
            let cell = CellCoord::Hex(Cube::new(q, r));
            let center = layout.cell_to_point(cell);
            let corner = layout.cell_corners(cell)[i];
            // 80% of the way to a corner is still well inside the hexagon
            let p = center + (corner - center) * 0.8;
            prop_assert_eq!(layout.point_to_cell(p), cell);
        }
    }
}
