use serde::{Deserialize, Serialize};
use std::fmt;
use std::ops::{Add, Mul, Neg, Sub};
use std::str::FromStr;

/// Upper bound on up-front allocation for cell enumeration.
const CAPACITY_HINT_LIMIT: usize = 1 << 20;

/// Hex cell in cube coordinates. Always satisfies `q + r + s == 0`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Cube {
    pub q: i32,
    pub r: i32,
    pub s: i32,
}

impl Cube {
    pub const ORIGIN: Self = Self { q: 0, r: 0, s: 0 };

    /// Unit offsets to the six neighbours, clockwise starting east.
    pub const DIRECTIONS: [Cube; 6] = [
        Cube { q: 1, r: 0, s: -1 },
        Cube { q: 0, r: 1, s: -1 },
        Cube { q: -1, r: 1, s: 0 },
        Cube { q: -1, r: 0, s: 1 },
        Cube { q: 0, r: -1, s: 1 },
        Cube { q: 1, r: -1, s: 0 },
    ];

    /// Axial constructor; `s` is derived.
    pub const fn new(q: i32, r: i32) -> Self {
        Self { q, r, s: -q - r }
    }

    /// Full triple. Returns `None` if the zero-sum constraint does not hold.
    pub fn from_qrs(q: i32, r: i32, s: i32) -> Option<Self> {
        (q + r + s == 0).then_some(Self { q, r, s })
    }

    pub fn neighbors(self) -> [Cube; 6] {
        Self::DIRECTIONS.map(|d| self + d)
    }

    pub fn distance(self, other: Cube) -> u32 {
        let d = self - other;
        ((d.q.abs() + d.r.abs() + d.s.abs()) / 2) as u32
    }

    /// Every cell within `radius` steps of `self`, `self` included.
    pub fn range(self, radius: u32) -> Vec<Cube> {
        // Keeps the `±n` loop bounds within i32
        let n = i32::try_from(radius).unwrap_or(i32::MAX).min(i32::MAX / 2);
        let count = (n as usize)
            .saturating_mul(n as usize + 1)
            .saturating_mul(3)
            .saturating_add(1);
        let mut cells = Vec::with_capacity(count.min(CAPACITY_HINT_LIMIT));
        for q in -n..=n {
            let r_min = (-n).max(-q - n);
            let r_max = n.min(-q + n);
            for r in r_min..=r_max {
                cells.push(self + Cube::new(q, r));
            }
        }
        cells
    }

    /// Cells exactly `radius` steps away.
    pub fn ring(self, radius: u32) -> Vec<Cube> {
        if radius == 0 {
            return vec![self];
        }
        let mut cells = Vec::with_capacity(6 * radius as usize);
        let mut cur = self + Self::DIRECTIONS[4] * radius as i32;
        for dir in Self::DIRECTIONS {
            for _ in 0..radius {
                cells.push(cur);
                cur = cur + dir;
            }
        }
        cells
    }

    /// Round a fractional cube position to the nearest valid cell.
    ///
    /// Each component is rounded independently, then the one with the
    /// largest rounding delta is recomputed from the other two so the
    /// zero-sum constraint holds exactly.
    pub fn round(q: f64, r: f64, s: f64) -> Self {
        let mut rq = q.round();
        let mut rr = r.round();
        let mut rs = s.round();

        let dq = (rq - q).abs();
        let dr = (rr - r).abs();
        let ds = (rs - s).abs();

        if dq > dr && dq > ds {
            rq = -rr - rs;
        } else if dr > ds {
            rr = -rq - rs;
        } else {
            rs = -rq - rr;
        }

        Self {
            q: rq as i32,
            r: rr as i32,
            s: rs as i32,
        }
    }
}

impl Add for Cube {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            q: self.q + rhs.q,
            r: self.r + rhs.r,
            s: self.s + rhs.s,
        }
    }
}

impl Sub for Cube {
    type Output = Self;

    fn sub(self, rhs: Self) -> Self {
        Self {
            q: self.q - rhs.q,
            r: self.r - rhs.r,
            s: self.s - rhs.s,
        }
    }
}

impl Mul<i32> for Cube {
    type Output = Self;

    fn mul(self, rhs: i32) -> Self {
        Self {
            q: self.q * rhs,
            r: self.r * rhs,
            s: self.s * rhs,
        }
    }
}

impl Neg for Cube {
    type Output = Self;

    fn neg(self) -> Self {
        Self {
            q: -self.q,
            r: -self.r,
            s: -self.s,
        }
    }
}

/// Square cell, column `x` and row `y`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Square {
    pub x: i32,
    pub y: i32,
}

impl Square {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn neighbors(self) -> [Square; 4] {
        [
            Square::new(self.x, self.y - 1),
            Square::new(self.x + 1, self.y),
            Square::new(self.x, self.y + 1),
            Square::new(self.x - 1, self.y),
        ]
    }

    /// `columns × rows` cells starting at (0, 0), row-major.
    pub fn rect(columns: u32, rows: u32) -> Vec<Square> {
        let count = (columns as usize).saturating_mul(rows as usize);
        let mut cells = Vec::with_capacity(count.min(CAPACITY_HINT_LIMIT));
        let columns = i32::try_from(columns).unwrap_or(i32::MAX);
        let rows = i32::try_from(rows).unwrap_or(i32::MAX);
        for y in 0..rows {
            for x in 0..columns {
                cells.push(Square::new(x, y));
            }
        }
        cells
    }
}

/// A grid cell of either kind. Maps are homogeneous: a hex map only ever
/// holds `Hex` cells and a square map only `Square` cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum CellCoord {
    Hex(Cube),
    Square(Square),
}

impl CellCoord {
    pub fn as_hex(self) -> Option<Cube> {
        match self {
            Self::Hex(c) => Some(c),
            Self::Square(_) => None,
        }
    }

    pub fn as_square(self) -> Option<Square> {
        match self {
            Self::Square(c) => Some(c),
            Self::Hex(_) => None,
        }
    }

    pub fn is_hex(self) -> bool {
        matches!(self, Self::Hex(_))
    }

    pub fn neighbors(self) -> Vec<CellCoord> {
        match self {
            Self::Hex(c) => c.neighbors().into_iter().map(Self::Hex).collect(),
            Self::Square(c) => c.neighbors().into_iter().map(Self::Square).collect(),
        }
    }

    /// String key used for set membership in stored documents.
    pub fn key(self) -> String {
        self.to_string()
    }
}

impl From<Cube> for CellCoord {
    fn from(value: Cube) -> Self {
        Self::Hex(value)
    }
}

impl From<Square> for CellCoord {
    fn from(value: Square) -> Self {
        Self::Square(value)
    }
}

impl fmt::Display for CellCoord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Hex(c) => write!(f, "{},{},{}", c.q, c.r, c.s),
            Self::Square(c) => write!(f, "{},{}", c.x, c.y),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid cell key: {0:?}")]
pub struct ParseCoordError(pub String);

impl FromStr for CellCoord {
    type Err = ParseCoordError;

    /// Three components parse as a hex cube (the `s` must be consistent),
    /// two as a square cell.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let parts: Result<Vec<i32>, _> = s.split(',').map(|p| p.trim().parse::<i32>()).collect();
        let parts = parts.map_err(|_| ParseCoordError(s.to_string()))?;
        match parts.as_slice() {
            [q, r, s_] => Cube::from_qrs(*q, *r, *s_)
                .map(Self::Hex)
                .ok_or_else(|| ParseCoordError(s.to_string())),
            [x, y] => Ok(Self::Square(Square::new(*x, *y))),
            _ => Err(ParseCoordError(s.to_string())),
        }
    }
}
