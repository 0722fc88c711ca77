//! Grid coordinates and fixed-point helpers.
//!
//! Positions in the match are whole tiles. Path cost is fractional (diagonal
//! steps cost √2) and uses fixed-point arithmetic so that the same inputs
//! produce the same results from run to run.

use std::cmp::Ordering;

use fixed::types::I32F32;
use serde::{Deserialize, Serialize};

/// Fixed-point number type for fractional simulation math.
///
/// Uses 32 bits for integer part and 32 bits for fractional part.
pub type Fixed = I32F32;

/// √2 as a fixed-point constant (diagonal step cost).
pub const SQRT_2: Fixed = Fixed::from_bits(6_074_001_000);

/// Serde support for fixed-point numbers.
///
/// Serializes fixed-point numbers as their raw bit representation (i64)
/// to preserve exact precision across serialization boundaries.
pub mod fixed_serde {
    use super::Fixed;
    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    /// Serialize a fixed-point number as its raw bit representation.
    pub fn serialize<S>(value: &Fixed, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        value.to_bits().serialize(serializer)
    }

    /// Deserialize a fixed-point number from its raw bit representation.
    pub fn deserialize<'de, D>(deserializer: D) -> Result<Fixed, D::Error>
    where
        D: Deserializer<'de>,
    {
        let bits = i64::deserialize(deserializer)?;
        Ok(Fixed::from_bits(bits))
    }
}

/// Integer tile coordinate.
///
/// Ordered row-major (`y` first, then `x`) so ordered collections keyed by
/// `Coord` iterate the same way the tile grid is stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Coord {
    /// Column.
    pub x: i32,
    /// Row.
    pub y: i32,
}

impl Coord {
    /// Create a new coordinate.
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Offset this coordinate.
    #[must_use]
    pub const fn offset(self, dx: i32, dy: i32) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    /// Chebyshev (chessboard) distance.
    #[must_use]
    pub fn chebyshev(self, other: Self) -> u32 {
        self.x.abs_diff(other.x).max(self.y.abs_diff(other.y))
    }

    /// Manhattan distance.
    #[must_use]
    pub fn manhattan(self, other: Self) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }

    /// Squared Euclidean distance.
    #[must_use]
    pub fn distance_squared(self, other: Self) -> i64 {
        let dx = i64::from(self.x - other.x);
        let dy = i64::from(self.y - other.y);
        dx * dx + dy * dy
    }
}

impl Ord for Coord {
    fn cmp(&self, other: &Self) -> Ordering {
        self.y.cmp(&other.y).then(self.x.cmp(&other.x))
    }
}

impl PartialOrd for Coord {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl std::fmt::Display for Coord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.x, self.y)
    }
}

/// Axis-aligned rectangle of tiles, used for building footprints.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left tile.
    pub origin: Coord,
    /// Width in tiles.
    pub width: u32,
    /// Height in tiles.
    pub height: u32,
}

impl Rect {
    /// Create a new rectangle.
    #[must_use]
    pub const fn new(origin: Coord, width: u32, height: u32) -> Self {
        Self {
            origin,
            width,
            height,
        }
    }

    /// Whether the tile lies inside this rectangle.
    #[must_use]
    pub fn contains(&self, c: Coord) -> bool {
        c.x >= self.origin.x
            && c.y >= self.origin.y
            && c.x < self.origin.x + self.width as i32
            && c.y < self.origin.y + self.height as i32
    }

    /// Whether two rectangles share at least one tile.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        self.origin.x < other.origin.x + other.width as i32
            && other.origin.x < self.origin.x + self.width as i32
            && self.origin.y < other.origin.y + other.height as i32
            && other.origin.y < self.origin.y + self.height as i32
    }

    /// The tile inside the rectangle closest to `c`.
    #[must_use]
    pub fn clamp(&self, c: Coord) -> Coord {
        Coord::new(
            c.x.clamp(self.origin.x, self.origin.x + self.width as i32 - 1),
            c.y.clamp(self.origin.y, self.origin.y + self.height as i32 - 1),
        )
    }

    /// Chebyshev distance from `c` to the nearest tile of the rectangle.
    #[must_use]
    pub fn chebyshev_to(&self, c: Coord) -> u32 {
        c.chebyshev(self.clamp(c))
    }

    /// Center tile (rounded toward the origin).
    #[must_use]
    pub fn center(&self) -> Coord {
        self.origin
            .offset((self.width as i32 - 1) / 2, (self.height as i32 - 1) / 2)
    }

    /// Iterate over every tile of the rectangle in row-major order.
    pub fn tiles(&self) -> impl Iterator<Item = Coord> + '_ {
        (0..self.height as i32).flat_map(move |dy| {
            (0..self.width as i32).map(move |dx| self.origin.offset(dx, dy))
        })
    }
}
