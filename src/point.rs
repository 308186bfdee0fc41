use serde::{Deserialize, Serialize};
use std::{cmp::Ordering, fmt};

/// A point in 3D space, serving as a key for the octree.
///
/// Points are ordered lexicographically by `(x, y, z)`. This is the order
/// used when points are stored in an order statistics tree.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Point {
    pub x: i64,
    pub y: i64,
    pub z: i64,
}

impl fmt::Debug for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("")
            .field(&self.x)
            .field(&self.y)
            .field(&self.z)
            .finish()
    }
}

impl fmt::Display for Point {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

impl PartialOrd for Point {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Point {
    fn cmp(&self, other: &Self) -> Ordering {
        self.x
            .cmp(&other.x)
            .then(self.y.cmp(&other.y))
            .then(self.z.cmp(&other.z))
    }
}

impl From<(i64, i64, i64)> for Point {
    fn from((x, y, z): (i64, i64, i64)) -> Self {
        Point::new(x, y, z)
    }
}

impl From<Point> for (i64, i64, i64) {
    fn from(p: Point) -> Self {
        (p.x, p.y, p.z)
    }
}

impl Point {
    pub const fn new(x: i64, y: i64, z: i64) -> Self {
        Point { x, y, z }
    }

    /// The octant of `other` relative to this point.
    pub fn octant_of(&self, other: &Point) -> Octant {
        Octant::of(self, other)
    }
}

/// One of the eight child slots of an octree node.
///
/// The bits are `(x_greater, y_greater, z_greater)` from most to least
/// significant, where a bit is set iff the *node's* coordinate is strictly
/// greater than the candidate's on that axis. Ties always clear the bit.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Octant(u8);

impl fmt::Debug for Octant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Octant({:03b})", self.0)
    }
}

impl Octant {
    /// Number of child slots per node.
    pub const COUNT: usize = 8;

    /// All octants in slot order, `000` to `111`.
    pub const ALL: [Octant; Self::COUNT] = [
        Octant(0),
        Octant(1),
        Octant(2),
        Octant(3),
        Octant(4),
        Octant(5),
        Octant(6),
        Octant(7),
    ];

    pub const fn new(x_greater: bool, y_greater: bool, z_greater: bool) -> Self {
        Octant(((x_greater as u8) << 2) | ((y_greater as u8) << 1) | (z_greater as u8))
    }

    /// Octant that `candidate` falls into relative to a node keyed by `node`.
    pub fn of(node: &Point, candidate: &Point) -> Self {
        Self::new(
            node.x > candidate.x,
            node.y > candidate.y,
            node.z > candidate.z,
        )
    }

    /// Slot index in `0..8`.
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    pub const fn x_greater(self) -> bool {
        self.0 & 0b100 != 0
    }

    pub const fn y_greater(self) -> bool {
        self.0 & 0b010 != 0
    }

    pub const fn z_greater(self) -> bool {
        self.0 & 0b001 != 0
    }
}
