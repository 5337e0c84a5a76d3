// Core value types shared by the terrain index, the occupancy overlay and
// the per-agent locators.
//
// Defines the caller-facing world position (`WorldPos`), the fixed lateral
// direction enumeration (`Direction`) with its single offset table, the
// layer-to-layer classification (`LayerRelation`), and the 16-bit packed
// word (`NeighborWord`) that stores one relation per direction.
//
// See also: `geometry.rs` which builds one `NeighborWord` per (cell, layer),
// `locator.rs` which maps a one-cell step back to a `Direction`.

use serde::{Deserialize, Serialize};
use std::fmt;

// ---------------------------------------------------------------------------
// World position
// ---------------------------------------------------------------------------

/// A world-space position owned by the caller.
///
/// `x` and `y` are lateral and divided by `grid_size` to find the grid cell;
/// `z` is vertical and compared against layer ceilings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct WorldPos {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl WorldPos {
    pub const fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }

    /// `self + velocity * dt`, the per-tick integration step.
    pub fn advanced(self, velocity: [f32; 3], dt: f32) -> Self {
        Self {
            x: self.x + velocity[0] * dt,
            y: self.y + velocity[1] * dt,
            z: self.z + velocity[2] * dt,
        }
    }

    /// True when every coordinate is finite (no NaN or infinity).
    pub fn is_finite(self) -> bool {
        self.x.is_finite() && self.y.is_finite() && self.z.is_finite()
    }

    /// Same lateral position, different height.
    pub fn with_z(self, z: f32) -> Self {
        Self { z, ..self }
    }
}

impl fmt::Display for WorldPos {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.2}, {:.2}, {:.2})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Lateral directions
// ---------------------------------------------------------------------------

/// One of the 8 lateral neighbors of a grid cell.
///
/// The discriminant is the direction's slot in a `NeighborWord` (bit offset
/// `2 * index`). Order runs counter-clockwise starting at +x.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[repr(u8)]
pub enum Direction {
    /// (+1, 0)
    East = 0,
    /// (+1, +1)
    NorthEast = 1,
    /// (0, +1)
    North = 2,
    /// (-1, +1)
    NorthWest = 3,
    /// (-1, 0)
    West = 4,
    /// (-1, -1)
    SouthWest = 5,
    /// (0, -1)
    South = 6,
    /// (+1, -1)
    SouthEast = 7,
}

impl Direction {
    /// All directions in enumeration (bit-slot) order.
    pub const ALL: [Direction; 8] = [
        Direction::East,
        Direction::NorthEast,
        Direction::North,
        Direction::NorthWest,
        Direction::West,
        Direction::SouthWest,
        Direction::South,
        Direction::SouthEast,
    ];

    /// Grid offset `(dx, dy)` of the neighbor in this direction.
    ///
    /// This is the only direction-to-offset table in the crate; graph
    /// construction, movement and neighbor iteration all go through it.
    pub const fn offset(self) -> (i32, i32) {
        match self {
            Direction::East => (1, 0),
            Direction::NorthEast => (1, 1),
            Direction::North => (0, 1),
            Direction::NorthWest => (-1, 1),
            Direction::West => (-1, 0),
            Direction::SouthWest => (-1, -1),
            Direction::South => (0, -1),
            Direction::SouthEast => (1, -1),
        }
    }

    /// Inverse of `offset`. `None` for `(0, 0)` and for anything outside the
    /// Moore neighborhood.
    pub fn from_offset(dx: i64, dy: i64) -> Option<Direction> {
        Direction::ALL.into_iter().find(|dir| {
            let (ox, oy) = dir.offset();
            i64::from(ox) == dx && i64::from(oy) == dy
        })
    }

    const fn shift(self) -> u16 {
        (self as u16) * 2
    }
}

// ---------------------------------------------------------------------------
// Layer relations
// ---------------------------------------------------------------------------

/// How a layer in one cell lines up with the layer an agent would land on in
/// a laterally adjacent cell. Stored in 2 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum LayerRelation {
    /// Neighbor's matching layer has the same index.
    Same = 0,
    /// Neighbor's matching layer is one index higher.
    Above = 1,
    /// Neighbor's matching layer is one index lower.
    Below = 2,
    /// No usable relation: grid edge, empty neighbor, or a jump of more
    /// than one layer index. The incremental path cannot resolve it.
    Unknown = 3,
}

impl LayerRelation {
    const fn from_bits(bits: u16) -> LayerRelation {
        match bits & 0b11 {
            0 => LayerRelation::Same,
            1 => LayerRelation::Above,
            2 => LayerRelation::Below,
            _ => LayerRelation::Unknown,
        }
    }

    /// Classify the layer `to` reached from layer `from`.
    pub fn classify(from: u8, to: u8) -> LayerRelation {
        if to == from {
            LayerRelation::Same
        } else if Some(to) == from.checked_add(1) {
            LayerRelation::Above
        } else if Some(to) == from.checked_sub(1) {
            LayerRelation::Below
        } else {
            LayerRelation::Unknown
        }
    }

    /// The layer index this relation leads to from `layer`.
    ///
    /// Returns `None` for `Unknown` (and for the impossible `Below` from
    /// layer 0 / `Above` from layer 255); callers must filter `Unknown`
    /// before resolving.
    pub fn apply(self, layer: u8) -> Option<u8> {
        match self {
            LayerRelation::Same => Some(layer),
            LayerRelation::Above => layer.checked_add(1),
            LayerRelation::Below => layer.checked_sub(1),
            LayerRelation::Unknown => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Packed neighbor word
// ---------------------------------------------------------------------------

/// Eight 2-bit `LayerRelation`s packed into one `u16`, one per `Direction`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NeighborWord(u16);

impl NeighborWord {
    pub const fn get(self, dir: Direction) -> LayerRelation {
        LayerRelation::from_bits(self.0 >> dir.shift())
    }

    /// Copy of this word with the slot for `dir` replaced by `relation`.
    pub const fn with(self, dir: Direction, relation: LayerRelation) -> Self {
        let cleared = self.0 & !(0b11 << dir.shift());
        Self(cleared | ((relation as u16) << dir.shift()))
    }
}

impl fmt::Debug for NeighborWord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut list = f.debug_map();
        for dir in Direction::ALL {
            list.entry(&dir, &self.get(dir));
        }
        list.finish()
    }
}
