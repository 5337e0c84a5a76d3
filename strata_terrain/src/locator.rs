// Per-agent movement and query cursor over a terrain.
//
// An `AgentLocator` caches the agent's grid cell, layer, column handle and
// occupancy slot so repeated queries are O(1). It has two update paths:
//
// - `teleport()`: full re-derivation from a world position. Cell from
//   `floor(x / grid_size)`, `floor(y / grid_size)`; layer from
//   `layer_at(cell, z)`. Cost O(layers in the destination cell).
// - `move_to()`: the incremental path. Only steps into the Moore
//   neighborhood (at most one cell along each axis) are accepted; the
//   target layer comes from the neighbor graph precomputed by
//   `TerrainGeometry::build_neighbor_graph`, not from a fresh scan. On
//   success the returned position is snapped to the ceiling of the new
//   layer.
//
// **Critical constraint:** a successful `move_to` always snaps `z` to the
// ceiling of the resolved layer. `layer_at` resolves a ceiling height back
// to its own layer, so callers that feed the returned position into the next
// tick stay consistent with the graph. Callers must not nudge `z` between
// ticks.
//
// A rejected `move_to` (`MoveRejected`) never mutates the locator. It is the
// routine failure of the incremental path, not an error: callers either
// `teleport` or keep the agent in place.
//
// See also: `geometry.rs` (neighbor graph, `layer_at`), `occupancy.rs`
// (`OccupancyLayout`, which every locator shares).

use crate::config::TerrainScale;
use crate::error::{Result, TerrainError};
use crate::geometry::{Column, TerrainGeometry};
use crate::occupancy::{MaskSlot, OccupancyLayout, TerrainOccupancy};
use crate::types::{Direction, LayerRelation, WorldPos};
use smallvec::SmallVec;
use std::sync::Arc;
use thiserror::Error;

/// Why `move_to` refused a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum MoveRejected {
    /// The target cell is more than one cell away along some axis.
    #[error("target is ({dx}, {dy}) cells away; only single-cell steps are incremental")]
    TooFar { dx: i64, dy: i64 },
    /// The neighbor graph has no usable relation in this direction (grid
    /// edge, empty cell, or a jump of more than one layer).
    #[error("no known layer relation toward {0:?}")]
    UnknownRelation(Direction),
    /// The target's lateral coordinates are NaN or infinite.
    #[error("target position is not finite")]
    NonFinite,
}

/// One lateral neighbor reported by `AgentLocator::for_each_neighbor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct NeighborCell {
    pub dir: Direction,
    pub x: u32,
    pub y: u32,
    /// `layer_at(neighbor, current height)`.
    pub layer: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Cursor {
    grid_x: u32,
    grid_y: u32,
    layer: u8,
    column: Column,
    slot: MaskSlot,
}

#[derive(Clone, Debug)]
pub struct AgentLocator {
    layout: Arc<OccupancyLayout>,
    cursor: Cursor,
    position: WorldPos,
    radius: u8,
}

impl AgentLocator {
    /// Bind a locator to `occupancy` and place it at `position`.
    pub fn new(occupancy: &TerrainOccupancy, position: WorldPos) -> Result<Self> {
        let layout = Arc::clone(occupancy.layout());
        let cursor = locate(&layout, position)?;
        Ok(Self {
            layout,
            cursor,
            position,
            radius: 0,
        })
    }

    /// Footprint radius used by `is_blocked`, `occupy` and `vacate`.
    pub fn with_radius(mut self, radius: u8) -> Self {
        self.radius = radius;
        self
    }

    pub fn geometry(&self) -> &TerrainGeometry {
        self.layout.geometry()
    }

    pub fn position(&self) -> WorldPos {
        self.position
    }

    pub fn grid_x(&self) -> u32 {
        self.cursor.grid_x
    }

    pub fn grid_y(&self) -> u32 {
        self.cursor.grid_y
    }

    pub fn layer(&self) -> u8 {
        self.cursor.layer
    }

    pub fn column(&self) -> Column {
        self.cursor.column
    }

    pub fn radius(&self) -> u8 {
        self.radius
    }

    /// Top of the current layer.
    pub fn ceiling(&self) -> f32 {
        self.geometry().ceiling(self.cursor.column, self.cursor.layer)
    }

    /// Bottom of the current layer.
    pub fn floor(&self) -> f32 {
        self.geometry().floor(self.cursor.column, self.cursor.layer)
    }

    // -----------------------------------------------------------------------
    // Movement
    // -----------------------------------------------------------------------

    /// Re-derive cell and layer from scratch. The position is stored as
    /// given, without snapping. On error the locator is unchanged.
    pub fn teleport(&mut self, position: WorldPos) -> Result<()> {
        self.cursor = locate(&self.layout, position)?;
        self.position = position;
        Ok(())
    }

    /// Step to `target` through the neighbor graph.
    ///
    /// Returns the committed position: `target` with `z` replaced by the
    /// ceiling of the resolved layer.
    pub fn move_to(&mut self, target: WorldPos) -> std::result::Result<WorldPos, MoveRejected> {
        let (dx, dy) = self.offset_to(target).ok_or(MoveRejected::NonFinite)?;
        if dx.unsigned_abs() > 1 || dy.unsigned_abs() > 1 {
            return Err(MoveRejected::TooFar { dx, dy });
        }
        let next = match Direction::from_offset(dx, dy) {
            None => self.cursor,
            Some(dir) => self.step(dir).ok_or(MoveRejected::UnknownRelation(dir))?,
        };
        let z = self.geometry().ceiling(next.column, next.layer);
        self.cursor = next;
        self.position = target.with_z(z);
        Ok(self.position)
    }

    /// Predict the relation a `move_to` into cell `(x, y)` would use.
    /// `Same` for the current cell, `Unknown` for anything beyond one step.
    pub fn relation_to_cell(&self, x: i64, y: i64) -> LayerRelation {
        let dx = x.saturating_sub(i64::from(self.cursor.grid_x));
        let dy = y.saturating_sub(i64::from(self.cursor.grid_y));
        if (dx, dy) == (0, 0) {
            return LayerRelation::Same;
        }
        match Direction::from_offset(dx, dy) {
            Some(dir) => self
                .geometry()
                .relation_at(self.cursor.column, self.cursor.layer, dir),
            None => LayerRelation::Unknown,
        }
    }

    /// `relation_to_cell` for the cell containing `position`. `Unknown` for
    /// a non-finite position.
    pub fn relation_to(&self, position: WorldPos) -> LayerRelation {
        match grid_cell(self.geometry().scale(), position) {
            Some((x, y)) => self.relation_to_cell(x, y),
            None => LayerRelation::Unknown,
        }
    }

    /// Cell offset from the cursor to `target`, saturating at the `i64`
    /// range. `None` for a non-finite target.
    fn offset_to(&self, target: WorldPos) -> Option<(i64, i64)> {
        let (x, y) = grid_cell(self.geometry().scale(), target)?;
        Some((
            x.saturating_sub(i64::from(self.cursor.grid_x)),
            y.saturating_sub(i64::from(self.cursor.grid_y)),
        ))
    }

    /// The cursor one step toward `dir`, or `None` when the relation there
    /// is unusable.
    fn step(&self, dir: Direction) -> Option<Cursor> {
        let geometry = self.geometry();
        let Cursor {
            grid_x,
            grid_y,
            layer,
            column,
            ..
        } = self.cursor;
        let relation = geometry.relation_at(column, layer, dir);
        let layer = TerrainGeometry::relation_to_layer(layer, relation).ok()?;
        // A known relation implies an in-bounds, populated neighbor.
        let (x, y) = geometry.neighbor_of(grid_x, grid_y, dir)?;
        Some(Cursor {
            grid_x: x,
            grid_y: y,
            layer,
            column: geometry.column(x, y).ok()?,
            slot: self.layout.slot(x, y).ok()?,
        })
    }

    // -----------------------------------------------------------------------
    // Neighborhood
    // -----------------------------------------------------------------------

    /// Call `f` for every on-grid, non-empty lateral neighbor, resolving
    /// each one's layer at the agent's current height.
    pub fn for_each_neighbor(&self, mut f: impl FnMut(NeighborCell)) {
        let geometry = self.geometry();
        for dir in Direction::ALL {
            let Some((x, y)) = geometry.neighbor_of(self.cursor.grid_x, self.cursor.grid_y, dir)
            else {
                continue;
            };
            let Ok(column) = geometry.column(x, y) else {
                continue;
            };
            if let Some(layer) = geometry.checked_layer_at(column, self.position.z) {
                f(NeighborCell { dir, x, y, layer });
            }
        }
    }

    pub fn neighbors(&self) -> SmallVec<[NeighborCell; 8]> {
        let mut out = SmallVec::new();
        self.for_each_neighbor(|n| out.push(n));
        out
    }

    // -----------------------------------------------------------------------
    // Occupancy at the cached cell/layer
    // -----------------------------------------------------------------------

    /// Is anything within this locator's radius on its current floor?
    pub fn is_blocked(&self, occupancy: &TerrainOccupancy) -> Result<bool> {
        self.check_bound(occupancy)?;
        if self.radius == 0 {
            return Ok(occupancy.is_slot_occupied(self.cursor.slot, self.cursor.layer));
        }
        occupancy.is_occupied(
            self.cursor.grid_x,
            self.cursor.grid_y,
            self.cursor.layer,
            self.radius,
        )
    }

    pub fn occupy(&self, occupancy: &mut TerrainOccupancy) -> Result<()> {
        self.check_bound(occupancy)?;
        occupancy.add_occupant(
            self.cursor.grid_x,
            self.cursor.grid_y,
            self.cursor.layer,
            self.radius,
        )
    }

    pub fn vacate(&self, occupancy: &mut TerrainOccupancy) -> Result<()> {
        self.check_bound(occupancy)?;
        occupancy.remove_occupant(
            self.cursor.grid_x,
            self.cursor.grid_y,
            self.cursor.layer,
            self.radius,
        )
    }

    fn check_bound(&self, occupancy: &TerrainOccupancy) -> Result<()> {
        if Arc::ptr_eq(occupancy.layout(), &self.layout) {
            Ok(())
        } else {
            Err(TerrainError::ForeignOccupancy)
        }
    }
}

/// Grid cell containing the lateral part of `position`, or `None` when `x`
/// or `y` is not finite.
fn grid_cell(scale: TerrainScale, position: WorldPos) -> Option<(i64, i64)> {
    (position.x.is_finite() && position.y.is_finite())
        .then(|| (scale.grid_index(position.x), scale.grid_index(position.y)))
}

/// Full lookup of the cell and layer under `position`.
fn locate(layout: &OccupancyLayout, position: WorldPos) -> Result<Cursor> {
    if !position.is_finite() {
        return Err(TerrainError::NonFinitePosition);
    }
    let geometry = layout.geometry();
    let (gx, gy) =
        grid_cell(geometry.scale(), position).ok_or(TerrainError::NonFinitePosition)?;
    let column = geometry.column_at(gx, gy)?;
    // In bounds, so both indices fit in u32.
    let (grid_x, grid_y) = (gx as u32, gy as u32);
    if column.is_empty() {
        return Err(TerrainError::NoWalkableSurface {
            x: grid_x,
            y: grid_y,
        });
    }
    Ok(Cursor {
        grid_x,
        grid_y,
        layer: geometry.layer_at(column, position.z),
        column,
        slot: layout.slot(grid_x, grid_y)?,
    })
}
