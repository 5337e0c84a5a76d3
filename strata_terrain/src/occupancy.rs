// Dynamic occupancy overlay on top of a frozen `TerrainGeometry`.
//
// One `u8` reference counter per (cell, layer) across the whole grid,
// concatenated in the same row-major order as the geometry's layer stacks
// and addressed through a per-cell `mask_index` offset. A counter > 0 means
// the slot is blocked; several independent occupants may hold the same slot.
//
// The offset table (`OccupancyLayout`) is derived once from the geometry's
// layer counts and never changes, so it is shared behind an `Arc` with every
// locator bound to this overlay. The counters themselves are plain integers
// mutated through `&mut self`: one owner (the tick loop) mutates them, and
// the borrow checker enforces that. Wrap the overlay in a lock if agents
// ever move on several threads.
//
// Radius queries and mutations cover a square window of
// `(2r + 1) x (2r + 1)` cells centred on the origin, clamped to the grid
// and inclusive on every side. In each window cell the layer is resolved by
// height: `layer_at(cell, ceiling(origin layer))`. Cells without layers are
// skipped.
//
// See also: `geometry.rs` for the layer stacks this mirrors, `locator.rs`
// for the per-agent `is_blocked` / `occupy` / `vacate` helpers.

use crate::error::{Result, TerrainError};
use crate::geometry::TerrainGeometry;
use smallvec::SmallVec;
use std::sync::Arc;

/// Per-cell handle into the counter arena.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MaskSlot {
    base: u32,
    count: u8,
}

impl MaskSlot {
    pub fn layer_count(&self) -> u8 {
        self.count
    }

    fn index(&self, layer: u8) -> usize {
        assert!(
            layer < self.count,
            "layer {layer} out of range for a cell with {} layers",
            self.count
        );
        self.base as usize + usize::from(layer)
    }
}

/// Immutable slot layout of an occupancy overlay.
#[derive(Debug)]
pub struct OccupancyLayout {
    geometry: Arc<TerrainGeometry>,
    mask_index: Vec<u32>,
    slot_count: usize,
}

impl OccupancyLayout {
    fn new(geometry: Arc<TerrainGeometry>) -> Self {
        let cell_count = geometry.length() as usize * geometry.width() as usize;
        let mut mask_index = Vec::with_capacity(cell_count);
        let mut next = 0u32;
        for y in 0..geometry.width() {
            for x in 0..geometry.length() {
                mask_index.push(next);
                // In range by construction.
                let count = geometry.column(x, y).map_or(0, |c| c.layer_count());
                next += u32::from(count);
            }
        }
        Self {
            geometry,
            mask_index,
            slot_count: next as usize,
        }
    }

    pub fn geometry(&self) -> &Arc<TerrainGeometry> {
        &self.geometry
    }

    /// Total number of counters.
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// The counter handle for cell `(x, y)`.
    pub fn slot(&self, x: u32, y: u32) -> Result<MaskSlot> {
        let idx = self.geometry.cell_index(i64::from(x), i64::from(y))?;
        let count = self.geometry.column(x, y)?.layer_count();
        Ok(MaskSlot {
            base: self.mask_index[idx],
            count,
        })
    }
}

/// Reference-counted occupancy for every (cell, layer) of one geometry.
#[derive(Debug)]
pub struct TerrainOccupancy {
    layout: Arc<OccupancyLayout>,
    counters: Vec<u8>,
}

impl TerrainOccupancy {
    /// Allocate zeroed counters for every layer of `geometry`.
    ///
    /// The geometry must already have its neighbor graph built: locators
    /// bound to this overlay walk that graph.
    pub fn new(geometry: Arc<TerrainGeometry>) -> Result<Self> {
        if !geometry.is_graph_built() {
            return Err(TerrainError::GraphNotBuilt);
        }
        let layout = OccupancyLayout::new(geometry);
        let counters = vec![0; layout.slot_count()];
        Ok(Self {
            layout: Arc::new(layout),
            counters,
        })
    }

    pub fn geometry(&self) -> &Arc<TerrainGeometry> {
        self.layout.geometry()
    }

    pub fn layout(&self) -> &Arc<OccupancyLayout> {
        &self.layout
    }

    pub fn slot(&self, x: u32, y: u32) -> Result<MaskSlot> {
        self.layout.slot(x, y)
    }

    // -----------------------------------------------------------------------
    // Point form (cached slot handle)
    // -----------------------------------------------------------------------

    /// # Panics
    /// If `layer >= slot.layer_count()`.
    pub fn is_slot_occupied(&self, slot: MaskSlot, layer: u8) -> bool {
        self.counters[slot.index(layer)] > 0
    }

    /// # Panics
    /// If `layer >= slot.layer_count()`.
    pub fn occupant_count(&self, slot: MaskSlot, layer: u8) -> u8 {
        self.counters[slot.index(layer)]
    }

    pub fn add_to_slot(&mut self, slot: MaskSlot, layer: u8) -> Result<()> {
        let counter = &mut self.counters[checked_index(slot, layer)?];
        *counter = counter
            .checked_add(1)
            .ok_or(TerrainError::OccupancyOverflow)?;
        Ok(())
    }

    pub fn remove_from_slot(&mut self, slot: MaskSlot, layer: u8) -> Result<()> {
        let counter = &mut self.counters[checked_index(slot, layer)?];
        *counter = counter
            .checked_sub(1)
            .ok_or(TerrainError::OccupancyUnderflow)?;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Coordinate form, optional radius
    // -----------------------------------------------------------------------

    /// Is `(x, y, layer)`, or anything at the same height within `radius`
    /// cells of it, occupied?
    pub fn is_occupied(&self, x: u32, y: u32, layer: u8, radius: u8) -> Result<bool> {
        if radius == 0 {
            let idx = checked_index(self.slot(x, y)?, layer)?;
            return Ok(self.counters[idx] > 0);
        }
        Ok(self
            .footprint(x, y, layer, radius)?
            .iter()
            .any(|&idx| self.counters[idx] > 0))
    }

    /// Add one occupant to `(x, y, layer)` and, for `radius > 0`, to the
    /// same-height layer of every cell in the window. All-or-nothing.
    pub fn add_occupant(&mut self, x: u32, y: u32, layer: u8, radius: u8) -> Result<()> {
        let footprint = self.footprint(x, y, layer, radius)?;
        if footprint.iter().any(|&idx| self.counters[idx] == u8::MAX) {
            return Err(TerrainError::OccupancyOverflow);
        }
        for idx in footprint {
            self.counters[idx] += 1;
        }
        Ok(())
    }

    /// Inverse of `add_occupant` with the same arguments. All-or-nothing.
    pub fn remove_occupant(&mut self, x: u32, y: u32, layer: u8, radius: u8) -> Result<()> {
        let footprint = self.footprint(x, y, layer, radius)?;
        if footprint.iter().any(|&idx| self.counters[idx] == 0) {
            return Err(TerrainError::OccupancyUnderflow);
        }
        for idx in footprint {
            self.counters[idx] -= 1;
        }
        Ok(())
    }

    /// Sum of all counters.
    pub fn total_occupants(&self) -> u64 {
        self.counters.iter().map(|&c| u64::from(c)).sum()
    }

    /// Counter indices covered by `(x, y, layer)` with `radius`.
    fn footprint(&self, x: u32, y: u32, layer: u8, radius: u8) -> Result<SmallVec<[usize; 9]>> {
        let geometry = self.geometry();
        let origin_slot = self.slot(x, y)?;
        let origin_idx = checked_index(origin_slot, layer)?;
        let mut indices = SmallVec::new();
        if radius == 0 {
            indices.push(origin_idx);
            return Ok(indices);
        }

        let surface = geometry.ceiling(geometry.column(x, y)?, layer);
        let r = u32::from(radius);
        let x_end = x.saturating_add(r).min(geometry.length() - 1);
        let y_end = y.saturating_add(r).min(geometry.width() - 1);
        for wy in y.saturating_sub(r)..=y_end {
            for wx in x.saturating_sub(r)..=x_end {
                if (wx, wy) == (x, y) {
                    indices.push(origin_idx);
                    continue;
                }
                let column = geometry.column(wx, wy)?;
                if let Some(wl) = geometry.checked_layer_at(column, surface) {
                    indices.push(self.slot(wx, wy)?.index(wl));
                }
            }
        }
        Ok(indices)
    }
}

fn checked_index(slot: MaskSlot, layer: u8) -> Result<usize> {
    if layer >= slot.count {
        return Err(TerrainError::LayerOutOfRange {
            layer,
            count: slot.count,
        });
    }
    Ok(slot.index(layer))
}
