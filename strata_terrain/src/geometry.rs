// Static layered terrain: per-cell stacks of walkable layers plus the
// precomputed 8-direction neighbor-relation graph.
//
// Storage is three flat arenas addressed by per-cell offsets, never per-cell
// vectors:
// - `spans`:     quantized boundary values for every cell, concatenated.
//                A cell with `k` layers owns `2k - 1` values
//                `b[0..2k-1]`; layer `i` has floor `b[2i-1]` (0 for i = 0)
//                and ceiling `b[2i]`.
// - `neighbors`: one `NeighborWord` per (cell, layer), concatenated in
//                row-major cell order by `build_neighbor_graph()`.
// - `cells`:     one `Column` per grid cell at index `y * length + x`,
//                holding the cell's span offset, neighbor offset and layer
//                count.
//
// Lifecycle: `new()` -> any number of `add_layers()` -> exactly one
// `build_neighbor_graph()`. After that the geometry is frozen and is shared
// read-only (behind an `Arc`) by the occupancy overlay and every locator.
//
// See also: `stream.rs` for the binary import/export of this structure,
// `occupancy.rs` for the mutable overlay sized from the layer counts,
// `locator.rs` which walks the neighbor graph one cell at a time.

use crate::config::{TerrainConfig, TerrainScale};
use crate::error::{Result, TerrainError};
use crate::types::{Direction, LayerRelation, NeighborWord};
use rayon::prelude::*;
use smallvec::SmallVec;

/// Number of boundary values describing `layer_count` stacked layers.
pub const fn span_count(layer_count: u8) -> usize {
    if layer_count == 0 {
        0
    } else {
        layer_count as usize * 2 - 1
    }
}

/// Convert an arena length into a `u32` cell offset.
fn arena_offset(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| TerrainError::ArenaFull { len })
}

/// Per-cell handle into the geometry arenas. Cheap to copy; locators cache
/// one for their current cell.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Column {
    span_index: u32,
    neighbor_index: u32,
    count: u8,
}

impl Column {
    /// Number of walkable layers in this cell.
    pub fn layer_count(&self) -> u8 {
        self.count
    }

    pub fn is_empty(&self) -> bool {
        self.count == 0
    }

    fn check_layer(&self, layer: u8) {
        assert!(
            layer < self.count,
            "layer {layer} out of range for a cell with {} layers",
            self.count
        );
    }
}

/// The static terrain index. See module docs for the storage layout.
#[derive(Clone, Debug)]
pub struct TerrainGeometry {
    length: u32,
    width: u32,
    height: u32,
    scale: TerrainScale,
    cells: Vec<Column>,
    spans: Vec<u16>,
    neighbors: Vec<NeighborWord>,
    graph_built: bool,
}

impl TerrainGeometry {
    /// Create an empty `length x width` grid (every cell has zero layers).
    ///
    /// `height` is carried for the stream format only; no query reads it.
    pub fn new(length: u32, width: u32, height: u32, scale: TerrainScale) -> Result<Self> {
        scale.validate()?;
        let cell_count = u64::from(length) * u64::from(width);
        if cell_count > crate::stream::MAX_GRID_CELLS {
            return Err(TerrainError::GridTooLarge {
                cells: cell_count,
                max: crate::stream::MAX_GRID_CELLS,
            });
        }
        Ok(Self {
            length,
            width,
            height,
            scale,
            cells: vec![Column::default(); cell_count as usize],
            spans: Vec::new(),
            neighbors: Vec::new(),
            graph_built: false,
        })
    }

    pub fn from_config(config: &TerrainConfig) -> Result<Self> {
        Self::new(config.length, config.width, config.height, config.scale)
    }

    pub fn length(&self) -> u32 {
        self.length
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn scale(&self) -> TerrainScale {
        self.scale
    }

    pub fn span_measure(&self) -> f32 {
        self.scale.span_measure
    }

    pub fn grid_size(&self) -> f32 {
        self.scale.grid_size
    }

    pub fn is_graph_built(&self) -> bool {
        self.graph_built
    }

    /// Total (cell, layer) slots across the grid.
    pub fn layer_slot_count(&self) -> usize {
        self.cells.iter().map(|c| usize::from(c.count)).sum()
    }

    /// Check whether a (possibly negative) cell coordinate is on the grid.
    pub fn in_bounds(&self, x: i64, y: i64) -> bool {
        x >= 0 && y >= 0 && x < i64::from(self.length) && y < i64::from(self.width)
    }

    /// Flat cell index, or `OutOfBounds`.
    pub(crate) fn cell_index(&self, x: i64, y: i64) -> Result<usize> {
        if !self.in_bounds(x, y) {
            return Err(TerrainError::OutOfBounds {
                x,
                y,
                length: self.length,
                width: self.width,
            });
        }
        Ok(y as usize * self.length as usize + x as usize)
    }

    /// The column handle for cell `(x, y)`.
    pub fn column(&self, x: u32, y: u32) -> Result<Column> {
        self.column_at(i64::from(x), i64::from(y))
    }

    pub(crate) fn column_at(&self, x: i64, y: i64) -> Result<Column> {
        Ok(self.cells[self.cell_index(x, y)?])
    }

    /// Coordinates of the neighbor of `(x, y)` in direction `dir`, or `None`
    /// at the grid edge.
    pub fn neighbor_of(&self, x: u32, y: u32, dir: Direction) -> Option<(u32, u32)> {
        let (dx, dy) = dir.offset();
        let nx = i64::from(x) + i64::from(dx);
        let ny = i64::from(y) + i64::from(dy);
        self.in_bounds(nx, ny).then_some((nx as u32, ny as u32))
    }

    // -----------------------------------------------------------------------
    // Population
    // -----------------------------------------------------------------------

    /// Write the boundary sequence of cell `(x, y)`.
    ///
    /// `boundaries` must hold `2 * layer_count - 1` quantized values (none
    /// for an empty cell) in non-decreasing order. Fails once the neighbor
    /// graph is built.
    pub fn add_layers(&mut self, x: u32, y: u32, layer_count: u8, boundaries: &[u16]) -> Result<()> {
        if self.graph_built {
            return Err(TerrainError::GraphAlreadyBuilt);
        }
        let idx = self.cell_index(i64::from(x), i64::from(y))?;
        let expected = span_count(layer_count);
        if boundaries.len() != expected {
            return Err(TerrainError::BoundaryCountMismatch {
                expected,
                actual: boundaries.len(),
            });
        }
        if boundaries.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(TerrainError::NonMonotonicBoundaries { x, y });
        }

        let span_index = arena_offset(self.spans.len())?;
        let cell = &mut self.cells[idx];
        if cell.count > 0 {
            log::warn!(
                "cell ({x}, {y}) populated twice; {} earlier boundary values left unreachable",
                span_count(cell.count)
            );
        }
        cell.span_index = span_index;
        cell.count = layer_count;
        self.spans.extend_from_slice(boundaries);
        Ok(())
    }

    /// Like `add_layers`, but with world-space heights quantized by
    /// `span_measure` (see `TerrainScale::quantize`).
    pub fn add_layers_world(
        &mut self,
        x: u32,
        y: u32,
        layer_count: u8,
        heights: &[f32],
    ) -> Result<()> {
        let quantized: SmallVec<[u16; 16]> =
            heights.iter().map(|&h| self.scale.quantize(h)).collect();
        self.add_layers(x, y, layer_count, &quantized)
    }

    // -----------------------------------------------------------------------
    // Layer queries
    // -----------------------------------------------------------------------

    /// The quantized boundary values of a cell.
    pub fn boundaries(&self, column: Column) -> &[u16] {
        let start = column.span_index as usize;
        &self.spans[start..start + span_count(column.count)]
    }

    /// World height of the top (walkable surface) of `layer`.
    ///
    /// # Panics
    /// If `layer >= column.layer_count()`.
    pub fn ceiling(&self, column: Column, layer: u8) -> f32 {
        column.check_layer(layer);
        let units = self.spans[column.span_index as usize + usize::from(layer) * 2];
        self.scale.dequantize(units)
    }

    /// World height of the bottom of `layer` (0 for layer 0).
    ///
    /// # Panics
    /// If `layer >= column.layer_count()`.
    pub fn floor(&self, column: Column, layer: u8) -> f32 {
        column.check_layer(layer);
        if layer == 0 {
            return 0.0;
        }
        let units = self.spans[column.span_index as usize + usize::from(layer) * 2 - 1];
        self.scale.dequantize(units)
    }

    /// The layer an agent standing at `height` belongs to: the greatest
    /// layer whose ceiling is `<= height`.
    ///
    /// Heights below every ceiling resolve to layer 0, the same answer as
    /// standing exactly on layer 0. An empty cell also yields 0; use
    /// `checked_layer_at` where that matters.
    pub fn layer_at(&self, column: Column, height: f32) -> u8 {
        let mut layer = 0;
        for i in 0..column.count {
            if self.ceiling(column, i) <= height {
                layer = i;
            } else {
                break;
            }
        }
        layer
    }

    /// `layer_at`, or `None` for a cell with no layers.
    pub fn checked_layer_at(&self, column: Column, height: f32) -> Option<u8> {
        (!column.is_empty()).then(|| self.layer_at(column, height))
    }

    /// The first layer whose ceiling lies in
    /// `[height - down_tolerance, height + up_tolerance]`, or `None`.
    pub fn layer_within(
        &self,
        column: Column,
        height: f32,
        up_tolerance: f32,
        down_tolerance: f32,
    ) -> Option<u8> {
        (0..column.count).find(|&i| {
            let ceiling = self.ceiling(column, i);
            ceiling >= height - down_tolerance && ceiling <= height + up_tolerance
        })
    }

    // -----------------------------------------------------------------------
    // Neighbor graph
    // -----------------------------------------------------------------------

    /// Classify every (cell, layer, direction) once and freeze the geometry.
    ///
    /// For layer `i` of a cell, the neighbor in each direction is probed at
    /// `ceiling(i)`: `layer_at` on the neighbor gives `j`, and `(i, j)` is
    /// classified `Same`/`Above`/`Below`/`Unknown`. Grid edges and empty
    /// neighbors are `Unknown`.
    pub fn build_neighbor_graph(&mut self) -> Result<()> {
        if self.graph_built {
            return Err(TerrainError::GraphAlreadyBuilt);
        }

        let length = self.length as usize;
        // Cells are independent; collect preserves row-major order.
        let per_cell: Vec<SmallVec<[NeighborWord; 4]>> = (0..self.cells.len())
            .into_par_iter()
            .map(|idx| {
                let x = (idx % length) as u32;
                let y = (idx / length) as u32;
                let column = self.cells[idx];
                (0..column.count)
                    .map(|layer| self.classify_layer(x, y, column, layer))
                    .collect()
            })
            .collect();

        let mut neighbors = Vec::with_capacity(self.layer_slot_count());
        let mut offsets = Vec::with_capacity(self.cells.len());
        for words in per_cell {
            offsets.push(arena_offset(neighbors.len())?);
            neighbors.extend(words);
        }
        for (cell, offset) in self.cells.iter_mut().zip(offsets) {
            cell.neighbor_index = offset;
        }
        self.neighbors = neighbors;
        self.graph_built = true;

        let unknown = self
            .neighbors
            .iter()
            .flat_map(|word| Direction::ALL.map(|dir| word.get(dir)))
            .filter(|&rel| rel == LayerRelation::Unknown)
            .count();
        log::debug!(
            "neighbor graph built: {} cells, {} layer slots, {} unknown relations",
            self.cells.len(),
            self.neighbors.len(),
            unknown
        );
        Ok(())
    }

    fn classify_layer(&self, x: u32, y: u32, column: Column, layer: u8) -> NeighborWord {
        let surface = self.ceiling(column, layer);
        Direction::ALL
            .into_iter()
            .fold(NeighborWord::default(), |word, dir| {
                let relation = self
                    .neighbor_of(x, y, dir)
                    .and_then(|(nx, ny)| self.column(nx, ny).ok())
                    .and_then(|neighbor| self.checked_layer_at(neighbor, surface))
                    .map_or(LayerRelation::Unknown, |j| LayerRelation::classify(layer, j));
                word.with(dir, relation)
            })
    }

    /// The precomputed relation from `layer` of a cell toward `dir`.
    ///
    /// `Unknown` before the graph is built.
    ///
    /// # Panics
    /// If `layer >= column.layer_count()`.
    pub fn relation_at(&self, column: Column, layer: u8, dir: Direction) -> LayerRelation {
        column.check_layer(layer);
        self.neighbors
            .get(column.neighbor_index as usize + usize::from(layer))
            .map_or(LayerRelation::Unknown, |word| word.get(dir))
    }

    /// Resolve `relation` from `layer` to a concrete layer index.
    pub fn relation_to_layer(layer: u8, relation: LayerRelation) -> Result<u8> {
        relation.apply(layer).ok_or(TerrainError::UnknownRelation)
    }
}
