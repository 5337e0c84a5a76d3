// strata_terrain: stacked-layer terrain index for tick-rate agent movement.
//
// Agents move across a 2D grid but stand on one of several stacked walkable
// surfaces per cell (ground plus platforms, floors, bridges). This crate
// answers three questions cheaply every tick: which layer a world position
// belongs to, how a layer lines up with the layer in an adjacent cell
// (`Same` / `Above` / `Below` / `Unknown`), and whether a (cell, layer) is
// currently occupied.
//
// Module overview:
// - `types.rs`:     WorldPos, Direction (the one offset table), LayerRelation, NeighborWord.
// - `geometry.rs`:  TerrainGeometry: flat span/neighbor arenas, layer queries, neighbor graph.
// - `stream.rs`:    Binary export/import of a TerrainGeometry (byteorder).
// - `occupancy.rs`: TerrainOccupancy: per-(cell, layer) reference counters, radius windows.
// - `locator.rs`:   AgentLocator: cached per-agent cursor, teleport + single-step move_to.
// - `config.rs`:    TerrainScale / TerrainConfig: the scale constants the stream omits.
// - `error.rs`:     TerrainError + crate Result.
//
// Lifecycle: build one `TerrainGeometry`, call `build_neighbor_graph()` once,
// wrap it in an `Arc`, create one `TerrainOccupancy` over it, then one
// `AgentLocator` per agent. Geometry is read-only from then on; only the
// occupancy counters and the locators change.
//
// The companion crate `strata_walker` drives this library from a headless
// tick loop.

pub mod config;
pub mod error;
pub mod geometry;
pub mod locator;
pub mod occupancy;
pub mod stream;
pub mod types;

pub use config::{TerrainConfig, TerrainScale};
pub use error::{Result, TerrainError};
pub use geometry::{Column, TerrainGeometry};
pub use locator::{AgentLocator, MoveRejected, NeighborCell};
pub use occupancy::{MaskSlot, OccupancyLayout, TerrainOccupancy};
pub use types::{Direction, LayerRelation, NeighborWord, WorldPos};
