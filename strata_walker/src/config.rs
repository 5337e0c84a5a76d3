// Run configuration for the walker driver, loaded from JSON.
//
// Every field has a default (`#[serde(default)]` on the structs), so a
// config file only needs the values it changes; `{}` is a valid config.
// The embedded `TerrainConfig` carries the terrain scale, which must match
// whatever terrain file is imported with `--import`.
//
// See also: `terrain_gen.rs` which reads `TerrainGenParams`, `sim.rs` which
// reads the agent and tick fields.

use serde::{Deserialize, Serialize};
use strata_terrain::{TerrainConfig, TerrainScale};

/// Procedural terrain parameters. Heights are world units.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TerrainGenParams {
    /// Ceiling of the single ground layer.
    pub ground_height: f32,
    /// Number of rectangular platforms to place.
    pub platform_count: u32,
    /// Platform side length range in cells, inclusive.
    pub platform_min_extent: u32,
    pub platform_max_extent: u32,
    /// Underside and walking surface of a platform.
    pub platform_floor: f32,
    pub platform_ceiling: f32,
    /// Probability that a ground cell is left without any layer.
    pub hole_chance: f32,
}

impl Default for TerrainGenParams {
    fn default() -> Self {
        Self {
            ground_height: 10.0,
            platform_count: 6,
            platform_min_extent: 3,
            platform_max_extent: 8,
            platform_floor: 40.0,
            platform_ceiling: 60.0,
            hole_chance: 0.02,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WalkerConfig {
    pub terrain: TerrainConfig,
    pub generation: TerrainGenParams,
    pub seed: u64,
    pub agent_count: u32,
    /// Number of ticks the binary runs.
    pub ticks: u32,
    /// Seconds per tick.
    pub tick_dt: f32,
    /// Lateral agent speed, world units per second.
    pub agent_speed: f32,
    /// Occupancy footprint radius in cells.
    pub agent_radius: u8,
}

impl Default for WalkerConfig {
    fn default() -> Self {
        Self {
            terrain: TerrainConfig {
                length: 48,
                width: 48,
                height: 8,
                scale: TerrainScale::default(),
            },
            generation: TerrainGenParams::default(),
            seed: 42,
            agent_count: 64,
            ticks: 500,
            tick_dt: 0.1,
            agent_speed: 120.0,
            agent_radius: 0,
        }
    }
}

impl WalkerConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}
