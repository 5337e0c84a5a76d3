// strata_walker: headless driver for `strata_terrain`.
//
// Stands in for the simulation that owns agent positions: it generates (or
// imports) a layered terrain, spawns agents on it, and moves them with a
// fixed-timestep velocity loop through `AgentLocator::move_to`, keeping the
// occupancy overlay in step with the agents.
//
// Module overview:
// - `config.rs`:      WalkerConfig / TerrainGenParams: JSON run configuration.
// - `rng.rs`:         WalkRng: seeded xoshiro256++ for terrain and headings.
// - `terrain_gen.rs`: Ground + platforms + stairs + holes terrain generator.
// - `sim.rs`:         WalkerSim: agents, tick loop, move/teleport fallbacks.
//
// The `walker` binary (`main.rs`) wraps this library with a small CLI.
//
// **Critical constraint: determinism.** A run is a pure function of its
// `WalkerConfig`. All randomness comes from `WalkRng` seeded by
// `config.seed`; agents are processed in spawn order.

pub mod config;
pub mod rng;
pub mod sim;
pub mod terrain_gen;
