// Headless tick loop: agents wander across layered terrain.
//
// `WalkerSim` owns the terrain (shared through the occupancy overlay), the
// occupancy counters, one `AgentLocator` plus velocity per agent, and the
// seeded RNG. Each `step()` advances every agent once, in spawn order.
//
// ## Per-agent movement
//
//   1. `target = position + velocity * dt` (velocity is lateral only).
//   2. The agent vacates its footprint so it cannot block itself.
//   3. A clone of its locator tries `move_to(target)`:
//      - success: the probe sits on the resolved layer, z snapped;
//      - `TooFar`: fall back to `teleport(target)`; a target off the grid
//        or over a hole counts as `OffTerrain`;
//      - `UnknownRelation`: edge, hole or multi-layer jump.
//   4. A probe that moved but lands on an occupied footprint is `Blocked`.
//   5. Only `Moved` / `Teleported` commit the probe. Every other outcome
//      keeps the old locator and draws a new random heading.
//   6. The agent re-occupies its (new or old) footprint.
//
// The agent's position is never integrated on its own: it is always read
// back from the locator, so a rejected step leaves the agent exactly where
// it was.
//
// **Critical constraint:** the occupancy overlay always holds exactly one
// footprint per agent between ticks. Any error out of `step()` breaks that
// and the sim must be discarded.
//
// See also: `terrain_gen.rs` for the terrain, `rng.rs` for headings.

use crate::config::WalkerConfig;
use crate::rng::WalkRng;
use crate::terrain_gen;
use std::ops::AddAssign;
use std::sync::Arc;
use strata_terrain::{
    AgentLocator, MoveRejected, Result, TerrainError, TerrainGeometry, TerrainOccupancy, WorldPos,
};

/// Spawn attempts per agent before giving up on placing it.
const SPAWN_ATTEMPTS: u32 = 256;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepOutcome {
    Moved,
    Teleported,
    Unknown,
    Blocked,
    OffTerrain,
}

impl StepOutcome {
    fn committed(self) -> bool {
        matches!(self, StepOutcome::Moved | StepOutcome::Teleported)
    }
}

/// Outcome counts for one or more ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct TickStats {
    pub moved: u32,
    pub teleported: u32,
    pub unknown: u32,
    pub blocked: u32,
    pub off_terrain: u32,
}

impl TickStats {
    fn record(&mut self, outcome: StepOutcome) {
        match outcome {
            StepOutcome::Moved => self.moved += 1,
            StepOutcome::Teleported => self.teleported += 1,
            StepOutcome::Unknown => self.unknown += 1,
            StepOutcome::Blocked => self.blocked += 1,
            StepOutcome::OffTerrain => self.off_terrain += 1,
        }
    }

    pub fn rejected(&self) -> u32 {
        self.unknown + self.blocked + self.off_terrain
    }

    pub fn total(&self) -> u32 {
        self.moved + self.teleported + self.rejected()
    }
}

impl AddAssign for TickStats {
    fn add_assign(&mut self, rhs: Self) {
        self.moved += rhs.moved;
        self.teleported += rhs.teleported;
        self.unknown += rhs.unknown;
        self.blocked += rhs.blocked;
        self.off_terrain += rhs.off_terrain;
    }
}

#[derive(Clone, Debug)]
pub struct Agent {
    locator: AgentLocator,
    velocity: [f32; 3],
}

impl Agent {
    pub fn locator(&self) -> &AgentLocator {
        &self.locator
    }

    pub fn position(&self) -> WorldPos {
        self.locator.position()
    }

    pub fn velocity(&self) -> [f32; 3] {
        self.velocity
    }
}

pub struct WalkerSim {
    config: WalkerConfig,
    rng: WalkRng,
    occupancy: TerrainOccupancy,
    agents: Vec<Agent>,
    tick: u64,
}

impl WalkerSim {
    /// Generate terrain from `config` and spawn agents on it.
    pub fn new(config: WalkerConfig) -> Result<Self> {
        let mut rng = WalkRng::new(config.seed);
        let geometry = terrain_gen::generate(&config, &mut rng)?;
        Self::with_rng(config, geometry, rng)
    }

    /// Spawn agents on existing terrain (e.g. imported from a stream). The
    /// neighbor graph is built here if the geometry does not have one yet.
    pub fn with_geometry(config: WalkerConfig, geometry: TerrainGeometry) -> Result<Self> {
        let rng = WalkRng::new(config.seed);
        Self::with_rng(config, geometry, rng)
    }

    fn with_rng(
        config: WalkerConfig,
        mut geometry: TerrainGeometry,
        mut rng: WalkRng,
    ) -> Result<Self> {
        if !geometry.is_graph_built() {
            geometry.build_neighbor_graph()?;
        }
        let mut occupancy = TerrainOccupancy::new(Arc::new(geometry))?;
        let agents = spawn_agents(&config, &mut occupancy, &mut rng)?;
        if agents.len() < config.agent_count as usize {
            log::warn!(
                "placed {} of {} agents; terrain is too crowded",
                agents.len(),
                config.agent_count
            );
        }
        Ok(Self {
            config,
            rng,
            occupancy,
            agents,
            tick: 0,
        })
    }

    pub fn config(&self) -> &WalkerConfig {
        &self.config
    }

    pub fn geometry(&self) -> &TerrainGeometry {
        self.occupancy.geometry()
    }

    pub fn occupancy(&self) -> &TerrainOccupancy {
        &self.occupancy
    }

    pub fn agents(&self) -> &[Agent] {
        &self.agents
    }

    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Advance every agent by one tick.
    pub fn step(&mut self) -> Result<TickStats> {
        let mut stats = TickStats::default();
        let dt = self.config.tick_dt;
        let speed = self.config.agent_speed;
        for agent in &mut self.agents {
            let outcome = advance(agent, &mut self.occupancy, dt)?;
            stats.record(outcome);
            if !outcome.committed() {
                agent.velocity = self.rng.heading(speed);
            }
        }
        self.tick += 1;
        log::debug!(
            "tick {}: {} moved, {} teleported, {} unknown, {} blocked, {} off terrain",
            self.tick,
            stats.moved,
            stats.teleported,
            stats.unknown,
            stats.blocked,
            stats.off_terrain
        );
        Ok(stats)
    }

    /// Run `ticks` steps and return the summed stats.
    pub fn run(&mut self, ticks: u32) -> Result<TickStats> {
        let mut total = TickStats::default();
        for _ in 0..ticks {
            total += self.step()?;
        }
        Ok(total)
    }
}

fn advance(agent: &mut Agent, occupancy: &mut TerrainOccupancy, dt: f32) -> Result<StepOutcome> {
    let target = agent.locator.position().advanced(agent.velocity, dt);
    agent.locator.vacate(occupancy)?;

    let mut probe = agent.locator.clone();
    let mut outcome = match probe.move_to(target) {
        Ok(_) => StepOutcome::Moved,
        Err(MoveRejected::TooFar { .. }) => match probe.teleport(target) {
            Ok(()) => StepOutcome::Teleported,
            Err(
                TerrainError::OutOfBounds { .. }
                | TerrainError::NoWalkableSurface { .. }
                | TerrainError::NonFinitePosition,
            ) => StepOutcome::OffTerrain,
            Err(e) => return Err(e),
        },
        Err(MoveRejected::UnknownRelation(_)) => StepOutcome::Unknown,
        Err(MoveRejected::NonFinite) => StepOutcome::OffTerrain,
    };
    if outcome.committed() && probe.is_blocked(occupancy)? {
        outcome = StepOutcome::Blocked;
    }
    if outcome.committed() {
        agent.locator = probe;
    }
    agent.locator.occupy(occupancy)?;
    Ok(outcome)
}

/// Place up to `agent_count` agents on random free cells, standing on the
/// top layer of each cell.
fn spawn_agents(
    config: &WalkerConfig,
    occupancy: &mut TerrainOccupancy,
    rng: &mut WalkRng,
) -> Result<Vec<Agent>> {
    let geometry = Arc::clone(occupancy.geometry());
    let grid = geometry.grid_size();
    let mut agents = Vec::with_capacity(config.agent_count as usize);
    if geometry.layer_slot_count() == 0 {
        return Ok(agents);
    }

    'agents: for _ in 0..config.agent_count {
        for _ in 0..SPAWN_ATTEMPTS {
            let x = rng.range_u32(0, geometry.length());
            let y = rng.range_u32(0, geometry.width());
            let column = geometry.column(x, y)?;
            if column.is_empty() {
                continue;
            }
            let z = geometry.ceiling(column, column.layer_count() - 1);
            let position = WorldPos::new((x as f32 + 0.5) * grid, (y as f32 + 0.5) * grid, z);
            let locator = AgentLocator::new(occupancy, position)?.with_radius(config.agent_radius);
            if locator.is_blocked(occupancy)? {
                continue;
            }
            locator.occupy(occupancy)?;
            agents.push(Agent {
                locator,
                velocity: rng.heading(config.agent_speed),
            });
            continue 'agents;
        }
        break;
    }
    Ok(agents)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainGenParams;
    use strata_terrain::{TerrainConfig, TerrainScale};

    fn small_config() -> WalkerConfig {
        WalkerConfig {
            terrain: TerrainConfig {
                length: 16,
                width: 16,
                height: 4,
                scale: TerrainScale::new(1.0, 10.0),
            },
            agent_count: 12,
            agent_speed: 30.0,
            ..WalkerConfig::default()
        }
    }

    #[test]
    fn spawns_requested_agents_on_free_slots() {
        let sim = WalkerSim::new(small_config()).unwrap();
        assert_eq!(sim.agents().len(), 12);
        assert_eq!(sim.occupancy().total_occupants(), 12);
        for agent in sim.agents() {
            let loc = agent.locator();
            assert_eq!(agent.position().z, loc.ceiling());
            assert_eq!(loc.layer() + 1, loc.column().layer_count());
        }
    }

    #[test]
    fn crowded_terrain_places_fewer_agents() {
        let config = WalkerConfig {
            terrain: TerrainConfig {
                length: 2,
                width: 2,
                ..small_config().terrain
            },
            generation: TerrainGenParams {
                platform_count: 0,
                hole_chance: 0.0,
                ..TerrainGenParams::default()
            },
            agent_count: 10,
            ..small_config()
        };
        let sim = WalkerSim::new(config).unwrap();
        assert_eq!(sim.agents().len(), 4);
        assert_eq!(sim.occupancy().total_occupants(), 4);
    }

    #[test]
    fn step_accounts_for_every_agent() {
        let mut sim = WalkerSim::new(small_config()).unwrap();
        for _ in 0..20 {
            let stats = sim.step().unwrap();
            assert_eq!(stats.total(), 12);
            assert_eq!(sim.occupancy().total_occupants(), 12);
        }
        assert_eq!(sim.tick(), 20);
    }

    #[test]
    fn fast_agents_fall_back_to_teleport() {
        let config = WalkerConfig {
            generation: TerrainGenParams {
                platform_count: 0,
                hole_chance: 0.0,
                ..TerrainGenParams::default()
            },
            // 40 world units per tick on a 10-unit grid: every step spans at
            // least two cells along one axis.
            agent_speed: 400.0,
            ..small_config()
        };
        let mut sim = WalkerSim::new(config).unwrap();
        let stats = sim.run(10).unwrap();
        assert!(stats.teleported > 0);
        assert_eq!(stats.moved, 0);
        assert_eq!(sim.occupancy().total_occupants(), 12);
    }

    #[test]
    fn tick_stats_add_up() {
        let mut total = TickStats::default();
        total += TickStats {
            moved: 2,
            blocked: 1,
            ..TickStats::default()
        };
        total += TickStats {
            unknown: 3,
            off_terrain: 1,
            ..TickStats::default()
        };
        assert_eq!(total.rejected(), 5);
        assert_eq!(total.total(), 7);
    }
}
