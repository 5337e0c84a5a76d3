// End-to-end tests for the walker driver over the terrain library.
//
// Each test generates a small seeded terrain, spawns agents and runs the
// real tick loop, then checks invariants that tie the locators, the
// occupancy overlay and the geometry together.

use std::io::Cursor;

use strata_terrain::{TerrainConfig, TerrainGeometry, TerrainScale};
use strata_walker::config::{TerrainGenParams, WalkerConfig};
use strata_walker::sim::WalkerSim;

fn test_config(seed: u64) -> WalkerConfig {
    WalkerConfig {
        terrain: TerrainConfig {
            length: 24,
            width: 24,
            height: 4,
            scale: TerrainScale::new(0.5, 10.0),
        },
        generation: TerrainGenParams {
            platform_count: 4,
            platform_min_extent: 3,
            platform_max_extent: 6,
            hole_chance: 0.05,
            ..TerrainGenParams::default()
        },
        seed,
        agent_count: 24,
        tick_dt: 0.1,
        agent_speed: 45.0,
        ..WalkerConfig::default()
    }
}

/// Every agent's cached layer agrees with a fresh `layer_at` at its height,
/// and its slot holds exactly one occupant.
fn assert_consistent(sim: &WalkerSim) {
    let geometry = sim.geometry();
    let occupancy = sim.occupancy();
    for (i, agent) in sim.agents().iter().enumerate() {
        let loc = agent.locator();
        let column = geometry.column(loc.grid_x(), loc.grid_y()).unwrap();
        assert!(!column.is_empty(), "agent {i} stands on an empty cell");
        assert_eq!(
            geometry.layer_at(column, agent.position().z),
            loc.layer(),
            "agent {i} at {}",
            agent.position()
        );
        let slot = occupancy.slot(loc.grid_x(), loc.grid_y()).unwrap();
        assert_eq!(occupancy.occupant_count(slot, loc.layer()), 1, "agent {i}");
    }
    assert_eq!(
        occupancy.total_occupants(),
        sim.agents().len() as u64,
        "one counter per agent"
    );
}

#[test]
fn same_seed_same_run() {
    let mut a = WalkerSim::new(test_config(17)).unwrap();
    let mut b = WalkerSim::new(test_config(17)).unwrap();
    let stats_a = a.run(100).unwrap();
    let stats_b = b.run(100).unwrap();
    assert_eq!(stats_a, stats_b);
    for (x, y) in a.agents().iter().zip(b.agents()) {
        assert_eq!(x.position(), y.position());
        assert_eq!(x.locator().layer(), y.locator().layer());
    }
}

#[test]
fn different_seeds_diverge() {
    let mut a = WalkerSim::new(test_config(1)).unwrap();
    let mut b = WalkerSim::new(test_config(2)).unwrap();
    a.run(20).unwrap();
    b.run(20).unwrap();
    let positions_a: Vec<_> = a.agents().iter().map(|ag| ag.position()).collect();
    let positions_b: Vec<_> = b.agents().iter().map(|ag| ag.position()).collect();
    assert_ne!(positions_a, positions_b);
}

#[test]
fn invariants_hold_every_tick() {
    let mut sim = WalkerSim::new(test_config(99)).unwrap();
    assert_consistent(&sim);
    let mut total = 0;
    for _ in 0..200 {
        let stats = sim.step().unwrap();
        total += stats.moved;
        assert_eq!(stats.total() as usize, sim.agents().len());
        assert_consistent(&sim);
    }
    assert!(total > 0, "nobody ever moved");
}

#[test]
fn agents_visit_more_than_one_layer() {
    // Dense platforms so spawns land on both the ground and platform tops.
    let config = WalkerConfig {
        generation: TerrainGenParams {
            platform_count: 12,
            platform_min_extent: 4,
            platform_max_extent: 8,
            ..test_config(5).generation
        },
        ..test_config(5)
    };
    let mut sim = WalkerSim::new(config).unwrap();
    let mut layers_seen = [false; 2];
    for _ in 0..300 {
        sim.step().unwrap();
        for agent in sim.agents() {
            layers_seen[usize::from(agent.locator().layer().min(1))] = true;
        }
    }
    assert_eq!(layers_seen, [true, true]);
}

#[test]
fn exported_terrain_drives_an_identical_world() {
    let config = test_config(23);
    let generated = WalkerSim::new(config.clone()).unwrap();
    let mut buf = Vec::new();
    generated.geometry().export(&mut buf).unwrap();

    let imported =
        TerrainGeometry::import(&mut Cursor::new(&buf), config.terrain.scale).unwrap();
    let original = generated.geometry();
    assert_eq!(imported.length(), original.length());
    assert_eq!(imported.width(), original.width());
    for y in 0..original.width() {
        for x in 0..original.length() {
            let a = original.column(x, y).unwrap();
            let b = imported.column(x, y).unwrap();
            assert_eq!(original.boundaries(a), imported.boundaries(b));
        }
    }

    let mut replay = WalkerSim::with_geometry(config, imported).unwrap();
    assert_consistent(&replay);
    replay.run(50).unwrap();
    assert_consistent(&replay);
}
