// Procedural layered terrain for walker runs.
//
// Generation is two-phase: `plan()` decides a `CellKind` per cell from the
// seeded RNG, then `generate()` writes the matching layer stacks into a
// fresh `TerrainGeometry` and builds its neighbor graph.
//
// Cell kinds and their layer stacks (heights from `TerrainGenParams`):
// - Ground:   one layer, ceiling `ground_height`.
// - Hole:     no layers. Agents can neither stand on nor step into it.
// - Platform: ground layer plus a raised layer
//             `[platform_floor, platform_ceiling]` above it.
// - Stair:    one solid layer up to `platform_ceiling`, placed just west of
//             each platform so agents can climb onto it.
//
// Walking ground -> stair is `Same` (layer 0 to layer 0, snapping up),
// stair -> platform is `Above`, platform -> ground is `Below`, and holes
// and grid edges are `Unknown`.
//
// Order of placement: holes, then platforms over them, then stairs (which
// never overwrite a platform cell).

use crate::config::WalkerConfig;
use crate::rng::WalkRng;
use strata_terrain::{Result, TerrainGeometry};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CellKind {
    Hole,
    Ground,
    Stair,
    Platform,
}

/// Per-cell layout decided before any geometry is written.
#[derive(Clone, Debug)]
pub struct TerrainPlan {
    length: u32,
    width: u32,
    cells: Vec<CellKind>,
}

impl TerrainPlan {
    pub fn kind(&self, x: u32, y: u32) -> CellKind {
        self.cells[(y * self.length + x) as usize]
    }

    pub fn count(&self, kind: CellKind) -> usize {
        self.cells.iter().filter(|&&k| k == kind).count()
    }

    fn set(&mut self, x: u32, y: u32, kind: CellKind) {
        self.cells[(y * self.length + x) as usize] = kind;
    }
}

pub fn plan(config: &WalkerConfig, rng: &mut WalkRng) -> TerrainPlan {
    let (length, width) = (config.terrain.length, config.terrain.width);
    let params = &config.generation;
    let mut plan = TerrainPlan {
        length,
        width,
        cells: vec![CellKind::Ground; length as usize * width as usize],
    };
    if length == 0 || width == 0 {
        return plan;
    }

    for y in 0..width {
        for x in 0..length {
            if rng.chance(params.hole_chance) {
                plan.set(x, y, CellKind::Hole);
            }
        }
    }

    let min_extent = params.platform_min_extent.max(1);
    let max_extent = params.platform_max_extent.max(min_extent);
    let mut stairs = Vec::new();
    for _ in 0..params.platform_count {
        let w = rng.range_u32(min_extent, max_extent + 1).min(length);
        let h = rng.range_u32(min_extent, max_extent + 1).min(width);
        let x0 = rng.range_u32(0, length - w + 1);
        let y0 = rng.range_u32(0, width - h + 1);
        for y in y0..y0 + h {
            for x in x0..x0 + w {
                plan.set(x, y, CellKind::Platform);
            }
        }
        if x0 > 0 {
            stairs.push((x0 - 1, y0 + h / 2));
        }
    }
    for (x, y) in stairs {
        if plan.kind(x, y) != CellKind::Platform {
            plan.set(x, y, CellKind::Stair);
        }
    }
    plan
}

/// Write `plan` into a new geometry and build its neighbor graph.
pub fn build_geometry(config: &WalkerConfig, plan: &TerrainPlan) -> Result<TerrainGeometry> {
    let params = &config.generation;
    let mut geometry = TerrainGeometry::from_config(&config.terrain)?;
    for y in 0..plan.width {
        for x in 0..plan.length {
            match plan.kind(x, y) {
                CellKind::Hole => {}
                CellKind::Ground => geometry.add_layers_world(x, y, 1, &[params.ground_height])?,
                CellKind::Stair => geometry.add_layers_world(x, y, 1, &[params.platform_ceiling])?,
                CellKind::Platform => geometry.add_layers_world(
                    x,
                    y,
                    2,
                    &[
                        params.ground_height,
                        params.platform_floor,
                        params.platform_ceiling,
                    ],
                )?,
            }
        }
    }
    geometry.build_neighbor_graph()?;
    log::debug!(
        "generated {}x{} terrain: {} platform, {} stair, {} hole cells",
        plan.length,
        plan.width,
        plan.count(CellKind::Platform),
        plan.count(CellKind::Stair),
        plan.count(CellKind::Hole)
    );
    Ok(geometry)
}

/// `plan` followed by `build_geometry`.
pub fn generate(config: &WalkerConfig, rng: &mut WalkRng) -> Result<TerrainGeometry> {
    let plan = plan(config, rng);
    build_geometry(config, &plan)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TerrainGenParams;
    use strata_terrain::{Direction, LayerRelation};

    fn config(generation: TerrainGenParams) -> WalkerConfig {
        WalkerConfig {
            generation,
            ..WalkerConfig::default()
        }
    }

    #[test]
    fn plan_is_deterministic() {
        let config = WalkerConfig::default();
        let a = plan(&config, &mut WalkRng::new(5));
        let b = plan(&config, &mut WalkRng::new(5));
        assert_eq!(a.cells, b.cells);
    }

    #[test]
    fn layer_counts_follow_cell_kind() {
        let config = WalkerConfig::default();
        let plan = plan(&config, &mut WalkRng::new(11));
        let geo = build_geometry(&config, &plan).unwrap();
        assert!(geo.is_graph_built());
        for y in 0..geo.width() {
            for x in 0..geo.length() {
                let expected = match plan.kind(x, y) {
                    CellKind::Hole => 0,
                    CellKind::Ground | CellKind::Stair => 1,
                    CellKind::Platform => 2,
                };
                assert_eq!(geo.column(x, y).unwrap().layer_count(), expected);
            }
        }
    }

    #[test]
    fn stairs_lead_up_onto_platforms() {
        let config = config(TerrainGenParams {
            hole_chance: 0.0,
            ..TerrainGenParams::default()
        });
        let plan = plan(&config, &mut WalkRng::new(3));
        let geo = build_geometry(&config, &plan).unwrap();

        let mut checked = 0;
        for y in 0..geo.width() {
            for x in 0..geo.length() {
                if plan.kind(x, y) != CellKind::Stair {
                    continue;
                }
                let stair = geo.column(x, y).unwrap();
                assert_eq!(
                    geo.relation_at(stair, 0, Direction::East),
                    LayerRelation::Above
                );
                checked += 1;
            }
        }
        assert_eq!(plan.count(CellKind::Hole), 0);
        assert!(checked > 0, "seed 3 should place at least one stair");
    }

    #[test]
    fn full_size_platform_leaves_no_room_for_stairs() {
        let config = WalkerConfig {
            terrain: strata_terrain::TerrainConfig {
                length: 6,
                width: 6,
                ..WalkerConfig::default().terrain
            },
            generation: TerrainGenParams {
                platform_count: 1,
                platform_min_extent: 6,
                platform_max_extent: 6,
                hole_chance: 0.0,
                ..TerrainGenParams::default()
            },
            ..WalkerConfig::default()
        };
        // Full-width platform: every cell is Platform, no room for a stair.
        let plan = plan(&config, &mut WalkRng::new(1));
        assert_eq!(plan.count(CellKind::Platform), 36);
        assert_eq!(plan.count(CellKind::Stair), 0);
    }

    #[test]
    fn all_holes_leave_only_platforms() {
        let config = config(TerrainGenParams {
            hole_chance: 1.0,
            platform_count: 0,
            ..TerrainGenParams::default()
        });
        let geo = generate(&config, &mut WalkRng::new(2)).unwrap();
        assert_eq!(geo.layer_slot_count(), 0);
    }
}
