// CLI entry point for the walker driver.
//
// Builds a terrain (generated from the config, or imported from a binary
// terrain file), spawns agents, runs the tick loop and logs a summary.
// Logging goes through `env_logger`; set `RUST_LOG=info` for the summary
// and `RUST_LOG=debug` for per-tick counts.
//
// Usage:
//   walker [OPTIONS]
//     --config <PATH>     JSON WalkerConfig (default: built-in defaults)
//     --ticks <N>         Ticks to run (overrides config)
//     --seed <N>          RNG seed (overrides config)
//     --agents <N>        Agent count (overrides config)
//     --import <PATH>     Load terrain from a binary terrain file
//     --export <PATH>     Write the terrain to a binary terrain file

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::time::Instant;

use strata_terrain::TerrainGeometry;
use strata_walker::config::WalkerConfig;
use strata_walker::sim::WalkerSim;

#[derive(Default)]
struct Args {
    config: Option<String>,
    ticks: Option<u32>,
    seed: Option<u64>,
    agents: Option<u32>,
    import: Option<String>,
    export: Option<String>,
}

fn main() {
    env_logger::init();
    let args = parse_args();

    let mut config = match &args.config {
        Some(path) => load_config(path),
        None => WalkerConfig::default(),
    };
    if let Some(ticks) = args.ticks {
        config.ticks = ticks;
    }
    if let Some(seed) = args.seed {
        config.seed = seed;
    }
    if let Some(agents) = args.agents {
        config.agent_count = agents;
    }
    let ticks = config.ticks;

    let sim = match &args.import {
        Some(path) => import_terrain(path, &config)
            .and_then(|geometry| WalkerSim::with_geometry(config, geometry)),
        None => WalkerSim::new(config),
    };
    let mut sim = sim.unwrap_or_else(|e| fail(&format!("Failed to set up terrain: {e}")));

    if let Some(path) = &args.export {
        let file = File::create(path)
            .unwrap_or_else(|e| fail(&format!("Failed to create {path}: {e}")));
        if let Err(e) = sim.geometry().export(&mut BufWriter::new(file)) {
            fail(&format!("Failed to export terrain to {path}: {e}"));
        }
        log::info!("terrain written to {path}");
    }

    let geometry = sim.geometry();
    log::info!(
        "{}x{} terrain, {} layer slots, {} agents, {} ticks",
        geometry.length(),
        geometry.width(),
        geometry.layer_slot_count(),
        sim.agents().len(),
        ticks
    );

    let start = Instant::now();
    let stats = sim
        .run(ticks)
        .unwrap_or_else(|e| fail(&format!("Tick loop failed: {e}")));
    let elapsed = start.elapsed();

    log::info!(
        "{} steps in {:.2?}: {} moved, {} teleported, {} unknown, {} blocked, {} off terrain",
        stats.total(),
        elapsed,
        stats.moved,
        stats.teleported,
        stats.unknown,
        stats.blocked,
        stats.off_terrain
    );
    println!(
        "walked {} agents for {} ticks: {} moves committed, {} rejected",
        sim.agents().len(),
        sim.tick(),
        stats.moved + stats.teleported,
        stats.rejected()
    );
}

fn load_config(path: &str) -> WalkerConfig {
    let json = std::fs::read_to_string(path)
        .unwrap_or_else(|e| fail(&format!("Failed to read config {path}: {e}")));
    WalkerConfig::from_json(&json)
        .unwrap_or_else(|e| fail(&format!("Failed to parse config {path}: {e}")))
}

fn import_terrain(path: &str, config: &WalkerConfig) -> strata_terrain::Result<TerrainGeometry> {
    let file = File::open(path)?;
    let geometry = TerrainGeometry::import(&mut BufReader::new(file), config.terrain.scale)?;
    log::info!("terrain loaded from {path}");
    Ok(geometry)
}

fn fail(message: &str) -> ! {
    eprintln!("{message}");
    std::process::exit(1);
}

/// Parse command-line arguments. Plain `std::env::args()` matching, no
/// clap dependency.
fn parse_args() -> Args {
    let mut parsed = Args::default();
    let args: Vec<String> = std::env::args().collect();
    let mut i = 1;

    while i < args.len() {
        let flag = args[i].as_str();
        match flag {
            "--config" | "--import" | "--export" => {
                i += 1;
                let value = args
                    .get(i)
                    .cloned()
                    .unwrap_or_else(|| fail(&format!("{flag} requires a path")));
                match flag {
                    "--config" => parsed.config = Some(value),
                    "--import" => parsed.import = Some(value),
                    _ => parsed.export = Some(value),
                }
            }
            "--ticks" => {
                i += 1;
                parsed.ticks = Some(parse_number(&args, i, flag));
            }
            "--seed" => {
                i += 1;
                parsed.seed = Some(parse_number(&args, i, flag));
            }
            "--agents" => {
                i += 1;
                parsed.agents = Some(parse_number(&args, i, flag));
            }
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            other => {
                eprintln!("Unknown argument: {other}");
                print_usage();
                std::process::exit(1);
            }
        }
        i += 1;
    }

    parsed
}

fn parse_number<T: std::str::FromStr>(args: &[String], i: usize, flag: &str) -> T {
    args.get(i)
        .and_then(|s| s.parse().ok())
        .unwrap_or_else(|| fail(&format!("{flag} requires a valid number")))
}

fn print_usage() {
    println!("Usage: walker [OPTIONS]");
    println!();
    println!("Options:");
    println!("  --config <PATH>     JSON WalkerConfig (default: built-in defaults)");
    println!("  --ticks <N>         Ticks to run (overrides config)");
    println!("  --seed <N>          RNG seed (overrides config)");
    println!("  --agents <N>        Agent count (overrides config)");
    println!("  --import <PATH>     Load terrain from a binary terrain file");
    println!("  --export <PATH>     Write the terrain to a binary terrain file");
    println!("  --help, -h          Show this help");
}
