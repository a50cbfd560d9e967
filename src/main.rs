//! Headless driver: opens a world, streams chunks around a moving view,
//! applies one edit and saves.

mod cli;
mod driver;

use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use loam_blocks::BlockRegistry;
use loam_runtime::{Orchestrator, RuntimeSettings};
use loam_world::WorldGenParams;
use loam_world::worldgen::load_params_from_path;

use crate::cli::CliArgs;

const DEFAULT_SETTINGS: &str = "assets/settings.toml";

fn main() {
    let args = CliArgs::parse();
    init_logging(args.verbose);
    if let Err(e) = run(&args) {
        log::error!(target: "driver", "{e}");
        std::process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose {
        log::LevelFilter::Debug
    } else {
        log::LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter_level(default)
        .parse_env("RUST_LOG")
        .init();
}

fn run(args: &CliArgs) -> Result<(), Box<dyn Error>> {
    let mut settings = match &args.settings {
        Some(path) => RuntimeSettings::load_from_path(path)?,
        None if Path::new(DEFAULT_SETTINGS).exists() => {
            RuntimeSettings::load_from_path(DEFAULT_SETTINGS)?
        }
        None => RuntimeSettings::default(),
    };
    args.apply_overrides(&mut settings);
    settings.validate()?;

    let registry = Arc::new(match &args.blocks {
        Some(path) => BlockRegistry::load_from_path(path)?,
        None => BlockRegistry::builtin()?,
    });
    let params = Arc::new(match &args.worldgen {
        Some(path) => load_params_from_path(path, &registry)?,
        None => WorldGenParams::builtin(&registry)?,
    });
    let glass = registry
        .id_by_name("glass")
        .ok_or("block table has no `glass` entry")?;

    let mut world = Orchestrator::open(settings, registry, params)?;
    if let Some(name) = &args.load {
        world.request_load(name)?;
    }

    let summary = driver::drive(&mut world, args.steps, glass);
    println!("world      {} (seed {})", world.world_name(), world.seed());
    println!("steps      {}", summary.steps);
    println!(
        "meshes     {} ({} opaque, {} transparent quads)",
        summary.meshes, summary.opaque_quads, summary.transparent_quads
    );
    match summary.edit {
        Some(pos) => println!("edit       glass at {pos}"),
        None => println!("edit       none"),
    }
    println!(
        "saved      {} chunk(s), {} failed",
        summary.saved, summary.save_failures
    );
    world.shutdown();
    Ok(())
}
