use std::path::PathBuf;

use clap::Parser;
use loam_runtime::RuntimeSettings;

/// Command-line arguments. Values given here override `settings.toml`.
#[derive(Parser, Debug, Default)]
#[command(name = "loam", about = "Headless driver for the loam voxel world")]
pub struct CliArgs {
    /// Runtime settings file (defaults to assets/settings.toml when present).
    #[arg(long)]
    pub settings: Option<PathBuf>,

    /// Block catalog; the built-in table is used when absent.
    #[arg(long)]
    pub blocks: Option<PathBuf>,

    /// Biome table; the built-in table is used when absent.
    #[arg(long)]
    pub worldgen: Option<PathBuf>,

    /// World to open or create.
    #[arg(long)]
    pub world: Option<String>,

    /// Seed for a newly created world.
    #[arg(long, allow_hyphen_values = true)]
    pub seed: Option<i32>,

    /// Directory holding saved worlds.
    #[arg(long)]
    pub save_root: Option<PathBuf>,

    /// View distance in chunks.
    #[arg(long)]
    pub view_distance: Option<i32>,

    /// Switch to this saved world after opening.
    #[arg(long)]
    pub load: Option<String>,

    /// Number of chunks to walk the view centre.
    #[arg(long, default_value_t = 4)]
    pub steps: u32,

    /// Run jobs on the main thread instead of the background worker.
    #[arg(long)]
    pub inline: bool,

    /// Debug-level logging unless RUST_LOG says otherwise.
    #[arg(short, long)]
    pub verbose: bool,
}

impl CliArgs {
    pub fn apply_overrides(&self, settings: &mut RuntimeSettings) {
        if let Some(name) = &self.world {
            settings.world_name = name.clone();
        }
        if let Some(seed) = self.seed {
            settings.seed = seed;
        }
        if let Some(root) = &self.save_root {
            settings.save_root = root.clone();
        }
        if let Some(vd) = self.view_distance {
            settings.view_distance = vd.max(0);
            settings.evict_distance = settings.evict_distance.max(settings.view_distance);
        }
        if self.inline {
            settings.threading = false;
        }
    }
}
