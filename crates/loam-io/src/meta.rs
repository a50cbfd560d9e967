use loam_world::WorldDims;
use serde::{Deserialize, Serialize};

use crate::FORMAT_VERSION;

/// Contents of `world.toml`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WorldMeta {
    pub name: String,
    pub seed: i32,
    #[serde(default = "default_format_version")]
    pub format_version: u32,
    #[serde(default)]
    pub dims: WorldDims,
}

fn default_format_version() -> u32 {
    FORMAT_VERSION
}

impl WorldMeta {
    pub fn new(name: impl Into<String>, seed: i32, dims: WorldDims) -> Self {
        Self {
            name: name.into(),
            seed,
            format_version: FORMAT_VERSION,
            dims,
        }
    }
}
