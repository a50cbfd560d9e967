use std::fs;
use std::path::{Path, PathBuf};

use loam_blocks::{BlockId, BlockRegistry};
use serde::Deserialize;
use thiserror::Error;

const BUILTIN_WORLDGEN: &str = include_str!("../../../assets/worldgen.toml");

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read worldgen config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed worldgen config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("worldgen config names unknown block `{0}`")]
    UnknownBlock(String),
    #[error("worldgen config defines no biomes")]
    NoBiomes,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorldGenConfig {
    #[serde(default = "default_solid_ground_height")]
    pub solid_ground_height: i32,
    #[serde(default = "default_bedrock")]
    pub bedrock: String,
    #[serde(default = "default_stone")]
    pub stone: String,
    #[serde(default)]
    pub flora: FloraBlocks,
    #[serde(default)]
    pub biomes: Vec<Biome>,
}

fn default_solid_ground_height() -> i32 {
    42
}
fn default_bedrock() -> String {
    "bedrock".into()
}
fn default_stone() -> String {
    "stone".into()
}

impl Default for WorldGenConfig {
    fn default() -> Self {
        Self {
            solid_ground_height: default_solid_ground_height(),
            bedrock: default_bedrock(),
            stone: default_stone(),
            flora: FloraBlocks::default(),
            biomes: Vec::new(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct FloraBlocks {
    #[serde(default = "default_log")]
    pub log: String,
    #[serde(default = "default_leaves")]
    pub leaves: String,
    #[serde(default = "default_cactus")]
    pub cactus: String,
    #[serde(default = "default_cactus_top")]
    pub cactus_top: String,
}
fn default_log() -> String {
    "oak_log".into()
}
fn default_leaves() -> String {
    "leaves".into()
}
fn default_cactus() -> String {
    "cactus".into()
}
fn default_cactus_top() -> String {
    "cactus_top".into()
}
impl Default for FloraBlocks {
    fn default() -> Self {
        Self {
            log: default_log(),
            leaves: default_leaves(),
            cactus: default_cactus(),
            cactus_top: default_cactus_top(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Biome {
    pub name: String,
    #[serde(default)]
    pub offset: f32,
    #[serde(default = "default_biome_scale")]
    pub scale: f32,
    #[serde(default = "default_terrain_height")]
    pub terrain_height: f32,
    #[serde(default = "default_terrain_scale")]
    pub terrain_scale: f32,
    pub surface: String,
    pub sub_surface: String,
    #[serde(default)]
    pub big_flora: BigFlora,
    #[serde(default)]
    pub lodes: Vec<Lode>,
}
fn default_biome_scale() -> f32 {
    0.1
}
fn default_terrain_height() -> f32 {
    10.0
}
fn default_terrain_scale() -> f32 {
    0.25
}

#[derive(Clone, Debug, Deserialize)]
pub struct BigFlora {
    #[serde(default = "default_place")]
    pub place: bool,
    #[serde(default)]
    pub kind: u8,
    #[serde(default = "default_zone_scale")]
    pub zone_scale: f32,
    #[serde(default = "default_zone_threshold")]
    pub zone_threshold: f32,
    #[serde(default = "default_placement_scale")]
    pub placement_scale: f32,
    #[serde(default = "default_placement_threshold")]
    pub placement_threshold: f32,
    #[serde(default = "default_min_height")]
    pub min_height: i32,
    #[serde(default = "default_max_height")]
    pub max_height: i32,
}
fn default_place() -> bool {
    true
}
fn default_zone_scale() -> f32 {
    1.3
}
fn default_zone_threshold() -> f32 {
    0.6
}
fn default_placement_scale() -> f32 {
    15.0
}
fn default_placement_threshold() -> f32 {
    0.8
}
fn default_min_height() -> i32 {
    5
}
fn default_max_height() -> i32 {
    12
}
impl Default for BigFlora {
    fn default() -> Self {
        Self {
            place: default_place(),
            kind: 0,
            zone_scale: default_zone_scale(),
            zone_threshold: default_zone_threshold(),
            placement_scale: default_placement_scale(),
            placement_threshold: default_placement_threshold(),
            min_height: default_min_height(),
            max_height: default_max_height(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct Lode {
    pub name: String,
    pub block: String,
    pub min_height: i32,
    pub max_height: i32,
    #[serde(default = "default_lode_scale")]
    pub scale: f32,
    #[serde(default = "default_lode_threshold")]
    pub threshold: f32,
    #[serde(default)]
    pub noise_offset: f32,
}
fn default_lode_scale() -> f32 {
    0.1
}
fn default_lode_threshold() -> f32 {
    0.5
}

/// Block ids used by the structure generator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloraPalette {
    pub log: BlockId,
    pub leaves: BlockId,
    pub cactus: BlockId,
    pub cactus_top: BlockId,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FloraRule {
    pub kind: u8,
    pub zone_scale: f32,
    pub zone_threshold: f32,
    pub placement_scale: f32,
    pub placement_threshold: f32,
    pub min_height: i32,
    pub max_height: i32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct LodeDef {
    pub name: String,
    pub block: BlockId,
    pub min_height: i32,
    pub max_height: i32,
    pub scale: f32,
    pub threshold: f32,
    pub noise_offset: f32,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BiomeDef {
    pub name: String,
    pub offset: f32,
    pub scale: f32,
    pub terrain_height: f32,
    pub terrain_scale: f32,
    pub surface: BlockId,
    pub sub_surface: BlockId,
    pub big_flora: Option<FloraRule>,
    pub lodes: Vec<LodeDef>,
}

/// Worldgen tables with every block name resolved against the catalog.
#[derive(Clone, Debug, PartialEq)]
pub struct WorldGenParams {
    pub solid_ground_height: i32,
    pub bedrock: BlockId,
    pub stone: BlockId,
    pub flora: FloraPalette,
    pub biomes: Vec<BiomeDef>,
}

impl WorldGenParams {
    pub fn from_config(cfg: &WorldGenConfig, reg: &BlockRegistry) -> Result<Self, ConfigError> {
        if cfg.biomes.is_empty() {
            return Err(ConfigError::NoBiomes);
        }
        let resolve = |name: &str| {
            reg.id_by_name(name)
                .ok_or_else(|| ConfigError::UnknownBlock(name.to_string()))
        };
        let flora = FloraPalette {
            log: resolve(&cfg.flora.log)?,
            leaves: resolve(&cfg.flora.leaves)?,
            cactus: resolve(&cfg.flora.cactus)?,
            cactus_top: resolve(&cfg.flora.cactus_top)?,
        };
        let mut biomes = Vec::with_capacity(cfg.biomes.len());
        for b in cfg.biomes.iter() {
            let lodes = b
                .lodes
                .iter()
                .map(|l| {
                    Ok(LodeDef {
                        name: l.name.clone(),
                        block: resolve(&l.block)?,
                        min_height: l.min_height,
                        max_height: l.max_height,
                        scale: l.scale,
                        threshold: l.threshold,
                        noise_offset: l.noise_offset,
                    })
                })
                .collect::<Result<Vec<_>, ConfigError>>()?;
            let big_flora = b.big_flora.place.then(|| FloraRule {
                kind: b.big_flora.kind,
                zone_scale: b.big_flora.zone_scale,
                zone_threshold: b.big_flora.zone_threshold,
                placement_scale: b.big_flora.placement_scale,
                placement_threshold: b.big_flora.placement_threshold,
                min_height: b.big_flora.min_height,
                max_height: b.big_flora.max_height.max(b.big_flora.min_height),
            });
            biomes.push(BiomeDef {
                name: b.name.clone(),
                offset: b.offset,
                scale: b.scale,
                terrain_height: b.terrain_height,
                terrain_scale: b.terrain_scale,
                surface: resolve(&b.surface)?,
                sub_surface: resolve(&b.sub_surface)?,
                big_flora,
                lodes,
            });
        }
        Ok(Self {
            solid_ground_height: cfg.solid_ground_height,
            bedrock: resolve(&cfg.bedrock)?,
            stone: resolve(&cfg.stone)?,
            flora,
            biomes,
        })
    }

    /// The biome table shipped in `assets/worldgen.toml`.
    pub fn builtin(reg: &BlockRegistry) -> Result<Self, ConfigError> {
        let cfg: WorldGenConfig = toml::from_str(BUILTIN_WORLDGEN)?;
        Self::from_config(&cfg, reg)
    }
}

pub fn load_params_from_path(
    path: &Path,
    reg: &BlockRegistry,
) -> Result<WorldGenParams, ConfigError> {
    let s = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let cfg: WorldGenConfig = toml::from_str(&s)?;
    let params = WorldGenParams::from_config(&cfg, reg)?;
    log::info!(
        target: "worldgen",
        "loaded {} biome(s) from {}",
        params.biomes.len(),
        path.display()
    );
    Ok(params)
}
