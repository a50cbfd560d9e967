use std::fs;
use std::path::{Path, PathBuf};

use loam_world::{DimsError, WorldDims};
use serde::Deserialize;
use thiserror::Error;

use loam_lighting::DEFAULT_FALLOFF;

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed settings: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("evict distance {evict} must not be below view distance {view}")]
    EvictInsideView { view: i32, evict: i32 },
    #[error("invalid world dimensions: {0}")]
    Dims(#[from] DimsError),
}

/// Raw `settings.toml`.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct SettingsConfig {
    #[serde(default)]
    pub world: WorldSection,
    #[serde(default)]
    pub streaming: StreamingSection,
    #[serde(default)]
    pub lighting: LightingSection,
    #[serde(default)]
    pub dims: Option<WorldDims>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct WorldSection {
    #[serde(default = "default_world_name")]
    pub name: String,
    #[serde(default)]
    pub seed: i32,
    #[serde(default = "default_save_root")]
    pub save_root: PathBuf,
}
fn default_world_name() -> String {
    "world".into()
}
fn default_save_root() -> PathBuf {
    PathBuf::from("saves")
}
impl Default for WorldSection {
    fn default() -> Self {
        Self {
            name: default_world_name(),
            seed: 0,
            save_root: default_save_root(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct StreamingSection {
    #[serde(default = "default_view_distance")]
    pub view_distance: i32,
    #[serde(default)]
    pub evict_distance: Option<i32>,
    #[serde(default = "default_threading")]
    pub threading: bool,
}
fn default_view_distance() -> i32 {
    8
}
fn default_threading() -> bool {
    true
}
impl Default for StreamingSection {
    fn default() -> Self {
        Self {
            view_distance: default_view_distance(),
            evict_distance: None,
            threading: default_threading(),
        }
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct LightingSection {
    #[serde(default = "default_falloff")]
    pub falloff: f32,
}
fn default_falloff() -> f32 {
    DEFAULT_FALLOFF
}
impl Default for LightingSection {
    fn default() -> Self {
        Self {
            falloff: default_falloff(),
        }
    }
}

/// Resolved runtime settings.
#[derive(Clone, Debug, PartialEq)]
pub struct RuntimeSettings {
    pub world_name: String,
    pub seed: i32,
    pub save_root: PathBuf,
    /// Chebyshev radius, in chunks, of the active square around the viewer.
    pub view_distance: i32,
    /// Inactive chunks farther than this are flushed and dropped.
    pub evict_distance: i32,
    /// Run jobs on a background worker; when off, [`pump`] runs them.
    ///
    /// [`pump`]: crate::Orchestrator::pump
    pub threading: bool,
    pub light_falloff: f32,
    pub dims: WorldDims,
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self::from_config(SettingsConfig::default())
    }
}

impl RuntimeSettings {
    pub fn from_config(cfg: SettingsConfig) -> Self {
        let view_distance = cfg.streaming.view_distance.max(0);
        Self {
            world_name: cfg.world.name,
            seed: cfg.world.seed,
            save_root: cfg.world.save_root,
            view_distance,
            evict_distance: cfg
                .streaming
                .evict_distance
                .unwrap_or(view_distance + 2),
            threading: cfg.streaming.threading,
            light_falloff: cfg.lighting.falloff.clamp(0.0, 1.0),
            dims: cfg.dims.unwrap_or_default(),
        }
    }

    pub fn from_toml_str(text: &str) -> Result<Self, SettingsError> {
        let cfg: SettingsConfig = toml::from_str(text)?;
        let settings = Self::from_config(cfg);
        settings.validate()?;
        Ok(settings)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_toml_str(&text)?;
        log::info!(target: "runtime", "loaded settings from {}", path.display());
        Ok(settings)
    }

    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.evict_distance < self.view_distance {
            return Err(SettingsError::EvictInsideView {
                view: self.view_distance,
                evict: self.evict_distance,
            });
        }
        self.dims.validate()?;
        Ok(())
    }
}
