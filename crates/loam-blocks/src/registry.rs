use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

use thiserror::Error;

use super::config::BlocksConfig;
use super::types::{AIR, BlockId, BlockType, FACE_COUNT};

const BUILTIN_BLOCKS: &str = include_str!("../../../assets/blocks.toml");

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("failed to read block table {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed block table: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("block `{name}` has id {id}, ids must fit in 0..=255")]
    IdOutOfRange { name: String, id: u16 },
    #[error("block id {id} is claimed by both `{first}` and `{second}`")]
    DuplicateId {
        id: BlockId,
        first: String,
        second: String,
    },
    #[error("block name `{0}` is defined twice")]
    DuplicateName(String),
    #[error("id 0 must be a non-solid air block, found `{0}`")]
    BadAirSlot(String),
}

/// Static catalog of block types indexed by voxel id.
///
/// Lookups never fail: ids without an entry behave as air, so stale or
/// corrupted voxel data degrades to empty space instead of panicking.
#[derive(Clone, Debug)]
pub struct BlockRegistry {
    blocks: Vec<Option<BlockType>>,
    by_name: HashMap<String, BlockId>,
    air: BlockType,
}

impl Default for BlockRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl BlockRegistry {
    /// A registry holding only air.
    pub fn new() -> Self {
        let air = BlockType::air();
        let mut by_name = HashMap::new();
        by_name.insert(air.name.clone(), AIR);
        Self {
            blocks: vec![Some(air.clone())],
            by_name,
            air,
        }
    }

    /// The catalog shipped in `assets/blocks.toml`.
    pub fn builtin() -> Result<Self, RegistryError> {
        Self::from_toml_str(BUILTIN_BLOCKS)
    }

    pub fn load_from_path(path: impl AsRef<Path>) -> Result<Self, RegistryError> {
        let path = path.as_ref();
        let text = fs::read_to_string(path).map_err(|source| RegistryError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    pub fn from_toml_str(text: &str) -> Result<Self, RegistryError> {
        let cfg: BlocksConfig = toml::from_str(text)?;
        Self::from_config(cfg)
    }

    pub fn from_config(cfg: BlocksConfig) -> Result<Self, RegistryError> {
        let mut reg = BlockRegistry::new();
        // Air is implicit; an explicit entry may redefine it but not replace it.
        let mut explicit_air = false;
        let mut next_id: u16 = 1;
        for def in cfg.blocks.into_iter() {
            let id = def.id.unwrap_or(next_id);
            if id > u16::from(BlockId::MAX) {
                return Err(RegistryError::IdOutOfRange { name: def.name, id });
            }
            let id = id as BlockId;
            next_id = u16::from(id) + 1;
            let solid = def.solid.unwrap_or(true);
            if id == AIR && (solid || def.name != "air") {
                return Err(RegistryError::BadAirSlot(def.name));
            }
            let ty = BlockType {
                id,
                solid,
                render_neighbor_faces: def.render_neighbor_faces.unwrap_or(!solid),
                transparent: def.transparent.unwrap_or(false),
                transparency: def
                    .transparency
                    .unwrap_or(if solid { 0.0 } else { 1.0 })
                    .clamp(0.0, 1.0),
                textures: def
                    .textures
                    .as_ref()
                    .map(|t| t.expand())
                    .unwrap_or([0; FACE_COUNT]),
                name: def.name,
            };
            if id == AIR {
                if explicit_air {
                    return Err(RegistryError::DuplicateName(ty.name));
                }
                explicit_air = true;
                reg.air = ty.clone();
                reg.blocks[0] = Some(ty);
                continue;
            }
            reg.insert(ty)?;
        }
        Ok(reg)
    }

    fn insert(&mut self, ty: BlockType) -> Result<(), RegistryError> {
        let slot = ty.id as usize;
        if self.blocks.len() <= slot {
            self.blocks.resize(slot + 1, None);
        }
        if let Some(existing) = &self.blocks[slot] {
            return Err(RegistryError::DuplicateId {
                id: ty.id,
                first: existing.name.clone(),
                second: ty.name,
            });
        }
        if self.by_name.contains_key(&ty.name) {
            return Err(RegistryError::DuplicateName(ty.name));
        }
        self.by_name.insert(ty.name.clone(), ty.id);
        self.blocks[slot] = Some(ty);
        Ok(())
    }

    #[inline]
    pub fn get(&self, id: BlockId) -> Option<&BlockType> {
        self.blocks.get(id as usize).and_then(|b| b.as_ref())
    }

    /// Block type for `id`, or air when the id is not registered.
    #[inline]
    pub fn ty(&self, id: BlockId) -> &BlockType {
        self.get(id).unwrap_or(&self.air)
    }

    pub fn id_by_name(&self, name: &str) -> Option<BlockId> {
        self.by_name.get(name).copied()
    }

    #[inline]
    pub fn is_solid(&self, id: BlockId) -> bool {
        self.ty(id).solid
    }

    #[inline]
    pub fn renders_neighbor_faces(&self, id: BlockId) -> bool {
        self.ty(id).render_neighbor_faces
    }

    #[inline]
    pub fn is_transparent(&self, id: BlockId) -> bool {
        self.ty(id).transparent
    }

    #[inline]
    pub fn transparency(&self, id: BlockId) -> f32 {
        self.ty(id).transparency
    }

    pub fn len(&self) -> usize {
        self.blocks.iter().filter(|b| b.is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = &BlockType> {
        self.blocks.iter().filter_map(|b| b.as_ref())
    }
}
