use std::sync::Arc;

use loam_blocks::{AIR, BlockRegistry};
use loam_chunk::Voxel;
use loam_io::PersistenceStore;
use loam_world::{VoxelPos, World, WorldDims};

/// Everything a job needs to generate, light, mesh and persist chunks of one
/// world. Shared by `Arc` between the main context, the worker and the save
/// thread; never global.
#[derive(Debug)]
pub struct WorldContext {
    pub world: World,
    pub registry: Arc<BlockRegistry>,
    pub persist: PersistenceStore,
    pub name: String,
    pub falloff: f32,
}

impl WorldContext {
    pub fn new(
        world: World,
        registry: Arc<BlockRegistry>,
        persist: PersistenceStore,
        name: impl Into<String>,
        falloff: f32,
    ) -> Self {
        Self {
            world,
            registry,
            persist,
            name: name.into(),
            falloff,
        }
    }

    #[inline]
    pub fn dims(&self) -> WorldDims {
        self.world.dims
    }

    /// What a voxel of a chunk that is not populated yet will look like:
    /// the terrain sample, fully lit when it is air and dark otherwise.
    pub fn procedural_voxel(&self, pos: VoxelPos) -> Voxel {
        let id = self.world.block_at(pos);
        Voxel {
            id,
            light: if id == AIR { 1.0 } else { 0.0 },
        }
    }
}
