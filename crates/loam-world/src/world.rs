use std::sync::Arc;

use crate::coords::WorldDims;
use crate::noise::NoiseSource;
use crate::worldgen::WorldGenParams;

/// Immutable generation context shared by every chunk of one world.
pub struct World {
    pub dims: WorldDims,
    pub seed: i32,
    params: Arc<WorldGenParams>,
    noise: NoiseSource,
}

impl World {
    pub fn new(dims: WorldDims, seed: i32, params: WorldGenParams) -> Self {
        Self {
            dims,
            seed,
            params: Arc::new(params),
            noise: NoiseSource::new(seed, dims.chunk_width),
        }
    }

    #[inline]
    pub fn params(&self) -> &WorldGenParams {
        &self.params
    }

    #[inline]
    pub fn noise(&self) -> &NoiseSource {
        &self.noise
    }
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("dims", &self.dims)
            .field("seed", &self.seed)
            .field("biomes", &self.params.biomes.len())
            .finish()
    }
}
