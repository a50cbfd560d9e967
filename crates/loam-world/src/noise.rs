use fastnoise_lite::{FastNoiseLite, NoiseType};

use crate::coords::VoxelPos;

/// Seeded Perlin noise remapped to `[0, 1]`.
///
/// 2D samples are taken in chunk units (`(x + 0.1) / width * scale + offset`)
/// so that scales read the same for any chunk width. The `0.1` nudge keeps
/// integer positions off the lattice, where Perlin is always zero.
pub struct NoiseSource {
    perlin: FastNoiseLite,
    chunk_width: f32,
}

impl NoiseSource {
    pub fn new(seed: i32, chunk_width: usize) -> Self {
        let mut perlin = FastNoiseLite::with_seed(seed);
        perlin.set_noise_type(Some(NoiseType::Perlin));
        perlin.set_frequency(Some(1.0));
        Self {
            perlin,
            chunk_width: chunk_width.max(1) as f32,
        }
    }

    #[inline]
    pub fn noise2(&self, x: i32, z: i32, offset: f32, scale: f32) -> f32 {
        let sx = (x as f32 + 0.1) / self.chunk_width * scale + offset;
        let sz = (z as f32 + 0.1) / self.chunk_width * scale + offset;
        to_unit(self.perlin.get_noise_2d(sx, sz))
    }

    #[inline]
    pub fn noise3(&self, p: VoxelPos, offset: f32, scale: f32) -> f32 {
        let sx = (p.x as f32 + offset + 0.1) * scale;
        let sy = (p.y as f32 + offset + 0.1) * scale;
        let sz = (p.z as f32 + offset + 0.1) * scale;
        to_unit(self.perlin.get_noise_3d(sx, sy, sz))
    }

    #[inline]
    pub fn above3(&self, p: VoxelPos, offset: f32, scale: f32, threshold: f32) -> bool {
        self.noise3(p, offset, scale) > threshold
    }
}

impl std::fmt::Debug for NoiseSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NoiseSource")
            .field("chunk_width", &self.chunk_width)
            .finish_non_exhaustive()
    }
}

#[inline]
fn to_unit(n: f32) -> f32 {
    ((n + 1.0) * 0.5).clamp(0.0, 1.0)
}
