//! Procedural terrain: biome blending, strata, lodes and flora sites.

mod column_plan;

pub use column_plan::{ChunkColumnPlan, ColumnInfo, build_chunk_column_plan};

use loam_blocks::{AIR, BlockId};

use crate::coords::VoxelPos;
use crate::world::World;

/// Depth of the sub-surface layer below the surface voxel.
const SUB_SURFACE_DEPTH: i32 = 4;

/// A request to grow a structure with its base at `anchor`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FloraSite {
    pub kind: u8,
    pub anchor: VoxelPos,
    pub min_height: i32,
    pub max_height: i32,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TerrainSample {
    pub id: BlockId,
    pub flora: Option<FloraSite>,
}

impl World {
    /// Blends every biome's height contribution at one column.
    pub fn column(&self, x: i32, z: i32) -> ColumnInfo {
        let params = self.params();
        let noise = self.noise();
        let mut sum = 0.0f32;
        let mut count = 0u32;
        let mut strongest = 0usize;
        let mut strongest_weight = 0.0f32;
        for (i, biome) in params.biomes.iter().enumerate() {
            let weight = noise.noise2(x, z, biome.offset, biome.scale);
            if weight > strongest_weight {
                strongest_weight = weight;
                strongest = i;
            }
            let h = biome.terrain_height * noise.noise2(x, z, 0.0, biome.terrain_scale) * weight;
            if h > 0.0 {
                sum += h;
                count += 1;
            }
        }
        let mean = if count > 0 { sum / count as f32 } else { 0.0 };
        ColumnInfo {
            x,
            z,
            height: (mean + params.solid_ground_height as f32).floor() as i32,
            biome: strongest,
        }
    }

    /// Voxel id at height `y` of a planned column. Does not bounds-check.
    pub fn block_in_column(&self, col: &ColumnInfo, y: i32) -> BlockId {
        let params = self.params();
        if y == 0 {
            return params.bedrock;
        }
        let biome = params.biomes.get(col.biome);
        let h = col.height;
        let id = if y == h {
            biome.map_or(params.stone, |b| b.surface)
        } else if y < h && y > h - SUB_SURFACE_DEPTH {
            biome.map_or(params.stone, |b| b.sub_surface)
        } else if y > h {
            return AIR;
        } else {
            params.stone
        };
        if id != params.stone {
            return id;
        }
        let Some(biome) = biome else {
            return id;
        };
        let pos = VoxelPos::new(col.x, y, col.z);
        // Later lodes override earlier ones.
        let mut id = id;
        for lode in biome.lodes.iter() {
            if y > lode.min_height
                && y < lode.max_height
                && self
                    .noise()
                    .above3(pos, lode.noise_offset, lode.scale, lode.threshold)
            {
                id = lode.block;
            }
        }
        id
    }

    /// Structure request rooted on the surface voxel of `col`, if any.
    pub fn flora_in_column(&self, col: &ColumnInfo) -> Option<FloraSite> {
        let biome = self.params().biomes.get(col.biome)?;
        let rule = biome.big_flora.as_ref()?;
        let noise = self.noise();
        if noise.noise2(col.x, col.z, 0.0, rule.zone_scale) <= rule.zone_threshold {
            return None;
        }
        if noise.noise2(col.x, col.z, 0.0, rule.placement_scale) <= rule.placement_threshold {
            return None;
        }
        Some(FloraSite {
            kind: rule.kind,
            anchor: VoxelPos::new(col.x, col.height, col.z),
            min_height: rule.min_height,
            max_height: rule.max_height,
        })
    }

    /// Procedural sample at a global position. Positions outside the world
    /// are air and grow nothing.
    pub fn sample(&self, pos: VoxelPos) -> TerrainSample {
        if !self.dims.contains_voxel(pos) {
            return TerrainSample {
                id: AIR,
                flora: None,
            };
        }
        let col = self.column(pos.x, pos.z);
        let id = self.block_in_column(&col, pos.y);
        let flora = if pos.y == col.height {
            self.flora_in_column(&col)
        } else {
            None
        };
        TerrainSample { id, flora }
    }

    #[inline]
    pub fn block_at(&self, pos: VoxelPos) -> BlockId {
        self.sample(pos).id
    }
}
