//! Chunk voxel storage and procedural population.
#![forbid(unsafe_code)]

use loam_blocks::{AIR, BlockId};
use loam_world::generation::build_chunk_column_plan;
use loam_world::{ChunkCoord, VoxelEdit, VoxelPos, World};

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Voxel {
    pub id: BlockId,
    pub light: f32,
}

impl Voxel {
    pub const AIR_LIT: Voxel = Voxel { id: AIR, light: 1.0 };
}

/// Dense `width x height x width` voxel column. Ids and light are kept in
/// parallel arrays indexed by [`ChunkVoxels::idx`].
#[derive(Clone, Debug, PartialEq)]
pub struct ChunkVoxels {
    pub coord: ChunkCoord,
    pub width: usize,
    pub height: usize,
    pub ids: Vec<BlockId>,
    pub light: Vec<f32>,
    pub populated: bool,
    pub dirty: bool,
}

impl ChunkVoxels {
    /// An unpopulated chunk: all air, unlit.
    pub fn empty(coord: ChunkCoord, width: usize, height: usize) -> Self {
        let n = width * height * width;
        Self {
            coord,
            width,
            height,
            ids: vec![AIR; n],
            light: vec![0.0; n],
            populated: false,
            dirty: false,
        }
    }

    /// Rebuilds a populated chunk from stored arrays, padding or truncating
    /// them to the expected volume.
    pub fn from_parts(
        coord: ChunkCoord,
        width: usize,
        height: usize,
        ids: Vec<BlockId>,
        light: Vec<f32>,
    ) -> Self {
        let expect = width * height * width;
        let mut ids = ids;
        let mut light = light;
        if ids.len() != expect {
            ids.resize(expect, AIR);
        }
        if light.len() != expect {
            light.resize(expect, 0.0);
        }
        Self {
            coord,
            width,
            height,
            ids,
            light,
            populated: true,
            dirty: false,
        }
    }

    #[inline]
    pub fn volume(&self) -> usize {
        self.width * self.height * self.width
    }

    #[inline]
    pub fn idx(&self, x: usize, y: usize, z: usize) -> usize {
        (y * self.width + z) * self.width + x
    }

    #[inline]
    pub fn in_local(&self, x: i32, y: i32, z: i32) -> bool {
        let w = self.width as i32;
        (0..w).contains(&x) && (0..self.height as i32).contains(&y) && (0..w).contains(&z)
    }

    #[inline]
    pub fn id_local(&self, x: usize, y: usize, z: usize) -> BlockId {
        self.ids[self.idx(x, y, z)]
    }

    #[inline]
    pub fn light_local(&self, x: usize, y: usize, z: usize) -> f32 {
        self.light[self.idx(x, y, z)]
    }

    #[inline]
    pub fn get_local(&self, x: usize, y: usize, z: usize) -> Voxel {
        let i = self.idx(x, y, z);
        Voxel {
            id: self.ids[i],
            light: self.light[i],
        }
    }

    /// Local coordinates of a global position owned by this chunk.
    #[inline]
    pub fn local_of(&self, p: VoxelPos) -> Option<(usize, usize, usize)> {
        let (bx, bz) = self.coord.origin(self.width);
        let (lx, ly, lz) = (p.x - bx, p.y, p.z - bz);
        if self.in_local(lx, ly, lz) {
            Some((lx as usize, ly as usize, lz as usize))
        } else {
            None
        }
    }

    #[inline]
    pub fn contains_world(&self, p: VoxelPos) -> bool {
        self.local_of(p).is_some()
    }

    #[inline]
    pub fn get_world(&self, p: VoxelPos) -> Option<Voxel> {
        let (x, y, z) = self.local_of(p)?;
        Some(self.get_local(x, y, z))
    }

    /// Writes `id` at a global position. Returns `None` when the position is
    /// not owned by this chunk, otherwise whether the voxel changed. A change
    /// marks the chunk dirty.
    pub fn set_world(&mut self, p: VoxelPos, id: BlockId) -> Option<bool> {
        let (x, y, z) = self.local_of(p)?;
        let i = self.idx(x, y, z);
        if self.ids[i] == id {
            return Some(false);
        }
        self.ids[i] = id;
        self.dirty = true;
        Some(true)
    }

    #[inline]
    pub fn has_non_air(&self) -> bool {
        self.ids.iter().any(|&id| id != AIR)
    }
}

/// A freshly generated chunk plus the structure edits it spawned. Edits are
/// in emission order and may reach into neighbouring chunks.
#[derive(Clone, Debug)]
pub struct PopulateResult {
    pub chunk: ChunkVoxels,
    pub structures: Vec<Vec<VoxelEdit>>,
}

/// Fills a chunk from terrain noise. Chunks outside the world come back
/// populated with air.
pub fn populate_chunk(world: &World, coord: ChunkCoord) -> PopulateResult {
    let dims = world.dims;
    let (w, h) = (dims.chunk_width, dims.chunk_height);
    let mut chunk = ChunkVoxels::empty(coord, w, h);
    chunk.populated = true;
    let mut structures = Vec::new();
    if !dims.contains_chunk(coord) {
        return PopulateResult { chunk, structures };
    }
    let plan = build_chunk_column_plan(world, coord);
    let params = world.params();
    for lz in 0..w {
        for lx in 0..w {
            let col = plan.column(lx, lz);
            let top = col.height.clamp(0, h as i32 - 1) as usize;
            for y in 0..=top {
                let id = world.block_in_column(col, y as i32);
                let i = chunk.idx(lx, y, lz);
                chunk.ids[i] = id;
            }
            if (0..h as i32).contains(&col.height) {
                if let Some(site) = world.flora_in_column(col) {
                    let edits =
                        loam_structures::generate_site(&site, world.noise(), &params.flora);
                    if !edits.is_empty() {
                        structures.push(edits);
                    }
                }
            }
        }
    }
    PopulateResult { chunk, structures }
}

#[cfg(test)]
mod tests {
    use super::*;
    use loam_blocks::BlockRegistry;
    use loam_world::{WorldDims, WorldGenParams};

    fn world() -> World {
        let reg = BlockRegistry::builtin().unwrap();
        World::new(WorldDims::default(), 42, WorldGenParams::builtin(&reg).unwrap())
    }

    #[test]
    fn populate_is_deterministic() {
        let w = world();
        let a = populate_chunk(&w, ChunkCoord::new(10, 12));
        let b = populate_chunk(&w, ChunkCoord::new(10, 12));
        assert_eq!(a.chunk, b.chunk);
        assert_eq!(a.structures, b.structures);
        assert!(a.chunk.populated);
        assert!(!a.chunk.dirty);
    }

    #[test]
    fn populate_matches_point_samples() {
        let w = world();
        let coord = ChunkCoord::new(4, 9);
        let out = populate_chunk(&w, coord);
        let (bx, bz) = coord.origin(16);
        for &(lx, lz) in &[(0usize, 0usize), (15, 0), (7, 8), (15, 15)] {
            for y in 0..128usize {
                let p = VoxelPos::new(bx + lx as i32, y as i32, bz + lz as i32);
                assert_eq!(out.chunk.id_local(lx, y, lz), w.block_at(p), "at {p}");
            }
        }
    }

    #[test]
    fn set_world_marks_dirty_once() {
        let mut c = ChunkVoxels::from_parts(ChunkCoord::new(1, 0), 4, 4, vec![0; 64], vec![1.0; 64]);
        let p = VoxelPos::new(5, 2, 3);
        assert_eq!(c.set_world(p, 2), Some(true));
        assert!(c.dirty);
        c.dirty = false;
        assert_eq!(c.set_world(p, 2), Some(false));
        assert!(!c.dirty);
        assert_eq!(c.set_world(VoxelPos::new(3, 2, 3), 2), None);
    }

    #[test]
    fn chunks_outside_world_are_air() {
        let w = world();
        let out = populate_chunk(&w, ChunkCoord::new(-1, 0));
        assert!(out.chunk.populated);
        assert!(!out.chunk.has_non_air());
        assert!(out.structures.is_empty());
    }
}
