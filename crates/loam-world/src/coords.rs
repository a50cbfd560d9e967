use loam_blocks::BlockId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Column of voxels `width` wide on x and z, addressed on the chunk grid.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ChunkCoord {
    pub cx: i32,
    pub cz: i32,
}

impl ChunkCoord {
    #[inline]
    pub const fn new(cx: i32, cz: i32) -> Self {
        Self { cx, cz }
    }

    #[inline]
    pub fn offset(self, dx: i32, dz: i32) -> Self {
        Self {
            cx: self.cx + dx,
            cz: self.cz + dz,
        }
    }

    #[inline]
    pub fn distance_sq(self, other: ChunkCoord) -> i64 {
        let dx = i64::from(self.cx - other.cx);
        let dz = i64::from(self.cz - other.cz);
        dx * dx + dz * dz
    }

    /// Largest per-axis distance; view squares are measured with this.
    #[inline]
    pub fn chebyshev(self, other: ChunkCoord) -> i32 {
        (self.cx - other.cx).abs().max((self.cz - other.cz).abs())
    }

    /// Owning chunk of a global voxel column (floor division).
    #[inline]
    pub fn containing(x: i32, z: i32, width: usize) -> Self {
        let w = width as i32;
        Self {
            cx: x.div_euclid(w),
            cz: z.div_euclid(w),
        }
    }

    /// Global x/z of local voxel (0, 0).
    #[inline]
    pub fn origin(self, width: usize) -> (i32, i32) {
        let w = width as i32;
        (self.cx * w, self.cz * w)
    }
}

impl From<(i32, i32)> for ChunkCoord {
    fn from(value: (i32, i32)) -> Self {
        Self::new(value.0, value.1)
    }
}

impl From<ChunkCoord> for (i32, i32) {
    fn from(value: ChunkCoord) -> Self {
        (value.cx, value.cz)
    }
}

impl std::fmt::Display for ChunkCoord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {})", self.cx, self.cz)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct VoxelPos {
    pub x: i32,
    pub y: i32,
    pub z: i32,
}

impl VoxelPos {
    #[inline]
    pub const fn new(x: i32, y: i32, z: i32) -> Self {
        Self { x, y, z }
    }

    #[inline]
    pub fn offset(self, dx: i32, dy: i32, dz: i32) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
            z: self.z + dz,
        }
    }

    #[inline]
    pub fn chunk(self, width: usize) -> ChunkCoord {
        ChunkCoord::containing(self.x, self.z, width)
    }

    /// Local x/z inside the owning chunk. `y` is passed through unchanged.
    #[inline]
    pub fn local_xz(self, width: usize) -> (usize, usize) {
        let w = width as i32;
        (self.x.rem_euclid(w) as usize, self.z.rem_euclid(w) as usize)
    }
}

impl From<(i32, i32, i32)> for VoxelPos {
    fn from(value: (i32, i32, i32)) -> Self {
        Self::new(value.0, value.1, value.2)
    }
}

impl std::fmt::Display for VoxelPos {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "({}, {}, {})", self.x, self.y, self.z)
    }
}

/// A single voxel write, in global coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VoxelEdit {
    pub pos: VoxelPos,
    pub id: BlockId,
}

impl VoxelEdit {
    #[inline]
    pub const fn new(pos: VoxelPos, id: BlockId) -> Self {
        Self { pos, id }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
#[error("voxel {0} lies outside the world")]
pub struct OutOfBounds(pub VoxelPos);

/// Sizing that no world can be built with.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum DimsError {
    #[error("`{0}` must be at least 1")]
    Zero(&'static str),
    #[error("world of {world_chunks} chunks of width {chunk_width} overflows voxel coordinates")]
    TooLarge {
        world_chunks: i32,
        chunk_width: usize,
    },
}

/// Fixed sizing of a world. Chunks are `chunk_width` square and
/// `chunk_height` tall; the world spans `world_chunks` chunks on x and z
/// starting at chunk (0, 0).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldDims {
    pub chunk_width: usize,
    pub chunk_height: usize,
    pub world_chunks: i32,
    pub atlas_tiles: u32,
}

impl Default for WorldDims {
    fn default() -> Self {
        Self {
            chunk_width: 16,
            chunk_height: 128,
            world_chunks: 100,
            atlas_tiles: 16,
        }
    }
}

impl WorldDims {
    /// Every extent must be at least 1, and the world must be addressable
    /// with `i32` voxel coordinates.
    pub fn validate(&self) -> Result<(), DimsError> {
        if self.chunk_width == 0 {
            return Err(DimsError::Zero("chunk_width"));
        }
        if self.chunk_height == 0 {
            return Err(DimsError::Zero("chunk_height"));
        }
        if self.world_chunks < 1 {
            return Err(DimsError::Zero("world_chunks"));
        }
        if self.atlas_tiles == 0 {
            return Err(DimsError::Zero("atlas_tiles"));
        }
        let width = i32::try_from(self.chunk_width).ok();
        let fits = width.and_then(|w| w.checked_mul(self.world_chunks)).is_some()
            && i32::try_from(self.chunk_height).is_ok();
        if !fits {
            return Err(DimsError::TooLarge {
                world_chunks: self.world_chunks,
                chunk_width: self.chunk_width,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn chunk_volume(&self) -> usize {
        self.chunk_width * self.chunk_height * self.chunk_width
    }

    #[inline]
    pub fn world_width_voxels(&self) -> i32 {
        self.world_chunks * self.chunk_width as i32
    }

    /// Centre column of the world, where new players spawn.
    #[inline]
    pub fn center_voxel(&self) -> i32 {
        self.world_width_voxels() / 2
    }

    #[inline]
    pub fn contains_chunk(&self, c: ChunkCoord) -> bool {
        (0..self.world_chunks).contains(&c.cx) && (0..self.world_chunks).contains(&c.cz)
    }

    #[inline]
    pub fn contains_voxel(&self, p: VoxelPos) -> bool {
        let w = self.world_width_voxels();
        (0..w).contains(&p.x)
            && (0..w).contains(&p.z)
            && (0..self.chunk_height as i32).contains(&p.y)
    }

    #[inline]
    pub fn check(&self, p: VoxelPos) -> Result<VoxelPos, OutOfBounds> {
        if self.contains_voxel(p) {
            Ok(p)
        } else {
            Err(OutOfBounds(p))
        }
    }
}
