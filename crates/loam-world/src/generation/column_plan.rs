use crate::coords::ChunkCoord;
use crate::world::World;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ColumnInfo {
    pub x: i32,
    pub z: i32,
    /// Surface y of the column.
    pub height: i32,
    /// Index of the strongest biome at this column.
    pub biome: usize,
}

/// Per-column terrain decisions for one chunk, computed once before the
/// voxel fill.
#[derive(Clone, Debug)]
pub struct ChunkColumnPlan {
    pub coord: ChunkCoord,
    pub columns: Vec<ColumnInfo>,
    pub width: usize,
}

impl ChunkColumnPlan {
    #[inline]
    pub fn index(&self, lx: usize, lz: usize) -> usize {
        lz * self.width + lx
    }

    #[inline]
    pub fn column(&self, lx: usize, lz: usize) -> &ColumnInfo {
        &self.columns[self.index(lx, lz)]
    }
}

pub fn build_chunk_column_plan(world: &World, coord: ChunkCoord) -> ChunkColumnPlan {
    let width = world.dims.chunk_width;
    let (base_x, base_z) = coord.origin(width);
    let mut columns = Vec::with_capacity(width * width);
    for lz in 0..width {
        let z = base_z + lz as i32;
        for lx in 0..width {
            columns.push(world.column(base_x + lx as i32, z));
        }
    }
    ChunkColumnPlan {
        coord,
        columns,
        width,
    }
}
