use loam_blocks::BlockId;
use loam_chunk::ChunkVoxels;
use loam_world::{ChunkCoord, VoxelEdit, VoxelPos, WorldDims};
use serde::{Deserialize, Serialize};

use crate::FORMAT_VERSION;

/// On-disk form of one chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct ChunkRecord {
    pub version: u32,
    pub cx: i32,
    pub cz: i32,
    pub width: u32,
    pub height: u32,
    pub ids: Vec<BlockId>,
    pub light: Vec<f32>,
}

impl ChunkRecord {
    pub fn from_chunk(c: &ChunkVoxels) -> Self {
        Self {
            version: FORMAT_VERSION,
            cx: c.coord.cx,
            cz: c.coord.cz,
            width: c.width as u32,
            height: c.height as u32,
            ids: c.ids.clone(),
            light: c.light.clone(),
        }
    }

    /// Checks the record against what the caller asked for and the world's
    /// sizing. Returns the reason on mismatch.
    pub fn validate(&self, coord: ChunkCoord, dims: &WorldDims) -> Result<(), String> {
        if self.version != FORMAT_VERSION {
            return Err(format!("unsupported chunk format version {}", self.version));
        }
        if (self.cx, self.cz) != (coord.cx, coord.cz) {
            return Err(format!(
                "record is for chunk ({}, {}), expected {coord}",
                self.cx, self.cz
            ));
        }
        if self.width as usize != dims.chunk_width || self.height as usize != dims.chunk_height {
            return Err(format!(
                "chunk is {}x{}, world expects {}x{}",
                self.width, self.height, dims.chunk_width, dims.chunk_height
            ));
        }
        let volume = dims.chunk_volume();
        if self.ids.len() != volume || self.light.len() != volume {
            return Err(format!(
                "expected {volume} voxels, found {} ids and {} light values",
                self.ids.len(),
                self.light.len()
            ));
        }
        if self.light.iter().any(|l| !(0.0..=1.0).contains(l)) {
            return Err("light value outside [0, 1]".into());
        }
        Ok(())
    }

    pub fn into_chunk(self, coord: ChunkCoord) -> ChunkVoxels {
        ChunkVoxels::from_parts(
            coord,
            self.width as usize,
            self.height as usize,
            self.ids,
            self.light,
        )
    }
}

/// Structure edits parked on chunks that have not been populated yet.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub(crate) struct PendingRecord {
    pub version: u32,
    pub chunks: Vec<PendingChunk>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub(crate) struct PendingChunk {
    pub cx: i32,
    pub cz: i32,
    pub edits: Vec<(i32, i32, i32, BlockId)>,
}

impl PendingRecord {
    pub fn from_parked(parked: &[(ChunkCoord, Vec<VoxelEdit>)]) -> Self {
        Self {
            version: FORMAT_VERSION,
            chunks: parked
                .iter()
                .map(|(coord, edits)| PendingChunk {
                    cx: coord.cx,
                    cz: coord.cz,
                    edits: edits
                        .iter()
                        .map(|e| (e.pos.x, e.pos.y, e.pos.z, e.id))
                        .collect(),
                })
                .collect(),
        }
    }

    pub fn into_parked(self) -> Vec<(ChunkCoord, Vec<VoxelEdit>)> {
        self.chunks
            .into_iter()
            .map(|c| {
                let edits = c
                    .edits
                    .into_iter()
                    .map(|(x, y, z, id)| VoxelEdit::new(VoxelPos::new(x, y, z), id))
                    .collect();
                (ChunkCoord::new(c.cx, c.cz), edits)
            })
            .collect()
    }
}
