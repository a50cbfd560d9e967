//! In-chunk skylight: column pass followed by a BFS spread.
#![forbid(unsafe_code)]

use std::collections::VecDeque;

use loam_blocks::{AIR, BlockRegistry};
use loam_chunk::ChunkVoxels;


/// Light lost per voxel step during the spread.
pub const DEFAULT_FALLOFF: f32 = 0.08;

const NEIGHBORS: [(i32, i32, i32); 6] = [
    (0, 0, -1),
    (0, 0, 1),
    (0, 1, 0),
    (0, -1, 0),
    (-1, 0, 0),
    (1, 0, 0),
];

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct LightStats {
    /// Voxels seeded by the column pass.
    pub seeds: usize,
    /// Voxels raised during the spread.
    pub raised: usize,
}

/// Recomputes every light value of `chunk` from scratch.
///
/// Phase one walks each column top-down with a ray that starts at full
/// light and is clamped by each non-air voxel's transparency. Phase two
/// spreads light to the six in-chunk neighbours, losing `falloff` per step,
/// until no neighbour sits more than `falloff` below its source. Light
/// never crosses the chunk boundary.
pub fn light_chunk(chunk: &mut ChunkVoxels, reg: &BlockRegistry, falloff: f32) -> LightStats {
    let falloff = falloff.max(0.0);
    let (w, h) = (chunk.width, chunk.height);
    let mut queue: VecDeque<(usize, usize, usize)> = VecDeque::new();
    let mut stats = LightStats::default();

    for z in 0..w {
        for x in 0..w {
            let mut ray = 1.0f32;
            for y in (0..h).rev() {
                let i = chunk.idx(x, y, z);
                let id = chunk.ids[i];
                if id != AIR {
                    let t = reg.transparency(id);
                    if t < ray {
                        ray = t;
                    }
                }
                chunk.light[i] = ray;
                if ray > falloff {
                    queue.push_back((x, y, z));
                    stats.seeds += 1;
                }
            }
        }
    }

    while let Some((x, y, z)) = queue.pop_front() {
        let src = chunk.light[chunk.idx(x, y, z)];
        let spread = src - falloff;
        for &(dx, dy, dz) in NEIGHBORS.iter() {
            let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
            if !chunk.in_local(nx, ny, nz) {
                continue;
            }
            let (nx, ny, nz) = (nx as usize, ny as usize, nz as usize);
            let ni = chunk.idx(nx, ny, nz);
            if chunk.light[ni] < spread {
                chunk.light[ni] = spread;
                stats.raised += 1;
                if spread > falloff {
                    queue.push_back((nx, ny, nz));
                }
            }
        }
    }
    stats
}
