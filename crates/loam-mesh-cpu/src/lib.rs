//! CPU face-culling mesher producing an opaque and a transparent submesh.
#![forbid(unsafe_code)]

use loam_blocks::BlockRegistry;
use loam_chunk::{ChunkVoxels, Voxel};
use loam_world::{ChunkCoord, VoxelPos};

mod constants;
mod face;

pub use constants::{QUAD_INDICES, VOXEL_TRIS, VOXEL_VERTS};
pub use face::Face;

/// Resolves voxels outside the chunk being meshed. `None` means there is
/// nothing to draw against (outside the world), which culls the face.
pub trait VoxelLookup {
    fn voxel_at(&self, p: VoxelPos) -> Option<Voxel>;
}

impl<F> VoxelLookup for F
where
    F: Fn(VoxelPos) -> Option<Voxel>,
{
    #[inline]
    fn voxel_at(&self, p: VoxelPos) -> Option<Voxel> {
        self(p)
    }
}

/// Mesh for one chunk in chunk-local space. One shared vertex stream with
/// two index lists, meant for a two-material draw.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MeshPayload {
    pub coord: ChunkCoord,
    pub positions: Vec<f32>,
    pub normals: Vec<f32>,
    pub uvs: Vec<f32>,
    pub light: Vec<f32>,
    pub opaque: Vec<u32>,
    pub transparent: Vec<u32>,
}

impl MeshPayload {
    pub fn new(coord: ChunkCoord) -> Self {
        Self {
            coord,
            ..Default::default()
        }
    }

    #[inline]
    pub fn vertex_count(&self) -> usize {
        self.positions.len() / 3
    }

    #[inline]
    pub fn quad_count(&self) -> usize {
        self.vertex_count() / 4
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    /// Appends one face of the voxel at local `(x, y, z)`.
    pub fn add_face(
        &mut self,
        origin: [f32; 3],
        face: Face,
        uv: [[f32; 2]; 4],
        light: f32,
        transparent: bool,
    ) {
        let base = self.vertex_count() as u32;
        let n = face.normal();
        for (corner, uv) in VOXEL_TRIS[face.index()].iter().zip(uv.iter()) {
            let v = VOXEL_VERTS[*corner];
            self.positions
                .extend_from_slice(&[origin[0] + v[0], origin[1] + v[1], origin[2] + v[2]]);
            self.normals.extend_from_slice(&n);
            self.uvs.extend_from_slice(uv);
            self.light.push(light);
        }
        let list = if transparent {
            &mut self.transparent
        } else {
            &mut self.opaque
        };
        list.extend(QUAD_INDICES.iter().map(|i| base + i));
    }
}

/// Atlas corners for tile `texture` in an `atlas_tiles` square atlas.
/// Tiles are numbered row-major from the top-left; v is measured from the
/// bottom. Corner order matches [`VOXEL_TRIS`].
pub fn atlas_uvs(texture: u16, atlas_tiles: u32) -> [[f32; 2]; 4] {
    let tiles = atlas_tiles.max(1);
    let tex = u32::from(texture);
    let row = tex / tiles;
    let col = tex - row * tiles;
    let n = 1.0 / tiles as f32;
    let x = col as f32 * n;
    let y = 1.0 - row as f32 * n - n;
    [[x, y], [x, y + n], [x + n, y], [x + n, y + n]]
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct MeshStats {
    pub opaque_quads: usize,
    pub transparent_quads: usize,
}

/// Builds the mesh of a populated chunk.
///
/// A face of a solid voxel is emitted when the neighbour across it renders
/// neighbour faces. The quad takes the neighbour's light. Routing is keyed
/// on that same neighbour test, not on the solid voxel's own material, so
/// every emitted face lands in the transparent list and `opaque` stays
/// empty. Voxels above the chunk are open sky; other voxels outside the
/// chunk come from `lookup`.
pub fn build_chunk_mesh(
    chunk: &ChunkVoxels,
    reg: &BlockRegistry,
    lookup: &dyn VoxelLookup,
    atlas_tiles: u32,
) -> MeshPayload {
    let mut mesh = MeshPayload::new(chunk.coord);
    let (bx, bz) = chunk.coord.origin(chunk.width);
    let (w, h) = (chunk.width as i32, chunk.height as i32);
    for y in 0..chunk.height {
        for z in 0..chunk.width {
            for x in 0..chunk.width {
                let id = chunk.id_local(x, y, z);
                let ty = reg.ty(id);
                if !ty.solid {
                    continue;
                }
                let origin = [x as f32, y as f32, z as f32];
                for face in Face::ALL {
                    let (dx, dy, dz) = face.delta();
                    let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
                    let neighbor = if ny >= h {
                        Some(Voxel::AIR_LIT)
                    } else if ny < 0 {
                        None
                    } else if (0..w).contains(&nx) && (0..w).contains(&nz) {
                        Some(chunk.get_local(nx as usize, ny as usize, nz as usize))
                    } else {
                        lookup.voxel_at(VoxelPos::new(bx + nx, ny, bz + nz))
                    };
                    let Some(neighbor) = neighbor else {
                        continue;
                    };
                    let see_through = reg.ty(neighbor.id).render_neighbor_faces;
                    if !see_through {
                        continue;
                    }
                    let uv = atlas_uvs(ty.texture(face.index()), atlas_tiles);
                    mesh.add_face(origin, face, uv, neighbor.light, see_through);
                }
            }
        }
    }
    mesh
}

pub fn mesh_stats(mesh: &MeshPayload) -> MeshStats {
    MeshStats {
        opaque_quads: mesh.opaque.len() / 6,
        transparent_quads: mesh.transparent.len() / 6,
    }
}
