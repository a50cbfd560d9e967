use loam_blocks::BlockRegistry;
use loam_chunk::{ChunkVoxels, Voxel};
use loam_mesh_cpu::{atlas_uvs, build_chunk_mesh};
use loam_world::{ChunkCoord, VoxelPos};
use proptest::prelude::*;

const W: usize = 4;
const H: usize = 6;

fn ids() -> impl Strategy<Value = Vec<u8>> {
    prop::collection::vec(prop::sample::select(vec![0u8, 0, 2, 3, 10, 11]), W * H * W)
}

fn open_sky(_: VoxelPos) -> Option<Voxel> {
    Some(Voxel::AIR_LIT)
}

/// Faces the mesher should emit, counted directly and routed on the
/// neighbour's see-through test.
fn expected_faces(c: &ChunkVoxels, reg: &BlockRegistry) -> (usize, usize) {
    let opaque = 0;
    let mut transparent = 0;
    for y in 0..H { for z in 0..W { for x in 0..W {
        if !reg.is_solid(c.id_local(x, y, z)) { continue; }
        for (dx, dy, dz) in [(0i32, 0i32, -1i32), (0, 0, 1), (0, 1, 0), (0, -1, 0), (-1, 0, 0), (1, 0, 0)] {
            let (nx, ny, nz) = (x as i32 + dx, y as i32 + dy, z as i32 + dz);
            if ny < 0 { continue; }
            let nid = if c.in_local(nx, ny, nz) { c.id_local(nx as usize, ny as usize, nz as usize) } else { 0 };
            if reg.renders_neighbor_faces(nid) {
                transparent += 1;
            }
        }
    }}}
    (opaque, transparent)
}

proptest! {
    // Index lists reference only emitted vertices and add up to one quad per face.
    #[test]
    fn index_lists_are_consistent(ids in ids()) {
        let reg = BlockRegistry::builtin().unwrap();
        let n = W * H * W;
        let c = ChunkVoxels::from_parts(ChunkCoord::new(2, 3), W, H, ids, vec![0.5; n]);
        let m = build_chunk_mesh(&c, &reg, &open_sky, 16);
        let verts = m.vertex_count() as u32;
        prop_assert_eq!(m.normals.len(), m.positions.len());
        prop_assert_eq!(m.uvs.len(), m.vertex_count() * 2);
        prop_assert_eq!(m.light.len(), m.vertex_count());
        prop_assert!(m.opaque.iter().chain(m.transparent.iter()).all(|&i| i < verts));
        prop_assert_eq!((m.opaque.len() + m.transparent.len()) / 6, m.quad_count());
        let (o, t) = expected_faces(&c, &reg);
        prop_assert_eq!(m.opaque.len() / 6, o);
        prop_assert_eq!(m.transparent.len() / 6, t);
    }

    // UV corners always land inside the atlas and span exactly one tile.
    #[test]
    fn atlas_uvs_stay_in_unit_square(tex in 0u16..256, tiles in 1u32..32) {
        let uv = atlas_uvs(tex, tiles);
        let n = 1.0 / tiles as f32;
        prop_assert!((uv[3][0] - uv[0][0] - n).abs() < 1e-5);
        prop_assert!((uv[3][1] - uv[0][1] - n).abs() < 1e-5);
        if u32::from(tex) < tiles * tiles {
            for c in uv {
                prop_assert!(c[0] >= -1e-5 && c[0] <= 1.0 + 1e-5);
                prop_assert!(c[1] >= -1e-5 && c[1] <= 1.0 + 1e-5);
            }
        }
    }
}
