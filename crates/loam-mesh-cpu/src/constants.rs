/// Unit cube corners.
pub const VOXEL_VERTS: [[f32; 3]; 8] = [
    [0.0, 0.0, 0.0],
    [1.0, 0.0, 0.0],
    [1.0, 1.0, 0.0],
    [0.0, 1.0, 0.0],
    [0.0, 0.0, 1.0],
    [1.0, 0.0, 1.0],
    [1.0, 1.0, 1.0],
    [0.0, 1.0, 1.0],
];

/// Corner indices of each face quad, in [`crate::Face`] order. Corners are
/// laid out so that triangles (0,1,2) and (2,1,3) wind outward.
pub const VOXEL_TRIS: [[usize; 4]; 6] = [
    [0, 3, 1, 2],
    [5, 6, 4, 7],
    [3, 7, 2, 6],
    [1, 5, 0, 4],
    [4, 7, 0, 3],
    [1, 2, 5, 6],
];

/// Triangle order within a quad.
pub const QUAD_INDICES: [u32; 6] = [0, 1, 2, 2, 1, 3];
