/// Voxel id as stored in chunk arrays and on disk. `0` is always air.
pub type BlockId = u8;

pub const AIR: BlockId = 0;

/// Number of faces per voxel; texture tables are indexed in
/// back, front, top, bottom, left, right order.
pub const FACE_COUNT: usize = 6;

#[derive(Clone, Debug, PartialEq)]
pub struct BlockType {
    pub id: BlockId,
    pub name: String,
    /// Occupies space and produces faces.
    pub solid: bool,
    /// Faces of solid neighbours are drawn against this block.
    pub render_neighbor_faces: bool,
    /// See-through material such as glass or leaves.
    pub transparent: bool,
    /// Skylight passing down a column is clamped to this value.
    pub transparency: f32,
    pub textures: [u16; FACE_COUNT],
}

impl BlockType {
    pub fn air() -> Self {
        BlockType {
            id: AIR,
            name: "air".to_string(),
            solid: false,
            render_neighbor_faces: true,
            transparent: false,
            transparency: 1.0,
            textures: [0; FACE_COUNT],
        }
    }

    /// Atlas tile for `face`; out-of-range faces use the back tile.
    #[inline]
    pub fn texture(&self, face: usize) -> u16 {
        self.textures.get(face).copied().unwrap_or(self.textures[0])
    }
}
