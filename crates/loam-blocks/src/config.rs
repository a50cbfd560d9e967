use serde::Deserialize;

use crate::types::FACE_COUNT;

#[derive(Clone, Debug, Default, Deserialize)]
pub struct BlocksConfig {
    #[serde(default)]
    pub blocks: Vec<BlockDef>,
}

#[derive(Clone, Debug, Deserialize)]
pub struct BlockDef {
    pub name: String,
    #[serde(default)]
    pub id: Option<u16>,
    #[serde(default)]
    pub solid: Option<bool>,
    #[serde(default)]
    pub render_neighbor_faces: Option<bool>,
    #[serde(default)]
    pub transparent: Option<bool>,
    #[serde(default)]
    pub transparency: Option<f32>,
    #[serde(default)]
    pub textures: Option<TextureSpec>,
}

impl BlockDef {
    pub fn named(name: impl Into<String>) -> Self {
        BlockDef {
            name: name.into(),
            id: None,
            solid: None,
            render_neighbor_faces: None,
            transparent: None,
            transparency: None,
            textures: None,
        }
    }
}

#[derive(Clone, Debug, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum TextureSpec {
    All(u16),
    PerFace([u16; FACE_COUNT]),
    Roles { top: u16, bottom: u16, side: u16 },
}

impl TextureSpec {
    /// Expands to back, front, top, bottom, left, right.
    pub fn expand(&self) -> [u16; FACE_COUNT] {
        match *self {
            TextureSpec::All(t) => [t; FACE_COUNT],
            TextureSpec::PerFace(faces) => faces,
            TextureSpec::Roles { top, bottom, side } => [side, side, top, bottom, side, side],
        }
    }
}
