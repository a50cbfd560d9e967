//! Block catalog: per-id render, lighting and texture properties.
#![forbid(unsafe_code)]

pub mod config;
pub mod registry;
pub mod types;

pub use registry::{BlockRegistry, RegistryError};
pub use types::{AIR, BlockId, BlockType, FACE_COUNT};
