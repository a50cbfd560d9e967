//! World sizing, noise, worldgen parameters and terrain sampling.
#![forbid(unsafe_code)]

mod coords;
pub mod generation;
pub mod noise;
mod world;
pub mod worldgen;

pub use coords::{ChunkCoord, DimsError, OutOfBounds, VoxelEdit, VoxelPos, WorldDims};
pub use generation::{ChunkColumnPlan, ColumnInfo, FloraSite, TerrainSample};
pub use noise::NoiseSource;
pub use world::World;
pub use worldgen::{BiomeDef, ConfigError, FloraPalette, LodeDef, WorldGenParams};
