//! World and chunk persistence under a save root.
//!
//! Layout:
//!
//! ```text
//! <root>/<world>/world.toml
//! <root>/<world>/pending.bin
//! <root>/<world>/chunks/<cx>_<cz>.chunk
//! ```
//!
//! Chunk files are bincode-encoded records. Every write goes to a sibling
//! `.tmp` file first and is renamed into place, so a crash mid-save leaves
//! the previous version intact.
#![forbid(unsafe_code)]

mod error;
mod meta;
mod record;

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use loam_chunk::ChunkVoxels;
use loam_world::{ChunkCoord, VoxelEdit, WorldDims};

pub use error::PersistError;
pub use meta::WorldMeta;
use record::{ChunkRecord, PendingRecord};

pub const FORMAT_VERSION: u32 = 1;

const META_FILE: &str = "world.toml";
const PENDING_FILE: &str = "pending.bin";
const CHUNK_DIR: &str = "chunks";
const CHUNK_EXT: &str = "chunk";

/// Outcome of a best-effort multi-chunk save.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SaveReport {
    pub written: usize,
    pub failed: Vec<ChunkCoord>,
}

impl SaveReport {
    #[inline]
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

#[derive(Clone, Debug)]
pub struct PersistenceStore {
    root: PathBuf,
}

impl PersistenceStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    #[inline]
    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn world_dir(&self, world: &str) -> PathBuf {
        self.root.join(world)
    }

    pub fn meta_path(&self, world: &str) -> PathBuf {
        self.world_dir(world).join(META_FILE)
    }

    pub fn chunk_path(&self, world: &str, coord: ChunkCoord) -> PathBuf {
        self.world_dir(world)
            .join(CHUNK_DIR)
            .join(format!("{}_{}.{CHUNK_EXT}", coord.cx, coord.cz))
    }

    pub fn save_world(&self, meta: &WorldMeta) -> Result<(), PersistError> {
        let path = self.meta_path(&meta.name);
        let text = toml::to_string_pretty(meta).map_err(|e| PersistError::Encode {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, |w| w.write_all(text.as_bytes()).map_err(|e| e.to_string()))?;
        log::info!(target: "io", "saved world '{}' (seed {})", meta.name, meta.seed);
        Ok(())
    }

    /// Reads `world.toml`. A missing file is `Ok(None)`.
    pub fn load_world(&self, world: &str) -> Result<Option<WorldMeta>, PersistError> {
        let path = self.meta_path(world);
        let text = match fs::read_to_string(&path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(path, e)),
        };
        let meta: WorldMeta = toml::from_str(&text).map_err(|source| PersistError::Meta {
            path: path.clone(),
            source,
        })?;
        if meta.format_version != FORMAT_VERSION {
            return Err(PersistError::corrupt(
                path,
                format!("unsupported world format version {}", meta.format_version),
            ));
        }
        if let Err(e) = meta.dims.validate() {
            return Err(PersistError::corrupt(path, e.to_string()));
        }
        Ok(Some(meta))
    }

    pub fn save_chunk(&self, world: &str, chunk: &ChunkVoxels) -> Result<(), PersistError> {
        let path = self.chunk_path(world, chunk.coord);
        let record = ChunkRecord::from_chunk(chunk);
        write_atomic(&path, |w| {
            bincode::serialize_into(w, &record).map_err(|e| e.to_string())
        })
    }

    /// Reads one chunk. A missing file is `Ok(None)`; a file that does not
    /// decode or does not match `dims` is [`PersistError::Corrupt`].
    pub fn load_chunk(
        &self,
        world: &str,
        coord: ChunkCoord,
        dims: &WorldDims,
    ) -> Result<Option<ChunkVoxels>, PersistError> {
        let path = self.chunk_path(world, coord);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(PersistError::io(path, e)),
        };
        let record: ChunkRecord = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PersistError::corrupt(&path, e.to_string()))?;
        record
            .validate(coord, dims)
            .map_err(|reason| PersistError::corrupt(&path, reason))?;
        Ok(Some(record.into_chunk(coord)))
    }

    /// Writes every chunk, logging and collecting failures without stopping.
    pub fn save_chunks(&self, world: &str, chunks: &[Arc<ChunkVoxels>]) -> SaveReport {
        let mut report = SaveReport::default();
        for chunk in chunks {
            match self.save_chunk(world, chunk) {
                Ok(()) => report.written += 1,
                Err(e) => {
                    log::warn!(target: "io", "failed to save chunk {}: {e}", chunk.coord);
                    report.failed.push(chunk.coord);
                }
            }
        }
        log::info!(
            target: "io",
            "saved {} chunk(s) of '{world}', {} failed",
            report.written,
            report.failed.len()
        );
        report
    }

    pub fn pending_path(&self, world: &str) -> PathBuf {
        self.world_dir(world).join(PENDING_FILE)
    }

    /// Stores edits that have not reached their chunk yet: parked edits and
    /// batches still queued. An empty list removes the file.
    pub fn save_pending(
        &self,
        world: &str,
        parked: &[(ChunkCoord, Vec<VoxelEdit>)],
    ) -> Result<(), PersistError> {
        let path = self.pending_path(world);
        if parked.is_empty() {
            return match fs::remove_file(&path) {
                Ok(()) => Ok(()),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
                Err(e) => Err(PersistError::io(path, e)),
            };
        }
        let record = PendingRecord::from_parked(parked);
        write_atomic(&path, |w| {
            bincode::serialize_into(w, &record).map_err(|e| e.to_string())
        })
    }

    /// Parked edits saved by [`save_pending`](Self::save_pending), empty
    /// when none were stored.
    pub fn load_pending(
        &self,
        world: &str,
    ) -> Result<Vec<(ChunkCoord, Vec<VoxelEdit>)>, PersistError> {
        let path = self.pending_path(world);
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistError::io(path, e)),
        };
        let record: PendingRecord = bincode::deserialize_from(BufReader::new(file))
            .map_err(|e| PersistError::corrupt(&path, e.to_string()))?;
        if record.version != FORMAT_VERSION {
            return Err(PersistError::corrupt(
                path,
                format!("unsupported pending format version {}", record.version),
            ));
        }
        Ok(record.into_parked())
    }

    /// Coordinates of every chunk file present for `world`.
    pub fn stored_chunks(&self, world: &str) -> Result<Vec<ChunkCoord>, PersistError> {
        let dir = self.world_dir(world).join(CHUNK_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(e) => e,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(PersistError::io(dir, e)),
        };
        let mut out = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| PersistError::io(&dir, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(CHUNK_EXT) {
                continue;
            }
            if let Some(coord) = path
                .file_stem()
                .and_then(|s| s.to_str())
                .and_then(parse_chunk_stem)
            {
                out.push(coord);
            }
        }
        out.sort();
        Ok(out)
    }
}

fn parse_chunk_stem(stem: &str) -> Option<ChunkCoord> {
    let (x, z) = stem.split_once('_')?;
    Some(ChunkCoord::new(x.parse().ok()?, z.parse().ok()?))
}

fn write_atomic(
    path: &Path,
    write: impl FnOnce(&mut BufWriter<File>) -> Result<(), String>,
) -> Result<(), PersistError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| PersistError::io(parent, e))?;
    }
    let tmp = path.with_extension("tmp");
    let file = File::create(&tmp).map_err(|e| PersistError::io(&tmp, e))?;
    let mut writer = BufWriter::new(file);
    write(&mut writer).map_err(|reason| PersistError::Encode {
        path: path.to_path_buf(),
        reason,
    })?;
    writer.flush().map_err(|e| PersistError::io(&tmp, e))?;
    drop(writer);
    fs::rename(&tmp, path).map_err(|e| PersistError::io(path, e))?;
    Ok(())
}
