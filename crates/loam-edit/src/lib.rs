//! Deferred voxel edits and the chunks they touch.
#![forbid(unsafe_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use loam_blocks::BlockId;
use loam_world::{ChunkCoord, VoxelEdit, VoxelPos};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum EditSource {
    /// Requested from the main context; the target chunk is created and
    /// populated on demand.
    Player,
    /// Spawned by population; edits into chunks that are not populated yet
    /// wait on the chunk instead of forcing generation.
    Structure,
}

/// Ordered edits applied together.
#[derive(Clone, Debug, PartialEq)]
pub struct EditBatch {
    pub source: EditSource,
    pub edits: Vec<VoxelEdit>,
}

impl EditBatch {
    pub fn player(pos: VoxelPos, id: BlockId) -> Self {
        Self {
            source: EditSource::Player,
            edits: vec![VoxelEdit::new(pos, id)],
        }
    }

    pub fn structure(edits: Vec<VoxelEdit>) -> Self {
        Self {
            source: EditSource::Structure,
            edits,
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.edits.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.edits.is_empty()
    }
}

#[derive(Default, Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditQueueStats {
    pub batches: usize,
    pub edits: usize,
}

/// FIFO of edit batches shared between producers and the worker drain loop.
#[derive(Default, Debug)]
pub struct EditQueue {
    inner: Mutex<VecDeque<EditBatch>>,
}

impl EditQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueues a batch. Empty batches are dropped.
    pub fn push(&self, batch: EditBatch) {
        if batch.is_empty() {
            return;
        }
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.push_back(batch);
    }

    pub fn extend(&self, batches: impl IntoIterator<Item = EditBatch>) {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.extend(batches.into_iter().filter(|b| !b.is_empty()));
    }

    pub fn pop(&self) -> Option<EditBatch> {
        let mut q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.pop_front()
    }

    pub fn is_empty(&self) -> bool {
        self.inner
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .is_empty()
    }

    /// Copies of the queued batches, front first.
    pub fn snapshot(&self) -> Vec<EditBatch> {
        let q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        q.iter().cloned().collect()
    }

    pub fn stats(&self) -> EditQueueStats {
        let q = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        EditQueueStats {
            batches: q.len(),
            edits: q.iter().map(|b| b.len()).sum(),
        }
    }
}

/// The chunk owning `pos` followed by every chunk sharing the edited
/// boundary voxel (one per touched x/z edge, plus the diagonal at corners).
pub fn affected_chunks(pos: VoxelPos, width: usize) -> Vec<ChunkCoord> {
    let w = width as i32;
    let owner = pos.chunk(width);
    let (lx, lz) = pos.local_xz(width);
    let (lx, lz) = (lx as i32, lz as i32);

    let mut offsets_x = vec![0];
    let mut offsets_z = vec![0];
    if lx == 0 {
        offsets_x.push(-1);
    }
    if lx == w - 1 {
        offsets_x.push(1);
    }
    if lz == 0 {
        offsets_z.push(-1);
    }
    if lz == w - 1 {
        offsets_z.push(1);
    }

    let mut affected = vec![owner];
    for &dx in &offsets_x {
        for &dz in &offsets_z {
            if dx == 0 && dz == 0 {
                continue;
            }
            let key = owner.offset(dx, dz);
            if !affected.contains(&key) {
                affected.push(key);
            }
        }
    }
    affected
}
