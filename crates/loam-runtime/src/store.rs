use std::sync::{Arc, Mutex, MutexGuard};

use hashbrown::{HashMap, HashSet};
use loam_chunk::{ChunkVoxels, Voxel, populate_chunk};
use loam_edit::{EditBatch, EditQueue};
use loam_lighting::light_chunk;
use loam_mesh_cpu::VoxelLookup;
use loam_world::{ChunkCoord, OutOfBounds, VoxelEdit, VoxelPos};

use crate::context::WorldContext;

/// Lifecycle of a chunk slot. Visibility is tracked separately.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ChunkState {
    #[default]
    Unloaded,
    Generating,
    Populated,
    Meshed,
}

impl ChunkState {
    #[inline]
    pub fn is_populated(self) -> bool {
        matches!(self, ChunkState::Populated | ChunkState::Meshed)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ChunkStatus {
    pub state: ChunkState,
    pub active: bool,
    pub dirty: bool,
    /// Edits waiting for the chunk to be populated.
    pub parked: usize,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditOutcome {
    Applied { changed: bool },
    /// The chunk is not populated yet; the edit runs right after it is.
    Parked,
    OutOfBounds,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum PopulateMode {
    /// Scheduled by the view; skipped if the chunk went out of view first.
    View,
    /// A player edit needs the chunk now.
    Forced,
}

pub(crate) enum Populated {
    /// Populated by this call. `edited` holds the positions of parked edits
    /// that changed the chunk.
    Fresh {
        data: Arc<ChunkVoxels>,
        edited: Vec<VoxelPos>,
    },
    Existing(Arc<ChunkVoxels>),
    Skipped,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EvictOutcome {
    Removed,
    /// Dirty data was written before the slot was dropped.
    Flushed,
    /// The flush failed, or the chunk is busy or back in view.
    Kept,
}

/// Result of moving the view: what the worker has to do next.
#[derive(Debug, Default)]
pub(crate) struct ViewPlan {
    pub populate: Vec<ChunkCoord>,
    pub remesh: Vec<ChunkCoord>,
    pub evict: Vec<ChunkCoord>,
    pub activated: usize,
    pub deactivated: usize,
}

#[derive(Debug, Default)]
struct Slot {
    state: ChunkState,
    active: bool,
    data: Option<Arc<ChunkVoxels>>,
    parked: Vec<VoxelEdit>,
    populate_queued: bool,
    remesh_queued: bool,
    /// Generated with structures; regenerating it would replay them into
    /// its neighbours, so it is written out even when clean.
    persist: bool,
}

#[derive(Debug, Default)]
struct Table {
    slots: HashMap<ChunkCoord, Slot>,
    dirty: HashSet<ChunkCoord>,
}

/// Coordinate to chunk table. One coarse lock guards every slot; chunk data
/// is swapped copy-on-write so readers always hold a whole snapshot.
#[derive(Debug)]
pub struct ChunkStore {
    ctx: Arc<WorldContext>,
    table: Mutex<Table>,
}

impl ChunkStore {
    pub fn new(ctx: Arc<WorldContext>) -> Self {
        Self {
            ctx,
            table: Mutex::new(Table::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Table> {
        self.table.lock().unwrap_or_else(|e| e.into_inner())
    }

    #[inline]
    pub fn ctx(&self) -> &WorldContext {
        &self.ctx
    }

    /// Number of slots, populated or not.
    pub fn len(&self) -> usize {
        self.lock().slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().slots.is_empty()
    }

    pub fn dirty_count(&self) -> usize {
        self.lock().dirty.len()
    }

    pub fn status(&self, coord: ChunkCoord) -> Option<ChunkStatus> {
        let t = self.lock();
        t.slots.get(&coord).map(|s| ChunkStatus {
            state: s.state,
            active: s.active,
            dirty: t.dirty.contains(&coord),
            parked: s.parked.len(),
        })
    }

    /// The populated data of `coord`, if any.
    pub fn snapshot(&self, coord: ChunkCoord) -> Option<Arc<ChunkVoxels>> {
        let t = self.lock();
        t.slots.get(&coord).and_then(|s| s.data.clone())
    }

    pub fn active_chunks(&self) -> Vec<ChunkCoord> {
        let t = self.lock();
        let mut out: Vec<ChunkCoord> = t
            .slots
            .iter()
            .filter(|(_, s)| s.active)
            .map(|(c, _)| *c)
            .collect();
        out.sort();
        out
    }

    /// Voxel at a global position. Chunks that are not populated answer
    /// with the procedural sample.
    pub fn voxel(&self, pos: VoxelPos) -> Result<Voxel, OutOfBounds> {
        let pos = self.ctx.dims().check(pos)?;
        let coord = pos.chunk(self.ctx.dims().chunk_width);
        let resident = self.snapshot(coord).and_then(|c| c.get_world(pos));
        Ok(resident.unwrap_or_else(|| self.ctx.procedural_voxel(pos)))
    }

    /// Returns the populated chunk, loading or generating it synchronously
    /// when needed. `None` for chunks outside the world, or while another
    /// caller is generating it.
    pub fn get_or_create(
        &self,
        coord: ChunkCoord,
        edits: &EditQueue,
    ) -> Option<Arc<ChunkVoxels>> {
        if !self.ctx.dims().contains_chunk(coord) {
            return None;
        }
        match self.populate(coord, PopulateMode::Forced, edits) {
            Populated::Fresh { data, .. } | Populated::Existing(data) => Some(data),
            Populated::Skipped => None,
        }
    }

    /// Loads or generates `coord`, lights it and applies the edits parked on
    /// it. Structure batches spawned by generation go to `edits`.
    pub(crate) fn populate(
        &self,
        coord: ChunkCoord,
        mode: PopulateMode,
        edits: &EditQueue,
    ) -> Populated {
        {
            let mut t = self.lock();
            let slot = match mode {
                PopulateMode::Forced => t.slots.entry(coord).or_default(),
                PopulateMode::View => match t.slots.get_mut(&coord) {
                    Some(s) => s,
                    None => return Populated::Skipped,
                },
            };
            slot.populate_queued = false;
            match slot.state {
                ChunkState::Unloaded => {}
                ChunkState::Generating => return Populated::Skipped,
                ChunkState::Populated | ChunkState::Meshed => {
                    return match slot.data.clone() {
                        Some(c) => Populated::Existing(c),
                        None => Populated::Skipped,
                    };
                }
            }
            if mode == PopulateMode::View && !slot.active {
                return Populated::Skipped;
            }
            slot.state = ChunkState::Generating;
        }

        let (mut chunk, spawned) = self.load_or_generate(coord, edits);
        light_chunk(&mut chunk, &self.ctx.registry, self.ctx.falloff);

        let mut edited = Vec::new();
        loop {
            let mut guard = self.lock();
            let Table { slots, dirty } = &mut *guard;
            let slot = slots.entry(coord).or_default();
            if slot.parked.is_empty() {
                let data = Arc::new(chunk);
                slot.data = Some(Arc::clone(&data));
                slot.state = ChunkState::Populated;
                slot.persist |= spawned;
                if !edited.is_empty() {
                    dirty.insert(coord);
                }
                return Populated::Fresh { data, edited };
            }
            let parked = std::mem::take(&mut slot.parked);
            drop(guard);
            let before = edited.len();
            for e in parked {
                if chunk.set_world(e.pos, e.id) == Some(true) {
                    edited.push(e.pos);
                }
            }
            if edited.len() > before {
                light_chunk(&mut chunk, &self.ctx.registry, self.ctx.falloff);
            }
        }
    }

    /// Returns the chunk and whether generation spawned structures.
    fn load_or_generate(&self, coord: ChunkCoord, edits: &EditQueue) -> (ChunkVoxels, bool) {
        let ctx = &self.ctx;
        match ctx.persist.load_chunk(&ctx.name, coord, &ctx.dims()) {
            Ok(Some(chunk)) => {
                log::debug!(target: "runtime", "loaded chunk {coord} from disk");
                return (chunk, false);
            }
            Ok(None) => {}
            Err(e) if e.is_corrupt() => {
                log::warn!(target: "runtime", "chunk {coord} is corrupt, regenerating: {e}");
            }
            Err(e) => {
                log::warn!(target: "runtime", "could not read chunk {coord}, regenerating: {e}");
            }
        }
        let out = populate_chunk(&ctx.world, coord);
        let spawned = !out.structures.is_empty();
        if spawned {
            log::debug!(
                target: "runtime",
                "chunk {coord} spawned {} structure batch(es)",
                out.structures.len()
            );
        }
        edits.extend(out.structures.into_iter().map(EditBatch::structure));
        (out.chunk, spawned)
    }

    /// Writes one voxel. Edits into chunks that are not populated are parked
    /// on the (possibly new) slot.
    pub fn apply_edit(&self, edit: VoxelEdit) -> EditOutcome {
        let dims = self.ctx.dims();
        if !dims.contains_voxel(edit.pos) {
            return EditOutcome::OutOfBounds;
        }
        let coord = edit.pos.chunk(dims.chunk_width);
        let mut guard = self.lock();
        let Table { slots, dirty } = &mut *guard;
        let slot = slots.entry(coord).or_default();
        match slot.data.as_mut() {
            Some(data) if slot.state.is_populated() => {
                let changed = Arc::make_mut(data).set_world(edit.pos, edit.id) == Some(true);
                if changed {
                    dirty.insert(coord);
                    slot.state = ChunkState::Populated;
                }
                EditOutcome::Applied { changed }
            }
            _ => {
                slot.parked.push(edit);
                EditOutcome::Parked
            }
        }
    }

    /// Recomputes the light of a populated chunk. Lighting runs on a copy
    /// outside the lock.
    pub fn relight(&self, coord: ChunkCoord) {
        let Some(current) = self.snapshot(coord) else {
            return;
        };
        let mut chunk = (*current).clone();
        light_chunk(&mut chunk, &self.ctx.registry, self.ctx.falloff);
        let mut t = self.lock();
        if let Some(slot) = t.slots.get_mut(&coord) {
            if slot
                .data
                .as_ref()
                .is_some_and(|d| Arc::ptr_eq(d, &current))
            {
                slot.data = Some(Arc::new(chunk));
            }
        }
    }

    /// Flags an active populated chunk for remeshing. Returns false when it
    /// is not meshable or already queued.
    pub(crate) fn mark_remesh(&self, coord: ChunkCoord) -> bool {
        let mut t = self.lock();
        match t.slots.get_mut(&coord) {
            Some(s) if s.active && s.state.is_populated() && !s.remesh_queued => {
                s.remesh_queued = true;
                true
            }
            _ => false,
        }
    }

    /// Data plus a neighbour snapshot for meshing `coord`.
    pub(crate) fn begin_remesh(
        &self,
        coord: ChunkCoord,
    ) -> Option<(Arc<ChunkVoxels>, NeighborView)> {
        let mut t = self.lock();
        let slot = t.slots.get_mut(&coord)?;
        slot.remesh_queued = false;
        if !slot.active || !slot.state.is_populated() {
            return None;
        }
        let data = slot.data.clone()?;
        let neighbors = [(0, -1), (0, 1), (-1, 0), (1, 0)]
            .into_iter()
            .filter_map(|(dx, dz)| {
                let c = coord.offset(dx, dz);
                t.slots.get(&c).and_then(|s| s.data.clone())
            })
            .collect();
        Some((
            data,
            NeighborView {
                ctx: Arc::clone(&self.ctx),
                neighbors,
            },
        ))
    }

    /// Marks `coord` meshed if its data is still the snapshot that was meshed.
    pub(crate) fn finish_remesh(&self, coord: ChunkCoord, meshed: &Arc<ChunkVoxels>) {
        let mut t = self.lock();
        if let Some(slot) = t.slots.get_mut(&coord) {
            let current = slot.data.as_ref().is_some_and(|d| Arc::ptr_eq(d, meshed));
            if current && slot.state == ChunkState::Populated {
                slot.state = ChunkState::Meshed;
            }
        }
    }

    /// Activates `view` (nearest first) and deactivates everything else.
    pub(crate) fn apply_view(
        &self,
        view: &[ChunkCoord],
        center: ChunkCoord,
        evict_distance: i32,
    ) -> ViewPlan {
        let mut plan = ViewPlan::default();
        let wanted: HashSet<ChunkCoord> = view.iter().copied().collect();
        let mut t = self.lock();
        for (coord, slot) in t.slots.iter_mut() {
            if slot.active && !wanted.contains(coord) {
                slot.active = false;
                plan.deactivated += 1;
            }
        }
        for &coord in view {
            let slot = t.slots.entry(coord).or_default();
            if !slot.active {
                slot.active = true;
                plan.activated += 1;
            }
            match slot.state {
                ChunkState::Unloaded if !slot.populate_queued => {
                    slot.populate_queued = true;
                    plan.populate.push(coord);
                }
                ChunkState::Populated if !slot.remesh_queued => {
                    slot.remesh_queued = true;
                    plan.remesh.push(coord);
                }
                _ => {}
            }
        }
        plan.evict = t
            .slots
            .iter()
            .filter(|(c, s)| !s.active && c.chebyshev(center) > evict_distance)
            .map(|(c, _)| *c)
            .collect();
        plan.evict.sort();
        plan
    }

    /// Drops an inactive chunk, writing it first when it holds unsaved
    /// changes. Chunks with parked edits or a pending job stay.
    pub(crate) fn evict(&self, coord: ChunkCoord) -> EvictOutcome {
        let to_flush = {
            let mut guard = self.lock();
            let Table { slots, dirty } = &mut *guard;
            let Some(slot) = slots.get(&coord) else {
                return EvictOutcome::Removed;
            };
            if slot.active
                || slot.state == ChunkState::Generating
                || slot.populate_queued
                || !slot.parked.is_empty()
            {
                return EvictOutcome::Kept;
            }
            match slot.data.clone() {
                Some(data) if dirty.contains(&coord) || slot.persist => data,
                _ => {
                    slots.remove(&coord);
                    dirty.remove(&coord);
                    return EvictOutcome::Removed;
                }
            }
        };

        let ctx = &self.ctx;
        if let Err(e) = ctx.persist.save_chunk(&ctx.name, &to_flush) {
            log::warn!(target: "runtime", "keeping chunk {coord}, flush failed: {e}");
            return EvictOutcome::Kept;
        }

        let mut guard = self.lock();
        let Table { slots, dirty } = &mut *guard;
        let unchanged = slots.get(&coord).is_some_and(|s| {
            !s.active
                && s.parked.is_empty()
                && s.data.as_ref().is_some_and(|d| Arc::ptr_eq(d, &to_flush))
        });
        if !unchanged {
            return EvictOutcome::Kept;
        }
        slots.remove(&coord);
        dirty.remove(&coord);
        EvictOutcome::Flushed
    }

    /// Takes every chunk that needs writing and clears the dirty set, so
    /// edits made during the save start a fresh set.
    pub(crate) fn take_save_snapshot(&self) -> Vec<Arc<ChunkVoxels>> {
        let mut guard = self.lock();
        let Table { slots, dirty } = &mut *guard;
        let mut out = Vec::new();
        for (coord, slot) in slots.iter_mut() {
            let wanted = dirty.contains(coord) || slot.persist;
            if let Some(data) = slot.data.as_ref().filter(|_| wanted) {
                out.push(Arc::clone(data));
                slot.persist = false;
            }
        }
        dirty.clear();
        out.sort_by_key(|c| c.coord);
        out
    }

    /// Re-flags chunks whose write failed.
    pub(crate) fn mark_dirty(&self, coords: &[ChunkCoord]) {
        let mut guard = self.lock();
        let Table { slots, dirty } = &mut *guard;
        for c in coords {
            if slots.contains_key(c) {
                dirty.insert(*c);
            }
        }
    }

    pub(crate) fn parked_snapshot(&self) -> Vec<(ChunkCoord, Vec<VoxelEdit>)> {
        let t = self.lock();
        let mut out: Vec<(ChunkCoord, Vec<VoxelEdit>)> = t
            .slots
            .iter()
            .filter(|(_, s)| !s.parked.is_empty())
            .map(|(c, s)| (*c, s.parked.clone()))
            .collect();
        out.sort_by_key(|(c, _)| *c);
        out
    }
}

/// Read-only view of a chunk's four side neighbours, taken under the table
/// lock so meshing can run without it.
pub(crate) struct NeighborView {
    ctx: Arc<WorldContext>,
    neighbors: Vec<Arc<ChunkVoxels>>,
}

impl VoxelLookup for NeighborView {
    fn voxel_at(&self, p: VoxelPos) -> Option<Voxel> {
        if !self.ctx.dims().contains_voxel(p) {
            return None;
        }
        let resident = self.neighbors.iter().find_map(|c| c.get_world(p));
        Some(resident.unwrap_or_else(|| self.ctx.procedural_voxel(p)))
    }
}
