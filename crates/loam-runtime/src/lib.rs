//! Chunk streaming, the background worker and the main-context API.
//!
//! The [`Orchestrator`] owns one world. The view centre decides which
//! chunks are active; the worker loads or generates them, applies edits,
//! lights and meshes them, and hands meshes back through a ready queue.
#![forbid(unsafe_code)]

mod context;
mod mesh_queue;
mod settings;
mod store;
mod worker;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::Receiver;
use loam_blocks::{BlockId, BlockRegistry};
use loam_chunk::Voxel;
use loam_edit::{EditBatch, EditQueueStats};
use loam_io::{PersistError, PersistenceStore, SaveReport, WorldMeta};
use loam_mesh_cpu::MeshPayload;
use loam_world::{ChunkCoord, OutOfBounds, VoxelPos, World, WorldDims, WorldGenParams};
use thiserror::Error;

pub use context::WorldContext;
pub use mesh_queue::MeshQueue;
pub use settings::{RuntimeSettings, SettingsConfig, SettingsError};
pub use store::{ChunkState, ChunkStatus, ChunkStore, EditOutcome, EvictOutcome};

use worker::{Job, Shared, Worker};

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Persist(#[from] PersistError),
    #[error("no saved world named `{0}`")]
    WorldNotFound(String),
    #[error(transparent)]
    Settings(#[from] SettingsError),
    #[error("failed to start the chunk worker: {0}")]
    Worker(#[from] rayon::ThreadPoolBuildError),
}

/// What a view move changed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct ViewUpdate {
    pub center: Option<ChunkCoord>,
    pub activated: usize,
    pub deactivated: usize,
    pub scheduled: usize,
    pub evicting: usize,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RuntimeStats {
    pub queued_jobs: usize,
    pub pending_jobs: usize,
    pub edits: EditQueueStats,
    pub ready_meshes: usize,
    pub resident_chunks: usize,
    pub dirty_chunks: usize,
}

/// Handle to a save running on its own thread.
#[derive(Debug)]
pub struct SaveTicket {
    inner: TicketInner,
}

#[derive(Debug)]
enum TicketInner {
    Running(JoinHandle<SaveReport>),
    Done(SaveReport),
}

impl SaveTicket {
    pub fn is_finished(&self) -> bool {
        match &self.inner {
            TicketInner::Running(h) => h.is_finished(),
            TicketInner::Done(_) => true,
        }
    }

    /// Blocks until the save thread is done.
    pub fn wait(self) -> SaveReport {
        match self.inner {
            TicketInner::Running(h) => h.join().unwrap_or_else(|_| {
                log::error!(target: "io", "save thread panicked");
                SaveReport::default()
            }),
            TicketInner::Done(report) => report,
        }
    }
}

pub struct Orchestrator {
    settings: RuntimeSettings,
    registry: Arc<BlockRegistry>,
    params: Arc<WorldGenParams>,
    shared: Arc<Shared>,
    jobs_rx: Receiver<Job>,
    worker: Option<Worker>,
    view: Option<ChunkCoord>,
    view_pos: Option<VoxelPos>,
}

impl Orchestrator {
    /// Opens `settings.world_name` under `settings.save_root`, creating it
    /// when no `world.toml` exists. A saved world keeps its own seed and
    /// dimensions. Settings are validated first.
    pub fn open(
        settings: RuntimeSettings,
        registry: Arc<BlockRegistry>,
        params: Arc<WorldGenParams>,
    ) -> Result<Self, RuntimeError> {
        settings.validate()?;
        let persist = PersistenceStore::new(&settings.save_root);
        let meta = match persist.load_world(&settings.world_name)? {
            Some(meta) => {
                log::info!(
                    target: "runtime",
                    "opened world '{}' (seed {}) from {}",
                    meta.name,
                    meta.seed,
                    persist.world_dir(&meta.name).display()
                );
                meta
            }
            None => {
                let meta = WorldMeta::new(&settings.world_name, settings.seed, settings.dims);
                persist.save_world(&meta)?;
                log::info!(
                    target: "runtime",
                    "created world '{}' (seed {})",
                    meta.name,
                    meta.seed
                );
                meta
            }
        };
        let (shared, jobs_rx, worker) = start(&settings, &registry, &params, persist, &meta)?;
        Ok(Self {
            settings,
            registry,
            params,
            shared,
            jobs_rx,
            worker,
            view: None,
            view_pos: None,
        })
    }

    #[inline]
    pub fn settings(&self) -> &RuntimeSettings {
        &self.settings
    }

    #[inline]
    pub fn context(&self) -> &WorldContext {
        &self.shared.ctx
    }

    #[inline]
    pub fn dims(&self) -> WorldDims {
        self.shared.ctx.dims()
    }

    #[inline]
    pub fn world_name(&self) -> &str {
        &self.shared.ctx.name
    }

    #[inline]
    pub fn seed(&self) -> i32 {
        self.shared.ctx.world.seed
    }

    /// Moves the view. Chunks within `view_distance` (Chebyshev, in chunks)
    /// of the centre become active and are populated or meshed as needed;
    /// the rest go inactive, and inactive chunks beyond `evict_distance` are
    /// scheduled for eviction. Staying inside the same chunk does nothing.
    pub fn set_view_center(&mut self, pos: VoxelPos) -> ViewUpdate {
        let dims = self.dims();
        let center = pos.chunk(dims.chunk_width);
        self.view_pos = Some(pos);
        if self.view == Some(center) {
            return ViewUpdate::default();
        }
        self.view = Some(center);

        let r = self.settings.view_distance;
        let mut wanted: Vec<ChunkCoord> = (-r..=r)
            .flat_map(|dz| (-r..=r).map(move |dx| center.offset(dx, dz)))
            .filter(|c| dims.contains_chunk(*c))
            .collect();
        wanted.sort_by_key(|c| (c.distance_sq(center), *c));

        let plan = self
            .shared
            .store
            .apply_view(&wanted, center, self.settings.evict_distance);
        let update = ViewUpdate {
            center: Some(center),
            activated: plan.activated,
            deactivated: plan.deactivated,
            scheduled: plan.populate.len() + plan.remesh.len(),
            evicting: plan.evict.len(),
        };
        for c in plan.populate {
            self.shared.submit(Job::Populate(c));
        }
        for c in plan.remesh {
            self.shared.submit(Job::Remesh(c));
        }
        for c in plan.evict {
            self.shared.submit(Job::Evict(c));
        }
        log::info!(
            target: "runtime",
            "view centre {center}: +{} -{} active, {} job(s), {} eviction(s)",
            update.activated,
            update.deactivated,
            update.scheduled,
            update.evicting
        );
        update
    }

    /// Voxel at `pos`. Chunks that are not populated yet answer with the
    /// procedural sample.
    pub fn get_voxel(&self, pos: VoxelPos) -> Result<Voxel, OutOfBounds> {
        self.shared.store.voxel(pos)
    }

    /// Queues a single-voxel player edit. The owning chunk is created and
    /// populated if needed, then relit and remeshed along with any chunk
    /// sharing the edited boundary.
    pub fn set_voxel(&self, pos: VoxelPos, id: BlockId) -> Result<(), OutOfBounds> {
        let pos = self.dims().check(pos)?;
        self.shared.edits.push(EditBatch::player(pos, id));
        self.shared.request_drain();
        Ok(())
    }

    /// Next finished mesh, if any. Never blocks.
    pub fn drain_next_ready_mesh(&self) -> Option<MeshPayload> {
        self.shared.meshes.try_pop()
    }

    /// Starts a save on a background thread. The thread takes a snapshot of
    /// every dirty chunk and clears the dirty set before writing, so edits
    /// made meanwhile land in the next save. Saves run one after another.
    pub fn request_save(&self) -> SaveTicket {
        let shared = Arc::clone(&self.shared);
        shared.saves_in_flight.fetch_add(1, Ordering::AcqRel);
        let spawned = thread::Builder::new()
            .name("loam-save".into())
            .spawn(move || {
                let report = run_save(&shared);
                shared.saves_in_flight.fetch_sub(1, Ordering::AcqRel);
                report
            });
        match spawned {
            Ok(handle) => SaveTicket {
                inner: TicketInner::Running(handle),
            },
            Err(e) => {
                self.shared.saves_in_flight.fetch_sub(1, Ordering::AcqRel);
                log::error!(target: "io", "could not start save thread: {e}");
                SaveTicket {
                    inner: TicketInner::Done(SaveReport::default()),
                }
            }
        }
    }

    pub fn save_blocking(&self) -> SaveReport {
        self.request_save().wait()
    }

    /// Replaces the current world with the saved world `name`. Work queued
    /// for the current world finishes first; its unsaved changes are
    /// dropped. The view is re-applied to the loaded world.
    pub fn request_load(&mut self, name: &str) -> Result<(), RuntimeError> {
        let persist = self.shared.ctx.persist.clone();
        let meta = persist
            .load_world(name)?
            .ok_or_else(|| RuntimeError::WorldNotFound(name.to_string()))?;
        self.wait_idle(Duration::MAX);
        self.stop_worker();
        let (shared, jobs_rx, worker) =
            start(&self.settings, &self.registry, &self.params, persist, &meta)?;
        self.shared = shared;
        self.jobs_rx = jobs_rx;
        self.worker = worker;
        self.settings.world_name = meta.name.clone();
        self.settings.seed = meta.seed;
        self.view = None;
        log::info!(target: "runtime", "loaded world '{}' (seed {})", meta.name, meta.seed);
        if let Some(pos) = self.view_pos {
            self.set_view_center(pos);
        }
        Ok(())
    }

    pub fn chunk_status(&self, coord: ChunkCoord) -> Option<ChunkStatus> {
        self.shared.store.status(coord)
    }

    pub fn active_chunks(&self) -> Vec<ChunkCoord> {
        self.shared.store.active_chunks()
    }

    /// Runs queued jobs on the calling thread until none are left. Only
    /// does anything when `threading` is off. Returns the number of jobs run.
    pub fn pump(&self) -> usize {
        if self.worker.is_some() {
            return 0;
        }
        let mut ran = 0;
        while let Ok(job) = self.jobs_rx.try_recv() {
            if self.shared.run(job) {
                ran += 1;
            }
        }
        ran
    }

    /// True when no job is queued or running.
    pub fn is_idle(&self) -> bool {
        self.shared.is_idle()
    }

    /// Waits for the worker (or pumps, when not threaded) until idle.
    /// Returns false if `timeout` passed first.
    pub fn wait_idle(&self, timeout: Duration) -> bool {
        let deadline = Instant::now().checked_add(timeout);
        loop {
            self.pump();
            if self.is_idle() {
                return true;
            }
            if deadline.is_some_and(|d| Instant::now() >= d) {
                return false;
            }
            thread::sleep(Duration::from_millis(1));
        }
    }

    pub fn stats(&self) -> RuntimeStats {
        RuntimeStats {
            queued_jobs: self.shared.queued_jobs(),
            pending_jobs: self.shared.pending_jobs(),
            edits: self.shared.edits.stats(),
            ready_meshes: self.shared.meshes.len(),
            resident_chunks: self.shared.store.len(),
            dirty_chunks: self.shared.store.dirty_count(),
        }
    }

    /// Lets queued work finish, then stops the worker.
    pub fn shutdown(mut self) {
        self.wait_idle(Duration::MAX);
        self.stop_worker();
        log::info!(target: "runtime", "world '{}' shut down", self.world_name());
    }

    fn stop_worker(&mut self) {
        if let Some(worker) = self.worker.take() {
            self.shared.stop();
            worker.join();
        }
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        if self.worker.is_some() {
            self.shared.stop();
        }
    }
}

type Started = (Arc<Shared>, Receiver<Job>, Option<Worker>);

fn start(
    settings: &RuntimeSettings,
    registry: &Arc<BlockRegistry>,
    params: &Arc<WorldGenParams>,
    persist: PersistenceStore,
    meta: &WorldMeta,
) -> Result<Started, RuntimeError> {
    if meta.dims != settings.dims {
        log::info!(
            target: "runtime",
            "world '{}' keeps its saved dimensions {:?}",
            meta.name,
            meta.dims
        );
    }
    let world = World::new(meta.dims, meta.seed, params.as_ref().clone());
    let parked = match persist.load_pending(&meta.name) {
        Ok(parked) => parked,
        Err(e) => {
            log::warn!(target: "io", "ignoring unreadable pending edits: {e}");
            Vec::new()
        }
    };
    let ctx = Arc::new(WorldContext::new(
        world,
        Arc::clone(registry),
        persist,
        &meta.name,
        settings.light_falloff,
    ));
    let (shared, jobs_rx) = Shared::new(ctx);
    if !parked.is_empty() {
        log::info!(
            target: "runtime",
            "restored pending edits for {} chunk(s)",
            parked.len()
        );
        shared
            .edits
            .extend(parked.into_iter().map(|(_, edits)| EditBatch::structure(edits)));
        shared.request_drain();
    }
    let worker = if settings.threading {
        Some(Worker::spawn(Arc::clone(&shared), jobs_rx.clone())?)
    } else {
        None
    };
    Ok((shared, jobs_rx, worker))
}

fn run_save(shared: &Shared) -> SaveReport {
    let _serial = shared.save_lock.lock().unwrap_or_else(|e| e.into_inner());
    let ctx = &shared.ctx;
    let snapshot = shared.store.take_save_snapshot();
    let mut parked = shared.store.parked_snapshot();
    // Batches not yet drained; their spawning chunk may be in `snapshot`
    // and would not spawn them again after a reload.
    let width = ctx.dims().chunk_width;
    parked.extend(
        shared
            .edits
            .snapshot()
            .into_iter()
            .filter_map(|b| Some((b.edits.first()?.pos.chunk(width), b.edits))),
    );
    let meta = WorldMeta::new(&ctx.name, ctx.world.seed, ctx.dims());
    if let Err(e) = ctx.persist.save_world(&meta) {
        log::warn!(target: "io", "failed to save world metadata: {e}");
    }
    if let Err(e) = ctx.persist.save_pending(&ctx.name, &parked) {
        log::warn!(target: "io", "failed to save pending edits: {e}");
    }
    let report = ctx.persist.save_chunks(&ctx.name, &snapshot);
    shared.store.mark_dirty(&report.failed);
    report
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use loam_world::VoxelEdit;
    use loam_world::worldgen::WorldGenConfig;

    use super::*;

    /// One flat biome at height 42 with no flora, so only the edits a test
    /// pushes ever change a chunk.
    fn open_flat(root: &Path) -> Orchestrator {
        let reg = Arc::new(BlockRegistry::builtin().unwrap());
        let cfg: WorldGenConfig = toml::from_str(
            r#"
            [[biomes]]
            name = "plain"
            terrain_height = 0.0
            surface = "grass"
            sub_surface = "dirt"
            [biomes.big_flora]
            place = false
            "#,
        )
        .unwrap();
        let params = Arc::new(WorldGenParams::from_config(&cfg, &reg).unwrap());
        let settings = RuntimeSettings {
            world_name: "flat".into(),
            save_root: root.to_path_buf(),
            view_distance: 1,
            evict_distance: 3,
            threading: false,
            dims: WorldDims {
                world_chunks: 8,
                ..WorldDims::default()
            },
            ..RuntimeSettings::default()
        };
        Orchestrator::open(settings, reg, params).unwrap()
    }

    fn settle(o: &Orchestrator) {
        assert!(o.wait_idle(Duration::from_secs(60)));
    }

    fn drained(o: &Orchestrator) -> Vec<ChunkCoord> {
        let mut coords: Vec<ChunkCoord> =
            std::iter::from_fn(|| o.drain_next_ready_mesh()).map(|m| m.coord).collect();
        coords.sort();
        coords
    }

    fn push_structure(o: &Orchestrator, pos: VoxelPos, id: BlockId) {
        o.shared
            .edits
            .push(EditBatch::structure(vec![VoxelEdit::new(pos, id)]));
    }

    #[test]
    fn parked_boundary_edit_remeshes_the_meshed_neighbour() {
        let dir = tempfile::tempdir().unwrap();
        let mut o = open_flat(dir.path());
        let glass = o.registry.id_by_name("glass").unwrap();
        o.set_view_center(VoxelPos::new(24, 60, 40));
        settle(&o);
        drained(&o);
        assert_eq!(
            o.chunk_status(ChunkCoord::new(2, 2)).unwrap().state,
            ChunkState::Meshed
        );

        // x = 48 is local x = 0 of chunk (3, 2), which is not loaded yet.
        let pos = VoxelPos::new(48, 1, 40);
        push_structure(&o, pos, glass);
        o.shared.request_drain();
        settle(&o);
        let status = o.chunk_status(ChunkCoord::new(3, 2)).unwrap();
        assert_eq!((status.state, status.parked), (ChunkState::Unloaded, 1));
        assert!(drained(&o).is_empty());

        o.set_view_center(VoxelPos::new(40, 60, 40));
        settle(&o);
        let meshes = drained(&o);
        assert!(meshes.contains(&ChunkCoord::new(3, 2)));
        assert!(meshes.contains(&ChunkCoord::new(2, 2)), "meshes: {meshes:?}");
        assert_eq!(o.get_voxel(pos).unwrap().id, glass);
        assert!(o.chunk_status(ChunkCoord::new(3, 2)).unwrap().dirty);
    }

    #[test]
    fn queued_structure_batches_survive_a_save() {
        let dir = tempfile::tempdir().unwrap();
        let pos = VoxelPos::new(100, 1, 100);
        {
            let o = open_flat(dir.path());
            let glass = o.registry.id_by_name("glass").unwrap();
            // No drain is requested, so the batch is still queued at save time.
            push_structure(&o, pos, glass);
            let report = o.save_blocking();
            assert!(report.is_clean());
            assert!(o.context().persist.pending_path("flat").exists());
            assert_eq!(o.stats().edits.batches, 1);
        }

        let mut o = open_flat(dir.path());
        let glass = o.registry.id_by_name("glass").unwrap();
        o.set_view_center(VoxelPos::new(100, 60, 100));
        settle(&o);
        assert_eq!(o.get_voxel(pos).unwrap().id, glass);

        // Once applied and saved, nothing is left pending.
        assert!(o.save_blocking().is_clean());
        assert!(!o.context().persist.pending_path("flat").exists());
    }
}
