use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Instant;

use crossbeam_channel::{Receiver, Sender, unbounded};
use hashbrown::HashSet;
use loam_edit::{EditQueue, EditSource, affected_chunks};
use loam_mesh_cpu::{build_chunk_mesh, mesh_stats};
use loam_world::{ChunkCoord, VoxelPos};
use rayon::{ThreadPool, ThreadPoolBuilder};

use crate::context::WorldContext;
use crate::mesh_queue::MeshQueue;
use crate::store::{ChunkStore, EditOutcome, EvictOutcome, PopulateMode, Populated};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Job {
    Populate(ChunkCoord),
    Remesh(ChunkCoord),
    DrainEdits,
    Evict(ChunkCoord),
    Stop,
}

/// State shared by the main context, the worker and save threads.
pub(crate) struct Shared {
    pub ctx: Arc<WorldContext>,
    pub store: ChunkStore,
    pub edits: EditQueue,
    pub meshes: MeshQueue,
    job_tx: Sender<Job>,
    /// Jobs sitting in the channel.
    queued: AtomicUsize,
    /// Jobs submitted and not yet finished, running ones included.
    pending: AtomicUsize,
    drain_queued: AtomicBool,
    pub saves_in_flight: AtomicUsize,
    /// Held by a save thread from snapshot to last write.
    pub save_lock: Mutex<()>,
}

impl Shared {
    pub fn new(ctx: Arc<WorldContext>) -> (Arc<Self>, Receiver<Job>) {
        let (job_tx, job_rx) = unbounded::<Job>();
        let shared = Arc::new(Self {
            store: ChunkStore::new(Arc::clone(&ctx)),
            ctx,
            edits: EditQueue::new(),
            meshes: MeshQueue::new(),
            job_tx,
            queued: AtomicUsize::new(0),
            pending: AtomicUsize::new(0),
            drain_queued: AtomicBool::new(false),
            saves_in_flight: AtomicUsize::new(0),
            save_lock: Mutex::new(()),
        });
        (shared, job_rx)
    }

    pub fn submit(&self, job: Job) {
        self.pending.fetch_add(1, Ordering::SeqCst);
        self.queued.fetch_add(1, Ordering::Relaxed);
        if self.job_tx.send(job).is_err() {
            self.queued.fetch_sub(1, Ordering::Relaxed);
            self.pending.fetch_sub(1, Ordering::SeqCst);
        }
    }

    /// Schedules one drain of the edit queue unless one is already waiting.
    pub fn request_drain(&self) {
        if !self.drain_queued.swap(true, Ordering::AcqRel) {
            self.submit(Job::DrainEdits);
        }
    }

    pub fn stop(&self) {
        let _ = self.job_tx.send(Job::Stop);
    }

    pub fn is_idle(&self) -> bool {
        self.pending.load(Ordering::SeqCst) == 0
    }

    pub fn queued_jobs(&self) -> usize {
        self.queued.load(Ordering::Relaxed)
    }

    pub fn pending_jobs(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    /// Runs one received job to completion. Returns false for `Stop`.
    pub fn run(&self, job: Job) -> bool {
        if job == Job::Stop {
            return false;
        }
        self.queued.fetch_sub(1, Ordering::Relaxed);
        match job {
            Job::Populate(coord) => self.populate(coord),
            Job::Remesh(coord) => self.remesh(coord),
            Job::DrainEdits => {
                self.drain_queued.store(false, Ordering::Release);
                self.drain_edits();
            }
            Job::Evict(coord) => self.evict(coord),
            Job::Stop => {}
        }
        // Follow-up jobs are submitted before this, so `pending` never dips
        // to zero while work remains.
        self.pending.fetch_sub(1, Ordering::SeqCst);
        true
    }

    fn populate(&self, coord: ChunkCoord) {
        let t0 = Instant::now();
        if let Populated::Fresh { edited, .. } =
            self.store.populate(coord, PopulateMode::View, &self.edits)
        {
            log::debug!(
                target: "runtime",
                "populated chunk {coord} in {}ms",
                t0.elapsed().as_millis()
            );
            if !self.edits.is_empty() {
                self.request_drain();
            }
            self.schedule_remesh(self.fresh_remesh_set(coord, &edited));
        }
    }

    /// The fresh chunk plus every neighbour sharing a voxel changed by one
    /// of its parked edits.
    fn fresh_remesh_set(&self, coord: ChunkCoord, edited: &[VoxelPos]) -> HashSet<ChunkCoord> {
        let width = self.ctx.dims().chunk_width;
        let mut remesh: HashSet<ChunkCoord> = HashSet::new();
        remesh.insert(coord);
        for &pos in edited {
            remesh.extend(affected_chunks(pos, width));
        }
        remesh
    }

    fn schedule_remesh(&self, coords: impl IntoIterator<Item = ChunkCoord>) {
        for coord in coords {
            if self.store.mark_remesh(coord) {
                self.submit(Job::Remesh(coord));
            }
        }
    }

    fn remesh(&self, coord: ChunkCoord) {
        let Some((data, view)) = self.store.begin_remesh(coord) else {
            return;
        };
        let t0 = Instant::now();
        let mesh = build_chunk_mesh(&data, &self.ctx.registry, &view, self.ctx.dims().atlas_tiles);
        self.store.finish_remesh(coord, &data);
        let stats = mesh_stats(&mesh);
        log::debug!(
            target: "runtime",
            "meshed chunk {coord}: {} opaque, {} transparent quads in {}ms",
            stats.opaque_quads,
            stats.transparent_quads,
            t0.elapsed().as_millis()
        );
        self.meshes.push(mesh);
    }

    /// Applies queued batches one at a time, in order. Each batch is
    /// followed by a relight of the chunks it changed and a remesh of those
    /// chunks and of every neighbour sharing an edited boundary voxel.
    ///
    /// A batch is popped and applied under the save lock, so a save sees it
    /// either still queued or already applied.
    fn drain_edits(&self) {
        let width = self.ctx.dims().chunk_width;
        loop {
            let _serial = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());
            let Some(batch) = self.edits.pop() else {
                break;
            };
            let mut changed: HashSet<ChunkCoord> = HashSet::new();
            let mut remesh: HashSet<ChunkCoord> = HashSet::new();
            let mut parked = 0usize;
            for edit in &batch.edits {
                let owner = edit.pos.chunk(width);
                if batch.source == EditSource::Player && self.ctx.dims().contains_voxel(edit.pos) {
                    let forced = self.store.populate(owner, PopulateMode::Forced, &self.edits);
                    if let Populated::Fresh { edited, .. } = forced {
                        remesh.extend(self.fresh_remesh_set(owner, &edited));
                    }
                }
                match self.store.apply_edit(*edit) {
                    EditOutcome::Applied { changed: true } => {
                        changed.insert(owner);
                        remesh.extend(affected_chunks(edit.pos, width));
                    }
                    EditOutcome::Applied { changed: false } => {}
                    EditOutcome::Parked => parked += 1,
                    EditOutcome::OutOfBounds => {
                        log::debug!(
                            target: "runtime",
                            "dropped edit outside the world at {}",
                            edit.pos
                        );
                    }
                }
            }
            for &coord in &changed {
                self.store.relight(coord);
            }
            self.schedule_remesh(remesh);
            if parked > 0 {
                log::debug!(
                    target: "runtime",
                    "{:?} batch: parked {parked} of {} edit(s)",
                    batch.source,
                    batch.len()
                );
            }
        }
    }

    fn evict(&self, coord: ChunkCoord) {
        if self.saves_in_flight.load(Ordering::Acquire) > 0 {
            log::debug!(target: "runtime", "save in progress, keeping chunk {coord}");
            return;
        }
        match self.store.evict(coord) {
            EvictOutcome::Removed => log::debug!(target: "runtime", "evicted chunk {coord}"),
            EvictOutcome::Flushed => {
                log::debug!(target: "runtime", "flushed and evicted chunk {coord}")
            }
            EvictOutcome::Kept => {}
        }
    }
}

/// The single background worker: a one-thread pool draining the job
/// channel until it sees [`Job::Stop`].
pub(crate) struct Worker {
    _pool: ThreadPool,
    done_rx: Receiver<()>,
}

impl Worker {
    pub fn spawn(
        shared: Arc<Shared>,
        jobs: Receiver<Job>,
    ) -> Result<Self, rayon::ThreadPoolBuildError> {
        let pool = ThreadPoolBuilder::new()
            .num_threads(1)
            .thread_name(|i| format!("loam-worker-{i}"))
            .build()?;
        let (done_tx, done_rx) = unbounded::<()>();
        pool.spawn(move || {
            while let Ok(job) = jobs.recv() {
                if !shared.run(job) {
                    break;
                }
            }
            let _ = done_tx.send(());
        });
        Ok(Self {
            _pool: pool,
            done_rx,
        })
    }

    /// Blocks until the worker loop has exited.
    pub fn join(self) {
        let _ = self.done_rx.recv();
    }
}
