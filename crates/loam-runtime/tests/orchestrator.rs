use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use loam_blocks::BlockRegistry;
use loam_io::{PersistenceStore, WorldMeta};
use loam_mesh_cpu::MeshPayload;
use loam_runtime::{ChunkState, Orchestrator, RuntimeError, RuntimeSettings, SettingsError};
use loam_world::{ChunkCoord, VoxelPos, WorldDims, WorldGenParams};

const GLASS: u8 = 10;

fn settings(root: &Path, threading: bool) -> RuntimeSettings {
    RuntimeSettings {
        world_name: "test".into(),
        seed: 7,
        save_root: root.to_path_buf(),
        view_distance: 1,
        evict_distance: 2,
        threading,
        light_falloff: 0.08,
        dims: WorldDims {
            chunk_width: 16,
            chunk_height: 128,
            world_chunks: 8,
            atlas_tiles: 16,
        },
    }
}

fn open(root: &Path, threading: bool) -> Orchestrator {
    let reg = Arc::new(BlockRegistry::builtin().unwrap());
    let params = Arc::new(WorldGenParams::builtin(&reg).unwrap());
    Orchestrator::open(settings(root, threading), reg, params).unwrap()
}

fn settle(o: &Orchestrator) {
    assert!(o.wait_idle(Duration::from_secs(60)), "runtime did not go idle");
}

fn drain(o: &Orchestrator) -> Vec<MeshPayload> {
    std::iter::from_fn(|| o.drain_next_ready_mesh()).collect()
}

fn mesh_coords(meshes: &[MeshPayload]) -> BTreeSet<ChunkCoord> {
    meshes.iter().map(|m| m.coord).collect()
}

/// Centre of chunk (2, 2).
fn center() -> VoxelPos {
    VoxelPos::new(40, 60, 40)
}

#[test]
fn view_populates_and_meshes_the_active_square() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), false);
    let update = o.set_view_center(center());
    assert_eq!(update.center, Some(ChunkCoord::new(2, 2)));
    assert_eq!(update.activated, 9);
    settle(&o);

    let active = o.active_chunks();
    assert_eq!(active.len(), 9);
    for c in &active {
        let status = o.chunk_status(*c).unwrap();
        assert!(status.active);
        assert_eq!(status.state, ChunkState::Meshed, "chunk {c}");
    }
    let meshes = drain(&o);
    assert_eq!(mesh_coords(&meshes), active.iter().copied().collect());
    assert!(meshes.iter().all(|m| !m.transparent.is_empty()));

    // Staying inside the same chunk is a no-op.
    assert_eq!(o.set_view_center(VoxelPos::new(33, 0, 47)).scheduled, 0);
}

#[test]
fn view_is_clipped_to_the_world() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), false);
    let update = o.set_view_center(VoxelPos::new(0, 60, 0));
    assert_eq!(update.activated, 4);
    settle(&o);
    assert_eq!(
        o.active_chunks(),
        vec![
            ChunkCoord::new(0, 0),
            ChunkCoord::new(0, 1),
            ChunkCoord::new(1, 0),
            ChunkCoord::new(1, 1),
        ]
    );
}

#[test]
fn queries_outside_the_world_are_out_of_bounds() {
    let dir = tempfile::tempdir().unwrap();
    let o = open(dir.path(), false);
    let edge = 8 * 16;
    for p in [
        VoxelPos::new(5, -1, 5),
        VoxelPos::new(5, 128, 5),
        VoxelPos::new(-1, 10, 5),
        VoxelPos::new(5, 10, edge),
        VoxelPos::new(edge, 10, 5),
    ] {
        assert!(o.get_voxel(p).is_err(), "{p}");
        assert!(o.set_voxel(p, GLASS).is_err(), "{p}");
    }
    assert!(o.get_voxel(VoxelPos::new(edge - 1, 127, edge - 1)).is_ok());
}

#[test]
fn degenerate_dims_never_reach_the_worker() {
    let dir = tempfile::tempdir().unwrap();
    let reg = Arc::new(BlockRegistry::builtin().unwrap());
    let params = Arc::new(WorldGenParams::builtin(&reg).unwrap());

    let mut flat = settings(dir.path(), false);
    flat.dims.chunk_height = 0;
    let err = Orchestrator::open(flat, Arc::clone(&reg), Arc::clone(&params)).err();
    assert!(matches!(err, Some(RuntimeError::Settings(SettingsError::Dims(_)))));

    // A world.toml edited by hand is refused as corrupt.
    let store = PersistenceStore::new(dir.path());
    let mut dims = settings(dir.path(), false).dims;
    dims.chunk_width = 0;
    store.save_world(&WorldMeta::new("test", 7, dims)).unwrap();
    let err = Orchestrator::open(settings(dir.path(), false), reg, params).err();
    assert!(matches!(err, Some(RuntimeError::Persist(e)) if e.is_corrupt()));
}

#[test]
fn unpopulated_chunks_answer_with_terrain() {
    let dir = tempfile::tempdir().unwrap();
    let o = open(dir.path(), false);
    let world = &o.context().world;
    let bedrock = o.get_voxel(VoxelPos::new(3, 0, 3)).unwrap();
    assert_eq!(bedrock.id, 1);
    assert_eq!(bedrock.light, 0.0);
    for y in [1, 40, 60, 90, 127] {
        let p = VoxelPos::new(20, y, 70);
        let v = o.get_voxel(p).unwrap();
        assert_eq!(v.id, world.block_at(p));
        assert_eq!(v.light, if v.id == 0 { 1.0 } else { 0.0 });
    }
    assert_eq!(o.chunk_status(ChunkCoord::new(1, 4)), None);
}

#[test]
fn edits_are_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), false);
    o.set_view_center(center());
    settle(&o);
    drain(&o);

    let p = VoxelPos::new(37, 1, 41);
    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    assert!(o.chunk_status(ChunkCoord::new(2, 2)).unwrap().dirty);
    assert_eq!(mesh_coords(&drain(&o)), BTreeSet::from([ChunkCoord::new(2, 2)]));

    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    assert!(drain(&o).is_empty(), "an unchanged voxel must not remesh");
}

#[test]
fn boundary_edit_remeshes_the_neighbour() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), false);
    o.set_view_center(center());
    settle(&o);
    drain(&o);

    // x = 32 is local x = 0 of chunk (2, 2).
    o.set_voxel(VoxelPos::new(32, 1, 40), GLASS).unwrap();
    settle(&o);
    assert_eq!(
        mesh_coords(&drain(&o)),
        BTreeSet::from([ChunkCoord::new(1, 2), ChunkCoord::new(2, 2)])
    );

    // One voxel in from the edge only touches its own chunk.
    o.set_voxel(VoxelPos::new(33, 1, 40), GLASS).unwrap();
    settle(&o);
    assert_eq!(mesh_coords(&drain(&o)), BTreeSet::from([ChunkCoord::new(2, 2)]));
}

#[test]
fn edits_outside_the_view_populate_their_chunk() {
    let dir = tempfile::tempdir().unwrap();
    let o = open(dir.path(), false);
    let p = VoxelPos::new(100, 1, 100);
    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    let status = o.chunk_status(ChunkCoord::new(6, 6)).unwrap();
    assert_eq!(status.state, ChunkState::Populated);
    assert!(!status.active);
    assert!(status.dirty);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    assert!(drain(&o).is_empty(), "inactive chunks are not meshed");
}

#[test]
fn save_then_reopen_restores_edits() {
    let dir = tempfile::tempdir().unwrap();
    let p = VoxelPos::new(38, 1, 38);
    {
        let mut o = open(dir.path(), false);
        o.set_view_center(center());
        settle(&o);
        o.set_voxel(p, GLASS).unwrap();
        settle(&o);

        let report = o.save_blocking();
        assert!(report.is_clean());
        assert!(report.written >= 1);
        assert!(!o.chunk_status(ChunkCoord::new(2, 2)).unwrap().dirty);
        assert_eq!(o.stats().dirty_chunks, 0);
        o.shutdown();
    }

    let mut o = open(dir.path(), false);
    assert_eq!(o.seed(), 7);
    o.set_view_center(center());
    settle(&o);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    assert!(!o.chunk_status(ChunkCoord::new(2, 2)).unwrap().dirty);
}

#[test]
fn eviction_flushes_dirty_chunks() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), false);
    o.set_view_center(VoxelPos::new(20, 60, 20));
    settle(&o);
    let p = VoxelPos::new(3, 1, 3);
    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    assert!(o.chunk_status(ChunkCoord::new(0, 0)).unwrap().dirty);

    let update = o.set_view_center(VoxelPos::new(110, 60, 110));
    assert!(update.evicting > 0);
    settle(&o);
    assert_eq!(o.chunk_status(ChunkCoord::new(0, 0)), None);
    let file = o
        .context()
        .persist
        .chunk_path("test", ChunkCoord::new(0, 0));
    assert!(file.exists());

    o.set_view_center(VoxelPos::new(20, 60, 20));
    settle(&o);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
}

#[test]
fn load_switches_worlds() {
    let dir = tempfile::tempdir().unwrap();
    let p = VoxelPos::new(36, 1, 36);
    let mut o = open(dir.path(), false);
    o.set_view_center(center());
    settle(&o);
    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    o.save_blocking();

    assert!(matches!(
        o.request_load("nowhere"),
        Err(RuntimeError::WorldNotFound(name)) if name == "nowhere"
    ));

    // Unsaved edits are dropped by the reload.
    let q = VoxelPos::new(35, 1, 35);
    o.set_voxel(q, GLASS).unwrap();
    settle(&o);
    o.request_load("test").unwrap();
    settle(&o);
    assert_eq!(o.world_name(), "test");
    assert_eq!(o.active_chunks().len(), 9);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    assert_ne!(o.get_voxel(q).unwrap().id, GLASS);
}

#[test]
fn threaded_worker_reaches_idle() {
    let dir = tempfile::tempdir().unwrap();
    let mut o = open(dir.path(), true);
    o.set_view_center(center());
    settle(&o);
    assert_eq!(o.pump(), 0);
    assert_eq!(mesh_coords(&drain(&o)).len(), 9);

    let p = VoxelPos::new(32, 1, 40);
    o.set_voxel(p, GLASS).unwrap();
    settle(&o);
    assert_eq!(o.get_voxel(p).unwrap().id, GLASS);
    let ticket = o.request_save();
    let report = ticket.wait();
    assert!(report.is_clean());
    o.shutdown();
}
