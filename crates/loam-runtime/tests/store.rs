use std::fs;
use std::path::Path;
use std::sync::Arc;

use loam_blocks::BlockRegistry;
use loam_chunk::populate_chunk;
use loam_edit::EditQueue;
use loam_io::PersistenceStore;
use loam_runtime::{ChunkState, ChunkStore, EditOutcome, WorldContext};
use loam_world::{ChunkCoord, VoxelEdit, VoxelPos, World, WorldDims, WorldGenParams};
use proptest::prelude::*;

fn dims() -> WorldDims {
    WorldDims {
        chunk_width: 16,
        chunk_height: 128,
        world_chunks: 4,
        atlas_tiles: 16,
    }
}

fn store(root: &Path) -> ChunkStore {
    let reg = Arc::new(BlockRegistry::builtin().unwrap());
    let params = WorldGenParams::builtin(&reg).unwrap();
    let world = World::new(dims(), 3, params);
    let ctx = WorldContext::new(world, reg, PersistenceStore::new(root), "unit", 0.08);
    ChunkStore::new(Arc::new(ctx))
}

#[test]
fn edits_park_until_the_chunk_is_populated() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());
    let edits = EditQueue::new();
    let coord = ChunkCoord::new(1, 1);
    let p = VoxelPos::new(20, 2, 20);

    assert_eq!(s.apply_edit(VoxelEdit::new(p, 10)), EditOutcome::Parked);
    let status = s.status(coord).unwrap();
    assert_eq!(status.state, ChunkState::Unloaded);
    assert_eq!(status.parked, 1);
    assert!(!status.dirty);

    let chunk = s.get_or_create(coord, &edits).unwrap();
    assert_eq!(chunk.get_world(p).unwrap().id, 10);
    let status = s.status(coord).unwrap();
    assert_eq!(status.state, ChunkState::Populated);
    assert_eq!(status.parked, 0);
    assert!(status.dirty);
}

#[test]
fn generated_chunks_are_clean_and_match_population() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());
    let edits = EditQueue::new();
    let coord = ChunkCoord::new(2, 0);
    let chunk = s.get_or_create(coord, &edits).unwrap();
    let expected = populate_chunk(&s.ctx().world, coord);
    assert_eq!(chunk.ids, expected.chunk.ids);
    assert!(!s.status(coord).unwrap().dirty);
    assert_eq!(edits.stats().batches, expected.structures.len());

    // A second call hands back the same snapshot.
    let again = s.get_or_create(coord, &edits).unwrap();
    assert!(Arc::ptr_eq(&chunk, &again));
    assert!(s.get_or_create(ChunkCoord::new(4, 0), &edits).is_none());
}

#[test]
fn corrupt_chunk_files_fall_back_to_generation() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());
    let coord = ChunkCoord::new(0, 3);
    let path = s.ctx().persist.chunk_path("unit", coord);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(&path, b"definitely not a chunk").unwrap();

    let chunk = s.get_or_create(coord, &EditQueue::new()).unwrap();
    let expected = populate_chunk(&s.ctx().world, coord);
    assert_eq!(chunk.ids, expected.chunk.ids);
}

#[test]
fn snapshots_survive_later_edits() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());
    let coord = ChunkCoord::new(0, 0);
    let before = s.get_or_create(coord, &EditQueue::new()).unwrap();
    let p = VoxelPos::new(5, 1, 5);
    let old = before.get_world(p).unwrap().id;

    assert_eq!(
        s.apply_edit(VoxelEdit::new(p, 10)),
        EditOutcome::Applied { changed: true }
    );
    assert_eq!(before.get_world(p).unwrap().id, old);
    assert_eq!(s.voxel(p).unwrap().id, 10);
    assert_eq!(
        s.apply_edit(VoxelEdit::new(p, 10)),
        EditOutcome::Applied { changed: false }
    );
    assert_eq!(
        s.apply_edit(VoxelEdit::new(VoxelPos::new(5, 500, 5), 10)),
        EditOutcome::OutOfBounds
    );
}

#[test]
fn relight_keeps_light_in_range() {
    let dir = tempfile::tempdir().unwrap();
    let s = store(dir.path());
    let coord = ChunkCoord::new(1, 0);
    s.get_or_create(coord, &EditQueue::new()).unwrap();
    // Dig a shaft from the top of the chunk down to y = 2.
    for y in 2..128 {
        s.apply_edit(VoxelEdit::new(VoxelPos::new(24, y, 8), 0));
    }
    s.relight(coord);
    let chunk = s.snapshot(coord).unwrap();
    assert!(chunk.light.iter().all(|l| (0.0..=1.0).contains(l)));
    assert_eq!(chunk.get_world(VoxelPos::new(24, 2, 8)).unwrap().light, 1.0);
}

proptest! {
    #![proptest_config(ProptestConfig { cases: 24, .. ProptestConfig::default() })]

    #[test]
    fn voxel_queries_never_panic(x in -40i32..100, y in -20i32..160, z in -40i32..100) {
        let dir = tempfile::tempdir().unwrap();
        let s = store(dir.path());
        let p = VoxelPos::new(x, y, z);
        let inside = dims().contains_voxel(p);
        prop_assert_eq!(s.voxel(p).is_ok(), inside);
        if inside {
            let v = s.voxel(p).unwrap();
            prop_assert!((0.0..=1.0).contains(&v.light));
        }
    }
}
