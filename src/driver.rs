use std::time::{Duration, Instant};

use loam_mesh_cpu::mesh_stats;
use loam_runtime::Orchestrator;
use loam_world::VoxelPos;

const STEP_TIMEOUT: Duration = Duration::from_secs(120);

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct DriveSummary {
    pub steps: u32,
    pub meshes: usize,
    pub opaque_quads: usize,
    pub transparent_quads: usize,
    /// Where the demo edit landed, if a surface was found.
    pub edit: Option<VoxelPos>,
    pub saved: usize,
    pub save_failures: usize,
}

/// Walks the view centre `steps` chunks along +x from the middle of the
/// world, draining meshes after each step, then stacks `block` on the
/// surface under the last position and saves.
pub fn drive(world: &mut Orchestrator, steps: u32, block: u8) -> DriveSummary {
    let dims = world.dims();
    let mid = dims.center_voxel();
    let stride = dims.chunk_width as i32;
    let mut summary = DriveSummary::default();
    let mut pos = VoxelPos::new(mid, 0, mid);

    for step in 0..steps {
        pos = VoxelPos::new(mid + step as i32 * stride, 0, mid);
        let t0 = Instant::now();
        let update = world.set_view_center(pos);
        if !world.wait_idle(STEP_TIMEOUT) {
            log::warn!(target: "driver", "step {step}: worker still busy after {STEP_TIMEOUT:?}");
        }
        let before = summary.meshes;
        drain_meshes(world, &mut summary);
        log::info!(
            target: "driver",
            "step {step}: centre {}, {} new active, {} mesh(es) in {}ms",
            update.center.map(|c| c.to_string()).unwrap_or_default(),
            update.activated,
            summary.meshes - before,
            t0.elapsed().as_millis()
        );
        summary.steps += 1;
    }

    if let Some(surface) = surface_at(world, pos.x, pos.z) {
        let target = surface.offset(0, 1, 0);
        if world.set_voxel(target, block).is_ok() {
            world.wait_idle(STEP_TIMEOUT);
            drain_meshes(world, &mut summary);
            log::info!(target: "driver", "placed block {block} at {target}");
            summary.edit = Some(target);
        }
    }

    let report = world.save_blocking();
    summary.saved = report.written;
    summary.save_failures = report.failed.len();
    summary
}

fn drain_meshes(world: &Orchestrator, summary: &mut DriveSummary) {
    while let Some(mesh) = world.drain_next_ready_mesh() {
        let stats = mesh_stats(&mesh);
        summary.meshes += 1;
        summary.opaque_quads += stats.opaque_quads;
        summary.transparent_quads += stats.transparent_quads;
    }
}

/// Highest non-air voxel of a column below the top layer.
fn surface_at(world: &Orchestrator, x: i32, z: i32) -> Option<VoxelPos> {
    let top = world.dims().chunk_height as i32 - 2;
    (0..=top)
        .rev()
        .map(|y| VoxelPos::new(x, y, z))
        .find(|p| world.get_voxel(*p).is_ok_and(|v| v.id != 0))
}
