//! Multi-voxel flora grown from a surface anchor.
#![forbid(unsafe_code)]

use loam_blocks::BlockId;
use loam_world::{FloraPalette, FloraSite, NoiseSource, VoxelEdit, VoxelPos};

#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum FloraKind {
    Tree,
    Cactus,
}

impl FloraKind {
    #[inline]
    pub fn from_index(i: u8) -> Option<FloraKind> {
        match i {
            0 => Some(FloraKind::Tree),
            1 => Some(FloraKind::Cactus),
            _ => None,
        }
    }
}

/// Edits for one structure, in placement order. Unknown kinds yield nothing.
pub fn generate(
    kind: u8,
    anchor: VoxelPos,
    min_height: i32,
    max_height: i32,
    noise: &NoiseSource,
    palette: &FloraPalette,
) -> Vec<VoxelEdit> {
    match FloraKind::from_index(kind) {
        Some(FloraKind::Tree) => make_tree(anchor, min_height, max_height, noise, palette),
        Some(FloraKind::Cactus) => make_cactus(anchor, min_height, max_height, noise, palette),
        None => {
            log::debug!(target: "worldgen", "unknown flora kind {kind} at {anchor}; skipped");
            Vec::new()
        }
    }
}

#[inline]
pub fn generate_site(site: &FloraSite, noise: &NoiseSource, palette: &FloraPalette) -> Vec<VoxelEdit> {
    generate(
        site.kind,
        site.anchor,
        site.min_height,
        site.max_height,
        noise,
        palette,
    )
}

fn trunk_height(
    anchor: VoxelPos,
    min_height: i32,
    max_height: i32,
    offset: f32,
    scale: f32,
    noise: &NoiseSource,
) -> i32 {
    let max = max_height.max(min_height);
    let h = (max as f32 * noise.noise2(anchor.x, anchor.z, offset, scale)) as i32;
    h.clamp(min_height, max)
}

#[inline]
fn is_corner(dx: i32, dz: i32) -> bool {
    dx.abs() == 2 && dz.abs() == 2
}

fn make_tree(
    anchor: VoxelPos,
    min_height: i32,
    max_height: i32,
    noise: &NoiseSource,
    palette: &FloraPalette,
) -> Vec<VoxelEdit> {
    let h = trunk_height(anchor, min_height, max_height, 250.0, 3.0, noise);
    let mut out = Vec::with_capacity(128);
    let mut put = |dx: i32, dy: i32, dz: i32, id: BlockId| {
        out.push(VoxelEdit::new(anchor.offset(dx, dy, dz), id));
    };

    // Canopy body: two full 5x5 layers.
    for dx in -2..=2 {
        for dy in 1..=2 {
            for dz in -2..=2 {
                put(dx, dy + h, dz, palette.leaves);
            }
        }
    }
    // Rims below and above the body, corners clipped.
    for dy in [h, h + 3] {
        for dx in -2..=2 {
            for dz in -2..=2 {
                if !is_corner(dx, dz) {
                    put(dx, dy, dz, palette.leaves);
                }
            }
        }
    }
    for dx in -1..=1 {
        for dz in -1..=1 {
            put(dx, h + 4, dz, palette.leaves);
        }
    }
    // Trunk runs up into the canopy and wins over the leaves it crosses.
    for dy in 1..h + 3 {
        put(0, dy, 0, palette.log);
    }
    out
}

fn make_cactus(
    anchor: VoxelPos,
    min_height: i32,
    max_height: i32,
    noise: &NoiseSource,
    palette: &FloraPalette,
) -> Vec<VoxelEdit> {
    let h = trunk_height(anchor, min_height, max_height, 1530.0, 2.0, noise);
    let mut out = Vec::with_capacity(h.max(0) as usize + 1);
    for dy in 1..=h {
        out.push(VoxelEdit::new(anchor.offset(0, dy, 0), palette.cactus));
    }
    out.push(VoxelEdit::new(anchor.offset(0, h + 1, 0), palette.cactus_top));
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn palette() -> FloraPalette {
        FloraPalette {
            log: 6,
            leaves: 11,
            cactus: 12,
            cactus_top: 13,
        }
    }

    #[test]
    fn tree_at_fifty_spans_expected_heights() {
        let noise = NoiseSource::new(0, 16);
        let edits = generate(0, VoxelPos::new(0, 50, 0), 5, 12, &noise, &palette());
        assert!(!edits.is_empty());
        for e in &edits {
            assert!((51..=66).contains(&e.pos.y), "y {} out of range", e.pos.y);
            assert!((-2..=2).contains(&e.pos.x) && (-2..=2).contains(&e.pos.z));
        }
        // The trunk is placed last and starts right above the anchor.
        let last_logs: Vec<_> = edits.iter().rev().take_while(|e| e.id == 6).collect();
        assert!(last_logs.iter().all(|e| e.pos.x == 0 && e.pos.z == 0));
        assert!(last_logs.iter().any(|e| e.pos.y == 51));
    }

    #[test]
    fn tree_layers_clip_corners() {
        let noise = NoiseSource::new(9, 16);
        let anchor = VoxelPos::new(100, 60, 100);
        let edits = generate(0, anchor, 5, 5, &noise, &palette());
        // min == max pins the trunk height.
        let h = 5;
        let corner_low = anchor.offset(2, h, 2);
        let corner_body = anchor.offset(2, h + 1, 2);
        assert!(!edits.iter().any(|e| e.pos == corner_low));
        assert!(edits.iter().any(|e| e.pos == corner_body && e.id == 11));
        let logs = edits.iter().filter(|e| e.id == 6).count() as i32;
        assert_eq!(logs, h + 2);
        // 50 body + 2 * 21 rims + 9 cap + trunk
        assert_eq!(edits.len() as i32, 50 + 42 + 9 + h + 2);
    }

    #[test]
    fn cactus_has_body_and_cap() {
        let noise = NoiseSource::new(4, 16);
        let anchor = VoxelPos::new(10, 45, 10);
        let edits = generate(1, anchor, 3, 3, &noise, &palette());
        assert_eq!(edits.len(), 4);
        assert!(edits[..3].iter().all(|e| e.id == 12));
        assert_eq!(edits[3], VoxelEdit::new(anchor.offset(0, 4, 0), 13));
    }

    #[test]
    fn unknown_kind_is_empty() {
        let noise = NoiseSource::new(4, 16);
        assert!(generate(7, VoxelPos::new(1, 2, 3), 5, 12, &noise, &palette()).is_empty());
    }
}
