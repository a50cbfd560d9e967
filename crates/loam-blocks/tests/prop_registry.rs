use loam_blocks::config::{BlockDef, BlocksConfig, TextureSpec};
use loam_blocks::{AIR, BlockRegistry};
use proptest::prelude::*;

fn defs() -> impl Strategy<Value = Vec<(bool, bool, f32, u16)>> {
    prop::collection::vec((any::<bool>(), any::<bool>(), -1.0f32..2.0, 0u16..256), 1..40)
}

proptest! {
    // Sequentially numbered definitions all register and keep their properties.
    #[test]
    fn sequential_defs_register(entries in defs()) {
        let blocks: Vec<BlockDef> = entries
            .iter()
            .enumerate()
            .map(|(i, &(solid, transparent, transparency, tex))| {
                let mut d = BlockDef::named(format!("b{i}"));
                d.solid = Some(solid);
                d.transparent = Some(transparent);
                d.transparency = Some(transparency);
                d.textures = Some(TextureSpec::All(tex));
                d
            })
            .collect();
        let reg = BlockRegistry::from_config(BlocksConfig { blocks }).unwrap();
        prop_assert_eq!(reg.len(), entries.len() + 1);
        for (i, &(solid, transparent, _, tex)) in entries.iter().enumerate() {
            let id = reg.id_by_name(&format!("b{i}")).unwrap();
            prop_assert_eq!(id as usize, i + 1);
            let ty = reg.ty(id);
            prop_assert_eq!(ty.solid, solid);
            prop_assert_eq!(ty.transparent, transparent);
            prop_assert_eq!(ty.render_neighbor_faces, !solid);
            prop_assert!((0.0..=1.0).contains(&ty.transparency));
            prop_assert!(ty.textures.iter().all(|&t| t == tex));
        }
    }

    // Every id resolves to some block type; unregistered ids act as air.
    #[test]
    fn every_id_resolves(id in any::<u8>()) {
        let reg = BlockRegistry::builtin().unwrap();
        let ty = reg.ty(id);
        if reg.get(id).is_none() {
            prop_assert_eq!(ty.id, AIR);
            prop_assert!(!ty.solid);
        } else {
            prop_assert_eq!(ty.id, id);
        }
    }
}
