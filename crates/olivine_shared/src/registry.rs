use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Face order used by the `faces` table and the mesher: `+x, -x, +y, -y, +z, -z`.
pub const FACE_COUNT: usize = 6;

#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct BlockId(pub u8);

impl BlockId {
    pub const EMPTY: Self = Self(0);
}

/// Dense material id, assigned from 1 in registration order. `NONE` (0)
/// doubles as the "no face material" entry in the faces table, so the
/// stored values are already the `index + 1` encoding.
#[repr(transparent)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MaterialId(pub u8);

impl MaterialId {
    pub const NONE: Self = Self(0);
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Texture {
    pub url: String,
    pub alpha_test: bool,
}

#[derive(Clone, Debug)]
pub struct Material {
    pub color: [f32; 4],
    pub liquid: bool,
    pub texture: Option<Texture>,
}

impl Material {
    fn fully_opaque(&self) -> bool {
        if self.liquid || self.color[3] < 1.0 {
            return false;
        }
        self.texture.as_ref().map_or(true, |t| !t.alpha_test)
    }
}

/// Block and material tables. Blocks are flyweights: a `BlockId` indexes the
/// parallel `solid`/`opaque` arrays and a six-wide slice of `faces`.
///
/// All contract violations (duplicate or empty material names, unknown names
/// in `add_block`, bad ids) are programming bugs and panic.
#[derive(Debug, Default)]
pub struct Registry {
    materials: Vec<Material>,
    names: Vec<String>,
    by_name: HashMap<String, MaterialId>,
    solid: Vec<bool>,
    opaque: Vec<bool>,
    faces: Vec<MaterialId>,
}

impl Registry {
    pub fn new() -> Self {
        let mut registry = Self::default();
        // Block 0 is the canonical empty block: not solid, not opaque, no faces.
        registry.solid.push(false);
        registry.opaque.push(false);
        registry.faces.extend([MaterialId::NONE; FACE_COUNT]);
        registry
    }

    pub fn add_color_material(
        &mut self,
        name: &str,
        color: [f32; 4],
        liquid: bool,
    ) -> MaterialId {
        self.add_material(
            name,
            Material {
                color,
                liquid,
                texture: None,
            },
        )
    }

    pub fn add_textured_material(&mut self, name: &str, texture: Texture) -> MaterialId {
        self.add_material(
            name,
            Material {
                color: [1.0, 1.0, 1.0, 1.0],
                liquid: false,
                texture: Some(texture),
            },
        )
    }

    fn add_material(&mut self, name: &str, material: Material) -> MaterialId {
        assert!(!name.is_empty(), "material name must be non-empty");
        assert!(
            !self.by_name.contains_key(name),
            "duplicate material name: {name:?}"
        );

        let id = MaterialId(
            u8::try_from(self.materials.len() + 1)
                .expect("material registry exceeded MaterialId capacity (u8::MAX)"),
        );
        self.materials.push(material);
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }

    /// Register a block from 1, 2, 3 or 6 material names:
    /// one name covers all faces; two are `[top/bottom, sides]`; three are
    /// `[top, bottom, sides]`; six are explicit in `+x, -x, +y, -y, +z, -z`
    /// order.
    pub fn add_block(&mut self, names: &[&str], solid: bool) -> BlockId {
        let ids: Vec<MaterialId> = names
            .iter()
            .map(|name| {
                *self
                    .by_name
                    .get(*name)
                    .unwrap_or_else(|| panic!("unknown material name in add_block: {name:?}"))
            })
            .collect();

        let face_ids: [MaterialId; FACE_COUNT] = match ids.as_slice() {
            [all] => [*all; FACE_COUNT],
            [cap, side] => [*side, *side, *cap, *cap, *side, *side],
            [top, bottom, side] => [*side, *side, *top, *bottom, *side, *side],
            [px, nx, py, ny, pz, nz] => [*px, *nx, *py, *ny, *pz, *nz],
            _ => panic!(
                "add_block takes 1, 2, 3 or 6 material names, got {}",
                names.len()
            ),
        };

        let id = BlockId(
            u8::try_from(self.solid.len())
                .expect("block registry exceeded BlockId capacity (u8::MAX)"),
        );
        let opaque = solid
            && face_ids
                .iter()
                .all(|&face| self.material(face).fully_opaque());
        self.solid.push(solid);
        self.opaque.push(opaque);
        self.faces.extend(face_ids);
        id
    }

    pub fn block_face_material(&self, block: BlockId, face: usize) -> MaterialId {
        debug_assert!(face < FACE_COUNT);
        self.faces[block.0 as usize * FACE_COUNT + face]
    }

    pub fn material(&self, id: MaterialId) -> &Material {
        assert!(
            id != MaterialId::NONE && (id.0 as usize) <= self.materials.len(),
            "bad material id: {:?}",
            id
        );
        &self.materials[id.0 as usize - 1]
    }

    pub fn material_name(&self, id: MaterialId) -> &str {
        assert!(
            id != MaterialId::NONE && (id.0 as usize) <= self.names.len(),
            "bad material id: {:?}",
            id
        );
        &self.names[id.0 as usize - 1]
    }

    pub fn is_solid(&self, block: BlockId) -> bool {
        self.solid[block.0 as usize]
    }

    pub fn is_opaque(&self, block: BlockId) -> bool {
        self.opaque[block.0 as usize]
    }

    pub fn block_count(&self) -> usize {
        self.solid.len()
    }
}

/// Block ids the world generator emits.
#[derive(Copy, Clone, Debug)]
pub struct TerrainBlocks {
    pub empty: BlockId,
    pub rock: BlockId,
    pub dirt: BlockId,
    pub sand: BlockId,
    pub grass: BlockId,
    pub snow: BlockId,
    pub water: BlockId,
    pub leaves: BlockId,
}

/// Register the canonical terrain palette and return the generator's id
/// table.
pub fn register_default_blocks(registry: &mut Registry) -> TerrainBlocks {
    registry.add_color_material("rock", [0.47, 0.47, 0.47, 1.0], false);
    registry.add_color_material("dirt", [0.52, 0.39, 0.27, 1.0], false);
    registry.add_color_material("sand", [0.87, 0.81, 0.64, 1.0], false);
    registry.add_color_material("grass", [0.31, 0.60, 0.28, 1.0], false);
    registry.add_color_material("grass-side", [0.42, 0.51, 0.30, 1.0], false);
    registry.add_color_material("snow", [0.95, 0.95, 0.97, 1.0], false);
    registry.add_color_material("water", [0.24, 0.45, 0.84, 0.75], true);
    registry.add_color_material("leaves", [0.22, 0.48, 0.20, 1.0], false);

    TerrainBlocks {
        empty: BlockId::EMPTY,
        rock: registry.add_block(&["rock"], true),
        dirt: registry.add_block(&["dirt"], true),
        sand: registry.add_block(&["sand"], true),
        grass: registry.add_block(&["grass", "dirt", "grass-side"], true),
        snow: registry.add_block(&["snow"], true),
        water: registry.add_block(&["water"], false),
        leaves: registry.add_block(&["leaves"], true),
    }
}
