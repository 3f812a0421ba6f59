use olivine_shared::registry::{BlockId, MaterialId, Registry};
use olivine_shared::tensor::Tensor3;
use rustc_hash::FxHashMap;

use super::geometry::{Geometry, Quad};
use super::{Renderer, VoxelMesh};

/// Highlight cubes are grown by this much per side so they never z-fight
/// the block they outline.
const HIGHLIGHT_EPSILON: f32 = 1.0 / 256.0;
const HIGHLIGHT_COLOR: [f32; 4] = [1.0, 1.0, 1.0, 0.4];

/// Transient marker ORed into `FrontierCell::block` while the top-face pass
/// merges cells. Cleared before `mesh_frontier` returns.
const FRONTIER_SENTINEL: i32 = 1 << 30;

const fn pack_fan(indices: [u32; 6]) -> u32 {
    indices[0]
        | indices[1] << 2
        | indices[2] << 4
        | indices[3] << 6
        | indices[4] << 8
        | indices[5] << 10
}

// Quad corners are numbered 0..3 = a00, a10, a11, a01. Each face draws as
// a fan of two triangles split along one of the diagonals; negative faces
// reverse the winding.
const FAN_POS_MAIN: u32 = pack_fan([0, 1, 2, 0, 2, 3]); // 00-11 split
const FAN_POS_CROSS: u32 = pack_fan([1, 2, 3, 1, 3, 0]); // 10-01 split
const FAN_NEG_MAIN: u32 = pack_fan([0, 2, 1, 0, 3, 2]);
const FAN_NEG_CROSS: u32 = pack_fan([1, 3, 2, 1, 0, 3]);

/// Pick the diagonal that keeps baked AO gradients continuous across the
/// two triangles.
fn fan_indices(ao: u8, positive: bool) -> u32 {
    let a00 = ao & 3;
    let a10 = (ao >> 2) & 3;
    let a11 = (ao >> 4) & 3;
    let a01 = (ao >> 6) & 3;

    let main_split = if a00 == a11 {
        if a10 == a01 {
            false
        } else {
            a00 != 3
        }
    } else if a10 == a01 {
        true
    } else {
        a00 + a11 <= a10 + a01
    };

    match (positive, main_split) {
        (true, true) => FAN_POS_MAIN,
        (true, false) => FAN_POS_CROSS,
        (false, true) => FAN_NEG_MAIN,
        (false, false) => FAN_NEG_CROSS,
    }
}

/// Swap the a10/a01 corners. Used for the axis whose greedy pass runs with
/// permuted in-plane axes: the shader reads AO in standard order.
fn transpose_ao(ao: u8) -> u8 {
    let a10 = (ao >> 2) & 3;
    let a01 = (ao >> 6) & 3;
    (ao & 0x33) | (a01 << 2) | (a10 << 6)
}

/// Signed face material between two voxels along axis `d`. Positive values
/// are faces of `block0` pointing +d, negative values faces of `block1`
/// pointing -d, zero means no face.
fn face_material(registry: &Registry, block0: BlockId, block1: BlockId, d: usize) -> i32 {
    let opaque0 = registry.is_opaque(block0);
    let opaque1 = registry.is_opaque(block1);
    if opaque0 && opaque1 {
        return 0;
    }
    if opaque0 {
        return i32::from(registry.block_face_material(block0, 2 * d).0);
    }
    if opaque1 {
        return -i32::from(registry.block_face_material(block1, 2 * d + 1).0);
    }

    let m0 = registry.block_face_material(block0, 2 * d);
    let m1 = registry.block_face_material(block1, 2 * d + 1);
    if m0 == m1 {
        0
    } else if m0 == MaterialId::NONE {
        -i32::from(m1.0)
    } else if m1 == MaterialId::NONE {
        i32::from(m0.0)
    } else {
        0
    }
}

/// Corner occlusion for the voxel a face opens into: each corner counts the
/// two edge-adjacent in-plane neighbors, falling back to the diagonal when
/// both are clear. Packed `a00 | a10 << 2 | a11 << 4 | a01 << 6`.
fn pack_ao(registry: &Registry, voxels: &Tensor3, cell: [usize; 3], u: usize, v: usize) -> u8 {
    let solid_at = |du: isize, dv: isize| -> bool {
        let mut c = cell;
        c[u] = (c[u] as isize + du) as usize;
        c[v] = (c[v] as isize + dv) as usize;
        registry.is_solid(voxels.get(c[0], c[1], c[2]))
    };

    let mut a00 = 0u8;
    let mut a10 = 0u8;
    let mut a11 = 0u8;
    let mut a01 = 0u8;

    if solid_at(-1, 0) {
        a00 += 1;
        a01 += 1;
    }
    if solid_at(1, 0) {
        a10 += 1;
        a11 += 1;
    }
    if solid_at(0, -1) {
        a00 += 1;
        a10 += 1;
    }
    if solid_at(0, 1) {
        a01 += 1;
        a11 += 1;
    }

    if a00 == 0 && solid_at(-1, -1) {
        a00 = 1;
    }
    if a10 == 0 && solid_at(1, -1) {
        a10 = 1;
    }
    if a11 == 0 && solid_at(1, 1) {
        a11 = 1;
    }
    if a01 == 0 && solid_at(-1, 1) {
        a01 = 1;
    }

    a00 | a10 << 2 | a11 << 4 | a01 << 6
}

/// One cell of a far-LOD heightmap: the surface block id in the low bits of
/// `block` and the absolute surface height.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct FrontierCell {
    pub block: i32,
    pub height: i32,
}

/// Greedy terrain mesher. Owns its scratch buffers (masks, two recycled
/// geometry buffers, the renderer-side texture index cache), so one mesher
/// serves one thread.
pub struct TerrainMesher<R: Renderer> {
    renderer: R,
    mask_data: Vec<i32>,
    mask_union: Vec<i32>,
    scratch_solid: Geometry,
    scratch_water: Geometry,
    texture_indices: FxHashMap<MaterialId, u16>,
}

impl<R: Renderer> TerrainMesher<R> {
    pub fn new(renderer: R) -> Self {
        Self {
            renderer,
            mask_data: Vec::new(),
            mask_union: Vec::new(),
            scratch_solid: Geometry::new(),
            scratch_water: Geometry::new(),
            texture_indices: FxHashMap::default(),
        }
    }

    pub fn renderer(&self) -> &R {
        &self.renderer
    }

    pub fn renderer_mut(&mut self) -> &mut R {
        &mut self.renderer
    }

    /// Greedy-mesh a chunk tensor into an opaque and a translucent mesh.
    ///
    /// The tensor carries a one-voxel ring of neighbor data; faces owned by
    /// the ring belong to the neighbor chunk's mesh and are skipped. Old
    /// mesh handles are recycled in place (and their buffers reused) or
    /// disposed when the new output is empty.
    pub fn mesh_chunk(
        &mut self,
        registry: &Registry,
        voxels: &Tensor3,
        old_solid: Option<R::Mesh>,
        old_water: Option<R::Mesh>,
    ) -> (Option<R::Mesh>, Option<R::Mesh>) {
        let mut old_solid = old_solid;
        let mut old_water = old_water;
        let mut solid_geo = match old_solid.as_mut() {
            Some(mesh) => mesh.take_geometry(),
            None => std::mem::take(&mut self.scratch_solid),
        };
        let mut water_geo = match old_water.as_mut() {
            Some(mesh) => mesh.take_geometry(),
            None => std::mem::take(&mut self.scratch_water),
        };
        solid_geo.clear();
        water_geo.clear();

        self.compute_chunk_geometry(registry, voxels, &mut solid_geo, &mut water_geo);

        let solid = self.finish_mesh(old_solid, solid_geo, true);
        let water = self.finish_mesh(old_water, water_geo, false);
        (solid, water)
    }

    fn compute_chunk_geometry(
        &mut self,
        registry: &Registry,
        voxels: &Tensor3,
        solid_geo: &mut Geometry,
        water_geo: &mut Geometry,
    ) {
        let shape = voxels.shape();
        assert!(
            shape.iter().all(|&extent| extent >= 3),
            "chunk tensors need a one-voxel neighbor ring on every axis"
        );

        for d in 0..3 {
            // y is the long axis of a chunk, so the x pass swaps its
            // in-plane axes to keep y innermost; extents and AO are swapped
            // back at emission.
            let (u, v) = match d {
                0 => (2, 1),
                1 => (2, 0),
                _ => (0, 1),
            };
            let lu = shape[u] - 2;
            let lv = shape[v] - 2;
            let slabs = shape[d] - 1;
            let area = lu * lv;
            if self.mask_data.len() < area {
                self.mask_data.resize(area, 0);
            }
            if self.mask_union.len() < lu {
                self.mask_union.resize(lu, 0);
            }

            for id in 0..slabs {
                self.mask_data[..area].fill(0);
                self.mask_union[..lu].fill(0);

                for iu in 0..lu {
                    for iv in 0..lv {
                        let mut c0 = [0usize; 3];
                        c0[d] = id;
                        c0[u] = iu + 1;
                        c0[v] = iv + 1;
                        let block0 = voxels.get(c0[0], c0[1], c0[2]);
                        let mut c1 = c0;
                        c1[d] = id + 1;
                        let block1 = voxels.get(c1[0], c1[1], c1[2]);

                        let material = face_material(registry, block0, block1, d);
                        if material == 0 {
                            continue;
                        }
                        // The first and last slabs touch the neighbor ring;
                        // faces owned by the ring are the neighbor's.
                        if (id == 0 && material > 0) || (id == slabs - 1 && material < 0) {
                            continue;
                        }

                        let occluded = if material > 0 { c1 } else { c0 };
                        let ao = pack_ao(registry, voxels, occluded, u, v);
                        let entry = material << 8 | i32::from(ao);
                        self.mask_data[iu * lv + iv] = entry;
                        self.mask_union[iu] |= entry;
                    }
                }

                for iu in 0..lu {
                    if self.mask_union[iu] == 0 {
                        continue;
                    }
                    let mut iv = 0;
                    while iv < lv {
                        let entry = self.mask_data[iu * lv + iv];
                        if entry == 0 {
                            iv += 1;
                            continue;
                        }

                        let mut h = 1;
                        while iv + h < lv && self.mask_data[iu * lv + iv + h] == entry {
                            h += 1;
                        }
                        let mut w = 1;
                        'grow: while iu + w < lu {
                            let row = (iu + w) * lv + iv;
                            for k in 0..h {
                                if self.mask_data[row + k] != entry {
                                    break 'grow;
                                }
                            }
                            w += 1;
                        }
                        for du in 0..w {
                            let row = (iu + du) * lv + iv;
                            self.mask_data[row..row + h].fill(0);
                        }

                        self.emit_block_quad(
                            registry, solid_geo, water_geo, entry, d, u, v, id, iu, iv, w, h,
                        );
                        iv += h;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_block_quad(
        &mut self,
        registry: &Registry,
        solid_geo: &mut Geometry,
        water_geo: &mut Geometry,
        entry: i32,
        d: usize,
        u: usize,
        v: usize,
        id: usize,
        iu: usize,
        iv: usize,
        w: usize,
        h: usize,
    ) {
        let material_signed = entry >> 8;
        let ao = (entry & 0xff) as u8;
        let positive = material_signed > 0;
        let material_id = MaterialId(material_signed.unsigned_abs() as u8);
        let texture = self.texture_index(registry, material_id);
        let material = registry.material(material_id);

        let (sw, sh, ao_out) = if d == 0 {
            (h, w, transpose_ao(ao))
        } else {
            (w, h, ao)
        };

        let mut pos = [0f32; 3];
        pos[d] = id as f32;
        pos[u] = iu as f32;
        pos[v] = iv as f32;

        let geo = if material.color[3] < 1.0 {
            water_geo
        } else {
            solid_geo
        };
        let quad = Quad {
            pos,
            size: [sw as f32, sh as f32],
            color: material.color,
            aos: f32::from(ao_out),
            dim: d as f32,
            dir: if positive { 1.0 } else { -1.0 },
            mask: 0.0,
            wave: if material.liquid { 1.0 } else { 0.0 },
            texture,
            indices: fan_indices(ao_out, positive) as f32,
        };
        geo.add_quad(&quad);

        // Alpha-tested cutouts draw both sides.
        if material.texture.as_ref().is_some_and(|t| t.alpha_test) {
            geo.add_quad(&Quad {
                dir: -quad.dir,
                indices: fan_indices(ao_out, !positive) as f32,
                ..quad
            });
        }
    }

    /// Mesh a far-LOD frontier tile: a flat `sx`-by-`sz` grid of
    /// `(block, height)` columns, indexed `x + z * sx`. Top faces merge
    /// greedily over equal cells; when `solid`, vertical skirts cover
    /// height steps toward lower neighbors, reusing the top-face material
    /// so distant terrain keeps its surface colors. Every emitted quad is
    /// shifted by `(px, pz)` and tagged with `mask`.
    #[allow(clippy::too_many_arguments)]
    pub fn mesh_frontier(
        &mut self,
        registry: &Registry,
        heightmap: &mut [FrontierCell],
        mask: i32,
        px: i32,
        pz: i32,
        sx: usize,
        sz: usize,
        scale: i32,
        old: Option<R::Mesh>,
        solid: bool,
    ) -> Option<R::Mesh> {
        assert_eq!(heightmap.len(), sx * sz, "heightmap must hold sx * sz cells");

        let mut old = old;
        let mut geo = match old.as_mut() {
            Some(mesh) => mesh.take_geometry(),
            None => std::mem::take(if solid {
                &mut self.scratch_solid
            } else {
                &mut self.scratch_water
            }),
        };
        geo.clear();

        // Top faces: merge equal (block, height) rectangles, marking
        // consumed cells with the sentinel bit so the caller's heightmap
        // can be scanned in place.
        for z in 0..sz {
            for x in 0..sx {
                let cell = heightmap[x + z * sx];
                if cell.block & FRONTIER_SENTINEL != 0 {
                    continue;
                }
                let block = BlockId(cell.block as u8);
                if block == BlockId::EMPTY {
                    continue;
                }

                let mut w = 1;
                while x + w < sx && heightmap[x + w + z * sx] == cell {
                    w += 1;
                }
                let mut h = 1;
                'grow: while z + h < sz {
                    for dx in 0..w {
                        if heightmap[x + dx + (z + h) * sx] != cell {
                            break 'grow;
                        }
                    }
                    h += 1;
                }
                for dz in 0..h {
                    for dx in 0..w {
                        heightmap[x + dx + (z + dz) * sx].block |= FRONTIER_SENTINEL;
                    }
                }

                let material_id = registry.block_face_material(block, 2);
                if material_id == MaterialId::NONE {
                    continue;
                }
                let texture = self.texture_index(registry, material_id);
                let material = registry.material(material_id);
                geo.add_quad(&Quad {
                    pos: [
                        (x as i32 * scale) as f32,
                        cell.height as f32,
                        (z as i32 * scale) as f32,
                    ],
                    size: [(h as i32 * scale) as f32, (w as i32 * scale) as f32],
                    color: material.color,
                    aos: 0.0,
                    dim: 1.0,
                    dir: 1.0,
                    mask: 0.0,
                    wave: if material.liquid { 1.0 } else { 0.0 },
                    texture,
                    indices: fan_indices(0, true) as f32,
                });
            }
        }
        for cell in heightmap.iter_mut() {
            cell.block &= !FRONTIER_SENTINEL;
        }

        if solid {
            self.emit_frontier_skirts(registry, &mut geo, heightmap, sx, sz, scale);
        }

        for quad in geo.quads_mut() {
            quad.pos[0] += px as f32;
            quad.pos[2] += pz as f32;
            quad.mask = mask as f32;
        }

        self.finish_mesh(old, geo, solid)
    }

    fn emit_frontier_skirts(
        &mut self,
        registry: &Registry,
        geo: &mut Geometry,
        heightmap: &[FrontierCell],
        sx: usize,
        sz: usize,
        scale: i32,
    ) {
        // The four horizontal directions as (dx, dz) neighbor offsets.
        for (dx, dz) in [(0i32, -1i32), (1, 0), (0, 1), (-1, 0)] {
            let positive = dx + dz > 0;
            if dx != 0 {
                for x in 0..sx {
                    let nx = x as i32 + dx;
                    if nx < 0 || nx >= sx as i32 {
                        continue;
                    }
                    let nx = nx as usize;
                    let mut z = 0;
                    while z < sz {
                        let cell = heightmap[x + z * sx];
                        let neighbor = heightmap[nx + z * sx].height;
                        if BlockId(cell.block as u8) == BlockId::EMPTY || neighbor >= cell.height {
                            z += 1;
                            continue;
                        }
                        let mut run = 1;
                        while z + run < sz
                            && heightmap[x + (z + run) * sx] == cell
                            && heightmap[nx + (z + run) * sx].height == neighbor
                        {
                            run += 1;
                        }

                        let plane = if positive { x + 1 } else { x };
                        self.emit_skirt_quad(
                            registry,
                            geo,
                            BlockId(cell.block as u8),
                            [
                                (plane as i32 * scale) as f32,
                                neighbor as f32,
                                (z as i32 * scale) as f32,
                            ],
                            0,
                            positive,
                            [
                                (cell.height - neighbor) as f32,
                                (run as i32 * scale) as f32,
                            ],
                        );
                        z += run;
                    }
                }
            } else {
                for z in 0..sz {
                    let nz = z as i32 + dz;
                    if nz < 0 || nz >= sz as i32 {
                        continue;
                    }
                    let nz = nz as usize;
                    let mut x = 0;
                    while x < sx {
                        let cell = heightmap[x + z * sx];
                        let neighbor = heightmap[x + nz * sx].height;
                        if BlockId(cell.block as u8) == BlockId::EMPTY || neighbor >= cell.height {
                            x += 1;
                            continue;
                        }
                        let mut run = 1;
                        while x + run < sx
                            && heightmap[x + run + z * sx] == cell
                            && heightmap[x + run + nz * sx].height == neighbor
                        {
                            run += 1;
                        }

                        let plane = if positive { z + 1 } else { z };
                        self.emit_skirt_quad(
                            registry,
                            geo,
                            BlockId(cell.block as u8),
                            [
                                (x as i32 * scale) as f32,
                                neighbor as f32,
                                (plane as i32 * scale) as f32,
                            ],
                            2,
                            positive,
                            [
                                (run as i32 * scale) as f32,
                                (cell.height - neighbor) as f32,
                            ],
                        );
                        x += run;
                    }
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    fn emit_skirt_quad(
        &mut self,
        registry: &Registry,
        geo: &mut Geometry,
        block: BlockId,
        pos: [f32; 3],
        dim: usize,
        positive: bool,
        size: [f32; 2],
    ) {
        // Skirts reuse the +y face material so grass and snow keep their
        // top colors at distance.
        let material_id = registry.block_face_material(block, 2);
        if material_id == MaterialId::NONE {
            return;
        }
        let texture = self.texture_index(registry, material_id);
        let material = registry.material(material_id);
        geo.add_quad(&Quad {
            pos,
            size,
            color: material.color,
            aos: 0.0,
            dim: dim as f32,
            dir: if positive { 1.0 } else { -1.0 },
            mask: 0.0,
            wave: 0.0,
            texture,
            indices: fan_indices(0, positive) as f32,
        });
    }

    /// Six thin outward faces around the unit cube, grown by a small
    /// epsilon. The `mask` field carries the face index 0..5 so the shader
    /// can draw a single face of the highlight.
    pub fn mesh_highlight(&mut self) -> R::Mesh {
        let mut geo = Geometry::with_capacity(6);
        let e = HIGHLIGHT_EPSILON;

        for face in 0..6u32 {
            let d = (face / 2) as usize;
            let positive = face % 2 == 0;
            let mut pos = [-e; 3];
            pos[d] = if positive { 1.0 + e } else { -e };
            geo.add_quad(&Quad {
                pos,
                size: [1.0 + 2.0 * e, 1.0 + 2.0 * e],
                color: HIGHLIGHT_COLOR,
                aos: 0.0,
                dim: d as f32,
                dir: if positive { 1.0 } else { -1.0 },
                mask: face as f32,
                wave: 0.0,
                texture: 0.0,
                indices: fan_indices(0, positive) as f32,
            });
        }

        self.renderer.add_voxel_mesh(geo, false)
    }

    /// Lazily registered renderer texture index for a material, 0 when the
    /// material is untextured.
    fn texture_index(&mut self, registry: &Registry, id: MaterialId) -> f32 {
        let material = registry.material(id);
        let Some(texture) = material.texture.as_ref() else {
            return 0.0;
        };
        let index = match self.texture_indices.get(&id) {
            Some(&index) => index,
            None => {
                let index = self.renderer.add_texture(texture);
                debug_assert!(index != 0, "renderer texture indices are non-zero");
                self.texture_indices.insert(id, index);
                index
            }
        };
        f32::from(index)
    }

    fn finish_mesh(
        &mut self,
        old: Option<R::Mesh>,
        geometry: Geometry,
        solid: bool,
    ) -> Option<R::Mesh> {
        if geometry.is_empty() {
            // Keep the buffer for the next call, release the handle.
            if solid {
                self.scratch_solid = geometry;
            } else {
                self.scratch_water = geometry;
            }
            if let Some(mesh) = old {
                mesh.dispose();
            }
            return None;
        }

        match old {
            Some(mut mesh) => {
                mesh.set_geometry(geometry);
                Some(mesh)
            }
            None => Some(self.renderer.add_voxel_mesh(geometry, solid)),
        }
    }
}
