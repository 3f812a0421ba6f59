use bytemuck::{Pod, Zeroable};

/// One greedy-meshed rectangle. The field order is the wire format the
/// shader indexes by; see the offset constants on [`Geometry`].
#[repr(C)]
#[derive(Copy, Clone, Debug, Default, PartialEq, Pod, Zeroable)]
pub struct Quad {
    pub pos: [f32; 3],
    pub size: [f32; 2],
    pub color: [f32; 4],
    /// Four 2-bit corner AO values, packed little-endian as
    /// `a00 | a10 << 2 | a11 << 4 | a01 << 6`.
    pub aos: f32,
    /// Face axis: 0, 1 or 2.
    pub dim: f32,
    /// Face direction along the axis: +1 or -1.
    pub dir: f32,
    /// Per-quad styling tag (frontier LOD masks, highlight face index).
    pub mask: f32,
    /// 1 for liquid surfaces the shader should animate.
    pub wave: f32,
    /// Renderer texture index, 0 when untextured.
    pub texture: f32,
    /// 12-bit pack of the six triangle-fan vertex indices, two bits each.
    pub indices: f32,
}

const _: [(); 64] = [(); std::mem::size_of::<Quad>()];

/// Flat fixed-stride quad buffer. Offsets are in 32-bit lanes and are part
/// of the renderer contract: the vertex shader reads quads by
/// `quad_index * STRIDE + OFFSET_*`.
#[derive(Clone, Debug, Default)]
pub struct Geometry {
    data: Vec<f32>,
    dirty: bool,
}

impl Geometry {
    pub const STRIDE: usize = 16;
    pub const OFFSET_POS: usize = 0;
    pub const OFFSET_SIZE: usize = 3;
    pub const OFFSET_COLOR: usize = 5;
    pub const OFFSET_AOS: usize = 9;
    pub const OFFSET_DIM: usize = 10;
    pub const OFFSET_DIR: usize = 11;
    pub const OFFSET_MASK: usize = 12;
    pub const OFFSET_WAVE: usize = 13;
    pub const OFFSET_TEXTURE: usize = 14;
    pub const OFFSET_INDICES: usize = 15;

    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(quads: usize) -> Self {
        Self {
            data: Vec::with_capacity(quads * Self::STRIDE),
            dirty: false,
        }
    }

    pub fn num_quads(&self) -> usize {
        self.data.len() / Self::STRIDE
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
        self.dirty = true;
    }

    pub fn add_quad(&mut self, quad: &Quad) {
        self.data
            .extend_from_slice(bytemuck::cast_slice(std::slice::from_ref(quad)));
        self.dirty = true;
    }

    pub fn data(&self) -> &[f32] {
        &self.data
    }

    pub fn bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn quads(&self) -> &[Quad] {
        bytemuck::cast_slice(&self.data)
    }

    pub fn quads_mut(&mut self) -> &mut [Quad] {
        self.dirty = true;
        bytemuck::cast_slice_mut(&mut self.data)
    }

    pub fn dirty(&self) -> bool {
        self.dirty
    }

    /// Called by the renderer after uploading.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }
}
