pub mod geometry;
pub mod mesher;

pub use geometry::{Geometry, Quad};
pub use mesher::{FrontierCell, TerrainMesher};

use olivine_shared::registry::Texture;

/// The GPU back-end boundary. The engine core never owns GPU resources; it
/// hands finished geometry buffers across this trait and gets opaque
/// handles back.
pub trait Renderer {
    type Mesh: VoxelMesh;

    fn add_voxel_mesh(&mut self, geometry: Geometry, solid: bool) -> Self::Mesh;

    /// Register a texture and return its non-zero shader index. Index 0 is
    /// reserved to mean "no texture".
    fn add_texture(&mut self, texture: &Texture) -> u16;
}

/// Handle to an uploaded voxel mesh. The mesh owns its geometry buffer;
/// the renderer borrows it per frame and re-uploads when it is dirty.
pub trait VoxelMesh {
    fn geometry(&self) -> &Geometry;

    /// Move the geometry buffer out for rebuilding, leaving an empty one.
    fn take_geometry(&mut self) -> Geometry;

    /// Replace the geometry buffer. Implementations must treat the new
    /// buffer as dirty and re-upload it.
    fn set_geometry(&mut self, geometry: Geometry);

    fn dispose(self);
}
