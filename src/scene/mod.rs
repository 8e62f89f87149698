//! Scene container.
//!
//! - [`Scene`]: meshes keyed by [`MeshKey`] plus the active camera
//! - [`Mesh`]: geometry + shared material + [`Transform`]
//! - [`Camera`]: perspective camera

pub mod camera;
pub mod mesh;
pub mod scene;
pub mod transform;

pub use camera::Camera;
pub use mesh::Mesh;
pub use scene::Scene;
pub use transform::Transform;

use slotmap::new_key_type;

new_key_type! {
    pub struct MeshKey;
}
