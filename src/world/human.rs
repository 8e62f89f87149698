//! The patched human mesh.

use std::f32::consts::FRAC_PI_2;

use crate::assets::AssetServer;
use crate::errors::Result;
use crate::material_patch::{MaterialShaderPatcher, PatchedMaterial};
use crate::renderer::RenderPipeline;
use crate::renderer::core::OutputDevice;
use crate::resources::{Geometry, MeshStandardMaterial};
use crate::scene::{Mesh, MeshKey};

pub const HUMAN_ASSET: &str = "human";
pub const ENV_MAP_ASSET: &str = "envMap";

pub const HUMAN_SCALE: f32 = 0.1;
pub const HUMAN_METALNESS: f32 = 1.0;
pub const HUMAN_ROUGHNESS: f32 = 0.128;

/// Face size of the cube the environment texture is reprojected into.
pub const ENV_MAP_FACE_SIZE: u32 = 128;

/// Centres `geometry` on its bounding box, then turns it a quarter turn
/// clockwise about Y.
pub fn orient_geometry(geometry: &mut Geometry) {
    geometry.center();
    geometry.rotate_y(-FRAC_PI_2);
}

pub struct Human {
    mesh: MeshKey,
    material: PatchedMaterial,
}

impl Human {
    /// Builds the human from loaded assets and adds it to the pipeline's
    /// scene. Nothing is added if patching fails.
    pub fn spawn<D: OutputDevice + 'static>(
        pipeline: &mut RenderPipeline<D>,
        assets: &AssetServer,
    ) -> Result<Self> {
        let cube = assets.environment(ENV_MAP_ASSET, ENV_MAP_FACE_SIZE)?;
        let mut geometry = assets.model(HUMAN_ASSET)?.clone();

        let env_map = pipeline.upload_environment(&cube)?;
        let material = MeshStandardMaterial::new()
            .with_metalness(HUMAN_METALNESS)
            .with_roughness(HUMAN_ROUGHNESS)
            .into_shared();
        let patched = MaterialShaderPatcher::patch(&material, env_map)?;

        orient_geometry(&mut geometry);
        let mut mesh = Mesh::new(geometry, material).with_name(HUMAN_ASSET);
        mesh.transform.set_uniform_scale(HUMAN_SCALE);

        let key = pipeline.scene_mut().add_mesh(mesh);
        log::info!("Human added to scene");

        Ok(Self {
            mesh: key,
            material: patched,
        })
    }

    #[must_use]
    pub fn mesh(&self) -> MeshKey {
        self.mesh
    }

    #[must_use]
    pub fn material(&self) -> &PatchedMaterial {
        &self.material
    }

    pub fn update(&mut self, elapsed: f64) {
        self.material.tick(elapsed);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn orientation_centres_then_rotates() {
        let mut geometry = Geometry::new(
            vec![[2.0, 0.0, 0.0], [4.0, 0.0, 0.0], [3.0, 1.0, 0.0]],
            vec![[0.0, 0.0, 1.0]; 3],
        )
        .unwrap();
        orient_geometry(&mut geometry);

        let bbox = geometry.bounding_box().unwrap();
        assert!(bbox.center().abs_diff_eq(Vec3::ZERO, 1e-5));
        // +X maps to +Z under a -90 degree turn about Y.
        let p = Vec3::from_array(geometry.positions()[1]);
        assert!(p.abs_diff_eq(Vec3::new(0.0, -0.5, 1.0), 1e-5));
    }
}
