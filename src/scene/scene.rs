use slotmap::SlotMap;

use super::{Camera, Mesh, MeshKey};

/// Flat container of meshes plus the active camera.
#[derive(Debug, Default)]
pub struct Scene {
    meshes: SlotMap<MeshKey, Mesh>,
    pub camera: Camera,
}

impl Scene {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_mesh(&mut self, mesh: Mesh) -> MeshKey {
        log::debug!("Scene: added mesh `{}`", mesh.name);
        self.meshes.insert(mesh)
    }

    pub fn remove_mesh(&mut self, key: MeshKey) -> Option<Mesh> {
        self.meshes.remove(key)
    }

    #[must_use]
    pub fn get_mesh(&self, key: MeshKey) -> Option<&Mesh> {
        self.meshes.get(key)
    }

    pub fn get_mesh_mut(&mut self, key: MeshKey) -> Option<&mut Mesh> {
        self.meshes.get_mut(key)
    }

    pub fn meshes(&self) -> impl Iterator<Item = (MeshKey, &Mesh)> {
        self.meshes.iter()
    }

    pub fn meshes_mut(&mut self) -> impl Iterator<Item = (MeshKey, &mut Mesh)> {
        self.meshes.iter_mut()
    }

    #[must_use]
    pub fn mesh_count(&self) -> usize {
        self.meshes.len()
    }

    /// Flags every opaque material for a program refresh. Returns how many
    /// were flagged.
    pub fn mark_opaque_materials_needs_update(&mut self) -> usize {
        let mut count = 0;
        for mesh in self.meshes.values() {
            let mut material = mesh.material.write();
            if !material.transparent {
                material.set_needs_update();
                count += 1;
            }
        }
        count
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resources::{Geometry, MeshStandardMaterial};

    #[test]
    fn only_opaque_materials_are_flagged() {
        let mut scene = Scene::new();
        let opaque = MeshStandardMaterial::new().into_shared();
        let mut glass = MeshStandardMaterial::new();
        glass.transparent = true;
        let glass = glass.into_shared();

        let geometry = || Geometry::sphere(1.0, 8, 6).unwrap();
        scene.add_mesh(Mesh::new(geometry(), opaque.clone()));
        scene.add_mesh(Mesh::new(geometry(), glass.clone()));

        let before = glass.read().version();
        assert_eq!(scene.mark_opaque_materials_needs_update(), 1);
        assert!(opaque.read().needs_update());
        assert_eq!(glass.read().version(), before);
    }
}
