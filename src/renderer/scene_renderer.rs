//! Scene Rendering
//!
//! [`SceneRenderer`] turns a [`Scene`] into one [`SceneDraw`]: it uploads
//! stale geometry, resolves every material to a compiled program through the
//! [`ProgramCache`], and packs frame / object / custom uniforms.
//!
//! Tone mapping lives here because it is a scene-wide shader define: a mode
//! change selects different program variants for every material.

use bytemuck::{Pod, Zeroable};

use crate::errors::Result;
use crate::renderer::core::{DrawItem, OutputDevice, SceneDraw, SceneOutput};
use crate::renderer::pipeline::{CompiledProgram, ProgramCache};
use crate::resources::{
    Color, MaterialUniforms, ShaderDefines, ToneMappingMode, ToneMappingSettings,
};
use crate::scene::Scene;

/// `u_frame` block (group 0).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct FrameUniforms {
    pub view: [[f32; 4]; 4],
    pub projection: [[f32; 4]; 4],
    pub exposure: f32,
    pub __pad: [f32; 3],
}

/// `u_mesh` block (group 1).
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Pod, Zeroable)]
pub struct ObjectUniforms {
    pub model: [[f32; 4]; 4],
    pub normal_matrix: [[f32; 4]; 4],
    pub material: MaterialUniforms,
}

pub struct SceneRenderer {
    program_cache: ProgramCache,
    tone_mapping: ToneMappingSettings,
    scene_defines: ShaderDefines,
    items: Vec<DrawItem>,
}

impl SceneRenderer {
    #[must_use]
    pub fn new(tone_mapping: ToneMappingSettings) -> Self {
        let mut renderer = Self {
            program_cache: ProgramCache::new(),
            tone_mapping,
            scene_defines: ShaderDefines::new(),
            items: Vec::new(),
        };
        renderer.rebuild_defines();
        renderer
    }

    fn rebuild_defines(&mut self) {
        self.scene_defines = ShaderDefines::new();
        self.tone_mapping.mode.apply_to_defines(&mut self.scene_defines);
    }

    #[must_use]
    pub fn tone_mapping(&self) -> ToneMappingSettings {
        self.tone_mapping
    }

    pub fn set_tone_mapping(&mut self, settings: ToneMappingSettings) {
        self.tone_mapping = settings;
        self.rebuild_defines();
    }

    /// Returns `true` if the mode changed.
    pub fn set_tone_mapping_mode(&mut self, mode: ToneMappingMode) -> bool {
        let changed = self.tone_mapping.set_mode(mode);
        if changed {
            self.rebuild_defines();
        }
        changed
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.tone_mapping.set_exposure(exposure);
    }

    #[must_use]
    pub fn scene_defines(&self) -> &ShaderDefines {
        &self.scene_defines
    }

    #[must_use]
    pub fn program_cache(&self) -> &ProgramCache {
        &self.program_cache
    }

    /// Uploads geometry and compiles programs for every visible mesh,
    /// rebuilding the draw list.
    pub fn prepare(&mut self, device: &mut dyn OutputDevice, scene: &mut Scene) -> Result<()> {
        self.items.clear();

        for (_, mesh) in scene.meshes_mut() {
            if !mesh.visible {
                continue;
            }

            if mesh.geometry_dirty() {
                let id = device.upload_geometry(&mesh.geometry, mesh.gpu_geometry)?;
                mesh.gpu_geometry = Some(id);
                mesh.uploaded_version = Some(mesh.geometry.version());
            }
            let Some(geometry) = mesh.gpu_geometry else {
                continue;
            };

            let (program, env_map, material_uniforms, needs_update) = {
                let material = mesh.material.read();
                let compiled: &CompiledProgram =
                    self.program_cache
                        .get_or_compile(device, &material, &self.scene_defines)?;
                let custom = compiled
                    .custom_uniforms
                    .as_ref()
                    .map(|uniforms| uniforms.read().to_bytes());
                (
                    (compiled.id, custom),
                    material.env_map().map(|env| env.texture),
                    material.uniforms(),
                    material.needs_update(),
                )
            };
            if needs_update {
                mesh.material.write().clear_needs_update();
            }

            let model = mesh.transform.matrix();
            let object = ObjectUniforms {
                model: model.to_cols_array_2d(),
                normal_matrix: model.inverse().transpose().to_cols_array_2d(),
                material: material_uniforms,
            };

            self.items.push(DrawItem {
                program: program.0,
                geometry,
                env_map,
                object_uniforms: bytemuck::bytes_of(&object).to_vec(),
                custom_uniforms: program.1,
            });
        }
        Ok(())
    }

    /// Prepares and draws `scene` into `output`.
    pub fn render(
        &mut self,
        device: &mut dyn OutputDevice,
        scene: &mut Scene,
        output: SceneOutput,
        clear_color: Color,
    ) -> Result<()> {
        self.prepare(device, scene)?;

        let frame = FrameUniforms {
            view: scene.camera.view_matrix().to_cols_array_2d(),
            projection: scene.camera.projection_matrix().to_cols_array_2d(),
            exposure: self.tone_mapping.exposure(),
            __pad: [0.0; 3],
        };

        device.draw_scene(&SceneDraw {
            output,
            clear_color,
            frame_uniforms: bytemuck::bytes_of(&frame),
            items: &self.items,
        })
    }

    /// `(label, wgsl)` of every compiled mesh program.
    #[must_use]
    pub fn program_sources(&self) -> Vec<(String, String)> {
        let mut sources: Vec<_> = self
            .program_cache
            .iter()
            .map(|p| (p.label.clone(), p.source.clone()))
            .collect();
        sources.sort();
        sources
    }

    /// Drops compiled programs and the draw list.
    pub fn clear(&mut self) {
        self.program_cache.clear();
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::HeadlessDevice;
    use crate::resources::{Geometry, MeshStandardMaterial};
    use crate::scene::Mesh;

    #[test]
    fn uniform_blocks_match_wgsl_sizes() {
        assert_eq!(std::mem::size_of::<FrameUniforms>(), 144);
        assert_eq!(std::mem::size_of::<ObjectUniforms>(), 176);
    }

    #[test]
    fn tone_mapping_change_selects_new_variant() {
        let mut device = HeadlessDevice::new();
        let mut scene = Scene::new();
        scene.add_mesh(Mesh::new(
            Geometry::sphere(1.0, 8, 6).unwrap(),
            MeshStandardMaterial::new().into_shared(),
        ));

        let mut renderer = SceneRenderer::new(ToneMappingSettings::default());
        renderer.prepare(&mut device, &mut scene).unwrap();
        renderer.prepare(&mut device, &mut scene).unwrap();
        assert_eq!(renderer.program_cache().len(), 1);

        assert!(renderer.set_tone_mapping_mode(ToneMappingMode::Reinhard));
        renderer.prepare(&mut device, &mut scene).unwrap();
        assert_eq!(renderer.program_cache().len(), 2);
    }

    #[test]
    fn geometry_uploads_only_when_version_changes() {
        let mut device = HeadlessDevice::new();
        let recorder = device.recorder();
        let mut scene = Scene::new();
        let key = scene.add_mesh(Mesh::new(
            Geometry::sphere(1.0, 8, 6).unwrap(),
            MeshStandardMaterial::new().into_shared(),
        ));
        let mut renderer = SceneRenderer::new(ToneMappingSettings::default());

        renderer.prepare(&mut device, &mut scene).unwrap();
        renderer.prepare(&mut device, &mut scene).unwrap();
        let uploads = |r: &crate::renderer::core::DeviceRecorder| {
            r.commands()
                .iter()
                .filter(|c| matches!(c, crate::renderer::core::DeviceCommand::UploadGeometry { .. }))
                .count()
        };
        assert_eq!(uploads(&recorder), 1);

        scene.get_mesh_mut(key).unwrap().geometry.rotate_y(0.5);
        renderer.prepare(&mut device, &mut scene).unwrap();
        assert_eq!(uploads(&recorder), 2);
    }
}
