//! Physically-Based Standard Material
//!
//! [`MeshStandardMaterial`] carries the PBR parameters the mesh program
//! reads, the base program its variants are generated from, and an optional
//! [`CompileHook`] that the program cache runs once per compiled variant.
//!
//! Materials are shared between the scene and whoever patches or animates
//! them, so they live behind [`MaterialRef`].

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::RwLock;

use crate::errors::Result;
use crate::material_patch::PatchedShaderHandle;
use crate::renderer::pipeline::shader_gen::{ProgramDraft, ShaderProgramSource};
use crate::resources::{Color, EnvironmentMap, ShaderDefines};

static NEXT_MATERIAL_ID: AtomicU64 = AtomicU64::new(1);

pub type MaterialRef = Arc<RwLock<MeshStandardMaterial>>;

type HookFn = dyn Fn(&mut ProgramDraft) -> Result<()> + Send + Sync;

/// Callback run against a program draft before it is compiled.
///
/// `key` identifies the hook's behaviour; it is part of the program cache key
/// so patched and unpatched variants never share a compiled program.
#[derive(Clone)]
pub struct CompileHook {
    key: u64,
    callback: Arc<HookFn>,
}

impl CompileHook {
    pub fn new(key: u64, callback: impl Fn(&mut ProgramDraft) -> Result<()> + Send + Sync + 'static) -> Self {
        Self {
            key,
            callback: Arc::new(callback),
        }
    }

    #[inline]
    #[must_use]
    pub fn key(&self) -> u64 {
        self.key
    }

    pub fn run(&self, draft: &mut ProgramDraft) -> Result<()> {
        (self.callback)(draft)
    }
}

impl fmt::Debug for CompileHook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompileHook").field("key", &self.key).finish_non_exhaustive()
    }
}

/// Material parameters as laid out in the mesh uniform block.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, bytemuck::Pod, bytemuck::Zeroable)]
pub struct MaterialUniforms {
    pub color: [f32; 4],
    pub emissive: [f32; 3],
    pub metalness: f32,
    pub roughness: f32,
    pub env_map_intensity: f32,
    pub env_mip_count: f32,
    pub __pad: f32,
}

#[derive(Debug)]
pub struct MeshStandardMaterial {
    id: u64,
    version: u64,
    needs_update: bool,

    pub color: Color,
    pub emissive: Color,
    pub metalness: f32,
    pub roughness: f32,
    pub env_map_intensity: f32,
    pub transparent: bool,
    env_map: Option<EnvironmentMap>,

    base_program: ShaderProgramSource,
    compile_hook: Option<CompileHook>,
    patched: Option<PatchedShaderHandle>,
}

impl Default for MeshStandardMaterial {
    fn default() -> Self {
        Self::new()
    }
}

impl MeshStandardMaterial {
    #[must_use]
    pub fn new() -> Self {
        Self::with_program(ShaderProgramSource::mesh_standard())
    }

    /// Material generated from a custom base program.
    #[must_use]
    pub fn with_program(base_program: ShaderProgramSource) -> Self {
        Self {
            id: NEXT_MATERIAL_ID.fetch_add(1, Ordering::Relaxed),
            version: 0,
            needs_update: true,
            color: Color::WHITE,
            emissive: Color::BLACK,
            metalness: 0.0,
            roughness: 1.0,
            env_map_intensity: 1.0,
            transparent: false,
            env_map: None,
            base_program,
            compile_hook: None,
            patched: None,
        }
    }

    #[must_use]
    pub fn with_metalness(mut self, metalness: f32) -> Self {
        self.metalness = metalness.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn with_roughness(mut self, roughness: f32) -> Self {
        self.roughness = roughness.clamp(0.0, 1.0);
        self
    }

    #[must_use]
    pub fn into_shared(self) -> MaterialRef {
        Arc::new(RwLock::new(self))
    }

    #[inline]
    #[must_use]
    pub fn id(&self) -> u64 {
        self.id
    }

    #[inline]
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    #[inline]
    #[must_use]
    pub fn needs_update(&self) -> bool {
        self.needs_update
    }

    /// Requests that the material's program variant be re-resolved.
    pub fn set_needs_update(&mut self) {
        self.needs_update = true;
        self.version += 1;
    }

    pub(crate) fn clear_needs_update(&mut self) {
        self.needs_update = false;
    }

    #[must_use]
    pub fn env_map(&self) -> Option<EnvironmentMap> {
        self.env_map
    }

    pub fn set_env_map(&mut self, env_map: Option<EnvironmentMap>) {
        if self.env_map.is_some() != env_map.is_some() {
            self.set_needs_update();
        }
        self.env_map = env_map;
    }

    #[must_use]
    pub fn base_program(&self) -> &ShaderProgramSource {
        &self.base_program
    }

    #[must_use]
    pub fn compile_hook(&self) -> Option<&CompileHook> {
        self.compile_hook.as_ref()
    }

    pub(crate) fn set_compile_hook(&mut self, hook: CompileHook) {
        self.compile_hook = Some(hook);
        self.set_needs_update();
    }

    #[must_use]
    pub fn patched_handle(&self) -> Option<&PatchedShaderHandle> {
        self.patched.as_ref()
    }

    pub(crate) fn set_patched_handle(&mut self, handle: PatchedShaderHandle) {
        self.patched = Some(handle);
    }

    /// Defines contributed by the material's own state.
    #[must_use]
    pub fn shader_defines(&self) -> ShaderDefines {
        let mut defines = ShaderDefines::new();
        if self.env_map.is_some() {
            defines.set("USE_ENV_MAP", "1");
        }
        defines
    }

    #[must_use]
    pub fn uniforms(&self) -> MaterialUniforms {
        MaterialUniforms {
            color: self.color.to_linear().to_array(),
            emissive: {
                let e = self.emissive.to_linear();
                [e.r, e.g, e.b]
            },
            metalness: self.metalness,
            roughness: self.roughness,
            env_map_intensity: self.env_map_intensity,
            env_mip_count: self.env_map.map_or(1.0, |env| env.mip_levels as f32),
            __pad: 0.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::TextureId;

    fn env_map() -> EnvironmentMap {
        EnvironmentMap {
            texture: TextureId::default(),
            mip_levels: 6,
        }
    }

    #[test]
    fn env_map_toggles_define_and_update_flag() {
        let mut material = MeshStandardMaterial::new();
        material.clear_needs_update();
        assert!(!material.shader_defines().contains("USE_ENV_MAP"));

        material.set_env_map(Some(env_map()));
        assert!(material.needs_update());
        assert!(material.shader_defines().contains("USE_ENV_MAP"));
        assert_eq!(material.uniforms().env_mip_count, 6.0);
    }

    #[test]
    fn builders_clamp_pbr_parameters() {
        let material = MeshStandardMaterial::new()
            .with_metalness(2.0)
            .with_roughness(0.128);
        assert_eq!(material.metalness, 1.0);
        assert_eq!(material.roughness, 0.128);
    }

    #[test]
    fn ids_are_unique() {
        assert_ne!(MeshStandardMaterial::new().id(), MeshStandardMaterial::new().id());
    }
}
