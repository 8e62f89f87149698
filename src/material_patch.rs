//! Material Shader Patching
//!
//! [`MaterialShaderPatcher::patch`] registers a compile hook on a
//! [`MeshStandardMaterial`] that rewrites its image-based lighting so the
//! specular reflection vector rotates over time:
//!
//! 1. declares the program uniform `uTime` (initially `0.0`)
//! 2. prepends `rotation_matrix` / `rotate_vector` helpers
//! 3. replaces the [`ShaderChunk::EnvmapPhysicalPars`] slot; irradiance is
//!    untouched and the reflection vector is rotated about
//!    [`ENV_ROTATION_AXIS`] by `uTime * ENV_ROTATION_RATE`
//! 4. publishes the compiled program's live uniform set to the material's
//!    [`PatchedShaderHandle`]
//!
//! The hook runs once per compiled variant (the program cache decides when),
//! and the returned [`PatchedMaterial`] drives `uTime` every frame without
//! recompiling.

use std::sync::Arc;

use glam::Vec3;
use parking_lot::RwLock;
use xxhash_rust::xxh3::xxh3_64;

use crate::errors::{HoloError, Result};
use crate::renderer::pipeline::shader_gen::{ProgramDraft, ShaderChunk};
use crate::resources::{CompileHook, EnvironmentMap, MaterialRef, SharedUniforms};

/// Axis the environment reflection rotates about (normalized in the shader).
pub const ENV_ROTATION_AXIS: Vec3 = Vec3::new(1.0, 2.3, 0.0);

/// Radians of reflection rotation per unit of `uTime`.
pub const ENV_ROTATION_RATE: f32 = 0.05;

/// `uTime = elapsed_ms * MATERIAL_TIME_SCALE`.
pub const MATERIAL_TIME_SCALE: f64 = 0.01;

/// Name of the injected time uniform.
pub const TIME_UNIFORM: &str = "uTime";

const ROTATION_HELPERS: &str = r"fn rotation_matrix(axis: vec3<f32>, angle: f32) -> mat3x3<f32> {
    let a = normalize(axis);
    let s = sin(angle);
    let c = cos(angle);
    let oc = 1.0 - c;
    return mat3x3<f32>(
        vec3<f32>(oc * a.x * a.x + c, oc * a.x * a.y - a.z * s, oc * a.z * a.x + a.y * s),
        vec3<f32>(oc * a.x * a.y + a.z * s, oc * a.y * a.y + c, oc * a.y * a.z - a.x * s),
        vec3<f32>(oc * a.z * a.x - a.y * s, oc * a.y * a.z + a.x * s, oc * a.z * a.z + c),
    );
}

fn rotate_vector(v: vec3<f32>, axis: vec3<f32>, angle: f32) -> vec3<f32> {
    return rotation_matrix(axis, angle) * v;
}
";

const ROTATED_IBL: &str = r#"{$ if USE_ENV_MAP $}
fn get_ibl_irradiance(normal: vec3<f32>) -> vec3<f32> {
    let world_normal = inverse_transform_direction(normal, u_frame.view);
    let env_color = texture_cube_uv(world_normal, 1.0);
    return PI * env_color.rgb * u_mesh.material.env_map_intensity;
}

fn get_ibl_radiance(view_dir: vec3<f32>, normal: vec3<f32>, roughness: f32) -> vec3<f32> {
    var reflect_vec = reflect(-view_dir, normal);
    reflect_vec = normalize(mix(reflect_vec, normal, roughness * roughness));
    reflect_vec = inverse_transform_direction(reflect_vec, u_frame.view);
    reflect_vec = rotate_vector(reflect_vec, ENV_ROTATION_AXIS, u_custom.uTime * ENV_ROTATION_RATE);

    let env_color = texture_cube_uv(reflect_vec, roughness);
    return env_color.rgb * u_mesh.material.env_map_intensity;
}
{$ else $}
{$ include "envmap_disabled" $}
{$ endif $}"#;

/// Replacement for the IBL chunk, with the rotation constants baked in.
#[must_use]
pub fn rotated_ibl_chunk() -> String {
    format!(
        "const ENV_ROTATION_AXIS: vec3<f32> = vec3<f32>({:?}, {:?}, {:?});\n\
         const ENV_ROTATION_RATE: f32 = {:?};\n{ROTATED_IBL}",
        ENV_ROTATION_AXIS.x, ENV_ROTATION_AXIS.y, ENV_ROTATION_AXIS.z, ENV_ROTATION_RATE
    )
}

/// The helper functions prepended to every patched variant.
#[must_use]
pub fn rotation_helpers() -> &'static str {
    ROTATION_HELPERS
}

// ─── PatchedShaderHandle ─────────────────────────────────────────────────────

/// Live uniform sets of every compiled variant of a patched material.
///
/// Empty until the first compile; writes before that are dropped.
#[derive(Debug, Clone, Default)]
pub struct PatchedShaderHandle {
    live: Arc<RwLock<Vec<SharedUniforms>>>,
}

impl PatchedShaderHandle {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn store(&self, uniforms: SharedUniforms) {
        let mut live = self.live.write();
        if !live.iter().any(|u| Arc::ptr_eq(u, &uniforms)) {
            live.push(uniforms);
        }
    }

    /// Uniforms of the most recently compiled variant.
    #[must_use]
    pub fn uniforms(&self) -> Option<SharedUniforms> {
        self.live.read().last().cloned()
    }

    #[must_use]
    pub fn is_compiled(&self) -> bool {
        !self.live.read().is_empty()
    }

    #[must_use]
    pub fn variant_count(&self) -> usize {
        self.live.read().len()
    }

    /// Writes `value` into every compiled variant. Returns `false` before the
    /// first compile.
    pub fn set_float(&self, name: &str, value: f32) -> Result<bool> {
        let live = self.live.read();
        for uniforms in live.iter() {
            uniforms.write().set(name, value)?;
        }
        Ok(!live.is_empty())
    }

    #[must_use]
    pub fn float(&self, name: &str) -> Option<f32> {
        self.uniforms().and_then(|u| u.read().float(name))
    }
}

// ─── Patcher ─────────────────────────────────────────────────────────────────

pub struct MaterialShaderPatcher;

impl MaterialShaderPatcher {
    /// Hook key identifying this patch in program cache keys.
    #[must_use]
    pub fn hook_key() -> u64 {
        let chunk = rotated_ibl_chunk();
        xxh3_64(ROTATION_HELPERS.as_bytes()) ^ xxh3_64(chunk.as_bytes()).rotate_left(1)
    }

    /// Attaches `env_map` and the rotating-reflection compile hook to
    /// `material`.
    ///
    /// Fails with [`HoloError::MarkerNotFound`] if the material's base
    /// program has no IBL chunk. Patching an already patched material
    /// returns a driver for the existing handle.
    pub fn patch(material: &MaterialRef, env_map: EnvironmentMap) -> Result<PatchedMaterial> {
        let mut guard = material.write();

        if !guard
            .base_program()
            .contains_chunk(ShaderChunk::EnvmapPhysicalPars)
        {
            return Err(HoloError::MarkerNotFound {
                program: guard.base_program().label().to_string(),
                chunk: ShaderChunk::EnvmapPhysicalPars.name(),
            });
        }

        guard.set_env_map(Some(env_map));

        let key = Self::hook_key();
        if let (Some(hook), Some(handle)) = (guard.compile_hook(), guard.patched_handle())
            && hook.key() == key
        {
            log::debug!("Material {} already patched", guard.id());
            return Ok(PatchedMaterial {
                material: Arc::clone(material),
                handle: handle.clone(),
                time: 0.0,
            });
        }

        let handle = PatchedShaderHandle::new();
        let hook_handle = handle.clone();
        let ibl_chunk = rotated_ibl_chunk();
        guard.set_compile_hook(CompileHook::new(key, move |draft: &mut ProgramDraft| {
            draft.declare_uniform(TIME_UNIFORM, 0.0)?;
            draft.source_mut().prepend(ROTATION_HELPERS);
            draft
                .source_mut()
                .replace_chunk(ShaderChunk::EnvmapPhysicalPars, ibl_chunk.clone())?;
            hook_handle.store(draft.uniforms());
            Ok(())
        }));
        guard.set_patched_handle(handle.clone());

        log::info!("Patched material {} with rotating environment reflection", guard.id());

        Ok(PatchedMaterial {
            material: Arc::clone(material),
            handle,
            time: 0.0,
        })
    }
}

/// Per-frame driver of a patched material's `uTime`.
#[derive(Debug, Clone)]
pub struct PatchedMaterial {
    material: MaterialRef,
    handle: PatchedShaderHandle,
    time: f32,
}

impl PatchedMaterial {
    /// Sets `uTime = elapsed * MATERIAL_TIME_SCALE`. No-op before the
    /// material's first compile.
    pub fn tick(&mut self, elapsed: f64) {
        self.time = (elapsed * MATERIAL_TIME_SCALE) as f32;
        if let Err(e) = self.handle.set_float(TIME_UNIFORM, self.time) {
            log::warn!("Failed to update {TIME_UNIFORM}: {e}");
        }
    }

    /// Last time value written by [`Self::tick`].
    #[must_use]
    pub fn time(&self) -> f32 {
        self.time
    }

    #[must_use]
    pub fn handle(&self) -> &PatchedShaderHandle {
        &self.handle
    }

    #[must_use]
    pub fn material(&self) -> &MaterialRef {
        &self.material
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::renderer::core::TextureId;
    use crate::renderer::pipeline::shader_gen::{ShaderProgramSource, ShaderSegment};
    use crate::resources::MeshStandardMaterial;

    fn env_map() -> EnvironmentMap {
        EnvironmentMap {
            texture: TextureId::default(),
            mip_levels: 8,
        }
    }

    #[test]
    fn tick_before_compile_is_noop() {
        let material = MeshStandardMaterial::new().into_shared();
        let mut patched = MaterialShaderPatcher::patch(&material, env_map()).unwrap();
        patched.tick(1000.0);
        assert!(!patched.handle().is_compiled());
        assert_eq!(patched.handle().float(TIME_UNIFORM), None);
    }

    #[test]
    fn hook_rewrites_draft_and_publishes_uniforms() {
        let material = MeshStandardMaterial::new().into_shared();
        let mut patched = MaterialShaderPatcher::patch(&material, env_map()).unwrap();

        let guard = material.read();
        let mut draft = ProgramDraft::new(guard.base_program().clone());
        guard.compile_hook().unwrap().run(&mut draft).unwrap();
        drop(guard);

        assert!(!draft.source().contains_chunk(ShaderChunk::EnvmapPhysicalPars));
        assert_eq!(
            draft.source().segments()[0],
            ShaderSegment::Inline(ROTATION_HELPERS.into())
        );

        patched.tick(1000.0);
        assert_eq!(patched.handle().float(TIME_UNIFORM), Some(10.0));
    }

    #[test]
    fn missing_marker_is_configuration_error() {
        let program = ShaderProgramSource::new(
            "unlit",
            vec![ShaderSegment::Chunk(ShaderChunk::Common)],
        );
        let material = MeshStandardMaterial::with_program(program).into_shared();
        let err = MaterialShaderPatcher::patch(&material, env_map()).unwrap_err();
        assert!(err.is_configuration());
        assert!(material.read().compile_hook().is_none());
    }

    #[test]
    fn repatching_keeps_existing_handle() {
        let material = MeshStandardMaterial::new().into_shared();
        let first = MaterialShaderPatcher::patch(&material, env_map()).unwrap();
        let version = material.read().version();
        let second = MaterialShaderPatcher::patch(&material, env_map()).unwrap();

        assert!(Arc::ptr_eq(&first.handle().live, &second.handle().live));
        assert_eq!(material.read().version(), version);
    }

    #[test]
    fn rotation_constants_are_baked_into_chunk() {
        let chunk = rotated_ibl_chunk();
        assert!(chunk.contains("vec3<f32>(1.0, 2.3, 0.0)"));
        assert!(chunk.contains("const ENV_ROTATION_RATE: f32 = 0.05;"));
    }
}
