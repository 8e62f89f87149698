//! Mesh Program Cache
//!
//! Resolves a material to a compiled program variant. The cache key covers
//! everything that changes generated code:
//!
//! - base program label
//! - merged define set (material + scene)
//! - compile hook key, and the material id when a hook is present
//!
//! On a miss the material's compile hook runs against a fresh
//! [`ProgramDraft`], the draft's uniform set is frozen, and the rendered WGSL
//! is handed to the device. A hit never re-runs the hook.

use rustc_hash::FxHashMap;
use xxhash_rust::xxh3::Xxh3;

use super::shader_gen::ProgramDraft;
use crate::errors::Result;
use crate::renderer::core::{OutputDevice, ProgramDescriptor, ProgramId, ProgramKind};
use crate::resources::{MeshStandardMaterial, ShaderDefines, SharedUniforms};

/// A compiled mesh program variant.
#[derive(Debug, Clone)]
pub struct CompiledProgram {
    pub id: ProgramId,
    pub label: String,
    /// Uniforms injected by the compile hook, bound at the custom group.
    pub custom_uniforms: Option<SharedUniforms>,
    /// Final WGSL, kept for debug dumps.
    pub source: String,
}

#[derive(Default)]
pub struct ProgramCache {
    programs: FxHashMap<u64, CompiledProgram>,
}

impl ProgramCache {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache key for `material` under `scene_defines`.
    #[must_use]
    pub fn program_key(material: &MeshStandardMaterial, defines: &ShaderDefines) -> u64 {
        let mut hasher = Xxh3::new();
        hasher.update(material.base_program().label().as_bytes());
        hasher.update(&defines.compute_hash().to_le_bytes());
        if let Some(hook) = material.compile_hook() {
            hasher.update(&hook.key().to_le_bytes());
            hasher.update(&material.id().to_le_bytes());
        }
        hasher.digest()
    }

    /// Returns the program for `material`, compiling it on first use.
    pub fn get_or_compile<D: OutputDevice + ?Sized>(
        &mut self,
        device: &mut D,
        material: &MeshStandardMaterial,
        scene_defines: &ShaderDefines,
    ) -> Result<&CompiledProgram> {
        let mut defines = material.shader_defines();
        defines.merge(scene_defines);
        let key = Self::program_key(material, &defines);

        if !self.programs.contains_key(&key) {
            let compiled = Self::compile(device, material, &defines, key)?;
            self.programs.insert(key, compiled);
        }
        Ok(&self.programs[&key])
    }

    fn compile<D: OutputDevice + ?Sized>(
        device: &mut D,
        material: &MeshStandardMaterial,
        defines: &ShaderDefines,
        key: u64,
    ) -> Result<CompiledProgram> {
        let mut draft = ProgramDraft::new(material.base_program().clone());
        if let Some(hook) = material.compile_hook() {
            hook.run(&mut draft)?;
        }
        let (program, uniforms) = draft.into_parts();

        let (source, custom_size, has_custom) = {
            let mut set = uniforms.write();
            set.freeze();
            let source = program.render(defines, Some(&set))?;
            (source, set.byte_size() as u64, !set.is_empty())
        };

        let label = format!("{} [{key:016x}]", program.label());
        let id = device.compile_program(&ProgramDescriptor {
            label: label.clone(),
            source: source.clone(),
            kind: ProgramKind::Mesh {
                custom_uniform_size: if has_custom { custom_size } else { 0 },
            },
        })?;

        log::debug!("Compiled mesh program `{label}` ({} defines)", defines.len());

        Ok(CompiledProgram {
            id,
            label,
            custom_uniforms: has_custom.then_some(uniforms),
            source,
        })
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.programs.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.programs.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledProgram> {
        self.programs.values()
    }

    pub fn clear(&mut self) {
        self.programs.clear();
    }
}
