//! Shader Program Sources
//!
//! A mesh program is an ordered list of [`ShaderSegment`]s: named chunk slots
//! that render from `chunks/<name>.wgsl`, and inline template code. Compile
//! hooks edit a [`ProgramDraft`] by slot, never by text search, so a patch
//! either finds its target chunk or fails with
//! [`HoloError::MarkerNotFound`](crate::errors::HoloError::MarkerNotFound).
//!
//! ```text
//! [Common] [MeshBindings] [MeshVertex] [CubeUvReflection]
//! [EnvmapPhysicalPars] [ToneMapping] [MeshFragment]
//! ```
//!
//! Full-screen pass programs are assembled by [`fullscreen_program`] from a
//! uniform table, a list of input textures, and vertex/fragment code.

use std::borrow::Cow;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::Arc;

use minijinja::Value;
use parking_lot::RwLock;

use super::shader_manager;
use crate::errors::{HoloError, Result};
use crate::resources::{ShaderDefines, SharedUniforms, UniformSet, UniformValue};

/// Bind group holding hook-injected uniforms in mesh programs.
pub const CUSTOM_UNIFORM_GROUP: u32 = 2;

/// Named, replaceable regions of the mesh program.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShaderChunk {
    Common,
    MeshBindings,
    MeshVertex,
    CubeUvReflection,
    /// Image-based lighting: `get_ibl_irradiance` / `get_ibl_radiance`.
    EnvmapPhysicalPars,
    ToneMapping,
    MeshFragment,
}

impl ShaderChunk {
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Common => "common",
            Self::MeshBindings => "mesh_bindings",
            Self::MeshVertex => "mesh_vertex",
            Self::CubeUvReflection => "cube_uv_reflection",
            Self::EnvmapPhysicalPars => "envmap_physical_pars",
            Self::ToneMapping => "tone_mapping",
            Self::MeshFragment => "mesh_fragment",
        }
    }

    fn template_path(&self) -> String {
        format!("chunks/{}", self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ShaderSegment {
    Chunk(ShaderChunk),
    Inline(Cow<'static, str>),
}

/// Ordered segment list for one program.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShaderProgramSource {
    label: String,
    segments: Vec<ShaderSegment>,
}

impl ShaderProgramSource {
    #[must_use]
    pub fn new(label: impl Into<String>, segments: Vec<ShaderSegment>) -> Self {
        Self {
            label: label.into(),
            segments,
        }
    }

    /// The physically-based standard mesh program.
    #[must_use]
    pub fn mesh_standard() -> Self {
        use ShaderChunk as C;
        Self::new(
            "mesh_standard",
            [
                C::Common,
                C::MeshBindings,
                C::MeshVertex,
                C::CubeUvReflection,
                C::EnvmapPhysicalPars,
                C::ToneMapping,
                C::MeshFragment,
            ]
            .into_iter()
            .map(ShaderSegment::Chunk)
            .collect(),
        )
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn segments(&self) -> &[ShaderSegment] {
        &self.segments
    }

    #[must_use]
    pub fn contains_chunk(&self, chunk: ShaderChunk) -> bool {
        self.segments.contains(&ShaderSegment::Chunk(chunk))
    }

    /// Inserts code at the start of the program.
    ///
    /// Returns `false` (and changes nothing) if identical code is already
    /// present.
    pub fn prepend(&mut self, code: impl Into<Cow<'static, str>>) -> bool {
        let segment = ShaderSegment::Inline(code.into());
        if self.segments.contains(&segment) {
            return false;
        }
        self.segments.insert(0, segment);
        true
    }

    /// Replaces a chunk slot wholesale with inline code.
    pub fn replace_chunk(
        &mut self,
        chunk: ShaderChunk,
        code: impl Into<Cow<'static, str>>,
    ) -> Result<()> {
        let slot = self
            .segments
            .iter_mut()
            .find(|s| **s == ShaderSegment::Chunk(chunk))
            .ok_or_else(|| HoloError::MarkerNotFound {
                program: self.label.clone(),
                chunk: chunk.name(),
            })?;
        *slot = ShaderSegment::Inline(code.into());
        Ok(())
    }

    /// Renders every segment with `defines` and prefixes the custom uniform
    /// block when `custom` is non-empty.
    pub fn render(&self, defines: &ShaderDefines, custom: Option<&UniformSet>) -> Result<String> {
        let ctx = template_context(defines);
        let mut source = format!("// === Auto-generated Shader: {} ===\n", self.label);

        if let Some(custom) = custom.filter(|c| !c.is_empty()) {
            source.push_str(&custom.wgsl_struct("CustomUniforms"));
            let _ = writeln!(
                source,
                "@group({CUSTOM_UNIFORM_GROUP}) @binding(0) var<uniform> u_custom: CustomUniforms;"
            );
        }

        for segment in &self.segments {
            let code = match segment {
                ShaderSegment::Chunk(chunk) => {
                    shader_manager::render_template(&chunk.template_path(), &ctx)?
                }
                ShaderSegment::Inline(code) => shader_manager::render_str(code, &ctx)?,
            };
            source.push_str(&code);
            source.push('\n');
        }

        Ok(source)
    }
}

/// Template context holding every define as a top-level variable.
#[must_use]
pub fn template_context(defines: &ShaderDefines) -> BTreeMap<&'static str, Value> {
    defines
        .iter()
        .map(|(k, v)| (k, Value::from(v)))
        .collect()
}

/// A program being prepared for compilation; what compile hooks operate on.
#[derive(Debug)]
pub struct ProgramDraft {
    source: ShaderProgramSource,
    uniforms: SharedUniforms,
}

impl ProgramDraft {
    #[must_use]
    pub fn new(source: ShaderProgramSource) -> Self {
        Self {
            source,
            uniforms: Arc::new(RwLock::new(UniformSet::new())),
        }
    }

    #[must_use]
    pub fn source(&self) -> &ShaderProgramSource {
        &self.source
    }

    pub fn source_mut(&mut self) -> &mut ShaderProgramSource {
        &mut self.source
    }

    /// Declares a program uniform with its initial value.
    pub fn declare_uniform(&mut self, name: &str, value: impl Into<UniformValue>) -> Result<()> {
        self.uniforms.write().declare(name, value)
    }

    /// The live uniform set the compiled program will read from.
    #[must_use]
    pub fn uniforms(&self) -> SharedUniforms {
        Arc::clone(&self.uniforms)
    }

    pub(crate) fn into_parts(self) -> (ShaderProgramSource, SharedUniforms) {
        (self.source, self.uniforms)
    }
}

/// Assembles a full-screen pass program.
///
/// Bindings (group 0): `u_effect` at 0 when `uniforms` is non-empty,
/// `s_linear` at 1, then one `texture_2d<f32>` per name in `inputs` from 2.
#[must_use]
pub fn fullscreen_program(
    label: &str,
    uniforms: &UniformSet,
    inputs: &[&str],
    vertex: &str,
    fragment: &str,
) -> String {
    let mut source = format!("// === Auto-generated Fullscreen Shader: {label} ===\n");

    if !uniforms.is_empty() {
        source.push_str(&uniforms.wgsl_struct("EffectUniforms"));
        source.push_str("@group(0) @binding(0) var<uniform> u_effect: EffectUniforms;\n");
    }
    source.push_str("@group(0) @binding(1) var s_linear: sampler;\n");
    for (i, name) in inputs.iter().enumerate() {
        let _ = writeln!(
            source,
            "@group(0) @binding({}) var {name}: texture_2d<f32>;",
            i + 2
        );
    }

    source.push('\n');
    source.push_str(vertex);
    source.push('\n');
    source.push_str(fragment);
    source
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replace_missing_chunk_reports_marker() {
        let mut source = ShaderProgramSource::new(
            "bare",
            vec![ShaderSegment::Chunk(ShaderChunk::Common)],
        );
        let err = source
            .replace_chunk(ShaderChunk::EnvmapPhysicalPars, "")
            .unwrap_err();
        assert!(matches!(
            err,
            HoloError::MarkerNotFound { chunk: "envmap_physical_pars", .. }
        ));
    }

    #[test]
    fn prepend_is_idempotent() {
        let mut source = ShaderProgramSource::mesh_standard();
        assert!(source.prepend("fn helper() {}"));
        assert!(!source.prepend("fn helper() {}"));
        assert_eq!(source.segments().len(), 8);
    }

    #[test]
    fn replace_chunk_substitutes_slot_in_place() {
        let mut source = ShaderProgramSource::mesh_standard();
        source
            .replace_chunk(ShaderChunk::EnvmapPhysicalPars, "// patched")
            .unwrap();
        assert!(!source.contains_chunk(ShaderChunk::EnvmapPhysicalPars));
        assert_eq!(
            source.segments()[4],
            ShaderSegment::Inline(Cow::Borrowed("// patched"))
        );
    }

    #[test]
    fn fullscreen_program_binds_inputs_after_sampler() {
        let uniforms = UniformSet::new().with("strength", 1.0);
        let code = fullscreen_program("t", &uniforms, &["t_scene", "t_bloom"], "", "");
        assert!(code.contains("@group(0) @binding(2) var t_scene: texture_2d<f32>;"));
        assert!(code.contains("@group(0) @binding(3) var t_bloom: texture_2d<f32>;"));
        assert!(code.contains("var<uniform> u_effect: EffectUniforms;"));
    }
}
