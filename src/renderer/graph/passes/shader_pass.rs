//! Shader Pass
//!
//! Runs a [`ShaderEffectDefinition`] over the read buffer. The pass owns a
//! private copy of the definition's uniform table; callers animate it
//! through [`ShaderPass::uniforms`].

use std::sync::Arc;

use parking_lot::RwLock;

use crate::errors::Result;
use crate::renderer::core::{FullscreenDraw, OutputDevice, ProgramDescriptor, ProgramId, ProgramKind};
use crate::renderer::graph::{PassContext, PassIo, RenderNode};
use crate::renderer::pipeline::shader_gen::fullscreen_program;
use crate::resources::{ShaderEffectDefinition, SharedUniforms};

/// Texture the effect samples the previous pass from.
pub const SHADER_PASS_INPUT: &str = "t_diffuse";

pub struct ShaderPass {
    label: String,
    vertex_source: String,
    fragment_source: String,
    uniforms: SharedUniforms,
    program: Option<ProgramId>,
}

impl ShaderPass {
    #[must_use]
    pub fn new(effect: &ShaderEffectDefinition) -> Self {
        let effect = effect.clone();
        Self {
            label: effect.label().to_string(),
            vertex_source: effect.vertex_source().to_string(),
            fragment_source: effect.fragment_source().to_string(),
            uniforms: Arc::new(RwLock::new(effect.uniforms().clone())),
            program: None,
        }
    }

    /// Live uniform table of this pass.
    #[must_use]
    pub fn uniforms(&self) -> SharedUniforms {
        Arc::clone(&self.uniforms)
    }

    /// Generated WGSL of the pass program.
    #[must_use]
    pub fn source(&self) -> String {
        fullscreen_program(
            &self.label,
            &self.uniforms.read(),
            &[SHADER_PASS_INPUT],
            &self.vertex_source,
            &self.fragment_source,
        )
    }
}

impl RenderNode for ShaderPass {
    fn name(&self) -> &str {
        &self.label
    }

    fn prepare(&mut self, device: &mut dyn OutputDevice, _width: u32, _height: u32) -> Result<()> {
        if self.program.is_some() {
            return Ok(());
        }
        let uniform_size = self.uniforms.read().byte_size() as u64;
        let id = device.compile_program(&ProgramDescriptor {
            label: self.label.clone(),
            source: self.source(),
            kind: ProgramKind::Fullscreen {
                inputs: 1,
                uniform_size,
            },
        })?;
        self.program = Some(id);
        Ok(())
    }

    fn run(&mut self, ctx: &mut PassContext<'_>, io: &PassIo) -> Result<()> {
        let Some(program) = self.program else {
            log::warn!("ShaderPass `{}` ran before prepare", self.label);
            return Ok(());
        };
        let uniforms = self.uniforms.read().to_bytes();
        ctx.device.draw_fullscreen(&FullscreenDraw {
            label: &self.label,
            program,
            inputs: &[io.read_buffer],
            uniforms: &uniforms,
            output: io.output(),
        })
    }
}
