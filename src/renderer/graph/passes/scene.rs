//! Scene Pass
//!
//! Rasterizes the scene into the multisampled primary target and resolves
//! it into the composer's read buffer. The pass writes no new ping-pong
//! image, so the buffers are not swapped afterwards.

use crate::errors::Result;
use crate::renderer::core::SceneOutput;
use crate::renderer::graph::{PassContext, PassIo, RenderNode};

#[derive(Debug, Default)]
pub struct ScenePass;

impl ScenePass {
    pub const NAME: &'static str = "scene";

    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl RenderNode for ScenePass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run(&mut self, ctx: &mut PassContext<'_>, io: &PassIo) -> Result<()> {
        let output = if io.render_to_screen {
            SceneOutput::Surface
        } else {
            SceneOutput::Target {
                target: ctx.scene_target,
                resolve: Some(io.read_buffer),
            }
        };
        ctx.scene_renderer
            .render(ctx.device, ctx.scene, output, ctx.clear_color)
    }

    fn needs_swap(&self) -> bool {
        false
    }
}
