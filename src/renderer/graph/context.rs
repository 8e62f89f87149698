//! Per-frame pass context.

use crate::renderer::core::{DrawTarget, OutputDevice, RenderTargetId};
use crate::renderer::scene_renderer::SceneRenderer;
use crate::resources::Color;
use crate::scene::Scene;

/// Shared state every node sees during one frame.
pub struct PassContext<'a> {
    pub device: &'a mut dyn OutputDevice,
    pub scene: &'a mut Scene,
    pub scene_renderer: &'a mut SceneRenderer,
    /// Multisampled primary target the scene is rasterized into.
    pub scene_target: RenderTargetId,
    pub clear_color: Color,
}

/// Buffers assigned to one node for one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PassIo {
    pub read_buffer: RenderTargetId,
    pub write_buffer: RenderTargetId,
    /// Set for the last node of the chain.
    pub render_to_screen: bool,
}

impl PassIo {
    /// Where a node that writes a new image should draw.
    #[must_use]
    pub fn output(&self) -> DrawTarget {
        if self.render_to_screen {
            DrawTarget::Surface
        } else {
            DrawTarget::Target(self.write_buffer)
        }
    }
}
