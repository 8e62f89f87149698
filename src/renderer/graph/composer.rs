//! Effect Composer
//!
//! Owns the two ping-pong colour buffers and the ordered node list.
//!
//! ```text
//! scene ──▶ [read] ──▶ bloom ──▶ [write] ─swap─▶ [read] ──▶ effect ──▶ surface
//! ```
//!
//! Each node reads the current read buffer. Nodes that write a new image
//! write the write buffer (or the surface, when last) and the buffers swap.
//! The order is fixed once built.

use super::context::{PassContext, PassIo};
use super::node::RenderNode;
use crate::errors::Result;
use crate::renderer::core::{OutputDevice, RenderTargetDescriptor, RenderTargetId};

pub struct EffectComposer {
    render_target1: RenderTargetId,
    render_target2: RenderTargetId,
    write_buffer: RenderTargetId,
    read_buffer: RenderTargetId,
    passes: Vec<Box<dyn RenderNode>>,
    width: u32,
    height: u32,
}

impl EffectComposer {
    /// Allocates both ping-pong buffers at the drawing-buffer size.
    pub fn new(device: &mut dyn OutputDevice, width: u32, height: u32) -> Result<Self> {
        let render_target1 =
            device.create_render_target(&RenderTargetDescriptor::color("composer.buffer1", width, height))?;
        let render_target2 =
            device.create_render_target(&RenderTargetDescriptor::color("composer.buffer2", width, height))?;

        Ok(Self {
            render_target1,
            render_target2,
            write_buffer: render_target1,
            read_buffer: render_target2,
            passes: Vec::with_capacity(4),
            width,
            height,
        })
    }

    /// Prepares `pass` at the current size and appends it to the chain.
    pub fn add_pass(&mut self, device: &mut dyn OutputDevice, mut pass: Box<dyn RenderNode>) -> Result<()> {
        pass.prepare(device, self.width, self.height)?;
        log::debug!("EffectComposer: added pass `{}`", pass.name());
        self.passes.push(pass);
        Ok(())
    }

    #[must_use]
    pub fn pass_names(&self) -> Vec<&str> {
        self.passes.iter().map(|p| p.name()).collect()
    }

    #[must_use]
    pub fn buffers(&self) -> [RenderTargetId; 2] {
        [self.render_target1, self.render_target2]
    }

    #[must_use]
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn set_size(&mut self, device: &mut dyn OutputDevice, width: u32, height: u32) -> Result<()> {
        self.width = width;
        self.height = height;
        device.resize_render_target(self.render_target1, width, height)?;
        device.resize_render_target(self.render_target2, width, height)?;
        for pass in &mut self.passes {
            pass.set_size(device, width, height)?;
        }
        Ok(())
    }

    fn swap_buffers(&mut self) {
        std::mem::swap(&mut self.read_buffer, &mut self.write_buffer);
    }

    /// Runs every pass once, in order.
    pub fn render(&mut self, ctx: &mut PassContext<'_>) -> Result<()> {
        let last = self.passes.len().saturating_sub(1);
        for index in 0..self.passes.len() {
            let io = PassIo {
                read_buffer: self.read_buffer,
                write_buffer: self.write_buffer,
                render_to_screen: index == last,
            };

            let pass = &mut self.passes[index];
            ctx.device.push_debug_group(pass.name());
            let result = pass.run(ctx, &io);
            ctx.device.pop_debug_group();
            result?;

            if pass.needs_swap() {
                self.swap_buffers();
            }
        }
        Ok(())
    }

    /// Releases both ping-pong buffers.
    pub fn release_buffers(&mut self, device: &mut dyn OutputDevice) -> Result<()> {
        device.release_render_target(self.render_target1)?;
        device.release_render_target(self.render_target2)?;
        Ok(())
    }

    /// Releases pass-internal targets.
    pub fn release_passes(&mut self, device: &mut dyn OutputDevice) -> Result<()> {
        for pass in &mut self.passes {
            pass.release(device)?;
        }
        Ok(())
    }
}
