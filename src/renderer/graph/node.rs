//! Render Node Trait
//!
//! One stage of the post-processing chain. The [`EffectComposer`] drives
//! every node in insertion order, hands each one the current ping-pong
//! buffers, and swaps them after nodes that report [`RenderNode::needs_swap`].
//!
//! [`EffectComposer`]: super::EffectComposer

use super::context::{PassContext, PassIo};
use crate::errors::Result;
use crate::renderer::core::OutputDevice;

pub trait RenderNode {
    /// Node name, used for debug groups and pass-order queries.
    fn name(&self) -> &str;

    /// Allocates internal targets and compiles programs for a drawing
    /// buffer of `width` x `height`.
    fn prepare(&mut self, _device: &mut dyn OutputDevice, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    /// Resizes internal targets.
    fn set_size(&mut self, _device: &mut dyn OutputDevice, _width: u32, _height: u32) -> Result<()> {
        Ok(())
    }

    /// Records the node's draws: reads `io.read_buffer`, writes `io.output()`.
    fn run(&mut self, ctx: &mut PassContext<'_>, io: &PassIo) -> Result<()>;

    /// Whether the composer swaps read/write buffers after this node.
    fn needs_swap(&self) -> bool {
        true
    }

    /// Releases internal targets.
    fn release(&mut self, _device: &mut dyn OutputDevice) -> Result<()> {
        Ok(())
    }
}
