//! Post-Processing Graph
//!
//! - [`RenderNode`]: one pass of the chain
//! - [`PassContext`] / [`PassIo`]: what a pass sees while it runs
//! - [`EffectComposer`]: ping-pong buffers and ordered execution
//! - [`passes`]: scene, bloom and custom shader passes

pub mod composer;
pub mod context;
pub mod node;
pub mod passes;

pub use composer::EffectComposer;
pub use context::{PassContext, PassIo};
pub use node::RenderNode;
pub use passes::{BloomPass, ScenePass, ShaderPass};
