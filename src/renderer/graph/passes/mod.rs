//! Pass implementations of the composer chain.

mod bloom;
mod scene;
mod shader_pass;

pub use bloom::BloomPass;
pub use scene::ScenePass;
pub use shader_pass::ShaderPass;
