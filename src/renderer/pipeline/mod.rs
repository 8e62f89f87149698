//! Shader program generation and compilation.
//!
//! - [`shader_manager`]: minijinja template environment and naga validation
//! - [`shader_gen`]: segment-based program sources and compile-hook drafts
//! - [`program_cache`]: per-variant compiled mesh programs

pub mod program_cache;
pub mod shader_gen;
pub mod shader_manager;

pub use program_cache::{CompiledProgram, ProgramCache};
pub use shader_gen::{ProgramDraft, ShaderChunk, ShaderProgramSource, ShaderSegment};
pub use shader_manager::ShaderManager;
