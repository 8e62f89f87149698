//! Resource Module
//!
//! Plain data consumed by the renderer:
//!
//! - [`Color`], [`UniformSet`]: colours and named uniform tables
//! - [`ShaderEffectDefinition`]: custom post-processing effect descriptions
//! - [`MeshStandardMaterial`], [`Geometry`]: what a mesh is drawn with
//! - [`BloomSettings`], [`ToneMappingSettings`]: pipeline configuration
//! - [`ShaderDefines`]: compile-time variant selection

pub mod bloom;
pub mod color;
pub mod effect;
pub mod geometry;
pub mod material;
pub mod shader_defines;
pub mod texture;
pub mod tone_mapping;
pub mod uniforms;

pub use bloom::BloomSettings;
pub use color::Color;
pub use effect::{ShaderEffectDefinition, holo_effect};
pub use geometry::{BoundingBox, Geometry, Vertex};
pub use material::{CompileHook, MaterialRef, MaterialUniforms, MeshStandardMaterial};
pub use shader_defines::ShaderDefines;
pub use texture::{CubeTextureData, EnvironmentMap, ImageData};
pub use tone_mapping::{ToneMappingMode, ToneMappingSettings};
pub use uniforms::{SharedUniforms, UniformSet, UniformValue};
