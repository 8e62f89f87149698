//! Custom Post-Processing Effect Definitions
//!
//! A [`ShaderEffectDefinition`] is the static description of one
//! full-screen effect: its vertex and fragment WGSL plus the table of named
//! uniforms with their initial values. It is pure data. The render pipeline
//! clones it when building its effect pass, so two pipelines never share
//! uniform state.
//!
//! The fragment source reads its parameters from `u_effect`, samples the
//! previous pass through `t_diffuse` / `s_linear`, and receives the
//! `FullscreenOutput` produced by the vertex source.

use glam::Vec2;

use crate::errors::{HoloError, Result};
use crate::renderer::pipeline::shader_manager;
use crate::resources::UniformSet;

/// Uniform names of the hologram effect.
pub mod holo_uniforms {
    pub const SIZE: &str = "uSize";
    pub const PIXEL_RATIO: &str = "uPixelRatio";
    pub const PROGRESS: &str = "uProgress";
    pub const CENTER: &str = "center";
    pub const ANGLE: &str = "angle";
    pub const SCALE: &str = "scale";
    pub const TIME: &str = "uTime";
}

#[derive(Debug, Clone, PartialEq)]
pub struct ShaderEffectDefinition {
    label: String,
    vertex_source: String,
    fragment_source: String,
    uniforms: UniformSet,
}

impl ShaderEffectDefinition {
    /// Fails if either source is empty.
    pub fn new(
        label: impl Into<String>,
        vertex_source: impl Into<String>,
        fragment_source: impl Into<String>,
        uniforms: UniformSet,
    ) -> Result<Self> {
        let label = label.into();
        let vertex_source = vertex_source.into();
        let fragment_source = fragment_source.into();

        if vertex_source.trim().is_empty() {
            return Err(HoloError::InvalidConfiguration(format!(
                "effect `{label}` has an empty vertex source"
            )));
        }
        if fragment_source.trim().is_empty() {
            return Err(HoloError::InvalidConfiguration(format!(
                "effect `{label}` has an empty fragment source"
            )));
        }

        Ok(Self {
            label,
            vertex_source,
            fragment_source,
            uniforms,
        })
    }

    #[must_use]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[must_use]
    pub fn vertex_source(&self) -> &str {
        &self.vertex_source
    }

    #[must_use]
    pub fn fragment_source(&self) -> &str {
        &self.fragment_source
    }

    #[must_use]
    pub fn uniforms(&self) -> &UniformSet {
        &self.uniforms
    }

    pub fn uniforms_mut(&mut self) -> &mut UniformSet {
        &mut self.uniforms
    }
}

/// The hologram transition effect.
///
/// `size` is the surface size in CSS pixels; `uSize` and `uPixelRatio` are
/// rewritten by the pipeline on every resize anyway.
pub fn holo_effect(size: Vec2, pixel_ratio: f32) -> Result<ShaderEffectDefinition> {
    use holo_uniforms as u;

    let uniforms = UniformSet::new()
        .with(u::SIZE, size)
        .with(u::PIXEL_RATIO, pixel_ratio)
        .with(u::PROGRESS, 0.0)
        .with(u::CENTER, Vec2::new(0.5, 0.5))
        .with(u::ANGLE, 1.57)
        .with(u::SCALE, 1.0)
        .with(u::TIME, 0.0);

    ShaderEffectDefinition::new(
        "Holo Effect",
        shader_manager::load_source("chunks/fullscreen_vertex")?,
        shader_manager::load_source("passes/holo")?,
        uniforms,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sources_are_rejected() {
        let err = ShaderEffectDefinition::new("x", "  ", "fn f() {}", UniformSet::new()).unwrap_err();
        assert!(err.is_configuration());
        let err = ShaderEffectDefinition::new("x", "fn f() {}", "", UniformSet::new()).unwrap_err();
        assert!(err.is_configuration());
    }

    #[test]
    fn holo_effect_has_initial_uniform_table() {
        let effect = holo_effect(Vec2::new(800.0, 600.0), 2.0).unwrap();
        let names: Vec<_> = effect.uniforms().names().collect();
        assert_eq!(
            names,
            ["uSize", "uPixelRatio", "uProgress", "center", "angle", "scale", "uTime"]
        );
        assert_eq!(effect.uniforms().float("angle"), Some(1.57));
        assert_eq!(effect.uniforms().float("uTime"), Some(0.0));
        assert_eq!(effect.uniforms().vec2("center"), Some(Vec2::new(0.5, 0.5)));
    }

    #[test]
    fn clones_do_not_alias_uniforms() {
        let original = holo_effect(Vec2::new(800.0, 600.0), 1.0).unwrap();
        let mut copy = original.clone();
        copy.uniforms_mut().set("scale", 3.0).unwrap();

        assert_eq!(original.uniforms().float("scale"), Some(1.0));
        assert_eq!(copy.uniforms().float("scale"), Some(3.0));
    }
}
