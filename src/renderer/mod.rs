//! Render Pipeline
//!
//! [`RenderPipeline`] owns the output device, the scene, and the
//! post-processing chain built on top of them:
//!
//! ```text
//! ScenePass ──▶ BloomPass(1.5, 0.8, 0.05) ──▶ ShaderPass(effect) ──▶ surface
//! ```
//!
//! # Lifecycle
//!
//! ```text
//! Uninitialized ──initialize──▶ Initialized ──dispose──▶ Disposed
//! ```
//!
//! `update`, `resize`, `compile` and `dispose` are only valid while
//! `Initialized`; anywhere else they fail with [`HoloError::Lifecycle`].
//!
//! # Module Structure
//!
//! - [`core`]: the [`OutputDevice`] seam with its wgpu and headless backends
//! - [`pipeline`]: shader templates, material program generation and caching
//! - [`graph`]: the pass chain and its composer
//! - [`scene_renderer`]: scene to draw-list translation
//! - [`settings`]: [`PipelineSettings`]

pub mod core;
pub mod graph;
pub mod pipeline;
pub mod scene_renderer;
pub mod settings;

use crate::errors::{HoloError, Result};
use crate::resources::effect::holo_uniforms;
use crate::resources::{
    Color, CubeTextureData, EnvironmentMap, ShaderEffectDefinition, SharedUniforms,
    ToneMappingMode, ToneMappingSettings,
};
use crate::scene::Scene;

use self::core::{
    FilterMode, OutputDevice, RenderTargetDescriptor, RenderTargetId, SceneOutput, TargetFormat,
};
use self::graph::{BloomPass, EffectComposer, PassContext, ScenePass, ShaderPass};
use self::scene_renderer::SceneRenderer;

pub use self::settings::{PipelineSettings, RENDER_TARGET_SAMPLES};

/// `uTime = elapsed_ms * EFFECT_TIME_SCALE` for the effect pass.
pub const EFFECT_TIME_SCALE: f64 = 0.003;

/// Label of the multisampled primary target.
pub const PRIMARY_TARGET_LABEL: &str = "pipeline.render_target";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
    Uninitialized,
    Initialized,
    Disposed,
}

/// Resources that only exist while the pipeline is initialized.
struct FrameResources {
    render_target: RenderTargetId,
    composer: EffectComposer,
    effect_uniforms: SharedUniforms,
}

pub struct RenderPipeline<D: OutputDevice + 'static> {
    device: D,
    settings: PipelineSettings,
    effect: ShaderEffectDefinition,
    scene: Scene,
    scene_renderer: SceneRenderer,
    state: PipelineState,
    frame: Option<FrameResources>,
    clear_color: Color,
    effect_time: f32,
}

impl<D: OutputDevice + 'static> RenderPipeline<D> {
    #[must_use]
    pub fn new(device: D, settings: PipelineSettings, effect: ShaderEffectDefinition) -> Self {
        let scene_renderer = SceneRenderer::new(settings.tone_mapping_settings());
        Self {
            device,
            clear_color: settings.clear_color,
            settings,
            effect,
            scene: Scene::new(),
            scene_renderer,
            state: PipelineState::Uninitialized,
            frame: None,
            effect_time: 0.0,
        }
    }

    fn require(&self, operation: &'static str, state: PipelineState) -> Result<()> {
        if self.state == state {
            Ok(())
        } else {
            log::error!("RenderPipeline::{operation} rejected in state {:?}", self.state);
            Err(HoloError::Lifecycle {
                operation,
                state: self.state,
            })
        }
    }

    /// Configures the device and builds the primary target and pass chain.
    ///
    /// `width` / `height` are surface pixels before `pixel_ratio`.
    pub fn initialize(
        &mut self,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        clear_color: Color,
        tone_mapping: ToneMappingSettings,
    ) -> Result<()> {
        self.require("initialize", PipelineState::Uninitialized)?;

        self.clear_color = clear_color;
        self.settings.clear_color = clear_color;
        self.settings.tone_mapping = tone_mapping.mode;
        self.settings.exposure = tone_mapping.exposure();
        self.scene_renderer.set_tone_mapping(tone_mapping);
        self.scene.camera.set_aspect(width as f32 / height.max(1) as f32);

        self.device.set_size(width, height, pixel_ratio);
        self.device.set_clear_color(clear_color);
        let (dw, dh) = self.device.drawing_size();

        let render_target = self.device.create_render_target(&RenderTargetDescriptor {
            label: PRIMARY_TARGET_LABEL.to_string(),
            width: dw,
            height: dh,
            sample_count: self.settings.sample_count,
            format: TargetFormat::Rgba16Float,
            filter: FilterMode::Linear,
            mipmaps: false,
            depth: true,
        })?;

        let mut effect = self.effect.clone();
        {
            let uniforms = effect.uniforms_mut();
            uniforms.set(holo_uniforms::SCALE, 1.0)?;
            uniforms.set(holo_uniforms::SIZE, glam::Vec2::new(width as f32, height as f32))?;
            uniforms.set(holo_uniforms::PIXEL_RATIO, pixel_ratio)?;
        }
        let effect_pass = ShaderPass::new(&effect);
        let effect_uniforms = effect_pass.uniforms();

        let device: &mut dyn OutputDevice = &mut self.device;
        let mut composer = EffectComposer::new(device, dw, dh)?;
        composer.add_pass(device, Box::new(ScenePass::new()))?;
        composer.add_pass(device, Box::new(BloomPass::new(self.settings.bloom)))?;
        composer.add_pass(device, Box::new(effect_pass))?;

        self.frame = Some(FrameResources {
            render_target,
            composer,
            effect_uniforms,
        });
        self.state = PipelineState::Initialized;

        log::info!(
            "RenderPipeline initialized at {width}x{height} @{pixel_ratio} ({dw}x{dh}, {} samples)",
            self.settings.sample_count
        );
        Ok(())
    }

    fn frame(&self, operation: &'static str) -> Result<&FrameResources> {
        self.frame.as_ref().ok_or(HoloError::Lifecycle {
            operation,
            state: self.state,
        })
    }

    /// Renders one frame. With post-processing on, the effect's `uTime` is
    /// advanced first; direct mode leaves it untouched.
    pub fn update(&mut self, elapsed: f64) -> Result<()> {
        self.require("update", PipelineState::Initialized)?;

        if self.settings.use_postprocess {
            self.effect_time = (elapsed * EFFECT_TIME_SCALE) as f32;
            self.frame("update")?
                .effect_uniforms
                .write()
                .set(holo_uniforms::TIME, self.effect_time)?;
        }

        if !self.device.begin_frame()? {
            return Ok(());
        }

        let Self {
            device,
            scene,
            scene_renderer,
            frame,
            clear_color,
            settings,
            state,
            ..
        } = self;
        let frame = frame.as_mut().ok_or(HoloError::Lifecycle {
            operation: "update",
            state: *state,
        })?;

        if settings.use_postprocess {
            let mut ctx = PassContext {
                device,
                scene,
                scene_renderer,
                scene_target: frame.render_target,
                clear_color: *clear_color,
            };
            frame.composer.render(&mut ctx)?;
        } else {
            scene_renderer.render(device, scene, SceneOutput::Surface, *clear_color)?;
        }

        self.device.present();
        Ok(())
    }

    /// Resizes the device and every render target. Allocates nothing.
    pub fn resize(&mut self, width: u32, height: u32, pixel_ratio: f32) -> Result<()> {
        self.require("resize", PipelineState::Initialized)?;

        self.device.set_size(width, height, pixel_ratio);
        let (dw, dh) = self.device.drawing_size();
        self.scene.camera.set_aspect(width as f32 / height.max(1) as f32);

        let Self { device, frame, state, .. } = self;
        let frame = frame.as_mut().ok_or(HoloError::Lifecycle {
            operation: "resize",
            state: *state,
        })?;
        device.resize_render_target(frame.render_target, dw, dh)?;
        frame.composer.set_size(device, dw, dh)?;

        {
            let mut uniforms = frame.effect_uniforms.write();
            uniforms.set(holo_uniforms::SIZE, glam::Vec2::new(width as f32, height as f32))?;
            uniforms.set(holo_uniforms::PIXEL_RATIO, pixel_ratio)?;
        }

        log::debug!("RenderPipeline resized to {width}x{height} @{pixel_ratio} ({dw}x{dh})");
        Ok(())
    }

    /// Releases render lists, the device, the primary target, both ping-pong
    /// buffers and finally the bloom targets.
    pub fn dispose(&mut self) -> Result<()> {
        self.require("dispose", PipelineState::Initialized)?;

        let Some(mut frame) = self.frame.take() else {
            return Err(HoloError::Lifecycle {
                operation: "dispose",
                state: self.state,
            });
        };

        self.device.release_render_lists();
        self.device.dispose();
        self.device.release_render_target(frame.render_target)?;
        frame.composer.release_buffers(&mut self.device)?;
        frame.composer.release_passes(&mut self.device)?;
        self.scene_renderer.clear();

        self.state = PipelineState::Disposed;
        log::info!("RenderPipeline disposed");
        Ok(())
    }

    /// Uploads geometry and compiles every material program without drawing.
    pub fn compile(&mut self) -> Result<()> {
        self.require("compile", PipelineState::Initialized)?;
        self.scene_renderer.prepare(&mut self.device, &mut self.scene)
    }

    /// Uploads a prefiltered cube map for use as a material environment.
    pub fn upload_environment(&mut self, data: &CubeTextureData) -> Result<EnvironmentMap> {
        self.require("upload_environment", PipelineState::Initialized)?;
        let texture = self.device.create_cube_texture(data)?;
        Ok(EnvironmentMap {
            texture,
            mip_levels: data.mip_count(),
        })
    }

    pub fn set_use_postprocess(&mut self, enabled: bool) {
        self.settings.use_postprocess = enabled;
    }

    #[must_use]
    pub fn use_postprocess(&self) -> bool {
        self.settings.use_postprocess
    }

    /// Switches the tone-mapping operator. Returns how many opaque materials
    /// were marked for refresh (0 when the mode is unchanged).
    pub fn set_tone_mapping_mode(&mut self, mode: ToneMappingMode) -> usize {
        if !self.scene_renderer.set_tone_mapping_mode(mode) {
            return 0;
        }
        self.settings.tone_mapping = mode;
        let marked = self.scene.mark_opaque_materials_needs_update();
        log::debug!("Tone mapping set to {}; {marked} materials need update", mode.name());
        marked
    }

    pub fn set_exposure(&mut self, exposure: f32) {
        self.scene_renderer.set_exposure(exposure);
        self.settings.exposure = self.scene_renderer.tone_mapping().exposure();
    }

    #[must_use]
    pub fn tone_mapping(&self) -> ToneMappingSettings {
        self.scene_renderer.tone_mapping()
    }

    pub fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
        self.settings.clear_color = color;
        self.device.set_clear_color(color);
    }

    #[must_use]
    pub fn clear_color(&self) -> Color {
        self.clear_color
    }

    #[must_use]
    pub fn scene(&self) -> &Scene {
        &self.scene
    }

    pub fn scene_mut(&mut self) -> &mut Scene {
        &mut self.scene
    }

    #[must_use]
    pub fn device(&self) -> &D {
        &self.device
    }

    pub fn device_mut(&mut self) -> &mut D {
        &mut self.device
    }

    #[must_use]
    pub fn settings(&self) -> &PipelineSettings {
        &self.settings
    }

    #[must_use]
    pub fn state(&self) -> PipelineState {
        self.state
    }

    /// Live uniforms of the effect pass, `None` unless initialized.
    #[must_use]
    pub fn effect_uniforms(&self) -> Option<SharedUniforms> {
        self.frame.as_ref().map(|f| SharedUniforms::clone(&f.effect_uniforms))
    }

    /// Last `uTime` written to the effect pass.
    #[must_use]
    pub fn effect_time(&self) -> f32 {
        self.effect_time
    }

    #[must_use]
    pub fn render_target(&self) -> Option<RenderTargetId> {
        self.frame.as_ref().map(|f| f.render_target)
    }

    /// Pass names in execution order.
    #[must_use]
    pub fn pass_names(&self) -> Vec<String> {
        self.frame
            .as_ref()
            .map(|f| f.composer.pass_names().into_iter().map(str::to_string).collect())
            .unwrap_or_default()
    }

    /// `(label, wgsl)` of every compiled material program.
    #[must_use]
    pub fn program_sources(&self) -> Vec<(String, String)> {
        self.scene_renderer.program_sources()
    }
}

#[cfg(test)]
mod tests {
    use glam::Vec2;

    use super::core::HeadlessDevice;
    use super::*;
    use crate::resources::holo_effect;

    fn pipeline() -> RenderPipeline<HeadlessDevice> {
        RenderPipeline::new(
            HeadlessDevice::new(),
            PipelineSettings::default(),
            holo_effect(Vec2::new(800.0, 600.0), 1.0).unwrap(),
        )
    }

    #[test]
    fn update_before_initialize_is_lifecycle_error() {
        let mut pipeline = pipeline();
        let err = pipeline.update(16.0).unwrap_err();
        assert!(err.is_lifecycle());
        assert!(pipeline.resize(10, 10, 1.0).unwrap_err().is_lifecycle());
    }

    #[test]
    fn initialize_twice_is_rejected() {
        let mut pipeline = pipeline();
        pipeline
            .initialize(800, 600, 1.0, Color::BLACK, ToneMappingSettings::default())
            .unwrap();
        let err = pipeline
            .initialize(800, 600, 1.0, Color::BLACK, ToneMappingSettings::default())
            .unwrap_err();
        assert!(matches!(
            err,
            HoloError::Lifecycle { operation: "initialize", state: PipelineState::Initialized }
        ));
    }

    #[test]
    fn effect_scale_is_forced_to_one() {
        let mut effect = holo_effect(Vec2::new(800.0, 600.0), 1.0).unwrap();
        effect.uniforms_mut().set("scale", 4.0).unwrap();
        let mut pipeline = RenderPipeline::new(HeadlessDevice::new(), PipelineSettings::default(), effect);
        pipeline
            .initialize(800, 600, 1.0, Color::BLACK, ToneMappingSettings::default())
            .unwrap();
        let uniforms = pipeline.effect_uniforms().unwrap();
        assert_eq!(uniforms.read().float("scale"), Some(1.0));
    }
}
