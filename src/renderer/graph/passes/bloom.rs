//! Bloom Pass
//!
//! Unreal-style bloom over the read buffer:
//!
//! 1. **High-pass**: luminosity threshold into a half-resolution bright target
//! 2. **Blur chain**: per mip level a separable Gaussian, horizontal into
//!    `H[i]` then vertical into `V[i]`; each level reads the previous
//!    level's `V` and is half the size
//! 3. **Composite**: weighted sum of every `V[i]` into `H[0]`
//! 4. **Blend**: read buffer plus `H[0]` into the pass output
//!
//! ```text
//! read ─▶ bright ─▶ H0 ─▶ V0 ─▶ H1 ─▶ V1 ─▶ ... ─▶ V4
//!                               composite(V0..V4) ─▶ H0
//! read + H0 ─▶ output
//! ```
//!
//! All eleven internal targets are allocated once in `prepare` and only
//! resized afterwards.

use glam::Vec2;
use minijinja::context;

use crate::errors::{HoloError, Result};
use crate::renderer::core::{
    DrawTarget, FullscreenDraw, OutputDevice, ProgramDescriptor, ProgramId, ProgramKind,
    RenderTargetDescriptor, RenderTargetId,
};
use crate::renderer::graph::{PassContext, PassIo, RenderNode};
use crate::renderer::pipeline::shader_gen::fullscreen_program;
use crate::renderer::pipeline::shader_manager;
use crate::resources::bloom::{BLOOM_KERNEL_SIZES, BLOOM_MIP_COUNT, LUMINOSITY_SMOOTH_WIDTH};
use crate::resources::{BloomSettings, UniformSet};

const BLUR_DIRECTION_X: Vec2 = Vec2::new(1.0, 0.0);
const BLUR_DIRECTION_Y: Vec2 = Vec2::new(0.0, 1.0);

/// Gaussian weights for taps `0..kernel_radius`, with sigma = `kernel_radius`.
#[must_use]
pub fn gaussian_weights(kernel_radius: u32) -> Vec<f32> {
    let sigma = kernel_radius as f32;
    (0..kernel_radius)
        .map(|i| {
            let x = i as f32;
            0.398_94 * (-0.5 * x * x / (sigma * sigma)).exp() / sigma
        })
        .collect()
}

/// Size of every mip level for a `width` x `height` input: half resolution,
/// then halving per level.
#[must_use]
pub fn mip_sizes(width: u32, height: u32) -> [(u32, u32); BLOOM_MIP_COUNT] {
    let mut x = (width as f32 / 2.0).round();
    let mut y = (height as f32 / 2.0).round();
    std::array::from_fn(|_| {
        let size = ((x as u32).max(1), (y as u32).max(1));
        x = (x / 2.0).round();
        y = (y / 2.0).round();
        size
    })
}

struct BloomTargets {
    bright: RenderTargetId,
    horizontal: [RenderTargetId; BLOOM_MIP_COUNT],
    vertical: [RenderTargetId; BLOOM_MIP_COUNT],
}

struct BloomPrograms {
    luminosity: ProgramId,
    blur: [ProgramId; BLOOM_MIP_COUNT],
    composite: ProgramId,
    blend: ProgramId,
}

pub struct BloomPass {
    settings: BloomSettings,
    sizes: [(u32, u32); BLOOM_MIP_COUNT],
    targets: Option<BloomTargets>,
    programs: Option<BloomPrograms>,
}

impl BloomPass {
    pub const NAME: &'static str = "bloom";

    #[must_use]
    pub fn new(settings: BloomSettings) -> Self {
        Self {
            settings,
            sizes: [(1, 1); BLOOM_MIP_COUNT],
            targets: None,
            programs: None,
        }
    }

    #[must_use]
    pub fn settings(&self) -> BloomSettings {
        self.settings
    }

    pub fn set_settings(&mut self, settings: BloomSettings) {
        self.settings = settings;
    }

    /// Current mip level sizes.
    #[must_use]
    pub fn sizes(&self) -> [(u32, u32); BLOOM_MIP_COUNT] {
        self.sizes
    }

    fn luminosity_uniforms(&self) -> UniformSet {
        UniformSet::new()
            .with("luminosityThreshold", self.settings.threshold)
            .with("smoothWidth", LUMINOSITY_SMOOTH_WIDTH)
    }

    fn blur_uniforms(direction: Vec2, size: (u32, u32)) -> UniformSet {
        UniformSet::new()
            .with("direction", direction)
            .with("invSize", Vec2::new(1.0 / size.0 as f32, 1.0 / size.1 as f32))
    }

    fn composite_uniforms(&self) -> UniformSet {
        let factors = self.settings.mip_factors();
        let mut set = UniformSet::new().with("bloomStrength", self.settings.strength);
        for (i, factor) in factors.iter().enumerate() {
            set = set.with(&format!("bloomFactor{i}"), *factor);
        }
        set
    }

    fn compile(
        device: &mut dyn OutputDevice,
        label: &str,
        uniforms: &UniformSet,
        inputs: &[&str],
        fragment: &str,
    ) -> Result<ProgramId> {
        let vertex = shader_manager::load_source("chunks/fullscreen_vertex")?;
        let source = fullscreen_program(label, uniforms, inputs, &vertex, fragment);
        device.compile_program(&ProgramDescriptor {
            label: label.to_string(),
            source,
            kind: ProgramKind::Fullscreen {
                inputs: inputs.len() as u32,
                uniform_size: if uniforms.is_empty() { 0 } else { uniforms.byte_size() as u64 },
            },
        })
    }

    fn compile_programs(&self, device: &mut dyn OutputDevice) -> Result<BloomPrograms> {
        let luminosity = Self::compile(
            device,
            "bloom.luminosity",
            &self.luminosity_uniforms(),
            &["t_diffuse"],
            &shader_manager::render_template("passes/bloom_luminosity", context! {})?,
        )?;

        let mut blur = Vec::with_capacity(BLOOM_MIP_COUNT);
        for (level, kernel_radius) in BLOOM_KERNEL_SIZES.iter().enumerate() {
            let weights: Vec<String> = gaussian_weights(*kernel_radius)
                .iter()
                .map(|w| format!("{w:.8}"))
                .collect();
            let fragment = shader_manager::render_template(
                "passes/bloom_blur",
                context! { kernel_radius => kernel_radius, weights => weights },
            )?;
            blur.push(Self::compile(
                device,
                &format!("bloom.blur{level}"),
                &Self::blur_uniforms(BLUR_DIRECTION_X, (1, 1)),
                &["t_diffuse"],
                &fragment,
            )?);
        }
        let blur: [ProgramId; BLOOM_MIP_COUNT] = blur
            .try_into()
            .map_err(|_| HoloError::InvalidConfiguration("bloom blur chain length".into()))?;

        let blur_inputs: Vec<String> = (0..BLOOM_MIP_COUNT).map(|i| format!("t_blur{i}")).collect();
        let blur_input_refs: Vec<&str> = blur_inputs.iter().map(String::as_str).collect();
        let composite = Self::compile(
            device,
            "bloom.composite",
            &self.composite_uniforms(),
            &blur_input_refs,
            &shader_manager::render_template(
                "passes/bloom_composite",
                context! { mip_count => BLOOM_MIP_COUNT },
            )?,
        )?;

        let blend = Self::compile(
            device,
            "bloom.blend",
            &UniformSet::new(),
            &["t_diffuse", "t_bloom"],
            &shader_manager::render_template("passes/bloom_blend", context! {})?,
        )?;

        Ok(BloomPrograms {
            luminosity,
            blur,
            composite,
            blend,
        })
    }

    fn allocate_targets(&self, device: &mut dyn OutputDevice) -> Result<BloomTargets> {
        let (bw, bh) = self.sizes[0];
        let bright = device.create_render_target(&RenderTargetDescriptor::color("bloom.bright", bw, bh))?;

        let mut horizontal = [RenderTargetId::default(); BLOOM_MIP_COUNT];
        let mut vertical = [RenderTargetId::default(); BLOOM_MIP_COUNT];
        for (i, (w, h)) in self.sizes.iter().enumerate() {
            horizontal[i] = device.create_render_target(&RenderTargetDescriptor::color(
                format!("bloom.h{i}"),
                *w,
                *h,
            ))?;
            vertical[i] = device.create_render_target(&RenderTargetDescriptor::color(
                format!("bloom.v{i}"),
                *w,
                *h,
            ))?;
        }

        Ok(BloomTargets {
            bright,
            horizontal,
            vertical,
        })
    }
}

impl RenderNode for BloomPass {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn prepare(&mut self, device: &mut dyn OutputDevice, width: u32, height: u32) -> Result<()> {
        self.sizes = mip_sizes(width, height);
        if self.targets.is_none() {
            self.targets = Some(self.allocate_targets(device)?);
        }
        if self.programs.is_none() {
            self.programs = Some(self.compile_programs(device)?);
        }
        Ok(())
    }

    fn set_size(&mut self, device: &mut dyn OutputDevice, width: u32, height: u32) -> Result<()> {
        self.sizes = mip_sizes(width, height);
        let Some(targets) = &self.targets else {
            return Ok(());
        };
        let (bw, bh) = self.sizes[0];
        device.resize_render_target(targets.bright, bw, bh)?;
        for (i, (w, h)) in self.sizes.iter().enumerate() {
            device.resize_render_target(targets.horizontal[i], *w, *h)?;
            device.resize_render_target(targets.vertical[i], *w, *h)?;
        }
        Ok(())
    }

    fn run(&mut self, ctx: &mut PassContext<'_>, io: &PassIo) -> Result<()> {
        let (Some(targets), Some(programs)) = (&self.targets, &self.programs) else {
            log::warn!("BloomPass ran before prepare");
            return Ok(());
        };
        let device = &mut *ctx.device;

        device.draw_fullscreen(&FullscreenDraw {
            label: "bloom.luminosity",
            program: programs.luminosity,
            inputs: &[io.read_buffer],
            uniforms: &self.luminosity_uniforms().to_bytes(),
            output: DrawTarget::Target(targets.bright),
        })?;

        let mut input = targets.bright;
        for level in 0..BLOOM_MIP_COUNT {
            let size = self.sizes[level];
            device.draw_fullscreen(&FullscreenDraw {
                label: "bloom.blur.h",
                program: programs.blur[level],
                inputs: &[input],
                uniforms: &Self::blur_uniforms(BLUR_DIRECTION_X, size).to_bytes(),
                output: DrawTarget::Target(targets.horizontal[level]),
            })?;
            device.draw_fullscreen(&FullscreenDraw {
                label: "bloom.blur.v",
                program: programs.blur[level],
                inputs: &[targets.horizontal[level]],
                uniforms: &Self::blur_uniforms(BLUR_DIRECTION_Y, size).to_bytes(),
                output: DrawTarget::Target(targets.vertical[level]),
            })?;
            input = targets.vertical[level];
        }

        device.draw_fullscreen(&FullscreenDraw {
            label: "bloom.composite",
            program: programs.composite,
            inputs: &targets.vertical,
            uniforms: &self.composite_uniforms().to_bytes(),
            output: DrawTarget::Target(targets.horizontal[0]),
        })?;

        device.draw_fullscreen(&FullscreenDraw {
            label: "bloom.blend",
            program: programs.blend,
            inputs: &[io.read_buffer, targets.horizontal[0]],
            uniforms: &[],
            output: io.output(),
        })
    }

    fn release(&mut self, device: &mut dyn OutputDevice) -> Result<()> {
        if let Some(targets) = self.targets.take() {
            device.release_render_target(targets.bright)?;
            for id in targets.horizontal.into_iter().chain(targets.vertical) {
                device.release_render_target(id)?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mip_chain_halves_from_half_resolution() {
        let sizes = mip_sizes(800, 600);
        assert_eq!(sizes, [(400, 300), (200, 150), (100, 75), (50, 38), (25, 19)]);
    }

    #[test]
    fn weights_follow_normal_density() {
        let weights = gaussian_weights(3);
        assert_eq!(weights.len(), 3);
        assert!((weights[0] - 0.398_94 / 3.0).abs() < 1e-6);
        assert!(weights[0] > weights[1] && weights[1] > weights[2]);
    }

    #[test]
    fn tiny_inputs_keep_targets_non_empty() {
        let sizes = mip_sizes(3, 1);
        assert!(sizes.iter().all(|(w, h)| *w >= 1 && *h >= 1));
    }
}
