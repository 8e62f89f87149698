//! Output Device
//!
//! [`OutputDevice`] is the seam between pipeline logic and the GPU. The render
//! pipeline, the pass chain and the program cache only ever talk to this
//! trait; [`WgpuDevice`](super::WgpuDevice) implements it on wgpu and
//! [`HeadlessDevice`](super::HeadlessDevice) records every call for offline
//! runs and tests.
//!
//! Resources are addressed by slotmap keys handed out by the device. Sizes
//! passed to render-target methods are drawing-buffer sizes (already
//! multiplied by the pixel ratio).

use slotmap::new_key_type;

use crate::errors::Result;
use crate::resources::{Color, CubeTextureData, Geometry};

new_key_type! {
    pub struct RenderTargetId;
    pub struct ProgramId;
    pub struct TextureId;
    pub struct GeometryId;
}

/// Colour format of an off-screen target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetFormat {
    #[default]
    Rgba16Float,
    Rgba8Unorm,
}

impl TargetFormat {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::TextureFormat {
        match self {
            Self::Rgba16Float => wgpu::TextureFormat::Rgba16Float,
            Self::Rgba8Unorm => wgpu::TextureFormat::Rgba8Unorm,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FilterMode {
    Nearest,
    #[default]
    Linear,
}

impl FilterMode {
    #[must_use]
    pub fn to_wgpu(self) -> wgpu::FilterMode {
        match self {
            Self::Nearest => wgpu::FilterMode::Nearest,
            Self::Linear => wgpu::FilterMode::Linear,
        }
    }
}

/// Off-screen colour buffer description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderTargetDescriptor {
    pub label: String,
    pub width: u32,
    pub height: u32,
    pub sample_count: u32,
    pub format: TargetFormat,
    pub filter: FilterMode,
    pub mipmaps: bool,
    /// Attach a depth buffer (scene targets only).
    pub depth: bool,
}

impl RenderTargetDescriptor {
    /// Single-sample, linear-filtered, non-mipmapped colour target.
    #[must_use]
    pub fn color(label: impl Into<String>, width: u32, height: u32) -> Self {
        Self {
            label: label.into(),
            width: width.max(1),
            height: height.max(1),
            sample_count: 1,
            format: TargetFormat::Rgba16Float,
            filter: FilterMode::Linear,
            mipmaps: false,
            depth: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgramKind {
    /// Scene mesh program; `custom_uniform_size` is the byte size of the
    /// hook-injected uniform block (0 when none).
    Mesh { custom_uniform_size: u64 },
    /// Full-screen pass program sampling `inputs` textures.
    Fullscreen { inputs: u32, uniform_size: u64 },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgramDescriptor {
    pub label: String,
    pub source: String,
    pub kind: ProgramKind,
}

/// Where a draw writes its colour.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawTarget {
    Target(RenderTargetId),
    Surface,
}

/// Scene draw destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SceneOutput {
    /// Render into a (multisampled) target, optionally resolving into another.
    Target {
        target: RenderTargetId,
        resolve: Option<RenderTargetId>,
    },
    /// Render straight to the visible surface.
    Surface,
}

/// One mesh draw with its uniform payloads already packed.
#[derive(Debug, Clone, PartialEq)]
pub struct DrawItem {
    pub program: ProgramId,
    pub geometry: GeometryId,
    pub env_map: Option<TextureId>,
    pub object_uniforms: Vec<u8>,
    pub custom_uniforms: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy)]
pub struct SceneDraw<'a> {
    pub output: SceneOutput,
    pub clear_color: Color,
    pub frame_uniforms: &'a [u8],
    pub items: &'a [DrawItem],
}

#[derive(Debug, Clone, Copy)]
pub struct FullscreenDraw<'a> {
    pub label: &'a str,
    pub program: ProgramId,
    pub inputs: &'a [RenderTargetId],
    pub uniforms: &'a [u8],
    pub output: DrawTarget,
}

/// Rendering backend used by the pipeline.
pub trait OutputDevice {
    /// Sets the surface size in CSS pixels and the device pixel ratio.
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32);

    /// Drawing-buffer size (`size * pixel_ratio`).
    fn drawing_size(&self) -> (u32, u32);

    fn set_clear_color(&mut self, color: Color);

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> Result<RenderTargetId>;

    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32) -> Result<()>;

    fn release_render_target(&mut self, id: RenderTargetId) -> Result<()>;

    /// Uploads `geometry`, replacing the contents of `existing` when given.
    fn upload_geometry(&mut self, geometry: &Geometry, existing: Option<GeometryId>) -> Result<GeometryId>;

    fn create_cube_texture(&mut self, data: &CubeTextureData) -> Result<TextureId>;

    fn compile_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId>;

    /// Acquires the frame's surface image. `false` skips the frame.
    fn begin_frame(&mut self) -> Result<bool>;

    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> Result<()>;

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) -> Result<()>;

    /// Submits recorded work and presents the surface image.
    fn present(&mut self);

    fn push_debug_group(&mut self, label: &str);

    fn pop_debug_group(&mut self);

    /// Drops per-frame draw-list caches.
    fn release_render_lists(&mut self);

    /// Releases device-level resources (programs, geometry, textures,
    /// surface). Render targets stay valid until released individually.
    fn dispose(&mut self);
}
