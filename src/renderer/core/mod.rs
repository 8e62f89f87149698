//! Rendering backends.
//!
//! - [`OutputDevice`]: the trait every pipeline stage draws through
//! - [`WgpuDevice`]: wgpu implementation presenting to a window surface
//! - [`HeadlessDevice`]: recording implementation for offline runs and tests

pub mod device;
pub mod headless;
pub mod wgpu_device;

pub use device::{
    DrawItem, DrawTarget, FilterMode, FullscreenDraw, GeometryId, OutputDevice, ProgramDescriptor,
    ProgramId, ProgramKind, RenderTargetDescriptor, RenderTargetId, SceneDraw, SceneOutput,
    TargetFormat, TextureId,
};
pub use headless::{DeviceCommand, DeviceRecorder, HeadlessDevice};
pub use wgpu_device::WgpuDevice;
