//! Headless Output Device
//!
//! A recording [`OutputDevice`] with no GPU behind it. Every call is appended
//! to a shared [`DeviceLog`]; a [`DeviceRecorder`] handle obtained before the
//! device is moved into a pipeline reads the log back. Used by the headless
//! demo and by the crate's tests.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use slotmap::SlotMap;

use super::device::{
    DrawTarget, FullscreenDraw, GeometryId, OutputDevice, ProgramDescriptor, ProgramId,
    RenderTargetDescriptor, RenderTargetId, SceneDraw, SceneOutput, TextureId,
};
use crate::errors::{HoloError, Result};
use crate::renderer::pipeline::shader_manager;
use crate::resources::{Color, CubeTextureData, Geometry};

/// One recorded device call.
#[derive(Debug, Clone, PartialEq)]
pub enum DeviceCommand {
    SetSize {
        width: u32,
        height: u32,
        pixel_ratio: f32,
    },
    SetClearColor(Color),
    CreateTarget {
        label: String,
        width: u32,
        height: u32,
        sample_count: u32,
    },
    ResizeTarget {
        label: String,
        width: u32,
        height: u32,
    },
    ReleaseTarget {
        label: String,
    },
    UploadGeometry {
        vertices: u32,
    },
    CreateCubeTexture {
        size: u32,
        mip_levels: u32,
    },
    CompileProgram {
        label: String,
    },
    BeginFrame,
    DrawScene {
        output: SceneOutput,
        items: usize,
    },
    DrawFullscreen {
        label: String,
        inputs: Vec<RenderTargetId>,
        output: DrawTarget,
    },
    Present,
    PushDebugGroup(String),
    PopDebugGroup,
    ReleaseRenderLists,
    Dispose,
}

#[derive(Debug, Default)]
pub struct DeviceLog {
    commands: Vec<DeviceCommand>,
    targets: SlotMap<RenderTargetId, RenderTargetDescriptor>,
    programs: SlotMap<ProgramId, ProgramDescriptor>,
    textures: SlotMap<TextureId, u32>,
    geometries: SlotMap<GeometryId, u32>,
    target_allocations: usize,
    last_uniforms: FxHashMap<String, Vec<u8>>,
    last_scene_uniforms: Vec<Vec<u8>>,
    disposed: bool,
}

/// Read handle onto a [`HeadlessDevice`]'s log.
#[derive(Debug, Clone)]
pub struct DeviceRecorder(Arc<Mutex<DeviceLog>>);

impl DeviceRecorder {
    #[must_use]
    pub fn commands(&self) -> Vec<DeviceCommand> {
        self.0.lock().commands.clone()
    }

    pub fn clear_commands(&self) {
        self.0.lock().commands.clear();
    }

    /// Descriptors of every render target not yet released.
    #[must_use]
    pub fn live_targets(&self) -> Vec<RenderTargetDescriptor> {
        self.0.lock().targets.values().cloned().collect()
    }

    #[must_use]
    pub fn live_target(&self, label: &str) -> Option<RenderTargetDescriptor> {
        self.0
            .lock()
            .targets
            .values()
            .find(|t| t.label == label)
            .cloned()
    }

    /// Id of the live target labelled `label`.
    #[must_use]
    pub fn target_id(&self, label: &str) -> Option<RenderTargetId> {
        self.0
            .lock()
            .targets
            .iter()
            .find(|(_, t)| t.label == label)
            .map(|(id, _)| id)
    }

    /// Total `create_render_target` calls over the device's life.
    #[must_use]
    pub fn target_allocations(&self) -> usize {
        self.0.lock().target_allocations
    }

    #[must_use]
    pub fn program_labels(&self) -> Vec<String> {
        self.0.lock().programs.values().map(|p| p.label.clone()).collect()
    }

    #[must_use]
    pub fn program_source(&self, label: &str) -> Option<String> {
        self.0
            .lock()
            .programs
            .values()
            .find(|p| p.label == label)
            .map(|p| p.source.clone())
    }

    /// Uniform bytes of the most recent full-screen draw labelled `label`.
    #[must_use]
    pub fn last_uniforms(&self, label: &str) -> Option<Vec<u8>> {
        self.0.lock().last_uniforms.get(label).cloned()
    }

    /// Custom uniform payloads of the most recent scene draw, one per item.
    #[must_use]
    pub fn last_custom_uniforms(&self) -> Vec<Vec<u8>> {
        self.0.lock().last_scene_uniforms.clone()
    }

    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.0.lock().disposed
    }
}

pub struct HeadlessDevice {
    log: Arc<Mutex<DeviceLog>>,
    width: u32,
    height: u32,
    pixel_ratio: f32,
    validate_shaders: bool,
}

impl Default for HeadlessDevice {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessDevice {
    #[must_use]
    pub fn new() -> Self {
        Self {
            log: Arc::new(Mutex::new(DeviceLog::default())),
            width: 1,
            height: 1,
            pixel_ratio: 1.0,
            validate_shaders: false,
        }
    }

    /// Runs every compiled program through the naga validator.
    #[must_use]
    pub fn with_shader_validation(mut self) -> Self {
        self.validate_shaders = true;
        self
    }

    #[must_use]
    pub fn recorder(&self) -> DeviceRecorder {
        DeviceRecorder(Arc::clone(&self.log))
    }

    fn record(&self, command: DeviceCommand) {
        log::trace!("headless: {command:?}");
        self.log.lock().commands.push(command);
    }
}

impl OutputDevice for HeadlessDevice {
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        self.width = width;
        self.height = height;
        self.pixel_ratio = pixel_ratio;
        self.record(DeviceCommand::SetSize {
            width,
            height,
            pixel_ratio,
        });
    }

    fn drawing_size(&self) -> (u32, u32) {
        (
            (self.width as f32 * self.pixel_ratio).round() as u32,
            (self.height as f32 * self.pixel_ratio).round() as u32,
        )
    }

    fn set_clear_color(&mut self, color: Color) {
        self.record(DeviceCommand::SetClearColor(color));
    }

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> Result<RenderTargetId> {
        let id = {
            let mut log = self.log.lock();
            log.target_allocations += 1;
            log.targets.insert(desc.clone())
        };
        self.record(DeviceCommand::CreateTarget {
            label: desc.label.clone(),
            width: desc.width,
            height: desc.height,
            sample_count: desc.sample_count,
        });
        Ok(id)
    }

    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32) -> Result<()> {
        let label = {
            let mut log = self.log.lock();
            let target = log
                .targets
                .get_mut(id)
                .ok_or(HoloError::UnknownResource { kind: "render target" })?;
            target.width = width.max(1);
            target.height = height.max(1);
            target.label.clone()
        };
        self.record(DeviceCommand::ResizeTarget {
            label,
            width,
            height,
        });
        Ok(())
    }

    fn release_render_target(&mut self, id: RenderTargetId) -> Result<()> {
        let desc = self
            .log
            .lock()
            .targets
            .remove(id)
            .ok_or(HoloError::UnknownResource { kind: "render target" })?;
        self.record(DeviceCommand::ReleaseTarget { label: desc.label });
        Ok(())
    }

    fn upload_geometry(&mut self, geometry: &Geometry, existing: Option<GeometryId>) -> Result<GeometryId> {
        let vertices = geometry.vertex_count();
        let id = {
            let mut log = self.log.lock();
            match existing {
                Some(id) => {
                    let slot = log
                        .geometries
                        .get_mut(id)
                        .ok_or(HoloError::UnknownResource { kind: "geometry" })?;
                    *slot = vertices;
                    id
                }
                None => log.geometries.insert(vertices),
            }
        };
        self.record(DeviceCommand::UploadGeometry { vertices });
        Ok(id)
    }

    fn create_cube_texture(&mut self, data: &CubeTextureData) -> Result<TextureId> {
        let id = self.log.lock().textures.insert(data.size);
        self.record(DeviceCommand::CreateCubeTexture {
            size: data.size,
            mip_levels: data.mip_count(),
        });
        Ok(id)
    }

    fn compile_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId> {
        if self.validate_shaders {
            shader_manager::validate_wgsl(&desc.label, &desc.source)?;
        }
        let id = self.log.lock().programs.insert(desc.clone());
        self.record(DeviceCommand::CompileProgram {
            label: desc.label.clone(),
        });
        Ok(id)
    }

    fn begin_frame(&mut self) -> Result<bool> {
        self.record(DeviceCommand::BeginFrame);
        Ok(true)
    }

    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> Result<()> {
        {
            let mut log = self.log.lock();
            for item in draw.items {
                if !log.programs.contains_key(item.program) {
                    return Err(HoloError::UnknownResource { kind: "program" });
                }
                if !log.geometries.contains_key(item.geometry) {
                    return Err(HoloError::UnknownResource { kind: "geometry" });
                }
            }
            log.last_scene_uniforms = draw
                .items
                .iter()
                .map(|item| item.custom_uniforms.clone().unwrap_or_default())
                .collect();
        }
        self.record(DeviceCommand::DrawScene {
            output: draw.output,
            items: draw.items.len(),
        });
        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) -> Result<()> {
        {
            let mut log = self.log.lock();
            if !log.programs.contains_key(draw.program) {
                return Err(HoloError::UnknownResource { kind: "program" });
            }
            if draw.inputs.iter().any(|id| !log.targets.contains_key(*id)) {
                return Err(HoloError::UnknownResource { kind: "render target" });
            }
            log.last_uniforms
                .insert(draw.label.to_string(), draw.uniforms.to_vec());
        }
        self.record(DeviceCommand::DrawFullscreen {
            label: draw.label.to_string(),
            inputs: draw.inputs.to_vec(),
            output: draw.output,
        });
        Ok(())
    }

    fn present(&mut self) {
        self.record(DeviceCommand::Present);
    }

    fn push_debug_group(&mut self, label: &str) {
        self.record(DeviceCommand::PushDebugGroup(label.to_string()));
    }

    fn pop_debug_group(&mut self) {
        self.record(DeviceCommand::PopDebugGroup);
    }

    fn release_render_lists(&mut self) {
        self.record(DeviceCommand::ReleaseRenderLists);
    }

    fn dispose(&mut self) {
        {
            let mut log = self.log.lock();
            log.programs.clear();
            log.geometries.clear();
            log.textures.clear();
            log.disposed = true;
        }
        self.record(DeviceCommand::Dispose);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn drawing_size_applies_pixel_ratio() {
        let mut device = HeadlessDevice::new();
        device.set_size(800, 600, 2.0);
        assert_eq!(device.drawing_size(), (1600, 1200));
    }

    #[test]
    fn released_targets_leave_the_live_set() {
        let mut device = HeadlessDevice::new();
        let recorder = device.recorder();
        let id = device
            .create_render_target(&RenderTargetDescriptor::color("a", 4, 4))
            .unwrap();
        device.resize_render_target(id, 8, 8).unwrap();
        assert_eq!(recorder.live_target("a").unwrap().width, 8);

        device.release_render_target(id).unwrap();
        assert!(recorder.live_targets().is_empty());
        assert_eq!(recorder.target_allocations(), 1);
        assert!(matches!(
            device.release_render_target(id),
            Err(HoloError::UnknownResource { .. })
        ));
    }
}
