//! wgpu Output Device
//!
//! [`WgpuDevice`] owns the device, queue and window surface and implements
//! [`OutputDevice`] on top of them.
//!
//! # Frame flow
//!
//! `begin_frame` acquires the surface texture and opens one command encoder;
//! every `draw_*` call records a render pass into it; `present` submits and
//! presents. Uniform buffers created while drawing are kept in the frame's
//! render list until the next frame (or `release_render_lists`).
//!
//! # Bind group conventions
//!
//! | Program    | Group | Bindings                                            |
//! |------------|-------|-----------------------------------------------------|
//! | Mesh       | 0     | frame uniforms                                      |
//! | Mesh       | 1     | mesh uniforms, env cube, env sampler                |
//! | Mesh       | 2     | hook-injected custom uniforms (when present)        |
//! | Fullscreen | 0     | effect uniforms (when present), sampler, inputs 2.. |

use raw_window_handle::{HasDisplayHandle, HasWindowHandle};
use rustc_hash::FxHashMap;
use slotmap::SlotMap;
use wgpu::util::DeviceExt;

use super::device::{
    DrawTarget, FullscreenDraw, GeometryId, OutputDevice, ProgramDescriptor, ProgramId,
    ProgramKind, RenderTargetDescriptor, RenderTargetId, SceneDraw, SceneOutput, TextureId,
};
use crate::errors::{HoloError, Result};
use crate::renderer::pipeline::shader_manager::ShaderManager;
use crate::resources::{Color, CubeTextureData, Geometry, Vertex};

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Sample count used when a requested count is unsupported.
const FALLBACK_SAMPLES: u32 = 4;

struct GpuTarget {
    desc: RenderTargetDescriptor,
    sample_count: u32,
    texture: wgpu::Texture,
    view: wgpu::TextureView,
    depth_view: Option<wgpu::TextureView>,
}

struct GpuProgram {
    label: String,
    module: wgpu::ShaderModule,
    kind: ProgramKind,
    layout: wgpu::PipelineLayout,
    fullscreen_layout: Option<wgpu::BindGroupLayout>,
}

struct GpuGeometry {
    vertex_buffer: wgpu::Buffer,
    index_buffer: Option<wgpu::Buffer>,
    draw_count: u32,
}

struct GpuCubeTexture {
    _texture: wgpu::Texture,
    view: wgpu::TextureView,
}

struct FrameState {
    surface_texture: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

struct SurfaceAttachments {
    sample_count: u32,
    msaa_view: Option<wgpu::TextureView>,
    depth_view: wgpu::TextureView,
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
struct PipelineKey {
    program: ProgramId,
    format: wgpu::TextureFormat,
    sample_count: u32,
}

pub struct WgpuDevice {
    device: wgpu::Device,
    queue: wgpu::Queue,
    surface: wgpu::Surface<'static>,
    config: wgpu::SurfaceConfiguration,
    surface_view_format: wgpu::TextureFormat,
    supported_samples: Vec<u32>,

    size: (u32, u32),
    pixel_ratio: f32,
    clear_color: Color,

    shader_manager: ShaderManager,
    frame_layout: wgpu::BindGroupLayout,
    mesh_layout: wgpu::BindGroupLayout,
    custom_layout: wgpu::BindGroupLayout,
    linear_sampler: wgpu::Sampler,
    fallback_cube: wgpu::TextureView,

    targets: SlotMap<RenderTargetId, GpuTarget>,
    programs: SlotMap<ProgramId, GpuProgram>,
    geometries: SlotMap<GeometryId, GpuGeometry>,
    textures: SlotMap<TextureId, GpuCubeTexture>,
    pipelines: FxHashMap<PipelineKey, wgpu::RenderPipeline>,

    surface_attachments: Option<SurfaceAttachments>,
    frame: Option<FrameState>,
    render_list: Vec<wgpu::Buffer>,
    disposed: bool,
}

impl WgpuDevice {
    /// Creates a device presenting to `window`.
    ///
    /// `width`/`height` are CSS pixels; the surface is configured at
    /// `size * pixel_ratio`.
    pub fn new<W>(
        window: W,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        pollster::block_on(Self::new_async(
            window,
            width,
            height,
            pixel_ratio,
            power_preference,
        ))
    }

    async fn new_async<W>(
        window: W,
        width: u32,
        height: u32,
        pixel_ratio: f32,
        power_preference: wgpu::PowerPreference,
    ) -> Result<Self>
    where
        W: HasWindowHandle + HasDisplayHandle + Send + Sync + 'static,
    {
        let instance = wgpu::Instance::default();
        let surface = instance.create_surface(window)?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| HoloError::AdapterRequestFailed(e.to_string()))?;

        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("Holo Device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::default(),
                memory_hints: wgpu::MemoryHints::Performance,
                ..Default::default()
            })
            .await?;

        let drawing = scaled(width, height, pixel_ratio);
        let mut config = surface
            .get_default_config(&adapter, drawing.0, drawing.1)
            .ok_or_else(|| {
                HoloError::AdapterRequestFailed("Surface not supported by adapter".to_string())
            })?;
        let surface_view_format = config.format.add_srgb_suffix();
        if surface_view_format != config.format {
            config.view_formats.push(surface_view_format);
        }
        surface.configure(&device, &config);

        let hdr_flags = adapter
            .get_texture_format_features(wgpu::TextureFormat::Rgba16Float)
            .flags;
        let supported_samples = [1, 2, 4, 8]
            .into_iter()
            .filter(|&n| hdr_flags.sample_count_supported(n))
            .collect();

        log::info!(
            "WgpuDevice created: adapter `{}`, surface format {:?}",
            adapter.get_info().name,
            config.format
        );

        let frame_layout = uniform_layout(&device, "Frame Uniforms Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let custom_layout = uniform_layout(&device, "Custom Uniforms Layout", wgpu::ShaderStages::VERTEX_FRAGMENT);
        let mesh_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("Mesh Layout"),
            entries: &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                    ty: wgpu::BindingType::Buffer {
                        ty: wgpu::BufferBindingType::Uniform,
                        has_dynamic_offset: false,
                        min_binding_size: None,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::Cube,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 2,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        });

        let linear_sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("Linear Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            address_mode_w: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            mipmap_filter: wgpu::MipmapFilterMode::Linear,
            ..Default::default()
        });

        let fallback_cube = create_cube(
            &device,
            &queue,
            &CubeTextureData {
                size: 1,
                mips: vec![std::array::from_fn(|_| vec![0, 0, 0, 255])],
            },
        )
        .view;

        Ok(Self {
            device,
            queue,
            surface,
            config,
            surface_view_format,
            supported_samples,
            size: (width, height),
            pixel_ratio,
            clear_color: Color::BLACK,
            shader_manager: ShaderManager::new(),
            frame_layout,
            mesh_layout,
            custom_layout,
            linear_sampler,
            fallback_cube,
            targets: SlotMap::with_key(),
            programs: SlotMap::with_key(),
            geometries: SlotMap::with_key(),
            textures: SlotMap::with_key(),
            pipelines: FxHashMap::default(),
            surface_attachments: None,
            frame: None,
            render_list: Vec::new(),
            disposed: false,
        })
    }

    fn effective_samples(&self, requested: u32) -> u32 {
        if self.supported_samples.contains(&requested) {
            return requested;
        }
        let fallback = if self.supported_samples.contains(&FALLBACK_SAMPLES) {
            FALLBACK_SAMPLES
        } else {
            1
        };
        log::warn!("{requested}x MSAA is not supported; falling back to {fallback}x");
        fallback
    }

    fn allocate_target(&self, desc: &RenderTargetDescriptor) -> GpuTarget {
        let sample_count = self.effective_samples(desc.sample_count);
        let mip_level_count = if desc.mipmaps && sample_count == 1 {
            desc.width.max(desc.height).max(1).ilog2() + 1
        } else {
            1
        };

        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC;
        if sample_count == 1 {
            usage |= wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST;
        }

        let texture = self.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(&desc.label),
            size: wgpu::Extent3d {
                width: desc.width.max(1),
                height: desc.height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: desc.format.to_wgpu(),
            usage,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor {
            mip_level_count: Some(1),
            ..Default::default()
        });

        let depth_view = desc.depth.then(|| {
            create_depth_view(&self.device, desc.width, desc.height, sample_count)
        });

        GpuTarget {
            desc: desc.clone(),
            sample_count,
            texture,
            view,
            depth_view,
        }
    }

    /// (Re)creates the direct-mode MSAA and depth attachments; returns the sample count.
    fn ensure_surface_attachments(&mut self) -> u32 {
        let (width, height) = (self.config.width, self.config.height);
        let sample_count = self.effective_samples(FALLBACK_SAMPLES);

        let stale = self
            .surface_attachments
            .as_ref()
            .is_none_or(|a| a.sample_count != sample_count);
        if stale {
            let msaa_view = (sample_count > 1).then(|| {
                self.device
                    .create_texture(&wgpu::TextureDescriptor {
                        label: Some("Surface MSAA"),
                        size: wgpu::Extent3d {
                            width,
                            height,
                            depth_or_array_layers: 1,
                        },
                        mip_level_count: 1,
                        sample_count,
                        dimension: wgpu::TextureDimension::D2,
                        format: self.surface_view_format,
                        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
                        view_formats: &[],
                    })
                    .create_view(&wgpu::TextureViewDescriptor::default())
            });
            self.surface_attachments = Some(SurfaceAttachments {
                sample_count,
                msaa_view,
                depth_view: create_depth_view(&self.device, width, height, sample_count),
            });
        }
        sample_count
    }

    fn pipeline(&mut self, key: PipelineKey, depth: bool) -> Result<&wgpu::RenderPipeline> {
        if !self.pipelines.contains_key(&key) {
            let program = self
                .programs
                .get(key.program)
                .ok_or(HoloError::UnknownResource { kind: "program" })?;

            let vertex_buffers = [wgpu::VertexBufferLayout {
                array_stride: Vertex::STRIDE,
                step_mode: wgpu::VertexStepMode::Vertex,
                attributes: &wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32x2],
            }];
            let is_mesh = matches!(program.kind, ProgramKind::Mesh { .. });
            let buffers: &[wgpu::VertexBufferLayout] = if is_mesh { &vertex_buffers } else { &[] };

            let pipeline = self.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
                label: Some(&program.label),
                layout: Some(&program.layout),
                vertex: wgpu::VertexState {
                    module: &program.module,
                    entry_point: Some("vs_main"),
                    buffers,
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                },
                fragment: Some(wgpu::FragmentState {
                    module: &program.module,
                    entry_point: Some("fs_main"),
                    targets: &[Some(wgpu::ColorTargetState {
                        format: key.format,
                        blend: Some(wgpu::BlendState::REPLACE),
                        write_mask: wgpu::ColorWrites::ALL,
                    })],
                    compilation_options: wgpu::PipelineCompilationOptions::default(),
                }),
                primitive: wgpu::PrimitiveState {
                    topology: wgpu::PrimitiveTopology::TriangleList,
                    front_face: wgpu::FrontFace::Ccw,
                    cull_mode: is_mesh.then_some(wgpu::Face::Back),
                    ..Default::default()
                },
                depth_stencil: depth.then(|| wgpu::DepthStencilState {
                    format: DEPTH_FORMAT,
                    depth_write_enabled: Some(true),
                    depth_compare: Some(wgpu::CompareFunction::LessEqual),
                    stencil: wgpu::StencilState::default(),
                    bias: wgpu::DepthBiasState::default(),
                }),
                multisample: wgpu::MultisampleState {
                    count: key.sample_count,
                    mask: !0,
                    alpha_to_coverage_enabled: false,
                },
                multiview_mask: None,
                cache: None,
            });
            self.pipelines.insert(key, pipeline);
        }
        Ok(&self.pipelines[&key])
    }

    fn uniform_buffer(&mut self, label: &str, bytes: &[u8]) -> wgpu::Buffer {
        let buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some(label),
            contents: bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });
        self.render_list.push(buffer.clone());
        buffer
    }

    fn reconfigure_surface(&mut self) {
        let (width, height) = scaled(self.size.0, self.size.1, self.pixel_ratio);
        if width > 0 && height > 0 {
            self.config.width = width;
            self.config.height = height;
            self.surface.configure(&self.device, &self.config);
            self.surface_attachments = None;
        }
    }
}

impl OutputDevice for WgpuDevice {
    fn set_size(&mut self, width: u32, height: u32, pixel_ratio: f32) {
        self.size = (width, height);
        self.pixel_ratio = pixel_ratio;
        self.reconfigure_surface();
        log::debug!(
            "Surface resized to {}x{} (ratio {pixel_ratio})",
            self.config.width,
            self.config.height
        );
    }

    fn drawing_size(&self) -> (u32, u32) {
        scaled(self.size.0, self.size.1, self.pixel_ratio)
    }

    fn set_clear_color(&mut self, color: Color) {
        self.clear_color = color;
    }

    fn create_render_target(&mut self, desc: &RenderTargetDescriptor) -> Result<RenderTargetId> {
        let target = self.allocate_target(desc);
        Ok(self.targets.insert(target))
    }

    fn resize_render_target(&mut self, id: RenderTargetId, width: u32, height: u32) -> Result<()> {
        let mut desc = self
            .targets
            .get(id)
            .ok_or(HoloError::UnknownResource { kind: "render target" })?
            .desc
            .clone();
        if desc.width == width && desc.height == height {
            return Ok(());
        }
        desc.width = width;
        desc.height = height;
        let target = self.allocate_target(&desc);
        self.targets[id] = target;
        Ok(())
    }

    fn release_render_target(&mut self, id: RenderTargetId) -> Result<()> {
        let target = self
            .targets
            .remove(id)
            .ok_or(HoloError::UnknownResource { kind: "render target" })?;
        target.texture.destroy();
        Ok(())
    }

    fn upload_geometry(&mut self, geometry: &Geometry, existing: Option<GeometryId>) -> Result<GeometryId> {
        let vertices = geometry.vertices();
        let vertex_buffer = self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Vertex Buffer"),
            contents: bytemuck::cast_slice(&vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = geometry.indices().map(|indices| {
            self.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some("Index Buffer"),
                contents: bytemuck::cast_slice(indices),
                usage: wgpu::BufferUsages::INDEX,
            })
        });
        let gpu = GpuGeometry {
            vertex_buffer,
            index_buffer,
            draw_count: geometry.draw_count(),
        };

        match existing {
            Some(id) => {
                let slot = self
                    .geometries
                    .get_mut(id)
                    .ok_or(HoloError::UnknownResource { kind: "geometry" })?;
                *slot = gpu;
                Ok(id)
            }
            None => Ok(self.geometries.insert(gpu)),
        }
    }

    fn create_cube_texture(&mut self, data: &CubeTextureData) -> Result<TextureId> {
        let cube = create_cube(&self.device, &self.queue, data);
        Ok(self.textures.insert(cube))
    }

    fn compile_program(&mut self, desc: &ProgramDescriptor) -> Result<ProgramId> {
        let (module, _hash) = self
            .shader_manager
            .get_or_compile(&self.device, &desc.label, &desc.source)?;
        let module = module.clone();

        let (layout, fullscreen_layout) = match desc.kind {
            ProgramKind::Mesh {
                custom_uniform_size,
            } => {
                let mut groups = vec![Some(&self.frame_layout), Some(&self.mesh_layout)];
                if custom_uniform_size > 0 {
                    groups.push(Some(&self.custom_layout));
                }
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&desc.label),
                    bind_group_layouts: &groups,
                    immediate_size: 0,
                });
                (layout, None)
            }
            ProgramKind::Fullscreen {
                inputs,
                uniform_size,
            } => {
                let group = fullscreen_layout(&self.device, &desc.label, inputs, uniform_size > 0);
                let layout = self.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
                    label: Some(&desc.label),
                    bind_group_layouts: &[Some(&group)],
                    immediate_size: 0,
                });
                (layout, Some(group))
            }
        };

        log::debug!("Compiled program `{}`", desc.label);
        Ok(self.programs.insert(GpuProgram {
            label: desc.label.clone(),
            module,
            kind: desc.kind,
            layout,
            fullscreen_layout,
        }))
    }

    fn begin_frame(&mut self) -> Result<bool> {
        self.render_list.clear();

        let output = match self.surface.get_current_texture() {
            wgpu::CurrentSurfaceTexture::Success(output)
            | wgpu::CurrentSurfaceTexture::Suboptimal(output) => output,
            wgpu::CurrentSurfaceTexture::Lost | wgpu::CurrentSurfaceTexture::Outdated => {
                self.reconfigure_surface();
                return Ok(false);
            }
            e => {
                log::error!("Render error: {e:?}");
                return Ok(false);
            }
        };

        let view = output.texture.create_view(&wgpu::TextureViewDescriptor {
            format: Some(self.surface_view_format),
            ..Default::default()
        });
        let encoder = self
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Frame Encoder"),
            });

        self.frame = Some(FrameState {
            surface_texture: output,
            view,
            encoder,
        });
        Ok(true)
    }

    fn draw_scene(&mut self, draw: &SceneDraw<'_>) -> Result<()> {
        if self.frame.is_none() {
            return Ok(());
        }

        // Resolve attachments and the pipeline key for this output.
        let (format, sample_count) = match draw.output {
            SceneOutput::Target { target, .. } => {
                let t = self
                    .targets
                    .get(target)
                    .ok_or(HoloError::UnknownResource { kind: "render target" })?;
                (t.desc.format.to_wgpu(), t.sample_count)
            }
            SceneOutput::Surface => {
                let samples = self.ensure_surface_attachments();
                (self.surface_view_format, samples)
            }
        };

        let frame_buffer = self.uniform_buffer("Frame Uniforms", draw.frame_uniforms);
        let frame_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Frame Bind Group"),
            layout: &self.frame_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: frame_buffer.as_entire_binding(),
            }],
        });

        let mut prepared = Vec::with_capacity(draw.items.len());
        for item in draw.items {
            let key = PipelineKey {
                program: item.program,
                format,
                sample_count,
            };
            let pipeline = self.pipeline(key, true)?.clone();

            let mesh_buffer = self.uniform_buffer("Mesh Uniforms", &item.object_uniforms);
            let env_view = match item.env_map {
                Some(id) => &self
                    .textures
                    .get(id)
                    .ok_or(HoloError::UnknownResource { kind: "texture" })?
                    .view,
                None => &self.fallback_cube,
            };
            let mesh_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some("Mesh Bind Group"),
                layout: &self.mesh_layout,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: mesh_buffer.as_entire_binding(),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::TextureView(env_view),
                    },
                    wgpu::BindGroupEntry {
                        binding: 2,
                        resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
                    },
                ],
            });

            let custom_group = match &item.custom_uniforms {
                Some(bytes) if !bytes.is_empty() => {
                    let buffer = self.uniform_buffer("Custom Uniforms", bytes);
                    Some(self.device.create_bind_group(&wgpu::BindGroupDescriptor {
                        label: Some("Custom Bind Group"),
                        layout: &self.custom_layout,
                        entries: &[wgpu::BindGroupEntry {
                            binding: 0,
                            resource: buffer.as_entire_binding(),
                        }],
                    }))
                }
                _ => None,
            };

            prepared.push((pipeline, mesh_group, custom_group, item.geometry));
        }

        let (color_view, resolve_view, depth_view, copy_into) = match draw.output {
            SceneOutput::Target { target, resolve } => {
                let t = &self.targets[target];
                let resolve_target = resolve
                    .map(|id| {
                        self.targets
                            .get(id)
                            .ok_or(HoloError::UnknownResource { kind: "render target" })
                    })
                    .transpose()?;
                let depth = t
                    .depth_view
                    .clone()
                    .ok_or_else(|| HoloError::InvalidConfiguration(format!(
                        "scene target `{}` has no depth buffer",
                        t.desc.label
                    )))?;
                if t.sample_count > 1 {
                    (t.view.clone(), resolve_target.map(|r| r.view.clone()), depth, None)
                } else {
                    // Single-sampled fallback: copy instead of resolving.
                    (t.view.clone(), None, depth, resolve_target.map(|r| r.texture.clone()))
                }
            }
            SceneOutput::Surface => {
                let surface_view = self
                    .frame
                    .as_ref()
                    .map(|f| f.view.clone())
                    .ok_or(HoloError::UnknownResource { kind: "surface frame" })?;
                let attachments = self
                    .surface_attachments
                    .as_ref()
                    .ok_or(HoloError::UnknownResource { kind: "surface attachment" })?;
                match &attachments.msaa_view {
                    Some(msaa) => (
                        msaa.clone(),
                        Some(surface_view),
                        attachments.depth_view.clone(),
                        None,
                    ),
                    None => (surface_view, None, attachments.depth_view.clone(), None),
                }
            }
        };
        let source_texture = match draw.output {
            SceneOutput::Target { target, .. } => Some(self.targets[target].texture.clone()),
            SceneOutput::Surface => None,
        };

        let clear: wgpu::Color = draw.clear_color.into();
        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        {
            let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("Scene Pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &color_view,
                    resolve_target: resolve_view.as_ref(),
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(clear),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Discard,
                    }),
                    stencil_ops: None,
                }),
                ..Default::default()
            });

            pass.set_bind_group(0, &frame_group, &[]);
            for (pipeline, mesh_group, custom_group, geometry_id) in &prepared {
                let Some(geometry) = self.geometries.get(*geometry_id) else {
                    continue;
                };
                pass.set_pipeline(pipeline);
                pass.set_bind_group(1, mesh_group, &[]);
                if let Some(custom) = custom_group {
                    pass.set_bind_group(2, custom, &[]);
                }
                pass.set_vertex_buffer(0, geometry.vertex_buffer.slice(..));
                match &geometry.index_buffer {
                    Some(indices) => {
                        pass.set_index_buffer(indices.slice(..), wgpu::IndexFormat::Uint32);
                        pass.draw_indexed(0..geometry.draw_count, 0, 0..1);
                    }
                    None => pass.draw(0..geometry.draw_count, 0..1),
                }
            }
        }

        if let (Some(src), Some(dst)) = (source_texture, copy_into) {
            frame.encoder.copy_texture_to_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &src,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                wgpu::TexelCopyTextureInfo {
                    texture: &dst,
                    mip_level: 0,
                    origin: wgpu::Origin3d::ZERO,
                    aspect: wgpu::TextureAspect::All,
                },
                src.size(),
            );
        }

        Ok(())
    }

    fn draw_fullscreen(&mut self, draw: &FullscreenDraw<'_>) -> Result<()> {
        if self.frame.is_none() {
            return Ok(());
        }

        let format = match draw.output {
            DrawTarget::Target(id) => self
                .targets
                .get(id)
                .ok_or(HoloError::UnknownResource { kind: "render target" })?
                .desc
                .format
                .to_wgpu(),
            DrawTarget::Surface => self.surface_view_format,
        };
        let key = PipelineKey {
            program: draw.program,
            format,
            sample_count: 1,
        };
        let pipeline = self.pipeline(key, false)?.clone();

        let uniform_buffer = (!draw.uniforms.is_empty())
            .then(|| self.uniform_buffer(draw.label, draw.uniforms));

        let layout = self
            .programs
            .get(draw.program)
            .and_then(|p| p.fullscreen_layout.clone())
            .ok_or(HoloError::UnknownResource { kind: "program" })?;

        let mut input_views = Vec::with_capacity(draw.inputs.len());
        for id in draw.inputs {
            let target = self
                .targets
                .get(*id)
                .ok_or(HoloError::UnknownResource { kind: "render target" })?;
            input_views.push(target.view.clone());
        }

        let mut entries = Vec::with_capacity(draw.inputs.len() + 2);
        if let Some(buffer) = &uniform_buffer {
            entries.push(wgpu::BindGroupEntry {
                binding: 0,
                resource: buffer.as_entire_binding(),
            });
        }
        entries.push(wgpu::BindGroupEntry {
            binding: 1,
            resource: wgpu::BindingResource::Sampler(&self.linear_sampler),
        });
        for (i, view) in input_views.iter().enumerate() {
            entries.push(wgpu::BindGroupEntry {
                binding: i as u32 + 2,
                resource: wgpu::BindingResource::TextureView(view),
            });
        }
        let bind_group = self.device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(draw.label),
            layout: &layout,
            entries: &entries,
        });

        let output_view = match draw.output {
            DrawTarget::Target(id) => self.targets[id].view.clone(),
            DrawTarget::Surface => match &self.frame {
                Some(frame) => frame.view.clone(),
                None => return Ok(()),
            },
        };

        let Some(frame) = self.frame.as_mut() else {
            return Ok(());
        };
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some(draw.label),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &output_view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::DontCare(wgpu::LoadOpDontCare::default()),
                    store: wgpu::StoreOp::Store,
                },
                depth_slice: None,
            })],
            ..Default::default()
        });
        pass.set_pipeline(&pipeline);
        pass.set_bind_group(0, &bind_group, &[]);
        pass.draw(0..3, 0..1);

        Ok(())
    }

    fn present(&mut self) {
        if let Some(frame) = self.frame.take() {
            self.queue.submit(std::iter::once(frame.encoder.finish()));
            frame.surface_texture.present();
        }
    }

    fn push_debug_group(&mut self, label: &str) {
        if let Some(frame) = self.frame.as_mut() {
            frame.encoder.push_debug_group(label);
        }
    }

    fn pop_debug_group(&mut self) {
        if let Some(frame) = self.frame.as_mut() {
            frame.encoder.pop_debug_group();
        }
    }

    fn release_render_lists(&mut self) {
        self.render_list.clear();
    }

    fn dispose(&mut self) {
        if self.disposed {
            return;
        }
        self.frame = None;
        self.pipelines.clear();
        self.programs.clear();
        self.geometries.clear();
        self.textures.clear();
        self.shader_manager.clear();
        self.surface_attachments = None;
        self.disposed = true;
        log::info!("WgpuDevice disposed");
    }
}

fn scaled(width: u32, height: u32, pixel_ratio: f32) -> (u32, u32) {
    (
        ((width as f32 * pixel_ratio).round() as u32).max(1),
        ((height as f32 * pixel_ratio).round() as u32).max(1),
    )
}

fn uniform_layout(
    device: &wgpu::Device,
    label: &str,
    visibility: wgpu::ShaderStages,
) -> wgpu::BindGroupLayout {
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &[wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        }],
    })
}

fn fullscreen_layout(
    device: &wgpu::Device,
    label: &str,
    inputs: u32,
    has_uniforms: bool,
) -> wgpu::BindGroupLayout {
    let mut entries = Vec::with_capacity(inputs as usize + 2);
    if has_uniforms {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: 0,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Buffer {
                ty: wgpu::BufferBindingType::Uniform,
                has_dynamic_offset: false,
                min_binding_size: None,
            },
            count: None,
        });
    }
    entries.push(wgpu::BindGroupLayoutEntry {
        binding: 1,
        visibility: wgpu::ShaderStages::FRAGMENT,
        ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
        count: None,
    });
    for i in 0..inputs {
        entries.push(wgpu::BindGroupLayoutEntry {
            binding: i + 2,
            visibility: wgpu::ShaderStages::FRAGMENT,
            ty: wgpu::BindingType::Texture {
                sample_type: wgpu::TextureSampleType::Float { filterable: true },
                view_dimension: wgpu::TextureViewDimension::D2,
                multisampled: false,
            },
            count: None,
        });
    }
    device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
        label: Some(label),
        entries: &entries,
    })
}

fn create_depth_view(
    device: &wgpu::Device,
    width: u32,
    height: u32,
    sample_count: u32,
) -> wgpu::TextureView {
    device
        .create_texture(&wgpu::TextureDescriptor {
            label: Some("Depth Texture"),
            size: wgpu::Extent3d {
                width: width.max(1),
                height: height.max(1),
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        })
        .create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_cube(device: &wgpu::Device, queue: &wgpu::Queue, data: &CubeTextureData) -> GpuCubeTexture {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Environment Cube"),
        size: wgpu::Extent3d {
            width: data.size,
            height: data.size,
            depth_or_array_layers: 6,
        },
        mip_level_count: data.mip_count(),
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: wgpu::TextureFormat::Rgba8UnormSrgb,
        usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
        view_formats: &[],
    });

    for (level, faces) in data.mips.iter().enumerate() {
        let level_size = (data.size >> level).max(1);
        for (face, pixels) in faces.iter().enumerate() {
            queue.write_texture(
                wgpu::TexelCopyTextureInfo {
                    texture: &texture,
                    mip_level: level as u32,
                    origin: wgpu::Origin3d {
                        x: 0,
                        y: 0,
                        z: face as u32,
                    },
                    aspect: wgpu::TextureAspect::All,
                },
                pixels,
                wgpu::TexelCopyBufferLayout {
                    offset: 0,
                    bytes_per_row: Some(4 * level_size),
                    rows_per_image: Some(level_size),
                },
                wgpu::Extent3d {
                    width: level_size,
                    height: level_size,
                    depth_or_array_layers: 1,
                },
            );
        }
    }

    let view = texture.create_view(&wgpu::TextureViewDescriptor {
        label: Some("Environment Cube View"),
        dimension: Some(wgpu::TextureViewDimension::Cube),
        ..Default::default()
    });

    GpuCubeTexture {
        _texture: texture,
        view,
    }
}
