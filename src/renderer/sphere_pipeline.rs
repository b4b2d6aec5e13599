//! Instanced sphere WebGPU pipeline
//!
//! One indexed unit-sphere mesh, one instance buffer (grown on demand) and a
//! single uniform block for camera, light and material.

use bytemuck::{Pod, Zeroable};
use glam::Vec3;
use wgpu::util::DeviceExt;

use super::camera::View;
use super::instances::{AccentLight, InstanceTarget, SphereInstance};
use super::shapes::uv_sphere;
use super::vertex::Vertex;
use crate::error::BallpitError;
use crate::settings::MaterialParams;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

// ============================================================================
// GPU DATA STRUCTURES (must match shader)
// ============================================================================

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
struct Globals {
    view_proj: [[f32; 4]; 4], // offset 0
    camera_pos: [f32; 4],     // offset 64
    light_pos: [f32; 4],      // offset 80, w = intensity
    light_color: [f32; 4],    // offset 96
    ambient: [f32; 4],        // offset 112, rgb pre-scaled by intensity
    material: [f32; 4],       // offset 128
}

impl Globals {
    fn new(view: &View, light: &AccentLight, ambient: Vec3, material: &MaterialParams) -> Self {
        Self {
            view_proj: view.camera.view_projection().to_cols_array_2d(),
            camera_pos: view.camera.position.extend(1.0).to_array(),
            light_pos: light.position.extend(light.intensity).to_array(),
            light_color: light.color.extend(1.0).to_array(),
            ambient: ambient.extend(1.0).to_array(),
            material: [
                material.metalness,
                material.roughness,
                material.clearcoat,
                material.clearcoat_roughness,
            ],
        }
    }
}

/// Look of the spheres, fixed at construction
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SphereStyle {
    pub material: MaterialParams,
    /// Ambient colour (linear) times intensity
    pub ambient: Vec3,
    /// Mesh tessellation (width, height segments)
    pub segments: (u32, u32),
}

impl Default for SphereStyle {
    fn default() -> Self {
        Self {
            material: MaterialParams::default(),
            ambient: Vec3::ONE,
            segments: (32, 32),
        }
    }
}

/// What to do after the surface refused a frame
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Recovery {
    /// Surface went stale; configure it again and retry next frame
    Reconfigure,
    /// Device is out of memory
    Fatal,
    /// Transient; drop this frame
    Skip,
}

fn recovery_for(err: &wgpu::SurfaceError) -> Recovery {
    match err {
        wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated => Recovery::Reconfigure,
        wgpu::SurfaceError::OutOfMemory => Recovery::Fatal,
        _ => Recovery::Skip,
    }
}

// ============================================================================
// SPHERE RENDER STATE
// ============================================================================

/// Every handle tied to the canvas context; dropped as a unit on release
struct Gpu {
    surface: wgpu::Surface<'static>,
    device: wgpu::Device,
    queue: wgpu::Queue,
    config: wgpu::SurfaceConfiguration,
    pipeline: wgpu::RenderPipeline,

    globals_buffer: wgpu::Buffer,
    bind_group: wgpu::BindGroup,

    vertex_buffer: wgpu::Buffer,
    index_buffer: wgpu::Buffer,
    index_count: u32,

    instance_buffer: wgpu::Buffer,
    instance_capacity: usize,

    depth_texture: wgpu::Texture,
    depth_view: wgpu::TextureView,
}

impl Gpu {
    fn resize_backing(&mut self, new_width: u32, new_height: u32) {
        if new_width > 0 && new_height > 0 {
            self.config.width = new_width;
            self.config.height = new_height;
            self.surface.configure(&self.device, &self.config);
            self.depth_texture.destroy();
            let (texture, view) = SphereRenderState::create_depth(&self.device, new_width, new_height);
            self.depth_texture = texture;
            self.depth_view = view;
        }
    }

    /// Free GPU memory now instead of waiting for the last handle to drop
    fn destroy(self) {
        self.instance_buffer.destroy();
        self.vertex_buffer.destroy();
        self.index_buffer.destroy();
        self.globals_buffer.destroy();
        self.depth_texture.destroy();
        self.device.destroy();
    }
}

pub struct SphereRenderState {
    gpu: Option<Gpu>,
    instance_count: u32,
    style: SphereStyle,
    light: AccentLight,
}

impl SphereRenderState {
    pub async fn new(
        surface: wgpu::Surface<'static>,
        adapter: &wgpu::Adapter,
        width: u32,
        height: u32,
        style: SphereStyle,
    ) -> Result<Self, BallpitError> {
        let (device, queue) = adapter
            .request_device(&wgpu::DeviceDescriptor {
                label: Some("ballpit-device"),
                required_features: wgpu::Features::empty(),
                required_limits: wgpu::Limits::downlevel_webgl2_defaults(),
                memory_hints: Default::default(),
                trace: Default::default(),
                experimental_features: Default::default(),
            })
            .await
            .map_err(|e| BallpitError::Device(e.to_string()))?;

        let surface_caps = surface.get_capabilities(adapter);
        log::debug!("Surface formats: {:?}", surface_caps.formats);
        log::debug!("Surface alpha modes: {:?}", surface_caps.alpha_modes);

        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first())
            .copied()
            .ok_or_else(|| BallpitError::Surface("surface reports no formats".into()))?;

        // The canvas composites over the page
        let alpha_mode = if surface_caps.alpha_modes.contains(&wgpu::CompositeAlphaMode::PreMultiplied) {
            wgpu::CompositeAlphaMode::PreMultiplied
        } else {
            surface_caps
                .alpha_modes
                .first()
                .copied()
                .unwrap_or(wgpu::CompositeAlphaMode::Auto)
        };

        let config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: width.max(1),
            height: height.max(1),
            present_mode: wgpu::PresentMode::AutoVsync,
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        log::info!(
            "Surface config: {}x{} {:?}, alpha: {:?}",
            config.width,
            config.height,
            surface_format,
            alpha_mode
        );
        surface.configure(&device, &config);

        let shader = device.create_shader_module(wgpu::ShaderModuleDescriptor {
            label: Some("sphere_shader"),
            source: wgpu::ShaderSource::Wgsl(include_str!("sphere_shader.wgsl").into()),
        });

        let light = AccentLight {
            position: Vec3::ZERO,
            color: Vec3::ONE,
            intensity: 0.0,
        };
        let globals_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("globals"),
            contents: bytemuck::bytes_of(&Globals::new(&View::default(), &light, style.ambient, &style.material)),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });

        let mesh = uv_sphere(style.segments.0, style.segments.1);
        let vertex_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_vertices"),
            contents: bytemuck::cast_slice(&mesh.vertices),
            usage: wgpu::BufferUsages::VERTEX,
        });
        let index_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("sphere_indices"),
            contents: bytemuck::cast_slice(&mesh.indices),
            usage: wgpu::BufferUsages::INDEX,
        });

        let instance_capacity = 64;
        let instance_buffer = Self::create_instance_buffer(&device, instance_capacity);

        let bind_group_layout = device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
            label: Some("sphere_bind_group_layout"),
            entries: &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX_FRAGMENT,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        });

        let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("sphere_bind_group"),
            layout: &bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: globals_buffer.as_entire_binding(),
            }],
        });

        let pipeline_layout = device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
            label: Some("sphere_pipeline_layout"),
            bind_group_layouts: &[&bind_group_layout],
            immediate_size: 0,
        });

        let pipeline = device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
            label: Some("sphere_pipeline"),
            layout: Some(&pipeline_layout),
            vertex: wgpu::VertexState {
                module: &shader,
                entry_point: Some("vs_main"),
                buffers: &[Vertex::desc(), SphereInstance::desc()],
                compilation_options: Default::default(),
            },
            fragment: Some(wgpu::FragmentState {
                module: &shader,
                entry_point: Some("fs_main"),
                targets: &[Some(wgpu::ColorTargetState {
                    format: config.format,
                    blend: Some(wgpu::BlendState::PREMULTIPLIED_ALPHA_BLENDING),
                    write_mask: wgpu::ColorWrites::ALL,
                })],
                compilation_options: Default::default(),
            }),
            primitive: wgpu::PrimitiveState {
                topology: wgpu::PrimitiveTopology::TriangleList,
                front_face: wgpu::FrontFace::Ccw,
                cull_mode: Some(wgpu::Face::Back),
                ..Default::default()
            },
            depth_stencil: Some(wgpu::DepthStencilState {
                format: DEPTH_FORMAT,
                depth_write_enabled: true,
                depth_compare: wgpu::CompareFunction::Less,
                stencil: wgpu::StencilState::default(),
                bias: wgpu::DepthBiasState::default(),
            }),
            multisample: wgpu::MultisampleState::default(),
            multiview_mask: None,
            cache: None,
        });

        let (depth_texture, depth_view) = Self::create_depth(&device, config.width, config.height);

        Ok(Self {
            gpu: Some(Gpu {
                surface,
                device,
                queue,
                config,
                pipeline,
                globals_buffer,
                bind_group,
                vertex_buffer,
                index_buffer,
                index_count: mesh.indices.len() as u32,
                instance_buffer,
                instance_capacity,
                depth_texture,
                depth_view,
            }),
            instance_count: 0,
            style,
            light,
        })
    }

    /// Create the GPU context for a canvas (WebGPU, falling back to WebGL2)
    #[cfg(target_arch = "wasm32")]
    pub async fn from_canvas(
        canvas: web_sys::HtmlCanvasElement,
        width: u32,
        height: u32,
        style: SphereStyle,
    ) -> Result<Self, BallpitError> {
        let instance = wgpu::Instance::new(&wgpu::InstanceDescriptor {
            backends: wgpu::Backends::BROWSER_WEBGPU | wgpu::Backends::GL,
            ..Default::default()
        });

        let surface = instance
            .create_surface(wgpu::SurfaceTarget::Canvas(canvas))
            .map_err(|e| BallpitError::Surface(e.to_string()))?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .map_err(|e| BallpitError::Adapter(e.to_string()))?;

        log::info!("Using adapter: {:?} ({:?})", adapter.get_info().name, adapter.get_info().backend);

        Self::new(surface, &adapter, width, height, style).await
    }

    fn create_instance_buffer(device: &wgpu::Device, capacity: usize) -> wgpu::Buffer {
        device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("sphere_instances"),
            size: (std::mem::size_of::<SphereInstance>() * capacity) as u64,
            usage: wgpu::BufferUsages::VERTEX | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        })
    }

    fn create_depth(device: &wgpu::Device, width: u32, height: u32) -> (wgpu::Texture, wgpu::TextureView) {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("depth"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: DEPTH_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        (texture, view)
    }

    /// Backing size in device pixels; `(0, 0)` once released
    pub fn size(&self) -> (u32, u32) {
        self.gpu
            .as_ref()
            .map_or((0, 0), |gpu| (gpu.config.width, gpu.config.height))
    }

    pub fn is_released(&self) -> bool {
        self.gpu.is_none()
    }

    pub fn resize_backing(&mut self, new_width: u32, new_height: u32) {
        if let Some(gpu) = self.gpu.as_mut() {
            gpu.resize_backing(new_width, new_height);
        }
    }

    /// Update the uniform block and draw every instance
    pub fn render_frame(&mut self, view: &View) -> Result<(), wgpu::SurfaceError> {
        let Some(gpu) = self.gpu.as_ref() else {
            return Ok(());
        };
        let globals = Globals::new(view, &self.light, self.style.ambient, &self.style.material);
        gpu.queue
            .write_buffer(&gpu.globals_buffer, 0, bytemuck::bytes_of(&globals));

        let output = gpu.surface.get_current_texture()?;
        let target = output
            .texture
            .create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = gpu
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("sphere_encoder"),
            });

        {
            let mut render_pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
                label: Some("sphere_render_pass"),
                color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                    view: &target,
                    resolve_target: None,
                    ops: wgpu::Operations {
                        load: wgpu::LoadOp::Clear(wgpu::Color::TRANSPARENT),
                        store: wgpu::StoreOp::Store,
                    },
                    depth_slice: None,
                })],
                depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                    view: &gpu.depth_view,
                    depth_ops: Some(wgpu::Operations {
                        load: wgpu::LoadOp::Clear(1.0),
                        store: wgpu::StoreOp::Store,
                    }),
                    stencil_ops: None,
                }),
                timestamp_writes: None,
                occlusion_query_set: None,
                multiview_mask: None,
            });

            if self.instance_count > 0 {
                render_pass.set_pipeline(&gpu.pipeline);
                render_pass.set_bind_group(0, &gpu.bind_group, &[]);
                render_pass.set_vertex_buffer(0, gpu.vertex_buffer.slice(..));
                render_pass.set_vertex_buffer(1, gpu.instance_buffer.slice(..));
                render_pass.set_index_buffer(gpu.index_buffer.slice(..), wgpu::IndexFormat::Uint16);
                render_pass.draw_indexed(0..gpu.index_count, 0, 0..self.instance_count);
            }
        }

        gpu.queue.submit(std::iter::once(encoder.finish()));
        output.present();

        Ok(())
    }
}

impl InstanceTarget for SphereRenderState {
    fn upload(&mut self, instances: &[SphereInstance]) {
        let Some(gpu) = self.gpu.as_mut() else {
            return;
        };
        if instances.len() > gpu.instance_capacity {
            gpu.instance_capacity = instances.len().next_power_of_two();
            gpu.instance_buffer.destroy();
            gpu.instance_buffer = Self::create_instance_buffer(&gpu.device, gpu.instance_capacity);
            log::debug!("instance buffer grown to {}", gpu.instance_capacity);
        }
        gpu.queue
            .write_buffer(&gpu.instance_buffer, 0, bytemuck::cast_slice(instances));
        self.instance_count = instances.len() as u32;
    }

    fn set_accent_light(&mut self, light: &AccentLight) {
        self.light = *light;
    }

    fn render(&mut self, view: &View) {
        let Err(e) = self.render_frame(view) else {
            return;
        };
        match recovery_for(&e) {
            Recovery::Reconfigure => {
                let (w, h) = self.size();
                self.resize_backing(w, h);
            }
            Recovery::Fatal => log::error!("Out of memory!"),
            Recovery::Skip => log::warn!("Render error: {:?}", e),
        }
    }

    fn resize(&mut self, view: &View) {
        let (w, h) = view.size.backing_size();
        self.resize_backing(w, h);
    }

    fn release(&mut self) {
        if let Some(gpu) = self.gpu.take() {
            gpu.destroy();
            log::debug!("sphere renderer released");
        }
        self.instance_count = 0;
    }
}
