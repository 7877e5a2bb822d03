//! Deferred renderer: geometry pass into the geometry buffer, then a composition pass to the target.

use crate::{
    camera::{Camera, CameraUniform},
    gbuffer::{GBufferError, GBufferSlot, GeometryBuffer, SKY_COLOR},
    mesh::Mesh,
    model::{Material, Model},
    pipeline::{
        create_blit_color_bind_group_layout,
        create_blit_depth_bind_group_layout,
        create_blit_pipelines,
        create_camera_bind_group_layout,
        create_composition_bind_group_layout,
        create_composition_pipeline,
        create_draw_bind_group_layout,
        create_gbuffer_pipeline,
    },
    screenshot::ScreenshotCapture,
    vertex::{CompositionUniform, DrawUniform},
};
use anyhow::{Context, Result};
use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

/// Placeholder light, world space, pointing toward the light.
const LIGHT_DIRECTION: Vec3 = Vec3::new(0.5, 1.0, 0.3);

/// Per-draw uniform slots allocated up front; grows on demand.
const INITIAL_DRAW_CAPACITY: u32 = 64;

/// How the composition pass turns the geometry buffer into the visible image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum CompositionMode {
    /// Shade a full-screen quad that samples every attachment.
    #[default]
    Shaded,
    /// Copy each attachment into its own quadrant of the window.
    DebugBlit,
}

/// Renderer options fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderSettings {
    pub composition: CompositionMode,
    /// Also show the depth attachment (top-right quadrant) in `DebugBlit` mode.
    pub debug_depth_blit: bool,
    pub vsync: bool,
    /// Reallocate the geometry buffer when the window is resized.
    /// When off, the geometry buffer keeps its startup size.
    pub reallocate_gbuffer_on_resize: bool,
}

impl Default for RenderSettings {
    fn default() -> Self {
        Self {
            composition: CompositionMode::Shaded,
            debug_depth_blit: false,
            vsync: true,
            reallocate_gbuffer_on_resize: false,
        }
    }
}

/// One model drawn with a world transform.
#[derive(Clone, Copy)]
pub struct DrawItem<'a> {
    pub model: &'a Model,
    pub transform: Mat4,
}

/// Color target the composition pass writes, with its size in pixels.
#[derive(Clone, Copy)]
pub struct FrameTarget<'a> {
    pub view: &'a wgpu::TextureView,
    pub width: u32,
    pub height: u32,
}

/// Geometry pass uniforms for one material range.
pub fn draw_uniform(view: Mat4, model: Mat4, material: &Material, fallback_specular: f32) -> DrawUniform {
    let normal = (view * model).inverse().transpose();
    DrawUniform {
        model: model.to_cols_array_2d(),
        normal: normal.to_cols_array_2d(),
        diffuse_spec: material.diffuse.extend(material.specular_or(fallback_specular)).to_array(),
    }
}

/// Viewport `[x, y, width, height]` of an attachment's quadrant in debug blit mode.
///
/// Position is top-left, depth top-right, normal bottom-left and color-spec bottom-right.
/// `None` when the target is too small to split into non-empty quadrants.
pub fn quadrant_viewport(slot: GBufferSlot, width: u32, height: u32) -> Option<[f32; 4]> {
    if width < 2 || height < 2 {
        return None;
    }
    let half_w = (width / 2) as f32;
    let half_h = (height / 2) as f32;
    let (x, y) = match slot {
        GBufferSlot::Position => (0.0, 0.0),
        GBufferSlot::Depth => (half_w, 0.0),
        GBufferSlot::Normal => (0.0, half_h),
        GBufferSlot::ColorSpec => (half_w, half_h),
    };
    Some([x, y, half_w, half_h])
}

fn align_to(value: u64, alignment: u64) -> u64 {
    value.div_ceil(alignment) * alignment
}

/// Bind groups that reference geometry buffer views. Rebuilt whenever the geometry buffer is.
struct GBufferBindings {
    composition: wgpu::BindGroup,
    /// Position, normal, color-spec in slot order.
    blit_color: [wgpu::BindGroup; 3],
    blit_depth: wgpu::BindGroup,
}

impl GBufferBindings {
    fn new(
        device: &wgpu::Device,
        gbuffer: &GeometryBuffer,
        layouts: &PassLayouts,
        sampler: &wgpu::Sampler,
        composition_buffer: &wgpu::Buffer,
    ) -> Self {
        let composition = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Composition Bind Group"),
            layout: &layouts.composition,
            entries: &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(GBufferSlot::Position)),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(GBufferSlot::Normal)),
                },
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(GBufferSlot::ColorSpec)),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(gbuffer.view(GBufferSlot::Depth)),
                },
                wgpu::BindGroupEntry {
                    binding: 4,
                    resource: wgpu::BindingResource::Sampler(sampler),
                },
                wgpu::BindGroupEntry {
                    binding: 5,
                    resource: composition_buffer.as_entire_binding(),
                },
            ],
        });

        let blit_color = GBufferSlot::COLOR.map(|slot| {
            device.create_bind_group(&wgpu::BindGroupDescriptor {
                label: Some(slot.label()),
                layout: &layouts.blit_color,
                entries: &[
                    wgpu::BindGroupEntry {
                        binding: 0,
                        resource: wgpu::BindingResource::TextureView(gbuffer.view(slot)),
                    },
                    wgpu::BindGroupEntry {
                        binding: 1,
                        resource: wgpu::BindingResource::Sampler(sampler),
                    },
                ],
            })
        });

        let blit_depth = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Blit Depth Bind Group"),
            layout: &layouts.blit_depth,
            entries: &[wgpu::BindGroupEntry {
                binding: 2,
                resource: wgpu::BindingResource::TextureView(gbuffer.view(GBufferSlot::Depth)),
            }],
        });

        Self {
            composition,
            blit_color,
            blit_depth,
        }
    }
}

struct PassLayouts {
    draw: wgpu::BindGroupLayout,
    composition: wgpu::BindGroupLayout,
    blit_color: wgpu::BindGroupLayout,
    blit_depth: wgpu::BindGroupLayout,
}

/// Everything both passes need apart from the output target: the geometry
/// buffer, pipelines, bind groups and uniform buffers.
pub struct DeferredPasses {
    settings: RenderSettings,

    gbuffer: GeometryBuffer,
    gbuffer_bindings: GBufferBindings,
    layouts: PassLayouts,
    sampler: wgpu::Sampler,
    quad: Mesh,

    // Geometry pass
    gbuffer_pipeline: wgpu::RenderPipeline,
    camera_buffer: wgpu::Buffer,
    camera_bind_group: wgpu::BindGroup,
    camera_uniform: CameraUniform,
    draw_buffer: wgpu::Buffer,
    draw_bind_group: wgpu::BindGroup,
    /// Bytes between consecutive per-draw uniforms (dynamic offset alignment).
    draw_stride: u64,
    draw_capacity: u32,

    // Composition pass
    composition_pipeline: wgpu::RenderPipeline,
    composition_buffer: wgpu::Buffer,
    blit_color_pipeline: wgpu::RenderPipeline,
    blit_depth_pipeline: wgpu::RenderPipeline,
}

impl DeferredPasses {
    /// Allocate a `width`x`height` geometry buffer and the pipelines that
    /// compose it into targets of `target_format`.
    pub fn new(
        device: &wgpu::Device,
        target_format: wgpu::TextureFormat,
        width: u32,
        height: u32,
        settings: RenderSettings,
    ) -> Result<Self, GBufferError> {
        let gbuffer = GeometryBuffer::new(device, width, height)?;

        // Geometry pass resources
        let camera_uniform = CameraUniform::new();
        let camera_buffer = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Camera Buffer"),
            contents: bytemuck::cast_slice(&[camera_uniform]),
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        });
        let camera_bind_group_layout = create_camera_bind_group_layout(device);
        let camera_bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some("Camera Bind Group"),
            layout: &camera_bind_group_layout,
            entries: &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        });

        let layouts = PassLayouts {
            draw: create_draw_bind_group_layout(device),
            composition: create_composition_bind_group_layout(device),
            blit_color: create_blit_color_bind_group_layout(device),
            blit_depth: create_blit_depth_bind_group_layout(device),
        };

        let draw_stride = align_to(
            std::mem::size_of::<DrawUniform>() as u64,
            u64::from(device.limits().min_uniform_buffer_offset_alignment),
        );
        let (draw_buffer, draw_bind_group) =
            create_draw_buffer(device, &layouts.draw, draw_stride, INITIAL_DRAW_CAPACITY);

        let gbuffer_pipeline = create_gbuffer_pipeline(device, &camera_bind_group_layout, &layouts.draw);

        // Composition pass resources
        let composition_buffer = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Composition Uniform Buffer"),
            size: std::mem::size_of::<CompositionUniform>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let sampler = device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("GBuffer Sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });
        let composition_pipeline = create_composition_pipeline(device, target_format, &layouts.composition);
        let (blit_color_pipeline, blit_depth_pipeline) =
            create_blit_pipelines(device, target_format, &layouts.blit_color, &layouts.blit_depth);
        let gbuffer_bindings = GBufferBindings::new(device, &gbuffer, &layouts, &sampler, &composition_buffer);
        let quad = Mesh::fullscreen_quad(device);

        Ok(Self {
            settings,
            gbuffer,
            gbuffer_bindings,
            layouts,
            sampler,
            quad,
            gbuffer_pipeline,
            camera_buffer,
            camera_bind_group,
            camera_uniform,
            draw_buffer,
            draw_bind_group,
            draw_stride,
            draw_capacity: INITIAL_DRAW_CAPACITY,
            composition_pipeline,
            composition_buffer,
            blit_color_pipeline,
            blit_depth_pipeline,
        })
    }

    /// Reallocate the geometry buffer and rebuild the bind groups that read it.
    pub fn resize_gbuffer(&mut self, device: &wgpu::Device, width: u32, height: u32) -> Result<(), GBufferError> {
        self.gbuffer.resize(device, width, height)?;
        self.gbuffer_bindings =
            GBufferBindings::new(device, &self.gbuffer, &self.layouts, &self.sampler, &self.composition_buffer);
        log::debug!("Geometry buffer reallocated at {}x{}", width, height);
        Ok(())
    }

    /// Upload this frame's uniforms, then record the geometry pass and the
    /// composition pass into `target` on the same encoder.
    pub fn encode(
        &mut self,
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        encoder: &mut wgpu::CommandEncoder,
        target: FrameTarget<'_>,
        camera: &Camera,
        items: &[DrawItem<'_>],
    ) {
        self.camera_uniform.update(camera);
        queue.write_buffer(&self.camera_buffer, 0, bytemuck::cast_slice(&[self.camera_uniform]));
        self.upload_draw_uniforms(device, queue, camera.view_matrix(), items);
        self.upload_composition_uniform(queue, camera);

        self.geometry_pass(encoder, items);
        self.composition_pass(encoder, target);
    }

    fn upload_draw_uniforms(&mut self, device: &wgpu::Device, queue: &wgpu::Queue, view: Mat4, items: &[DrawItem<'_>]) {
        let count: usize = items.iter().map(|item| item.model.materials.len()).sum();
        if count as u32 > self.draw_capacity {
            let capacity = (count as u32).next_power_of_two();
            let (buffer, bind_group) = create_draw_buffer(device, &self.layouts.draw, self.draw_stride, capacity);
            self.draw_buffer = buffer;
            self.draw_bind_group = bind_group;
            self.draw_capacity = capacity;
            log::debug!("Per-draw uniform buffer grown to {} slots", capacity);
        }

        let stride = self.draw_stride as usize;
        let mut bytes = vec![0u8; count * stride];
        let uniforms = items.iter().flat_map(|item| {
            item.model
                .materials
                .iter()
                .map(move |material| draw_uniform(view, item.transform, material, item.model.fallback_specular))
        });
        for (slot, uniform) in bytes.chunks_exact_mut(stride).zip(uniforms) {
            slot[..std::mem::size_of::<DrawUniform>()].copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        if !bytes.is_empty() {
            queue.write_buffer(&self.draw_buffer, 0, &bytes);
        }
    }

    fn upload_composition_uniform(&self, queue: &wgpu::Queue, camera: &Camera) {
        let light = camera.view_matrix().transform_vector3(LIGHT_DIRECTION).normalize_or_zero();
        let uniform = CompositionUniform {
            proj: camera.projection_matrix().to_cols_array_2d(),
            light_dir: light.extend(0.0).to_array(),
            sky_color: [SKY_COLOR.r as f32, SKY_COLOR.g as f32, SKY_COLOR.b as f32, 1.0],
        };
        queue.write_buffer(&self.composition_buffer, 0, bytemuck::cast_slice(&[uniform]));
    }

    fn geometry_pass(&self, encoder: &mut wgpu::CommandEncoder, items: &[DrawItem<'_>]) {
        let color_attachments = self.gbuffer.color_attachments();
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Geometry Pass"),
            color_attachments: &color_attachments,
            depth_stencil_attachment: Some(self.gbuffer.depth_attachment()),
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        pass.set_pipeline(&self.gbuffer_pipeline);
        pass.set_bind_group(0, &self.camera_bind_group, &[]);

        let mut slot = 0u64;
        for item in items {
            item.model.mesh.bind(&mut pass);
            for material in &item.model.materials {
                let offset = (slot * self.draw_stride) as wgpu::DynamicOffset;
                pass.set_bind_group(1, &self.draw_bind_group, &[offset]);
                pass.draw_indexed(material.index_range(), 0, 0..1);
                slot += 1;
            }
        }
    }

    fn composition_pass(&self, encoder: &mut wgpu::CommandEncoder, target: FrameTarget<'_>) {
        let (width, height) = (target.width, target.height);
        let mut pass = encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("Composition Pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: target.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color::BLACK),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });

        self.quad.bind(&mut pass);
        match self.settings.composition {
            CompositionMode::Shaded => {
                pass.set_pipeline(&self.composition_pipeline);
                pass.set_bind_group(0, &self.gbuffer_bindings.composition, &[]);
                pass.draw_indexed(0..self.quad.num_indices, 0, 0..1);
            }
            CompositionMode::DebugBlit => {
                pass.set_pipeline(&self.blit_color_pipeline);
                for (slot, bind_group) in GBufferSlot::COLOR.iter().zip(&self.gbuffer_bindings.blit_color) {
                    let Some([x, y, w, h]) = quadrant_viewport(*slot, width, height) else {
                        continue;
                    };
                    pass.set_viewport(x, y, w, h, 0.0, 1.0);
                    pass.set_bind_group(0, bind_group, &[]);
                    pass.draw_indexed(0..self.quad.num_indices, 0, 0..1);
                }
                if self.settings.debug_depth_blit {
                    if let Some([x, y, w, h]) = quadrant_viewport(GBufferSlot::Depth, width, height) {
                        pass.set_viewport(x, y, w, h, 0.0, 1.0);
                        pass.set_pipeline(&self.blit_depth_pipeline);
                        pass.set_bind_group(0, &self.gbuffer_bindings.blit_depth, &[]);
                        pass.draw_indexed(0..self.quad.num_indices, 0, 0..1);
                    }
                }
            }
        }
    }
}

/// Main renderer state: the window surface plus the deferred passes drawn into it.
pub struct Renderer {
    pub surface: wgpu::Surface<'static>,
    pub device: wgpu::Device,
    pub queue: wgpu::Queue,
    pub config: wgpu::SurfaceConfiguration,
    pub size: winit::dpi::PhysicalSize<u32>,
    pub window: Arc<Window>,
    settings: RenderSettings,
    passes: DeferredPasses,
    pending_screenshot: Option<PathBuf>,
}

impl Renderer {
    /// Create a renderer for the given window. Fails if no adapter/device is
    /// available or the geometry buffer is incomplete.
    pub async fn new(window: Arc<Window>, settings: RenderSettings) -> Result<Self> {
        let size = window.inner_size();

        let instance = wgpu::Instance::new(wgpu::InstanceDescriptor {
            backends: wgpu::Backends::all(),
            ..Default::default()
        });

        let surface = instance.create_surface(window.clone())?;

        let adapter = instance
            .request_adapter(&wgpu::RequestAdapterOptions {
                power_preference: wgpu::PowerPreference::HighPerformance,
                compatible_surface: Some(&surface),
                force_fallback_adapter: false,
            })
            .await
            .ok_or_else(|| anyhow::anyhow!("Failed to find suitable GPU adapter"))?;

        log::info!("Using GPU: {:?}", adapter.get_info().name);

        let (device, queue) = adapter
            .request_device(
                &wgpu::DeviceDescriptor {
                    label: Some("Main Device"),
                    required_features: wgpu::Features::empty(),
                    required_limits: wgpu::Limits::default(),
                    memory_hints: Default::default(),
                },
                None,
            )
            .await
            .context("Failed to create GPU device")?;

        let surface_caps = surface.get_capabilities(&adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .find(|f| f.is_srgb())
            .copied()
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| anyhow::anyhow!("Surface reports no supported formats"))?;

        // Screenshots copy straight out of the surface texture.
        let mut usage = wgpu::TextureUsages::RENDER_ATTACHMENT;
        if surface_caps.usages.contains(wgpu::TextureUsages::COPY_SRC) {
            usage |= wgpu::TextureUsages::COPY_SRC;
        } else {
            log::warn!("Surface does not support COPY_SRC, screenshots disabled");
        }

        let config = wgpu::SurfaceConfiguration {
            usage,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if settings.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode: surface_caps.alpha_modes.first().copied().unwrap_or(wgpu::CompositeAlphaMode::Auto),
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&device, &config);

        let passes = DeferredPasses::new(&device, surface_format, config.width, config.height, settings)
            .context("Geometry buffer is incomplete")?;

        log::info!(
            "Renderer ready ({:?}, {}x{}, {:?} composition)",
            surface_format,
            config.width,
            config.height,
            settings.composition
        );

        Ok(Self {
            surface,
            device,
            queue,
            config,
            size,
            window,
            settings,
            passes,
            pending_screenshot: None,
        })
    }

    /// Handle window resize. The swapchain always follows the window; the
    /// geometry buffer only does when `reallocate_gbuffer_on_resize` is set.
    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) -> Result<(), GBufferError> {
        if new_size.width == 0 || new_size.height == 0 {
            return Ok(());
        }
        self.size = new_size;
        self.config.width = new_size.width;
        self.config.height = new_size.height;
        self.surface.configure(&self.device, &self.config);

        if self.settings.reallocate_gbuffer_on_resize {
            self.passes.resize_gbuffer(&self.device, new_size.width, new_size.height)?;
        }
        Ok(())
    }

    /// Capture the next rendered frame to `path`.
    pub fn request_screenshot(&mut self, path: impl Into<PathBuf>) {
        self.pending_screenshot = Some(path.into());
    }

    /// Render one frame: geometry pass over `items`, then the composition pass.
    pub fn render(&mut self, camera: &Camera, items: &[DrawItem<'_>]) -> Result<()> {
        let output = match self.surface.get_current_texture() {
            Ok(frame) => frame,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.device, &self.config);
                return Ok(());
            }
            Err(wgpu::SurfaceError::Timeout) => {
                log::warn!("Surface timed out, skipping frame");
                return Ok(());
            }
            Err(e) => return Err(e).context("Failed to acquire surface texture"),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());

        let mut encoder = self.device.create_command_encoder(&wgpu::CommandEncoderDescriptor {
            label: Some("Render Encoder"),
        });

        let target = FrameTarget {
            view: &view,
            width: self.config.width,
            height: self.config.height,
        };
        self.passes.encode(&self.device, &self.queue, &mut encoder, target, camera, items);

        let capture = self.pending_screenshot.take().and_then(|path| {
            ScreenshotCapture::encode_copy(&self.device, &mut encoder, &output.texture, &path)
                .map_err(|e| log::warn!("Screenshot skipped: {}", e))
                .ok()
        });

        self.queue.submit(std::iter::once(encoder.finish()));

        if let Some(capture) = capture {
            if let Err(e) = capture.save(&self.device) {
                log::error!("Screenshot failed: {}", e);
            }
        }

        output.present();
        Ok(())
    }

    /// Get window dimensions.
    pub fn dimensions(&self) -> (u32, u32) {
        (self.config.width, self.config.height)
    }

    /// Access the device for mesh creation.
    pub fn device(&self) -> &wgpu::Device {
        &self.device
    }
}

fn create_draw_buffer(
    device: &wgpu::Device,
    layout: &wgpu::BindGroupLayout,
    stride: u64,
    capacity: u32,
) -> (wgpu::Buffer, wgpu::BindGroup) {
    let buffer = device.create_buffer(&wgpu::BufferDescriptor {
        label: Some("Draw Uniform Buffer"),
        size: stride * u64::from(capacity),
        usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
        mapped_at_creation: false,
    });
    let bind_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
        label: Some("Draw Bind Group"),
        layout,
        entries: &[wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &buffer,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<DrawUniform>() as u64),
            }),
        }],
    });
    (buffer, bind_group)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{headless_device, vertex::Vertex, DEFAULT_SPECULAR};
    use std::path::Path;

    const SIZE: u32 = 64;
    const TARGET_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba8Unorm;
    const SKY: [u8; 4] = [135, 206, 235, 255];

    fn material(specular: Option<f32>) -> Material {
        Material {
            diffuse: Vec3::new(0.2, 0.4, 0.6),
            specular,
            index_offset: 0,
            index_count: 3,
        }
    }

    /// Triangle around the origin in the z = 0 plane, drawn once per material range.
    fn triangle(device: &wgpu::Device, ranges: usize) -> Model {
        let normal = [0.0, 0.0, 1.0];
        let vertices = [
            Vertex::new([-1.0, -1.0, 0.0], normal, [0.0, 0.0]),
            Vertex::new([1.0, -1.0, 0.0], normal, [1.0, 0.0]),
            Vertex::new([0.0, 1.0, 0.0], normal, [0.5, 1.0]),
        ];
        Model {
            name: "triangle".to_string(),
            mesh: Mesh::new(device, "Triangle", &vertices, &[0, 1, 2]),
            materials: vec![material(Some(0.5)); ranges],
            fallback_specular: DEFAULT_SPECULAR,
        }
    }

    /// Looks down -Z at the triangle; the view spans 10 units at z = 0.
    fn front_camera(width: u32, height: u32) -> Camera {
        Camera::new(
            width,
            height,
            std::f32::consts::FRAC_PI_2,
            0.1,
            100.0,
            Vec3::new(0.0, 0.0, 5.0),
            Vec3::ZERO,
        )
    }

    struct Frame {
        color_spec: Vec<u8>,
        target: Vec<u8>,
    }

    /// Record one frame into an offscreen `width`x`height` target, copy the
    /// color-spec attachment and the target out, and submit it all at once.
    fn render_offscreen(
        device: &wgpu::Device,
        queue: &wgpu::Queue,
        passes: &mut DeferredPasses,
        model: &Model,
        (width, height): (u32, u32),
    ) -> Frame {
        let texture = device.create_texture(&wgpu::TextureDescriptor {
            label: Some("Offscreen Target"),
            size: wgpu::Extent3d {
                width,
                height,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: TARGET_FORMAT,
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        });
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let items = [DrawItem {
            model,
            transform: Mat4::IDENTITY,
        }];

        device.push_error_scope(wgpu::ErrorFilter::Validation);
        let mut encoder = device.create_command_encoder(&wgpu::CommandEncoderDescriptor::default());
        let target = FrameTarget { view: &view, width, height };
        passes.encode(device, queue, &mut encoder, target, &front_camera(width, height), &items);

        let color_spec_texture = &passes.gbuffer.attachment(GBufferSlot::ColorSpec).texture;
        let color_spec =
            ScreenshotCapture::encode_copy(device, &mut encoder, color_spec_texture, Path::new("color_spec.png")).unwrap();
        let target = ScreenshotCapture::encode_copy(device, &mut encoder, &texture, Path::new("target.png")).unwrap();
        queue.submit(std::iter::once(encoder.finish()));

        let frame = Frame {
            color_spec: color_spec.read_rgba(device).unwrap(),
            target: target.read_rgba(device).unwrap(),
        };
        let error = pollster::block_on(device.pop_error_scope());
        assert!(error.is_none(), "validation error: {error:?}");
        frame
    }

    fn texel(pixels: &[u8], width: u32, x: u32, y: u32) -> [u8; 4] {
        let i = ((y * width + x) * 4) as usize;
        [pixels[i], pixels[i + 1], pixels[i + 2], pixels[i + 3]]
    }

    fn assert_texel_near(actual: [u8; 4], expected: [u8; 4]) {
        let close = actual.iter().zip(expected).all(|(&a, e)| a.abs_diff(e) <= 1);
        assert!(close, "texel {actual:?}, expected {expected:?}");
    }

    #[test]
    fn quadrants_tile_the_window() {
        assert_eq!(quadrant_viewport(GBufferSlot::Position, 800, 600), Some([0.0, 0.0, 400.0, 300.0]));
        assert_eq!(quadrant_viewport(GBufferSlot::Depth, 800, 600), Some([400.0, 0.0, 400.0, 300.0]));
        assert_eq!(quadrant_viewport(GBufferSlot::Normal, 800, 600), Some([0.0, 300.0, 400.0, 300.0]));
        assert_eq!(quadrant_viewport(GBufferSlot::ColorSpec, 800, 600), Some([400.0, 300.0, 400.0, 300.0]));
    }

    #[test]
    fn degenerate_windows_have_no_quadrants() {
        for slot in GBufferSlot::ALL {
            assert_eq!(quadrant_viewport(slot, 1, 600), None);
            assert_eq!(quadrant_viewport(slot, 600, 1), None);
            assert_eq!(quadrant_viewport(slot, 0, 0), None);
        }
        assert_eq!(quadrant_viewport(GBufferSlot::ColorSpec, 3, 2), Some([1.0, 1.0, 1.0, 1.0]));
    }

    #[test]
    fn draw_uniform_packs_diffuse_and_specular() {
        let u = draw_uniform(Mat4::IDENTITY, Mat4::IDENTITY, &material(None), 0.7);
        assert_eq!(u.diffuse_spec, [0.2, 0.4, 0.6, 0.7]);
        let u = draw_uniform(Mat4::IDENTITY, Mat4::IDENTITY, &material(Some(0.1)), 0.7);
        assert_eq!(u.diffuse_spec[3], 0.1);
    }

    #[test]
    fn normal_matrix_undoes_nonuniform_scale() {
        let model = Mat4::from_scale(Vec3::new(4.0, 1.0, 1.0));
        let u = draw_uniform(Mat4::IDENTITY, model, &material(None), 0.0);
        let normal = Mat4::from_cols_array_2d(&u.normal);
        let n = normal.transform_vector3(Vec3::new(1.0, 1.0, 0.0)).normalize();
        // Surface tangent (4, -1) after scaling stays perpendicular to the transformed normal.
        let tangent = model.transform_vector3(Vec3::new(1.0, -1.0, 0.0));
        assert!(n.dot(tangent).abs() < 1e-5);
        assert_eq!(Mat4::from_cols_array_2d(&u.model), model);
    }

    #[test]
    fn draw_stride_respects_offset_alignment() {
        assert_eq!(align_to(144, 256), 256);
        assert_eq!(align_to(256, 256), 256);
        assert_eq!(align_to(257, 256), 512);
    }

    #[test]
    fn default_settings_keep_gbuffer_fixed() {
        let settings = RenderSettings::default();
        assert_eq!(settings.composition, CompositionMode::Shaded);
        assert!(!settings.debug_depth_blit);
        assert!(!settings.reallocate_gbuffer_on_resize);
    }

    #[test]
    fn geometry_pass_packs_color_spec_and_composes_sky() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let mut passes = DeferredPasses::new(&device, TARGET_FORMAT, SIZE, SIZE, RenderSettings::default()).unwrap();
        // More ranges than the initial per-draw capacity forces a regrow.
        let model = triangle(&device, INITIAL_DRAW_CAPACITY as usize + 6);
        let frame = render_offscreen(&device, &queue, &mut passes, &model, (SIZE, SIZE));

        assert_eq!(passes.draw_capacity, (INITIAL_DRAW_CAPACITY + 6).next_power_of_two());

        // diffuse (0.2, 0.4, 0.6), specular 0.5 as unorm bytes
        assert_texel_near(texel(&frame.color_spec, SIZE, SIZE / 2, SIZE / 2), [51, 102, 153, 128]);
        assert_texel_near(texel(&frame.color_spec, SIZE, 2, 2), SKY);
        // Depth stayed at the clear value in the corner, so the composition shows sky.
        assert_texel_near(texel(&frame.target, SIZE, 2, 2), SKY);
        assert_ne!(texel(&frame.target, SIZE, SIZE / 2, SIZE / 2), SKY);
    }

    #[test]
    fn debug_blit_places_color_spec_bottom_right() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let settings = RenderSettings {
            composition: CompositionMode::DebugBlit,
            ..RenderSettings::default()
        };
        let mut passes = DeferredPasses::new(&device, TARGET_FORMAT, SIZE, SIZE, settings).unwrap();
        let model = triangle(&device, 1);
        let frame = render_offscreen(&device, &queue, &mut passes, &model, (SIZE, SIZE));

        let half = SIZE / 2;
        assert_texel_near(texel(&frame.target, SIZE, half + half / 2, half + half / 2), [51, 102, 153, 255]);
        assert_texel_near(texel(&frame.target, SIZE, half + 1, half + 1), SKY);
        // Depth quadrant is off by default and keeps the pass clear color.
        assert_eq!(texel(&frame.target, SIZE, half + half / 2, half / 2), [0, 0, 0, 255]);
    }

    #[test]
    fn debug_blit_into_one_pixel_wide_target_is_valid() {
        let Some((device, queue)) = headless_device() else {
            eprintln!("no GPU adapter, skipping");
            return;
        };
        let settings = RenderSettings {
            composition: CompositionMode::DebugBlit,
            debug_depth_blit: true,
            ..RenderSettings::default()
        };
        let mut passes = DeferredPasses::new(&device, TARGET_FORMAT, SIZE, SIZE, settings).unwrap();
        let model = triangle(&device, 1);
        let frame = render_offscreen(&device, &queue, &mut passes, &model, (1, 600));
        assert_eq!(texel(&frame.target, 1, 0, 300), [0, 0, 0, 255]);
        let frame = render_offscreen(&device, &queue, &mut passes, &model, (600, 1));
        assert_eq!(texel(&frame.target, 600, 300, 0), [0, 0, 0, 255]);
    }
}
