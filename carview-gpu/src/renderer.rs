//! wgpu implementation of the multi-viewport render backend

use crate::device::GpuContext;
use crate::geometry::{linear_rgb, object_geometry, CameraUniform, ColorVertex, PointVertex, Topology};
use carview_core::{
    CameraImage, Error, ObjectId, RenderBackend, Result, Rgb, SceneObject, ViewportRect, ViewportSpec,
};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use wgpu::util::DeviceExt;
use winit::window::Window;

const DEPTH_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Depth32Float;

/// Rendering configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderConfig {
    pub enable_depth_test: bool,
    /// Present with vertical sync
    pub vsync: bool,
    /// Prefer a discrete adapter
    pub high_performance: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            enable_depth_test: true,
            vsync: true,
            high_performance: true,
        }
    }
}

/// Viewport rectangle clipped to the canvas, in whole pixels for the scissor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PixelArea {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl PixelArea {
    /// Clip `rect` to a `canvas` of `(width, height)`; `None` when nothing is left
    pub fn clip(rect: ViewportRect, canvas: (u32, u32)) -> Option<Self> {
        let (canvas_w, canvas_h) = (canvas.0 as f32, canvas.1 as f32);
        let x0 = rect.x.max(0.0).floor();
        let y0 = rect.y.max(0.0).floor();
        let x1 = (rect.x + rect.width).min(canvas_w).floor();
        let y1 = (rect.y + rect.height).min(canvas_h).floor();
        if !(x1 - x0 >= 1.0 && y1 - y0 >= 1.0) {
            return None;
        }
        Some(Self {
            x: x0 as u32,
            y: y0 as u32,
            width: (x1 - x0) as u32,
            height: (y1 - y0) as u32,
        })
    }

    fn apply(&self, pass: &mut wgpu::RenderPass<'_>) {
        pass.set_viewport(
            self.x as f32,
            self.y as f32,
            self.width as f32,
            self.height as f32,
            0.0,
            1.0,
        );
        pass.set_scissor_rect(self.x, self.y, self.width, self.height);
    }
}

/// Vertex buffer of one uploaded scene object
struct GpuObject {
    /// Address of the object the buffer was built from; a replaced object re-uploads
    source: usize,
    topology: Topology,
    count: u32,
    buffer: Option<wgpu::Buffer>,
}

/// Texture of the image currently shown in the overlay
struct ImageTexture {
    source: (usize, u32, u32),
    bind_group: wgpu::BindGroup,
    _texture: wgpu::Texture,
}

struct Pipelines {
    points: wgpu::RenderPipeline,
    lines: wgpu::RenderPipeline,
    triangles: wgpu::RenderPipeline,
    image: wgpu::RenderPipeline,
}

impl Pipelines {
    fn scene(&self, topology: Topology) -> &wgpu::RenderPipeline {
        match topology {
            Topology::Points => &self.points,
            Topology::Lines => &self.lines,
            Topology::Triangles => &self.triangles,
        }
    }
}

/// Work recorded between `begin_frame` and `end_frame`
struct Frame {
    output: wgpu::SurfaceTexture,
    view: wgpu::TextureView,
    encoder: wgpu::CommandEncoder,
}

/// Window renderer drawing scene objects into any number of viewports per frame
pub struct SceneRenderer {
    context: GpuContext,
    surface: wgpu::Surface<'static>,
    surface_config: wgpu::SurfaceConfiguration,
    depth_view: wgpu::TextureView,
    pipelines: Pipelines,
    camera_layout: wgpu::BindGroupLayout,
    image_layout: wgpu::BindGroupLayout,
    image_sampler: wgpu::Sampler,
    /// Colours must be linearized before writing to an sRGB surface
    linear_colors: bool,
    objects: HashMap<ObjectId, GpuObject>,
    image: Option<ImageTexture>,
    frame: Option<Frame>,
}

impl SceneRenderer {
    /// Create a renderer presenting to `window`
    pub async fn new(window: Arc<Window>, config: RenderConfig) -> Result<Self> {
        let size = window.inner_size();
        let power_preference = if config.high_performance {
            wgpu::PowerPreference::HighPerformance
        } else {
            wgpu::PowerPreference::LowPower
        };
        let (context, surface) = GpuContext::for_window(window, power_preference).await?;

        let surface_caps = surface.get_capabilities(&context.adapter);
        let surface_format = surface_caps
            .formats
            .iter()
            .copied()
            .find(|f| f.is_srgb())
            .or_else(|| surface_caps.formats.first().copied())
            .ok_or_else(|| Error::Gpu("Surface reports no texture formats".to_string()))?;
        let alpha_mode = surface_caps
            .alpha_modes
            .first()
            .copied()
            .unwrap_or(wgpu::CompositeAlphaMode::Auto);

        let surface_config = wgpu::SurfaceConfiguration {
            usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
            format: surface_format,
            width: size.width.max(1),
            height: size.height.max(1),
            present_mode: if config.vsync {
                wgpu::PresentMode::AutoVsync
            } else {
                wgpu::PresentMode::AutoNoVsync
            },
            alpha_mode,
            view_formats: vec![],
            desired_maximum_frame_latency: 2,
        };
        surface.configure(&context.device, &surface_config);
        tracing::info!(format = ?surface_format, width = surface_config.width, height = surface_config.height, "surface configured");

        let camera_layout = context.create_bind_group_layout(
            "camera_bind_group_layout",
            &[wgpu::BindGroupLayoutEntry {
                binding: 0,
                visibility: wgpu::ShaderStages::VERTEX,
                ty: wgpu::BindingType::Buffer {
                    ty: wgpu::BufferBindingType::Uniform,
                    has_dynamic_offset: false,
                    min_binding_size: None,
                },
                count: None,
            }],
        );
        let image_layout = context.create_bind_group_layout(
            "image_bind_group_layout",
            &[
                wgpu::BindGroupLayoutEntry {
                    binding: 0,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Texture {
                        sample_type: wgpu::TextureSampleType::Float { filterable: true },
                        view_dimension: wgpu::TextureViewDimension::D2,
                        multisampled: false,
                    },
                    count: None,
                },
                wgpu::BindGroupLayoutEntry {
                    binding: 1,
                    visibility: wgpu::ShaderStages::FRAGMENT,
                    ty: wgpu::BindingType::Sampler(wgpu::SamplerBindingType::Filtering),
                    count: None,
                },
            ],
        );
        let image_sampler = context.device.create_sampler(&wgpu::SamplerDescriptor {
            label: Some("image sampler"),
            address_mode_u: wgpu::AddressMode::ClampToEdge,
            address_mode_v: wgpu::AddressMode::ClampToEdge,
            mag_filter: wgpu::FilterMode::Linear,
            min_filter: wgpu::FilterMode::Linear,
            ..Default::default()
        });

        let pipelines = create_pipelines(&context, &camera_layout, &image_layout, surface_format, &config);
        let depth_view = create_depth_view(&context.device, &surface_config);

        Ok(Self {
            context,
            surface,
            surface_config,
            depth_view,
            pipelines,
            camera_layout,
            image_layout,
            image_sampler,
            linear_colors: surface_format.is_srgb(),
            objects: HashMap::new(),
            image: None,
            frame: None,
        })
    }

    pub fn resize(&mut self, new_size: winit::dpi::PhysicalSize<u32>) {
        if new_size.width > 0 && new_size.height > 0 {
            self.surface_config.width = new_size.width;
            self.surface_config.height = new_size.height;
            self.surface.configure(&self.context.device, &self.surface_config);
            self.depth_view = create_depth_view(&self.context.device, &self.surface_config);
        }
    }

    /// Number of scene objects with a cached vertex buffer
    pub fn cached_objects(&self) -> usize {
        self.objects.len()
    }

    fn upload(&mut self, object: &SceneObject) {
        let source = object as *const SceneObject as usize;
        if self.objects.get(&object.id).is_some_and(|cached| cached.source == source) {
            return;
        }

        let geometry = object_geometry(object, self.linear_colors);
        let label = object.id.to_string();
        let buffer = (!geometry.is_empty()).then(|| {
            self.context.device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
                label: Some(&label),
                contents: geometry.as_bytes(),
                usage: wgpu::BufferUsages::VERTEX,
            })
        });
        tracing::debug!(id = %object.id, count = geometry.len(), "uploaded object");

        self.objects.insert(
            object.id.clone(),
            GpuObject {
                source,
                topology: geometry.topology(),
                count: geometry.len() as u32,
                buffer,
            },
        );
    }

    fn upload_image(&mut self, image: &CameraImage) -> Result<()> {
        let source = (image.rgba.as_ptr() as usize, image.width, image.height);
        if self.image.as_ref().is_some_and(|cached| cached.source == source) {
            return Ok(());
        }
        let expected = image.width as usize * image.height as usize * 4;
        if image.width == 0 || image.height == 0 || image.rgba.len() != expected {
            return Err(Error::Gpu(format!(
                "Image buffer of {} bytes does not match {}x{} RGBA",
                image.rgba.len(),
                image.width,
                image.height
            )));
        }

        let size = wgpu::Extent3d {
            width: image.width,
            height: image.height,
            depth_or_array_layers: 1,
        };
        let texture = self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some("camera image"),
            size,
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: wgpu::TextureFormat::Rgba8UnormSrgb,
            usage: wgpu::TextureUsages::TEXTURE_BINDING | wgpu::TextureUsages::COPY_DST,
            view_formats: &[],
        });
        self.context.queue.write_texture(
            wgpu::ImageCopyTexture {
                texture: &texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            &image.rgba,
            wgpu::ImageDataLayout {
                offset: 0,
                bytes_per_row: Some(4 * image.width),
                rows_per_image: Some(image.height),
            },
            size,
        );
        let view = texture.create_view(&wgpu::TextureViewDescriptor::default());
        let bind_group = self.context.create_bind_group(
            "image_bind_group",
            &self.image_layout,
            &[
                wgpu::BindGroupEntry {
                    binding: 0,
                    resource: wgpu::BindingResource::TextureView(&view),
                },
                wgpu::BindGroupEntry {
                    binding: 1,
                    resource: wgpu::BindingResource::Sampler(&self.image_sampler),
                },
            ],
        );

        self.image = Some(ImageTexture {
            source,
            bind_group,
            _texture: texture,
        });
        Ok(())
    }
}

fn no_frame() -> Error {
    Error::Gpu("No frame in progress".to_string())
}

impl RenderBackend for SceneRenderer {
    fn canvas_size(&self) -> (u32, u32) {
        (self.surface_config.width, self.surface_config.height)
    }

    fn begin_frame(&mut self) -> Result<()> {
        if self.frame.take().is_some() {
            tracing::warn!("previous frame was never ended; discarding it");
        }

        let output = match self.surface.get_current_texture() {
            Ok(output) => output,
            Err(wgpu::SurfaceError::Lost | wgpu::SurfaceError::Outdated) => {
                self.surface.configure(&self.context.device, &self.surface_config);
                self.surface.get_current_texture()?
            }
            Err(e) => return Err(e.into()),
        };
        let view = output.texture.create_view(&wgpu::TextureViewDescriptor::default());
        let encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("frame encoder"),
            });
        self.frame = Some(Frame { output, view, encoder });
        Ok(())
    }

    fn clear(&mut self, color: Rgb) -> Result<()> {
        let [r, g, b] = if self.linear_colors { linear_rgb(color) } else { color };
        let frame = self.frame.as_mut().ok_or_else(no_frame)?;

        let _pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("clear pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Clear(wgpu::Color {
                        r: r as f64,
                        g: g as f64,
                        b: b as f64,
                        a: 1.0,
                    }),
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: wgpu::LoadOp::Clear(1.0),
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        Ok(())
    }

    fn render_viewport(&mut self, objects: &[&SceneObject], viewport: &ViewportSpec) -> Result<()> {
        if self.frame.is_none() {
            return Err(no_frame());
        }
        let Some(area) = PixelArea::clip(viewport.rect, self.canvas_size()) else {
            tracing::debug!(rect = ?viewport.rect, "viewport outside the canvas");
            return Ok(());
        };

        for object in objects {
            self.upload(object);
        }

        let uniform = CameraUniform::new(&viewport.camera, [area.width as f32, area.height as f32]);
        let camera_buffer = self
            .context
            .create_buffer_init("camera uniform", &[uniform], wgpu::BufferUsages::UNIFORM);
        let camera_bind_group = self.context.create_bind_group(
            "camera_bind_group",
            &self.camera_layout,
            &[wgpu::BindGroupEntry {
                binding: 0,
                resource: camera_buffer.as_entire_binding(),
            }],
        );
        let depth_load = if viewport.clear {
            wgpu::LoadOp::Clear(1.0)
        } else {
            wgpu::LoadOp::Load
        };

        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("viewport pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: Some(wgpu::RenderPassDepthStencilAttachment {
                view: &self.depth_view,
                depth_ops: Some(wgpu::Operations {
                    load: depth_load,
                    store: wgpu::StoreOp::Store,
                }),
                stencil_ops: None,
            }),
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        area.apply(&mut pass);
        pass.set_bind_group(0, &camera_bind_group, &[]);

        // Opaque surfaces first so lines and points on the ground stay visible
        for topology in [Topology::Triangles, Topology::Lines, Topology::Points] {
            pass.set_pipeline(self.pipelines.scene(topology));
            for object in objects {
                let Some(gpu) = self.objects.get(&object.id) else {
                    continue;
                };
                let Some(buffer) = gpu.buffer.as_ref().filter(|_| gpu.topology == topology) else {
                    continue;
                };
                pass.set_vertex_buffer(0, buffer.slice(..));
                match topology {
                    Topology::Points => pass.draw(0..6, 0..gpu.count),
                    Topology::Lines | Topology::Triangles => pass.draw(0..gpu.count, 0..1),
                }
            }
        }
        Ok(())
    }

    fn draw_image(&mut self, image: &CameraImage, rect: ViewportRect) -> Result<()> {
        if self.frame.is_none() {
            return Err(no_frame());
        }
        let Some(area) = PixelArea::clip(rect, self.canvas_size()) else {
            return Ok(());
        };
        self.upload_image(image)?;
        let texture = self.image.as_ref().ok_or_else(|| Error::Gpu("Image upload failed".to_string()))?;

        let frame = self.frame.as_mut().ok_or_else(no_frame)?;
        let mut pass = frame.encoder.begin_render_pass(&wgpu::RenderPassDescriptor {
            label: Some("image pass"),
            color_attachments: &[Some(wgpu::RenderPassColorAttachment {
                view: &frame.view,
                resolve_target: None,
                ops: wgpu::Operations {
                    load: wgpu::LoadOp::Load,
                    store: wgpu::StoreOp::Store,
                },
            })],
            depth_stencil_attachment: None,
            timestamp_writes: None,
            occlusion_query_set: None,
        });
        area.apply(&mut pass);
        pass.set_pipeline(&self.pipelines.image);
        pass.set_bind_group(0, &texture.bind_group, &[]);
        pass.draw(0..6, 0..1);
        Ok(())
    }

    fn end_frame(&mut self) -> Result<()> {
        let frame = self.frame.take().ok_or_else(no_frame)?;
        self.context.queue.submit(std::iter::once(frame.encoder.finish()));
        frame.output.present();
        Ok(())
    }
}

fn create_depth_view(device: &wgpu::Device, config: &wgpu::SurfaceConfiguration) -> wgpu::TextureView {
    let texture = device.create_texture(&wgpu::TextureDescriptor {
        label: Some("Depth Texture"),
        size: wgpu::Extent3d {
            width: config.width,
            height: config.height,
            depth_or_array_layers: 1,
        },
        mip_level_count: 1,
        sample_count: 1,
        dimension: wgpu::TextureDimension::D2,
        format: DEPTH_FORMAT,
        usage: wgpu::TextureUsages::RENDER_ATTACHMENT,
        view_formats: &[],
    });
    texture.create_view(&wgpu::TextureViewDescriptor::default())
}

fn create_pipelines(
    context: &GpuContext,
    camera_layout: &wgpu::BindGroupLayout,
    image_layout: &wgpu::BindGroupLayout,
    format: wgpu::TextureFormat,
    config: &RenderConfig,
) -> Pipelines {
    let scene_shader = context.create_shader_module("scene shader", include_str!("shaders/scene.wgsl"));
    let image_shader = context.create_shader_module("image shader", include_str!("shaders/image.wgsl"));

    let scene_layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("scene pipeline layout"),
        bind_group_layouts: &[camera_layout],
        push_constant_ranges: &[],
    });
    let image_pipeline_layout = context.device.create_pipeline_layout(&wgpu::PipelineLayoutDescriptor {
        label: Some("image pipeline layout"),
        bind_group_layouts: &[image_layout],
        push_constant_ranges: &[],
    });

    // Every scene pass carries a depth attachment, so with depth testing off
    // the pipelines still declare one and simply never reject
    let depth_stencil = Some(wgpu::DepthStencilState {
        format: DEPTH_FORMAT,
        depth_write_enabled: config.enable_depth_test,
        depth_compare: if config.enable_depth_test {
            wgpu::CompareFunction::Less
        } else {
            wgpu::CompareFunction::Always
        },
        stencil: wgpu::StencilState::default(),
        bias: wgpu::DepthBiasState::default(),
    });

    let scene = |label: &str,
                 entry_point: &str,
                 buffer: wgpu::VertexBufferLayout<'static>,
                 topology: wgpu::PrimitiveTopology| {
        create_pipeline(
            context,
            PipelineDesc {
                label,
                layout: &scene_layout,
                shader: &scene_shader,
                entry_point,
                buffers: &[buffer],
                topology,
                format,
                depth_stencil: depth_stencil.clone(),
            },
        )
    };

    Pipelines {
        points: scene(
            "points pipeline",
            "vs_points",
            PointVertex::desc(),
            wgpu::PrimitiveTopology::TriangleList,
        ),
        lines: scene(
            "lines pipeline",
            "vs_main",
            ColorVertex::desc(),
            wgpu::PrimitiveTopology::LineList,
        ),
        triangles: scene(
            "triangles pipeline",
            "vs_main",
            ColorVertex::desc(),
            wgpu::PrimitiveTopology::TriangleList,
        ),
        image: create_pipeline(
            context,
            PipelineDesc {
                label: "image pipeline",
                layout: &image_pipeline_layout,
                shader: &image_shader,
                entry_point: "vs_main",
                buffers: &[],
                topology: wgpu::PrimitiveTopology::TriangleList,
                format,
                depth_stencil: None,
            },
        ),
    }
}

struct PipelineDesc<'a> {
    label: &'a str,
    layout: &'a wgpu::PipelineLayout,
    shader: &'a wgpu::ShaderModule,
    entry_point: &'a str,
    buffers: &'a [wgpu::VertexBufferLayout<'a>],
    topology: wgpu::PrimitiveTopology,
    format: wgpu::TextureFormat,
    depth_stencil: Option<wgpu::DepthStencilState>,
}

fn create_pipeline(context: &GpuContext, desc: PipelineDesc<'_>) -> wgpu::RenderPipeline {
    context.device.create_render_pipeline(&wgpu::RenderPipelineDescriptor {
        label: Some(desc.label),
        layout: Some(desc.layout),
        vertex: wgpu::VertexState {
            module: desc.shader,
            entry_point: desc.entry_point,
            buffers: desc.buffers,
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        },
        fragment: Some(wgpu::FragmentState {
            module: desc.shader,
            entry_point: "fs_main",
            targets: &[Some(wgpu::ColorTargetState {
                format: desc.format,
                blend: Some(wgpu::BlendState::REPLACE),
                write_mask: wgpu::ColorWrites::ALL,
            })],
            compilation_options: wgpu::PipelineCompilationOptions::default(),
        }),
        primitive: wgpu::PrimitiveState {
            topology: desc.topology,
            strip_index_format: None,
            front_face: wgpu::FrontFace::Ccw,
            cull_mode: None,
            unclipped_depth: false,
            polygon_mode: wgpu::PolygonMode::Fill,
            conservative: false,
        },
        depth_stencil: desc.depth_stencil,
        multisample: wgpu::MultisampleState {
            count: 1,
            mask: !0,
            alpha_to_coverage_enabled: false,
        },
        multiview: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_config_defaults_fill_missing_fields() {
        let config: RenderConfig = serde_json::from_str(r#"{"vsync": false}"#).unwrap();
        assert!(!config.vsync);
        assert!(config.enable_depth_test);
        assert!(config.high_performance);
    }

    #[test]
    fn test_pixel_area_inside_canvas() {
        let area = PixelArea::clip(ViewportRect::new(800.0, 0.0, 400.0, 266.7), (1200, 800)).unwrap();
        assert_eq!(
            area,
            PixelArea {
                x: 800,
                y: 0,
                width: 400,
                height: 266
            }
        );
    }

    #[test]
    fn test_pixel_area_clipped_to_canvas() {
        let area = PixelArea::clip(ViewportRect::new(-10.0, 700.0, 300.0, 300.0), (1200, 800)).unwrap();
        assert_eq!(area.x, 0);
        assert_eq!(area.width, 290);
        assert_eq!(area.y, 700);
        assert_eq!(area.height, 100);
    }

    #[test]
    fn test_pixel_area_outside_canvas() {
        assert!(PixelArea::clip(ViewportRect::new(1300.0, 0.0, 100.0, 100.0), (1200, 800)).is_none());
        assert!(PixelArea::clip(ViewportRect::new(0.0, 0.0, 0.5, 100.0), (1200, 800)).is_none());
        assert!(PixelArea::clip(ViewportRect::new(0.0, 0.0, f32::NAN, 100.0), (1200, 800)).is_none());
    }
}
