//! CPU-side preparation of scene objects for upload
//!
//! Scene objects are immutable, so their vertices are baked into the
//! vehicle frame once (pose applied) and cached on the GPU by object id.

use bytemuck::{Pod, Zeroable};
use carview_core::{CameraMatrices, Renderable, Rgb, SceneObject};
use nalgebra::Matrix4;

/// nalgebra projections produce OpenGL clip depth in `[-1, 1]`; wgpu wants `[0, 1]`
#[rustfmt::skip]
pub fn opengl_to_wgpu() -> Matrix4<f32> {
    Matrix4::new(
        1.0, 0.0, 0.0, 0.0,
        0.0, 1.0, 0.0, 0.0,
        0.0, 0.0, 0.5, 0.5,
        0.0, 0.0, 0.0, 1.0,
    )
}

/// Intensity-shaded points never go darker than this fraction of their colour
const MIN_INTENSITY_SHADE: f32 = 0.35;

/// Vertex of lines and surfaces
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct ColorVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
}

impl ColorVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 2] = wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3];

    /// Vertex buffer layout descriptor
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<ColorVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Vertex,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// One lidar return, expanded to a screen-space quad by the vertex shader
#[repr(C)]
#[derive(Debug, Copy, Clone, PartialEq, Pod, Zeroable)]
pub struct PointVertex {
    pub position: [f32; 3],
    pub color: [f32; 3],
    /// Quad edge in pixels
    pub size: f32,
}

impl PointVertex {
    const ATTRIBUTES: [wgpu::VertexAttribute; 3] =
        wgpu::vertex_attr_array![0 => Float32x3, 1 => Float32x3, 2 => Float32];

    /// Instance buffer layout descriptor
    pub fn desc() -> wgpu::VertexBufferLayout<'static> {
        wgpu::VertexBufferLayout {
            array_stride: std::mem::size_of::<PointVertex>() as wgpu::BufferAddress,
            step_mode: wgpu::VertexStepMode::Instance,
            attributes: &Self::ATTRIBUTES,
        }
    }
}

/// How a vertex list is assembled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Topology {
    Points,
    Lines,
    Triangles,
}

/// Baked vertices of one scene object
#[derive(Debug, Clone, PartialEq)]
pub enum ObjectGeometry {
    Points(Vec<PointVertex>),
    Lines(Vec<ColorVertex>),
    Triangles(Vec<ColorVertex>),
}

impl ObjectGeometry {
    pub fn topology(&self) -> Topology {
        match self {
            ObjectGeometry::Points(_) => Topology::Points,
            ObjectGeometry::Lines(_) => Topology::Lines,
            ObjectGeometry::Triangles(_) => Topology::Triangles,
        }
    }

    /// Vertices, or point instances
    pub fn len(&self) -> usize {
        match self {
            ObjectGeometry::Points(v) => v.len(),
            ObjectGeometry::Lines(v) | ObjectGeometry::Triangles(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            ObjectGeometry::Points(v) => bytemuck::cast_slice(v),
            ObjectGeometry::Lines(v) | ObjectGeometry::Triangles(v) => bytemuck::cast_slice(v),
        }
    }
}

/// sRGB-encoded colour channel to linear
pub fn srgb_to_linear(c: f32) -> f32 {
    if c <= 0.04045 {
        c / 12.92
    } else {
        ((c + 0.055) / 1.055).powf(2.4)
    }
}

pub fn linear_rgb(color: Rgb) -> Rgb {
    color.map(srgb_to_linear)
}

fn shade(color: Rgb, intensity: Option<f32>) -> Rgb {
    match intensity {
        Some(i) => {
            let factor = MIN_INTENSITY_SHADE + (1.0 - MIN_INTENSITY_SHADE) * i.clamp(0.0, 1.0);
            color.map(|c| c * factor)
        }
        None => color,
    }
}

/// Bake an object's payload into vehicle-frame vertices.
///
/// `linear` converts colours for an sRGB render target.
pub fn object_geometry(object: &SceneObject, linear: bool) -> ObjectGeometry {
    let convert = |color: Rgb| if linear { linear_rgb(color) } else { color };
    let pose = &object.pose;

    match &object.payload {
        Renderable::Points(points) => ObjectGeometry::Points(
            points
                .cloud
                .iter()
                .map(|p| PointVertex {
                    position: pose.transform_point(&p.position).coords.into(),
                    color: convert(shade(points.color, p.intensity)),
                    size: points.point_size,
                })
                .collect(),
        ),
        Renderable::Lines(lines) => ObjectGeometry::Lines(
            lines
                .vertices
                .iter()
                .zip(&lines.colors)
                .map(|(v, c)| ColorVertex {
                    position: pose.transform_point(v).coords.into(),
                    color: convert(*c),
                })
                .collect(),
        ),
        Renderable::Surface(surface) => {
            let color = convert(surface.color);
            ObjectGeometry::Triangles(
                surface
                    .vertices
                    .iter()
                    .map(|v| ColorVertex {
                        position: pose.transform_point(v).coords.into(),
                        color,
                    })
                    .collect(),
            )
        }
    }
}

/// Per-pass uniform of the scene shader
#[repr(C)]
#[derive(Debug, Copy, Clone, Pod, Zeroable)]
pub struct CameraUniform {
    pub view_proj: [[f32; 4]; 4],
    /// Viewport size in pixels
    pub viewport: [f32; 2],
    pub _padding: [f32; 2],
}

impl CameraUniform {
    pub fn new(camera: &CameraMatrices, viewport: [f32; 2]) -> Self {
        Self {
            view_proj: (opengl_to_wgpu() * camera.view_projection()).into(),
            viewport,
            _padding: [0.0; 2],
        }
    }
}
