//! # carview GPU
//!
//! wgpu render backend for carview scenes.
//!
//! [`SceneRenderer`] implements [`carview_core::RenderBackend`]: each frame it
//! clears the window once and then draws any number of viewports, each with
//! its own camera, plus textured image overlays. Scene objects are baked to
//! vehicle-frame vertices on first sight and their buffers reused afterwards.

pub mod device;
pub mod geometry;
pub mod renderer;

pub use device::GpuContext;
pub use geometry::{
    linear_rgb, object_geometry, opengl_to_wgpu, srgb_to_linear, CameraUniform, ColorVertex, ObjectGeometry,
    PointVertex, Topology,
};
pub use renderer::{PixelArea, RenderConfig, SceneRenderer};
