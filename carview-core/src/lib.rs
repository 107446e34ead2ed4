//! Core data structures for carview
//!
//! This crate provides the fundamental types shared by the viewer crates:
//! points and point clouds, rigid transforms in the vehicle frame, sensor
//! and label enums, the calibration/label records decoded from a frame
//! descriptor, scene objects, and the [`RenderBackend`] seam between the
//! render loop and a GPU implementation.

#[macro_use]
mod macros;

pub mod point;
pub mod point_cloud;
pub mod traits;
pub mod transform;
pub mod sensor;
pub mod record;
pub mod scene;
pub mod viewport;
pub mod error;

pub use point::*;
pub use point_cloud::*;
pub use traits::*;
pub use transform::*;
pub use sensor::*;
pub use record::*;
pub use scene::*;
pub use viewport::*;
pub use error::*;

/// Re-export commonly used types from nalgebra
pub use nalgebra::{Point3, Vector3, Matrix4, UnitQuaternion};

// Type aliases for easier imports
pub type Point = Point3f;
pub type LidarCloud = PointCloud<LidarPoint>;
