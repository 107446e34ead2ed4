//! Asset loading for carview
//!
//! This crate turns the raw files of a recorded frame into typed records:
//! - PCD lidar sweeps into point clouds
//! - camera images into RGBA buffers
//! - the frame descriptor JSON into calibrations and labels
//!
//! Fetching happens asynchronously through [`AssetLoader`].

pub mod pcd;
pub mod camera_image;
pub mod descriptor;
pub mod loader;

pub use pcd::decode_pcd;
pub use camera_image::decode_image;
pub use descriptor::parse_descriptor;
pub use loader::*;
