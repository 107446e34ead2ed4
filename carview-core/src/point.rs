//! Point types and related functionality

use nalgebra::{Point3, Vector3};
use serde::{Deserialize, Serialize};

/// A 3D point with floating point coordinates
pub type Point3f = Point3<f32>;

/// A 3D vector with floating point components
pub type Vector3f = Vector3<f32>;

/// A lidar return in the vehicle frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LidarPoint {
    pub position: Point3f,
    pub intensity: Option<f32>,
}

impl LidarPoint {
    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self {
            position: Point3f::new(x, y, z),
            intensity: None,
        }
    }

    pub fn with_intensity(mut self, intensity: f32) -> Self {
        self.intensity = Some(intensity);
        self
    }
}

impl Default for LidarPoint {
    fn default() -> Self {
        Self {
            position: Point3f::origin(),
            intensity: None,
        }
    }
}

impl From<LidarPoint> for Point3f {
    fn from(point: LidarPoint) -> Self {
        point.position
    }
}

/// Linear RGB colour with components in `[0, 1]`
pub type Rgb = [f32; 3];

/// Convert a `0xRRGGBB` hex colour into linear components
pub const fn hex_to_rgb(hex: u32) -> Rgb {
    [
        ((hex >> 16) & 0xff) as f32 / 255.0,
        ((hex >> 8) & 0xff) as f32 / 255.0,
        (hex & 0xff) as f32 / 255.0,
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hex_to_rgb() {
        assert_eq!(hex_to_rgb(0xff0000), [1.0, 0.0, 0.0]);
        assert_eq!(hex_to_rgb(0x00ff00), [0.0, 1.0, 0.0]);
        let grey = hex_to_rgb(0x222222);
        assert!((grey[0] - 34.0 / 255.0).abs() < 1e-6);
    }

    #[test]
    fn test_lidar_point_intensity() {
        let p = LidarPoint::new(1.0, 2.0, 3.0);
        assert_eq!(p.intensity, None);
        let p = p.with_intensity(0.5);
        assert_eq!(p.intensity, Some(0.5));
        assert_eq!(Point3f::from(p), Point3f::new(1.0, 2.0, 3.0));
    }
}
