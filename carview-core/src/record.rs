//! Decoded sensor records of a single frame

use crate::error::{Error, Result};
use crate::point::{LidarPoint, Point3f, Vector3f};
use crate::point_cloud::PointCloud;
use crate::sensor::{CameraName, LabelType, LidarName};
use crate::transform::{normalize_angle, Transform3D};
use serde::{Deserialize, Serialize};

/// Pinhole intrinsics in the Waymo layout `[fv, fu, cv, cu, k1, k2, p1, p2, k3]`.
///
/// The distortion coefficients are carried along but nothing in the viewer
/// undistorts with them.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraIntrinsics {
    pub fv: f32,
    pub fu: f32,
    pub cv: f32,
    pub cu: f32,
    pub k1: f32,
    pub k2: f32,
    pub p1: f32,
    pub p2: f32,
    pub k3: f32,
}

impl CameraIntrinsics {
    pub const LEN: usize = 9;

    pub fn from_slice(values: &[f32]) -> Result<Self> {
        match *values {
            [fv, fu, cv, cu, k1, k2, p1, p2, k3] => Ok(Self { fv, fu, cv, cu, k1, k2, p1, p2, k3 }),
            _ => Err(Error::InvalidCalibration(format!(
                "expected {} intrinsic values, got {}",
                Self::LEN,
                values.len()
            ))),
        }
    }
}

/// Intrinsic and extrinsic calibration of one camera
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CameraCalibration {
    pub name: CameraName,
    pub intrinsics: CameraIntrinsics,
    /// Camera-to-vehicle pose, already transposed out of row-major order
    pub extrinsic: Transform3D,
}

impl CameraCalibration {
    /// Build a calibration from the raw descriptor arrays
    pub fn from_raw(name: CameraName, intrinsic: &[f32], extrinsic_row_major: &[f32]) -> Result<Self> {
        let intrinsics = CameraIntrinsics::from_slice(intrinsic)?;
        let extrinsic = Transform3D::try_from_row_major(extrinsic_row_major).ok_or_else(|| {
            Error::InvalidCalibration(format!(
                "expected 16 extrinsic values for camera {}, got {}",
                name,
                extrinsic_row_major.len()
            ))
        })?;
        Ok(Self {
            name,
            intrinsics,
            extrinsic,
        })
    }
}

/// A 3D box label in the vehicle frame
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Label {
    pub label_type: LabelType,
    pub center: Point3f,
    /// Length (x), width (y) and height (z) of the box
    pub extent: Vector3f,
    /// Yaw about +z in `[-π, π)`
    pub heading: f32,
}

impl Label {
    pub fn new(label_type: LabelType, center: Point3f, extent: Vector3f, heading: f32) -> Self {
        Self {
            label_type,
            center,
            extent,
            heading: normalize_angle(heading),
        }
    }
}

/// Points captured by one lidar
#[derive(Debug, Clone)]
pub struct SensorReading {
    pub lidar: LidarName,
    pub cloud: PointCloud<LidarPoint>,
}

/// Calibrations and labels decoded from a frame descriptor
#[derive(Debug, Clone, Default)]
pub struct FrameRecords {
    pub cameras: Vec<CameraCalibration>,
    pub labels: Vec<Label>,
}

/// A decoded camera frame in tightly packed RGBA8
#[derive(Debug, Clone, PartialEq)]
pub struct CameraImage {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl CameraImage {
    /// Width over height
    pub fn aspect_ratio(&self) -> f32 {
        if self.height == 0 {
            return 1.0;
        }
        self.width as f32 / self.height as f32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intrinsics_from_slice() {
        let values = [2000.0, 2010.0, 640.0, 960.0, 0.1, 0.2, 0.0, 0.0, 0.3];
        let k = CameraIntrinsics::from_slice(&values).unwrap();
        assert_eq!(k.fv, 2000.0);
        assert_eq!(k.fu, 2010.0);
        assert_eq!(k.k3, 0.3);
        assert!(CameraIntrinsics::from_slice(&values[..8]).is_err());
    }

    #[test]
    fn test_calibration_rejects_short_extrinsic() {
        let intrinsic = [1.0; 9];
        let err = CameraCalibration::from_raw(CameraName::Front, &intrinsic, &[0.0; 12]).unwrap_err();
        assert!(matches!(err, Error::InvalidCalibration(_)));
    }

    #[test]
    fn test_label_heading_is_normalized() {
        let label = Label::new(
            LabelType::Vehicle,
            Point3f::origin(),
            Vector3f::new(4.0, 2.0, 1.5),
            2.0 * std::f32::consts::PI + 0.5,
        );
        assert!((label.heading - 0.5).abs() < 1e-5);
    }
}
