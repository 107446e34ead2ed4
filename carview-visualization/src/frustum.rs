//! Virtual cameras built from calibration records
//!
//! A calibrated camera becomes two things: a [`VirtualCamera`] the secondary
//! viewport renders with, and a wireframe frustum drawn in the main view.
//! Both are derived from explicit matrices: the extrinsic (camera to
//! vehicle) is the parent pose, and a fixed basis change inside it turns the
//! camera's optical axis (+x) and up vector (+z) into the `-z` forward,
//! `+y` up convention the projection expects.

use carview_core::{
    hex_to_rgb, CameraCalibration, CameraMatrices, CameraName, Error, LineSet, ObjectId, Point3f, Renderable, Result,
    Rgb, SceneObject, Transform3D,
};
use crate::camera::perspective;
use nalgebra::Matrix4;

/// Half the pixel width of the recorded camera images
pub const HALF_IMAGE_WIDTH_PX: f32 = 960.0;

pub const FRUSTUM_NEAR: f32 = 0.5;
pub const FRUSTUM_FAR: f32 = 30.0;

pub const FRUSTUM_COLOR: Rgb = hex_to_rgb(0xffaa00);

/// Focal lengths closer to zero than this are treated as missing
const MIN_FOCAL_LENGTH: f32 = 1e-6;

/// Maps camera-local `-z` forward / `+y` up onto vehicle `+x` forward / `+z` up
fn camera_basis() -> Transform3D {
    // Columns: right = -y, up = +z, back = -x
    Transform3D::from(Matrix4::new(
        0.0, 0.0, -1.0, 0.0, //
        -1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ))
}

/// Perspective camera mounted on the vehicle
#[derive(Debug, Clone, PartialEq)]
pub struct VirtualCamera {
    pub name: CameraName,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
    /// Extrinsic pose of the node the camera is attached to
    pub parent_pose: Transform3D,
    /// Camera pose inside its parent
    pub local_pose: Transform3D,
    view: Matrix4<f32>,
}

impl VirtualCamera {
    /// Camera-to-vehicle transform
    pub fn world_transform(&self) -> Transform3D {
        self.parent_pose * self.local_pose
    }

    pub fn view_matrix(&self) -> Matrix4<f32> {
        self.view
    }

    pub fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(self.aspect_ratio, self.fov, self.near, self.far)
    }

    pub fn matrices(&self) -> CameraMatrices {
        CameraMatrices {
            view: self.view,
            projection: self.projection_matrix(),
            position: self.world_transform().position(),
        }
    }

    /// Near and far rectangles in camera-local coordinates
    fn clip_corners(&self) -> [[Point3f; 4]; 2] {
        let half_fov = (self.fov / 2.0).to_radians();
        [self.near, self.far].map(|depth| {
            let half_height = depth * half_fov.tan();
            let half_width = half_height * self.aspect_ratio;
            [
                Point3f::new(-half_width, -half_height, -depth),
                Point3f::new(half_width, -half_height, -depth),
                Point3f::new(half_width, half_height, -depth),
                Point3f::new(-half_width, half_height, -depth),
            ]
        })
    }

    /// Wireframe of the viewing volume, posed in the vehicle frame
    pub fn frustum_visual(&self) -> SceneObject {
        let [near, far] = self.clip_corners();
        let apex = Point3f::origin();

        let mut lines = LineSet::default();
        for i in 0..4 {
            let j = (i + 1) % 4;
            lines.push_segment(near[i], near[j], FRUSTUM_COLOR);
            lines.push_segment(far[i], far[j], FRUSTUM_COLOR);
            lines.push_segment(near[i], far[i], FRUSTUM_COLOR);
            lines.push_segment(apex, near[i], FRUSTUM_COLOR);
        }

        SceneObject::new(ObjectId::frustum(self.name), Renderable::Lines(lines), self.world_transform())
    }
}

/// Build the virtual camera and frustum visual of one calibration.
///
/// Fails with [`Error::InvalidCalibration`] when a focal length is zero or
/// not finite, or when the extrinsic is singular; the caller skips that
/// camera.
pub fn build_camera(calibration: &CameraCalibration) -> Result<(VirtualCamera, SceneObject)> {
    let name = calibration.name;
    let intrinsics = &calibration.intrinsics;

    for (label, value) in [("fv", intrinsics.fv), ("fu", intrinsics.fu)] {
        if !value.is_finite() || value.abs() < MIN_FOCAL_LENGTH {
            return Err(Error::InvalidCalibration(format!(
                "camera {}: focal length {} is {}",
                name, label, value
            )));
        }
    }

    let fov = intrinsics.fv.atan2(HALF_IMAGE_WIDTH_PX).to_degrees();
    let aspect_ratio = intrinsics.fu / intrinsics.fv;

    let parent_pose = calibration.extrinsic;
    let local_pose = camera_basis();
    let view = (parent_pose * local_pose)
        .inverse()
        .ok_or_else(|| Error::InvalidCalibration(format!("camera {}: extrinsic is not invertible", name)))?
        .matrix;

    let camera = VirtualCamera {
        name,
        fov,
        aspect_ratio,
        near: FRUSTUM_NEAR,
        far: FRUSTUM_FAR,
        parent_pose,
        local_pose,
        view,
    };
    let visual = camera.frustum_visual();
    Ok((camera, visual))
}
