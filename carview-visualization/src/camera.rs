//! Primary orbit camera

use carview_core::CameraMatrices;
use nalgebra::{Matrix4, Perspective3, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// Keeps the orbit away from the poles where `look_at` degenerates
const POLE_EPSILON: f32 = 1e-3;

/// OpenGL-style perspective projection; `fov` in degrees.
///
/// A zero or non-finite aspect (a collapsed viewport) falls back to square
/// and coincident clip planes are pushed apart, since nalgebra asserts on both.
pub fn perspective(aspect: f32, fov: f32, near: f32, far: f32) -> Matrix4<f32> {
    let aspect = if aspect.is_finite() && aspect > f32::EPSILON { aspect } else { 1.0 };
    let far = if (far - near).abs() > f32::EPSILON { far } else { near + 1.0 };
    Perspective3::new(aspect, fov.to_radians(), near, far).into_inner()
}

/// A perspective camera looking at a target point
#[derive(Debug, Clone, PartialEq)]
pub struct Camera {
    pub position: Point3<f32>,
    pub target: Point3<f32>,
    pub up: Vector3<f32>,
    /// Vertical field of view in degrees
    pub fov: f32,
    pub aspect_ratio: f32,
    pub near: f32,
    pub far: f32,
}

impl Camera {
    /// Create a new camera
    pub fn new(
        position: Point3<f32>,
        target: Point3<f32>,
        up: Vector3<f32>,
        fov: f32,
        aspect_ratio: f32,
        near: f32,
        far: f32,
    ) -> Self {
        Self {
            position,
            target,
            up,
            fov,
            aspect_ratio,
            near,
            far,
        }
    }

    /// Get the view matrix
    pub fn view_matrix(&self) -> Matrix4<f32> {
        Matrix4::look_at_rh(&self.position, &self.target, &self.up)
    }

    /// Get the projection matrix
    pub fn projection_matrix(&self) -> Matrix4<f32> {
        perspective(self.aspect_ratio, self.fov, self.near, self.far)
    }

    pub fn matrices(&self) -> CameraMatrices {
        CameraMatrices {
            view: self.view_matrix(),
            projection: self.projection_matrix(),
            position: self.position,
        }
    }

    pub fn distance(&self) -> f32 {
        (self.position - self.target).norm()
    }

    /// Rotate the camera around the target.
    ///
    /// `horizontal` spins about the up axis, `vertical` tilts towards or away
    /// from it. Both are in radians.
    pub fn orbit(&mut self, horizontal: f32, vertical: f32) {
        // Work in a frame where `up` is +z
        let to_z_up = UnitQuaternion::rotation_between(&self.up, &Vector3::z()).unwrap_or_else(UnitQuaternion::identity);
        let offset = to_z_up * (self.position - self.target);
        let radius = offset.norm();
        if radius <= f32::EPSILON {
            return;
        }

        let azimuth = offset.y.atan2(offset.x) - horizontal;
        let polar = ((offset.z / radius).clamp(-1.0, 1.0).acos() - vertical).clamp(POLE_EPSILON, PI - POLE_EPSILON);

        let rotated = Vector3::new(
            radius * polar.sin() * azimuth.cos(),
            radius * polar.sin() * azimuth.sin(),
            radius * polar.cos(),
        );
        self.position = self.target + to_z_up.inverse() * rotated;
    }

    /// Slide camera and target in the view plane.
    ///
    /// Offsets are fractions of the distance to the target, so panning feels
    /// the same at any zoom level.
    pub fn pan(&mut self, right: f32, up: f32) {
        let forward = self.target - self.position;
        let distance = forward.norm();
        let Some(forward) = forward.try_normalize(f32::EPSILON) else {
            return;
        };
        let Some(screen_right) = forward.cross(&self.up).try_normalize(f32::EPSILON) else {
            return;
        };
        let screen_up = screen_right.cross(&forward);

        let shift = (screen_right * -right + screen_up * up) * distance;
        self.position += shift;
        self.target += shift;
    }

    /// Dolly towards the target; positive `amount` moves closer
    pub fn zoom(&mut self, amount: f32, min_distance: f32, max_distance: f32) {
        let offset = self.position - self.target;
        let distance = offset.norm();
        if distance <= f32::EPSILON {
            return;
        }
        let new_distance = (distance * (-amount).exp()).clamp(min_distance, max_distance);
        self.position = self.target + offset * (new_distance / distance);
    }
}

/// Starting pose and lens of the primary camera
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MainCameraConfig {
    pub position: [f32; 3],
    pub target: [f32; 3],
    pub fov: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for MainCameraConfig {
    fn default() -> Self {
        Self {
            position: [-20.0, 0.0, 15.0],
            target: [0.0, 0.0, 0.0],
            fov: 55.0,
            near: 2.0,
            far: 10000.0,
        }
    }
}

impl MainCameraConfig {
    pub fn build(&self) -> Camera {
        Camera::new(
            Point3::from(self.position),
            Point3::from(self.target),
            Vector3::z(),
            self.fov,
            1.0,
            self.near,
            self.far,
        )
    }
}

/// Mouse sensitivity of the orbit controls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrbitConfig {
    /// Radians per pixel of drag
    pub rotate_speed: f32,
    /// Fraction of the target distance per pixel of drag
    pub pan_speed: f32,
    /// Zoom exponent per scroll line
    pub zoom_speed: f32,
    pub min_distance: f32,
    pub max_distance: f32,
}

impl Default for OrbitConfig {
    fn default() -> Self {
        Self {
            rotate_speed: 0.005,
            pan_speed: 0.001,
            zoom_speed: 0.1,
            min_distance: 1.0,
            max_distance: 5000.0,
        }
    }
}

/// Accumulates pointer input between ticks and applies it to a camera
#[derive(Debug, Clone)]
pub struct OrbitControls {
    config: OrbitConfig,
    home: (Point3<f32>, Point3<f32>),
    rotate: (f32, f32),
    pan: (f32, f32),
    zoom: f32,
    reset: bool,
}

impl OrbitControls {
    /// Controls whose reset returns `camera` to its current pose
    pub fn new(config: OrbitConfig, camera: &Camera) -> Self {
        Self {
            config,
            home: (camera.position, camera.target),
            rotate: (0.0, 0.0),
            pan: (0.0, 0.0),
            zoom: 0.0,
            reset: false,
        }
    }

    /// Pointer dragged with the rotate button, in pixels
    pub fn rotate(&mut self, dx: f32, dy: f32) {
        self.rotate.0 += dx;
        self.rotate.1 += dy;
    }

    /// Pointer dragged with the pan button, in pixels
    pub fn pan(&mut self, dx: f32, dy: f32) {
        self.pan.0 += dx;
        self.pan.1 += dy;
    }

    /// Scroll in lines; positive zooms in
    pub fn scroll(&mut self, lines: f32) {
        self.zoom += lines;
    }

    pub fn request_reset(&mut self) {
        self.reset = true;
    }

    pub fn has_pending(&self) -> bool {
        self.reset || self.rotate != (0.0, 0.0) || self.pan != (0.0, 0.0) || self.zoom != 0.0
    }

    /// Apply and clear the accumulated input; returns whether the camera moved
    pub fn update(&mut self, camera: &mut Camera) -> bool {
        if !self.has_pending() {
            return false;
        }

        if std::mem::take(&mut self.reset) {
            camera.position = self.home.0;
            camera.target = self.home.1;
        }

        let (dx, dy) = std::mem::take(&mut self.rotate);
        if dx != 0.0 || dy != 0.0 {
            camera.orbit(dx * self.config.rotate_speed, dy * self.config.rotate_speed);
        }

        let (dx, dy) = std::mem::take(&mut self.pan);
        if dx != 0.0 || dy != 0.0 {
            camera.pan(dx * self.config.pan_speed, dy * self.config.pan_speed);
        }

        let zoom = std::mem::take(&mut self.zoom);
        if zoom != 0.0 {
            camera.zoom(
                zoom * self.config.zoom_speed,
                self.config.min_distance,
                self.config.max_distance,
            );
        }
        true
    }
}
