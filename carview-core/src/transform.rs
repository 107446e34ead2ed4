//! Rigid transforms in the vehicle frame
//!
//! The vehicle frame has +x forward, +y left and +z up. All poses are stored
//! as column-vector homogeneous matrices (`p' = M * p`).

use nalgebra::{Matrix4, Point3, UnitQuaternion, Vector3};
use serde::{Deserialize, Serialize};
use std::f32::consts::PI;

/// A 3D transformation that can be applied to points and scene nodes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform3D {
    pub matrix: Matrix4<f32>,
}

impl Transform3D {
    /// Create an identity transformation
    pub fn identity() -> Self {
        Self {
            matrix: Matrix4::identity(),
        }
    }

    /// Create a translation transformation
    pub fn translation(translation: Vector3<f32>) -> Self {
        Self {
            matrix: Matrix4::new_translation(&translation),
        }
    }

    /// Create a rotation transformation from a quaternion
    pub fn rotation(rotation: UnitQuaternion<f32>) -> Self {
        Self {
            matrix: rotation.to_homogeneous(),
        }
    }

    /// Rotation of `angle` radians about the vertical (+z) axis
    pub fn rotation_z(angle: f32) -> Self {
        Self::rotation(UnitQuaternion::from_axis_angle(&Vector3::z_axis(), angle))
    }

    /// Ingest a 16-element matrix stored row by row.
    ///
    /// The elements are first laid out as columns, the way a column-major
    /// consumer would alias them, and then transposed. Element `e[r * 4 + c]`
    /// ends up at row `r`, column `c`; the translation lives in `e[3]`,
    /// `e[7]` and `e[11]`.
    pub fn from_row_major(elements: &[f32; 16]) -> Self {
        let aliased = Matrix4::from_column_slice(elements);
        Self {
            matrix: aliased.transpose(),
        }
    }

    /// Same as [`Transform3D::from_row_major`] for an unchecked slice
    pub fn try_from_row_major(elements: &[f32]) -> Option<Self> {
        let elements: &[f32; 16] = elements.try_into().ok()?;
        Some(Self::from_row_major(elements))
    }

    /// Apply the transformation to a point
    pub fn transform_point(&self, point: &Point3<f32>) -> Point3<f32> {
        let homogeneous = self.matrix * point.to_homogeneous();
        Point3::from_homogeneous(homogeneous).unwrap_or(*point)
    }

    /// Apply the transformation to a direction (translation ignored)
    pub fn transform_vector(&self, vector: &Vector3<f32>) -> Vector3<f32> {
        self.matrix.fixed_view::<3, 3>(0, 0) * vector
    }

    /// Compose this transformation with another (`self` applied last)
    pub fn compose(self, other: Self) -> Self {
        Self {
            matrix: self.matrix * other.matrix,
        }
    }

    /// Get the inverse transformation
    pub fn inverse(self) -> Option<Self> {
        self.matrix
            .try_inverse()
            .map(|inv_matrix| Self { matrix: inv_matrix })
    }

    /// Translation component
    pub fn position(&self) -> Point3<f32> {
        Point3::new(self.matrix[(0, 3)], self.matrix[(1, 3)], self.matrix[(2, 3)])
    }

    /// Rotation about +z, normalized to `[-π, π)`
    pub fn yaw(&self) -> f32 {
        normalize_angle(self.matrix[(1, 0)].atan2(self.matrix[(0, 0)]))
    }
}

impl Default for Transform3D {
    fn default() -> Self {
        Self::identity()
    }
}

impl std::ops::Mul for Transform3D {
    type Output = Self;

    fn mul(self, rhs: Self) -> Self::Output {
        self.compose(rhs)
    }
}

impl From<Matrix4<f32>> for Transform3D {
    fn from(matrix: Matrix4<f32>) -> Self {
        Self { matrix }
    }
}

/// Wrap an angle in radians into `[-π, π)`
pub fn normalize_angle(angle: f32) -> f32 {
    let wrapped = (angle + PI).rem_euclid(2.0 * PI) - PI;
    // rem_euclid can round up to exactly 2π for tiny negative inputs
    if wrapped >= PI {
        wrapped - 2.0 * PI
    } else {
        wrapped
    }
}
