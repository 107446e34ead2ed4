//! Scene objects
//!
//! A [`SceneObject`] is an immutable, addable/removable visual node. Its
//! payload is shared behind an `Arc` by whoever holds it, so hiding and
//! re-showing an object never copies geometry.

use crate::point::{LidarPoint, Point3f, Rgb};
use crate::point_cloud::PointCloud;
use crate::sensor::{CameraName, HelperName, LidarName};
use crate::transform::Transform3D;
use std::fmt;

named_enum!(
    /// Scene category an object belongs to
    Category {
        Lidar => "LIDAR",
        CameraFrustum => "CAMERA_FRUSTUM",
        Label => "LABEL",
        Helper => "HELPER",
        Static => "STATIC",
    }
);

/// Identity of a scene object; unique within its category
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId {
    pub category: Category,
    pub name: String,
}

impl ObjectId {
    pub fn new(category: Category, name: impl Into<String>) -> Self {
        Self {
            category,
            name: name.into(),
        }
    }

    pub fn lidar(lidar: LidarName) -> Self {
        Self::new(Category::Lidar, lidar.as_str())
    }

    pub fn frustum(camera: CameraName) -> Self {
        Self::new(Category::CameraFrustum, camera.as_str())
    }

    pub fn helper(helper: HelperName) -> Self {
        Self::new(Category::Helper, helper.as_str())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.category, self.name)
    }
}

/// Lidar returns drawn as screen-space points
#[derive(Debug, Clone)]
pub struct PointSet {
    pub cloud: PointCloud<LidarPoint>,
    pub color: Rgb,
    pub point_size: f32,
}

/// Line segments; `vertices[2 * i]` and `vertices[2 * i + 1]` form segment `i`
#[derive(Debug, Clone, Default)]
pub struct LineSet {
    pub vertices: Vec<Point3f>,
    pub colors: Vec<Rgb>,
}

impl LineSet {
    pub fn push_segment(&mut self, a: Point3f, b: Point3f, color: Rgb) {
        self.vertices.push(a);
        self.vertices.push(b);
        self.colors.push(color);
        self.colors.push(color);
    }

    pub fn segment_count(&self) -> usize {
        self.vertices.len() / 2
    }
}

/// Flat shaded triangle list
#[derive(Debug, Clone)]
pub struct Surface {
    pub vertices: Vec<Point3f>,
    pub color: Rgb,
}

/// Geometry carried by a scene object, in the object's local frame
#[derive(Debug, Clone)]
pub enum Renderable {
    Points(PointSet),
    Lines(LineSet),
    Surface(Surface),
}

/// A visual node placed in the vehicle frame
#[derive(Debug, Clone)]
pub struct SceneObject {
    pub id: ObjectId,
    pub payload: Renderable,
    /// Local-to-vehicle pose
    pub pose: Transform3D,
}

impl SceneObject {
    pub fn new(id: ObjectId, payload: Renderable, pose: Transform3D) -> Self {
        Self { id, payload, pose }
    }

    pub fn category(&self) -> Category {
        self.id.category
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_id_display() {
        assert_eq!(ObjectId::lidar(LidarName::Rear).to_string(), "LIDAR:REAR");
        assert_eq!(ObjectId::frustum(CameraName::SideLeft).to_string(), "CAMERA_FRUSTUM:SIDE_LEFT");
        assert_eq!(ObjectId::helper(HelperName::Axes).to_string(), "HELPER:AXES");
    }

    #[test]
    fn test_ids_are_unique_per_category() {
        let a = ObjectId::lidar(LidarName::Front);
        let b = ObjectId::frustum(CameraName::Front);
        assert_eq!(a.name, b.name);
        assert_ne!(a, b);
    }

    #[test]
    fn test_line_set_segments() {
        let mut lines = LineSet::default();
        lines.push_segment(Point3f::origin(), Point3f::new(1.0, 0.0, 0.0), [1.0, 0.0, 0.0]);
        assert_eq!(lines.segment_count(), 1);
        assert_eq!(lines.colors.len(), 2);
    }
}
