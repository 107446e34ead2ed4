//! Core traits for carview

use crate::error::Result;
use crate::record::CameraImage;
use crate::scene::SceneObject;
use crate::viewport::{ViewportRect, ViewportSpec};
use crate::{point::*, point_cloud::*};

/// A render target the render loop paints a frame into.
///
/// Calls arrive in frame order: `begin_frame`, `clear`, any number of
/// `render_viewport` and `draw_image` calls, then `end_frame`. An error from
/// one pass must leave the backend able to accept the next pass.
pub trait RenderBackend {
    /// Drawable size in physical pixels
    fn canvas_size(&self) -> (u32, u32);

    fn begin_frame(&mut self) -> Result<()>;

    /// Clear colour and depth of the whole target
    fn clear(&mut self, color: Rgb) -> Result<()>;

    /// Draw `objects` into `viewport.rect` with `viewport.camera`
    fn render_viewport(&mut self, objects: &[&SceneObject], viewport: &ViewportSpec) -> Result<()>;

    /// Draw a 2D image stretched over `rect`
    fn draw_image(&mut self, image: &CameraImage, rect: ViewportRect) -> Result<()>;

    fn end_frame(&mut self) -> Result<()>;
}

/// Trait for objects with a spatial extent
pub trait Drawable {
    /// Axis-aligned bounding box as `(min, max)`
    fn bounding_box(&self) -> (Point3f, Point3f);

    /// Get the center point of the object
    fn center(&self) -> Point3f {
        let (min, max) = self.bounding_box();
        nalgebra::center(&min, &max)
    }
}

impl<T> Drawable for PointCloud<T>
where
    T: Clone + Copy,
    Point3f: From<T>,
{
    fn bounding_box(&self) -> (Point3f, Point3f) {
        let mut points = self.points.iter().map(|p| Point3f::from(*p));
        let Some(first) = points.next() else {
            return (Point3f::origin(), Point3f::origin());
        };

        points.fold((first, first), |(min, max), p| (min.inf(&p), max.sup(&p)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bounding_box_of_lidar_cloud() {
        let cloud = PointCloud::from_points(vec![
            LidarPoint::new(-1.0, 2.0, 0.0),
            LidarPoint::new(3.0, -2.0, 1.0),
            LidarPoint::new(0.0, 0.0, 5.0),
        ]);
        let (min, max) = cloud.bounding_box();
        assert_eq!(min, Point3f::new(-1.0, -2.0, 0.0));
        assert_eq!(max, Point3f::new(3.0, 2.0, 5.0));
        assert_eq!(cloud.center(), Point3f::new(1.0, 0.0, 2.5));
    }

    #[test]
    fn test_bounding_box_of_empty_cloud() {
        let cloud: PointCloud<LidarPoint> = PointCloud::new();
        assert_eq!(cloud.bounding_box(), (Point3f::origin(), Point3f::origin()));
    }
}
