//! Viewport description shared by the render loop and render backends

use crate::point::Point3f;
use nalgebra::Matrix4;

/// Pixel rectangle with the origin at the top-left corner of the canvas
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportRect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl ViewportRect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn aspect_ratio(&self) -> f32 {
        if self.height <= 0.0 {
            return 1.0;
        }
        self.width / self.height
    }

    pub fn is_empty(&self) -> bool {
        self.width < 1.0 || self.height < 1.0
    }

    /// Largest rectangle with `aspect` (width / height) centred inside `self`
    pub fn fit_aspect(&self, aspect: f32) -> ViewportRect {
        if aspect <= 0.0 || !aspect.is_finite() || self.is_empty() {
            return *self;
        }
        let (width, height) = if self.aspect_ratio() > aspect {
            (self.height * aspect, self.height)
        } else {
            (self.width, self.width / aspect)
        };
        ViewportRect::new(
            self.x + (self.width - width) / 2.0,
            self.y + (self.height - height) / 2.0,
            width,
            height,
        )
    }
}

/// View and projection of the camera a viewport is rendered with
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraMatrices {
    pub view: Matrix4<f32>,
    pub projection: Matrix4<f32>,
    pub position: Point3f,
}

impl CameraMatrices {
    pub fn view_projection(&self) -> Matrix4<f32> {
        self.projection * self.view
    }
}

/// One render pass of a frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewportSpec {
    pub rect: ViewportRect,
    pub camera: CameraMatrices,
    /// Clear depth before drawing this pass
    pub clear: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_fit_aspect_letterboxes_wide_image() {
        let slot = ViewportRect::new(100.0, 50.0, 300.0, 300.0);
        let fitted = slot.fit_aspect(1.5);
        assert_relative_eq!(fitted.width, 300.0);
        assert_relative_eq!(fitted.height, 200.0);
        assert_relative_eq!(fitted.x, 100.0);
        assert_relative_eq!(fitted.y, 100.0);
    }

    #[test]
    fn test_fit_aspect_pillarboxes_tall_image() {
        let slot = ViewportRect::new(0.0, 0.0, 400.0, 200.0);
        let fitted = slot.fit_aspect(0.5);
        assert_relative_eq!(fitted.width, 100.0);
        assert_relative_eq!(fitted.height, 200.0);
        assert_relative_eq!(fitted.x, 150.0);
    }

    #[test]
    fn test_fit_aspect_ignores_degenerate_aspect() {
        let slot = ViewportRect::new(0.0, 0.0, 10.0, 10.0);
        assert_eq!(slot.fit_aspect(0.0), slot);
        assert_eq!(slot.fit_aspect(f32::NAN), slot);
    }
}
