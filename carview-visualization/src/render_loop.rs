//! Per-frame driver
//!
//! One tick drains finished loads, reconciles visibility, applies camera
//! input and then paints up to three viewports: the main view, the selected
//! camera's view in the right column, and that camera's image below it.
//! A failing pass is logged and the remaining passes still run.

use crate::camera::{Camera, OrbitControls};
use crate::config::ViewerConfig;
use crate::session::ViewerSession;
use carview_core::{hex_to_rgb, RenderBackend, Rgb, SceneObject, ViewportRect, ViewportSpec};

/// Share of the canvas width kept by the main view while a camera is selected
pub const MAIN_VIEW_FRACTION: f32 = 2.0 / 3.0;

/// Pixel rectangles of one frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FramePlan {
    pub main: ViewportRect,
    pub secondary: Option<ViewportRect>,
    pub overlay: Option<ViewportRect>,
}

/// Lay out the viewports of a frame.
///
/// Without a selected camera the main view fills the canvas. Otherwise it
/// keeps the left two thirds, and the right column shows the camera view at
/// the camera's own aspect on top, with the image fitted into the space
/// below. The camera view never takes more than half the column height.
pub fn plan_frame(canvas: (u32, u32), secondary_aspect: Option<f32>, image_aspect: Option<f32>) -> FramePlan {
    let (width, height) = (canvas.0 as f32, canvas.1 as f32);
    let full = ViewportRect::new(0.0, 0.0, width, height);
    if secondary_aspect.is_none() && image_aspect.is_none() {
        return FramePlan {
            main: full,
            secondary: None,
            overlay: None,
        };
    }

    let main_width = (width * MAIN_VIEW_FRACTION).floor();
    let main = ViewportRect::new(0.0, 0.0, main_width, height);
    let column = ViewportRect::new(main_width, 0.0, width - main_width, height);

    let secondary = secondary_aspect.map(|aspect| {
        let slot = ViewportRect::new(column.x, column.y, column.width, column.height / 2.0);
        let fitted = slot.fit_aspect(aspect);
        // Stick to the top of the column
        ViewportRect::new(fitted.x, column.y, fitted.width, fitted.height)
    });

    let overlay = image_aspect.map(|aspect| {
        let top = secondary.map_or(column.y, |rect| rect.y + rect.height);
        let slot = ViewportRect::new(column.x, top, column.width, column.height - (top - column.y));
        slot.fit_aspect(aspect)
    });

    FramePlan {
        main,
        secondary,
        overlay,
    }
}

/// What a tick did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FrameStats {
    pub events: usize,
    pub scene_changes: usize,
    pub passes: usize,
    pub failures: usize,
}

/// Owns the primary camera and paints frames
pub struct RenderLoop {
    camera: Camera,
    controls: OrbitControls,
    clear_color: Rgb,
    frame: u64,
}

impl RenderLoop {
    pub fn new(config: &ViewerConfig) -> Self {
        let camera = config.camera.build();
        let controls = OrbitControls::new(config.orbit.clone(), &camera);
        Self {
            camera,
            controls,
            clear_color: hex_to_rgb(config.clear_color),
            frame: 0,
        }
    }

    pub fn camera(&self) -> &Camera {
        &self.camera
    }

    pub fn controls_mut(&mut self) -> &mut OrbitControls {
        &mut self.controls
    }

    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Run one frame
    pub fn tick(&mut self, session: &mut ViewerSession, backend: &mut dyn RenderBackend) -> FrameStats {
        let mut stats = FrameStats {
            events: session.process_events(),
            scene_changes: session.reconcile(),
            ..FrameStats::default()
        };
        self.controls.update(&mut self.camera);
        self.frame += 1;

        if let Err(e) = backend.begin_frame() {
            tracing::warn!(frame = self.frame, error = %e, "frame skipped");
            stats.failures += 1;
            return stats;
        }

        let session = &*session;
        let mut run = |pass: &str, result: carview_core::Result<()>| match result {
            Ok(()) => stats.passes += 1,
            Err(e) => {
                tracing::warn!(frame = self.frame, pass, error = %e, "render pass failed");
                stats.failures += 1;
            }
        };

        run("clear", backend.clear(self.clear_color));

        let secondary = session.secondary_camera();
        let image = session.overlay_image();
        let plan = plan_frame(
            backend.canvas_size(),
            secondary.map(|camera| camera.aspect_ratio),
            image.map(|image| image.aspect_ratio()),
        );

        let objects: Vec<&SceneObject> = session.scene().iter().map(|object| object.as_ref()).collect();

        // A canvas a few pixels wide collapses some rectangles to nothing
        let visible = |pass: &str, rect: &ViewportRect| {
            if rect.is_empty() {
                tracing::debug!(pass, ?rect, "viewport too small; pass skipped");
                return false;
            }
            true
        };

        if visible("main", &plan.main) {
            self.camera.aspect_ratio = plan.main.aspect_ratio();
            let main = ViewportSpec {
                rect: plan.main,
                camera: self.camera.matrices(),
                clear: true,
            };
            run("main", backend.render_viewport(&objects, &main));
        }

        let secondary_rect = plan.secondary.filter(|rect| visible("secondary", rect));
        let overlay_rect = plan.overlay.filter(|rect| visible("image", rect));

        if let (Some(rect), Some(camera)) = (secondary_rect, secondary) {
            let view = ViewportSpec {
                rect,
                camera: camera.matrices(),
                clear: true,
            };
            run("secondary", backend.render_viewport(&objects, &view));
        }

        if let (Some(rect), Some(image)) = (overlay_rect, image) {
            run("image", backend.draw_image(image, rect));
        }

        run("present", backend.end_frame());
        stats
    }
}
