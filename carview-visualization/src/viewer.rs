//! Windowed viewer
//!
//! Hosts a [`ViewerSession`] in a winit window: pointer input drives the
//! orbit controls, keys go to the control surface, and every redraw runs one
//! [`RenderLoop::tick`] against the wgpu backend.

use crate::controls::{apply_action, key_action};
use crate::render_loop::RenderLoop;
use crate::session::ViewerSession;
use carview_core::{Error, Result};
use carview_gpu::SceneRenderer;
use std::sync::Arc;
use winit::{
    dpi::{LogicalSize, PhysicalPosition},
    event::{ElementState, Event, MouseButton, MouseScrollDelta, WindowEvent},
    event_loop::{ControlFlow, EventLoop},
    keyboard::Key,
    window::WindowBuilder,
};

/// Pixels of touchpad scroll per wheel line
const PIXELS_PER_LINE: f32 = 100.0;

/// How often frame statistics are logged
const STATS_INTERVAL_SECS: f32 = 5.0;

#[derive(Debug, Default)]
struct PointerState {
    rotating: bool,
    panning: bool,
    last: Option<PhysicalPosition<f64>>,
}

impl PointerState {
    fn set_button(&mut self, button: MouseButton, pressed: bool) {
        match button {
            MouseButton::Left => self.rotating = pressed,
            MouseButton::Right | MouseButton::Middle => self.panning = pressed,
            _ => {}
        }
    }

    /// Movement since the previous position
    fn move_to(&mut self, position: PhysicalPosition<f64>) -> Option<(f32, f32)> {
        let delta = self
            .last
            .map(|last| ((position.x - last.x) as f32, (position.y - last.y) as f32));
        self.last = Some(position);
        delta
    }
}

/// Interactive window around a session
pub struct Viewer {
    session: ViewerSession,
    render_loop: RenderLoop,
}

impl Viewer {
    pub fn new(session: ViewerSession) -> Self {
        let render_loop = RenderLoop::new(session.config());
        Self { session, render_loop }
    }

    /// Open the window, start loading and run until the window closes
    pub fn run(mut self) -> Result<()> {
        let config = self.session.config().clone();

        let event_loop =
            EventLoop::new().map_err(|e| Error::Visualization(format!("failed to create event loop: {}", e)))?;
        let window = Arc::new(
            WindowBuilder::new()
                .with_title(config.window.title.as_str())
                .with_inner_size(LogicalSize::new(config.window.width as f64, config.window.height as f64))
                .build(&event_loop)
                .map_err(|e| Error::Visualization(format!("failed to create window: {}", e)))?,
        );

        let mut renderer = pollster::block_on(SceneRenderer::new(window.clone(), config.render.clone()))?;
        tracing::info!("viewer initialized");

        self.session.start();

        let mut pointer = PointerState::default();
        let mut stats_started = instant::Instant::now();
        let mut stats_frames = 0u32;
        let mut stats_failures = 0usize;

        event_loop
            .run(move |event, target| {
                target.set_control_flow(ControlFlow::Poll);

                match event {
                    Event::WindowEvent { event, .. } => match event {
                        WindowEvent::CloseRequested => target.exit(),
                        WindowEvent::Resized(size) => renderer.resize(size),
                        WindowEvent::MouseInput { state, button, .. } => {
                            pointer.set_button(button, state == ElementState::Pressed);
                        }
                        WindowEvent::CursorMoved { position, .. } => {
                            if let Some((dx, dy)) = pointer.move_to(position) {
                                let controls = self.render_loop.controls_mut();
                                if pointer.rotating {
                                    controls.rotate(dx, dy);
                                } else if pointer.panning {
                                    controls.pan(dx, dy);
                                }
                            }
                        }
                        WindowEvent::MouseWheel { delta, .. } => {
                            let lines = match delta {
                                MouseScrollDelta::LineDelta(_, y) => y,
                                MouseScrollDelta::PixelDelta(pos) => pos.y as f32 / PIXELS_PER_LINE,
                            };
                            self.render_loop.controls_mut().scroll(lines);
                        }
                        WindowEvent::KeyboardInput { event, .. } if event.state == ElementState::Pressed => {
                            if let Key::Character(key) = &event.logical_key {
                                if let Some(action) = key_action(key.as_str()) {
                                    apply_action(action, &mut self.session, self.render_loop.controls_mut());
                                }
                            }
                        }
                        WindowEvent::RedrawRequested => {
                            let stats = self.render_loop.tick(&mut self.session, &mut renderer);
                            stats_frames += 1;
                            stats_failures += stats.failures;

                            let elapsed = stats_started.elapsed().as_secs_f32();
                            if elapsed >= STATS_INTERVAL_SECS {
                                tracing::debug!(
                                    fps = stats_frames as f32 / elapsed,
                                    failures = stats_failures,
                                    objects = self.session.scene().len(),
                                    gpu_objects = renderer.cached_objects(),
                                    "frame stats"
                                );
                                stats_started = instant::Instant::now();
                                stats_frames = 0;
                                stats_failures = 0;
                            }
                        }
                        _ => {}
                    },
                    Event::AboutToWait => window.request_redraw(),
                    _ => {}
                }
            })
            .map_err(|e| Error::Visualization(format!("event loop error: {}", e)))?;

        Ok(())
    }
}
