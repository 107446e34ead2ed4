//! Scene composition and rendering for recorded drives
//!
//! This crate turns loaded sensor records into a live scene and paints it:
//! - Virtual cameras and frustums from calibrations
//! - Wireframe boxes from labels
//! - A keyed scene store with per-sensor and per-class visibility
//! - A render loop composing the main, camera and image viewports
//! - An interactive winit viewer

pub mod camera;
pub mod config;
pub mod controls;
pub mod frustum;
pub mod label;
pub mod render_loop;
pub mod session;
pub mod store;
pub mod viewer;
pub mod visibility;
pub mod visuals;

pub use camera::*;
pub use config::*;
pub use controls::*;
pub use frustum::*;
pub use label::*;
pub use render_loop::*;
pub use session::*;
pub use store::*;
pub use viewer::*;
pub use visibility::*;
pub use visuals::*;

/// Build a session for the frame stored under `data_dir` and show it.
///
/// Asset loading runs on `runtime`, which must outlive the viewer.
pub fn show_frame(
    data_dir: impl Into<std::path::PathBuf>,
    config: ViewerConfig,
    runtime: &tokio::runtime::Runtime,
) -> carview_core::Result<()> {
    let source = std::sync::Arc::new(carview_io::FileSource::new(data_dir));
    let (loader, events) = carview_io::AssetLoader::new(source, runtime.handle().clone(), config.urls.clone());
    let loader = loader.with_progress(std::sync::Arc::new(carview_io::LogProgress));
    Viewer::new(ViewerSession::with_loader(config, loader, events)).run()
}
