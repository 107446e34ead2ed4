//! Show one recorded frame of a vehicle sensor log.
//!
//! The data directory holds `frame.json`, the `laser_<NAME>.pcd` sweeps and
//! the `camera_<NAME>.png` images. Run with `RUST_LOG=debug` for loader output.

use anyhow::Context as _;
use carview_visualization::{show_frame, ViewerConfig};
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Directory holding the frame's assets
    #[clap(long, default_value = ".")]
    data_dir: PathBuf,

    /// Viewer configuration as JSON
    #[clap(long)]
    config: Option<PathBuf>,

    /// Override the lidar point size in pixels
    #[clap(long)]
    point_size: Option<f32>,

    /// Start with the label boxes hidden
    #[clap(long)]
    hide_labels: bool,
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,wgpu_core=warn,wgpu_hal=warn")),
        )
        .init();

    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ViewerConfig::from_json_file(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => ViewerConfig::default(),
    };
    if let Some(point_size) = args.point_size {
        config.point_size = point_size;
    }
    if args.hide_labels {
        config.labels_visible = false;
    }
    config.validate().context("invalid viewer config")?;

    tracing::info!(data_dir = %args.data_dir.display(), "opening frame");
    println!("Controls:");
    println!("  Left drag: orbit    Right/middle drag: pan    Scroll: zoom");
    println!("  1-5: lidars    v/p/s/y/u: label classes    a/g: axes/ground");
    println!("  c: next camera    x: no camera    r: reset view");

    // Asset loading runs on worker threads; the window stays on the main thread
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(2)
        .enable_all()
        .build()
        .context("starting asset runtime")?;

    show_frame(args.data_dir, config, &runtime)?;
    Ok(())
}
