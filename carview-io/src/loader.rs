//! Asynchronous asset loading
//!
//! Every request runs as its own tokio task: the bytes are fetched from an
//! [`AssetSource`], decoded on the blocking pool, and exactly one
//! [`AssetEvent`] carrying either the decoded asset or the failure is sent
//! back over a channel. The viewer drains that channel on its render thread,
//! so completions never run concurrently with scene mutation.

use crate::camera_image::decode_image;
use crate::descriptor::parse_descriptor;
use crate::pcd::decode_pcd;
use async_trait::async_trait;
use carview_core::{CameraImage, CameraName, Error, FrameRecords, LidarName, LidarPoint, PointCloud, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::AsyncReadExt;
use tokio::runtime::Handle;

/// Receives byte-level progress of in-flight fetches
pub trait ProgressObserver: Send + Sync {
    fn on_progress(&self, url: &str, loaded: u64, total: Option<u64>);
}

/// Progress observer that reports through `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogProgress;

impl ProgressObserver for LogProgress {
    fn on_progress(&self, url: &str, loaded: u64, total: Option<u64>) {
        match total {
            Some(total) if total > 0 => {
                tracing::trace!(url, "{:.0}% loaded", loaded as f64 / total as f64 * 100.0)
            }
            _ => tracing::trace!(url, loaded, "bytes loaded"),
        }
    }
}

/// Where asset bytes come from
#[async_trait]
pub trait AssetSource: Send + Sync {
    async fn fetch(&self, url: &str, progress: Option<&dyn ProgressObserver>) -> Result<Vec<u8>>;
}

/// Serves assets from a directory on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    root: PathBuf,
    chunk_size: usize,
}

impl FileSource {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            chunk_size: 256 * 1024,
        }
    }
}

#[async_trait]
impl AssetSource for FileSource {
    async fn fetch(&self, url: &str, progress: Option<&dyn ProgressObserver>) -> Result<Vec<u8>> {
        let path = self.root.join(url);
        let mut file = tokio::fs::File::open(&path)
            .await
            .map_err(|e| Error::asset_load(url, e))?;
        let total = file.metadata().await.ok().map(|m| m.len());

        let mut bytes = Vec::with_capacity(total.unwrap_or(0) as usize);
        let mut chunk = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut chunk).await.map_err(|e| Error::asset_load(url, e))?;
            if n == 0 {
                break;
            }
            bytes.extend_from_slice(&chunk[..n]);
            if let Some(observer) = progress {
                observer.on_progress(url, bytes.len() as u64, total);
            }
        }
        Ok(bytes)
    }
}

/// Serves assets from memory; used by tests and embedders
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    assets: HashMap<String, Vec<u8>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, url: impl Into<String>, bytes: impl Into<Vec<u8>>) {
        self.assets.insert(url.into(), bytes.into());
    }
}

#[async_trait]
impl AssetSource for MemorySource {
    async fn fetch(&self, url: &str, progress: Option<&dyn ProgressObserver>) -> Result<Vec<u8>> {
        let bytes = self
            .assets
            .get(url)
            .cloned()
            .ok_or_else(|| Error::asset_load(url, "not found"))?;
        if let Some(observer) = progress {
            observer.on_progress(url, bytes.len() as u64, Some(bytes.len() as u64));
        }
        Ok(bytes)
    }
}

/// File naming of the assets of one frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetUrls {
    pub descriptor: String,
    pub point_cloud_prefix: String,
    pub image_prefix: String,
    pub image_extension: String,
}

impl Default for AssetUrls {
    fn default() -> Self {
        Self {
            descriptor: "frame.json".to_string(),
            point_cloud_prefix: "laser_".to_string(),
            image_prefix: "camera_".to_string(),
            image_extension: "png".to_string(),
        }
    }
}

impl AssetUrls {
    pub fn point_cloud(&self, lidar: LidarName) -> String {
        format!("{}{}.pcd", self.point_cloud_prefix, lidar)
    }

    pub fn image(&self, camera: CameraName) -> String {
        format!("{}{}.{}", self.image_prefix, camera, self.image_extension)
    }
}

/// Completion of one asset request
#[derive(Debug)]
pub enum AssetEvent {
    Descriptor(Result<FrameRecords>),
    PointCloud {
        lidar: LidarName,
        result: Result<PointCloud<LidarPoint>>,
    },
    Image {
        camera: CameraName,
        result: Result<CameraImage>,
    },
}

/// Spawns fetch-and-decode tasks and reports their completions
#[derive(Clone)]
pub struct AssetLoader {
    source: Arc<dyn AssetSource>,
    runtime: Handle,
    urls: AssetUrls,
    sender: flume::Sender<AssetEvent>,
    progress: Option<Arc<dyn ProgressObserver>>,
}

impl AssetLoader {
    /// Create a loader and the receiving end of its completion channel
    pub fn new(source: Arc<dyn AssetSource>, runtime: Handle, urls: AssetUrls) -> (Self, flume::Receiver<AssetEvent>) {
        let (sender, receiver) = flume::unbounded();
        let loader = Self {
            source,
            runtime,
            urls,
            sender,
            progress: None,
        };
        (loader, receiver)
    }

    pub fn with_progress(mut self, observer: Arc<dyn ProgressObserver>) -> Self {
        self.progress = Some(observer);
        self
    }

    pub fn urls(&self) -> &AssetUrls {
        &self.urls
    }

    pub fn request_descriptor(&self) {
        let url = self.urls.descriptor.clone();
        self.spawn(url, parse_descriptor, AssetEvent::Descriptor);
    }

    pub fn request_point_cloud(&self, lidar: LidarName) {
        let url = self.urls.point_cloud(lidar);
        self.spawn(url, decode_pcd, move |result| AssetEvent::PointCloud { lidar, result });
    }

    /// Fetch every lidar sweep in parallel
    pub fn request_all_point_clouds(&self) {
        for lidar in LidarName::ALL {
            self.request_point_cloud(*lidar);
        }
    }

    pub fn request_image(&self, camera: CameraName) {
        let url = self.urls.image(camera);
        self.spawn(url, decode_image, move |result| AssetEvent::Image { camera, result });
    }

    fn spawn<T, D, W>(&self, url: String, decode: D, wrap: W)
    where
        T: Send + 'static,
        D: FnOnce(&[u8]) -> Result<T> + Send + 'static,
        W: FnOnce(Result<T>) -> AssetEvent + Send + 'static,
    {
        let source = self.source.clone();
        let sender = self.sender.clone();
        let progress = self.progress.clone();

        tracing::debug!(%url, "requesting asset");
        self.runtime.spawn(async move {
            let result = match source.fetch(&url, progress.as_deref()).await {
                Ok(bytes) => tokio::task::spawn_blocking(move || decode(&bytes))
                    .await
                    .unwrap_or_else(|e| Err(Error::asset_load(&url, e))),
                Err(e) => Err(e),
            };
            let result = result.map_err(|e| match e {
                Error::AssetLoad { .. } => e,
                other => Error::asset_load(&url, other),
            });

            match &result {
                Ok(_) => tracing::debug!(%url, "asset loaded"),
                Err(e) => tracing::warn!(%url, error = %e, "asset load failed"),
            }
            // A closed channel means the session is gone; nothing left to notify
            let _ = sender.send(wrap(result));
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PCD: &str = "FIELDS x y z\nSIZE 4 4 4\nTYPE F F F\nWIDTH 2\nDATA ascii\n1 2 3\n4 5 6\n";

    #[derive(Default)]
    struct CountingProgress(AtomicUsize);

    impl ProgressObserver for CountingProgress {
        fn on_progress(&self, _url: &str, _loaded: u64, _total: Option<u64>) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn test_default_urls() {
        let urls = AssetUrls::default();
        assert_eq!(urls.point_cloud(LidarName::Top), "laser_TOP.pcd");
        assert_eq!(urls.image(CameraName::SideLeft), "camera_SIDE_LEFT.png");
    }

    #[tokio::test]
    async fn test_point_cloud_completes_once_with_progress() {
        let mut source = MemorySource::new();
        source.insert("laser_FRONT.pcd", PCD);
        let progress = Arc::new(CountingProgress::default());

        let (loader, events) = AssetLoader::new(Arc::new(source), Handle::current(), AssetUrls::default());
        let loader = loader.with_progress(progress.clone());
        loader.request_point_cloud(LidarName::Front);

        match events.recv_async().await.unwrap() {
            AssetEvent::PointCloud { lidar, result } => {
                assert_eq!(lidar, LidarName::Front);
                assert_eq!(result.unwrap().len(), 2);
            }
            other => panic!("unexpected event {:?}", other),
        }
        assert_eq!(progress.0.load(Ordering::SeqCst), 1);
        drop(loader);
        assert!(events.recv_async().await.is_err());
    }

    #[tokio::test]
    async fn test_missing_asset_reports_one_failure() {
        let (loader, events) = AssetLoader::new(Arc::new(MemorySource::new()), Handle::current(), AssetUrls::default());
        loader.request_image(CameraName::Front);

        match events.recv_async().await.unwrap() {
            AssetEvent::Image { camera, result } => {
                assert_eq!(camera, CameraName::Front);
                let err = result.unwrap_err();
                assert!(matches!(err, Error::AssetLoad { ref url, .. } if url == "camera_FRONT.png"));
            }
            other => panic!("unexpected event {:?}", other),
        }
        drop(loader);
        assert!(events.recv_async().await.is_err());
    }

    #[tokio::test]
    async fn test_decode_failure_is_wrapped_as_asset_load() {
        let mut source = MemorySource::new();
        source.insert("frame.json", "{ this is not json");
        let (loader, events) = AssetLoader::new(Arc::new(source), Handle::current(), AssetUrls::default());
        loader.request_descriptor();

        match events.recv_async().await.unwrap() {
            AssetEvent::Descriptor(result) => {
                assert!(matches!(result, Err(Error::AssetLoad { .. })));
            }
            other => panic!("unexpected event {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_file_source_reads_from_root() {
        let dir = std::env::temp_dir().join(format!("carview-loader-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("laser_REAR.pcd"), PCD).unwrap();

        let bytes = FileSource::new(&dir).fetch("laser_REAR.pcd", None).await.unwrap();
        assert_eq!(bytes, PCD.as_bytes());
        assert!(FileSource::new(&dir).fetch("laser_TOP.pcd", None).await.is_err());

        let _ = std::fs::remove_dir_all(&dir);
    }
}
