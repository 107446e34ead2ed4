//! Viewer session
//!
//! The session owns all mutable viewer state: the catalog of loaded
//! objects, the scene drawn each frame, visibility, calibrated cameras and
//! decoded images. Loader completions are drained from a channel on the
//! render thread, so nothing here needs a lock.

use crate::config::ViewerConfig;
use crate::frustum::{build_camera, VirtualCamera};
use crate::label::to_bounding_box;
use crate::store::SceneStore;
use crate::visibility::{ToggleKey, VisibilityController};
use crate::visuals::{lidar_object, static_scene};
use carview_core::{
    CameraImage, CameraName, Drawable, FrameRecords, HelperName, LabelType, LidarName, SceneObject,
    SensorReading,
};
use carview_io::{AssetEvent, AssetLoader};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Where a camera image stands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageState {
    Missing,
    Loading,
    Loaded,
    Failed,
}

/// State of one viewer instance
pub struct ViewerSession {
    config: ViewerConfig,
    scene: SceneStore,
    catalog: SceneStore,
    visibility: VisibilityController,
    cameras: BTreeMap<CameraName, VirtualCamera>,
    images: HashMap<CameraName, Arc<CameraImage>>,
    pending_images: HashSet<CameraName>,
    failed_images: HashSet<CameraName>,
    loader: Option<AssetLoader>,
    events: Option<flume::Receiver<AssetEvent>>,
}

impl ViewerSession {
    /// A session showing only the static scene
    pub fn new(config: ViewerConfig) -> Self {
        let visibility = VisibilityController::new(config.labels_visible);
        let mut session = Self {
            config,
            scene: SceneStore::new(),
            catalog: SceneStore::new(),
            visibility,
            cameras: BTreeMap::new(),
            images: HashMap::new(),
            pending_images: HashSet::new(),
            failed_images: HashSet::new(),
            loader: None,
            events: None,
        };
        for object in static_scene() {
            session.insert_object(object);
        }
        session
    }

    /// A session fed by `loader`; nothing is requested until [`Self::start`]
    pub fn with_loader(config: ViewerConfig, loader: AssetLoader, events: flume::Receiver<AssetEvent>) -> Self {
        let mut session = Self::new(config);
        session.loader = Some(loader);
        session.events = Some(events);
        session
    }

    /// Request the frame descriptor and every lidar sweep
    pub fn start(&self) {
        match &self.loader {
            Some(loader) => {
                tracing::info!("loading frame");
                loader.request_descriptor();
                loader.request_all_point_clouds();
            }
            None => tracing::warn!("session has no asset loader; nothing to load"),
        }
    }

    pub fn config(&self) -> &ViewerConfig {
        &self.config
    }

    /// Objects currently drawn
    pub fn scene(&self) -> &SceneStore {
        &self.scene
    }

    /// Every object loaded so far, drawn or not
    pub fn catalog(&self) -> &SceneStore {
        &self.catalog
    }

    pub fn visibility(&self) -> &VisibilityController {
        &self.visibility
    }

    /// Add a loaded object, showing it if its toggle is currently enabled.
    ///
    /// Returns `false` if an object with the same id was already loaded.
    pub fn insert_object(&mut self, object: SceneObject) -> bool {
        let object = Arc::new(object);
        if !self.catalog.add(object.clone()) {
            tracing::debug!(id = %object.id, "object already loaded; ignoring duplicate");
            return false;
        }
        if self.visibility.is_visible(&object.id) {
            self.scene.add(object);
        }
        true
    }

    /// Drain every completed load; returns how many events were handled
    pub fn process_events(&mut self) -> usize {
        let Some(events) = &self.events else {
            return 0;
        };
        let drained: Vec<AssetEvent> = events.try_iter().collect();
        let count = drained.len();
        for event in drained {
            self.handle_event(event);
        }
        count
    }

    pub fn handle_event(&mut self, event: AssetEvent) {
        match event {
            AssetEvent::Descriptor(Ok(records)) => self.add_frame_records(records),
            AssetEvent::Descriptor(Err(e)) => {
                tracing::warn!(error = %e, "frame descriptor unavailable; no cameras or labels")
            }
            AssetEvent::PointCloud { lidar, result } => match result {
                Ok(cloud) => self.add_sensor_reading(SensorReading { lidar, cloud }),
                Err(e) => tracing::warn!(%lidar, error = %e, "lidar sweep unavailable"),
            },
            AssetEvent::Image { camera, result } => {
                self.pending_images.remove(&camera);
                match result {
                    Ok(image) => {
                        tracing::info!(%camera, width = image.width, height = image.height, "camera image loaded");
                        self.images.insert(camera, Arc::new(image));
                    }
                    Err(e) => {
                        tracing::warn!(%camera, error = %e, "camera image unavailable");
                        self.failed_images.insert(camera);
                    }
                }
            }
        }
    }

    /// Turn calibrations into cameras and labels into boxes
    pub fn add_frame_records(&mut self, records: FrameRecords) {
        for calibration in &records.cameras {
            match build_camera(calibration) {
                Ok((camera, frustum)) => {
                    self.cameras.insert(camera.name, camera);
                    self.insert_object(frustum);
                }
                Err(e) => tracing::warn!(camera = %calibration.name, error = %e, "skipping camera"),
            }
        }
        for (index, label) in records.labels.iter().enumerate() {
            self.insert_object(to_bounding_box(label, index));
        }
        tracing::info!(
            cameras = self.cameras.len(),
            labels = records.labels.len(),
            "frame descriptor loaded"
        );
    }

    pub fn add_sensor_reading(&mut self, reading: SensorReading) {
        let (min, max) = reading.cloud.bounding_box();
        tracing::info!(
            lidar = %reading.lidar,
            points = reading.cloud.len(),
            intensity = reading.cloud.has_intensity(),
            min = ?min.coords.as_slice(),
            max = ?max.coords.as_slice(),
            "lidar sweep loaded"
        );
        self.insert_object(lidar_object(reading, self.config.point_size));
    }

    /// Apply pending visibility changes to the scene
    pub fn reconcile(&mut self) -> usize {
        self.visibility.reconcile(&mut self.scene, &self.catalog)
    }

    pub fn set_lidar(&mut self, lidar: LidarName, enabled: bool) {
        self.visibility.set(ToggleKey::Lidar(lidar), enabled);
    }

    pub fn set_label_type(&mut self, label_type: LabelType, enabled: bool) {
        self.visibility.set(ToggleKey::Label(label_type), enabled);
    }

    pub fn set_helper(&mut self, helper: HelperName, enabled: bool) {
        self.visibility.set(ToggleKey::Helper(helper), enabled);
    }

    /// String-keyed toggle, e.g. `("LIDAR", "TOP")`
    pub fn set_enabled(&mut self, category: &str, key: &str, enabled: bool) -> bool {
        self.visibility.set_enabled(category, key, enabled)
    }

    pub fn is_enabled(&self, key: ToggleKey) -> bool {
        self.visibility.is_enabled(key)
    }

    /// Select the secondary camera and fetch its image on first use
    pub fn select_camera(&mut self, camera: Option<CameraName>) {
        self.visibility.select_camera(camera);
        if let Some(camera) = camera {
            self.request_image(camera);
        }
    }

    /// Select by name; `""` or `"NONE"` clears the selection.
    ///
    /// Unknown names are logged and leave the selection unchanged.
    pub fn select_camera_by_name(&mut self, name: &str) -> bool {
        let camera = match name {
            "" | "NONE" => None,
            name => match name.parse::<CameraName>() {
                Ok(camera) => Some(camera),
                Err(e) => {
                    tracing::warn!(camera = name, error = %e, "unknown camera ignored");
                    return false;
                }
            },
        };
        self.select_camera(camera);
        true
    }

    pub fn selected_camera(&self) -> Option<CameraName> {
        self.visibility.selected_camera()
    }

    /// Cameras with a usable calibration
    pub fn available_cameras(&self) -> Vec<CameraName> {
        self.cameras.keys().copied().collect()
    }

    pub fn camera(&self, name: CameraName) -> Option<&VirtualCamera> {
        self.cameras.get(&name)
    }

    /// The selected camera, if it is calibrated
    pub fn secondary_camera(&self) -> Option<&VirtualCamera> {
        self.selected_camera().and_then(|name| self.cameras.get(&name))
    }

    /// The selected camera's image, if it has loaded
    pub fn overlay_image(&self) -> Option<&CameraImage> {
        self.selected_camera()
            .and_then(|name| self.images.get(&name))
            .map(|image| image.as_ref())
    }

    pub fn image_state(&self, camera: CameraName) -> ImageState {
        if self.images.contains_key(&camera) {
            ImageState::Loaded
        } else if self.pending_images.contains(&camera) {
            ImageState::Loading
        } else if self.failed_images.contains(&camera) {
            ImageState::Failed
        } else {
            ImageState::Missing
        }
    }

    fn request_image(&mut self, camera: CameraName) {
        if self.image_state(camera) != ImageState::Missing {
            return;
        }
        if let Some(loader) = &self.loader {
            self.pending_images.insert(camera);
            loader.request_image(camera);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carview_core::{CameraCalibration, Category, Error, Label, LidarPoint, ObjectId, Point3f, PointCloud, Vector3f};

    fn front_calibration() -> CameraCalibration {
        let mut extrinsic = [0.0; 16];
        for i in 0..4 {
            extrinsic[i * 5] = 1.0;
        }
        CameraCalibration::from_raw(
            CameraName::Front,
            &[2000.0, 2000.0, 640.0, 960.0, 0.0, 0.0, 0.0, 0.0, 0.0],
            &extrinsic,
        )
        .unwrap()
    }

    fn reading(lidar: LidarName) -> SensorReading {
        SensorReading {
            lidar,
            cloud: PointCloud::from_points(vec![LidarPoint::new(1.0, 0.0, 0.0), LidarPoint::new(0.0, 1.0, 0.0)]),
        }
    }

    #[test]
    fn test_new_session_holds_static_scene() {
        let session = ViewerSession::new(ViewerConfig::default());
        assert_eq!(session.scene().len(), 3);
        assert_eq!(session.scene().all(Category::Static).count(), 1);
        assert_eq!(session.scene().all(Category::Helper).count(), 2);
    }

    #[test]
    fn test_hidden_lidar_stays_hidden_after_load() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        session.set_lidar(LidarName::Rear, false);
        session.reconcile();
        session.add_sensor_reading(reading(LidarName::Rear));

        assert!(session.catalog().has(&ObjectId::lidar(LidarName::Rear)));
        assert!(!session.scene().has(&ObjectId::lidar(LidarName::Rear)));

        session.set_lidar(LidarName::Rear, true);
        session.reconcile();
        assert!(session.scene().has(&ObjectId::lidar(LidarName::Rear)));
    }

    #[test]
    fn test_duplicate_load_is_ignored() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        assert!(session.insert_object(lidar_object(reading(LidarName::Top), 1.0)));
        assert!(!session.insert_object(lidar_object(reading(LidarName::Top), 1.0)));
        assert_eq!(session.scene().all(Category::Lidar).count(), 1);
    }

    #[test]
    fn test_frame_records_create_cameras_and_labels() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        let mut degenerate = front_calibration();
        degenerate.name = CameraName::SideLeft;
        degenerate.intrinsics.fv = 0.0;

        session.handle_event(AssetEvent::Descriptor(Ok(FrameRecords {
            cameras: vec![front_calibration(), degenerate],
            labels: vec![
                Label::new(LabelType::Vehicle, Point3f::new(10.0, 0.0, 0.0), Vector3f::new(4.0, 2.0, 1.5), 0.0),
                Label::new(LabelType::Sign, Point3f::new(5.0, 3.0, 2.0), Vector3f::new(0.5, 0.5, 0.5), 0.0),
            ],
        })));

        assert_eq!(session.available_cameras(), [CameraName::Front]);
        assert_eq!(session.scene().all(Category::Label).count(), 2);
        // Frustums only appear once their camera is selected
        assert_eq!(session.scene().all(Category::CameraFrustum).count(), 0);
        assert_eq!(session.catalog().all(Category::CameraFrustum).count(), 1);
    }

    #[test]
    fn test_labels_hidden_by_config() {
        let config = ViewerConfig {
            labels_visible: false,
            ..ViewerConfig::default()
        };
        let mut session = ViewerSession::new(config);
        session.add_frame_records(FrameRecords {
            cameras: vec![],
            labels: vec![Label::new(
                LabelType::Pedestrian,
                Point3f::origin(),
                Vector3f::new(1.0, 1.0, 2.0),
                0.0,
            )],
        });
        assert_eq!(session.scene().all(Category::Label).count(), 0);
        assert_eq!(session.catalog().all(Category::Label).count(), 1);
    }

    #[test]
    fn test_failed_loads_are_logged_not_fatal() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        session.handle_event(AssetEvent::Descriptor(Err(Error::asset_load("frame.json", "not found"))));
        session.handle_event(AssetEvent::PointCloud {
            lidar: LidarName::Front,
            result: Err(Error::asset_load("laser_FRONT.pcd", "not found")),
        });
        session.handle_event(AssetEvent::Image {
            camera: CameraName::Front,
            result: Err(Error::asset_load("camera_FRONT.png", "not found")),
        });
        assert!(session.available_cameras().is_empty());
        assert_eq!(session.image_state(CameraName::Front), ImageState::Failed);
        assert_eq!(session.scene().len(), 3);
    }

    #[test]
    fn test_select_camera_by_name() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        assert!(session.select_camera_by_name("SIDE_RIGHT"));
        assert_eq!(session.selected_camera(), Some(CameraName::SideRight));
        // Not calibrated yet
        assert!(session.secondary_camera().is_none());

        // An unknown name keeps the current selection
        assert!(!session.select_camera_by_name("ROOF"));
        assert_eq!(session.selected_camera(), Some(CameraName::SideRight));

        assert!(session.select_camera_by_name("NONE"));
        assert_eq!(session.selected_camera(), None);
    }

    #[test]
    fn test_overlay_image_follows_selection() {
        let mut session = ViewerSession::new(ViewerConfig::default());
        session.handle_event(AssetEvent::Image {
            camera: CameraName::Front,
            result: Ok(CameraImage {
                width: 2,
                height: 1,
                rgba: vec![0; 8],
            }),
        });
        assert!(session.overlay_image().is_none());
        session.select_camera(Some(CameraName::Front));
        assert_eq!(session.overlay_image().map(|i| i.width), Some(2));
        assert_eq!(session.image_state(CameraName::Front), ImageState::Loaded);
    }
}
