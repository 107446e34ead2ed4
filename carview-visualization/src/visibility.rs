//! Visibility controller
//!
//! Toggles are recorded as *desired* state and only applied to the scene by
//! [`VisibilityController::reconcile`], which runs once per tick. The
//! controller remembers what it last applied and touches the scene only for
//! toggles whose value changed since then.
//!
//! Objects arriving from the loader consult [`VisibilityController::is_visible`],
//! which answers from the desired state, so a sweep hidden before it loaded
//! never shows up.

use crate::label::label_type_of;
use crate::store::SceneStore;
use carview_core::{Category, CameraName, HelperName, LabelType, LidarName, ObjectId};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// A toggleable group of scene objects
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ToggleKey {
    Lidar(LidarName),
    Label(LabelType),
    Helper(HelperName),
}

impl ToggleKey {
    /// Every toggle, in a stable order
    pub fn all() -> impl Iterator<Item = ToggleKey> {
        let lidars = LidarName::ALL.iter().copied().map(ToggleKey::Lidar);
        let labels = LabelType::ALL.iter().copied().map(ToggleKey::Label);
        let helpers = HelperName::ALL.iter().copied().map(ToggleKey::Helper);
        lidars.chain(labels).chain(helpers)
    }

    pub fn category(&self) -> Category {
        match self {
            ToggleKey::Lidar(_) => Category::Lidar,
            ToggleKey::Label(_) => Category::Label,
            ToggleKey::Helper(_) => Category::Helper,
        }
    }

    /// Toggle governing a scene object; `None` for frustums and static objects
    pub fn of(id: &ObjectId) -> Option<ToggleKey> {
        match id.category {
            Category::Lidar => id.name.parse().ok().map(ToggleKey::Lidar),
            Category::Label => label_type_of(id).map(ToggleKey::Label),
            Category::Helper => id.name.parse().ok().map(ToggleKey::Helper),
            Category::CameraFrustum | Category::Static => None,
        }
    }

    /// Parse the weakly typed `(category, key)` pair of the control surface
    pub fn parse(category: &str, key: &str) -> Option<ToggleKey> {
        match category.parse().ok()? {
            Category::Lidar => key.parse().ok().map(ToggleKey::Lidar),
            Category::Label => key.parse().ok().map(ToggleKey::Label),
            Category::Helper => key.parse().ok().map(ToggleKey::Helper),
            Category::CameraFrustum | Category::Static => None,
        }
    }
}

impl fmt::Display for ToggleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ToggleKey::Lidar(name) => name.as_str(),
            ToggleKey::Label(name) => name.as_str(),
            ToggleKey::Helper(name) => name.as_str(),
        };
        write!(f, "{}:{}", self.category(), name)
    }
}

/// Toggle values plus the selected secondary camera
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VisibilityState {
    toggles: BTreeMap<ToggleKey, bool>,
    selected_camera: Option<CameraName>,
}

impl VisibilityState {
    /// Sensors and helpers visible, labels as given, no camera selected
    pub fn new(labels_visible: bool) -> Self {
        let toggles = ToggleKey::all()
            .map(|key| match key {
                ToggleKey::Label(_) => (key, labels_visible),
                _ => (key, true),
            })
            .collect();
        Self {
            toggles,
            selected_camera: None,
        }
    }

    pub fn is_enabled(&self, key: ToggleKey) -> bool {
        self.toggles.get(&key).copied().unwrap_or(true)
    }

    pub fn selected_camera(&self) -> Option<CameraName> {
        self.selected_camera
    }

    /// Whether an object with `id` belongs in the scene
    pub fn is_visible(&self, id: &ObjectId) -> bool {
        match id.category {
            Category::Static => true,
            Category::CameraFrustum => self.selected_camera.map(|c| c.as_str()) == Some(id.name.as_str()),
            _ => ToggleKey::of(id).map_or(true, |key| self.is_enabled(key)),
        }
    }
}

/// Owns desired and applied visibility and reconciles the scene
#[derive(Debug, Clone)]
pub struct VisibilityController {
    desired: VisibilityState,
    applied: VisibilityState,
}

impl VisibilityController {
    pub fn new(labels_visible: bool) -> Self {
        let state = VisibilityState::new(labels_visible);
        Self {
            desired: state.clone(),
            applied: state,
        }
    }

    pub fn desired(&self) -> &VisibilityState {
        &self.desired
    }

    pub fn set(&mut self, key: ToggleKey, enabled: bool) {
        tracing::debug!(%key, enabled, "toggle");
        self.desired.toggles.insert(key, enabled);
    }

    /// String-keyed toggle; unknown categories or keys are ignored.
    ///
    /// Returns whether the pair named a toggle.
    pub fn set_enabled(&mut self, category: &str, key: &str, enabled: bool) -> bool {
        match ToggleKey::parse(category, key) {
            Some(key) => {
                self.set(key, enabled);
                true
            }
            None => {
                tracing::warn!(category, key, "invalid toggle key ignored");
                false
            }
        }
    }

    pub fn is_enabled(&self, key: ToggleKey) -> bool {
        self.desired.is_enabled(key)
    }

    pub fn select_camera(&mut self, camera: Option<CameraName>) {
        tracing::debug!(camera = ?camera, "select camera");
        self.desired.selected_camera = camera;
    }

    pub fn selected_camera(&self) -> Option<CameraName> {
        self.desired.selected_camera
    }

    pub fn is_visible(&self, id: &ObjectId) -> bool {
        self.desired.is_visible(id)
    }

    /// Whether a reconcile would change the scene
    pub fn has_pending(&self) -> bool {
        self.desired != self.applied
    }

    /// Bring `scene` in line with the desired state, taking objects to show
    /// from `catalog`. Returns the number of objects added or removed.
    ///
    /// A camera switch hides the old frustum and shows the new one in the
    /// same call.
    pub fn reconcile(&mut self, scene: &mut SceneStore, catalog: &SceneStore) -> usize {
        if !self.has_pending() {
            return 0;
        }

        let mut changes = 0;
        let changed: Vec<(ToggleKey, bool)> = self
            .desired
            .toggles
            .iter()
            .filter(|(key, enabled)| self.applied.is_enabled(**key) != **enabled)
            .map(|(key, enabled)| (*key, *enabled))
            .collect();

        for (key, enabled) in changed {
            let category = key.category();
            if enabled {
                let matching: Vec<Arc<_>> = catalog
                    .all(category)
                    .filter(|object| ToggleKey::of(&object.id) == Some(key))
                    .cloned()
                    .collect();
                changes += matching.into_iter().filter(|object| scene.add(object.clone())).count();
            } else {
                let matching: Vec<ObjectId> = scene
                    .all(category)
                    .filter(|object| ToggleKey::of(&object.id) == Some(key))
                    .map(|object| object.id.clone())
                    .collect();
                changes += matching.iter().filter_map(|id| scene.remove(id)).count();
            }
            tracing::debug!(%key, enabled, "toggle applied");
        }

        if self.desired.selected_camera != self.applied.selected_camera {
            if let Some(old) = self.applied.selected_camera {
                changes += scene.remove(&ObjectId::frustum(old)).map_or(0, |_| 1);
            }
            if let Some(new) = self.desired.selected_camera {
                if let Some(frustum) = catalog.get(&ObjectId::frustum(new)) {
                    changes += usize::from(scene.add(frustum.clone()));
                }
            }
            tracing::debug!(
                from = ?self.applied.selected_camera,
                to = ?self.desired.selected_camera,
                "camera selection applied"
            );
        }

        self.applied = self.desired.clone();
        changes
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::label::label_id;
    use carview_core::{LineSet, Renderable, SceneObject, Transform3D};

    fn object(id: ObjectId) -> Arc<SceneObject> {
        Arc::new(SceneObject::new(id, Renderable::Lines(LineSet::default()), Transform3D::identity()))
    }

    fn catalog() -> SceneStore {
        let mut catalog = SceneStore::new();
        for id in [
            ObjectId::lidar(LidarName::Top),
            ObjectId::lidar(LidarName::Front),
            label_id(LabelType::Vehicle, 0),
            label_id(LabelType::Vehicle, 1),
            label_id(LabelType::Pedestrian, 2),
            ObjectId::frustum(CameraName::Front),
            ObjectId::frustum(CameraName::SideLeft),
        ] {
            catalog.add(object(id));
        }
        catalog
    }

    /// Scene holding what the default state shows
    fn populated(controller: &VisibilityController, catalog: &SceneStore) -> SceneStore {
        let mut scene = SceneStore::new();
        for object in catalog.iter() {
            if controller.is_visible(&object.id) {
                scene.add(object.clone());
            }
        }
        scene
    }

    #[test]
    fn test_defaults() {
        let controller = VisibilityController::new(false);
        assert!(controller.is_enabled(ToggleKey::Lidar(LidarName::Top)));
        assert!(controller.is_enabled(ToggleKey::Helper(HelperName::Ground)));
        assert!(!controller.is_enabled(ToggleKey::Label(LabelType::Vehicle)));
        assert_eq!(controller.selected_camera(), None);
        assert!(!controller.has_pending());
        assert!(VisibilityController::new(true).is_enabled(ToggleKey::Label(LabelType::Sign)));
    }

    #[test]
    fn test_setters_are_deferred_until_reconcile() {
        let catalog = catalog();
        let mut controller = VisibilityController::new(true);
        let mut scene = populated(&controller, &catalog);

        controller.set(ToggleKey::Lidar(LidarName::Top), false);
        assert!(scene.has(&ObjectId::lidar(LidarName::Top)));
        assert!(controller.has_pending());

        assert_eq!(controller.reconcile(&mut scene, &catalog), 1);
        assert!(!scene.has(&ObjectId::lidar(LidarName::Top)));
        assert!(scene.has(&ObjectId::lidar(LidarName::Front)));
        assert_eq!(controller.reconcile(&mut scene, &catalog), 0);
    }

    #[test]
    fn test_toggle_round_trip_restores_membership() {
        let catalog = catalog();
        let mut controller = VisibilityController::new(true);
        let mut scene = populated(&controller, &catalog);
        let before: Vec<_> = scene.ids().cloned().collect();

        controller.set(ToggleKey::Label(LabelType::Vehicle), false);
        controller.reconcile(&mut scene, &catalog);
        assert_eq!(scene.all(Category::Label).count(), 1);

        controller.set(ToggleKey::Label(LabelType::Vehicle), true);
        controller.reconcile(&mut scene, &catalog);
        assert_eq!(scene.ids().cloned().collect::<Vec<_>>(), before);
    }

    #[test]
    fn test_flip_flop_between_reconciles_is_noop() {
        let catalog = catalog();
        let mut controller = VisibilityController::new(true);
        let mut scene = populated(&controller, &catalog);

        controller.set(ToggleKey::Lidar(LidarName::Front), false);
        controller.set(ToggleKey::Lidar(LidarName::Front), true);
        assert!(!controller.has_pending());
        assert_eq!(controller.reconcile(&mut scene, &catalog), 0);
    }

    #[test]
    fn test_camera_selection_is_exclusive() {
        let catalog = catalog();
        let mut controller = VisibilityController::new(true);
        let mut scene = populated(&controller, &catalog);
        assert_eq!(scene.all(Category::CameraFrustum).count(), 0);

        controller.select_camera(Some(CameraName::Front));
        controller.reconcile(&mut scene, &catalog);
        let frustums: Vec<_> = scene.all(Category::CameraFrustum).map(|o| o.id.name.clone()).collect();
        assert_eq!(frustums, ["FRONT"]);

        controller.select_camera(Some(CameraName::SideLeft));
        controller.reconcile(&mut scene, &catalog);
        let frustums: Vec<_> = scene.all(Category::CameraFrustum).map(|o| o.id.name.clone()).collect();
        assert_eq!(frustums, ["SIDE_LEFT"]);

        controller.select_camera(None);
        controller.reconcile(&mut scene, &catalog);
        assert_eq!(scene.all(Category::CameraFrustum).count(), 0);
    }

    #[test]
    fn test_string_keyed_setter() {
        let mut controller = VisibilityController::new(true);
        assert!(controller.set_enabled("LIDAR", "SIDE_LEFT", false));
        assert!(!controller.is_enabled(ToggleKey::Lidar(LidarName::SideLeft)));
        assert!(controller.set_enabled("HELPER", "AXES", false));
        assert!(!controller.is_enabled(ToggleKey::Helper(HelperName::Axes)));

        assert!(!controller.set_enabled("LIDAR", "ROOF", false));
        assert!(!controller.set_enabled("WEATHER", "RAIN", true));
        assert!(!controller.set_enabled("STATIC", "EGO_VEHICLE", false));
    }

    #[test]
    fn test_static_objects_always_visible() {
        let mut controller = VisibilityController::new(false);
        for key in ToggleKey::all() {
            controller.set(key, false);
        }
        assert!(controller.is_visible(&ObjectId::new(Category::Static, "EGO_VEHICLE")));
        assert!(!controller.is_visible(&ObjectId::helper(HelperName::Ground)));
    }

    #[test]
    fn test_toggle_key_of_ids() {
        assert_eq!(
            ToggleKey::of(&ObjectId::lidar(LidarName::Rear)),
            Some(ToggleKey::Lidar(LidarName::Rear))
        );
        assert_eq!(
            ToggleKey::of(&label_id(LabelType::Cyclist, 4)),
            Some(ToggleKey::Label(LabelType::Cyclist))
        );
        assert_eq!(ToggleKey::of(&ObjectId::frustum(CameraName::Front)), None);
        assert_eq!(ToggleKey::Helper(HelperName::Ground).to_string(), "HELPER:GROUND");
    }
}
