//! Scene graph store
//!
//! A keyed collection of shared scene objects. The viewer keeps two of them:
//! the catalog of everything that has been loaded, and the scene of what is
//! currently drawn. Visibility changes move `Arc`s between the two, so
//! geometry is never copied.

use carview_core::{Category, ObjectId, SceneObject};
use std::collections::btree_map::{BTreeMap, Entry};
use std::sync::Arc;

/// Objects keyed by id, iterated in id order
#[derive(Debug, Clone, Default)]
pub struct SceneStore {
    objects: BTreeMap<ObjectId, Arc<SceneObject>>,
}

impl SceneStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert unless an object with the same id is present.
    ///
    /// Returns whether the object was inserted.
    pub fn add(&mut self, object: Arc<SceneObject>) -> bool {
        match self.objects.entry(object.id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(object);
                true
            }
            Entry::Occupied(_) => false,
        }
    }

    /// Insert, replacing and returning any object with the same id
    pub fn insert_or_replace(&mut self, object: Arc<SceneObject>) -> Option<Arc<SceneObject>> {
        self.objects.insert(object.id.clone(), object)
    }

    /// Remove an object; absent ids are ignored
    pub fn remove(&mut self, id: &ObjectId) -> Option<Arc<SceneObject>> {
        self.objects.remove(id)
    }

    pub fn has(&self, id: &ObjectId) -> bool {
        self.objects.contains_key(id)
    }

    pub fn get(&self, id: &ObjectId) -> Option<&Arc<SceneObject>> {
        self.objects.get(id)
    }

    /// Objects of one category, in name order
    pub fn all(&self, category: Category) -> impl Iterator<Item = &Arc<SceneObject>> + '_ {
        self.objects
            .iter()
            .filter(move |(id, _)| id.category == category)
            .map(|(_, object)| object)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Arc<SceneObject>> + '_ {
        self.objects.values()
    }

    pub fn ids(&self) -> impl Iterator<Item = &ObjectId> + '_ {
        self.objects.keys()
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use carview_core::{CameraName, LidarName, LineSet, Renderable, Transform3D};

    fn object(id: ObjectId) -> Arc<SceneObject> {
        Arc::new(SceneObject::new(id, Renderable::Lines(LineSet::default()), Transform3D::identity()))
    }

    #[test]
    fn test_add_is_idempotent() {
        let mut store = SceneStore::new();
        let first = object(ObjectId::lidar(LidarName::Top));
        assert!(store.add(first.clone()));
        assert!(!store.add(object(ObjectId::lidar(LidarName::Top))));
        assert_eq!(store.len(), 1);
        assert!(Arc::ptr_eq(store.get(&first.id).unwrap(), &first));
    }

    #[test]
    fn test_insert_or_replace_swaps_object() {
        let mut store = SceneStore::new();
        let first = object(ObjectId::lidar(LidarName::Top));
        let second = object(ObjectId::lidar(LidarName::Top));
        assert!(store.insert_or_replace(first.clone()).is_none());
        let replaced = store.insert_or_replace(second.clone()).unwrap();
        assert!(Arc::ptr_eq(&replaced, &first));
        assert!(Arc::ptr_eq(store.get(&second.id).unwrap(), &second));
    }

    #[test]
    fn test_remove_absent_is_noop() {
        let mut store = SceneStore::new();
        store.add(object(ObjectId::lidar(LidarName::Front)));
        assert!(store.remove(&ObjectId::lidar(LidarName::Rear)).is_none());
        assert_eq!(store.len(), 1);
        assert!(store.has(&ObjectId::lidar(LidarName::Front)));
    }

    #[test]
    fn test_all_filters_by_category() {
        let mut store = SceneStore::new();
        store.add(object(ObjectId::lidar(LidarName::Front)));
        store.add(object(ObjectId::frustum(CameraName::Front)));
        store.add(object(ObjectId::lidar(LidarName::Top)));

        let lidars: Vec<_> = store.all(Category::Lidar).map(|o| o.id.name.clone()).collect();
        assert_eq!(lidars, ["FRONT", "TOP"]);
        assert_eq!(store.all(Category::CameraFrustum).count(), 1);
        assert_eq!(store.all(Category::Label).count(), 0);
    }
}
