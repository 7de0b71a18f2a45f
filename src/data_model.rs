use std::sync::Arc;

use parking_lot::RwLock;

use crate::scene::Scene;

/// Thread-safe holder for the scene graph, which may still be loading.
///
/// Clones share the same slot, so a loader thread can fill it while the
/// frame loop keeps querying an empty model.
#[derive(Debug, Default)]
pub struct DataModel {
    slot: Arc<RwLock<Slot>>,
}

#[derive(Debug, Default)]
struct Slot {
    scene: Option<Scene>,
    /// Bumped on every replacement so consumers can tell scenes apart.
    revision: u64,
}

impl Clone for DataModel {
    fn clone(&self) -> Self {
        Self {
            slot: Arc::clone(&self.slot),
        }
    }
}

impl DataModel {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_scene(scene: Scene) -> Self {
        let model = Self::new();
        model.replace_scene(scene);
        model
    }

    pub fn replace_scene(&self, scene: Scene) -> Option<Scene> {
        let mut slot = self.slot.write();
        slot.revision += 1;
        slot.scene.replace(scene)
    }

    pub fn is_loaded(&self) -> bool {
        self.slot.read().scene.is_some()
    }

    /// Revision of the installed scene; zero until the first load.
    pub fn revision(&self) -> u64 {
        self.slot.read().revision
    }

    /// Runs `reader` against the scene, or returns `None` while unloaded.
    pub fn read<F, R>(&self, reader: F) -> Option<R>
    where
        F: FnOnce(&Scene) -> R,
    {
        self.slot.read().scene.as_ref().map(reader)
    }

    /// Applies a mutation to the scene, or returns `None` while unloaded.
    pub fn update<F, R>(&self, updater: F) -> Option<R>
    where
        F: FnOnce(&mut Scene) -> R,
    {
        self.slot.write().scene.as_mut().map(updater)
    }

    pub fn clear(&self) -> Option<Scene> {
        self.slot.write().scene.take()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;
    use glam::Vec3;

    #[test]
    fn queries_before_load_are_noops() {
        let model = DataModel::new();
        assert!(!model.is_loaded());
        assert_eq!(model.read(|scene| scene.len()), None);
        assert_eq!(model.update(|scene| scene.len()), None);
    }

    #[test]
    fn clones_share_the_loaded_scene() {
        let model = DataModel::new();
        let loader = model.clone();
        let mut scene = Scene::new();
        scene.add_node(scene.root(), SceneNode::group("Lid"));
        assert!(loader.replace_scene(scene).is_none());
        assert_eq!(model.revision(), 1);

        assert!(model.is_loaded());
        let moved = model.update(|scene| {
            let id = scene.find_by_name("Lid").unwrap();
            scene.set_position(id, Vec3::ONE)
        });
        assert_eq!(moved, Some(true));
        let position = loader.read(|scene| {
            let id = scene.find_by_name("Lid").unwrap();
            scene.node(id).unwrap().position
        });
        assert_eq!(position, Some(Vec3::ONE));

        assert!(model.clear().is_some());
        assert!(!loader.is_loaded());
    }
}
