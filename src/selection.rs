use glam::Vec3;
use log::debug;

use crate::geometry::Ray;
use crate::input::Modifiers;
use crate::scene::{NodeId, Scene};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SelectionOutcome {
    /// Nothing selectable under the pointer; the selection is unchanged.
    NoHit,
    Selected(NodeId),
    /// The already selected part was clicked again.
    Deselected(NodeId),
    /// Edit mode: the part is handed to transform tooling instead of being
    /// selected for display.
    EditSelected {
        node: NodeId,
        position: Vec3,
        multi_select: bool,
    },
}

/// Turns pointer rays into top-level part selections.
#[derive(Debug, Clone, Default)]
pub struct SelectionResolver {
    selected: Option<NodeId>,
    edit_mode: bool,
}

impl SelectionResolver {
    pub fn new(edit_mode: bool) -> Self {
        Self {
            selected: None,
            edit_mode,
        }
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selected
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    pub fn set_edit_mode(&mut self, enabled: bool) {
        self.edit_mode = enabled;
    }

    pub fn clear(&mut self) -> Option<NodeId> {
        self.selected.take()
    }

    /// Walks from `node` up to the ancestor sitting directly under the root.
    /// Helpers and the root itself have no selectable ancestor.
    pub fn top_level(scene: &Scene, node: NodeId) -> Option<NodeId> {
        if scene.is_helper(node) {
            return None;
        }
        let mut current = node;
        loop {
            let parent = scene.node(current)?.parent()?;
            if parent == scene.root() {
                return Some(current);
            }
            current = parent;
        }
    }

    /// Nearest non-helper hit, resolved to its top-level part.
    pub fn pick(scene: &Scene, ray: &Ray) -> Option<NodeId> {
        let hit = scene.intersect_ray(ray, |id| !scene.is_helper(id))?;
        let top = Self::top_level(scene, hit.node)?;
        if let (Some(leaf), Some(part)) = (scene.node(hit.node), scene.node(top)) {
            debug!(
                "ray hit {:?} at {:.3}, resolved to {:?}",
                leaf.name, hit.distance, part.name
            );
        }
        Some(top)
    }

    /// Applies one click: toggles the selection, or in edit mode reports the
    /// part without changing the selection.
    pub fn resolve(&mut self, scene: &Scene, ray: &Ray, modifiers: Modifiers) -> SelectionOutcome {
        if self.selected.is_some_and(|id| !scene.contains(id)) {
            self.selected = None;
        }
        let Some(top) = Self::pick(scene, ray) else {
            return SelectionOutcome::NoHit;
        };

        if self.edit_mode {
            let position = scene.node(top).map_or(Vec3::ZERO, |node| node.position);
            return SelectionOutcome::EditSelected {
                node: top,
                position,
                multi_select: modifiers.multi_select(),
            };
        }

        if self.selected == Some(top) {
            self.selected = None;
            SelectionOutcome::Deselected(top)
        } else {
            self.selected = Some(top);
            SelectionOutcome::Selected(top)
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::highlight::Material;
    use crate::obj::MeshGeometry;
    use crate::scene::SceneNode;

    struct Fixture {
        scene: Scene,
        assembly: NodeId,
        bolt: NodeId,
        side: NodeId,
    }

    fn fixture() -> Fixture {
        let mut scene = Scene::new();
        let cube = Arc::new(MeshGeometry::cube());
        let material = Arc::new(Material::Standard { color: Vec3::ONE });
        let root = scene.root();
        let assembly = scene.add_node(root, SceneNode::group("Assembly"));
        let housing = scene.add_node(assembly, SceneNode::group("Housing"));
        let fasteners = scene.add_node(housing, SceneNode::group("Fasteners"));
        let bolt = scene.add_node(
            fasteners,
            SceneNode::mesh("Bolt", Arc::clone(&cube), Arc::clone(&material)),
        );
        let side = scene.add_node(
            root,
            SceneNode::mesh("Side", Arc::clone(&cube), Arc::clone(&material))
                .with_position(Vec3::new(5.0, 0.0, 0.0)),
        );
        let axes = scene.add_node(
            root,
            SceneNode::group("Axes")
                .as_helper()
                .with_position(Vec3::new(0.0, 0.0, 3.0)),
        );
        scene.add_node(axes, SceneNode::mesh("AxisZ", cube, material));
        Fixture {
            scene,
            assembly,
            bolt,
            side,
        }
    }

    // Offset from the cube's face diagonals so every ray crosses a triangle interior.
    fn ray_at(x: f32) -> Ray {
        Ray::new(Vec3::new(x + 0.1, 0.2, 10.0), Vec3::NEG_Z)
    }

    #[test]
    fn deep_leaf_resolves_to_its_assembly() {
        let f = fixture();
        assert_eq!(SelectionResolver::top_level(&f.scene, f.bolt), Some(f.assembly));
        assert_eq!(SelectionResolver::pick(&f.scene, &ray_at(0.0)), Some(f.assembly));
    }

    #[test]
    fn helpers_are_transparent_to_picking() {
        let f = fixture();
        let axis = f.scene.find_by_name("AxisZ").unwrap();
        assert_eq!(SelectionResolver::top_level(&f.scene, axis), None);
        // The helper cube sits between the ray origin and the assembly.
        assert_eq!(SelectionResolver::pick(&f.scene, &ray_at(0.0)), Some(f.assembly));
    }

    #[test]
    fn clicking_twice_toggles_off() {
        let f = fixture();
        let mut resolver = SelectionResolver::default();
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(0.0), Modifiers::NONE),
            SelectionOutcome::Selected(f.assembly)
        );
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(0.0), Modifiers::NONE),
            SelectionOutcome::Deselected(f.assembly)
        );
        assert_eq!(resolver.selected(), None);
    }

    #[test]
    fn clicking_another_part_replaces_and_misses_keep_selection() {
        let f = fixture();
        let mut resolver = SelectionResolver::default();
        resolver.resolve(&f.scene, &ray_at(0.0), Modifiers::NONE);
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(5.0), Modifiers::NONE),
            SelectionOutcome::Selected(f.side)
        );
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(20.0), Modifiers::NONE),
            SelectionOutcome::NoHit
        );
        assert_eq!(resolver.selected(), Some(f.side));
    }

    #[test]
    fn edit_mode_reports_without_selecting() {
        let f = fixture();
        let mut resolver = SelectionResolver::new(true);
        let modifiers = Modifiers {
            ctrl: true,
            meta: false,
        };
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(5.0), modifiers),
            SelectionOutcome::EditSelected {
                node: f.side,
                position: Vec3::new(5.0, 0.0, 0.0),
                multi_select: true,
            }
        );
        assert_eq!(resolver.selected(), None);
    }

    #[test]
    fn removed_selection_is_forgotten() {
        let mut f = fixture();
        let mut resolver = SelectionResolver::default();
        resolver.resolve(&f.scene, &ray_at(5.0), Modifiers::NONE);
        f.scene.remove_node(f.side);
        assert_eq!(
            resolver.resolve(&f.scene, &ray_at(5.0), Modifiers::NONE),
            SelectionOutcome::NoHit
        );
        assert_eq!(resolver.selected(), None);
    }
}
