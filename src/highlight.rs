use std::collections::HashMap;
use std::sync::Arc;

use glam::Vec3;
use log::{debug, warn};
use serde::{Deserialize, Serialize};

use crate::config::HighlightOptions;
use crate::scene::{NodeId, Scene};

/// Surface description carried by mesh leaves.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Material {
    Standard {
        color: Vec3,
    },
    Wireframe {
        color: Vec3,
        opacity: f32,
    },
    Ghost {
        color: Vec3,
        opacity: f32,
        metalness: f32,
        roughness: f32,
    },
}

/// Which de-emphasis material non-selected parts receive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HighlightMode {
    Wireframe,
    #[default]
    Ghost,
}

impl HighlightMode {
    pub fn material(self, color: Vec3) -> Material {
        match self {
            Self::Wireframe => Material::Wireframe {
                color,
                opacity: 0.3,
            },
            Self::Ghost => Material::Ghost {
                color,
                opacity: 0.9,
                metalness: 0.1,
                roughness: 0.7,
            },
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HighlightState {
    Idle,
    Highlighted(NodeId),
}

/// Swaps every top-level part except the selected one to a shared
/// de-emphasis material and restores the originals on reset.
///
/// Every cached material is restored (or dropped, if its node vanished)
/// before a new target is highlighted, so the cache never stacks.
#[derive(Debug)]
pub struct HighlightStateMachine {
    enabled: bool,
    material: Arc<Material>,
    target: Option<NodeId>,
    original_materials: HashMap<NodeId, Arc<Material>>,
}

impl HighlightStateMachine {
    pub fn new(options: &HighlightOptions) -> Self {
        Self {
            enabled: options.highlight_component,
            material: Arc::new(options.material()),
            target: None,
            original_materials: HashMap::new(),
        }
    }

    pub fn state(&self) -> HighlightState {
        match self.target {
            Some(target) => HighlightState::Highlighted(target),
            None => HighlightState::Idle,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn target(&self) -> Option<NodeId> {
        self.target
    }

    pub fn cached_count(&self) -> usize {
        self.original_materials.len()
    }

    pub fn is_cached(&self, id: NodeId) -> bool {
        self.original_materials.contains_key(&id)
    }

    pub fn de_emphasis_material(&self) -> &Arc<Material> {
        &self.material
    }

    /// De-emphasizes every top-level part except `target`; returns the number
    /// of leaves whose material was swapped.
    pub fn highlight(&mut self, scene: &mut Scene, target: NodeId) -> usize {
        if !self.enabled {
            return 0;
        }
        self.reset(scene);
        if !scene.contains(target) {
            return 0;
        }

        let siblings: Vec<NodeId> = scene
            .top_level_children()
            .iter()
            .copied()
            .filter(|id| *id != target && !scene.is_helper(*id))
            .collect();

        let mut swapped = 0;
        for sibling in siblings {
            for id in scene.subtree(sibling) {
                if self.original_materials.contains_key(&id) {
                    continue;
                }
                let Some(node) = scene.node_mut(id) else {
                    continue;
                };
                let Some(slot) = node.material.as_mut() else {
                    continue;
                };
                let original = std::mem::replace(slot, Arc::clone(&self.material));
                self.original_materials.insert(id, original);
                swapped += 1;
            }
        }

        self.target = Some(target);
        debug!("highlight applied: {swapped} material(s) swapped");
        swapped
    }

    /// Restores every cached material and clears the cache. Idempotent.
    pub fn reset(&mut self, scene: &mut Scene) -> usize {
        if self.target.is_none() && self.original_materials.is_empty() {
            return 0;
        }
        let mut restored = 0;
        for (id, material) in self.original_materials.drain() {
            match scene.node_mut(id) {
                Some(node) => {
                    node.material = Some(material);
                    restored += 1;
                }
                None => warn!("skipping material restore for a node no longer in the scene"),
            }
        }
        self.target = None;
        debug!("highlight reset: {restored} material(s) restored");
        restored
    }

    /// Drops the cache without touching any scene, for when the scene it
    /// refers to has been replaced or released.
    pub fn discard(&mut self) {
        self.original_materials.clear();
        self.target = None;
    }
}
