//! Progress driven explosion scheduling.
//!
//! Every part named in the [`ExplosionConfigStore`] becomes an
//! [`AnimatableItem`] anchored at the position it had when it was first
//! registered. A single global progress value is mapped through each item's
//! time window and an ease-in-out curve onto a travel distance along the
//! item's direction.

use std::collections::{HashMap, HashSet};

use glam::Vec3;
use log::{info, warn};
use serde::{Deserialize, Serialize};

use crate::config::{ExplosionConfigStore, ExplosionEntry, GlobalAnimationState};
use crate::geometry::{ease_in_out_cubic, EPSILON};
use crate::scene::{NodeId, Scene};

/// Sub-range of global progress over which one item travels.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TimeWindow {
    pub start: f32,
    pub end: f32,
}

impl Default for TimeWindow {
    fn default() -> Self {
        Self::FULL
    }
}

impl TimeWindow {
    pub const FULL: Self = Self {
        start: 0.0,
        end: 1.0,
    };

    /// Clamps both bounds into [0, 1] and orders them.
    pub fn new(start: f32, end: f32) -> Self {
        let start = start.clamp(0.0, 1.0);
        let end = end.clamp(0.0, 1.0);
        Self {
            start: start.min(end),
            end: start.max(end),
        }
    }

    /// Slot `sequence` (1-based) of `max_sequence` equal slots.
    pub fn from_sequence(sequence: f32, max_sequence: u32) -> Self {
        let max = max_sequence.max(1) as f32;
        let slot = sequence.round().clamp(1.0, max);
        Self::new((slot - 1.0) / max, slot / max)
    }

    pub fn len(&self) -> f32 {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.len() <= EPSILON
    }

    /// Eased progress of this window at `exp_factor`: 0 before `start`, 1
    /// after `end`, and a step at `start` for zero-length windows.
    pub fn local_progress(&self, exp_factor: f32) -> f32 {
        if self.is_empty() {
            return if exp_factor >= self.start { 1.0 } else { 0.0 };
        }
        let raw = ((exp_factor - self.start) / self.len()).clamp(0.0, 1.0);
        ease_in_out_cubic(raw)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimingMode {
    /// Explicit `start`/`end`, else sequence slot, else the full range.
    #[default]
    Windowed,
    /// Sequence slots only; unsequenced or level 0 items stay put.
    Sequential,
}

impl TimingMode {
    pub fn from_state(state: &GlobalAnimationState) -> Self {
        if state.use_sequence_anim {
            Self::Sequential
        } else {
            Self::Windowed
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct AnimatableItem {
    pub node: NodeId,
    pub name: String,
    /// Rest pose every offset is computed from.
    pub original_position: Vec3,
    pub direction: Vec3,
    pub level: f32,
    pub time_window: TimeWindow,
    pub sequence: Option<f32>,
    pub sequence_window: Option<TimeWindow>,
    pub speed_multiplier: f32,
}

impl AnimatableItem {
    /// Active window under `mode`, `None` when the item is pinned.
    pub fn window(&self, mode: TimingMode) -> Option<TimeWindow> {
        match mode {
            TimingMode::Windowed => Some(self.time_window),
            TimingMode::Sequential if self.level <= 0.0 => None,
            TimingMode::Sequential => self.sequence_window,
        }
    }

    pub fn local_progress(&self, exp_factor: f32, mode: TimingMode) -> f32 {
        self.window(mode)
            .map_or(0.0, |window| window.local_progress(exp_factor))
    }

    pub fn offset(&self, exp_factor: f32, layer_distance: f32, mode: TimingMode) -> Vec3 {
        let progress = self.local_progress(exp_factor, mode);
        if progress <= 0.0 {
            return Vec3::ZERO;
        }
        let distance = self.level * layer_distance * progress * self.speed_multiplier;
        if !distance.is_finite() {
            return Vec3::ZERO;
        }
        self.direction * distance
    }

    pub fn position_at(&self, state: &GlobalAnimationState) -> Vec3 {
        self.original_position
            + self.offset(
                state.exp_factor,
                state.layer_distance,
                TimingMode::from_state(state),
            )
    }
}

/// Ordered list of animatable items derived from a scene and a config store.
#[derive(Debug, Clone, Default)]
pub struct ExplosionScheduler {
    items: Vec<AnimatableItem>,
    max_sequence: u32,
}

impl ExplosionScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Derives one item per node whose name appears in `store`, capturing
    /// each node's current position as its rest pose.
    pub fn parse(scene: &Scene, store: &ExplosionConfigStore, state: &GlobalAnimationState) -> Self {
        let mut scheduler = Self::new();
        scheduler.derive(scene, store, state);
        scheduler
    }

    /// Re-derives all items from a (possibly replaced) store.
    ///
    /// Nodes that were already tracked keep their rest pose; nodes that are
    /// no longer configured are returned to it.
    pub fn rebuild(
        &mut self,
        scene: &mut Scene,
        store: &ExplosionConfigStore,
        state: &GlobalAnimationState,
    ) {
        for (id, anchor) in self.derive(scene, store, state) {
            scene.set_position(id, anchor);
        }
    }

    /// Replaces the item list; returns rest poses of nodes no longer tracked.
    fn derive(
        &mut self,
        scene: &Scene,
        store: &ExplosionConfigStore,
        state: &GlobalAnimationState,
    ) -> Vec<(NodeId, Vec3)> {
        let anchors: HashMap<NodeId, Vec3> = self
            .items
            .iter()
            .map(|item| (item.node, item.original_position))
            .collect();

        let mut matched: Vec<(NodeId, String, &ExplosionEntry)> = Vec::new();
        scene.traverse(|id, node| {
            if let Some(entry) = store.get(&node.name) {
                matched.push((id, node.name.clone(), entry));
            }
        });

        let max_sequence = matched
            .iter()
            .filter_map(|(_, _, entry)| finite(entry.sequence))
            .map(|sequence| sequence.round().max(1.0) as u32)
            .max()
            .unwrap_or(0);

        let global_direction = state.global_direction();
        let mut items: Vec<AnimatableItem> = matched
            .iter()
            .filter_map(|(id, name, entry)| {
                let current = scene.node(*id)?.position;
                let original_position = anchors.get(id).copied().unwrap_or(current);
                Some(build_item(
                    *id,
                    name,
                    entry,
                    original_position,
                    global_direction,
                    max_sequence,
                ))
            })
            .collect();
        items.sort_by(|a, b| a.time_window.start.total_cmp(&b.time_window.start));

        let still_tracked: HashSet<NodeId> = items.iter().map(|item| item.node).collect();
        let released = anchors
            .into_iter()
            .filter(|(id, _)| !still_tracked.contains(id))
            .collect();

        let configured: HashSet<&str> = matched.iter().map(|(_, name, _)| name.as_str()).collect();
        for (name, _) in store.iter() {
            if !configured.contains(name) {
                warn!("explosion entry {name:?} does not match any scene node");
            }
        }

        info!(
            "derived {} animatable item(s), max sequence {max_sequence}",
            items.len()
        );
        self.items = items;
        self.max_sequence = max_sequence;
        released
    }

    /// Moves every item's node to `original + offset` for the current state.
    pub fn update(&self, scene: &mut Scene, state: &GlobalAnimationState) -> usize {
        let mode = TimingMode::from_state(state);
        let mut moved = 0;
        for item in &self.items {
            let Some(node) = scene.node_mut(item.node) else {
                continue;
            };
            node.position = item.original_position
                + item.offset(state.exp_factor, state.layer_distance, mode);
            moved += 1;
        }
        moved
    }

    pub fn restore(&self, scene: &mut Scene) {
        for item in &self.items {
            scene.set_position(item.node, item.original_position);
        }
    }

    pub fn clear(&mut self) {
        self.items.clear();
        self.max_sequence = 0;
    }

    pub fn items(&self) -> &[AnimatableItem] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn max_sequence(&self) -> u32 {
        self.max_sequence
    }

    pub fn item_for(&self, node: NodeId) -> Option<&AnimatableItem> {
        self.items.iter().find(|item| item.node == node)
    }

    pub fn item_for_mut(&mut self, node: NodeId) -> Option<&mut AnimatableItem> {
        self.items.iter_mut().find(|item| item.node == node)
    }
}

fn finite(value: Option<f32>) -> Option<f32> {
    value.filter(|v| v.is_finite())
}

fn build_item(
    node: NodeId,
    name: &str,
    entry: &ExplosionEntry,
    original_position: Vec3,
    global_direction: Vec3,
    max_sequence: u32,
) -> AnimatableItem {
    let direction = entry
        .direction()
        .and_then(Vec3::try_normalize)
        .unwrap_or(global_direction);
    let level = if entry.level.is_finite() {
        entry.level.max(0.0)
    } else {
        0.0
    };
    let sequence = finite(entry.sequence);
    let sequence_window = sequence.map(|sequence| TimeWindow::from_sequence(sequence, max_sequence));

    let (start, end) = (finite(entry.start), finite(entry.end));
    let time_window = if start.is_some() || end.is_some() {
        TimeWindow::new(start.unwrap_or(0.0), end.unwrap_or(1.0))
    } else if let Some(window) = sequence_window {
        window
    } else if max_sequence > 0 {
        TimeWindow::from_sequence(max_sequence as f32, max_sequence)
    } else {
        TimeWindow::FULL
    };

    AnimatableItem {
        node,
        name: name.to_string(),
        original_position,
        direction,
        level,
        time_window,
        sequence,
        sequence_window,
        speed_multiplier: finite(entry.speed_multiplier).unwrap_or(1.0).max(1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::SceneNode;

    fn approx(a: Vec3, b: Vec3) -> bool {
        (a - b).length() < 1e-4
    }

    fn scene_with(names: &[&str]) -> Scene {
        let mut scene = Scene::new();
        let root = scene.root();
        for name in names {
            scene.add_node(root, SceneNode::group(*name));
        }
        scene
    }

    fn state(layer_distance: f32, exp_factor: f32) -> GlobalAnimationState {
        GlobalAnimationState {
            layer_distance,
            exp_factor,
            ..GlobalAnimationState::default()
        }
    }

    #[test]
    fn zero_length_window_is_a_step() {
        let window = TimeWindow::new(0.4, 0.4);
        assert_eq!(window.local_progress(0.3999), 0.0);
        assert_eq!(window.local_progress(0.4), 1.0);
        assert_eq!(window.local_progress(0.9), 1.0);
    }

    #[test]
    fn local_progress_is_monotonic_and_flat_outside_window() {
        let window = TimeWindow::new(0.2, 0.7);
        let mut last = 0.0;
        for step in 0..=200 {
            let p = step as f32 / 200.0;
            let value = window.local_progress(p);
            assert!(value >= last);
            if p < 0.19 {
                assert_eq!(value, 0.0);
            }
            if p > 0.71 {
                assert_eq!(value, 1.0);
            }
            last = value;
        }
    }

    #[test]
    fn window_bounds_are_clamped_and_ordered() {
        assert_eq!(TimeWindow::new(0.8, -1.0), TimeWindow { start: 0.0, end: 0.8 });
    }

    #[test]
    fn symmetric_midpoint_scales_by_level() {
        let mut scene = scene_with(&["A", "B"]);
        let store: ExplosionConfigStore = [
            ("A".to_string(), ExplosionEntry::new(1.0).with_direction([0.0, 1.0, 0.0]).with_window(0.0, 1.0)),
            ("B".to_string(), ExplosionEntry::new(2.0).with_direction([1.0, 0.0, 0.0]).with_window(0.0, 1.0)),
        ]
        .into_iter()
        .collect();
        let state = state(1.0, 0.5);
        let scheduler = ExplosionScheduler::parse(&scene, &store, &state);
        assert_eq!(scheduler.update(&mut scene, &state), 2);

        let a = scene.find_by_name("A").unwrap();
        let b = scene.find_by_name("B").unwrap();
        assert!(approx(scene.node(a).unwrap().position, Vec3::new(0.0, 0.5, 0.0)));
        assert!(approx(scene.node(b).unwrap().position, Vec3::new(1.0, 0.0, 0.0)));
    }

    #[test]
    fn sequence_numbers_split_the_range() {
        let scene = scene_with(&["First", "Second", "Loose"]);
        let store: ExplosionConfigStore = [
            ("First".to_string(), ExplosionEntry::new(1.0).with_sequence(1.0)),
            ("Second".to_string(), ExplosionEntry::new(1.0).with_sequence(2.0)),
            ("Loose".to_string(), ExplosionEntry::new(1.0)),
        ]
        .into_iter()
        .collect();
        let scheduler = ExplosionScheduler::parse(&scene, &store, &GlobalAnimationState::default());
        assert_eq!(scheduler.max_sequence(), 2);

        let window = |name: &str| {
            scheduler
                .items()
                .iter()
                .find(|item| item.name == name)
                .unwrap()
                .time_window
        };
        assert_eq!(window("First"), TimeWindow::new(0.0, 0.5));
        assert_eq!(window("Second"), TimeWindow::new(0.5, 1.0));
        assert_eq!(window("Loose"), TimeWindow::new(0.5, 1.0));
        assert_eq!(scheduler.items()[0].name, "First");
    }

    #[test]
    fn sequential_mode_pins_unsequenced_and_static_items() {
        let mut scene = scene_with(&["Seq", "Loose", "Static"]);
        let store: ExplosionConfigStore = [
            ("Seq".to_string(), ExplosionEntry::new(1.0).with_sequence(1.0).with_window(0.9, 1.0).with_direction([0.0, 0.0, 1.0])),
            ("Loose".to_string(), ExplosionEntry::new(1.0)),
            ("Static".to_string(), ExplosionEntry::new(0.0).with_sequence(1.0)),
        ]
        .into_iter()
        .collect();
        let state = GlobalAnimationState {
            use_sequence_anim: true,
            ..state(1.0, 1.0)
        };
        let scheduler = ExplosionScheduler::parse(&scene, &store, &state);
        scheduler.update(&mut scene, &state);

        let position = |name: &str| scene.node(scene.find_by_name(name).unwrap()).unwrap().position;
        assert!(approx(position("Seq"), Vec3::Z));
        assert_eq!(position("Loose"), Vec3::ZERO);
        assert_eq!(position("Static"), Vec3::ZERO);

        let seq = scheduler.items().iter().find(|i| i.name == "Seq").unwrap();
        assert_eq!(seq.window(TimingMode::Sequential), Some(TimeWindow::FULL));
        assert_eq!(seq.window(TimingMode::Windowed), Some(TimeWindow::new(0.9, 1.0)));
    }

    #[test]
    fn defaults_follow_global_direction_and_speed() {
        let mut scene = scene_with(&["Part"]);
        let store: ExplosionConfigStore = [("Part".to_string(), ExplosionEntry::new(1.0).with_speed(2.0))]
            .into_iter()
            .collect();
        let state = GlobalAnimationState {
            global_exp_direction: [0.0, 0.0, 3.0],
            ..state(0.5, 1.0)
        };
        let scheduler = ExplosionScheduler::parse(&scene, &store, &state);
        scheduler.update(&mut scene, &state);
        let part = scene.find_by_name("Part").unwrap();
        assert!(approx(scene.node(part).unwrap().position, Vec3::new(0.0, 0.0, 1.0)));

        let slow: ExplosionConfigStore = [("Part".to_string(), ExplosionEntry::new(1.0).with_speed(0.2))]
            .into_iter()
            .collect();
        let scheduler = ExplosionScheduler::parse(&scene, &slow, &state);
        assert_eq!(scheduler.items()[0].speed_multiplier, 1.0);
    }

    #[test]
    fn rebuild_keeps_rest_pose_and_releases_dropped_items() {
        let mut scene = scene_with(&["A", "B"]);
        let both: ExplosionConfigStore = [
            ("A".to_string(), ExplosionEntry::new(1.0).with_direction([1.0, 0.0, 0.0])),
            ("B".to_string(), ExplosionEntry::new(1.0).with_direction([0.0, 1.0, 0.0])),
        ]
        .into_iter()
        .collect();
        let state = state(1.0, 1.0);
        let mut scheduler = ExplosionScheduler::parse(&scene, &both, &state);
        scheduler.update(&mut scene, &state);

        let only_a: ExplosionConfigStore = [("A".to_string(), ExplosionEntry::new(2.0).with_direction([1.0, 0.0, 0.0]))]
            .into_iter()
            .collect();
        scheduler.rebuild(&mut scene, &only_a, &state);
        assert_eq!(scheduler.len(), 1);
        assert_eq!(scheduler.items()[0].original_position, Vec3::ZERO);

        let b = scene.find_by_name("B").unwrap();
        assert_eq!(scene.node(b).unwrap().position, Vec3::ZERO);

        scheduler.update(&mut scene, &state);
        let a = scene.find_by_name("A").unwrap();
        assert!(approx(scene.node(a).unwrap().position, Vec3::new(2.0, 0.0, 0.0)));
    }

    #[test]
    fn update_skips_removed_nodes() {
        let mut scene = scene_with(&["A"]);
        let store: ExplosionConfigStore = [("A".to_string(), ExplosionEntry::new(1.0))].into_iter().collect();
        let scheduler = ExplosionScheduler::parse(&scene, &store, &GlobalAnimationState::default());
        let a = scene.find_by_name("A").unwrap();
        scene.remove_node(a);
        assert_eq!(scheduler.update(&mut scene, &GlobalAnimationState::default()), 0);
    }

    #[test]
    fn unbounded_layer_distance_never_writes_nan() {
        let mut scene = scene_with(&["A"]);
        let store: ExplosionConfigStore = [("A".to_string(), ExplosionEntry::new(1.0).with_direction([1.0, 0.0, 0.0]))]
            .into_iter()
            .collect();
        let a = scene.find_by_name("A").unwrap();
        for exp_factor in [0.0, 0.5, 1.0] {
            let state = state(f32::INFINITY, exp_factor);
            let scheduler = ExplosionScheduler::parse(&scene, &store, &state);
            scheduler.update(&mut scene, &state);
            assert_eq!(scene.node(a).unwrap().position, Vec3::ZERO);
        }
    }
}
