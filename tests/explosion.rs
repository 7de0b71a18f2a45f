use std::sync::Arc;

use glam::Vec3;

use exploded_view::{
    EditorSync, ExplosionConfigStore, ExplosionEntry, ExplosionScheduler, GlobalAnimationState,
    HighlightOptions, HighlightStateMachine, Material, MeshGeometry, Modifiers, NodeId, Ray,
    ReconstructionPolicy, Scene, SceneNode, SelectionOutcome, SelectionResolver, SyncError,
    TimeWindow,
};

fn assert_close(actual: Vec3, expected: Vec3) {
    assert!(
        (actual - expected).length() < 1e-4,
        "expected {expected:?}, got {actual:?}"
    );
}

fn state(layer_distance: f32) -> GlobalAnimationState {
    GlobalAnimationState {
        layer_distance,
        ..GlobalAnimationState::default()
    }
}

fn group_scene(names: &[&str]) -> Scene {
    let mut scene = Scene::new();
    for name in names {
        scene.add_node(scene.root(), SceneNode::group(*name));
    }
    scene
}

fn position(scene: &Scene, name: &str) -> Vec3 {
    let id = scene.find_by_name(name).unwrap();
    scene.node(id).unwrap().position
}

#[test]
fn zero_length_window_is_a_step() {
    let window = TimeWindow::new(0.4, 0.4);
    assert_eq!(window.local_progress(0.0), 0.0);
    assert_eq!(window.local_progress(0.399), 0.0);
    assert_eq!(window.local_progress(0.4), 1.0);
    assert_eq!(window.local_progress(1.0), 1.0);
}

#[test]
fn local_progress_is_monotonic_and_flat_outside_its_window() {
    let window = TimeWindow::new(0.25, 0.75);
    let mut last = 0.0;
    for step in 0..=200 {
        let exp_factor = step as f32 / 200.0;
        let progress = window.local_progress(exp_factor);
        assert!(progress >= last);
        if exp_factor <= 0.25 {
            assert_eq!(progress, 0.0);
        }
        if exp_factor >= 0.75 {
            assert_eq!(progress, 1.0);
        }
        last = progress;
    }
}

#[test]
fn midpoint_scenario_scales_level_before_easing() {
    let mut scene = group_scene(&["A", "B"]);
    let store: ExplosionConfigStore = [
        (
            "A".to_string(),
            ExplosionEntry::new(1.0)
                .with_direction([0.0, 1.0, 0.0])
                .with_window(0.0, 1.0),
        ),
        (
            "B".to_string(),
            ExplosionEntry::new(2.0)
                .with_direction([1.0, 0.0, 0.0])
                .with_window(0.0, 1.0),
        ),
    ]
    .into_iter()
    .collect();
    let mut state = state(1.0);
    let scheduler = ExplosionScheduler::parse(&scene, &store, &state);
    state.set_exp_factor(0.5);
    assert_eq!(scheduler.update(&mut scene, &state), 2);
    assert_close(position(&scene, "A"), Vec3::new(0.0, 0.5, 0.0));
    assert_close(position(&scene, "B"), Vec3::new(1.0, 0.0, 0.0));
}

#[test]
fn sequence_numbers_split_the_range() {
    let scene = group_scene(&["First", "Second"]);
    let store: ExplosionConfigStore = [
        ("First".to_string(), ExplosionEntry::new(1.0).with_sequence(1.0)),
        ("Second".to_string(), ExplosionEntry::new(1.0).with_sequence(2.0)),
    ]
    .into_iter()
    .collect();
    let scheduler = ExplosionScheduler::parse(&scene, &store, &state(1.0));
    assert_eq!(scheduler.max_sequence(), 2);
    let first = scene.find_by_name("First").unwrap();
    let second = scene.find_by_name("Second").unwrap();
    assert_eq!(scheduler.item_for(first).unwrap().time_window, TimeWindow::new(0.0, 0.5));
    assert_eq!(scheduler.item_for(second).unwrap().time_window, TimeWindow::new(0.5, 1.0));
}

#[test]
fn editor_sync_round_trips_the_fully_exploded_pose() {
    let mut scene = group_scene(&["Gear"]);
    let mut store: ExplosionConfigStore = [(
        "Gear".to_string(),
        ExplosionEntry::new(3.0).with_direction([0.0, 3.0, 4.0]),
    )]
    .into_iter()
    .collect();
    let mut state = state(0.5);
    let mut scheduler = ExplosionScheduler::parse(&scene, &store, &state);
    state.set_exp_factor(1.0);
    scheduler.update(&mut scene, &state);
    let gear = scene.find_by_name("Gear").unwrap();

    let result = EditorSync::default()
        .sync(&scene, &mut scheduler, &mut store, &state, gear)
        .unwrap();
    assert!((result.level - 3.0).abs() < 1e-4);
    assert_close(result.direction, Vec3::new(0.0, 0.6, 0.8));
    let entry = store.get("Gear").unwrap();
    assert!((entry.level - 3.0).abs() < 1e-4);
}

#[test]
fn exact_policy_and_bad_layer_distance_leave_config_untouched() {
    let mut scene = group_scene(&["Cap"]);
    let mut store: ExplosionConfigStore = [("Cap".to_string(), ExplosionEntry::new(1.0))]
        .into_iter()
        .collect();
    let flat = state(0.0);
    let mut scheduler = ExplosionScheduler::parse(&scene, &store, &flat);
    let cap = scene.find_by_name("Cap").unwrap();
    scene.set_position(cap, Vec3::new(0.0, 2.0, 0.0));

    let err = EditorSync::default()
        .sync(&scene, &mut scheduler, &mut store, &flat, cap)
        .unwrap_err();
    assert_eq!(err, SyncError::InvalidLayerDistance(0.0));

    let err = EditorSync::new(ReconstructionPolicy::CurrentProgressExact)
        .sync(&scene, &mut scheduler, &mut store, &state(1.0), cap)
        .unwrap_err();
    assert_eq!(err, SyncError::NoProgress);
    assert_eq!(store.get("Cap").unwrap().level, 1.0);
}

struct Assembly {
    scene: Scene,
    assembly: NodeId,
    leaf: NodeId,
    other_leaf: NodeId,
}

fn assembly() -> Assembly {
    let mut scene = Scene::new();
    let cube = Arc::new(MeshGeometry::cube());
    let paint = |color: f32| Arc::new(Material::Standard { color: Vec3::splat(color) });
    let root = scene.root();
    let assembly = scene.add_node(root, SceneNode::group("Gearbox"));
    let stage = scene.add_node(assembly, SceneNode::group("Stage"));
    let shaft = scene.add_node(stage, SceneNode::group("Shaft"));
    let leaf = scene.add_node(shaft, SceneNode::mesh("Pin", Arc::clone(&cube), paint(0.2)));
    let other_leaf = scene.add_node(
        root,
        SceneNode::mesh("Cover", cube, paint(0.8)).with_position(Vec3::new(4.0, 0.0, 0.0)),
    );
    Assembly {
        scene,
        assembly,
        leaf,
        other_leaf,
    }
}

#[test]
fn deep_leaf_click_selects_the_top_level_assembly() {
    let f = assembly();
    let ray = Ray::new(Vec3::new(0.1, 0.2, 10.0), Vec3::NEG_Z);
    assert_eq!(SelectionResolver::top_level(&f.scene, f.leaf), Some(f.assembly));
    assert_eq!(SelectionResolver::pick(&f.scene, &ray), Some(f.assembly));
}

#[test]
fn toggle_law_leaves_the_cache_empty() {
    let mut f = assembly();
    let ray = Ray::new(Vec3::new(0.1, 0.2, 10.0), Vec3::NEG_Z);
    let mut resolver = SelectionResolver::default();
    let mut highlight = HighlightStateMachine::new(&HighlightOptions::default());

    match resolver.resolve(&f.scene, &ray, Modifiers::NONE) {
        SelectionOutcome::Selected(node) => {
            assert_eq!(highlight.highlight(&mut f.scene, node), 1);
        }
        other => panic!("expected a selection, got {other:?}"),
    }
    assert!(highlight.is_cached(f.other_leaf));

    match resolver.resolve(&f.scene, &ray, Modifiers::NONE) {
        SelectionOutcome::Deselected(node) => {
            assert_eq!(node, f.assembly);
            highlight.reset(&mut f.scene);
        }
        other => panic!("expected a deselection, got {other:?}"),
    }
    assert_eq!(resolver.selected(), None);
    assert_eq!(highlight.cached_count(), 0);
    assert_eq!(
        f.scene.node(f.other_leaf).unwrap().material.as_deref(),
        Some(&Material::Standard {
            color: Vec3::splat(0.8)
        })
    );
}

#[test]
fn reset_is_idempotent_even_after_nodes_vanish() {
    let mut f = assembly();
    let mut highlight = HighlightStateMachine::new(&HighlightOptions::default());
    highlight.highlight(&mut f.scene, f.assembly);
    f.scene.remove_node(f.other_leaf);

    assert_eq!(highlight.reset(&mut f.scene), 0);
    assert_eq!(highlight.cached_count(), 0);
    assert_eq!(highlight.reset(&mut f.scene), 0);
    assert_eq!(highlight.cached_count(), 0);
}
