use std::path::Path;
use std::time::Duration;

use glam::{Vec2, Vec3};
use log::{debug, error, info, warn};

use crate::camera::Camera;
use crate::config::{ExplosionConfigStore, GlobalAnimationState, ViewerOptions};
use crate::data_model::DataModel;
use crate::editor_sync::{EditorSync, Reconstruction};
use crate::error::{ConfigError, SyncError};
use crate::highlight::HighlightStateMachine;
use crate::input::{normalize_pointer, InputEvent, Modifiers, ScreenRect};
use crate::scene::{NodeId, Scene};
use crate::scheduler::{AnimatableItem, ExplosionScheduler};
use crate::selection::{SelectionOutcome, SelectionResolver};
use crate::timeline::{ScrollDriver, Timeline};

/// Notifications for the host's information display and tooling.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ViewerEvent {
    SelectionChanged(Option<NodeId>),
    HighlightReset,
    ObjectSelected {
        node: NodeId,
        position: Vec3,
        multi_select: bool,
    },
    ItemsDerived(usize),
}

/// Frame and event driven façade over the explosion and selection engine.
///
/// The scene and the explosion config may arrive in either order; items are
/// derived once both are present. Every call before that is a no-op.
#[derive(Debug)]
pub struct ExplodedViewer {
    model: DataModel,
    scene_revision: u64,
    store: Option<ExplosionConfigStore>,
    items_current: bool,
    state: GlobalAnimationState,
    scheduler: ExplosionScheduler,
    sync: EditorSync,
    selection: SelectionResolver,
    highlight: HighlightStateMachine,
    timeline: Timeline,
    scroll: ScrollDriver,
    camera: Option<Camera>,
    events: Vec<ViewerEvent>,
    destroyed: bool,
}

impl Default for ExplodedViewer {
    fn default() -> Self {
        Self::new(ViewerOptions::default())
    }
}

impl ExplodedViewer {
    pub fn new(options: ViewerOptions) -> Self {
        let mut state = options.animation_config;
        state.normalize();
        Self {
            model: DataModel::new(),
            scene_revision: 0,
            store: None,
            items_current: false,
            timeline: Timeline::new(state.animation_duration()),
            state,
            scheduler: ExplosionScheduler::new(),
            sync: EditorSync::new(options.reconstruction),
            selection: SelectionResolver::new(options.edit_mode),
            highlight: HighlightStateMachine::new(&options.highlight_options),
            scroll: ScrollDriver::default(),
            camera: None,
            events: Vec::new(),
            destroyed: false,
        }
    }

    pub fn data_model(&self) -> DataModel {
        self.model.clone()
    }

    pub fn set_scene(&mut self, scene: Scene) {
        if !self.alive("set_scene") {
            return;
        }
        info!("scene loaded with {} node(s)", scene.len() - 1);
        self.model.replace_scene(scene);
        self.refresh();
    }

    pub fn is_scene_loaded(&self) -> bool {
        self.model.is_loaded()
    }

    /// Replaces the explosion config; items are re-derived against the
    /// current scene, keeping rest poses of parts that stay configured.
    pub fn set_explosion_config(&mut self, store: ExplosionConfigStore) {
        if !self.alive("set_explosion_config") {
            return;
        }
        info!("explosion config loaded with {} entr(ies)", store.len());
        self.store = Some(store);
        self.items_current = false;
        self.refresh();
    }

    /// Parses and installs a config document. A malformed document is
    /// logged and installed as an empty config, so the explosion is a no-op.
    pub fn load_explosion_config_str(&mut self, json: &str) -> bool {
        match ExplosionConfigStore::from_json(json) {
            Ok(store) => {
                self.set_explosion_config(store);
                true
            }
            Err(err) => {
                error!("failed to load explosion config: {err}");
                self.set_explosion_config(ExplosionConfigStore::new());
                false
            }
        }
    }

    pub fn load_explosion_config<P: AsRef<Path>>(&mut self, path: P) -> bool {
        match ExplosionConfigStore::load(path) {
            Ok(store) => {
                self.set_explosion_config(store);
                true
            }
            Err(err) => {
                error!("failed to load explosion config: {err:#}");
                self.set_explosion_config(ExplosionConfigStore::new());
                false
            }
        }
    }

    pub fn explosion_config(&self) -> Option<&ExplosionConfigStore> {
        self.store.as_ref()
    }

    pub fn export_config(&self) -> Result<String, ConfigError> {
        match &self.store {
            Some(store) => store.to_json_pretty(),
            None => ExplosionConfigStore::new().to_json_pretty(),
        }
    }

    pub fn items(&self) -> &[AnimatableItem] {
        self.scheduler.items()
    }

    pub fn animation_state(&self) -> &GlobalAnimationState {
        &self.state
    }

    pub fn set_animation_state(&mut self, mut state: GlobalAnimationState) {
        if !self.alive("set_animation_state") {
            return;
        }
        state.normalize();
        self.timeline.set_duration(state.animation_duration());
        self.state = state;
        // Unconfigured directions fall back to the global one at derive time.
        self.items_current = false;
        self.refresh();
        self.apply_positions();
    }

    pub fn exp_factor(&self) -> f32 {
        self.state.exp_factor
    }

    pub fn set_exp_factor(&mut self, value: f32) {
        if !self.alive("set_exp_factor") {
            return;
        }
        self.timeline.stop();
        self.scroll.cancel();
        self.state.set_exp_factor(value);
        self.apply_positions();
    }

    pub fn set_camera(&mut self, camera: Camera) {
        if !self.alive("set_camera") {
            return;
        }
        self.camera = Some(camera);
    }

    pub fn selected(&self) -> Option<NodeId> {
        self.selection.selected()
    }

    pub fn highlight(&self) -> &HighlightStateMachine {
        &self.highlight
    }

    pub fn edit_mode(&self) -> bool {
        self.selection.edit_mode()
    }

    /// Entering edit mode closes the information display.
    pub fn set_edit_mode(&mut self, enabled: bool) {
        if !self.alive("set_edit_mode") {
            return;
        }
        self.selection.set_edit_mode(enabled);
        if enabled {
            self.close_info();
        }
    }

    pub fn is_playing(&self) -> bool {
        self.timeline.is_running()
    }

    pub fn play(&mut self) {
        if !self.alive("play") {
            return;
        }
        self.scroll.cancel();
        self.timeline.start(self.state.exp_factor);
    }

    pub fn pause(&mut self) -> bool {
        self.alive("pause") && self.timeline.pause()
    }

    pub fn resume(&mut self) -> bool {
        self.alive("resume") && self.timeline.resume()
    }

    pub fn toggle_playback(&mut self) {
        if !self.alive("toggle_playback") {
            return;
        }
        self.scroll.cancel();
        self.timeline.toggle(self.state.exp_factor);
    }

    /// Advances tweens by `dt` and repositions every item. Returns the number
    /// of nodes positioned.
    pub fn frame(&mut self, dt: Duration) -> usize {
        if self.destroyed {
            return 0;
        }
        self.refresh();
        if let Some(value) = self.timeline.advance(dt) {
            self.state.set_exp_factor(value);
        } else if let Some(value) = self.scroll.advance(dt) {
            self.state.set_exp_factor(value);
        }
        self.apply_positions()
    }

    pub fn handle_input(&mut self, event: InputEvent, rect: &ScreenRect) {
        match event {
            InputEvent::Click {
                position,
                modifiers,
            } => {
                self.click(position, modifiers, rect);
            }
            InputEvent::Scroll { delta } => self.scroll(delta),
            InputEvent::InfoPanelClosed => self.info_panel_closed(),
        }
    }

    pub fn click(&mut self, position: Vec2, modifiers: Modifiers, rect: &ScreenRect) -> SelectionOutcome {
        if !self.alive("click") {
            return SelectionOutcome::NoHit;
        }
        self.refresh();
        let ndc = normalize_pointer(position, rect);
        let aspect = rect.aspect();
        let camera = self.camera.map(|camera| camera.with_aspect(aspect));
        let selection = &mut self.selection;
        let highlight = &mut self.highlight;
        let events = &mut self.events;

        let outcome = self.model.update(|scene| {
            let camera = camera.unwrap_or_else(|| Camera::from_scene(scene, aspect));
            let ray = camera.ray_from_ndc(ndc);
            let outcome = selection.resolve(scene, &ray, modifiers);
            match outcome {
                SelectionOutcome::NoHit => {}
                SelectionOutcome::Selected(node) => {
                    highlight.highlight(scene, node);
                    events.push(ViewerEvent::SelectionChanged(Some(node)));
                }
                SelectionOutcome::Deselected(_) => {
                    highlight.reset(scene);
                    events.push(ViewerEvent::SelectionChanged(None));
                    events.push(ViewerEvent::HighlightReset);
                }
                SelectionOutcome::EditSelected {
                    node,
                    position,
                    multi_select,
                } => events.push(ViewerEvent::ObjectSelected {
                    node,
                    position,
                    multi_select,
                }),
            }
            outcome
        });
        let outcome = outcome.unwrap_or(SelectionOutcome::NoHit);
        debug!("click at {position:?} -> {outcome:?}");
        outcome
    }

    pub fn scroll(&mut self, delta: f32) {
        if !self.alive("scroll") {
            return;
        }
        if !self.state.allow_scroll_animation {
            debug!("scroll ignored: scroll animation disabled");
            return;
        }
        self.timeline.stop();
        self.scroll
            .on_delta(delta, self.state.scroll_sensitivity, self.state.exp_factor);
    }

    pub fn info_panel_closed(&mut self) {
        if !self.alive("info_panel_closed") {
            return;
        }
        self.close_info();
    }

    /// Re-anchors `node` after it was moved by hand, so later progress changes
    /// are relative to its new rest pose.
    pub fn node_moved(&mut self, node: NodeId) -> Result<Vec3, SyncError> {
        if !self.alive("node_moved") {
            return Err(SyncError::SceneNotLoaded);
        }
        let sync = self.sync;
        let scheduler = &mut self.scheduler;
        let state = &self.state;
        self.model
            .read(|scene| sync.update_original_position(scene, scheduler, state, node))
            .unwrap_or(Err(SyncError::SceneNotLoaded))
    }

    pub fn sync_node(&mut self, node: NodeId) -> Result<Reconstruction, SyncError> {
        if !self.alive("sync_node") {
            return Err(SyncError::SceneNotLoaded);
        }
        let Some(store) = self.store.as_mut() else {
            return Err(SyncError::NotAnimated);
        };
        let sync = self.sync;
        let scheduler = &mut self.scheduler;
        let state = &self.state;
        self.model
            .read(|scene| sync.sync(scene, scheduler, store, state, node))
            .unwrap_or(Err(SyncError::SceneNotLoaded))
    }

    pub fn drain_events(&mut self) -> Vec<ViewerEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn is_destroyed(&self) -> bool {
        self.destroyed
    }

    /// Restores highlighted materials and releases the scene, config and
    /// caches. Every later call is a no-op.
    pub fn destroy(&mut self) {
        if self.destroyed {
            return;
        }
        let highlight = &mut self.highlight;
        self.model.update(|scene| highlight.reset(scene));
        self.highlight.discard();
        self.selection.clear();
        self.scheduler.clear();
        self.store = None;
        self.items_current = false;
        self.timeline.stop();
        self.scroll.cancel();
        self.model.clear();
        self.events.clear();
        self.destroyed = true;
        info!("viewer destroyed");
    }

    fn alive(&self, operation: &str) -> bool {
        if self.destroyed {
            warn!("{operation} called on a destroyed viewer");
        }
        !self.destroyed
    }

    fn close_info(&mut self) {
        let had_selection = self.selection.clear().is_some();
        let had_highlight = self.highlight.target().is_some();
        if had_highlight {
            let highlight = &mut self.highlight;
            self.model.update(|scene| highlight.reset(scene));
        }
        if had_selection {
            self.events.push(ViewerEvent::SelectionChanged(None));
        }
        if had_selection || had_highlight {
            self.events.push(ViewerEvent::HighlightReset);
        }
    }

    /// Notices scene replacements and derives items once both the scene and
    /// the config are available.
    fn refresh(&mut self) {
        let revision = self.model.revision();
        if revision != self.scene_revision {
            self.scene_revision = revision;
            // Cached ids belong to the previous scene.
            let had_highlight = self.highlight.target().is_some();
            self.highlight.discard();
            self.scheduler.clear();
            self.items_current = false;
            let had_selection = self.selection.clear().is_some();
            if had_selection {
                self.events.push(ViewerEvent::SelectionChanged(None));
            }
            if had_selection || had_highlight {
                self.events.push(ViewerEvent::HighlightReset);
            }
        }
        if self.items_current {
            return;
        }
        let Some(store) = self.store.as_ref() else {
            return;
        };
        let scheduler = &mut self.scheduler;
        let state = &self.state;
        let derived = self.model.update(|scene| {
            scheduler.rebuild(scene, store, state);
            scheduler.update(scene, state);
            scheduler.len()
        });
        if let Some(count) = derived {
            self.items_current = true;
            self.events.push(ViewerEvent::ItemsDerived(count));
        }
    }

    fn apply_positions(&mut self) -> usize {
        let scheduler = &self.scheduler;
        let state = &self.state;
        self.model
            .update(|scene| scheduler.update(scene, state))
            .unwrap_or(0)
    }
}
