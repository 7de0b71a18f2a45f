//! Interactive exploded-view engine.
//!
//! A scene graph of named parts is driven by one progress value: every part
//! listed in an explosion config travels along its own direction during its
//! own slice of the progress range. Clicking a part selects its top-level
//! assembly and ghosts everything else until it is clicked again. Rendering
//! and windowing stay outside of the crate so the engine can be embedded in
//! any host and exercised headlessly.

pub mod camera;
pub mod config;
pub mod data_model;
pub mod editor_sync;
pub mod error;
pub mod geometry;
pub mod highlight;
pub mod input;
pub mod obj;
pub mod scene;
pub mod scheduler;
pub mod selection;
pub mod timeline;
pub mod viewer;

pub use camera::Camera;
pub use config::{
    ExplosionConfigStore, ExplosionEntry, GlobalAnimationState, HighlightOptions,
    ReconstructionPolicy, ViewerOptions,
};
pub use data_model::DataModel;
pub use editor_sync::{EditorSync, Reconstruction};
pub use error::{ConfigError, SyncError};
pub use geometry::{ease_in_out_cubic, Aabb, Ray};
pub use highlight::{HighlightMode, HighlightState, HighlightStateMachine, Material};
pub use input::{normalize_pointer, InputEvent, Modifiers, ScreenRect};
pub use obj::{load_obj_from_str, MeshGeometry};
pub use scene::{NodeId, NodeKind, RayHit, Scene, SceneNode};
pub use scheduler::{AnimatableItem, ExplosionScheduler, TimeWindow, TimingMode};
pub use selection::{SelectionOutcome, SelectionResolver};
pub use timeline::{PlaybackState, ScrollDriver, Timeline};
pub use viewer::{ExplodedViewer, ViewerEvent};
