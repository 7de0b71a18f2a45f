use glam::Vec3;
use log::{debug, warn};

use crate::config::{ExplosionConfigStore, GlobalAnimationState, ReconstructionPolicy};
use crate::error::SyncError;
use crate::geometry::EPSILON;
use crate::scene::{NodeId, Scene};
use crate::scheduler::{AnimatableItem, ExplosionScheduler, TimingMode};

/// Declarative parameters recovered from an edited pose.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reconstruction {
    pub level: f32,
    pub direction: Vec3,
    /// Progress the observed offset was divided by.
    pub effective_progress: f32,
}

/// Keeps the explosion config consistent with parts moved by hand.
#[derive(Debug, Clone, Copy, Default)]
pub struct EditorSync {
    policy: ReconstructionPolicy,
}

impl EditorSync {
    pub fn new(policy: ReconstructionPolicy) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> ReconstructionPolicy {
        self.policy
    }

    /// Derives level and direction that would place `item` at `position`
    /// under `state`.
    pub fn reconstruct(
        &self,
        item: &AnimatableItem,
        position: Vec3,
        state: &GlobalAnimationState,
    ) -> Result<Reconstruction, SyncError> {
        let layer_distance = state.layer_distance;
        if !(layer_distance.is_finite() && layer_distance > 0.0) {
            return Err(SyncError::InvalidLayerDistance(layer_distance));
        }

        let progress = item.local_progress(state.exp_factor, TimingMode::from_state(state));
        let effective_progress = if progress > EPSILON {
            progress
        } else {
            match self.policy {
                ReconstructionPolicy::FallbackToFull => 1.0,
                ReconstructionPolicy::CurrentProgressExact => return Err(SyncError::NoProgress),
            }
        };

        let full_vector = (position - item.original_position) / effective_progress;
        let distance = full_vector.length();
        let direction = if distance > EPSILON {
            full_vector / distance
        } else {
            item.direction
        };
        // Offsets scale with the speed multiplier too, so it is divided out here.
        let level = distance / (layer_distance * item.speed_multiplier.max(1.0));

        Ok(Reconstruction {
            level,
            direction,
            effective_progress,
        })
    }

    /// Reads `node`'s current position and writes the reconstructed level and
    /// direction into both its item and its store entry. Timing fields of the
    /// entry are left untouched.
    pub fn sync(
        &self,
        scene: &Scene,
        scheduler: &mut ExplosionScheduler,
        store: &mut ExplosionConfigStore,
        state: &GlobalAnimationState,
        node: NodeId,
    ) -> Result<Reconstruction, SyncError> {
        let position = scene.node(node).ok_or(SyncError::UnknownNode)?.position;
        let item = scheduler.item_for_mut(node).ok_or(SyncError::NotAnimated)?;

        let result = match self.reconstruct(item, position, state) {
            Ok(result) => result,
            Err(err) => {
                warn!("cannot sync {:?}: {err}", item.name);
                return Err(err);
            }
        };

        item.level = result.level;
        item.direction = result.direction;
        if let Some(entry) = store.get_mut(&item.name) {
            entry.level = result.level;
            entry.exp_direction = Some(result.direction.to_array());
        }
        debug!(
            "synced {:?}: level {:.3}, direction {:?}",
            item.name, result.level, result.direction
        );
        Ok(result)
    }

    /// Re-anchors `node`'s rest pose so its current position corresponds to
    /// the current progress.
    pub fn update_original_position(
        &self,
        scene: &Scene,
        scheduler: &mut ExplosionScheduler,
        state: &GlobalAnimationState,
        node: NodeId,
    ) -> Result<Vec3, SyncError> {
        let position = scene.node(node).ok_or(SyncError::UnknownNode)?.position;
        let item = scheduler.item_for_mut(node).ok_or(SyncError::NotAnimated)?;
        let offset = item.offset(
            state.exp_factor,
            state.layer_distance,
            TimingMode::from_state(state),
        );
        item.original_position = position - offset;
        Ok(item.original_position)
    }
}
