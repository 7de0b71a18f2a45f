use std::collections::BTreeMap;
use std::fs;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use glam::Vec3;
use log::warn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::ConfigError;
use crate::highlight::{HighlightMode, Material};

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExplosionEntry {
    #[serde(default)]
    pub level: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp_direction: Option<[f32; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sequence: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub speed_multiplier: Option<f32>,
}

impl ExplosionEntry {
    pub fn new(level: f32) -> Self {
        Self {
            level,
            ..Self::default()
        }
    }

    pub fn with_direction(mut self, direction: [f32; 3]) -> Self {
        self.exp_direction = Some(direction);
        self
    }

    pub fn with_window(mut self, start: f32, end: f32) -> Self {
        self.start = Some(start);
        self.end = Some(end);
        self
    }

    pub fn with_sequence(mut self, sequence: f32) -> Self {
        self.sequence = Some(sequence);
        self
    }

    pub fn with_speed(mut self, speed: f32) -> Self {
        self.speed_multiplier = Some(speed);
        self
    }

    pub fn direction(&self) -> Option<Vec3> {
        self.exp_direction.map(Vec3::from_array)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ExplosionDocument {
    objects: BTreeMap<String, ExplosionEntry>,
}

/// Part name → explosion entry, loaded once per model and edited in place.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExplosionConfigStore {
    entries: BTreeMap<String, ExplosionEntry>,
}

impl ExplosionConfigStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates and parses a `{ "objects": { ... } }` document.
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let value: Value = serde_json::from_str(json)?;
        Self::validate_document(&value)?;
        let document: ExplosionDocument = serde_json::from_value(value)?;
        Ok(Self {
            entries: document.objects,
        })
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid explosion config {}", path.display()))
    }

    pub fn to_json_pretty(&self) -> Result<String, ConfigError> {
        let document = ExplosionDocument {
            objects: self.entries.clone(),
        };
        Ok(serde_json::to_string_pretty(&document)?)
    }

    /// Structural checks for a raw explosion document.
    ///
    /// `level` must be numeric; `sequence`, `speedMultiplier` and `start`/`end`
    /// must be numeric when present, `expDirection` a 3 element numeric array.
    pub fn validate_document(value: &Value) -> Result<(), ConfigError> {
        let document = value.as_object().ok_or(ConfigError::NotAnObject)?;
        let objects = document
            .get("objects")
            .and_then(Value::as_object)
            .ok_or(ConfigError::MissingObjects)?;

        for (name, entry) in objects {
            let invalid = |field: &'static str, reason: &'static str| ConfigError::InvalidEntry {
                name: name.clone(),
                field,
                reason,
            };
            let entry = entry
                .as_object()
                .ok_or_else(|| invalid("entry", "must be an object"))?;

            match entry.get("level") {
                Some(level) if level.is_number() => {}
                Some(_) => return Err(invalid("level", "must be a number")),
                None => return Err(invalid("level", "is missing")),
            }
            for field in ["sequence", "speedMultiplier", "start", "end"] {
                if entry.get(field).is_some_and(|value| !value.is_number()) {
                    return Err(invalid(field, "must be a number"));
                }
            }
            if let Some(direction) = entry.get("expDirection") {
                let valid = direction
                    .as_array()
                    .is_some_and(|items| items.len() == 3 && items.iter().all(Value::is_number));
                if !valid {
                    return Err(invalid("expDirection", "must be an array of 3 numbers"));
                }
            }
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    pub fn get(&self, name: &str) -> Option<&ExplosionEntry> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ExplosionEntry> {
        self.entries.get_mut(name)
    }

    pub fn insert(&mut self, name: impl Into<String>, entry: ExplosionEntry) -> Option<ExplosionEntry> {
        self.entries.insert(name.into(), entry)
    }

    pub fn remove(&mut self, name: &str) -> Option<ExplosionEntry> {
        self.entries.remove(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ExplosionEntry)> {
        self.entries.iter().map(|(name, entry)| (name.as_str(), entry))
    }
}

impl FromIterator<(String, ExplosionEntry)> for ExplosionConfigStore {
    fn from_iter<T: IntoIterator<Item = (String, ExplosionEntry)>>(iter: T) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

const DEFAULT_ANIMATION_DURATION_MS: f32 = 1500.0;
const MAX_ANIMATION_DURATION_MS: f32 = 3_600_000.0;

/// Viewer-wide animation settings, read every frame by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct GlobalAnimationState {
    pub exp_factor: f32,
    pub layer_distance: f32,
    pub global_exp_direction: [f32; 3],
    /// Milliseconds.
    pub animation_duration: f32,
    pub allow_scroll_animation: bool,
    pub scroll_sensitivity: f32,
    pub use_sequence_anim: bool,
}

impl Default for GlobalAnimationState {
    fn default() -> Self {
        Self {
            exp_factor: 0.0,
            layer_distance: 0.5,
            global_exp_direction: [1.0, 1.0, 1.0],
            animation_duration: DEFAULT_ANIMATION_DURATION_MS,
            allow_scroll_animation: false,
            scroll_sensitivity: 0.001,
            use_sequence_anim: false,
        }
    }
}

impl GlobalAnimationState {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut state: Self = serde_json::from_str(json)?;
        state.normalize();
        Ok(state)
    }

    /// Brings every field into a usable range. JSON numbers beyond `f32`
    /// arrive as infinities.
    pub fn normalize(&mut self) {
        let defaults = Self::default();
        self.set_exp_factor(self.exp_factor);
        if !self.layer_distance.is_finite() {
            warn!(
                "layerDistance {} is not finite, using {}",
                self.layer_distance, defaults.layer_distance
            );
            self.layer_distance = defaults.layer_distance;
        } else if self.layer_distance < 0.0 {
            warn!("layerDistance {} is negative, using 0", self.layer_distance);
            self.layer_distance = 0.0;
        }
        if !self.global_exp_direction.iter().all(|c| c.is_finite()) {
            warn!(
                "globalExpDirection {:?} is not finite, using the default",
                self.global_exp_direction
            );
            self.global_exp_direction = defaults.global_exp_direction;
        }
        if !self.animation_duration.is_finite() || self.animation_duration < 0.0 {
            warn!(
                "animationDuration {} is invalid, using {DEFAULT_ANIMATION_DURATION_MS} ms",
                self.animation_duration
            );
            self.animation_duration = DEFAULT_ANIMATION_DURATION_MS;
        } else if self.animation_duration > MAX_ANIMATION_DURATION_MS {
            warn!(
                "animationDuration {} is too long, capping at {MAX_ANIMATION_DURATION_MS} ms",
                self.animation_duration
            );
            self.animation_duration = MAX_ANIMATION_DURATION_MS;
        }
        if !self.scroll_sensitivity.is_finite() {
            self.scroll_sensitivity = defaults.scroll_sensitivity;
        }
    }

    /// Stores `value` clamped to [0, 1]; NaN becomes 0.
    pub fn set_exp_factor(&mut self, value: f32) {
        self.exp_factor = if value.is_nan() {
            0.0
        } else {
            value.clamp(0.0, 1.0)
        };
    }

    pub fn global_direction(&self) -> Vec3 {
        Vec3::from_array(self.global_exp_direction).normalize_or_zero()
    }

    pub fn animation_duration(&self) -> Duration {
        let millis = self.animation_duration.clamp(0.0, MAX_ANIMATION_DURATION_MS);
        Duration::try_from_secs_f32(millis / 1000.0)
            .unwrap_or_else(|_| Duration::from_secs_f32(DEFAULT_ANIMATION_DURATION_MS / 1000.0))
    }
}

/// Which progress value the inverse reconstruction divides by.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ReconstructionPolicy {
    /// Divide by the item's local progress, treating ≈0 as fully exploded.
    #[default]
    FallbackToFull,
    /// Divide by the item's local progress; ≈0 cannot be reconstructed.
    CurrentProgressExact,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct HighlightOptions {
    pub highlight_component: bool,
    pub mode: HighlightMode,
    pub wireframe_color: String,
    pub ghost_color: String,
}

impl Default for HighlightOptions {
    fn default() -> Self {
        Self {
            highlight_component: true,
            mode: HighlightMode::Ghost,
            wireframe_color: "#aaaaaa".to_string(),
            ghost_color: "#c4c4c4".to_string(),
        }
    }
}

impl HighlightOptions {
    pub fn material(&self) -> Material {
        let hex = match self.mode {
            HighlightMode::Wireframe => &self.wireframe_color,
            HighlightMode::Ghost => &self.ghost_color,
        };
        let color = parse_hex_color(hex).unwrap_or_else(|| {
            warn!("invalid highlight color {hex:?}, using grey");
            Vec3::splat(0.75)
        });
        self.mode.material(color)
    }
}

/// Parses `#rrggbb` into [0, 1] RGB components.
pub fn parse_hex_color(value: &str) -> Option<Vec3> {
    let digits = value.strip_prefix('#')?;
    if digits.len() != 6 || !digits.is_ascii() {
        return None;
    }
    let channel = |range: std::ops::Range<usize>| {
        u8::from_str_radix(&digits[range], 16)
            .ok()
            .map(|v| f32::from(v) / 255.0)
    };
    Some(Vec3::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ViewerOptions {
    pub animation_config: GlobalAnimationState,
    pub highlight_options: HighlightOptions,
    pub reconstruction: ReconstructionPolicy,
    pub edit_mode: bool,
}

impl ViewerOptions {
    pub fn from_json(json: &str) -> Result<Self, ConfigError> {
        let mut options: Self = serde_json::from_str(json)?;
        options.animation_config.normalize();
        Ok(options)
    }

    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let json = fs::read_to_string(path)
            .with_context(|| format!("unable to read {}", path.display()))?;
        Self::from_json(&json).with_context(|| format!("invalid viewer options {}", path.display()))
    }
}
