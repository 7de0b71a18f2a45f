//! Frame-advanced tweens that drive the global progress value.

use std::time::Duration;

use log::debug;

use crate::geometry::{ease_in_out_cubic, ease_out_quad};

/// How long scroll input takes to catch up with its target.
pub const SCROLL_SMOOTHING: Duration = Duration::from_millis(120);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackState {
    #[default]
    Stopped,
    Running,
    Paused,
}

/// Play/pause tween of the progress value between 0 and 1.
///
/// Each completed run flips the target, so repeated plays alternate between
/// exploding and collapsing.
#[derive(Debug, Clone)]
pub struct Timeline {
    state: PlaybackState,
    from: f32,
    to: f32,
    value: f32,
    elapsed: Duration,
    duration: Duration,
    next_target: f32,
}

impl Timeline {
    pub fn new(duration: Duration) -> Self {
        Self {
            state: PlaybackState::Stopped,
            from: 0.0,
            to: 1.0,
            value: 0.0,
            elapsed: Duration::ZERO,
            duration,
            next_target: 1.0,
        }
    }

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == PlaybackState::Running
    }

    pub fn is_paused(&self) -> bool {
        self.state == PlaybackState::Paused
    }

    /// Target of the in-flight run, or of the next one when stopped.
    pub fn target(&self) -> f32 {
        match self.state {
            PlaybackState::Stopped => self.next_target,
            _ => self.to,
        }
    }

    pub fn value(&self) -> f32 {
        self.value
    }

    pub fn set_duration(&mut self, duration: Duration) {
        self.duration = duration;
    }

    /// Starts a run from `current` towards the next target.
    pub fn start(&mut self, current: f32) {
        let current = current.clamp(0.0, 1.0);
        if (current - self.next_target).abs() <= f32::EPSILON {
            self.next_target = 1.0 - self.next_target;
        }
        self.from = current;
        self.to = self.next_target;
        self.value = current;
        self.elapsed = Duration::ZERO;
        self.state = PlaybackState::Running;
        debug!("timeline started: {:.2} -> {:.2}", self.from, self.to);
    }

    pub fn pause(&mut self) -> bool {
        if self.state != PlaybackState::Running {
            return false;
        }
        self.state = PlaybackState::Paused;
        true
    }

    pub fn resume(&mut self) -> bool {
        if self.state != PlaybackState::Paused {
            return false;
        }
        self.state = PlaybackState::Running;
        true
    }

    /// Play button semantics: pause a running tween, resume a paused one,
    /// otherwise start a new run from `current`.
    pub fn toggle(&mut self, current: f32) {
        match self.state {
            PlaybackState::Running => {
                self.pause();
            }
            PlaybackState::Paused => {
                self.resume();
            }
            PlaybackState::Stopped => self.start(current),
        }
    }

    pub fn stop(&mut self) {
        self.state = PlaybackState::Stopped;
    }

    /// Advances a running tween; returns the new progress value.
    pub fn advance(&mut self, dt: Duration) -> Option<f32> {
        if self.state != PlaybackState::Running {
            return None;
        }
        self.elapsed += dt;
        let t = if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };
        self.value = (self.from + (self.to - self.from) * ease_in_out_cubic(t)).clamp(0.0, 1.0);
        if t >= 1.0 {
            self.value = self.to;
            self.state = PlaybackState::Stopped;
            self.next_target = 1.0 - self.to;
            debug!("timeline finished at {:.2}", self.value);
        }
        Some(self.value)
    }
}

/// Smooths high frequency scroll deltas into a gliding progress value.
#[derive(Debug, Clone)]
pub struct ScrollDriver {
    target: f32,
    from: f32,
    elapsed: Duration,
    duration: Duration,
    active: bool,
}

impl Default for ScrollDriver {
    fn default() -> Self {
        Self::new(SCROLL_SMOOTHING)
    }
}

impl ScrollDriver {
    pub fn new(duration: Duration) -> Self {
        Self {
            target: 0.0,
            from: 0.0,
            elapsed: Duration::ZERO,
            duration,
            active: false,
        }
    }

    pub fn target(&self) -> f32 {
        self.target
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    /// Folds a scroll delta into the target and restarts the glide from
    /// `current`. Returns the new target.
    pub fn on_delta(&mut self, delta: f32, sensitivity: f32, current: f32) -> f32 {
        if !self.active {
            self.target = current;
        }
        let step = delta * sensitivity;
        if step.is_finite() {
            self.target = (self.target + step).clamp(0.0, 1.0);
        }
        self.from = current;
        self.elapsed = Duration::ZERO;
        self.active = true;
        self.target
    }

    pub fn advance(&mut self, dt: Duration) -> Option<f32> {
        if !self.active {
            return None;
        }
        self.elapsed += dt;
        let t = if self.duration.is_zero() {
            1.0
        } else {
            (self.elapsed.as_secs_f32() / self.duration.as_secs_f32()).min(1.0)
        };
        if t >= 1.0 {
            self.active = false;
            return Some(self.target);
        }
        Some(self.from + (self.target - self.from) * ease_out_quad(t))
    }

    pub fn cancel(&mut self) {
        self.active = false;
    }
}
