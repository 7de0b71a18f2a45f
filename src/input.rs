use glam::Vec2;
use serde::{Deserialize, Serialize};

/// Pixel rectangle of the render surface inside the host window.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f32,
    pub top: f32,
    pub width: f32,
    pub height: f32,
}

impl ScreenRect {
    pub fn new(width: f32, height: f32) -> Self {
        Self {
            left: 0.0,
            top: 0.0,
            width,
            height,
        }
    }

    pub fn aspect(&self) -> f32 {
        if self.height > 0.0 {
            self.width / self.height
        } else {
            1.0
        }
    }

    /// Parses `WIDTHxHEIGHT`, e.g. `1280x720`.
    pub fn parse(value: &str) -> Option<Self> {
        let (w, h) = value.split_once(|c| c == 'x' || c == 'X')?;
        let width = w.trim().parse::<f32>().ok()?;
        let height = h.trim().parse::<f32>().ok()?;
        (width > 0.0 && height > 0.0).then(|| Self::new(width, height))
    }
}

/// Maps client pixel coordinates to normalized device coordinates
/// (-1..1 on both axes, +y up). Degenerate rectangles map to the centre.
pub fn normalize_pointer(client: Vec2, rect: &ScreenRect) -> Vec2 {
    if rect.width <= 0.0 || rect.height <= 0.0 {
        return Vec2::ZERO;
    }
    Vec2::new(
        (client.x - rect.left) / rect.width * 2.0 - 1.0,
        -(client.y - rect.top) / rect.height * 2.0 + 1.0,
    )
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Modifiers {
    pub ctrl: bool,
    pub meta: bool,
}

impl Modifiers {
    pub const NONE: Self = Self {
        ctrl: false,
        meta: false,
    };

    /// Ctrl on most platforms, Cmd on macOS.
    pub fn multi_select(self) -> bool {
        self.ctrl || self.meta
    }

    /// Parses a `+` separated list such as `ctrl` or `ctrl+meta`.
    pub fn from_names(names: &str) -> Option<Self> {
        let mut modifiers = Self::NONE;
        for name in names.split('+').map(str::trim).filter(|n| !n.is_empty()) {
            match name.to_ascii_lowercase().as_str() {
                "ctrl" | "control" => modifiers.ctrl = true,
                "meta" | "cmd" | "command" | "super" => modifiers.meta = true,
                _ => return None,
            }
        }
        Some(modifiers)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum InputEvent {
    Click { position: Vec2, modifiers: Modifiers },
    /// Scroll wheel delta, in the host's native units.
    Scroll { delta: f32 },
    InfoPanelClosed,
}
