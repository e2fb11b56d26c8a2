//! User-facing options of the overview.

use crate::animation::{Easing, Timing};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// How the large preview area is used.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LayoutMode {
    /// One zoomed preview of the focused workspace.
    #[default]
    Zoom,
    /// All workspaces side by side, scrolled to the focused one.
    Carousel,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OverviewOptions {
    /// Corner radius in pixels.
    pub corner_radius: f64,

    /// Fraction of the available area taken by the large preview.
    pub preview_scale: f64,

    /// Gap between items in pixels.
    pub spacing: i32,

    /// Height of the status panel in pixels.
    pub panel_height: i32,

    /// Length of every overview animation.
    pub animation_duration_ms: u64,

    /// Pointer travel before a press on a window becomes a drag.
    pub drag_threshold: f64,

    /// Icon badge size in pixels, 0 disables badges.
    pub icon_size: i32,

    pub layout: LayoutMode,

    pub easing: Easing,

    /// `#RRGGBB` or `#RRGGBBAA`.
    pub panel_color: String,

    /// Opacity of the dark overlay drawn over the wallpaper.
    pub background_dim: f64,
}

impl Default for OverviewOptions {
    fn default() -> Self {
        Self {
            corner_radius: 12.0,
            preview_scale: 0.95,
            spacing: 20,
            panel_height: 16,
            animation_duration_ms: 300,
            drag_threshold: 8.0,
            icon_size: 48,
            layout: LayoutMode::Zoom,
            easing: Easing::default(),
            panel_color: "#1a1a1aE6".to_string(),
            background_dim: 0.5,
        }
    }
}

impl OverviewOptions {
    pub fn timing(&self) -> Timing {
        Timing {
            duration: Duration::from_millis(self.animation_duration_ms),
            easing: self.easing,
        }
    }

    /// Clamp out-of-range values in place. Returns one warning per fix.
    pub fn validate(&mut self) -> Vec<String> {
        let mut warnings = Vec::new();

        if !(0.1..=1.0).contains(&self.preview_scale) {
            let clamped = if self.preview_scale.is_finite() {
                self.preview_scale.clamp(0.1, 1.0)
            } else {
                0.95
            };
            warnings.push(format!(
                "preview_scale {} out of range, using {}",
                self.preview_scale, clamped
            ));
            self.preview_scale = clamped;
        }

        if self.spacing < 0 {
            warnings.push(format!("spacing {} is negative, using 0", self.spacing));
            self.spacing = 0;
        }

        if self.panel_height < 0 {
            warnings.push(format!(
                "panel_height {} is negative, using 0",
                self.panel_height
            ));
            self.panel_height = 0;
        }

        if self.corner_radius < 0.0 || !self.corner_radius.is_finite() {
            warnings.push(format!(
                "corner_radius {} is invalid, using 0",
                self.corner_radius
            ));
            self.corner_radius = 0.0;
        }

        if self.drag_threshold < 0.0 || !self.drag_threshold.is_finite() {
            warnings.push(format!(
                "drag_threshold {} is invalid, using 8",
                self.drag_threshold
            ));
            self.drag_threshold = 8.0;
        }

        if self.icon_size < 0 {
            warnings.push(format!("icon_size {} is negative, disabling icons", self.icon_size));
            self.icon_size = 0;
        }

        if !(0.0..=1.0).contains(&self.background_dim) {
            let clamped = if self.background_dim.is_finite() {
                self.background_dim.clamp(0.0, 1.0)
            } else {
                0.5
            };
            warnings.push(format!(
                "background_dim {} out of range, using {}",
                self.background_dim, clamped
            ));
            self.background_dim = clamped;
        }

        if crate::compositor::Color::parse_hex(&self.panel_color).is_none() {
            warnings.push(format!(
                "panel_color {:?} is not a hex colour, the fallback will be used",
                self.panel_color
            ));
        }

        warnings
    }
}
