//! Stand-ins for the status panel and icon lookup.

use panorama_core::{IconProvider, Rect, StatusPanel, TextureId};
use std::collections::HashMap;

/// Width of the "Activities" button at the left end of the panel.
pub const ACTIVITIES_WIDTH: i32 = 100;

/// A panel with a fixed height and an "Activities" button in its top-left
/// corner. It has no texture, so the compositor fills it with the configured
/// panel colour.
#[derive(Debug, Clone)]
pub struct StaticPanel {
    height: i32,
    hovered: bool,
    texture: Option<TextureId>,
}

impl StaticPanel {
    pub fn new(height: i32) -> Self {
        Self {
            height: height.max(0),
            hovered: false,
            texture: None,
        }
    }

    pub fn with_texture(mut self, texture: TextureId) -> Self {
        self.texture = Some(texture);
        self
    }
}

impl StatusPanel for StaticPanel {
    fn height(&self) -> i32 {
        self.height
    }

    fn activities_bounds(&self) -> Rect {
        Rect::new(0, 0, ACTIVITIES_WIDTH, self.height)
    }

    fn set_activities_hovered(&mut self, hovered: bool) {
        self.hovered = hovered;
    }

    fn activities_hovered(&self) -> bool {
        self.hovered
    }

    fn texture(&self) -> Option<TextureId> {
        self.texture
    }
}

/// Icons keyed by application id.
#[derive(Debug, Clone, Default)]
pub struct IconTable {
    icons: HashMap<String, TextureId>,
}

impl IconTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, app_id: impl Into<String>, texture: TextureId) {
        self.icons.insert(app_id.into(), texture);
    }
}

impl IconProvider for IconTable {
    fn icon(&self, app_id: &str) -> Option<TextureId> {
        self.icons.get(app_id).copied()
    }
}
