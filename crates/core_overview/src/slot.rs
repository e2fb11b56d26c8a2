//! Per-window animation and layout record.

use crate::animation::{AnimatedRect, Timing};
use crate::geometry::{Rect, MIN_WINDOW_SIZE};
use crate::host::{Host, TransformHandle, VisualTransform, WindowId, WindowInfo};
use std::time::Duration;

/// Transform opacity of a slot the pointer is over.
pub const HOVERED_ALPHA: f64 = 1.0;
/// Transform opacity of every other slot.
pub const IDLE_ALPHA: f64 = 0.92;
/// Transform opacity of a window while its drag snapshot stands in for it.
pub const DRAG_HIDDEN_ALPHA: f64 = 0.01;

const MIN_SCALE: f64 = 0.1;
const MAX_SCALE: f64 = 10.0;

/// Role of a slot in an ongoing drag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SlotDragState {
    #[default]
    None,
    /// Dragged, snapshot not taken yet: render at full opacity.
    Capturing,
    /// Dragged, snapshot taken: keep out of workspace captures.
    Hidden,
}

#[derive(Debug, Clone)]
pub struct WindowSlot {
    window: WindowId,
    app_id: String,
    /// Geometry at overview entry, relative to the workspace origin.
    original: Rect,
    /// Grid position computed by the layout engine.
    target: Rect,
    geometry: AnimatedRect,
    transform: Option<TransformHandle>,
    pub hovered: bool,
    pub drag_state: SlotDragState,
}

impl WindowSlot {
    /// Build a slot for `info`, whose geometry is already relative to the
    /// origin of the workspace it belongs to.
    pub fn new(info: &WindowInfo, local_geometry: Rect, timing: Timing) -> Self {
        let original = local_geometry.with_min_size(MIN_WINDOW_SIZE);
        let mut geometry = AnimatedRect::new(original);
        geometry.set_timing(timing);
        Self {
            window: info.id,
            app_id: info.app_id.clone(),
            original,
            target: original,
            geometry,
            transform: None,
            hovered: false,
            drag_state: SlotDragState::None,
        }
    }

    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn original(&self) -> Rect {
        self.original
    }

    pub fn target(&self) -> Rect {
        self.target
    }

    /// Current animated geometry in workspace space.
    pub fn current(&self) -> Rect {
        self.geometry.current()
    }

    /// Where the animated geometry is heading.
    pub fn goal(&self) -> Rect {
        self.geometry.goal()
    }

    pub fn is_animating(&self) -> bool {
        self.geometry.is_animating()
    }

    pub fn transform_handle(&self) -> Option<TransformHandle> {
        self.transform
    }

    /// Attach a visual transform if the slot does not have one yet.
    pub fn attach(&mut self, host: &mut dyn Host) {
        if self.transform.is_none() {
            self.transform = host.attach_transform(self.window);
        }
    }

    pub fn detach(&mut self, host: &mut dyn Host) {
        if let Some(handle) = self.transform.take() {
            host.detach_transform(handle);
        }
    }

    /// Store a new layout target. The animation is not touched.
    pub fn set_target(&mut self, target: Rect) {
        self.target = target;
    }

    /// Animate from the window's real position into the grid.
    pub fn animate_in(&mut self) {
        self.geometry.warp(self.original);
        self.geometry.set_goal(self.target, true);
    }

    /// Animate from wherever the slot is now to its grid target.
    pub fn animate_to_target(&mut self) {
        self.geometry.set_goal(self.target, true);
    }

    /// Animate from wherever the slot is now back to the window's real position.
    pub fn animate_out(&mut self) {
        self.geometry.set_goal(self.original, true);
    }

    /// Jump to `rect` without animating.
    pub fn warp(&mut self, rect: Rect) {
        self.geometry.warp(rect);
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.geometry.set_timing(timing);
    }

    pub fn tick(&mut self, delta: Duration) -> bool {
        self.geometry.tick(delta)
    }

    pub fn alpha(&self) -> f64 {
        match self.drag_state {
            SlotDragState::Capturing => 1.0,
            SlotDragState::Hidden => DRAG_HIDDEN_ALPHA,
            SlotDragState::None if self.hovered => HOVERED_ALPHA,
            SlotDragState::None => IDLE_ALPHA,
        }
    }

    /// Transform mapping the window's real geometry onto the animated one.
    pub fn visual_transform(&self) -> VisualTransform {
        let current = self.geometry.current();
        let from = self.original.center();
        let to = current.center();
        let scale = |animated: i32, original: i32| {
            (animated as f64 / original.max(1) as f64).clamp(MIN_SCALE, MAX_SCALE)
        };

        VisualTransform {
            translation_x: to.x - from.x,
            translation_y: to.y - from.y,
            scale_x: scale(current.width, self.original.width),
            scale_y: scale(current.height, self.original.height),
            alpha: self.alpha(),
        }
    }

    /// Push the current visual transform to the host.
    pub fn apply(&self, host: &mut dyn Host) {
        if let Some(handle) = self.transform {
            host.set_transform(handle, self.visual_transform());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn info(geometry: Rect) -> WindowInfo {
        WindowInfo {
            id: 7,
            geometry,
            mapped: true,
            minimized: false,
            app_id: "org.example.Term".to_string(),
            title: "term".to_string(),
        }
    }

    #[test]
    fn test_degenerate_geometry_is_clamped() {
        let slot = WindowSlot::new(&info(Rect::new(0, 0, 0, 0)), Rect::new(4, 4, 0, -3), Timing::default());
        assert_eq!(slot.original(), Rect::new(4, 4, 100, 100));
        assert_eq!(slot.current(), slot.original());
    }

    #[test]
    fn test_animate_in_starts_from_original() {
        let g = Rect::new(100, 100, 800, 600);
        let mut slot = WindowSlot::new(&info(g), g, Timing::default());
        slot.warp(Rect::new(0, 0, 10, 10));
        slot.set_target(Rect::new(50, 50, 400, 300));
        slot.animate_in();
        assert_eq!(slot.current(), g);
        assert_eq!(slot.goal(), Rect::new(50, 50, 400, 300));
        assert!(slot.is_animating());

        slot.tick(Duration::from_millis(300));
        assert_eq!(slot.current(), slot.target());
    }

    #[test]
    fn test_transform_maps_original_onto_current() {
        let g = Rect::new(0, 0, 800, 600);
        let mut slot = WindowSlot::new(&info(g), g, Timing::default());
        slot.warp(Rect::new(100, 100, 400, 300));

        let t = slot.visual_transform();
        assert_eq!(t.apply(g), Rect::new(100, 100, 400, 300));
        assert_eq!(t.alpha, IDLE_ALPHA);
    }

    #[test]
    fn test_transform_scale_is_clamped() {
        let g = Rect::new(0, 0, 1000, 1000);
        let mut slot = WindowSlot::new(&info(g), g, Timing::default());
        slot.warp(Rect::new(0, 0, 1, 1));
        let t = slot.visual_transform();
        assert_eq!(t.scale_x, 0.1);
        assert_eq!(t.scale_y, 0.1);
    }

    #[test]
    fn test_alpha_follows_hover_and_drag() {
        let g = Rect::new(0, 0, 800, 600);
        let mut slot = WindowSlot::new(&info(g), g, Timing::default());
        assert_eq!(slot.alpha(), IDLE_ALPHA);
        slot.hovered = true;
        assert_eq!(slot.alpha(), HOVERED_ALPHA);
        slot.drag_state = SlotDragState::Capturing;
        assert_eq!(slot.alpha(), 1.0);
        slot.drag_state = SlotDragState::Hidden;
        assert_eq!(slot.alpha(), DRAG_HIDDEN_ALPHA);
    }
}
