//! Interfaces the overview consumes from the host compositor.
//!
//! Everything here is implemented by the embedding compositor (or by the
//! headless platform in tests). The core never owns windows: it addresses them
//! by [`WindowId`] and re-validates them through [`Host::window`] before every
//! use, since the host may destroy them at any time.

use crate::geometry::{Point, Rect, Region};
use crate::gpu::TextureId;
use serde::{Deserialize, Serialize};

/// Opaque window identifier assigned by the host.
pub type WindowId = u64;

/// Opaque output identifier assigned by the host.
pub type OutputId = u32;

/// Position of a workspace in the virtual desktop grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct WorkspaceCoord {
    pub x: usize,
    pub y: usize,
}

impl WorkspaceCoord {
    pub fn new(x: usize, y: usize) -> Self {
        Self { x, y }
    }
}

/// Dimensions of the virtual desktop grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridSize {
    pub cols: usize,
    pub rows: usize,
}

impl Default for GridSize {
    fn default() -> Self {
        Self { cols: 1, rows: 1 }
    }
}

impl GridSize {
    pub fn new(cols: usize, rows: usize) -> Self {
        Self {
            cols: cols.max(1),
            rows: rows.max(1),
        }
    }

    /// Number of workspaces in the grid.
    pub fn count(&self) -> usize {
        self.cols.max(1) * self.rows.max(1)
    }

    /// Row-major index of a workspace.
    pub fn index_of(&self, coord: WorkspaceCoord) -> usize {
        coord.y * self.cols.max(1) + coord.x
    }

    pub fn coord_of(&self, index: usize) -> WorkspaceCoord {
        let cols = self.cols.max(1);
        WorkspaceCoord::new(index % cols, index / cols)
    }

    pub fn contains(&self, coord: WorkspaceCoord) -> bool {
        coord.x < self.cols && coord.y < self.rows
    }
}

/// Snapshot of a window's state as seen by the host.
#[derive(Debug, Clone, PartialEq)]
pub struct WindowInfo {
    pub id: WindowId,
    /// Geometry relative to the origin of the host's current workspace.
    /// Windows on other workspaces sit at multiples of the output size.
    pub geometry: Rect,
    pub mapped: bool,
    pub minimized: bool,
    pub app_id: String,
    pub title: String,
}

impl WindowInfo {
    /// Whether the window should take part in the overview.
    pub fn is_visible(&self) -> bool {
        self.mapped && !self.minimized
    }
}

/// Handle to a visual transform attached to a window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransformHandle(pub u64);

/// Render-time adjustment applied by the host to a window's output.
///
/// Translation and scale are about the window's centre, in logical pixels of
/// workspace space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VisualTransform {
    pub translation_x: f64,
    pub translation_y: f64,
    pub scale_x: f64,
    pub scale_y: f64,
    pub alpha: f64,
}

impl Default for VisualTransform {
    fn default() -> Self {
        Self {
            translation_x: 0.0,
            translation_y: 0.0,
            scale_x: 1.0,
            scale_y: 1.0,
            alpha: 1.0,
        }
    }
}

impl VisualTransform {
    /// Where `geometry` ends up once this transform is applied.
    pub fn apply(&self, geometry: Rect) -> Rect {
        let center = geometry.center();
        let width = geometry.width as f64 * self.scale_x;
        let height = geometry.height as f64 * self.scale_y;
        let cx = center.x + self.translation_x;
        let cy = center.y + self.translation_y;
        Rect::new(
            (cx - width / 2.0).round() as i32,
            (cy - height / 2.0).round() as i32,
            width.round() as i32,
            height.round() as i32,
        )
    }
}

/// Identifier of a node in the host scene graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NodeId(pub u64);

/// Per-output view of the host compositor.
pub trait Host {
    /// Logical geometry of the output in the global layout.
    fn output_geometry(&self) -> Rect;

    /// Physical pixels per logical pixel.
    fn output_scale(&self) -> f64;

    fn workspace_grid(&self) -> GridSize;

    fn current_workspace(&self) -> WorkspaceCoord;

    /// Switch the visible workspace. Window geometries reported afterwards
    /// are relative to the new workspace.
    fn set_current_workspace(&mut self, workspace: WorkspaceCoord);

    /// Every window on this output, bottom of the stack first.
    fn windows(&self) -> Vec<WindowInfo>;

    /// Look a window up. `None` means the window is gone.
    fn window(&self, id: WindowId) -> Option<WindowInfo>;

    /// Move a window by a logical offset. Returns false if the window is gone.
    fn move_window(&mut self, id: WindowId, dx: i32, dy: i32) -> bool;

    /// Raise a window to the top of the stack and give it keyboard focus.
    fn focus_window(&mut self, id: WindowId);

    /// Attach a fresh identity transform to a window.
    fn attach_transform(&mut self, id: WindowId) -> Option<TransformHandle>;

    fn set_transform(&mut self, handle: TransformHandle, transform: VisualTransform);

    /// Transform currently applied to a window, if any.
    fn window_transform(&self, id: WindowId) -> Option<VisualTransform>;

    fn detach_transform(&mut self, handle: TransformHandle);

    /// Insert a node covering `bounds` (output-local) into the scene.
    fn add_scene_node(&mut self, bounds: Rect) -> NodeId;

    fn remove_scene_node(&mut self, node: NodeId);

    /// Drain the content damage accumulated since the last call, relative to
    /// the current workspace origin.
    fn take_damage(&mut self) -> Region;

    /// Mark part of the output (output-local) as needing a repaint.
    fn damage_output(&mut self, region: Rect);

    fn schedule_redraw(&mut self);
}

/// Resolves pointer positions to outputs and hands out their hosts.
pub trait OutputLayout {
    /// Output under a point in global layout coordinates.
    fn output_at(&self, point: Point) -> Option<OutputId>;

    fn host_mut(&mut self, output: OutputId) -> Option<&mut dyn Host>;
}

/// The top status panel. Text and clock rendering stay with the host.
pub trait StatusPanel {
    fn height(&self) -> i32;

    /// Bounds of the "Activities" button, output-local.
    fn activities_bounds(&self) -> Rect;

    fn set_activities_hovered(&mut self, hovered: bool);

    fn activities_hovered(&self) -> bool;

    /// Pre-rendered panel texture, if the host has one.
    fn texture(&self) -> Option<TextureId>;
}

/// Looks up application icons. Missing icons are fine.
pub trait IconProvider {
    fn icon(&self, app_id: &str) -> Option<TextureId>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_grid_index_roundtrip() {
        let grid = GridSize::new(3, 2);
        assert_eq!(grid.count(), 6);
        for i in 0..grid.count() {
            assert_eq!(grid.index_of(grid.coord_of(i)), i);
        }
        assert_eq!(grid.coord_of(4), WorkspaceCoord::new(1, 1));
        assert!(!grid.contains(WorkspaceCoord::new(3, 0)));
    }

    #[test]
    fn test_identity_transform_keeps_geometry() {
        let r = Rect::new(10, 20, 300, 200);
        assert_eq!(VisualTransform::default().apply(r), r);
    }

    #[test]
    fn test_transform_scales_about_centre() {
        let t = VisualTransform {
            translation_x: 50.0,
            translation_y: -10.0,
            scale_x: 0.5,
            scale_y: 0.5,
            alpha: 1.0,
        };
        let out = t.apply(Rect::new(0, 0, 200, 100));
        assert_eq!(out, Rect::new(100, 15, 100, 50));
    }
}
