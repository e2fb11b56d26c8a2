//! Panorama Platform Headless
//!
//! An in-memory host compositor implementing every collaborator interface of
//! `panorama-core`.
//!
//! This crate handles:
//! - A per-output window store with a virtual workspace grid
//! - Visual transforms and scene nodes attached by the overview
//! - Content damage bookkeeping
//! - A recording GPU context (see [`gpu`]) and static panel/icon stand-ins
//!   (see [`panel`])
//!
//! The daemon runs on it, and the scenario tests drive the overview against it.

pub mod gpu;
pub mod panel;

pub use gpu::{GpuOp, RecordingGpu};
pub use panel::{IconTable, StaticPanel};

use panorama_core::{
    GridSize, Host, NodeId, OutputId, OutputLayout, Point, Rect, Region, TransformHandle,
    VisualTransform, WindowId, WindowInfo, WorkspaceCoord,
};
use std::collections::{BTreeMap, HashMap};
use thiserror::Error;
use tracing::debug;

/// Errors from direct manipulation of the headless host.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum HostError {
    #[error("Window not found: {0}")]
    WindowNotFound(WindowId),

    #[error("Output not found: {0}")]
    OutputNotFound(OutputId),

    #[error("Workspace ({x}, {y}) outside the {cols}x{rows} grid")]
    WorkspaceOutOfGrid {
        x: usize,
        y: usize,
        cols: usize,
        rows: usize,
    },
}

/// Things that happened to windows, in order. Tests read this back.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Created(WindowId),
    Destroyed(WindowId),
    Focused(WindowId),
    Moved { id: WindowId, dx: i32, dy: i32 },
    Minimized(WindowId),
    WorkspaceChanged(WorkspaceCoord),
}

#[derive(Debug, Clone)]
struct HeadlessWindow {
    id: WindowId,
    /// Geometry relative to the origin of workspace (0, 0).
    geometry: Rect,
    mapped: bool,
    minimized: bool,
    app_id: String,
    title: String,
}

/// One output of the headless compositor.
#[derive(Debug)]
pub struct HeadlessHost {
    id: OutputId,
    geometry: Rect,
    scale: f64,
    grid: GridSize,
    current: WorkspaceCoord,
    /// Bottom of the stack first.
    windows: Vec<HeadlessWindow>,
    next_window: WindowId,
    transforms: HashMap<TransformHandle, (WindowId, VisualTransform)>,
    next_transform: u64,
    nodes: BTreeMap<NodeId, Rect>,
    next_node: u64,
    content_damage: Region,
    output_damage: Region,
    redraw_requested: bool,
    focused: Option<WindowId>,
    events: Vec<WindowEvent>,
}

impl HeadlessHost {
    /// Create an output at `geometry` (global layout coordinates) showing
    /// workspace (0, 0) of `grid`.
    pub fn new(id: OutputId, geometry: Rect, grid: GridSize) -> Self {
        Self {
            id,
            geometry,
            scale: 1.0,
            grid,
            current: WorkspaceCoord::default(),
            windows: Vec::new(),
            next_window: 1,
            transforms: HashMap::new(),
            next_transform: 1,
            nodes: BTreeMap::new(),
            next_node: 1,
            content_damage: Region::new(),
            output_damage: Region::new(),
            redraw_requested: false,
            focused: None,
            events: Vec::new(),
        }
    }

    pub fn with_scale(mut self, scale: f64) -> Self {
        self.scale = if scale > 0.0 { scale } else { 1.0 };
        self
    }

    /// Start on a workspace other than (0, 0).
    pub fn with_current_workspace(mut self, workspace: WorkspaceCoord) -> Self {
        if self.grid.contains(workspace) {
            self.current = workspace;
        }
        self
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    fn workspace_origin(&self, workspace: WorkspaceCoord) -> (i32, i32) {
        (
            workspace.x as i32 * self.geometry.width,
            workspace.y as i32 * self.geometry.height,
        )
    }

    fn to_current(&self, geometry: Rect) -> Rect {
        let (ox, oy) = self.workspace_origin(self.current);
        geometry.offset(-ox, -oy)
    }

    fn info(&self, window: &HeadlessWindow) -> WindowInfo {
        WindowInfo {
            id: window.id,
            geometry: self.to_current(window.geometry),
            mapped: window.mapped,
            minimized: window.minimized,
            app_id: window.app_id.clone(),
            title: window.title.clone(),
        }
    }

    /// Map a new window on `workspace` at `local` (relative to that
    /// workspace's top-left corner). It goes on top of the stack.
    pub fn add_window(
        &mut self,
        workspace: WorkspaceCoord,
        local: Rect,
        app_id: &str,
        title: &str,
    ) -> Result<WindowId, HostError> {
        if !self.grid.contains(workspace) {
            return Err(HostError::WorkspaceOutOfGrid {
                x: workspace.x,
                y: workspace.y,
                cols: self.grid.cols,
                rows: self.grid.rows,
            });
        }

        let id = self.next_window;
        self.next_window += 1;
        let (ox, oy) = self.workspace_origin(workspace);
        let geometry = local.offset(ox, oy);
        self.windows.push(HeadlessWindow {
            id,
            geometry,
            mapped: true,
            minimized: false,
            app_id: app_id.to_string(),
            title: title.to_string(),
        });
        self.content_damage.add(self.to_current(geometry));
        self.events.push(WindowEvent::Created(id));
        debug!("Output {}: window {} ({}) created", self.id, id, app_id);
        Ok(id)
    }

    /// Destroy a window. Transforms attached to it stay registered until
    /// their owner detaches them.
    pub fn remove_window(&mut self, id: WindowId) -> Result<(), HostError> {
        let index = self
            .windows
            .iter()
            .position(|w| w.id == id)
            .ok_or(HostError::WindowNotFound(id))?;
        let window = self.windows.remove(index);
        self.content_damage.add(self.to_current(window.geometry));
        if self.focused == Some(id) {
            self.focused = None;
        }
        self.events.push(WindowEvent::Destroyed(id));
        Ok(())
    }

    pub fn set_minimized(&mut self, id: WindowId, minimized: bool) -> Result<(), HostError> {
        let window = self
            .windows
            .iter_mut()
            .find(|w| w.id == id)
            .ok_or(HostError::WindowNotFound(id))?;
        window.minimized = minimized;
        let geometry = window.geometry;
        self.content_damage.add(self.to_current(geometry));
        if minimized {
            self.events.push(WindowEvent::Minimized(id));
        }
        Ok(())
    }

    /// Report new content for a window, as a client commit would.
    pub fn damage_window(&mut self, id: WindowId) -> Result<(), HostError> {
        let geometry = self
            .windows
            .iter()
            .find(|w| w.id == id)
            .map(|w| w.geometry)
            .ok_or(HostError::WindowNotFound(id))?;
        self.content_damage.add(self.to_current(geometry));
        Ok(())
    }

    /// Workspace whose bounds contain the window's centre.
    pub fn workspace_of(&self, id: WindowId) -> Option<WorkspaceCoord> {
        let window = self.windows.iter().find(|w| w.id == id)?;
        let center = window.geometry.center();
        let x = (center.x / self.geometry.width.max(1) as f64).floor();
        let y = (center.y / self.geometry.height.max(1) as f64).floor();
        if x < 0.0 || y < 0.0 {
            return None;
        }
        let coord = WorkspaceCoord::new(x as usize, y as usize);
        self.grid.contains(coord).then_some(coord)
    }

    pub fn window_count(&self) -> usize {
        self.windows.len()
    }

    pub fn focused(&self) -> Option<WindowId> {
        self.focused
    }

    pub fn events(&self) -> &[WindowEvent] {
        &self.events
    }

    /// Number of transforms currently attached.
    pub fn transform_count(&self) -> usize {
        self.transforms.len()
    }

    pub fn scene_nodes(&self) -> Vec<NodeId> {
        self.nodes.keys().copied().collect()
    }

    /// Whether a redraw was requested since the last call.
    pub fn take_redraw_request(&mut self) -> bool {
        std::mem::take(&mut self.redraw_requested)
    }

    /// Drain the output damage reported by the overview.
    pub fn take_output_damage(&mut self) -> Region {
        std::mem::take(&mut self.output_damage)
    }
}

impl Host for HeadlessHost {
    fn output_geometry(&self) -> Rect {
        self.geometry
    }

    fn output_scale(&self) -> f64 {
        self.scale
    }

    fn workspace_grid(&self) -> GridSize {
        self.grid
    }

    fn current_workspace(&self) -> WorkspaceCoord {
        self.current
    }

    fn set_current_workspace(&mut self, workspace: WorkspaceCoord) {
        if !self.grid.contains(workspace) {
            debug!(
                "Output {}: ignoring switch to ({}, {}) outside the grid",
                self.id, workspace.x, workspace.y
            );
            return;
        }
        if workspace != self.current {
            self.current = workspace;
            self.content_damage
                .add(Rect::from_size(self.geometry.size()));
            self.events.push(WindowEvent::WorkspaceChanged(workspace));
        }
    }

    fn windows(&self) -> Vec<WindowInfo> {
        self.windows.iter().map(|w| self.info(w)).collect()
    }

    fn window(&self, id: WindowId) -> Option<WindowInfo> {
        self.windows.iter().find(|w| w.id == id).map(|w| self.info(w))
    }

    fn move_window(&mut self, id: WindowId, dx: i32, dy: i32) -> bool {
        let Some(window) = self.windows.iter_mut().find(|w| w.id == id) else {
            return false;
        };
        let before = window.geometry;
        window.geometry = before.offset(dx, dy);
        let after = window.geometry;
        self.content_damage.add(self.to_current(before));
        self.content_damage.add(self.to_current(after));
        self.events.push(WindowEvent::Moved { id, dx, dy });
        true
    }

    fn focus_window(&mut self, id: WindowId) {
        let Some(index) = self.windows.iter().position(|w| w.id == id) else {
            return;
        };
        let window = self.windows.remove(index);
        self.windows.push(window);
        self.focused = Some(id);
        self.events.push(WindowEvent::Focused(id));
    }

    fn attach_transform(&mut self, id: WindowId) -> Option<TransformHandle> {
        if !self.windows.iter().any(|w| w.id == id) {
            return None;
        }
        let handle = TransformHandle(self.next_transform);
        self.next_transform += 1;
        self.transforms
            .insert(handle, (id, VisualTransform::default()));
        Some(handle)
    }

    fn set_transform(&mut self, handle: TransformHandle, transform: VisualTransform) {
        if let Some(entry) = self.transforms.get_mut(&handle) {
            entry.1 = transform;
        }
    }

    fn window_transform(&self, id: WindowId) -> Option<VisualTransform> {
        self.transforms
            .values()
            .find(|(window, _)| *window == id)
            .map(|(_, transform)| *transform)
    }

    fn detach_transform(&mut self, handle: TransformHandle) {
        self.transforms.remove(&handle);
    }

    fn add_scene_node(&mut self, bounds: Rect) -> NodeId {
        let node = NodeId(self.next_node);
        self.next_node += 1;
        self.nodes.insert(node, bounds);
        node
    }

    fn remove_scene_node(&mut self, node: NodeId) {
        self.nodes.remove(&node);
    }

    fn take_damage(&mut self) -> Region {
        std::mem::take(&mut self.content_damage)
    }

    fn damage_output(&mut self, region: Rect) {
        self.output_damage.add(region);
    }

    fn schedule_redraw(&mut self) {
        self.redraw_requested = true;
    }
}

/// Every output of the headless compositor, keyed by id.
#[derive(Debug, Default)]
pub struct HeadlessSession {
    outputs: BTreeMap<OutputId, HeadlessHost>,
}

impl HeadlessSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_output(&mut self, host: HeadlessHost) {
        self.outputs.insert(host.id(), host);
    }

    pub fn remove_output(&mut self, id: OutputId) -> Option<HeadlessHost> {
        self.outputs.remove(&id)
    }

    pub fn output(&self, id: OutputId) -> Result<&HeadlessHost, HostError> {
        self.outputs.get(&id).ok_or(HostError::OutputNotFound(id))
    }

    pub fn output_mut(&mut self, id: OutputId) -> Result<&mut HeadlessHost, HostError> {
        self.outputs
            .get_mut(&id)
            .ok_or(HostError::OutputNotFound(id))
    }

    pub fn output_ids(&self) -> Vec<OutputId> {
        self.outputs.keys().copied().collect()
    }
}

impl OutputLayout for HeadlessSession {
    fn output_at(&self, point: Point) -> Option<OutputId> {
        self.outputs
            .values()
            .find(|host| host.geometry.contains(point))
            .map(HeadlessHost::id)
    }

    fn host_mut(&mut self, output: OutputId) -> Option<&mut dyn Host> {
        self.outputs
            .get_mut(&output)
            .map(|host| host as &mut dyn Host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host() -> HeadlessHost {
        HeadlessHost::new(1, Rect::new(0, 0, 1920, 1080), GridSize::new(3, 1))
    }

    #[test]
    fn test_windows_are_reported_relative_to_current_workspace() {
        let mut host = host();
        let id = host
            .add_window(WorkspaceCoord::new(1, 0), Rect::new(10, 20, 300, 200), "a", "A")
            .unwrap();
        assert_eq!(host.window(id).unwrap().geometry, Rect::new(1930, 20, 300, 200));

        host.set_current_workspace(WorkspaceCoord::new(1, 0));
        assert_eq!(host.window(id).unwrap().geometry, Rect::new(10, 20, 300, 200));
        assert_eq!(host.workspace_of(id), Some(WorkspaceCoord::new(1, 0)));
    }

    #[test]
    fn test_add_window_outside_grid_fails() {
        let mut host = host();
        let err = host
            .add_window(WorkspaceCoord::new(5, 0), Rect::new(0, 0, 10, 10), "a", "A")
            .unwrap_err();
        assert!(matches!(err, HostError::WorkspaceOutOfGrid { x: 5, .. }));
    }

    #[test]
    fn test_move_window_changes_workspace() {
        let mut host = host();
        let id = host
            .add_window(WorkspaceCoord::new(0, 0), Rect::new(100, 100, 400, 300), "a", "A")
            .unwrap();
        assert!(host.move_window(id, 1920, 0));
        assert_eq!(host.workspace_of(id), Some(WorkspaceCoord::new(1, 0)));
        assert!(!host.move_window(999, 1, 1));
    }

    #[test]
    fn test_focus_raises_window() {
        let mut host = host();
        let a = host
            .add_window(WorkspaceCoord::new(0, 0), Rect::new(0, 0, 100, 100), "a", "A")
            .unwrap();
        let b = host
            .add_window(WorkspaceCoord::new(0, 0), Rect::new(0, 0, 100, 100), "b", "B")
            .unwrap();
        host.focus_window(a);
        let order: Vec<WindowId> = host.windows().iter().map(|w| w.id).collect();
        assert_eq!(order, vec![b, a]);
        assert_eq!(host.focused(), Some(a));
    }

    #[test]
    fn test_transforms_follow_their_window() {
        let mut host = host();
        let id = host
            .add_window(WorkspaceCoord::new(0, 0), Rect::new(0, 0, 100, 100), "a", "A")
            .unwrap();
        let handle = host.attach_transform(id).unwrap();
        let transform = VisualTransform {
            alpha: 0.5,
            ..Default::default()
        };
        host.set_transform(handle, transform);
        assert_eq!(host.window_transform(id), Some(transform));

        host.detach_transform(handle);
        assert_eq!(host.window_transform(id), None);
        assert!(host.attach_transform(12345).is_none());
    }

    #[test]
    fn test_scene_nodes_add_and_remove() {
        let mut host = host();
        let a = host.add_scene_node(Rect::new(0, 0, 1920, 1080));
        let b = host.add_scene_node(Rect::new(0, 0, 100, 100));
        assert!(a < b);
        assert_eq!(host.scene_nodes(), vec![a, b]);

        host.remove_scene_node(a);
        assert_eq!(host.scene_nodes(), vec![b]);
        host.remove_scene_node(a);
        assert_eq!(host.scene_nodes(), vec![b]);
    }

    #[test]
    fn test_with_current_workspace_ignores_coords_outside_grid() {
        let host = host().with_current_workspace(WorkspaceCoord::new(2, 0));
        assert_eq!(host.current_workspace(), WorkspaceCoord::new(2, 0));

        let host = host.with_current_workspace(WorkspaceCoord::new(7, 0));
        assert_eq!(host.current_workspace(), WorkspaceCoord::new(2, 0));
    }

    #[test]
    fn test_session_routes_points_to_outputs() {
        let mut session = HeadlessSession::new();
        session.add_output(host());
        session.add_output(HeadlessHost::new(
            2,
            Rect::new(1920, 0, 1280, 1024),
            GridSize::new(1, 1),
        ));
        assert_eq!(session.output_at(Point::new(100.0, 100.0)), Some(1));
        assert_eq!(session.output_at(Point::new(2000.0, 100.0)), Some(2));
        assert_eq!(session.output_at(Point::new(5000.0, 100.0)), None);
        assert!(session.host_mut(2).is_some());
        assert!(matches!(session.output(9), Err(HostError::OutputNotFound(9))));
    }
}
