//! Per-output overview controller.
//!
//! Glues the state machine to one output: owns its captures (the scene
//! node's render instance), the status panel, and pointer press tracking,
//! and runs the frame in the required order: tick, drag snapshot, captures,
//! composition.

use crate::capture::CaptureSet;
use crate::compositor::{compose, Frame, FrameResources};
use crate::geometry::{Point, Rect, Region};
use crate::gpu::{GpuContext, TextureId};
use crate::host::{Host, NodeId, OutputId, StatusPanel};
use crate::options::OverviewOptions;
use crate::overview::Overview;
use crate::scene::RenderInstance;
use crate::OverviewError;
use std::time::Duration;
use tracing::{debug, trace};

#[derive(Debug, Clone, Copy)]
struct Press {
    point: Point,
    on_window: bool,
}

pub struct OutputOverview {
    id: OutputId,
    overview: Overview,
    captures: CaptureSet,
    panel: Box<dyn StatusPanel>,
    node: Option<NodeId>,
    press: Option<Press>,
}

impl OutputOverview {
    pub fn new(id: OutputId, options: OverviewOptions, panel: Box<dyn StatusPanel>) -> Self {
        Self {
            id,
            overview: Overview::new(options),
            captures: CaptureSet::new(),
            panel,
            node: None,
            press: None,
        }
    }

    pub fn id(&self) -> OutputId {
        self.id
    }

    pub fn overview(&self) -> &Overview {
        &self.overview
    }

    pub fn overview_mut(&mut self) -> &mut Overview {
        &mut self.overview
    }

    pub fn captures(&self) -> &CaptureSet {
        &self.captures
    }

    pub fn panel(&self) -> &dyn StatusPanel {
        self.panel.as_ref()
    }

    pub fn scene_node(&self) -> Option<NodeId> {
        self.node
    }

    /// Whether a press or drag currently holds the pointer.
    pub fn has_pointer_grab(&self) -> bool {
        self.press.is_some() || self.overview.is_dragging()
    }

    pub fn set_options(&mut self, options: OverviewOptions) {
        self.overview.set_options(options);
    }

    pub fn toggle(&mut self, host: &mut dyn Host) {
        self.overview.toggle(host);
    }

    pub fn activate(&mut self, host: &mut dyn Host) {
        self.overview.activate(host);
    }

    pub fn deactivate(&mut self, host: &mut dyn Host) {
        self.overview.deactivate(host);
    }

    pub fn navigate_to(&mut self, host: &mut dyn Host, workspace: usize) -> Result<(), OverviewError> {
        self.overview.navigate_to(host, workspace)
    }

    /// Switch workspace: through the overview's exit animation when it is
    /// open, directly otherwise.
    pub fn switch_to(&mut self, host: &mut dyn Host, workspace: usize) -> Result<(), OverviewError> {
        if self.overview.is_active() {
            return self.overview.deactivate_to_workspace(host, workspace);
        }
        let grid = host.workspace_grid();
        if workspace >= grid.count() {
            return Err(OverviewError::WorkspaceOutOfRange {
                index: workspace,
                count: grid.count(),
            });
        }
        host.set_current_workspace(grid.coord_of(workspace));
        Ok(())
    }

    /// Per-frame hook run before rendering. Returns whether another frame
    /// is wanted.
    pub fn pre_render(&mut self, host: &mut dyn Host, delta: Duration) -> bool {
        if self.overview.is_active() && self.node.is_none() {
            let bounds = Rect::from_size(host.output_geometry().size());
            self.node = Some(host.add_scene_node(bounds));
            debug!("Output {}: overview node added", self.id);
        }
        let animating = self.overview.tick(host, delta);
        animating || self.overview.is_dragging()
    }

    /// Render pass. Must be called with the graphics context current.
    pub fn render(
        &mut self,
        host: &mut dyn Host,
        ctx: &mut dyn GpuContext,
        resources: FrameResources<'_>,
    ) -> Option<Frame> {
        for texture in self.overview.take_released_textures() {
            ctx.release_texture(texture);
        }

        if !self.overview.is_active() {
            if !self.captures.is_empty() {
                self.captures.release(ctx);
                debug!("Output {}: capture textures released", self.id);
            }
            if let Some(node) = self.node.take() {
                host.remove_scene_node(node);
                debug!("Output {}: overview node removed", self.id);
            }
            return None;
        }

        let fullscreen = Rect::from_size(self.overview.output_size());
        if self.captures.is_empty() {
            let grid = self.overview.grid();
            let entry = grid.coord_of(self.overview.entry_workspace());
            self.captures.build(grid, entry, self.overview.output_size());
        }

        let output_damage = Region::from_rect(fullscreen);
        self.captures.compute_visibility(&output_damage);
        self.captures
            .set_full_repaint(self.overview.is_animating() || self.overview.is_dragging());

        self.captures
            .push_damage(&self.overview.take_content_damage());
        self.overview.prepare_drag_snapshot(host, ctx);

        let instructions = self.captures.schedule_instructions(host, &output_damage);
        let drawn = self.captures.render_all(ctx, host, &instructions);
        trace!("Output {}: {} captures drawn", self.id, drawn);

        let resources = FrameResources {
            panel: resources.panel.or(Some(self.panel.as_ref())),
            ..resources
        };
        compose(&self.overview, &self.captures, &resources)
    }

    /// Pointer motion in output-local coordinates. Returns whether the event
    /// was consumed.
    pub fn handle_motion(&mut self, host: &mut dyn Host, point: Point) -> bool {
        let over_button = self.panel.activities_bounds().contains(point);
        if over_button != self.panel.activities_hovered() {
            self.panel.set_activities_hovered(over_button);
            host.damage_output(self.panel.activities_bounds());
            host.schedule_redraw();
        }

        if !self.overview.is_active() {
            return false;
        }

        if self.overview.is_dragging() {
            self.overview.update_drag(point);
            host.schedule_redraw();
            return true;
        }

        if let Some(press) = self.press {
            let threshold = self.overview.options().drag_threshold;
            if press.on_window
                && press.point.distance(point) > threshold
                && self.overview.start_drag(host, press.point)
            {
                self.overview.update_drag(point);
                return true;
            }
        }

        if self.overview.update_hover(point) {
            host.schedule_redraw();
        }
        true
    }

    /// Pointer button in output-local coordinates. Returns whether the event
    /// was consumed.
    pub fn handle_button(&mut self, host: &mut dyn Host, point: Point, pressed: bool) -> bool {
        if pressed && self.panel.activities_bounds().contains(point) {
            debug!("Output {}: activities button pressed", self.id);
            self.press = None;
            self.overview.toggle(host);
            return true;
        }

        if !self.overview.is_active() {
            self.press = None;
            return false;
        }

        if pressed {
            self.press = Some(Press {
                point,
                on_window: self.overview.window_at(point).is_some(),
            });
            return true;
        }

        let press = self.press.take();
        if self.overview.is_dragging() {
            self.overview.end_drag(host, point);
            return true;
        }

        let threshold = self.overview.options().drag_threshold;
        if let Some(press) = press.filter(|p| p.point.distance(point) <= threshold) {
            self.overview.handle_click(host, press.point);
        }
        true
    }

    /// Close the overview and give up every texture, for output removal.
    pub fn shutdown(&mut self, host: &mut dyn Host) -> Vec<TextureId> {
        self.overview.force_close(host);
        if let Some(node) = self.node.take() {
            host.remove_scene_node(node);
        }
        let mut textures = self.overview.take_released_textures();
        textures.extend(self.captures.take_textures());
        textures
    }
}
