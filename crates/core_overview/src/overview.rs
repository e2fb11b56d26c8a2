//! The overview state machine.
//!
//! `Overview` owns one list of [`WindowSlot`]s per workspace, the animated
//! large-preview rectangle, the carousel scroll offset and the background
//! opacity. All mutation goes through its methods; the compositor and the
//! render pass only read it.
//!
//! Coordinates:
//! - screen space: output-local, Y-down, what pointer events and draw
//!   commands use;
//! - workspace space: origin at the top-left of one workspace, Y-down, what
//!   slot geometries use.
//!
//! [`ScreenMapping`] converts between the two for any preview rectangle.

use crate::animation::{AnimatedRect, AnimatedScalar};
use crate::capture::workspace_bounds;
use crate::drag::DragSession;
use crate::geometry::{Point, Rect, Region, Size};
use crate::gpu::TextureId;
use crate::host::{GridSize, Host, WindowId, WorkspaceCoord};
use crate::layout::{
    arrange, carousel_rect, window_area, ScreenLayout, ScreenLayoutParams, ScreenMapping,
};
use crate::options::{LayoutMode, OverviewOptions};
use crate::slot::{SlotDragState, WindowSlot};
use crate::OverviewError;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, info, warn};

/// A preview narrower than the output by at most this much counts as
/// fullscreen.
pub const CLOSE_WIDTH_TOLERANCE: i32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Inactive,
    /// Entry animation running.
    Activating,
    Active,
    /// Carousel scrolling to another workspace.
    Navigating,
    /// A window is being dragged.
    Dragging,
    /// Exit animation running.
    Deactivating,
}

impl Phase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Phase::Inactive => "inactive",
            Phase::Activating => "activating",
            Phase::Active => "active",
            Phase::Navigating => "navigating",
            Phase::Dragging => "dragging",
            Phase::Deactivating => "deactivating",
        }
    }
}

pub struct Overview {
    options: OverviewOptions,
    phase: Phase,
    output: Size,
    grid: GridSize,
    entry_workspace: WorkspaceCoord,
    focused: usize,
    /// Exit was started from a thumbnail.
    switching: bool,
    pending_switch: Option<usize>,
    workspaces: Vec<Vec<WindowSlot>>,
    preview: AnimatedRect,
    carousel_scroll: AnimatedScalar,
    background_alpha: AnimatedScalar,
    screen: ScreenLayout,
    hovered_thumbnail: Option<usize>,
    pub(crate) drag: Option<DragSession>,
    released_textures: Vec<TextureId>,
    /// Areas whose window opacity changed, relative to the entry workspace
    /// origin.
    content_damage: Region,
}

impl Overview {
    pub fn new(options: OverviewOptions) -> Self {
        let timing = options.timing();
        let mut preview = AnimatedRect::new(Rect::default());
        preview.set_timing(timing);
        let mut carousel_scroll = AnimatedScalar::new(0.0);
        carousel_scroll.set_timing(timing);

        Self {
            options,
            phase: Phase::Inactive,
            output: Size::default(),
            grid: GridSize::default(),
            entry_workspace: WorkspaceCoord::default(),
            focused: 0,
            switching: false,
            pending_switch: None,
            workspaces: Vec::new(),
            preview,
            carousel_scroll,
            background_alpha: AnimatedScalar::new(0.0),
            screen: ScreenLayout {
                thumbnails: Vec::new(),
                preview: Rect::default(),
            },
            hovered_thumbnail: None,
            drag: None,
            released_textures: Vec::new(),
            content_damage: Region::new(),
        }
    }

    pub fn options(&self) -> &OverviewOptions {
        &self.options
    }

    /// Replace the options. Timings apply to the next retarget; layout
    /// changes apply from the next activation.
    pub fn set_options(&mut self, options: OverviewOptions) {
        let timing = options.timing();
        self.preview.set_timing(timing);
        self.carousel_scroll.set_timing(timing);
        for slot in self.workspaces.iter_mut().flatten() {
            slot.set_timing(timing);
        }
        self.options = options;
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Whether anything of the overview is on screen.
    pub fn is_active(&self) -> bool {
        self.phase != Phase::Inactive
    }

    pub fn is_animating(&self) -> bool {
        self.preview.is_animating()
            || self.carousel_scroll.is_animating()
            || self.workspaces.iter().flatten().any(|s| s.is_animating())
    }

    pub fn output_size(&self) -> Size {
        self.output
    }

    pub fn grid(&self) -> GridSize {
        self.grid
    }

    pub fn workspace_count(&self) -> usize {
        self.workspaces.len()
    }

    pub fn focused_workspace(&self) -> usize {
        self.focused
    }

    /// Index of the workspace that was current when the overview opened.
    pub fn entry_workspace(&self) -> usize {
        self.grid.index_of(self.entry_workspace)
    }

    pub fn pending_switch(&self) -> Option<usize> {
        self.pending_switch
    }

    pub fn slots(&self, workspace: usize) -> &[WindowSlot] {
        self.workspaces.get(workspace).map_or(&[], |s| s.as_slice())
    }

    pub fn screen_layout(&self) -> &ScreenLayout {
        &self.screen
    }

    /// Current animated main-preview rectangle.
    pub fn preview_rect(&self) -> Rect {
        self.preview.current()
    }

    pub fn carousel_scroll(&self) -> f64 {
        self.carousel_scroll.value()
    }

    pub fn background_alpha(&self) -> f64 {
        self.background_alpha.value()
    }

    pub fn hovered_thumbnail(&self) -> Option<usize> {
        self.hovered_thumbnail
    }

    pub fn drag(&self) -> Option<&DragSession> {
        self.drag.as_ref()
    }

    fn fullscreen(&self) -> Rect {
        Rect::from_size(self.output)
    }

    /// Bounds of a workspace relative to the workspace current at entry.
    pub fn workspace_bounds(&self, workspace: usize) -> Rect {
        workspace_bounds(self.grid, self.entry_workspace, workspace, self.output)
    }

    /// Screen rectangle the large preview of `workspace` is drawn into, if
    /// it is drawn at all.
    pub fn workspace_preview(&self, workspace: usize) -> Option<Rect> {
        if workspace >= self.workspaces.len() {
            return None;
        }
        match self.options.layout {
            LayoutMode::Zoom => (workspace == self.focused).then(|| self.preview.current()),
            LayoutMode::Carousel => Some(carousel_rect(
                self.preview.current(),
                workspace,
                self.carousel_scroll.value(),
                self.options.spacing,
            )),
        }
    }

    pub fn mapping_for(&self, workspace: usize) -> Option<ScreenMapping> {
        self.workspace_preview(workspace)
            .map(|rect| ScreenMapping::new(rect, self.output))
    }

    /// Textures that must be released on the next render pass.
    pub fn take_released_textures(&mut self) -> Vec<TextureId> {
        std::mem::take(&mut self.released_textures)
    }

    /// Capture damage produced by the overview itself, such as hover
    /// changes, since the last call.
    pub fn take_content_damage(&mut self) -> Region {
        std::mem::take(&mut self.content_damage)
    }

    pub(crate) fn queue_release(&mut self, texture: TextureId) {
        self.released_textures.push(texture);
    }

    fn check_index(&self, workspace: usize) -> Result<(), OverviewError> {
        if workspace >= self.workspaces.len() {
            return Err(OverviewError::WorkspaceOutOfRange {
                index: workspace,
                count: self.workspaces.len(),
            });
        }
        Ok(())
    }

    /// Open the overview, or close it if it is open.
    ///
    /// While an exit animation runs (and is not a workspace switch), toggling
    /// reverses it instead.
    pub fn toggle(&mut self, host: &mut dyn Host) {
        match self.phase {
            Phase::Inactive => self.activate(host),
            Phase::Deactivating if !self.switching => self.activate(host),
            Phase::Deactivating => debug!("Toggle ignored during workspace switch"),
            _ => self.deactivate(host),
        }
    }

    pub fn activate(&mut self, host: &mut dyn Host) {
        match self.phase {
            Phase::Inactive => {}
            Phase::Deactivating if !self.switching => {
                self.reopen(host);
                return;
            }
            _ => {
                debug!("Overview already active");
                return;
            }
        }

        self.output = host.output_geometry().size();
        self.grid = host.workspace_grid();
        self.entry_workspace = host.current_workspace();
        self.focused = self.grid.index_of(self.entry_workspace);
        self.switching = false;
        self.pending_switch = None;
        self.hovered_thumbnail = None;
        self.screen = ScreenLayout::compute(
            self.output,
            self.grid.count(),
            ScreenLayoutParams {
                spacing: self.options.spacing,
                panel_height: self.options.panel_height,
                preview_scale: self.options.preview_scale,
            },
        );

        let timing = self.options.timing();
        let windows = host.windows();
        self.workspaces = (0..self.grid.count())
            .map(|i| {
                let bounds = self.workspace_bounds(i);
                windows
                    .iter()
                    .filter(|w| w.is_visible() && bounds.contains(w.geometry.center()))
                    .map(|w| WindowSlot::new(w, w.geometry.offset(-bounds.x, -bounds.y), timing))
                    .collect()
            })
            .collect();

        for workspace in 0..self.workspaces.len() {
            self.relayout(workspace);
        }
        for slot in self.workspaces.iter_mut().flatten() {
            slot.attach(host);
            slot.animate_in();
            slot.apply(host);
        }

        self.preview.warp(self.fullscreen());
        self.preview.set_goal(self.screen.preview, true);
        self.carousel_scroll.warp(self.focused as f64);
        self.background_alpha.set(1.0, false);
        self.phase = Phase::Activating;

        info!(
            "Overview activated on workspace {} ({} windows, {} workspaces)",
            self.focused,
            self.workspaces.iter().map(Vec::len).sum::<usize>(),
            self.workspaces.len()
        );
        host.damage_output(self.fullscreen());
        host.schedule_redraw();
    }

    /// Reverse a running exit animation from wherever it is.
    fn reopen(&mut self, host: &mut dyn Host) {
        for slot in self.workspaces.iter_mut().flatten() {
            slot.animate_to_target();
        }
        self.preview.set_goal(self.screen.preview, true);
        self.pending_switch = None;
        self.phase = Phase::Activating;
        info!("Overview reopened during exit");
        host.schedule_redraw();
    }

    pub fn deactivate(&mut self, host: &mut dyn Host) {
        if matches!(self.phase, Phase::Inactive | Phase::Deactivating) {
            debug!("Overview not active, nothing to deactivate");
            return;
        }
        if self.drag.is_some() {
            self.cancel_drag(host);
        }
        self.begin_exit(host);
        info!("Overview deactivating (focused workspace {})", self.focused);
    }

    /// Exit into `workspace`, zooming out of its thumbnail.
    pub fn deactivate_to_workspace(
        &mut self,
        host: &mut dyn Host,
        workspace: usize,
    ) -> Result<(), OverviewError> {
        if matches!(self.phase, Phase::Inactive | Phase::Deactivating) {
            return Ok(());
        }
        self.check_index(workspace)?;
        if self.drag.is_some() {
            self.cancel_drag(host);
        }

        self.focused = workspace;
        self.switching = true;
        self.carousel_scroll.warp(workspace as f64);
        self.begin_exit(host);

        if let Some(&thumbnail) = self.screen.thumbnails.get(workspace) {
            self.preview.warp(thumbnail);
            self.preview.set_goal(self.fullscreen(), true);
        }
        info!("Overview deactivating into workspace {}", workspace);
        Ok(())
    }

    fn begin_exit(&mut self, host: &mut dyn Host) {
        for slot in self.workspaces.iter_mut().flatten() {
            slot.hovered = false;
            slot.animate_out();
        }
        self.preview.set_goal(self.fullscreen(), true);
        if self.options.layout == LayoutMode::Carousel {
            self.carousel_scroll.set(self.focused as f64, true);
        }

        let entry = self.entry_workspace();
        self.pending_switch = (self.focused != entry).then_some(self.focused);
        self.hovered_thumbnail = None;
        self.phase = Phase::Deactivating;
        host.schedule_redraw();
    }

    /// Bring `workspace` to the centre without leaving the overview.
    pub fn navigate_to(
        &mut self,
        host: &mut dyn Host,
        workspace: usize,
    ) -> Result<(), OverviewError> {
        if !matches!(
            self.phase,
            Phase::Activating | Phase::Active | Phase::Navigating
        ) {
            return Ok(());
        }
        self.check_index(workspace)?;
        if workspace == self.focused {
            return Ok(());
        }

        let bounds = self.workspace_bounds(self.focused);
        if let Some(slots) = self.workspaces.get_mut(self.focused) {
            for slot in slots.iter_mut().filter(|s| s.hovered) {
                slot.hovered = false;
                self.content_damage
                    .add(slot.current().offset(bounds.x, bounds.y));
            }
        }
        self.focused = workspace;

        if self.options.layout == LayoutMode::Carousel {
            self.carousel_scroll.set(workspace as f64, true);
            if self.carousel_scroll.is_animating() {
                self.phase = Phase::Navigating;
            }
        }
        debug!("Overview navigating to workspace {}", workspace);
        host.schedule_redraw();
        Ok(())
    }

    /// Advance every animation by `delta`, push slot transforms to the host
    /// and run the completion check. Returns whether anything still moves.
    pub fn tick(&mut self, host: &mut dyn Host, delta: Duration) -> bool {
        if self.phase == Phase::Inactive {
            return false;
        }

        self.prune_stale(host);

        let mut animating = self.preview.tick(delta);
        animating |= self.carousel_scroll.tick(delta);
        self.background_alpha.tick(delta);
        for slot in self.workspaces.iter_mut().flatten() {
            animating |= slot.tick(delta);
            slot.apply(host);
        }

        if animating {
            host.damage_output(self.fullscreen());
            host.schedule_redraw();
        } else {
            self.check_completion(host);
        }
        animating
    }

    fn check_completion(&mut self, host: &mut dyn Host) {
        match self.phase {
            Phase::Deactivating => {
                let width = self.preview.current().width;
                if width < self.output.width - CLOSE_WIDTH_TOLERANCE {
                    warn!(
                        "Preview settled at width {} of {}, closing anyway",
                        width, self.output.width
                    );
                }
                self.finish(host);
            }
            Phase::Activating | Phase::Navigating => {
                self.phase = Phase::Active;
                debug!("Overview settled on workspace {}", self.focused);
            }
            _ => {}
        }
    }

    /// Tear the session down and commit any pending workspace switch.
    fn finish(&mut self, host: &mut dyn Host) {
        for mut slot in self.workspaces.drain(..).flatten() {
            slot.detach(host);
        }
        if let Some(session) = self.drag.take() {
            if let Some(texture) = session.snapshot() {
                self.released_textures.push(texture);
            }
        }

        if let Some(workspace) = self.pending_switch.take() {
            let coord = self.grid.coord_of(workspace);
            info!("Switching to workspace {} ({}, {})", workspace, coord.x, coord.y);
            host.set_current_workspace(coord);
        }

        self.background_alpha.set(0.0, false);
        self.switching = false;
        self.hovered_thumbnail = None;
        self.content_damage.clear();
        self.phase = Phase::Inactive;
        host.damage_output(self.fullscreen());
        info!("Overview closed");
    }

    /// Close immediately without animating, e.g. when the output goes away.
    pub fn force_close(&mut self, host: &mut dyn Host) {
        if self.phase == Phase::Inactive {
            return;
        }
        if self.drag.is_some() {
            self.cancel_drag(host);
        }
        self.pending_switch = None;
        self.finish(host);
    }

    /// Drop slots whose window went away and re-flow their workspaces.
    fn prune_stale(&mut self, host: &mut dyn Host) {
        let dragged = self.drag.as_ref().map(DragSession::window);
        let mut dragged_gone = false;

        for workspace in 0..self.workspaces.len() {
            let mut stale = Vec::new();
            self.workspaces[workspace].retain(|slot| {
                let alive = host.window(slot.window()).is_some_and(|w| w.is_visible());
                if !alive {
                    stale.push((slot.window(), slot.transform_handle()));
                }
                alive
            });
            if stale.is_empty() {
                continue;
            }

            for (window, handle) in stale {
                debug!("Window {} went away, dropping its slot", window);
                if let Some(handle) = handle {
                    host.detach_transform(handle);
                }
                dragged_gone |= Some(window) == dragged;
            }

            self.relayout(workspace);
            if self.phase != Phase::Deactivating {
                for slot in &mut self.workspaces[workspace] {
                    if slot.drag_state == SlotDragState::None {
                        slot.animate_to_target();
                    }
                }
            }
        }

        if dragged_gone {
            if let Some(session) = self.drag.take() {
                if let Some(texture) = session.snapshot() {
                    self.released_textures.push(texture);
                }
            }
            self.phase = Phase::Active;
        }
    }

    /// Recompute layout targets for one workspace.
    ///
    /// A slot that is being dragged keeps its cell in the arrangement but
    /// its own target is left alone.
    pub(crate) fn relayout(&mut self, workspace: usize) {
        let area = window_area(self.output, self.options.spacing);
        let Some(slots) = self.workspaces.get_mut(workspace) else {
            return;
        };
        let originals: Vec<Rect> = slots.iter().map(WindowSlot::original).collect();
        let targets = arrange(&originals, area, self.options.spacing);
        for (slot, target) in slots.iter_mut().zip(targets) {
            if slot.drag_state == SlotDragState::None {
                slot.set_target(target);
            }
        }
    }

    pub(crate) fn slots_mut(&mut self, workspace: usize) -> Option<&mut Vec<WindowSlot>> {
        self.workspaces.get_mut(workspace)
    }

    pub(crate) fn set_phase(&mut self, phase: Phase) {
        self.phase = phase;
    }

    /// Topmost slot of the focused workspace under a screen point.
    pub fn window_at(&self, point: Point) -> Option<(usize, WindowId)> {
        let workspace = self.focused;
        let mapping = self.mapping_for(workspace)?;
        if !mapping.screen.contains(point) {
            return None;
        }
        let local = mapping.to_workspace(point);
        self.slots(workspace)
            .iter()
            .rev()
            .find(|slot| slot.current().contains(local))
            .map(|slot| (workspace, slot.window()))
    }

    pub fn thumbnail_at(&self, point: Point) -> Option<usize> {
        self.screen
            .thumbnails
            .iter()
            .position(|thumbnail| thumbnail.contains(point))
    }

    /// Workspace whose large preview is under a screen point.
    pub fn preview_at(&self, point: Point) -> Option<usize> {
        match self.options.layout {
            LayoutMode::Zoom => self
                .preview
                .current()
                .contains(point)
                .then_some(self.focused),
            LayoutMode::Carousel => (0..self.workspaces.len()).find(|&i| {
                self.workspace_preview(i)
                    .is_some_and(|rect| rect.contains(point))
            }),
        }
    }

    /// Route a click (press and release without dragging).
    pub fn handle_click(&mut self, host: &mut dyn Host, point: Point) {
        if !matches!(self.phase, Phase::Active | Phase::Navigating) {
            return;
        }

        if let Some((_, window)) = self.window_at(point) {
            debug!("Clicked window {}", window);
            host.focus_window(window);
            self.deactivate(host);
            return;
        }

        if let Some(workspace) = self.preview_at(point) {
            if workspace == self.focused {
                self.deactivate(host);
            } else if let Err(e) = self.navigate_to(host, workspace) {
                warn!("Navigation failed: {}", e);
            }
            return;
        }

        if let Some(workspace) = self.thumbnail_at(point) {
            if workspace == self.focused {
                self.deactivate(host);
            } else if let Err(e) = self.deactivate_to_workspace(host, workspace) {
                warn!("Workspace switch failed: {}", e);
            }
            return;
        }

        self.deactivate(host);
    }

    /// Update hover state for a pointer position. Returns whether anything
    /// changed.
    pub fn update_hover(&mut self, point: Point) -> bool {
        if !matches!(
            self.phase,
            Phase::Activating | Phase::Active | Phase::Navigating
        ) {
            return false;
        }

        let hit = self.window_at(point).map(|(_, window)| window);
        let focused = self.focused;
        let bounds = self.workspace_bounds(focused);
        let mut changed = false;
        if let Some(slots) = self.workspaces.get_mut(focused) {
            for slot in slots {
                let hovered = Some(slot.window()) == hit;
                if slot.hovered != hovered {
                    slot.hovered = hovered;
                    self.content_damage
                        .add(slot.current().offset(bounds.x, bounds.y));
                    changed = true;
                }
            }
        }

        let thumbnail = self.thumbnail_at(point);
        if thumbnail != self.hovered_thumbnail {
            self.hovered_thumbnail = thumbnail;
            changed = true;
        }
        changed
    }
}
