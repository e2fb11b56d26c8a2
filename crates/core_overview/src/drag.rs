//! Dragging windows between workspaces.
//!
//! A drag is started from an input event but its snapshot texture can only
//! be taken inside the graphics context, so [`Overview::start_drag`] just
//! flags the session and [`Overview::prepare_drag_snapshot`] does the GPU work
//! on the next render pass, before the workspace captures run.

use crate::geometry::{Point, Rect, Region, Size, MIN_WINDOW_SIZE};
use crate::gpu::{GpuContext, TextureId};
use crate::host::{Host, WindowId};
use crate::layout::ScreenMapping;
use crate::options::LayoutMode;
use crate::overview::{Overview, Phase};
use crate::slot::{SlotDragState, WindowSlot};
use tracing::{debug, info, warn};

/// Where a dragged window would land if released now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropTarget {
    Thumbnail(usize),
    /// Large carousel preview.
    Preview(usize),
}

impl DropTarget {
    pub fn workspace(&self) -> usize {
        match *self {
            DropTarget::Thumbnail(i) | DropTarget::Preview(i) => i,
        }
    }
}

#[derive(Debug, Clone)]
pub struct DragSession {
    window: WindowId,
    source_workspace: usize,
    grab: Point,
    current: Point,
    /// Screen geometry of the slot when the drag started.
    initial_screen: Rect,
    /// Slot geometry in workspace space when the drag started.
    initial_local: Rect,
    pre_drag_target: Rect,
    hover: Option<DropTarget>,
    snapshot: Option<TextureId>,
    needs_capture: bool,
    has_snapshot: bool,
}

impl DragSession {
    pub fn window(&self) -> WindowId {
        self.window
    }

    pub fn source_workspace(&self) -> usize {
        self.source_workspace
    }

    pub fn grab(&self) -> Point {
        self.grab
    }

    pub fn cursor(&self) -> Point {
        self.current
    }

    pub fn hover_target(&self) -> Option<DropTarget> {
        self.hover
    }

    pub fn snapshot(&self) -> Option<TextureId> {
        self.snapshot
    }

    pub fn needs_capture(&self) -> bool {
        self.needs_capture
    }

    pub fn has_snapshot(&self) -> bool {
        self.has_snapshot
    }

    pub fn pre_drag_target(&self) -> Rect {
        self.pre_drag_target
    }

    /// Screen geometry of the floating window: the starting geometry moved
    /// by the cursor travel.
    pub fn floating_rect(&self) -> Rect {
        let dx = (self.current.x - self.grab.x).round() as i32;
        let dy = (self.current.y - self.grab.y).round() as i32;
        self.initial_screen.offset(dx, dy)
    }
}

fn find_slot(slots: &mut [WindowSlot], window: WindowId) -> Option<&mut WindowSlot> {
    slots.iter_mut().find(|s| s.window() == window)
}

impl Overview {
    pub fn is_dragging(&self) -> bool {
        self.drag.is_some()
    }

    /// Start dragging the window under `point`. Returns whether a drag began.
    pub fn start_drag(&mut self, host: &mut dyn Host, point: Point) -> bool {
        if self.phase() != Phase::Active || self.drag.is_some() {
            return false;
        }
        let Some((workspace, window)) = self.window_at(point) else {
            return false;
        };
        if host.window(window).is_none() {
            return false;
        }
        let Some(mapping) = self.mapping_for(workspace) else {
            return false;
        };
        let Some(slot) = self
            .slots_mut(workspace)
            .and_then(|slots| find_slot(slots, window))
        else {
            return false;
        };

        let initial_local = slot.current();
        let pre_drag_target = slot.target();
        slot.hovered = false;
        slot.drag_state = SlotDragState::Capturing;
        slot.apply(host);

        self.drag = Some(DragSession {
            window,
            source_workspace: workspace,
            grab: point,
            current: point,
            initial_screen: mapping.to_screen(initial_local),
            initial_local,
            pre_drag_target,
            hover: None,
            snapshot: None,
            needs_capture: true,
            has_snapshot: false,
        });
        self.set_phase(Phase::Dragging);
        info!("Drag started: window {} on workspace {}", window, workspace);
        host.schedule_redraw();
        true
    }

    /// Take the drag snapshot if one is pending. Must run inside the render
    /// pass, before workspace captures.
    pub fn prepare_drag_snapshot(&mut self, host: &mut dyn Host, ctx: &mut dyn GpuContext) {
        let Some(session) = self.drag.as_ref() else {
            return;
        };
        if !session.needs_capture {
            return;
        }
        let window = session.window;
        let source = session.source_workspace;

        let Some(info) = host.window(window) else {
            debug!("Dragged window {} vanished before its snapshot", window);
            if let Some(session) = self.drag.as_mut() {
                session.needs_capture = false;
            }
            return;
        };

        let size = Size::new(
            info.geometry.width.max(MIN_WINDOW_SIZE),
            info.geometry.height.max(MIN_WINDOW_SIZE),
        )
        .to_physical(host.output_scale());

        let result = ctx.allocate_texture(size).and_then(|texture| {
            let dest = Rect::from_size(size);
            let drawn = ctx
                .clear(texture, &Region::from_rect(dest))
                .and_then(|_| ctx.draw_window(texture, window, dest, 1.0));
            match drawn {
                Ok(()) => Ok(texture),
                Err(e) => {
                    ctx.release_texture(texture);
                    Err(e)
                }
            }
        });

        match result {
            Ok(texture) => {
                if let Some(session) = self.drag.as_mut() {
                    session.snapshot = Some(texture);
                    session.has_snapshot = true;
                    session.needs_capture = false;
                }
                self.set_slot_drag_state(host, source, window, SlotDragState::Hidden);
                debug!("Drag snapshot taken for window {}", window);
            }
            Err(e) => {
                warn!("Drag snapshot for window {} failed: {}", window, e);
                if let Some(session) = self.drag.as_mut() {
                    session.needs_capture = false;
                }
                self.set_slot_drag_state(host, source, window, SlotDragState::None);
            }
        }
    }

    fn set_slot_drag_state(
        &mut self,
        host: &mut dyn Host,
        workspace: usize,
        window: WindowId,
        state: SlotDragState,
    ) {
        if let Some(slot) = self
            .slots_mut(workspace)
            .and_then(|slots| find_slot(slots, window))
        {
            slot.drag_state = state;
            slot.apply(host);
        }
    }

    fn drop_target_at(&self, point: Point, source: usize) -> Option<DropTarget> {
        if let Some(workspace) = self.thumbnail_at(point) {
            return (workspace != source).then_some(DropTarget::Thumbnail(workspace));
        }
        if self.options().layout == LayoutMode::Carousel {
            if let Some(workspace) = self.preview_at(point) {
                return (workspace != source).then_some(DropTarget::Preview(workspace));
            }
        }
        None
    }

    /// Follow the pointer and recompute the drop target.
    pub fn update_drag(&mut self, point: Point) {
        let Some(source) = self.drag.as_ref().map(DragSession::source_workspace) else {
            return;
        };
        let hover = self.drop_target_at(point, source);
        if let Some(session) = self.drag.as_mut() {
            session.current = point;
            if session.hover != hover {
                debug!("Drag hover target: {:?}", hover);
                session.hover = hover;
            }
        }
    }

    /// Release the dragged window at `point`.
    pub fn end_drag(&mut self, host: &mut dyn Host, point: Point) {
        self.update_drag(point);
        let Some(session) = self.drag.take() else {
            return;
        };
        if let Some(texture) = session.snapshot {
            self.queue_release(texture);
        }
        self.set_phase(Phase::Active);

        match session.hover {
            Some(target) if target.workspace() != session.source_workspace => {
                self.drop_on(host, &session, target)
            }
            _ => self.snap_back(host, &session),
        }
        host.schedule_redraw();
    }

    /// Abort the drag and put the window back where it was.
    pub fn cancel_drag(&mut self, host: &mut dyn Host) {
        let Some(session) = self.drag.take() else {
            return;
        };
        if let Some(texture) = session.snapshot {
            self.queue_release(texture);
        }
        self.set_phase(Phase::Active);
        self.snap_back(host, &session);
        debug!("Drag of window {} cancelled", session.window);
    }

    fn snap_back(&mut self, host: &mut dyn Host, session: &DragSession) {
        let dropped = self
            .mapping_for(session.source_workspace)
            .map(|mapping| mapping.rect_to_workspace(session.floating_rect()));
        let Some(slot) = self
            .slots_mut(session.source_workspace)
            .and_then(|slots| find_slot(slots, session.window))
        else {
            return;
        };

        slot.drag_state = SlotDragState::None;
        slot.set_target(session.pre_drag_target);
        if let Some(dropped) = dropped.filter(|r| !r.is_empty()) {
            slot.warp(dropped);
        }
        slot.animate_to_target();
        slot.apply(host);
    }

    fn drop_on(&mut self, host: &mut dyn Host, session: &DragSession, target: DropTarget) {
        let source = session.source_workspace;
        let destination = target.workspace();
        let window = session.window;

        let source_bounds = self.workspace_bounds(source);
        let destination_bounds = self.workspace_bounds(destination);
        let dx = destination_bounds.x - source_bounds.x;
        let dy = destination_bounds.y - source_bounds.y;

        let moved = host.move_window(window, dx, dy);

        let Some(slots) = self.slots_mut(source) else {
            return;
        };
        let Some(position) = slots.iter().position(|s| s.window() == window) else {
            return;
        };
        let mut old_slot = slots.remove(position);
        old_slot.detach(host);
        self.relayout(source);
        if let Some(slots) = self.slots_mut(source) {
            for slot in slots.iter_mut() {
                slot.animate_to_target();
            }
        }

        let Some(info) = host.window(window).filter(|_| moved) else {
            debug!("Dropped window {} is gone", window);
            return;
        };

        // Start the newcomer under the cursor, at its pre-drag size.
        let target_rect = match target {
            DropTarget::Thumbnail(i) => self.screen_layout().thumbnails.get(i).copied(),
            DropTarget::Preview(i) => self.workspace_preview(i),
        };
        let start = target_rect.map(|rect| {
            let cursor = ScreenMapping::new(rect, self.output_size()).to_workspace(session.current);
            let size = session.initial_local.size();
            Rect::new(
                cursor.x.round() as i32 - size.width / 2,
                cursor.y.round() as i32 - size.height / 2,
                size.width,
                size.height,
            )
        });

        let local = info
            .geometry
            .offset(-destination_bounds.x, -destination_bounds.y);
        let mut slot = WindowSlot::new(&info, local, self.options().timing());
        let original = slot.original();
        slot.attach(host);
        slot.warp(start.unwrap_or(original));

        if let Some(slots) = self.slots_mut(destination) {
            slots.push(slot);
        }
        self.relayout(destination);
        if let Some(slots) = self.slots_mut(destination) {
            for slot in slots.iter_mut() {
                slot.animate_to_target();
                slot.apply(host);
            }
        }

        info!(
            "Moved window {} from workspace {} to workspace {}",
            window, source, destination
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drop_target_workspace() {
        assert_eq!(DropTarget::Thumbnail(3).workspace(), 3);
        assert_eq!(DropTarget::Preview(1).workspace(), 1);
    }

    #[test]
    fn test_floating_rect_follows_cursor() {
        let session = DragSession {
            window: 1,
            source_workspace: 0,
            grab: Point::new(100.0, 100.0),
            current: Point::new(130.0, 80.0),
            initial_screen: Rect::new(50, 50, 200, 100),
            initial_local: Rect::new(0, 0, 300, 150),
            pre_drag_target: Rect::new(0, 0, 300, 150),
            hover: None,
            snapshot: None,
            needs_capture: true,
            has_snapshot: false,
        };
        assert_eq!(session.floating_rect(), Rect::new(80, 30, 200, 100));
    }
}
