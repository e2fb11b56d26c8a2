//! Frame pipeline tests: captures, drag snapshots, composition and
//! multi-output routing.

use panorama_core::compositor::{preview_corner_radius, THUMBNAIL_IDLE_ALPHA};
use panorama_core::host::Host;
use panorama_core::slot::{DRAG_HIDDEN_ALPHA, HOVERED_ALPHA, IDLE_ALPHA};
use panorama_core::{
    Color, DrawCommand, Frame, FrameResources, GridSize, OutputOverview, OverviewOptions,
    OverviewPlugin, Phase, Point, Rect, SlotDragState, TextureId, WindowId, WorkspaceCoord,
};
use panorama_platform_headless::{
    GpuOp, HeadlessHost, HeadlessSession, IconTable, RecordingGpu, StaticPanel,
};
use std::time::Duration;

fn ms(v: u64) -> Duration {
    Duration::from_millis(v)
}

struct Rig {
    host: HeadlessHost,
    gpu: RecordingGpu,
    output: OutputOverview,
    windows: Vec<WindowId>,
}

impl Rig {
    /// Two workspaces side by side, `count` windows on the first.
    fn new(count: usize) -> Self {
        let mut host = HeadlessHost::new(1, Rect::new(0, 0, 1920, 1080), GridSize::new(2, 1));
        let windows = (0..count)
            .map(|i| {
                host.add_window(
                    WorkspaceCoord::new(0, 0),
                    Rect::new(200 + i as i32 * 60, 150, 1000, 700),
                    &format!("app.{}", i),
                    "window",
                )
                .unwrap()
            })
            .collect();
        Self {
            host,
            gpu: RecordingGpu::new(),
            output: OutputOverview::new(1, OverviewOptions::default(), Box::new(StaticPanel::new(16))),
            windows,
        }
    }

    fn frame(&mut self, delta: Duration) -> Option<Frame> {
        self.output.pre_render(&mut self.host, delta);
        self.output
            .render(&mut self.host, &mut self.gpu, FrameResources::default())
    }

    /// Open the overview and let the entry animation finish.
    fn open(&mut self) -> Frame {
        self.output.toggle(&mut self.host);
        let frame = self.frame(ms(300));
        assert_eq!(self.output.overview().phase(), Phase::Active);
        frame.unwrap()
    }

    fn window_center(&self, id: WindowId) -> Point {
        let overview = self.output.overview();
        let mapping = overview.mapping_for(0).unwrap();
        let slot = overview.slots(0).iter().find(|s| s.window() == id).unwrap();
        mapping.to_screen(slot.current()).center()
    }

    fn capture_texture(&self, workspace: usize) -> TextureId {
        self.output.captures().texture(workspace).unwrap()
    }
}

fn textures(frame: &Frame) -> Vec<(TextureId, Rect, f64)> {
    frame
        .commands
        .iter()
        .filter_map(|c| match *c {
            DrawCommand::Texture {
                texture,
                dest,
                alpha,
                ..
            } => Some((texture, dest, alpha)),
            _ => None,
        })
        .collect()
}

#[test]
fn test_inactive_output_renders_nothing() {
    let mut rig = Rig::new(2);
    assert!(rig.frame(ms(16)).is_none());
    assert!(rig.gpu.live_textures().is_empty());
    assert!(rig.host.scene_nodes().is_empty());
}

#[test]
fn test_captures_draw_every_workspace_window() {
    let mut rig = Rig::new(3);
    rig.open();

    assert_eq!(rig.output.captures().len(), 2);
    assert_eq!(rig.host.scene_nodes().len(), 1);
    let ws0 = rig.capture_texture(0);
    let ws1 = rig.capture_texture(1);
    assert_ne!(ws0, ws1);

    let drawn: Vec<WindowId> = rig.gpu.draws_into(ws0).iter().map(|d| d.0).collect();
    for id in &rig.windows {
        assert!(drawn.contains(id), "window {} not captured", id);
    }
    assert!(rig.gpu.draws_into(ws1).is_empty());
    // Captures are drawn with the overview's idle opacity.
    assert!(rig
        .gpu
        .draws_into(ws0)
        .iter()
        .all(|&(_, _, alpha)| (alpha - IDLE_ALPHA).abs() < 1e-9));
}

#[test]
fn test_settled_overview_redraws_only_damage() {
    let mut rig = Rig::new(2);
    rig.open();
    rig.gpu.take_ops();

    rig.frame(ms(16)).unwrap();
    assert!(rig.gpu.draws_into(rig.capture_texture(0)).is_empty());

    rig.gpu.take_ops();
    rig.host.damage_window(rig.windows[0]).unwrap();
    rig.frame(ms(16)).unwrap();
    let drawn: Vec<WindowId> = rig
        .gpu
        .draws_into(rig.capture_texture(0))
        .iter()
        .map(|d| d.0)
        .collect();
    assert!(drawn.contains(&rig.windows[0]));
}

#[test]
fn test_frame_layers_and_flipped_destinations() {
    let mut rig = Rig::new(1);
    let frame = rig.open();

    assert_eq!(frame.commands[0], DrawCommand::Clear(Color::BLACK));

    let panel = DrawCommand::Rect {
        color: Color::from_hex("#1a1a1aE6"),
        dest: Rect::new(0, 1064, 1920, 16),
        corner_radius: 0.0,
    };
    assert!(frame.commands.contains(&panel));

    let ws0 = rig.capture_texture(0);
    let ws1 = rig.capture_texture(1);
    let layout = rig.output.overview().screen_layout().clone();
    let drawn = textures(&frame);

    // Unfocused thumbnail is dimmed, focused one is not.
    let idle = layout.thumbnails[1].flip_y(1080);
    assert!(drawn.contains(&(ws1, idle, THUMBNAIL_IDLE_ALPHA)));
    let focused = layout.thumbnails[0].flip_y(1080);
    assert!(drawn.contains(&(ws0, focused, 1.0)));

    // The zoomed preview shows the focused workspace with rounded corners.
    let preview = layout.preview.flip_y(1080);
    let radius = preview_corner_radius(12.0, layout.preview.width, 1920);
    assert!(frame.commands.contains(&DrawCommand::Texture {
        texture: ws0,
        dest: preview,
        alpha: 1.0,
        corner_radius: radius,
    }));
}

#[test]
fn test_icons_use_provider_or_fallback_colour() {
    let mut rig = Rig::new(2);
    rig.output.toggle(&mut rig.host);
    rig.output.pre_render(&mut rig.host, ms(300));

    let mut icons = IconTable::new();
    icons.insert("app.0", TextureId(500));
    let resources = FrameResources {
        icons: Some(&icons),
        ..Default::default()
    };
    let frame = rig
        .output
        .render(&mut rig.host, &mut rig.gpu, resources)
        .unwrap();

    let icon_draws = textures(&frame)
        .into_iter()
        .filter(|&(t, _, _)| t == TextureId(500))
        .count();
    assert_eq!(icon_draws, 1);
    assert!(frame.commands.iter().any(|c| matches!(
        c,
        DrawCommand::Rect { color, dest, .. }
            if *color == Color::from_key("app.1") && dest.width == 48
    )));
}

#[test]
fn test_wallpaper_replaces_background() {
    let mut rig = Rig::new(1);
    rig.output.toggle(&mut rig.host);
    rig.output.pre_render(&mut rig.host, ms(300));
    let resources = FrameResources {
        wallpaper: Some(TextureId(77)),
        ..Default::default()
    };
    let frame = rig
        .output
        .render(&mut rig.host, &mut rig.gpu, resources)
        .unwrap();
    assert_eq!(
        frame.commands[1],
        DrawCommand::Texture {
            texture: TextureId(77),
            dest: Rect::new(0, 0, 1920, 1080),
            alpha: 1.0,
            corner_radius: 0.0,
        }
    );
}

#[test]
fn test_drag_snapshot_precedes_captures_and_hides_window() {
    let mut rig = Rig::new(2);
    rig.open();
    let dragged = rig.windows[1];
    let grab = rig.window_center(dragged);

    assert!(rig.output.handle_button(&mut rig.host, grab, true));
    assert!(rig
        .output
        .handle_motion(&mut rig.host, Point::new(grab.x + 40.0, grab.y + 10.0)));
    assert_eq!(rig.output.overview().phase(), Phase::Dragging);
    assert!(rig.output.has_pointer_grab());

    rig.gpu.take_ops();
    let frame = rig.frame(ms(16)).unwrap();

    let session = rig.output.overview().drag().unwrap();
    assert!(session.has_snapshot());
    assert!(!session.needs_capture());
    let snapshot = session.snapshot().unwrap();

    assert_eq!(
        rig.gpu.draws_into(snapshot),
        vec![(dragged, Rect::new(0, 0, 1000, 700), 1.0)]
    );

    let ops = rig.gpu.ops();
    let snapshot_draw = ops
        .iter()
        .position(|op| matches!(op, GpuOp::DrawWindow { target, .. } if *target == snapshot))
        .unwrap();
    let ws0 = rig.capture_texture(0);
    let first_capture_draw = ops
        .iter()
        .position(|op| matches!(op, GpuOp::DrawWindow { target, .. } if *target == ws0))
        .unwrap();
    assert!(snapshot_draw < first_capture_draw);

    // Nearly transparent in the capture, never fully removed.
    let in_capture: Vec<f64> = rig
        .gpu
        .draws_into(ws0)
        .iter()
        .filter(|d| d.0 == dragged)
        .map(|d| d.2)
        .collect();
    assert_eq!(in_capture, vec![DRAG_HIDDEN_ALPHA]);

    // Snapshot floats on top of everything.
    match frame.commands.last() {
        Some(DrawCommand::Texture { texture, .. }) => assert_eq!(*texture, snapshot),
        other => panic!("expected snapshot on top, got {:?}", other),
    }
}

#[test]
fn test_drop_releases_snapshot_on_next_frame() {
    let mut rig = Rig::new(2);
    rig.open();
    let dragged = rig.windows[0];
    let grab = rig.window_center(dragged);

    rig.output.handle_button(&mut rig.host, grab, true);
    rig.output
        .handle_motion(&mut rig.host, Point::new(grab.x + 30.0, grab.y));
    rig.frame(ms(16));
    let snapshot = rig.output.overview().drag().unwrap().snapshot().unwrap();

    let thumbnail = rig.output.overview().screen_layout().thumbnails[1].center();
    rig.output.handle_motion(&mut rig.host, thumbnail);
    assert!(rig.output.handle_button(&mut rig.host, thumbnail, false));
    assert!(!rig.output.has_pointer_grab());
    assert_eq!(rig.output.overview().slots(1).len(), 1);
    assert_eq!(rig.host.workspace_of(dragged), Some(WorkspaceCoord::new(1, 0)));

    rig.frame(ms(16));
    assert!(!rig.gpu.live_textures().contains(&snapshot));
}

#[test]
fn test_snapshot_failure_keeps_window_visible() {
    let mut rig = Rig::new(2);
    rig.open();
    let dragged = rig.windows[0];
    let grab = rig.window_center(dragged);

    rig.output.handle_button(&mut rig.host, grab, true);
    rig.output
        .handle_motion(&mut rig.host, Point::new(grab.x + 30.0, grab.y));
    rig.gpu.fail_allocations = true;
    rig.gpu.take_ops();
    let frame = rig.frame(ms(16)).unwrap();

    let overview = rig.output.overview();
    assert_eq!(overview.phase(), Phase::Dragging);
    let session = overview.drag().unwrap();
    assert!(!session.has_snapshot());
    let slot = overview.slots(0).iter().find(|s| s.window() == dragged).unwrap();
    assert_eq!(slot.drag_state, SlotDragState::None);

    let ws0 = rig.capture_texture(0);
    assert!(rig
        .gpu
        .draws_into(ws0)
        .iter()
        .any(|&(id, _, alpha)| id == dragged && alpha > DRAG_HIDDEN_ALPHA));
    assert!(!frame
        .commands
        .iter()
        .any(|c| matches!(c, DrawCommand::Rect { color, .. } if *color == Color::SHADOW)));
}

#[test]
fn test_short_press_is_a_click() {
    let mut rig = Rig::new(2);
    rig.open();
    let target = rig.windows[0];
    let point = rig.window_center(target);

    rig.output.handle_button(&mut rig.host, point, true);
    rig.output
        .handle_motion(&mut rig.host, Point::new(point.x + 3.0, point.y));
    rig.output
        .handle_button(&mut rig.host, Point::new(point.x + 3.0, point.y), false);

    assert!(rig.output.overview().drag().is_none());
    assert_eq!(rig.host.focused(), Some(target));
    assert_eq!(rig.output.overview().phase(), Phase::Deactivating);
}

#[test]
fn test_hover_raises_window_opacity() {
    let mut rig = Rig::new(2);
    rig.open();
    rig.frame(ms(16)).unwrap();
    let hovered = rig.windows[0];
    let other = rig.windows[1];
    let ws0 = rig.capture_texture(0);

    rig.gpu.take_ops();
    let center = rig.window_center(hovered);
    rig.output.handle_motion(&mut rig.host, center);
    rig.frame(ms(16)).unwrap();

    assert_eq!(rig.host.window_transform(hovered).unwrap().alpha, HOVERED_ALPHA);
    assert_eq!(rig.host.window_transform(other).unwrap().alpha, IDLE_ALPHA);
    // The settled capture is redrawn for the hover change.
    let draws = rig.gpu.draws_into(ws0);
    assert!(draws
        .iter()
        .any(|&(id, _, alpha)| id == hovered && alpha == HOVERED_ALPHA));
    assert!(!draws
        .iter()
        .any(|&(id, _, alpha)| id == other && alpha == HOVERED_ALPHA));

    rig.gpu.take_ops();
    rig.output
        .handle_motion(&mut rig.host, Point::new(1.0, 540.0));
    rig.frame(ms(16)).unwrap();
    assert!(rig
        .gpu
        .draws_into(ws0)
        .iter()
        .any(|&(id, _, alpha)| id == hovered && alpha == IDLE_ALPHA));
}

#[test]
fn test_activities_button_toggles_overview() {
    let mut rig = Rig::new(1);
    let button = Point::new(10.0, 5.0);

    assert!(!rig.output.handle_motion(&mut rig.host, Point::new(500.0, 500.0)));
    assert!(rig.output.handle_button(&mut rig.host, button, true));
    assert!(rig.output.overview().is_active());

    rig.frame(ms(300));
    rig.output.handle_motion(&mut rig.host, button);
    assert!(rig.output.panel().activities_hovered());
    let frame = rig.frame(ms(16)).unwrap();
    assert!(frame.commands.iter().any(|c| matches!(
        c,
        DrawCommand::Rect { color, .. } if *color == Color::HIGHLIGHT.with_alpha(0.15)
    )));

    assert!(rig.output.handle_button(&mut rig.host, button, true));
    assert_eq!(rig.output.overview().phase(), Phase::Deactivating);
}

#[test]
fn test_closing_releases_everything() {
    let mut rig = Rig::new(3);
    rig.open();
    assert!(!rig.gpu.live_textures().is_empty());

    rig.output.toggle(&mut rig.host);
    assert!(rig.frame(ms(300)).is_none());

    assert!(rig.gpu.live_textures().is_empty());
    assert!(rig.host.scene_nodes().is_empty());
    assert_eq!(rig.host.transform_count(), 0);
}

#[test]
fn test_switch_without_overview_changes_workspace_directly() {
    let mut rig = Rig::new(0);
    rig.output.switch_to(&mut rig.host, 1).unwrap();
    assert_eq!(rig.host.current_workspace(), WorkspaceCoord::new(1, 0));
    assert!(rig.output.switch_to(&mut rig.host, 4).is_err());
}

fn two_output_session() -> HeadlessSession {
    let mut session = HeadlessSession::new();
    let mut left = HeadlessHost::new(1, Rect::new(0, 0, 1920, 1080), GridSize::new(2, 1));
    left.add_window(WorkspaceCoord::new(0, 0), Rect::new(100, 100, 800, 600), "a", "A")
        .unwrap();
    let mut right = HeadlessHost::new(2, Rect::new(1920, 0, 1280, 1024), GridSize::new(1, 1));
    right
        .add_window(WorkspaceCoord::new(0, 0), Rect::new(50, 50, 600, 400), "b", "B")
        .unwrap();
    session.add_output(left);
    session.add_output(right);
    session
}

fn plugin_for(session: &HeadlessSession) -> OverviewPlugin {
    let mut plugin = OverviewPlugin::new(OverviewOptions::default());
    for id in session.output_ids() {
        plugin.add_output(id, Box::new(StaticPanel::new(16)));
    }
    plugin
}

#[test]
fn test_plugin_renders_each_active_output() {
    let mut session = two_output_session();
    let mut plugin = plugin_for(&session);
    let mut gpu = RecordingGpu::new();

    plugin.toggle(&mut session, 2).unwrap();
    plugin.pre_render(&mut session, ms(300));
    let frames = plugin.render(&mut session, &mut gpu, None, None);

    assert_eq!(frames.len(), 1);
    assert_eq!(frames[0].0, 2);
    assert_eq!(frames[0].1.size, panorama_core::Size::new(1280, 1024));
    assert!(plugin.toggle(&mut session, 9).is_err());
}

#[test]
fn test_plugin_routes_pointer_by_position() {
    let mut session = two_output_session();
    let mut plugin = plugin_for(&session);

    // Activities button of the right output, in global coordinates.
    assert!(plugin.handle_button(&mut session, Point::new(1930.0, 5.0), true));
    assert!(plugin.output(2).unwrap().overview().is_active());
    assert!(!plugin.output(1).unwrap().overview().is_active());
}

#[test]
fn test_removing_output_releases_its_textures() {
    let mut session = two_output_session();
    let mut plugin = plugin_for(&session);
    let mut gpu = RecordingGpu::new();

    plugin.toggle(&mut session, 1).unwrap();
    plugin.pre_render(&mut session, ms(300));
    plugin.render(&mut session, &mut gpu, None, None);
    assert!(!gpu.live_textures().is_empty());

    assert!(plugin.remove_output(&mut session, 1));
    assert!(!plugin.remove_output(&mut session, 1));
    let host = session.output(1).unwrap();
    assert_eq!(host.transform_count(), 0);
    assert!(host.scene_nodes().is_empty());

    plugin.render(&mut session, &mut gpu, None, None);
    assert!(gpu.live_textures().is_empty());
    assert_eq!(plugin.output_ids(), vec![2]);
}
