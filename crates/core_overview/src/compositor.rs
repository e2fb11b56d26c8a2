//! Final frame composition.
//!
//! [`compose`] turns the overview state and the workspace captures into a flat
//! list of draw commands. It never mutates anything. Geometry is Y-down up to
//! this point; every command's destination is flipped to the bottom-left GL
//! convention as it is emitted, and nowhere else.

use crate::capture::CaptureSet;
use crate::drag::DropTarget;
use crate::geometry::{Rect, Size};
use crate::gpu::TextureId;
use crate::host::{IconProvider, StatusPanel};
use crate::layout::ScreenMapping;
use crate::overview::{Overview, Phase};
use serde::{Deserialize, Serialize};

/// Below this background opacity nothing is drawn.
pub const MIN_VISIBLE_ALPHA: f64 = 0.01;
/// Opacity of thumbnails that are neither focused nor a drop target.
pub const THUMBNAIL_IDLE_ALPHA: f64 = 0.7;
pub const BORDER_WIDTH: i32 = 2;
const SHADOW_OFFSET: i32 = 6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Color {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Color {
    pub const BLACK: Color = Color::rgba(0.0, 0.0, 0.0, 1.0);
    pub const FALLBACK: Color = Color::rgba(0.2, 0.2, 0.2, 0.9);
    pub const BACKGROUND: Color = Color::rgba(0.11, 0.12, 0.14, 1.0);
    pub const HIGHLIGHT: Color = Color::rgba(1.0, 1.0, 1.0, 0.8);
    pub const DROP_HIGHLIGHT: Color = Color::rgba(0.35, 0.6, 1.0, 0.9);
    pub const SHADOW: Color = Color::rgba(0.0, 0.0, 0.0, 0.35);

    pub const fn rgba(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn with_alpha(self, a: f32) -> Self {
        Self { a, ..self }
    }

    /// Parse `#RRGGBB` or `#RRGGBBAA`.
    pub fn parse_hex(hex: &str) -> Option<Color> {
        let digits = hex.strip_prefix('#')?;
        if !(digits.len() == 6 || digits.len() == 8) || !digits.is_ascii() {
            return None;
        }
        let channel = |i: usize| {
            u8::from_str_radix(&digits[i..i + 2], 16)
                .ok()
                .map(|v| v as f32 / 255.0)
        };
        let a = if digits.len() == 8 { channel(6)? } else { 1.0 };
        Some(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }

    /// Like [`Color::parse_hex`], falling back to a neutral grey.
    pub fn from_hex(hex: &str) -> Color {
        Self::parse_hex(hex).unwrap_or(Self::FALLBACK)
    }

    /// Stable colour derived from a string, used for missing icons.
    pub fn from_key(key: &str) -> Color {
        // FNV-1a
        let hash = key
            .bytes()
            .fold(0xcbf2_9ce4_8422_2325u64, |h, b| {
                (h ^ b as u64).wrapping_mul(0x0100_0000_01b3)
            });
        let hue = (hash % 360) as f32;
        hsv(hue, 0.55, 0.75)
    }
}

fn hsv(hue: f32, saturation: f32, value: f32) -> Color {
    let c = value * saturation;
    let h = hue / 60.0;
    let x = c * (1.0 - (h % 2.0 - 1.0).abs());
    let (r, g, b) = match h as u32 {
        0 => (c, x, 0.0),
        1 => (x, c, 0.0),
        2 => (0.0, c, x),
        3 => (0.0, x, c),
        4 => (x, 0.0, c),
        _ => (c, 0.0, x),
    };
    let m = value - c;
    Color::rgba(r + m, g + m, b + m, 1.0)
}

/// One primitive for the host renderer. Destinations are in GL
/// (bottom-left origin) output coordinates.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawCommand {
    Clear(Color),
    Texture {
        texture: TextureId,
        dest: Rect,
        alpha: f64,
        corner_radius: f64,
    },
    Rect {
        color: Color,
        dest: Rect,
        corner_radius: f64,
    },
    Border {
        color: Color,
        dest: Rect,
        width: i32,
        corner_radius: f64,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Frame {
    pub size: Size,
    pub commands: Vec<DrawCommand>,
}

/// Decorative resources owned by collaborators. Everything is optional.
#[derive(Default, Clone, Copy)]
pub struct FrameResources<'a> {
    pub wallpaper: Option<TextureId>,
    pub panel: Option<&'a dyn StatusPanel>,
    pub icons: Option<&'a dyn IconProvider>,
}

/// Corner radius of the zoomed preview: full when small, zero at fullscreen.
pub fn preview_corner_radius(corner_radius: f64, preview_width: i32, output_width: i32) -> f64 {
    let max = 2.0 * corner_radius;
    let fraction = preview_width as f64 / output_width.max(1) as f64;
    (max * (1.0 - fraction)).clamp(0.0, max)
}

struct FrameBuilder {
    height: i32,
    commands: Vec<DrawCommand>,
}

impl FrameBuilder {
    fn texture(&mut self, texture: TextureId, dest: Rect, alpha: f64, corner_radius: f64) {
        self.commands.push(DrawCommand::Texture {
            texture,
            dest: dest.flip_y(self.height),
            alpha,
            corner_radius,
        });
    }

    fn rect(&mut self, color: Color, dest: Rect, corner_radius: f64) {
        self.commands.push(DrawCommand::Rect {
            color,
            dest: dest.flip_y(self.height),
            corner_radius,
        });
    }

    fn border(&mut self, color: Color, dest: Rect, corner_radius: f64) {
        self.commands.push(DrawCommand::Border {
            color,
            dest: dest.flip_y(self.height),
            width: BORDER_WIDTH,
            corner_radius,
        });
    }
}

/// Build the overview frame, or `None` when nothing of it is visible.
pub fn compose(
    overview: &Overview,
    captures: &CaptureSet,
    resources: &FrameResources<'_>,
) -> Option<Frame> {
    if !overview.is_active() || overview.background_alpha() < MIN_VISIBLE_ALPHA {
        return None;
    }

    let size = overview.output_size();
    let options = overview.options();
    let fullscreen = Rect::from_size(size);
    let drag = overview.drag();
    let drop_target = drag.and_then(|d| d.hover_target());
    let focused = overview.focused_workspace();

    let mut frame = FrameBuilder {
        height: size.height,
        commands: vec![DrawCommand::Clear(Color::BLACK)],
    };

    match resources.wallpaper {
        Some(texture) => frame.texture(texture, fullscreen, 1.0, 0.0),
        None => frame.rect(Color::BACKGROUND, fullscreen, 0.0),
    }
    frame.rect(
        Color::BLACK.with_alpha(options.background_dim as f32),
        fullscreen,
        0.0,
    );

    let thumbnail_radius = options.corner_radius * 0.5;
    for (i, &thumbnail) in overview.screen_layout().thumbnails.iter().enumerate() {
        let is_drop_target = drop_target == Some(DropTarget::Thumbnail(i));
        let alpha = if i == focused || is_drop_target {
            1.0
        } else {
            THUMBNAIL_IDLE_ALPHA
        };
        match captures.texture(i) {
            Some(texture) => frame.texture(texture, thumbnail, alpha, thumbnail_radius),
            None => frame.rect(Color::FALLBACK, thumbnail, thumbnail_radius),
        }

        if is_drop_target {
            frame.border(Color::DROP_HIGHLIGHT, thumbnail, thumbnail_radius);
        } else if i == focused || overview.hovered_thumbnail() == Some(i) {
            frame.border(Color::HIGHLIGHT, thumbnail, thumbnail_radius);
        }
    }

    let mut previews = Vec::new();
    for i in 0..overview.workspace_count() {
        let Some(rect) = overview.workspace_preview(i) else {
            continue;
        };
        if !rect.intersects(&fullscreen) {
            continue;
        }
        let radius = preview_corner_radius(options.corner_radius, rect.width, size.width);
        match captures.texture(i) {
            Some(texture) => frame.texture(texture, rect, 1.0, radius),
            None => frame.rect(Color::FALLBACK, rect, radius),
        }
        if drop_target == Some(DropTarget::Preview(i)) {
            frame.border(Color::DROP_HIGHLIGHT, rect, radius);
        }
        previews.push(i);
    }

    if options.icon_size > 0 && overview.phase() != Phase::Deactivating {
        let icon_size = options.icon_size;
        let dragged = drag.map(|d| d.window());
        for &i in &previews {
            let Some(mapping) = overview.mapping_for(i) else {
                continue;
            };
            for slot in overview.slots(i) {
                if Some(slot.window()) == dragged {
                    continue;
                }
                let dest = icon_rect(&mapping, slot.current(), icon_size);
                let icon = resources.icons.and_then(|icons| icons.icon(slot.app_id()));
                match icon {
                    Some(texture) => frame.texture(texture, dest, 1.0, 0.0),
                    None => frame.rect(
                        Color::from_key(slot.app_id()),
                        dest,
                        icon_size as f64 / 4.0,
                    ),
                }
            }
        }
    }

    if let Some(panel) = resources.panel {
        let bounds = Rect::new(0, 0, size.width, panel.height());
        match panel.texture() {
            Some(texture) => frame.texture(texture, bounds, 1.0, 0.0),
            None => frame.rect(Color::from_hex(&options.panel_color), bounds, 0.0),
        }
        if panel.activities_hovered() {
            frame.rect(
                Color::HIGHLIGHT.with_alpha(0.15),
                panel.activities_bounds(),
                options.corner_radius * 0.5,
            );
        }
    }

    if let Some(session) = drag {
        if let Some(snapshot) = session.snapshot().filter(|_| session.has_snapshot()) {
            let floating = session.floating_rect();
            frame.rect(
                Color::SHADOW,
                floating.offset(SHADOW_OFFSET, SHADOW_OFFSET),
                options.corner_radius,
            );
            frame.texture(snapshot, floating, 1.0, options.corner_radius * 0.5);
        }
    }

    Some(Frame {
        size,
        commands: frame.commands,
    })
}

/// Badge over a slot, centred horizontally and straddling its bottom edge.
fn icon_rect(mapping: &ScreenMapping, slot: Rect, icon_size: i32) -> Rect {
    let on_screen = mapping.to_screen(slot);
    let center_x = on_screen.center().x.round() as i32;
    Rect::new(
        center_x - icon_size / 2,
        on_screen.bottom() - icon_size * 3 / 4,
        icon_size,
        icon_size,
    )
}
