//! Grid arrangement of windows and placement of the overview chrome.
//!
//! Two independent computations live here:
//! - [`arrange`] lays the windows of one workspace out in a grid, in
//!   workspace-logical coordinates.
//! - [`ScreenLayout`] positions the workspace thumbnails and the large
//!   preview on the output, in screen coordinates.

use crate::geometry::{Point, Rect, Size};

/// Windows are shrunk by this factor inside their cell.
pub const CELL_MARGIN_FACTOR: f64 = 0.95;

/// Largest column count considered for four or more windows.
pub const MAX_COLUMNS: usize = 6;

/// Thumbnail height as a fraction of the output height.
pub const THUMBNAIL_HEIGHT_FRACTION: f64 = 0.12;

/// Weight of the wasted-cell penalty in the grid score.
const EMPTY_CELL_PENALTY: f64 = 0.5;

/// Column and row count of a window grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridShape {
    pub cols: usize,
    pub rows: usize,
}

impl GridShape {
    pub fn cells(&self) -> usize {
        self.cols * self.rows
    }
}

/// Pick a grid for `count` windows in an area with the given aspect ratio.
///
/// `aspect` is the area's width/height divided by the mean width/height of
/// the windows: a value of 1.0 means "windows are shaped like the area", for
/// which a square-ish grid fits best. A raw 16:9 area aspect with four
/// windows therefore picks 3x2; pass [`normalized_aspect`] to get 2x2 for
/// screen-shaped windows.
pub fn choose_grid(count: usize, aspect: f64) -> GridShape {
    match count {
        0 => return GridShape { cols: 0, rows: 0 },
        1..=3 => return GridShape { cols: count, rows: 1 },
        _ => {}
    }

    let aspect = if aspect.is_finite() && aspect > 0.0 { aspect } else { 1.0 };
    let mut best = GridShape {
        cols: 2,
        rows: count.div_ceil(2),
    };
    let mut best_score = f64::INFINITY;

    for cols in 2..=count.min(MAX_COLUMNS) {
        let rows = count.div_ceil(cols);
        let grid_aspect = cols as f64 / rows as f64;
        let wasted = (cols * rows - count) as f64 / count as f64;
        let score = (grid_aspect - aspect).abs() / aspect + EMPTY_CELL_PENALTY * wasted;

        if score < best_score {
            best_score = score;
            best = GridShape { cols, rows };
        }
    }

    best
}

/// Aspect ratio fed to [`choose_grid`]: the area's aspect relative to the
/// mean aspect of the windows.
pub fn normalized_aspect(area: Rect, windows: &[Rect]) -> f64 {
    let area_aspect = area.size().aspect();
    if windows.is_empty() {
        return area_aspect;
    }
    let mean: f64 =
        windows.iter().map(|w| w.size().aspect()).sum::<f64>() / windows.len() as f64;
    area_aspect / mean
}

/// Compute a target rectangle for every window.
///
/// `windows` are the original geometries (already clamped to a sane minimum);
/// the result has the same length and order. Every target lies inside `area`
/// and no two targets overlap.
pub fn arrange(windows: &[Rect], area: Rect, spacing: i32) -> Vec<Rect> {
    let count = windows.len();
    if count == 0 {
        return Vec::new();
    }

    let grid = choose_grid(count, normalized_aspect(area, windows));
    let spacing = spacing.max(0);
    let cols = grid.cols as i32;
    let rows = grid.rows as i32;

    let cell_width = ((area.width - spacing * (cols - 1)) / cols).max(1);
    let cell_height = ((area.height - spacing * (rows - 1)) / rows).max(1);

    let grid_height = rows * cell_height + (rows - 1) * spacing;
    let start_y = area.y + (area.height - grid_height).max(0) / 2;

    windows
        .iter()
        .enumerate()
        .map(|(i, original)| {
            let row = (i / grid.cols) as i32;
            let col = (i % grid.cols) as i32;

            // The last row may be shorter; centre it on its own item count.
            let in_row = (count - row as usize * grid.cols).min(grid.cols) as i32;
            let row_width = in_row * cell_width + (in_row - 1) * spacing;
            let row_start_x = area.x + (area.width - row_width).max(0) / 2;

            let cell = Rect::new(
                row_start_x + col * (cell_width + spacing),
                start_y + row * (cell_height + spacing),
                cell_width,
                cell_height,
            );
            fit_in_cell(*original, cell)
        })
        .collect()
}

/// Scale `window` to fit `cell`, preserving aspect ratio, and centre it.
fn fit_in_cell(window: Rect, cell: Rect) -> Rect {
    let ow = window.width.max(1) as f64;
    let oh = window.height.max(1) as f64;
    let scale = (cell.width as f64 / ow).min(cell.height as f64 / oh) * CELL_MARGIN_FACTOR;

    let width = ((ow * scale) as i32).clamp(1, cell.width);
    let height = ((oh * scale) as i32).clamp(1, cell.height);

    Rect::new(
        cell.x + (cell.width - width) / 2,
        cell.y + (cell.height - height) / 2,
        width,
        height,
    )
}

/// Area of a workspace that windows are arranged into.
pub fn window_area(workspace: Size, spacing: i32) -> Rect {
    Rect::from_size(workspace).inset(spacing.max(0) * 2)
}

/// Parameters for [`ScreenLayout::compute`].
#[derive(Debug, Clone, Copy)]
pub struct ScreenLayoutParams {
    pub spacing: i32,
    pub panel_height: i32,
    pub preview_scale: f64,
}

/// Where the overview chrome sits on the output, in screen coordinates
/// relative to the output's top-left corner.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenLayout {
    /// One thumbnail per workspace, row-major.
    pub thumbnails: Vec<Rect>,
    /// Large preview of the focused workspace.
    pub preview: Rect,
}

impl ScreenLayout {
    /// Thumbnails along the bottom edge, large preview above them.
    pub fn compute(output: Size, workspaces: usize, params: ScreenLayoutParams) -> Self {
        let spacing = params.spacing.max(0);
        let out_w = output.width.max(1);
        let out_h = output.height.max(1);
        let aspect = output.aspect();

        let ws_spacing = spacing / 2;
        let count = workspaces.max(1) as i32;
        let mut thumb_height = ((out_h as f64 * THUMBNAIL_HEIGHT_FRACTION) as i32).max(1);
        let mut thumb_width = ((thumb_height as f64 * aspect) as i32).max(1);

        // Shrink the strip when many workspaces would overflow the output.
        let max_strip = (out_w - spacing * 2).max(count);
        let strip = count * thumb_width + (count - 1) * ws_spacing;
        if strip > max_strip {
            thumb_width = ((max_strip - (count - 1) * ws_spacing) / count).max(1);
            thumb_height = ((thumb_width as f64 / aspect) as i32).max(1);
        }

        let strip = count * thumb_width + (count - 1) * ws_spacing;
        let start_x = (out_w - strip) / 2;
        let thumb_y = out_h - spacing * 2 - thumb_height;

        let thumbnails = (0..workspaces as i32)
            .map(|i| {
                Rect::new(
                    start_x + i * (thumb_width + ws_spacing),
                    thumb_y,
                    thumb_width,
                    thumb_height,
                )
            })
            .collect();

        let top = params.panel_height.max(0) + spacing * 2;
        let bottom = thumb_y - spacing * 2;
        let side_margin = spacing * 4;
        let available_height = (bottom - top).max(1);
        let available_width = (out_w - side_margin * 2).max(1);

        let mut width = available_width as f64;
        let mut height = width / aspect;
        if height > available_height as f64 {
            height = available_height as f64;
            width = height * aspect;
        }

        let scale = params.preview_scale.clamp(0.1, 1.0);
        let width = ((width * scale) as i32).max(1);
        let height = ((height * scale) as i32).max(1);

        let preview = Rect::new(
            (out_w - width) / 2,
            top + (available_height - height) / 2,
            width,
            height,
        );

        Self {
            thumbnails,
            preview,
        }
    }
}

/// Large preview of workspace `index` when the carousel is scrolled to
/// `scroll` (fractional workspace index at the centre).
pub fn carousel_rect(preview: Rect, index: usize, scroll: f64, spacing: i32) -> Rect {
    let stride = (preview.width + spacing.max(0)) as f64;
    let dx = ((index as f64 - scroll) * stride).round() as i32;
    preview.offset(dx, 0)
}

/// Linear map between a workspace (logical, origin at its top-left) and the
/// screen rectangle it is drawn into.
///
/// Both sides are Y-down; drawing and hit-testing use the same mapping.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScreenMapping {
    pub screen: Rect,
    pub workspace: Size,
}

impl ScreenMapping {
    pub fn new(screen: Rect, workspace: Size) -> Self {
        Self { screen, workspace }
    }

    fn scale_x(&self) -> f64 {
        self.screen.width as f64 / self.workspace.width.max(1) as f64
    }

    fn scale_y(&self) -> f64 {
        self.screen.height as f64 / self.workspace.height.max(1) as f64
    }

    /// Screen point to workspace point.
    pub fn to_workspace(&self, point: Point) -> Point {
        Point::new(
            (point.x - self.screen.x as f64) / self.scale_x(),
            (point.y - self.screen.y as f64) / self.scale_y(),
        )
    }

    /// Workspace rectangle to screen rectangle.
    pub fn to_screen(&self, rect: Rect) -> Rect {
        let sx = self.scale_x();
        let sy = self.scale_y();
        let x1 = (self.screen.x as f64 + rect.x as f64 * sx).round() as i32;
        let y1 = (self.screen.y as f64 + rect.y as f64 * sy).round() as i32;
        let x2 = (self.screen.x as f64 + rect.right() as f64 * sx).round() as i32;
        let y2 = (self.screen.y as f64 + rect.bottom() as f64 * sy).round() as i32;
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Screen rectangle to workspace rectangle.
    pub fn rect_to_workspace(&self, rect: Rect) -> Rect {
        let a = self.to_workspace(Point::new(rect.x as f64, rect.y as f64));
        let b = self.to_workspace(Point::new(rect.right() as f64, rect.bottom() as f64));
        let x1 = a.x.round() as i32;
        let y1 = a.y.round() as i32;
        Rect::new(x1, y1, b.x.round() as i32 - x1, b.y.round() as i32 - y1)
    }
}
