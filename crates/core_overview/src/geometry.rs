//! Geometry primitives shared by the layout engine, hit-testing and the compositor.
//!
//! All positions are stored Y-down: the origin is the top-left corner of the
//! output (screen space) or of the workspace (workspace space). The one place
//! that converts to the bottom-left GL convention is [`Rect::flip_y`], called
//! by the compositor when a draw command is emitted.

use serde::{Deserialize, Serialize};

/// Smallest width/height a window slot is allowed to have.
pub const MIN_WINDOW_SIZE: i32 = 100;

/// A point in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another point.
    pub fn distance(&self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// Dimensions in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Size {
    pub width: i32,
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Self {
        Self { width, height }
    }

    /// Width divided by height, or 1.0 for a degenerate size.
    pub fn aspect(&self) -> f64 {
        if self.width <= 0 || self.height <= 0 {
            return 1.0;
        }
        self.width as f64 / self.height as f64
    }

    /// Scale to physical pixels, never returning an empty size.
    pub fn to_physical(&self, scale: f64) -> Size {
        Size {
            width: ((self.width as f64 * scale).round() as i32).max(1),
            height: ((self.height as f64 * scale).round() as i32).max(1),
        }
    }
}

/// A rectangle in logical pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub x: i32,
    pub y: i32,
    pub width: i32,
    pub height: i32,
}

impl Rect {
    /// Create a new rectangle.
    pub fn new(x: i32, y: i32, width: i32, height: i32) -> Self {
        Self { x, y, width, height }
    }

    /// A rectangle at the origin with the given size.
    pub fn from_size(size: Size) -> Self {
        Self::new(0, 0, size.width, size.height)
    }

    /// Check if this rectangle intersects with another.
    pub fn intersects(&self, other: &Rect) -> bool {
        self.x < other.x + other.width
            && self.x + self.width > other.x
            && self.y < other.y + other.height
            && self.y + self.height > other.y
    }

    /// Check if `other` lies entirely inside this rectangle.
    pub fn contains_rect(&self, other: &Rect) -> bool {
        other.x >= self.x
            && other.y >= self.y
            && other.right() <= self.right()
            && other.bottom() <= self.bottom()
    }

    /// Half-open point containment: left/top edges are inside, right/bottom are not.
    pub fn contains(&self, point: Point) -> bool {
        point.x >= self.x as f64
            && point.x < self.right() as f64
            && point.y >= self.y as f64
            && point.y < self.bottom() as f64
    }

    /// Get the right edge x-coordinate.
    pub fn right(&self) -> i32 {
        self.x + self.width
    }

    /// Get the bottom edge y-coordinate.
    pub fn bottom(&self) -> i32 {
        self.y + self.height
    }

    pub fn size(&self) -> Size {
        Size::new(self.width, self.height)
    }

    pub fn center(&self) -> Point {
        Point::new(
            self.x as f64 + self.width as f64 / 2.0,
            self.y as f64 + self.height as f64 / 2.0,
        )
    }

    pub fn is_empty(&self) -> bool {
        self.width <= 0 || self.height <= 0
    }

    /// Translate by a delta.
    pub fn offset(&self, dx: i32, dy: i32) -> Rect {
        Rect::new(self.x + dx, self.y + dy, self.width, self.height)
    }

    /// Shrink every edge by `amount`.
    pub fn inset(&self, amount: i32) -> Rect {
        Rect::new(
            self.x + amount,
            self.y + amount,
            (self.width - amount * 2).max(1),
            (self.height - amount * 2).max(1),
        )
    }

    /// Clamp the dimensions so that neither is below `min`.
    ///
    /// Degenerate (zero or negative) dimensions are replaced by `min`, the
    /// position is kept.
    pub fn with_min_size(&self, min: i32) -> Rect {
        Rect::new(
            self.x,
            self.y,
            if self.width <= 0 { min } else { self.width.max(min) },
            if self.height <= 0 { min } else { self.height.max(min) },
        )
    }

    /// The overlapping area of two rectangles, if any.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let x1 = self.x.max(other.x);
        let y1 = self.y.max(other.y);
        let x2 = self.right().min(other.right());
        let y2 = self.bottom().min(other.bottom());
        if x2 <= x1 || y2 <= y1 {
            return None;
        }
        Some(Rect::new(x1, y1, x2 - x1, y2 - y1))
    }

    /// Smallest rectangle covering both.
    pub fn union(&self, other: &Rect) -> Rect {
        if self.is_empty() {
            return *other;
        }
        if other.is_empty() {
            return *self;
        }
        let x1 = self.x.min(other.x);
        let y1 = self.y.min(other.y);
        let x2 = self.right().max(other.right());
        let y2 = self.bottom().max(other.bottom());
        Rect::new(x1, y1, x2 - x1, y2 - y1)
    }

    /// Convert from Y-down to Y-up inside a surface of the given height.
    pub fn flip_y(&self, surface_height: i32) -> Rect {
        Rect::new(
            self.x,
            surface_height - self.y - self.height,
            self.width,
            self.height,
        )
    }
}

/// A set of rectangles used for damage tracking.
///
/// Rectangles are kept as pushed; overlapping entries are allowed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Region {
    rects: Vec<Rect>,
}

impl Region {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_rect(rect: Rect) -> Self {
        let mut region = Self::new();
        region.add(rect);
        region
    }

    /// Add a rectangle to the region. Empty rectangles are ignored.
    pub fn add(&mut self, rect: Rect) {
        if rect.is_empty() || self.rects.iter().any(|r| r.contains_rect(&rect)) {
            return;
        }
        self.rects.retain(|r| !rect.contains_rect(r));
        self.rects.push(rect);
    }

    pub fn merge(&mut self, other: &Region) {
        for rect in &other.rects {
            self.add(*rect);
        }
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn rects(&self) -> &[Rect] {
        &self.rects
    }

    /// Bounding box of every rectangle in the region.
    pub fn extents(&self) -> Option<Rect> {
        let mut iter = self.rects.iter();
        let first = *iter.next()?;
        Some(iter.fold(first, |acc, r| acc.union(r)))
    }

    /// Restrict the region to `clip`.
    pub fn intersect(&self, clip: &Rect) -> Region {
        let mut out = Region::new();
        for rect in &self.rects {
            if let Some(r) = rect.intersection(clip) {
                out.add(r);
            }
        }
        out
    }
}
