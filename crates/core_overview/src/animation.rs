//! Scalar and rectangle easing.
//!
//! Animations are advanced by an explicit elapsed-time delta rather than by
//! reading a clock, so the frame loop decides what "now" means and tests can
//! simulate time exactly.

use crate::geometry::Rect;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Default animation length.
pub const DEFAULT_DURATION: Duration = Duration::from_millis(300);

const NEWTON_ITERATIONS: usize = 8;
const NEWTON_EPSILON: f64 = 1e-4;

/// A cubic Bezier timing curve through (0,0), (p1x,p1y), (p2x,p2y), (1,1).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BezierCurve {
    pub p1x: f64,
    pub p1y: f64,
    pub p2x: f64,
    pub p2y: f64,
}

impl Default for BezierCurve {
    fn default() -> Self {
        Self::new(0.25, 0.1, 0.25, 1.0)
    }
}

impl BezierCurve {
    pub fn new(p1x: f64, p1y: f64, p2x: f64, p2y: f64) -> Self {
        Self { p1x, p1y, p2x, p2y }
    }

    /// Eased output for time fraction `x`.
    pub fn y_for_x(&self, x: f64) -> f64 {
        if x <= 0.0 {
            return 0.0;
        }
        if x >= 1.0 {
            return 1.0;
        }
        let t = self.solve_t(x);
        Self::component(t, self.p1y, self.p2y)
    }

    fn component(t: f64, c1: f64, c2: f64) -> f64 {
        let mt = 1.0 - t;
        3.0 * mt * mt * t * c1 + 3.0 * mt * t * t * c2 + t * t * t
    }

    fn solve_t(&self, x: f64) -> f64 {
        let mut t = x;
        for _ in 0..NEWTON_ITERATIONS {
            let dx = Self::component(t, self.p1x, self.p2x) - x;
            if dx.abs() < NEWTON_EPSILON {
                break;
            }
            let mt = 1.0 - t;
            let derivative = 3.0 * mt * mt * self.p1x
                + 6.0 * mt * t * (self.p2x - self.p1x)
                + 3.0 * t * t * (1.0 - self.p2x);
            if derivative.abs() < NEWTON_EPSILON {
                break;
            }
            t = (t - dx / derivative).clamp(0.0, 1.0);
        }
        t
    }
}

/// Easing curve applied to the elapsed-time fraction.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Easing {
    /// `1 - (1 - t)^3`
    CubicOut,
    /// Two control point Bezier curve.
    Bezier(BezierCurve),
}

impl Default for Easing {
    fn default() -> Self {
        Easing::Bezier(BezierCurve::default())
    }
}

impl Easing {
    pub fn apply(&self, t: f64) -> f64 {
        let t = t.clamp(0.0, 1.0);
        match self {
            Easing::CubicOut => 1.0 - (1.0 - t).powi(3),
            Easing::Bezier(curve) => curve.y_for_x(t),
        }
    }
}

/// Duration and easing shared by a group of animated values.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    pub duration: Duration,
    pub easing: Easing,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            duration: DEFAULT_DURATION,
            easing: Easing::default(),
        }
    }
}

/// A single eased value.
///
/// `is_animating()` is false exactly when the value has settled on its goal.
#[derive(Debug, Clone)]
pub struct AnimatedScalar {
    value: f64,
    start: f64,
    goal: f64,
    elapsed: Duration,
    animating: bool,
    timing: Timing,
}

impl AnimatedScalar {
    pub fn new(initial: f64) -> Self {
        Self {
            value: initial,
            start: initial,
            goal: initial,
            elapsed: Duration::ZERO,
            animating: false,
            timing: Timing::default(),
        }
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.timing = timing;
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    /// Retarget towards `goal`.
    ///
    /// With `animate == false`, a zero duration, or a goal equal to the
    /// current value, the value jumps immediately. Otherwise interpolation
    /// restarts from the current value, even if an animation is in flight.
    pub fn set(&mut self, goal: f64, animate: bool) {
        if !animate || self.timing.duration.is_zero() || goal == self.value {
            self.warp(goal);
            return;
        }

        self.start = self.value;
        self.goal = goal;
        self.elapsed = Duration::ZERO;
        self.animating = true;
    }

    /// Discontinuous jump: start, goal and value all become `value`.
    pub fn warp(&mut self, value: f64) {
        self.value = value;
        self.start = value;
        self.goal = value;
        self.elapsed = Duration::ZERO;
        self.animating = false;
    }

    /// Advance by `delta`. Returns whether the value is still moving.
    pub fn tick(&mut self, delta: Duration) -> bool {
        if !self.animating {
            return false;
        }

        self.elapsed = self.elapsed.saturating_add(delta);
        let progress =
            (self.elapsed.as_secs_f64() / self.timing.duration.as_secs_f64()).clamp(0.0, 1.0);

        if progress >= 1.0 {
            self.value = self.goal;
            self.animating = false;
            return false;
        }

        let eased = self.timing.easing.apply(progress);
        self.value = self.start + (self.goal - self.start) * eased;
        true
    }

    pub fn value(&self) -> f64 {
        self.value
    }

    pub fn goal(&self) -> f64 {
        self.goal
    }

    pub fn is_animating(&self) -> bool {
        self.animating
    }
}

/// Four independently eased components of a rectangle.
#[derive(Debug, Clone)]
pub struct AnimatedRect {
    x: AnimatedScalar,
    y: AnimatedScalar,
    width: AnimatedScalar,
    height: AnimatedScalar,
}

impl AnimatedRect {
    pub fn new(initial: Rect) -> Self {
        Self {
            x: AnimatedScalar::new(initial.x as f64),
            y: AnimatedScalar::new(initial.y as f64),
            width: AnimatedScalar::new(initial.width as f64),
            height: AnimatedScalar::new(initial.height as f64),
        }
    }

    pub fn set_timing(&mut self, timing: Timing) {
        self.x.set_timing(timing);
        self.y.set_timing(timing);
        self.width.set_timing(timing);
        self.height.set_timing(timing);
    }

    pub fn set_goal(&mut self, goal: Rect, animate: bool) {
        self.x.set(goal.x as f64, animate);
        self.y.set(goal.y as f64, animate);
        self.width.set(goal.width as f64, animate);
        self.height.set(goal.height as f64, animate);
    }

    pub fn warp(&mut self, rect: Rect) {
        self.x.warp(rect.x as f64);
        self.y.warp(rect.y as f64);
        self.width.warp(rect.width as f64);
        self.height.warp(rect.height as f64);
    }

    /// Advance every component. Returns whether any is still moving.
    pub fn tick(&mut self, delta: Duration) -> bool {
        let x = self.x.tick(delta);
        let y = self.y.tick(delta);
        let w = self.width.tick(delta);
        let h = self.height.tick(delta);
        x || y || w || h
    }

    /// Current value rounded to whole pixels.
    pub fn current(&self) -> Rect {
        Rect::new(
            self.x.value().round() as i32,
            self.y.value().round() as i32,
            self.width.value().round() as i32,
            self.height.value().round() as i32,
        )
    }

    pub fn goal(&self) -> Rect {
        Rect::new(
            self.x.goal().round() as i32,
            self.y.goal().round() as i32,
            self.width.goal().round() as i32,
            self.height.goal().round() as i32,
        )
    }

    pub fn is_animating(&self) -> bool {
        self.x.is_animating()
            || self.y.is_animating()
            || self.width.is_animating()
            || self.height.is_animating()
    }
}
