//! Coordinate normalization between local pixels and shared unit space.
//!
//! Every peer renders onto a canvas of its own size. Geometry leaves a peer
//! normalized against that peer's [`Dims`] and is denormalized by the receiver
//! against its own [`Dims`], so a stroke lands at the same proportional place
//! on a wide desktop and a narrow phone.
//!
//! Lengths (line width, font size) scale with the *smaller* canvas side
//! relative to a fixed virtual 1920x1080 canvas, so strokes and text neither
//! vanish nor balloon when aspect ratios differ sharply.
//!
//! All functions are pure and total. Unmeasured dimensions (either side zero)
//! produce zero results instead of NaN or infinity; callers must not emit
//! anything derived from an unmeasured frame.

#[cfg(test)]
#[path = "normalize_test.rs"]
mod normalize_test;

use frames::PctRect;

use crate::consts::{
    MAX_FONT_PX, MAX_LINE_PX, MIN_FONT_PX, MIN_LINE_PX, PCT_SCALE, REFERENCE_FONT_SIZE, REFERENCE_LINE_WIDTH,
    VIRTUAL_H, VIRTUAL_W,
};

/// A point in either pixel or unit space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    #[must_use]
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Local canvas size in pixels. Recomputed on container resize and never
/// sent over the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Dims {
    pub width: u32,
    pub height: u32,
}

impl Dims {
    #[must_use]
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Whether the canvas has been laid out at least once.
    #[must_use]
    pub fn is_measured(self) -> bool {
        self.width > 0 && self.height > 0
    }

    #[must_use]
    pub fn width_f(self) -> f64 {
        f64::from(self.width)
    }

    #[must_use]
    pub fn height_f(self) -> f64 {
        f64::from(self.height)
    }
}

/// Axis-aligned rectangle in client (pixel) space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    #[must_use]
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self { left, top, width, height }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.width <= 0.0 || self.height <= 0.0
    }
}

// =============================================================================
// POINTS
// =============================================================================

/// Map a pixel position into `[0,1]²`, clamping out-of-bounds input.
#[must_use]
pub fn normalize_point(p: Point, dims: Dims) -> Point {
    if !dims.is_measured() {
        return Point::new(0.0, 0.0);
    }
    Point {
        x: (p.x / dims.width_f()).clamp(0.0, 1.0),
        y: (p.y / dims.height_f()).clamp(0.0, 1.0),
    }
}

/// Map a unit-space position onto the local canvas, clamped to its bounds.
#[must_use]
pub fn denormalize_point(p: Point, dims: Dims) -> Point {
    let w = dims.width_f();
    let h = dims.height_f();
    Point {
        x: (p.x * w).clamp(0.0, w),
        y: (p.y * h).clamp(0.0, h),
    }
}

// =============================================================================
// LENGTHS
// =============================================================================

/// Ratio of the local canvas's smaller side to the virtual canvas's smaller side.
#[must_use]
pub fn canvas_scale(dims: Dims) -> f64 {
    if !dims.is_measured() {
        return 0.0;
    }
    dims.width_f().min(dims.height_f()) / VIRTUAL_W.min(VIRTUAL_H)
}

/// Line width relative to the reference width. Independent of canvas size.
#[must_use]
pub fn normalize_line_width(width: f64) -> f64 {
    width / REFERENCE_LINE_WIDTH
}

/// Pixel line width for the local canvas, clamped to `[MIN_LINE_PX, MAX_LINE_PX]`.
#[must_use]
pub fn denormalize_line_width(width: f64, dims: Dims) -> f64 {
    if !dims.is_measured() {
        return 0.0;
    }
    (width * REFERENCE_LINE_WIDTH * canvas_scale(dims)).clamp(MIN_LINE_PX, MAX_LINE_PX)
}

/// Font size expressed on the virtual canvas, relative to the reference size.
#[must_use]
pub fn normalize_font_size(size: f64, dims: Dims) -> f64 {
    if !dims.is_measured() {
        return 0.0;
    }
    (size / canvas_scale(dims)) / REFERENCE_FONT_SIZE
}

/// Pixel font size for the local canvas, clamped to `[MIN_FONT_PX, MAX_FONT_PX]`.
#[must_use]
pub fn denormalize_font_size(size: f64, dims: Dims) -> f64 {
    if !dims.is_measured() {
        return 0.0;
    }
    (size * REFERENCE_FONT_SIZE * canvas_scale(dims)).clamp(MIN_FONT_PX, MAX_FONT_PX)
}

// =============================================================================
// PAGE RECTANGLES
// =============================================================================

/// Express a client-space rectangle as percentages of the page box it sits on.
#[must_use]
pub fn rect_to_pct(rect: Rect, page: Rect) -> PctRect {
    if page.is_empty() {
        return PctRect { x_pct: 0.0, y_pct: 0.0, w_pct: 0.0, h_pct: 0.0 };
    }
    let x_pct = ((rect.left - page.left) / page.width * PCT_SCALE).clamp(0.0, PCT_SCALE);
    let y_pct = ((rect.top - page.top) / page.height * PCT_SCALE).clamp(0.0, PCT_SCALE);
    let right_pct = ((rect.left + rect.width - page.left) / page.width * PCT_SCALE).clamp(0.0, PCT_SCALE);
    let bottom_pct = ((rect.top + rect.height - page.top) / page.height * PCT_SCALE).clamp(0.0, PCT_SCALE);
    PctRect {
        x_pct,
        y_pct,
        w_pct: (right_pct - x_pct).max(0.0),
        h_pct: (bottom_pct - y_pct).max(0.0),
    }
}

/// Position a page-relative rectangle against a local page of the given size.
/// The result is in page-local pixels (origin at the page's top-left corner).
#[must_use]
pub fn pct_to_rect(pct: PctRect, page_width: f64, page_height: f64) -> Rect {
    Rect {
        left: pct.x_pct / PCT_SCALE * page_width,
        top: pct.y_pct / PCT_SCALE * page_height,
        width: pct.w_pct / PCT_SCALE * page_width,
        height: pct.h_pct / PCT_SCALE * page_height,
    }
}
