//! Shared numeric constants for the canvas crate.

// ── Reference canvas ────────────────────────────────────────────

/// Width of the virtual reference canvas. A scale anchor only; nothing is
/// ever rendered at this size.
pub const VIRTUAL_W: f64 = 1920.0;

/// Height of the virtual reference canvas.
pub const VIRTUAL_H: f64 = 1080.0;

// ── Strokes ─────────────────────────────────────────────────────

/// Line width that normalizes to 1.0.
pub const REFERENCE_LINE_WIDTH: f64 = 2.0;

/// Thinnest stroke painted after denormalization, in pixels.
pub const MIN_LINE_PX: f64 = 0.5;

/// Thickest stroke painted after denormalization, in pixels.
pub const MAX_LINE_PX: f64 = 64.0;

// ── Text ────────────────────────────────────────────────────────

/// Font size that normalizes to 1.0 on the virtual canvas.
pub const REFERENCE_FONT_SIZE: f64 = 16.0;

/// Smallest font size painted after denormalization, in pixels.
pub const MIN_FONT_PX: f64 = 8.0;

/// Largest font size painted after denormalization, in pixels.
pub const MAX_FONT_PX: f64 = 72.0;

// ── Pages ───────────────────────────────────────────────────────

/// Page-relative rectangles are expressed in percent.
pub const PCT_SCALE: f64 = 100.0;
