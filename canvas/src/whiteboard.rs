//! Whiteboard raster: the local bitmap every participant paints into.
//!
//! DESIGN
//! ======
//! The board owns a `tiny_skia::Pixmap` sized to the local [`Dims`]. Incoming
//! strokes and text marks are normalized; they are denormalized against this
//! board's own dims at paint time, which is the whole cross-device trick.
//!
//! The surface is always opaque (white background, source-over painting), so
//! its premultiplied pixels equal straight RGBA. That lets text rendering and
//! PNG encoding borrow the bytes as an `image::RgbaImage` without conversion.
//!
//! ERROR HANDLING
//! ==============
//! Paint calls return [`WhiteboardError`] and leave the surface untouched on
//! failure. The session logs and moves on; one bad mark never blocks drawing.

#[cfg(test)]
#[path = "whiteboard_test.rs"]
mod whiteboard_test;

use std::io::Cursor;

use ab_glyph::{Font, ScaleFont};
use frames::{StrokeSegment, TextMark};
use image::{ImageFormat, RgbaImage};
use imageproc::drawing::draw_text_mut;
use tiny_skia::{
    Color, FillRule, FilterQuality, LineCap, LineJoin, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

use crate::color::{ColorError, Rgba, parse_color};
use crate::font::FontBook;
use crate::normalize::{Dims, Point, denormalize_font_size, denormalize_line_width, denormalize_point};

#[derive(Debug, thiserror::Error)]
pub enum WhiteboardError {
    #[error("canvas has not been measured")]
    Unmeasured,
    #[error("cannot allocate a {width}x{height} surface")]
    Allocate { width: u32, height: u32 },
    #[error(transparent)]
    InvalidColor(#[from] ColorError),
    #[error("no font available for `{0}`")]
    FontUnavailable(String),
    #[error("mark geometry is not finite")]
    NonFinite,
    #[error("snapshot encode failed: {0}")]
    Encode(#[source] image::ImageError),
    #[error("snapshot decode failed: {0}")]
    Decode(#[source] image::ImageError),
}

pub struct Whiteboard {
    pixmap: Pixmap,
    dims: Dims,
    fonts: FontBook,
}

impl std::fmt::Debug for Whiteboard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Whiteboard").field("dims", &self.dims).field("fonts", &self.fonts).finish()
    }
}

impl Whiteboard {
    /// Allocate a blank board for a measured canvas.
    ///
    /// # Errors
    ///
    /// [`WhiteboardError::Unmeasured`] when either side is zero, or
    /// [`WhiteboardError::Allocate`] when the surface is too large.
    pub fn new(dims: Dims, fonts: FontBook) -> Result<Self, WhiteboardError> {
        let pixmap = blank_surface(dims)?;
        Ok(Self { pixmap, dims, fonts })
    }

    #[must_use]
    pub fn dims(&self) -> Dims {
        self.dims
    }

    #[must_use]
    pub fn pixmap(&self) -> &Pixmap {
        &self.pixmap
    }

    pub fn pixmap_mut(&mut self) -> &mut Pixmap {
        &mut self.pixmap
    }

    // =========================================================================
    // PAINTING
    // =========================================================================

    /// Paint one normalized stroke segment with a round cap. A zero-length
    /// segment paints a dot.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable color or non-finite geometry.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_stroke(&mut self, segment: &StrokeSegment) -> Result<(), WhiteboardError> {
        let coords = [segment.x0, segment.y0, segment.x1, segment.y1, segment.line_width];
        if !coords.iter().all(|v| v.is_finite()) {
            return Err(WhiteboardError::NonFinite);
        }
        let color = parse_color(&segment.color)?;

        let a = denormalize_point(Point::new(segment.x0, segment.y0), self.dims);
        let b = denormalize_point(Point::new(segment.x1, segment.y1), self.dims);
        let width = denormalize_line_width(segment.line_width, self.dims) as f32;
        let paint = color.to_paint();

        if a == b {
            let Some(dot) = PathBuilder::from_circle(a.x as f32, a.y as f32, width / 2.0) else {
                return Ok(());
            };
            self.pixmap.fill_path(&dot, &paint, FillRule::Winding, Transform::identity(), None);
            return Ok(());
        }

        let mut pb = PathBuilder::new();
        pb.move_to(a.x as f32, a.y as f32);
        pb.line_to(b.x as f32, b.y as f32);
        let Some(path) = pb.finish() else {
            return Ok(());
        };
        let stroke = Stroke { width, line_cap: LineCap::Round, line_join: LineJoin::Round, ..Stroke::default() };
        self.pixmap.stroke_path(&path, &paint, &stroke, Transform::identity(), None);
        Ok(())
    }

    /// Render a normalized text mark. `(x, y)` is the alphabetic baseline
    /// origin; text is painted opaque in the mark's color.
    ///
    /// # Errors
    ///
    /// Fails on an unparseable color, non-finite geometry, or when the
    /// font book has nothing to render with.
    #[allow(clippy::cast_possible_truncation)]
    pub fn apply_text_mark(&mut self, mark: &TextMark) -> Result<(), WhiteboardError> {
        if ![mark.x, mark.y, mark.font_size].iter().all(|v| v.is_finite()) {
            return Err(WhiteboardError::NonFinite);
        }
        let color = parse_color(&mark.color)?;
        if mark.text.is_empty() {
            return Ok(());
        }
        let font = self
            .fonts
            .resolve(&mark.font_family)
            .ok_or_else(|| WhiteboardError::FontUnavailable(mark.font_family.clone()))?;

        let origin = denormalize_point(Point::new(mark.x, mark.y), self.dims);
        let px = denormalize_font_size(mark.font_size, self.dims) as f32;
        let ascent = font.as_scaled(px).ascent();

        let mut image = self.to_image()?;
        draw_text_mut(
            &mut image,
            image::Rgba([color.r, color.g, color.b, 255]),
            origin.x.round() as i32,
            (origin.y as f32 - ascent).round() as i32,
            px,
            font,
            &mark.text,
        );
        self.pixmap.data_mut().copy_from_slice(image.as_raw());
        Ok(())
    }

    /// Wipe the board to blank white.
    pub fn clear(&mut self) {
        self.pixmap.fill(Color::WHITE);
    }

    /// Adopt new local dims, rescaling what is already drawn so the board
    /// keeps its proportional look.
    ///
    /// # Errors
    ///
    /// Same as [`Whiteboard::new`]. The old surface is kept on failure.
    #[allow(clippy::cast_precision_loss)]
    pub fn resize(&mut self, dims: Dims) -> Result<(), WhiteboardError> {
        if dims == self.dims {
            return Ok(());
        }
        let mut next = blank_surface(dims)?;
        let sx = dims.width as f32 / self.pixmap.width() as f32;
        let sy = dims.height as f32 / self.pixmap.height() as f32;
        draw_scaled(&mut next, &self.pixmap, sx, sy);
        self.pixmap = next;
        self.dims = dims;
        Ok(())
    }

    // =========================================================================
    // SNAPSHOTS
    // =========================================================================

    /// Encode the board as PNG.
    ///
    /// # Errors
    ///
    /// [`WhiteboardError::Encode`] if the PNG encoder fails.
    pub fn persist(&self) -> Result<Vec<u8>, WhiteboardError> {
        let image = self.to_image()?;
        let mut buffer = Cursor::new(Vec::new());
        image.write_to(&mut buffer, ImageFormat::Png).map_err(WhiteboardError::Encode)?;
        Ok(buffer.into_inner())
    }

    /// Replace the board with a decoded snapshot, scaled to the local dims.
    /// Transparent snapshot pixels are flattened over white.
    ///
    /// # Errors
    ///
    /// [`WhiteboardError::Decode`] for bytes that are not a readable image.
    /// The board is untouched on failure.
    #[allow(clippy::cast_precision_loss)]
    pub fn restore(&mut self, bytes: &[u8]) -> Result<(), WhiteboardError> {
        let decoded = image::load_from_memory(bytes).map_err(WhiteboardError::Decode)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        let mut source = Pixmap::new(width, height).ok_or(WhiteboardError::Allocate { width, height })?;
        for (dst, src) in source.data_mut().chunks_exact_mut(4).zip(decoded.pixels()) {
            dst.copy_from_slice(&flatten_over_white(src.0));
        }

        self.clear();
        let sx = self.dims.width as f32 / width as f32;
        let sy = self.dims.height as f32 / height as f32;
        draw_scaled(&mut self.pixmap, &source, sx, sy);
        Ok(())
    }

    // =========================================================================
    // INSPECTION
    // =========================================================================

    /// Color at a pixel, or `None` outside the board.
    #[must_use]
    pub fn pixel(&self, x: u32, y: u32) -> Option<Rgba> {
        self.pixmap.pixel(x, y).map(|p| {
            let c = p.demultiply();
            Rgba { r: c.red(), g: c.green(), b: c.blue(), a: c.alpha() }
        })
    }

    /// Whether nothing has been drawn since the last clear.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.pixmap.data().iter().all(|&b| b == u8::MAX)
    }

    fn to_image(&self) -> Result<RgbaImage, WhiteboardError> {
        RgbaImage::from_raw(self.pixmap.width(), self.pixmap.height(), self.pixmap.data().to_vec())
            .ok_or(WhiteboardError::Allocate { width: self.dims.width, height: self.dims.height })
    }
}

fn blank_surface(dims: Dims) -> Result<Pixmap, WhiteboardError> {
    if !dims.is_measured() {
        return Err(WhiteboardError::Unmeasured);
    }
    let mut pixmap = Pixmap::new(dims.width, dims.height)
        .ok_or(WhiteboardError::Allocate { width: dims.width, height: dims.height })?;
    pixmap.fill(Color::WHITE);
    Ok(pixmap)
}

fn draw_scaled(target: &mut Pixmap, source: &Pixmap, sx: f32, sy: f32) {
    let paint = PixmapPaint { quality: FilterQuality::Bilinear, ..PixmapPaint::default() };
    target.draw_pixmap(0, 0, source.as_ref(), &paint, Transform::from_scale(sx, sy), None);
}

#[allow(clippy::cast_possible_truncation)]
fn flatten_over_white([r, g, b, a]: [u8; 4]) -> [u8; 4] {
    let a = u32::from(a);
    let mix = |c: u8| ((u32::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
    [mix(r), mix(g), mix(b), 255]
}
