//! PDF highlight annotations.
//!
//! The store is an ordered list of [`Annotation`]s keyed by opaque id. Local
//! edits return the event to broadcast; remote events are applied with
//! replace-or-append and filter-by-id semantics, so duplicates and reordered
//! delivery converge.
//!
//! Rectangles are kept as page-relative percentages. [`AnnotationStore::overlay`]
//! positions them against the local page size at render time, which keeps a
//! highlight on the same words at any zoom.

#[cfg(test)]
#[path = "annotation_test.rs"]
mod annotation_test;

use frames::{Annotation, AnnotationEvent, AnnotationKind, Tombstone};
use tiny_skia::{Pixmap, Transform};
use tracing::debug;

use crate::color::{ColorError, parse_color};
use crate::normalize::{Rect, pct_to_rect, rect_to_pct};

/// Default highlighter paint.
pub const DEFAULT_HIGHLIGHT_COLOR: &str = "rgba(255,235,59,0.4)";

/// One highlight rectangle positioned on the local page, in page pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct HighlightBox {
    pub annotation_id: String,
    pub rect: Rect,
    pub color: String,
}

#[derive(Debug, Default, Clone)]
pub struct AnnotationStore {
    items: Vec<Annotation>,
}

impl AnnotationStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a local highlight from client-space selection rectangles.
    ///
    /// Rectangles are clipped to `page_box` and empty ones dropped. Returns
    /// `None` when nothing on the page was selected.
    pub fn add_highlight(&mut self, selection: &[Rect], page: u32, page_box: Rect, color: &str) -> Option<Annotation> {
        let rects: Vec<_> = selection
            .iter()
            .filter(|r| !r.is_empty())
            .map(|r| rect_to_pct(*r, page_box))
            .filter(|p| p.w_pct > 0.0 && p.h_pct > 0.0)
            .collect();
        if rects.is_empty() {
            return None;
        }
        let annotation = Annotation {
            id: uuid::Uuid::new_v4().simple().to_string(),
            kind: AnnotationKind::Highlight,
            page,
            rects,
            color: color.to_owned(),
            created_at: frames::now_ms(),
        };
        self.items.push(annotation.clone());
        Some(annotation)
    }

    /// Remove a local highlight. The tombstone is returned even when the id
    /// is unknown here, so peers still converge.
    pub fn remove_highlight(&mut self, id: &str) -> Tombstone {
        self.items.retain(|a| a.id != id);
        Tombstone::new(id)
    }

    /// Apply a peer's event. Returns whether the store changed.
    pub fn apply_remote(&mut self, event: &AnnotationEvent) -> bool {
        match event {
            AnnotationEvent::Tombstone(t) => {
                let before = self.items.len();
                self.items.retain(|a| a.id != t.id);
                let removed = self.items.len() != before;
                if !removed {
                    debug!(id = %t.id, "tombstone for unknown annotation ignored");
                }
                removed
            }
            AnnotationEvent::Upsert(incoming) => {
                if let Some(existing) = self.items.iter_mut().find(|a| a.id == incoming.id) {
                    if existing == incoming {
                        return false;
                    }
                    *existing = incoming.clone();
                } else {
                    self.items.push(incoming.clone());
                }
                true
            }
        }
    }

    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Annotation> {
        self.items.iter().find(|a| a.id == id)
    }

    pub fn for_page(&self, page: u32) -> impl Iterator<Item = &Annotation> {
        self.items.iter().filter(move |a| a.page == page)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Annotation> {
        self.items.iter()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Highlight boxes for `page`, positioned against a local page of the
    /// given pixel size.
    #[must_use]
    pub fn overlay(&self, page: u32, page_width: f64, page_height: f64) -> Vec<HighlightBox> {
        self.for_page(page)
            .flat_map(|a| {
                a.rects.iter().map(move |pct| HighlightBox {
                    annotation_id: a.id.clone(),
                    rect: pct_to_rect(*pct, page_width, page_height),
                    color: a.color.clone(),
                })
            })
            .collect()
    }

    /// Paint the page's highlights onto a raster of that page.
    ///
    /// # Errors
    ///
    /// Returns the first unparseable highlight color. Boxes before it are
    /// already painted.
    #[allow(clippy::cast_possible_truncation)]
    pub fn paint_overlay(&self, page: u32, target: &mut Pixmap) -> Result<usize, ColorError> {
        let boxes = self.overlay(page, f64::from(target.width()), f64::from(target.height()));
        let mut painted = 0;
        for b in &boxes {
            let paint = parse_color(&b.color)?.to_paint();
            let Some(rect) =
                tiny_skia::Rect::from_xywh(b.rect.left as f32, b.rect.top as f32, b.rect.width as f32, b.rect.height as f32)
            else {
                continue;
            };
            target.fill_rect(rect, &paint, Transform::identity(), None);
            painted += 1;
        }
        Ok(painted)
    }
}
