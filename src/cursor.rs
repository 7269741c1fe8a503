//! Tutor cursor indicator.
//!
//! DESIGN
//! ======
//! The tutor emits a normalized sample for every pointer move over the
//! whiteboard; there is no throttle and no sequence number. Receivers keep
//! only the latest sample and hide the marker after a quiet period, so a
//! lost or reordered sample costs at most one stale frame.
//!
//! The display keeps the sample normalized and denormalizes on read, which
//! keeps the marker correct across local resizes.

#[cfg(test)]
#[path = "cursor_test.rs"]
mod cursor_test;

use std::time::Duration;

use canvas::normalize::{Dims, Point, denormalize_point, normalize_point};
use frames::{CursorSample, Tool};
use tokio::time::Instant;

use crate::session::Role;

/// Which surface the tutor is currently working on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Surface {
    #[default]
    Whiteboard,
    Pdf,
}

/// Produces cursor samples on the tutor side.
#[derive(Debug, Clone, Copy)]
pub struct CursorBroadcaster {
    role: Role,
}

impl CursorBroadcaster {
    #[must_use]
    pub fn new(role: Role) -> Self {
        Self { role }
    }

    /// Sample a pointer move. Only the tutor emits, only over the whiteboard,
    /// and only once the canvas has been measured.
    #[must_use]
    pub fn sample(&self, pos: Point, dims: Dims, tool: Tool, surface: Surface, now_ms: i64) -> Option<CursorSample> {
        if self.role != Role::Tutor || surface != Surface::Whiteboard || !dims.is_measured() {
            return None;
        }
        let n = normalize_point(pos, dims);
        Some(CursorSample { x: n.x, y: n.y, tool, timestamp: now_ms })
    }
}

/// A visible cursor marker in local pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CursorMarker {
    pub pos: Point,
    pub tool: Tool,
}

/// Receiver-side marker with auto-hide.
#[derive(Debug, Clone)]
pub struct CursorDisplay {
    ttl: Duration,
    latest: Option<(CursorSample, Instant)>,
}

impl Default for CursorDisplay {
    fn default() -> Self {
        Self::new(Duration::from_millis(1000))
    }
}

impl CursorDisplay {
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self { ttl, latest: None }
    }

    /// Show `sample` and push the hide deadline out to `now + ttl`.
    /// Non-finite samples are ignored.
    pub fn on_sample(&mut self, sample: CursorSample, now: Instant) {
        if !(sample.x.is_finite() && sample.y.is_finite()) {
            return;
        }
        self.latest = Some((sample, now + self.ttl));
    }

    /// The marker in local pixels, if it has not expired by `now`.
    #[must_use]
    pub fn position(&self, dims: Dims, now: Instant) -> Option<CursorMarker> {
        let (sample, deadline) = self.latest?;
        if now >= deadline {
            return None;
        }
        Some(CursorMarker { pos: denormalize_point(Point::new(sample.x, sample.y), dims), tool: sample.tool })
    }

    /// Hide the marker if its deadline has passed. Returns whether
    /// visibility changed.
    pub fn tick(&mut self, now: Instant) -> bool {
        match self.latest {
            Some((_, deadline)) if now >= deadline => {
                self.latest = None;
                true
            }
            _ => false,
        }
    }

    /// When the marker will hide, for the runtime's timer.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        self.latest.map(|(_, deadline)| deadline)
    }

    /// Drop the marker immediately, e.g. when the tutor leaves.
    pub fn hide(&mut self) {
        self.latest = None;
    }
}
