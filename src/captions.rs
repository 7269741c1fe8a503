//! Live captions: a side pipeline on the tutor's raw audio.
//!
//! DESIGN
//! ======
//! Captions never touch the media path. The tutor's capture callback feeds
//! raw samples into a [`CaptionPipeline`], which cuts them into fixed-size
//! frames and gates each frame on peak amplitude. Voiced frames are handed to
//! a [`Transcriber`] for a running partial; the first silent frame after
//! speech finalizes the utterance. Partials and the final share one
//! utterance id, so receivers replace the partial in place.
//!
//! Display is independent of broadcast state: each receiver's [`CaptionFeed`]
//! can be toggled without affecting audio.

#[cfg(test)]
#[path = "captions_test.rs"]
mod captions_test;

use std::collections::VecDeque;

use frames::CaptionSegment;
use tracing::debug;

/// Speech-to-text engine behind the pipeline.
pub trait Transcriber: Send {
    /// Feed one voiced frame; returns the utterance text so far, if any.
    fn partial(&mut self, frame: &[f32]) -> Option<String>;

    /// Close the current utterance and return its final text, if any.
    fn finish(&mut self) -> Option<String>;
}

pub struct CaptionPipeline<T> {
    transcriber: T,
    frame_size: usize,
    threshold: f32,
    buffer: Vec<f32>,
    utterance: Option<String>,
}

impl<T: Transcriber> CaptionPipeline<T> {
    /// `frame_size` is clamped to at least one sample.
    #[must_use]
    pub fn new(transcriber: T, frame_size: usize, threshold: f32) -> Self {
        let frame_size = frame_size.max(1);
        Self { transcriber, frame_size, threshold, buffer: Vec::with_capacity(frame_size), utterance: None }
    }

    /// Whether an utterance is in progress.
    #[must_use]
    pub fn in_utterance(&self) -> bool {
        self.utterance.is_some()
    }

    /// Buffer raw samples and process every complete frame.
    pub fn push_samples(&mut self, samples: &[f32], now_ms: i64) -> Vec<CaptionSegment> {
        self.buffer.extend_from_slice(samples);
        let mut out = Vec::new();
        while self.buffer.len() >= self.frame_size {
            let frame: Vec<f32> = self.buffer.drain(..self.frame_size).collect();
            if let Some(segment) = self.process_frame(&frame, now_ms) {
                out.push(segment);
            }
        }
        out
    }

    /// Finalize any utterance in progress, e.g. when the broadcast stops.
    /// A partial frame still buffered is discarded.
    pub fn flush(&mut self, now_ms: i64) -> Option<CaptionSegment> {
        self.buffer.clear();
        self.finalize(now_ms)
    }

    fn process_frame(&mut self, frame: &[f32], now_ms: i64) -> Option<CaptionSegment> {
        if peak(frame) <= self.threshold {
            return self.finalize(now_ms);
        }
        let id = self.utterance.get_or_insert_with(|| uuid::Uuid::new_v4().simple().to_string()).clone();
        let text = self.transcriber.partial(frame)?;
        if text.trim().is_empty() {
            return None;
        }
        Some(CaptionSegment { id, text, is_final: false, timestamp: now_ms })
    }

    fn finalize(&mut self, now_ms: i64) -> Option<CaptionSegment> {
        let id = self.utterance.take()?;
        let Some(text) = self.transcriber.finish().filter(|t| !t.trim().is_empty()) else {
            debug!(%id, "utterance ended without text");
            return None;
        };
        Some(CaptionSegment { id, text, is_final: true, timestamp: now_ms })
    }
}

fn peak(frame: &[f32]) -> f32 {
    frame.iter().fold(0.0_f32, |acc, s| if s.is_finite() { acc.max(s.abs()) } else { acc })
}

// =============================================================================
// FEED
// =============================================================================

/// Receiver-side caption display state.
#[derive(Debug, Clone)]
pub struct CaptionFeed {
    enabled: bool,
    history: usize,
    finals: VecDeque<CaptionSegment>,
    partial: Option<CaptionSegment>,
}

impl CaptionFeed {
    /// Keep the last `history` final lines.
    #[must_use]
    pub fn new(history: usize) -> Self {
        Self { enabled: false, history, finals: VecDeque::new(), partial: None }
    }

    #[must_use]
    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    /// Record a segment. Segments are kept while display is off so turning
    /// captions on shows recent lines. A repeated final is ignored.
    /// Returns whether the visible text changed.
    pub fn apply(&mut self, segment: CaptionSegment) -> bool {
        if segment.is_final {
            if self.finals.iter().any(|f| f.id == segment.id) {
                return false;
            }
            if self.partial.as_ref().is_some_and(|p| p.id == segment.id) {
                self.partial = None;
            }
            self.finals.push_back(segment);
            while self.finals.len() > self.history {
                self.finals.pop_front();
            }
            return self.enabled;
        }
        // A late partial for an utterance that already finalized is stale.
        if self.finals.iter().any(|f| f.id == segment.id) {
            return false;
        }
        self.partial = Some(segment);
        self.enabled
    }

    /// Final lines, oldest first.
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.finals.iter().map(|s| s.text.as_str())
    }

    #[must_use]
    pub fn partial(&self) -> Option<&str> {
        self.partial.as_ref().map(|s| s.text.as_str())
    }

    /// Forget everything, e.g. when the broadcast ends.
    pub fn clear(&mut self) {
        self.finals.clear();
        self.partial = None;
    }
}
