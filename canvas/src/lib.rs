//! Canvas core for the tutoring whiteboard.
//!
//! This crate owns everything that turns normalized session events into
//! pixels on one participant's screen: the coordinate normalizer shared by
//! senders and receivers, the whiteboard raster, and the PDF highlight store
//! with its page overlay. It holds no network state; the session layer feeds
//! it events and ships the ones it returns.
//!
//! ## Module layout
//!
//! | Module | Role |
//! |--------|------|
//! | [`normalize`] | Pixel ↔ unit-space conversion for points, lengths, and page rects |
//! | [`whiteboard`] | Raster surface: strokes, text, clear, resize, PNG snapshots |
//! | [`annotation`] | Highlight store with idempotent remote application and overlay |
//! | [`color`] | CSS color parsing for paint |
//! | [`font`] | Font lookup for text marks |
//! | [`consts`] | Reference sizes and clamp limits |

pub mod annotation;
pub mod color;
pub mod consts;
pub mod font;
pub mod normalize;
pub mod whiteboard;
