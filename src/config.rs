//! Session tuning from the environment.
//!
//! Every knob has a compile-time default and an environment override. Bad
//! values fall back to the default rather than failing startup.

#[cfg(test)]
#[path = "config_test.rs"]
mod config_test;

use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_SNAPSHOT_INTERVAL_MS: u64 = 5_000;
const DEFAULT_CURSOR_TTL_MS: u64 = 1_000;
const DEFAULT_CAPTION_FRAME_SIZE: usize = 4_096;
const DEFAULT_CAPTION_THRESHOLD: f32 = 0.01;
const DEFAULT_CAPTION_HISTORY: usize = 50;

/// Parse `key` from the environment, or return `default` when it is unset
/// or does not parse.
pub fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr,
{
    match std::env::var(key) {
        Ok(raw) => raw.trim().parse::<T>().unwrap_or(default),
        Err(_) => default,
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SessionConfig {
    /// How often the tutor persists the board while drawing.
    pub snapshot_interval: Duration,
    /// Quiet time after which a remote cursor marker hides.
    pub cursor_ttl: Duration,
    /// Samples per caption analysis frame.
    pub caption_frame_size: usize,
    /// Peak amplitude at or below which a caption frame counts as silence.
    pub caption_threshold: f32,
    /// Final caption lines kept for display.
    pub caption_history: usize,
    /// Directories scanned for text-mark fonts. Empty means the built-in list.
    pub font_dirs: Vec<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            snapshot_interval: Duration::from_millis(DEFAULT_SNAPSHOT_INTERVAL_MS),
            cursor_ttl: Duration::from_millis(DEFAULT_CURSOR_TTL_MS),
            caption_frame_size: DEFAULT_CAPTION_FRAME_SIZE,
            caption_threshold: DEFAULT_CAPTION_THRESHOLD,
            caption_history: DEFAULT_CAPTION_HISTORY,
            font_dirs: Vec::new(),
        }
    }
}

impl SessionConfig {
    /// Read overrides from `SNAPSHOT_INTERVAL_MS`, `CURSOR_TTL_MS`,
    /// `CAPTION_FRAME_SIZE`, `CAPTION_THRESHOLD`, `CAPTION_HISTORY`, and
    /// `FONT_DIRS` (a `:`-separated path list).
    #[must_use]
    pub fn from_env() -> Self {
        let font_dirs = std::env::var("FONT_DIRS")
            .map(|raw| split_paths(&raw))
            .unwrap_or_default();
        Self {
            snapshot_interval: Duration::from_millis(
                env_parse("SNAPSHOT_INTERVAL_MS", DEFAULT_SNAPSHOT_INTERVAL_MS).max(1),
            ),
            cursor_ttl: Duration::from_millis(env_parse("CURSOR_TTL_MS", DEFAULT_CURSOR_TTL_MS)),
            caption_frame_size: env_parse("CAPTION_FRAME_SIZE", DEFAULT_CAPTION_FRAME_SIZE).max(1),
            caption_threshold: env_parse("CAPTION_THRESHOLD", DEFAULT_CAPTION_THRESHOLD),
            caption_history: env_parse("CAPTION_HISTORY", DEFAULT_CAPTION_HISTORY),
            font_dirs,
        }
    }

    /// Load the font book from the configured directories, or the built-in
    /// list when none are configured.
    #[must_use]
    pub fn load_fonts(&self) -> canvas::font::FontBook {
        if self.font_dirs.is_empty() {
            canvas::font::FontBook::load_dirs(canvas::font::DEFAULT_FONT_DIRS)
        } else {
            canvas::font::FontBook::load_dirs(self.font_dirs.as_slice())
        }
    }
}

fn split_paths(raw: &str) -> Vec<PathBuf> {
    raw.split(':').map(str::trim).filter(|s| !s.is_empty()).map(PathBuf::from).collect()
}
