//! Font lookup for text marks.
//!
//! A [`FontBook`] maps lowercase family names to loaded `ab_glyph` fonts.
//! Families are taken from file stems (`DejaVuSans.ttf` → `dejavusans`), and
//! the first font loaded doubles as the fallback for families the book does
//! not carry. Marks name families the way CSS does, so `resolve` accepts a
//! comma-separated list with optional quotes and picks the first hit.

#[cfg(test)]
#[path = "font_test.rs"]
mod font_test;

use std::collections::HashMap;
use std::fs;
use std::path::Path;

use ab_glyph::FontArc;
use tracing::{debug, warn};

#[derive(Default, Clone)]
pub struct FontBook {
    fonts: HashMap<String, FontArc>,
    fallback: Option<FontArc>,
}

impl FontBook {
    /// A book with no fonts. Text marks are skipped until one is inserted.
    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    /// Register `font` under `family`. The first insert becomes the fallback.
    pub fn insert(&mut self, family: &str, font: FontArc) {
        if self.fallback.is_none() {
            self.fallback = Some(font.clone());
        }
        self.fonts.insert(family.trim().to_ascii_lowercase(), font);
    }

    /// Load every `.ttf`/`.otf` file found directly under each directory.
    /// Unreadable directories and files are logged and skipped.
    #[must_use]
    pub fn load_dirs<P: AsRef<Path>>(dirs: &[P]) -> Self {
        let mut book = Self::empty();
        for dir in dirs {
            let dir = dir.as_ref();
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(e) => {
                    debug!(dir = %dir.display(), error = %e, "font directory unreadable");
                    continue;
                }
            };
            let mut paths: Vec<_> = entries.flatten().map(|entry| entry.path()).filter(|p| is_font_file(p)).collect();
            paths.sort();
            for path in paths {
                book.load_file(&path);
            }
        }
        book
    }

    fn load_file(&mut self, path: &Path) {
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            return;
        };
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "font read failed");
                return;
            }
        };
        match FontArc::try_from_vec(bytes) {
            Ok(font) => self.insert(stem, font),
            Err(e) => warn!(path = %path.display(), error = %e, "font parse failed"),
        }
    }

    /// Resolve a CSS-style family list to a font, falling back to the first
    /// loaded font when no family matches.
    #[must_use]
    pub fn resolve(&self, family_list: &str) -> Option<&FontArc> {
        family_list
            .split(',')
            .map(|f| f.trim().trim_matches(|c| c == '"' || c == '\'').to_ascii_lowercase())
            .find_map(|f| self.fonts.get(&f))
            .or(self.fallback.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.fonts.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.fonts.is_empty()
    }
}

impl std::fmt::Debug for FontBook {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut families: Vec<_> = self.fonts.keys().collect();
        families.sort();
        f.debug_struct("FontBook").field("families", &families).finish()
    }
}

fn is_font_file(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("ttf") || e.eq_ignore_ascii_case("otf"))
}

/// Font directories searched when none are configured.
pub const DEFAULT_FONT_DIRS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu",
    "/usr/share/fonts/TTF",
    "/usr/share/fonts/dejavu",
    "/usr/share/fonts/truetype/liberation",
    "/System/Library/Fonts/Supplemental",
];
