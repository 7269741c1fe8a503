//! CSS color parsing for stroke, text, and highlight paint.
//!
//! Accepts `#rgb`, `#rrggbb`, `#rrggbbaa`, `rgb(r,g,b)`, and `rgba(r,g,b,a)`
//! where `a` is a `0..=1` float. Anything else is a [`ColorError`]; callers
//! log and skip the mark rather than guess a color.

#[cfg(test)]
#[path = "color_test.rs"]
mod color_test;

/// Straight-alpha RGBA channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rgba {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Rgba {
    pub const WHITE: Self = Self::opaque(255, 255, 255);

    #[must_use]
    pub const fn opaque(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    #[must_use]
    pub fn to_paint(self) -> tiny_skia::Paint<'static> {
        let mut paint = tiny_skia::Paint::default();
        paint.set_color_rgba8(self.r, self.g, self.b, self.a);
        paint.anti_alias = true;
        paint
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized color `{0}`")]
pub struct ColorError(pub String);

/// Parse a CSS color string.
///
/// # Errors
///
/// Returns [`ColorError`] for syntax this module does not understand.
pub fn parse_color(raw: &str) -> Result<Rgba, ColorError> {
    let trimmed = raw.trim();
    let invalid = || ColorError(trimmed.to_owned());

    if let Some(hex) = trimmed.strip_prefix('#') {
        return parse_hex(hex).map_err(|()| invalid());
    }

    let lower = trimmed.to_ascii_lowercase();
    if let Some(args) = lower.strip_prefix("rgba(").and_then(|s| s.strip_suffix(')')) {
        return parse_functional(args, true).map_err(|()| invalid());
    }
    if let Some(args) = lower.strip_prefix("rgb(").and_then(|s| s.strip_suffix(')')) {
        return parse_functional(args, false).map_err(|()| invalid());
    }
    Err(invalid())
}

fn parse_hex(hex: &str) -> Result<Rgba, ()> {
    if !hex.is_ascii() {
        return Err(());
    }
    let channel = |s: &str| u8::from_str_radix(s, 16).map_err(drop);
    match hex.len() {
        3 => Ok(Rgba::opaque(
            channel(&hex[0..1].repeat(2))?,
            channel(&hex[1..2].repeat(2))?,
            channel(&hex[2..3].repeat(2))?,
        )),
        6 | 8 => {
            let mut color = Rgba::opaque(channel(&hex[0..2])?, channel(&hex[2..4])?, channel(&hex[4..6])?);
            if hex.len() == 8 {
                color.a = channel(&hex[6..8])?;
            }
            Ok(color)
        }
        _ => Err(()),
    }
}

fn parse_functional(args: &str, with_alpha: bool) -> Result<Rgba, ()> {
    let parts: Vec<&str> = args.split(',').map(str::trim).collect();
    let expected = if with_alpha { 4 } else { 3 };
    if parts.len() != expected {
        return Err(());
    }
    let channel = |s: &str| s.parse::<u8>().map_err(drop);
    let mut color = Rgba::opaque(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?);
    if with_alpha {
        let alpha = parts[3].parse::<f64>().map_err(drop)?;
        if !alpha.is_finite() {
            return Err(());
        }
        color.a = unit_to_byte(alpha);
    }
    Ok(color)
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn unit_to_byte(value: f64) -> u8 {
    (value.clamp(0.0, 1.0) * 255.0).round() as u8
}
