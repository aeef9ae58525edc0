//! Color and opacity parsing for annotation styling.
//!
//! Both parsers fail soft: malformed input never produces an error, only the
//! fallback value.

use std::fmt;

use serde::{Serialize, Serializer};

/// Line color used when a polyline does not specify one.
pub const DEFAULT_POLYLINE_COLOR: &str = "#00AA8D";

/// An sRGB color with alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Opaque black, the last-resort fallback.
    pub const BLACK: Color = Color::rgb(0, 0, 0);

    /// Fully transparent.
    pub const CLEAR: Color = Color {
        r: 0,
        g: 0,
        b: 0,
        a: 0,
    };

    /// Create an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Strict hex parser: `#RGB`, `#RRGGBB` or `#RRGGBBAA`, leading `#` optional.
    pub fn from_hex(hex: &str) -> Option<Self> {
        let digits = hex.trim();
        let digits = digits.strip_prefix('#').unwrap_or(digits);
        if !digits.is_ascii() || !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let byte = |i: usize| u8::from_str_radix(&digits[i..i + 2], 16).ok();
        match digits.len() {
            3 => {
                let nibble = |i: usize| {
                    u8::from_str_radix(&digits[i..i + 1], 16)
                        .ok()
                        .map(|v| v * 17)
                };
                Some(Color::rgb(nibble(0)?, nibble(1)?, nibble(2)?))
            }
            6 => Some(Color::rgb(byte(0)?, byte(2)?, byte(4)?)),
            8 => Some(Color {
                r: byte(0)?,
                g: byte(2)?,
                b: byte(4)?,
                a: byte(6)?,
            }),
            _ => None,
        }
    }

    /// `#RRGGBB` for opaque colors, `#RRGGBBAA` otherwise.
    pub fn to_hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02X}{:02X}{:02X}", self.r, self.g, self.b)
        } else {
            format!("#{:02X}{:02X}{:02X}{:02X}", self.r, self.g, self.b, self.a)
        }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for Color {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

/// Parse `hex`, falling back to `default` (and then to black) on malformed input.
pub fn parse_color(hex: &str, default: &str) -> Color {
    Color::from_hex(hex).unwrap_or_else(|| {
        tracing::debug!(input = hex, fallback = default, "Malformed color, using fallback");
        Color::from_hex(default).unwrap_or(Color::BLACK)
    })
}

/// Normalize an opacity prop: absent or non-finite means fully opaque.
pub fn clamp_opacity(opacity: Option<f64>) -> f64 {
    match opacity {
        Some(value) if value.is_finite() => value.clamp(0.0, 1.0),
        _ => 1.0,
    }
}
