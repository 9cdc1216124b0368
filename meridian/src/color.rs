use std::fmt::{Display, Formatter};
use std::str::FromStr;

use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::MapError;

lazy_static! {
    static ref FUNCTIONAL_NOTATION: Regex = Regex::new(
        r"^(rgba?)\(\s*([^,\s]+)\s*,\s*([^,\s]+)\s*,\s*([^,\s]+)\s*(?:,\s*([^,\s)]+)\s*)?\)$"
    )
    .expect("invalid color regex");
}

/// Color representation: 4 independent 8-bit channels.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    r: u8,
    g: u8,
    b: u8,
    a: u8,
}

impl TryFrom<String> for Color {
    type Error = MapError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(val: Color) -> Self {
        val.hex()
    }
}

impl Color {
    /// Transparent color: `#00000000`
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    /// Red color: `#FF0000FF`
    pub const RED: Color = Color::rgba(255, 0, 0, 255);
    /// Green color: `#008000FF`
    pub const GREEN: Color = Color::rgba(0, 128, 0, 255);
    /// Blue color: `#0000FFFF`
    pub const BLUE: Color = Color::rgba(0, 0, 255, 255);
    /// White color: `#FFFFFFFF`
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);
    /// Black color: `#000000FF`
    pub const BLACK: Color = Color::rgba(0, 0, 0, 255);
    /// Gray color: `#808080FF`
    pub const GRAY: Color = Color::rgba(128, 128, 128, 255);

    /// Constructs color from its RGBA channels.
    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    /// Constructs an opaque color.
    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    /// Converts the color into f32 array with channels in `0..=1`.
    pub fn to_f32_array(&self) -> [f32; 4] {
        [
            self.r as f32 / 255.0,
            self.g as f32 / 255.0,
            self.b as f32 / 255.0,
            self.a as f32 / 255.0,
        ]
    }

    /// Converts the color into u8 array (RGBA).
    pub fn to_u8_array(&self) -> [u8; 4] {
        [self.r, self.g, self.b, self.a]
    }

    /// Constructs color from u8 array (RGBA).
    pub fn from_u8_array(bytes: [u8; 4]) -> Self {
        let [r, g, b, a] = bytes;
        Self { r, g, b, a }
    }

    /// Packs the color into a single integer (`0xAABBGGRR`, little-endian RGBA).
    pub fn to_u32(&self) -> u32 {
        u32::from_le_bytes(self.to_u8_array())
    }

    /// Lowercase hex string: `#rrggbb` for opaque colors and `#rrggbbaa` otherwise.
    pub fn hex(&self) -> String {
        if self.a == 255 {
            format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
        } else {
            format!("#{:02x}{:02x}{:02x}{:02x}", self.r, self.g, self.b, self.a)
        }
    }

    /// Parses a color from the hex string. Hex string can be `#RGB`, `#RGBA`, HEX6
    /// (`#RRGGBB`) or HEX8 (`#RRGGBBAA`).
    pub fn try_from_hex(hex_string: &str) -> Option<Self> {
        let digits = hex_string.strip_prefix('#')?;
        if !digits.chars().all(|c| c.is_ascii_hexdigit()) {
            return None;
        }

        let channel = |i: usize, width: usize| -> Option<u8> {
            let value = u8::from_str_radix(digits.get(i * width..(i + 1) * width)?, 16).ok()?;
            Some(if width == 1 { value * 17 } else { value })
        };

        match digits.len() {
            3 | 4 => Some(Self {
                r: channel(0, 1)?,
                g: channel(1, 1)?,
                b: channel(2, 1)?,
                a: if digits.len() == 4 { channel(3, 1)? } else { 255 },
            }),
            6 | 8 => Some(Self {
                r: channel(0, 2)?,
                g: channel(1, 2)?,
                b: channel(2, 2)?,
                a: if digits.len() == 8 { channel(3, 2)? } else { 255 },
            }),
            _ => None,
        }
    }

    /// Parses a color from the hex string. Hex string can be either HEX6 (`#RRGGBB`) or HEX8 (`#RRGGBBAA`).
    ///
    /// # Panics
    ///
    /// Panics if the parsing fails.
    pub const fn from_hex(hex_string: &'static str) -> Self {
        let bytes = hex_string.as_bytes();
        if bytes.len() != 7 && bytes.len() != 9 || bytes[0] != b'#' {
            panic!("Invalid color hex string");
        }

        let r = decode_byte(&[bytes[1], bytes[2]]);
        let g = decode_byte(&[bytes[3], bytes[4]]);
        let b = decode_byte(&[bytes[5], bytes[6]]);
        let a = if hex_string.len() == 9 {
            decode_byte(&[bytes[7], bytes[8]])
        } else {
            255
        };

        Self { r, g, b, a }
    }

    /// Returns a new color instance, copied from the base one but with the given alpha channel.
    pub fn with_alpha(&self, a: u8) -> Self {
        Self { a, ..*self }
    }

    /// Returns true if the color is fully transparent (`a == 0`).
    pub fn is_transparent(&self) -> bool {
        self.a == 0
    }

    /// Red component of the color in RGBA space.
    pub fn r(&self) -> u8 {
        self.r
    }

    /// Green component of the color in RGBA space.
    pub fn g(&self) -> u8 {
        self.g
    }

    /// Blue component of the color in RGBA space.
    pub fn b(&self) -> u8 {
        self.b
    }

    /// Opacity component of the color.
    pub fn a(&self) -> u8 {
        self.a
    }

    /// Color channels multiplied by alpha.
    pub fn premultiplied(&self) -> Self {
        let mul = |c: u8| ((c as u32 * self.a as u32 + 127) / 255) as u8;
        Self {
            r: mul(self.r),
            g: mul(self.g),
            b: mul(self.b),
            a: self.a,
        }
    }

    /// Inverse of [`Color::premultiplied`]. Fully transparent colors stay unchanged.
    pub fn demultiplied(&self) -> Self {
        if self.a == 0 || self.a == 255 {
            return *self;
        }

        let div = |c: u8| ((c as u32 * 255 + self.a as u32 / 2) / self.a as u32).min(255) as u8;
        Self {
            r: div(self.r),
            g: div(self.g),
            b: div(self.b),
            a: self.a,
        }
    }

    /// Perceived brightness in `0..=255`.
    pub fn luminance(&self) -> u8 {
        (0.299 * self.r as f32 + 0.587 * self.g as f32 + 0.114 * self.b as f32).round() as u8
    }

    fn named(name: &str) -> Option<Self> {
        Some(match name {
            "transparent" => Self::TRANSPARENT,
            "black" => Self::BLACK,
            "white" => Self::WHITE,
            "red" => Self::RED,
            "green" => Self::GREEN,
            "blue" => Self::BLUE,
            "gray" | "grey" => Self::GRAY,
            "silver" => Self::rgb(192, 192, 192),
            "maroon" => Self::rgb(128, 0, 0),
            "purple" => Self::rgb(128, 0, 128),
            "fuchsia" | "magenta" => Self::rgb(255, 0, 255),
            "lime" => Self::rgb(0, 255, 0),
            "olive" => Self::rgb(128, 128, 0),
            "yellow" => Self::rgb(255, 255, 0),
            "navy" => Self::rgb(0, 0, 128),
            "teal" => Self::rgb(0, 128, 128),
            "aqua" | "cyan" => Self::rgb(0, 255, 255),
            "orange" => Self::rgb(255, 165, 0),
            "brown" => Self::rgb(165, 42, 42),
            "pink" => Self::rgb(255, 192, 203),
            "steelblue" => Self::rgb(70, 130, 180),
            "beige" => Self::rgb(245, 245, 220),
            "lightblue" => Self::rgb(173, 216, 230),
            "darkgreen" => Self::rgb(0, 100, 0),
            _ => return None,
        })
    }

    fn from_functional(text: &str) -> Option<Self> {
        let captures = FUNCTIONAL_NOTATION.captures(text)?;
        let has_alpha = &captures[1] == "rgba";
        if has_alpha != captures.get(5).is_some() {
            return None;
        }

        let channel = |i: usize| -> Option<u8> {
            let value = &captures[i];
            if let Some(percent) = value.strip_suffix('%') {
                let percent: f32 = percent.parse().ok()?;
                (0.0..=100.0)
                    .contains(&percent)
                    .then(|| (percent * 2.55).round() as u8)
            } else {
                value.parse().ok()
            }
        };

        let a = match captures.get(5) {
            Some(alpha) => {
                let alpha: f32 = alpha.as_str().parse().ok()?;
                if !(0.0..=1.0).contains(&alpha) {
                    return None;
                }
                (alpha * 255.0).round() as u8
            }
            None => 255,
        };

        Some(Self {
            r: channel(2)?,
            g: channel(3)?,
            b: channel(4)?,
            a,
        })
    }
}

impl FromStr for Color {
    type Err = MapError;

    /// Parses CSS-like color strings: color names, `#rgb`, `#rrggbb`, `#rrggbbaa`,
    /// `rgb(0,128,0)`, `rgba(0%,50%,0%,1)`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let text = s.trim().to_ascii_lowercase();
        let parsed = if text.starts_with('#') {
            Self::try_from_hex(&text)
        } else if text.starts_with("rgb") {
            Self::from_functional(&text)
        } else {
            Self::named(&text)
        };

        parsed.ok_or_else(|| MapError::InvalidColor(s.to_string()))
    }
}

impl Display for Color {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.a == 255 {
            write!(f, "rgb({},{},{})", self.r, self.g, self.b)
        } else {
            let alpha = format!("{:.3}", self.a as f32 / 255.0);
            let alpha = alpha.trim_end_matches('0').trim_end_matches('.');
            write!(f, "rgba({},{},{},{})", self.r, self.g, self.b, alpha)
        }
    }
}

const fn decode_byte(chars: &[u8]) -> u8 {
    debug_assert!(chars.len() == 2);
    let first = decode_char(chars[0]);
    let second = decode_char(chars[1]);

    first * 16 + second
}

const fn decode_char(byte: u8) -> u8 {
    match byte {
        b'0'..=b'9' => byte - b'0',
        b'a'..=b'f' => byte - b'a' + 10,
        b'A'..=b'F' => byte - b'A' + 10,
        _ => panic!("Invalid hex character"),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn color_serialization() {
        let hex = "#ff1000aa";
        let color = Color::try_from_hex(hex).unwrap();
        assert_eq!(&color.hex(), hex);

        assert_eq!(Color::from_hex("#FF1000AA"), color);

        let json = serde_json::to_string(&Color::GREEN).unwrap();
        assert_eq!(json, "\"#008000\"");
        assert_eq!(serde_json::from_str::<Color>(&json).unwrap(), Color::GREEN);
    }

    #[test]
    fn parse_notations() {
        let green = Color::rgb(0, 128, 0);
        assert_eq!("green".parse::<Color>().unwrap(), green);
        assert_eq!("#008000".parse::<Color>().unwrap(), green);
        assert_eq!("rgb(0, 128, 0)".parse::<Color>().unwrap(), green);
        assert_eq!("rgba(0,128,0,1)".parse::<Color>().unwrap(), green);
        assert_eq!(
            "rgba(0%,50%,0%,1)".parse::<Color>().unwrap(),
            Color::rgb(0, 128, 0)
        );
        assert_eq!("#f00".parse::<Color>().unwrap(), Color::RED);
        assert_eq!(
            "rgba(255,0,0,0.5)".parse::<Color>().unwrap(),
            Color::rgba(255, 0, 0, 128)
        );
    }

    #[test]
    fn invalid_strings() {
        for text in ["", "greenish", "#12345", "rgb(1,2)", "rgb(1,2,300)", "rgba(1,2,3)", "rgb(1,2,3,0.5)"] {
            assert_matches!(text.parse::<Color>(), Err(MapError::InvalidColor(_)), "{text}");
        }
    }

    #[test]
    fn display() {
        assert_eq!(Color::rgb(0, 128, 0).to_string(), "rgb(0,128,0)");
        assert_eq!(Color::rgba(0, 128, 0, 128).to_string(), "rgba(0,128,0,0.502)");
        assert_eq!(Color::TRANSPARENT.to_string(), "rgba(0,0,0,0)");
    }

    #[test]
    fn premultiply_roundtrip() {
        let color = Color::rgba(200, 100, 50, 128);
        let premultiplied = color.premultiplied();
        assert_eq!(premultiplied, Color::rgba(100, 50, 25, 128));
        assert_eq!(premultiplied.demultiplied(), Color::rgba(199, 100, 50, 128));
        assert_eq!(Color::TRANSPARENT.demultiplied(), Color::TRANSPARENT);
    }
}
