//! Color palettes used for indexed image encoding.

use std::fmt::{Display, Formatter};
use std::str::FromStr;

use crate::color::Color;
use crate::error::MapError;

/// Maximum number of colors an indexed image can reference.
pub const MAX_PALETTE_SIZE: usize = 256;

const ACT_TABLE_LEN: usize = 256 * 3;

/// Binary layout of palette bytes.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq)]
pub enum PaletteFormat {
    /// Sequence of `r, g, b, a` quads.
    #[default]
    Rgba,
    /// Sequence of `r, g, b` triples, all colors opaque.
    Rgb,
    /// Adobe color table: 256 `r, g, b` triples, optionally followed by a big-endian color count
    /// and a big-endian index of the transparent color (`0xFFFF` for none).
    Act,
}

impl FromStr for PaletteFormat {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "rgba" => Ok(Self::Rgba),
            "rgb" => Ok(Self::Rgb),
            "act" => Ok(Self::Act),
            other => Err(MapError::InvalidPalette(format!("unknown format '{other}'"))),
        }
    }
}

/// Ordered set of distinct colors.
///
/// Colors are kept sorted by their alpha channel, translucent colors first. The order of colors
/// with the same alpha is the order they were given in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Palette {
    colors: Vec<Color>,
}

impl Palette {
    /// Creates a palette from a list of colors, removing duplicates.
    pub fn new(colors: impl IntoIterator<Item = Color>) -> Result<Self, MapError> {
        let mut unique: Vec<Color> = Vec::new();
        for color in colors {
            if !unique.contains(&color) {
                unique.push(color);
            }
        }

        if unique.is_empty() {
            return Err(MapError::InvalidPalette("palette is empty".into()));
        }

        if unique.len() > MAX_PALETTE_SIZE {
            return Err(MapError::InvalidPalette(format!(
                "{} colors, at most {MAX_PALETTE_SIZE} are allowed",
                unique.len()
            )));
        }

        unique.sort_by_key(|c| c.a());
        Ok(Self { colors: unique })
    }

    /// Decodes palette bytes.
    ///
    /// ```
    /// use meridian::palette::{Palette, PaletteFormat};
    ///
    /// let palette = Palette::from_bytes(b"\xff\x09\x93\xff\x01\x02\x03\x04", PaletteFormat::Rgba).unwrap();
    /// assert_eq!(palette.to_string(), "[Palette 2 colors #01020304 #ff0993]");
    /// ```
    pub fn from_bytes(bytes: &[u8], format: PaletteFormat) -> Result<Self, MapError> {
        match format {
            PaletteFormat::Rgba => {
                check_multiple(bytes, 4)?;
                Self::new(
                    bytes
                        .chunks_exact(4)
                        .map(|c| Color::rgba(c[0], c[1], c[2], c[3])),
                )
            }
            PaletteFormat::Rgb => {
                check_multiple(bytes, 3)?;
                Self::new(bytes.chunks_exact(3).map(|c| Color::rgb(c[0], c[1], c[2])))
            }
            PaletteFormat::Act => Self::from_act(bytes),
        }
    }

    fn from_act(bytes: &[u8]) -> Result<Self, MapError> {
        let (count, transparent) = match bytes.len() {
            ACT_TABLE_LEN => (256, None),
            len if len == ACT_TABLE_LEN + 4 => {
                let count = u16::from_be_bytes([bytes[768], bytes[769]]) as usize;
                let transparent = u16::from_be_bytes([bytes[770], bytes[771]]);
                (
                    count.clamp(1, 256),
                    (transparent != 0xFFFF).then_some(transparent as usize),
                )
            }
            len => {
                return Err(MapError::InvalidPalette(format!(
                    "act palette must be {ACT_TABLE_LEN} or {} bytes long, got {len}",
                    ACT_TABLE_LEN + 4
                )))
            }
        };

        Self::new(
            bytes[..count * 3]
                .chunks_exact(3)
                .enumerate()
                .map(|(i, c)| {
                    let alpha = if transparent == Some(i) { 0 } else { 255 };
                    Color::rgba(c[0], c[1], c[2], alpha)
                }),
        )
    }

    /// Encodes the palette as `r, g, b, a` quads.
    pub fn to_bytes(&self) -> Vec<u8> {
        self.colors.iter().flat_map(|c| c.to_u8_array()).collect()
    }

    /// Colors of the palette.
    pub fn colors(&self) -> &[Color] {
        &self.colors
    }

    /// Number of colors.
    pub fn len(&self) -> usize {
        self.colors.len()
    }

    /// Palettes are never empty, but clippy wants this.
    pub fn is_empty(&self) -> bool {
        self.colors.is_empty()
    }

    /// Index of the color closest to `color` by squared RGBA distance.
    pub fn nearest(&self, color: Color) -> usize {
        let target = color.to_u8_array();
        let distance = |c: &Color| -> u32 {
            c.to_u8_array()
                .iter()
                .zip(target)
                .map(|(&a, b)| (a as i32 - b as i32).pow(2) as u32)
                .sum()
        };

        self.colors
            .iter()
            .enumerate()
            .min_by_key(|(_, c)| distance(c))
            .map(|(i, _)| i)
            .unwrap_or_default()
    }
}

fn check_multiple(bytes: &[u8], chunk: usize) -> Result<(), MapError> {
    if bytes.len() % chunk != 0 {
        return Err(MapError::InvalidPalette(format!(
            "length {} is not a multiple of {chunk}",
            bytes.len()
        )));
    }

    Ok(())
}

impl Display for Palette {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "[Palette {} color", self.colors.len())?;
        if self.colors.len() != 1 {
            write!(f, "s")?;
        }

        for color in &self.colors {
            write!(f, " {}", color.hex())?;
        }

        write!(f, "]")
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn rgba_palette_is_sorted_by_alpha() {
        let palette =
            Palette::from_bytes(b"\xff\x09\x93\xff\x01\x02\x03\x04", PaletteFormat::Rgba).unwrap();
        assert_eq!(palette.len(), 2);
        assert_eq!(palette.to_bytes(), b"\x01\x02\x03\x04\xff\x09\x93\xff");
        assert_eq!(palette.to_string(), "[Palette 2 colors #01020304 #ff0993]");
    }

    #[test]
    fn rgb_palette_dedups() {
        let palette = Palette::from_bytes(b"\x01\x02\x03\x01\x02\x03\xff\xff\xff", PaletteFormat::Rgb)
            .unwrap();
        assert_eq!(palette.to_string(), "[Palette 2 colors #010203 #ffffff]");
    }

    #[test]
    fn act_palette() {
        let mut bytes = vec![0u8; ACT_TABLE_LEN + 4];
        bytes[3..6].copy_from_slice(&[255, 0, 0]);
        bytes[768..770].copy_from_slice(&2u16.to_be_bytes());
        bytes[770..772].copy_from_slice(&0u16.to_be_bytes());

        let palette = Palette::from_bytes(&bytes, PaletteFormat::Act).unwrap();
        assert_eq!(palette.colors(), &[Color::TRANSPARENT, Color::RED]);
    }

    #[test]
    fn invalid_bytes() {
        assert_matches!(
            Palette::from_bytes(b"\x01\x02\x03", PaletteFormat::Rgba),
            Err(MapError::InvalidPalette(_))
        );
        assert_matches!(
            Palette::from_bytes(&[0; 100], PaletteFormat::Act),
            Err(MapError::InvalidPalette(_))
        );
        assert_matches!(
            Palette::from_bytes(&[], PaletteFormat::Rgb),
            Err(MapError::InvalidPalette(_))
        );
    }

    #[test]
    fn nearest_color() {
        let palette = Palette::new([Color::BLACK, Color::WHITE, Color::RED]).unwrap();
        assert_eq!(palette.colors()[palette.nearest(Color::rgb(250, 10, 10))], Color::RED);
        assert_eq!(palette.colors()[palette.nearest(Color::rgb(20, 20, 20))], Color::BLACK);
    }
}
