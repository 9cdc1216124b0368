//! Image codecs selected by format strings such as `png`, `png8:z=1` or `jpeg80`.

use std::io::Cursor;
use std::str::FromStr;

use ahash::AHashMap;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::{CompressionType, FilterType, PngEncoder};
use image::{ColorType, ImageEncoder};

use crate::color::Color;
use crate::error::MapError;
use crate::palette::Palette;

const DEFAULT_JPEG_QUALITY: u8 = 85;

/// Encoding format parsed from a format string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageFormat {
    /// 32-bit RGBA PNG (`png`, `png32`).
    Png {
        /// zlib compression level `0..=9`, if given with `:z=N`.
        compression: Option<u8>,
    },
    /// Palette-indexed PNG (`png8`, `png256`).
    Png8 {
        /// zlib compression level `0..=9`, if given with `:z=N`.
        compression: Option<u8>,
    },
    /// JPEG with quality `1..=100` (`jpeg`, `jpeg80`, `jpg`).
    Jpeg {
        /// Encoding quality.
        quality: u8,
    },
}

impl ImageFormat {
    /// Guesses the format from a file extension.
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "png" => Some(Self::Png { compression: None }),
            "jpg" | "jpeg" => Some(Self::Jpeg {
                quality: DEFAULT_JPEG_QUALITY,
            }),
            _ => None,
        }
    }

    /// Returns true if the format needs a palette to encode.
    pub fn requires_palette(&self) -> bool {
        matches!(self, Self::Png8 { .. })
    }
}

impl FromStr for ImageFormat {
    type Err = MapError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unsupported = || MapError::UnsupportedFormat(s.to_string());
        let mut parts = s.split(':');
        let base = parts.next().unwrap_or_default().trim();

        let mut compression = None;
        for option in parts {
            match option.split_once('=') {
                Some(("z", level)) => {
                    let level: u8 = level.parse().map_err(|_| unsupported())?;
                    if level > 9 {
                        return Err(unsupported());
                    }
                    compression = Some(level);
                }
                Some((key, _)) => log::warn!("Ignoring unknown encoding option '{key}' in '{s}'"),
                None => return Err(unsupported()),
            }
        }

        match base {
            "png" | "png32" => Ok(Self::Png { compression }),
            "png8" | "png256" => Ok(Self::Png8 { compression }),
            _ => {
                let quality = base
                    .strip_prefix("jpeg")
                    .or_else(|| base.strip_prefix("jpg"))
                    .ok_or_else(unsupported)?;
                let quality = if quality.is_empty() {
                    DEFAULT_JPEG_QUALITY
                } else {
                    quality.parse().map_err(|_| unsupported())?
                };

                if !(1..=100).contains(&quality) {
                    return Err(unsupported());
                }

                Ok(Self::Jpeg { quality })
            }
        }
    }
}

/// Options of image encoding.
#[derive(Debug, Clone, Default)]
pub struct EncodeOptions {
    /// Palette for indexed formats.
    pub palette: Option<Palette>,
}

impl EncodeOptions {
    /// Options with a palette for indexed formats.
    pub fn with_palette(palette: Palette) -> Self {
        Self {
            palette: Some(palette),
        }
    }
}

/// Encodes non-premultiplied RGBA pixels.
pub(crate) fn encode_rgba(
    pixels: &[u8],
    width: u32,
    height: u32,
    format: ImageFormat,
    options: &EncodeOptions,
    format_name: &str,
) -> Result<Vec<u8>, MapError> {
    let mut buffer = Vec::new();
    match format {
        ImageFormat::Png { compression } => {
            let encoder = PngEncoder::new_with_quality(
                Cursor::new(&mut buffer),
                png_compression_type(compression),
                FilterType::Adaptive,
            );
            encoder.write_image(pixels, width, height, ColorType::Rgba8)?;
        }
        ImageFormat::Png8 { compression } => {
            let palette = options
                .palette
                .as_ref()
                .ok_or_else(|| MapError::MissingPalette(format_name.to_string()))?;
            encode_indexed(&mut buffer, pixels, width, height, palette, compression)?;
        }
        ImageFormat::Jpeg { quality } => {
            let rgb: Vec<u8> = pixels
                .chunks_exact(4)
                .flat_map(|px| [px[0], px[1], px[2]])
                .collect();
            let mut encoder = JpegEncoder::new_with_quality(&mut buffer, quality);
            encoder.encode(&rgb, width, height, ColorType::Rgb8)?;
        }
    }

    Ok(buffer)
}

fn png_compression_type(level: Option<u8>) -> CompressionType {
    match level {
        None => CompressionType::Default,
        Some(0..=3) => CompressionType::Fast,
        Some(7..) => CompressionType::Best,
        Some(_) => CompressionType::Default,
    }
}

fn png_compression(level: Option<u8>) -> png::Compression {
    match level {
        None => png::Compression::Default,
        Some(0..=3) => png::Compression::Fast,
        Some(7..) => png::Compression::Best,
        Some(_) => png::Compression::Default,
    }
}

fn encode_indexed(
    buffer: &mut Vec<u8>,
    pixels: &[u8],
    width: u32,
    height: u32,
    palette: &Palette,
    compression: Option<u8>,
) -> Result<(), MapError> {
    let mut lookup: AHashMap<[u8; 4], u8> = AHashMap::new();
    let indices: Vec<u8> = pixels
        .chunks_exact(4)
        .map(|px| {
            let key = [px[0], px[1], px[2], px[3]];
            *lookup
                .entry(key)
                .or_insert_with(|| palette.nearest(Color::from_u8_array(key)) as u8)
        })
        .collect();

    let rgb: Vec<u8> = palette
        .colors()
        .iter()
        .flat_map(|c| [c.r(), c.g(), c.b()])
        .collect();
    let alpha: Vec<u8> = palette.colors().iter().map(|c| c.a()).collect();

    let mut encoder = png::Encoder::new(buffer, width, height);
    encoder.set_color(png::ColorType::Indexed);
    encoder.set_depth(png::BitDepth::Eight);
    encoder.set_compression(png_compression(compression));
    encoder.set_palette(rgb);
    if alpha.iter().any(|&a| a < 255) {
        encoder.set_trns(alpha);
    }

    let mut writer = encoder.write_header()?;
    writer.write_image_data(&indices)?;
    writer.finish()?;

    Ok(())
}
