//! Raster images: render targets, pixel access, compositing and encoding.

use std::path::Path;

use crate::color::Color;
use crate::error::MapError;

mod composite;
mod encode;

pub use composite::{CompositeOp, CompositeOptions};
pub use encode::{EncodeOptions, ImageFormat};

/// Borrowed RGBA pixel buffer that can be composited onto an [`Image`].
#[derive(Debug, Clone, Copy)]
pub(crate) struct PixelSource<'a> {
    pub data: &'a [u8],
    pub width: u32,
    pub height: u32,
    pub premultiplied: bool,
}

/// Owned grid of RGBA pixels.
///
/// Pixels are stored either premultiplied by alpha or not, and the image keeps track of which
/// one it is. Pixel accessors return stored values as they are.
#[derive(Debug, Clone, PartialEq)]
pub struct Image {
    width: u32,
    height: u32,
    data: Vec<u8>,
    premultiplied: bool,
    painted: bool,
    background: Option<Color>,
}

impl Image {
    /// Creates a transparent, non-premultiplied image.
    pub fn new(width: u32, height: u32) -> Result<Self, MapError> {
        if width == 0 || height == 0 {
            return Err(MapError::InvalidDimensions {
                width,
                height,
                reason: "image must have at least one pixel",
            });
        }

        Ok(Self {
            width,
            height,
            data: vec![0; width as usize * height as usize * 4],
            premultiplied: false,
            painted: false,
            background: None,
        })
    }

    /// Creates an image from RGBA bytes.
    pub fn from_rgba(
        width: u32,
        height: u32,
        data: Vec<u8>,
        premultiplied: bool,
    ) -> Result<Self, MapError> {
        let mut image = Self::new(width, height)?;
        if data.len() != image.data.len() {
            return Err(MapError::InvalidDimensions {
                width,
                height,
                reason: "pixel buffer length does not match the size",
            });
        }

        image.data = data;
        image.premultiplied = premultiplied;
        Ok(image)
    }

    /// Decodes an image in any format supported by the `image` crate.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, MapError> {
        let decoded = image::load_from_memory(bytes)?.to_rgba8();
        let (width, height) = decoded.dimensions();
        Self::from_rgba(width, height, decoded.into_raw(), false)
    }

    /// Reads and decodes an image file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, MapError> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Returns true if the pixels are stored premultiplied by alpha.
    pub fn premultiplied(&self) -> bool {
        self.premultiplied
    }

    /// Returns true if anything was drawn on the image since it was created or cleared.
    pub fn painted(&self) -> bool {
        self.painted
    }

    /// Overrides the painted flag.
    pub fn set_painted(&mut self, painted: bool) {
        self.painted = painted;
    }

    /// Raw RGBA bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }

    /// Background color used by [`Image::clear`].
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Sets the background color and fills the image with it.
    pub fn set_background(&mut self, color: Color) {
        self.background = Some(color);
        self.fill(color);
    }

    /// Fills the image with its background color, or makes it transparent if no background is
    /// set. Resets the painted flag.
    pub fn clear(&mut self) {
        self.fill(self.background.unwrap_or(Color::TRANSPARENT));
        self.painted = false;
    }

    /// Sets every pixel to the color, converted to the pixel format of the image.
    pub fn fill(&mut self, color: Color) {
        let stored = self.to_stored(color).to_u8_array();
        for pixel in self.data.chunks_exact_mut(4) {
            pixel.copy_from_slice(&stored);
        }
    }

    fn to_stored(&self, color: Color) -> Color {
        if self.premultiplied {
            color.premultiplied()
        } else {
            color
        }
    }

    fn offset(&self, x: i64, y: i64) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }

        Some((y as usize * self.width as usize + x as usize) * 4)
    }

    /// Stored value of the pixel, or `None` if the coordinates are outside of the image.
    pub fn get_pixel(&self, x: i64, y: i64) -> Option<Color> {
        let offset = self.offset(x, y)?;
        let px = &self.data[offset..offset + 4];
        Some(Color::rgba(px[0], px[1], px[2], px[3]))
    }

    /// Stores the color as is into the pixel.
    pub fn set_pixel(&mut self, x: i64, y: i64, color: Color) -> Result<(), MapError> {
        let offset = self.offset(x, y).ok_or(MapError::OutOfBounds {
            x,
            y,
            width: self.width,
            height: self.height,
        })?;

        self.data[offset..offset + 4].copy_from_slice(&color.to_u8_array());
        self.painted = true;
        Ok(())
    }

    /// Converts the pixels to premultiplied form. Returns false if they already were.
    pub fn premultiply(&mut self) -> bool {
        if self.premultiplied {
            return false;
        }

        for pixel in self.data.chunks_exact_mut(4) {
            let color = Color::rgba(pixel[0], pixel[1], pixel[2], pixel[3]).premultiplied();
            pixel.copy_from_slice(&color.to_u8_array());
        }

        self.premultiplied = true;
        true
    }

    /// Converts the pixels to non-premultiplied form. Returns false if they already were.
    pub fn demultiply(&mut self) -> bool {
        if !self.premultiplied {
            return false;
        }

        for pixel in self.data.chunks_exact_mut(4) {
            let color = Color::rgba(pixel[0], pixel[1], pixel[2], pixel[3]).demultiplied();
            pixel.copy_from_slice(&color.to_u8_array());
        }

        self.premultiplied = false;
        true
    }

    /// Replaces alpha of every pixel with its luminance. The color channels are set to the
    /// given color, or to the luminance too if no color is given.
    pub fn set_grayscale_to_alpha(&mut self, color: Option<Color>) {
        let premultiplied = self.premultiplied;
        for pixel in self.data.chunks_exact_mut(4) {
            let mut current = Color::rgba(pixel[0], pixel[1], pixel[2], pixel[3]);
            if premultiplied {
                current = current.demultiplied();
            }

            let gray = current.luminance();
            let mut result = match color {
                Some(c) => Color::rgba(c.r(), c.g(), c.b(), gray),
                None => Color::rgba(gray, gray, gray, gray),
            };
            if premultiplied {
                result = result.premultiplied();
            }

            pixel.copy_from_slice(&result.to_u8_array());
        }
    }

    /// Non-owning window into the image. The window is clipped to the image bounds.
    pub fn view(&self, x: u32, y: u32, width: u32, height: u32) -> ImageView<'_> {
        let x = x.min(self.width);
        let y = y.min(self.height);
        ImageView {
            image: self,
            x,
            y,
            width: width.min(self.width - x),
            height: height.min(self.height - y),
        }
    }

    /// Composites another image onto this one.
    ///
    /// Pixel formats of both images may differ, the source is read according to its own format
    /// and the result is written in the format of this image.
    pub fn composite(&mut self, other: &Image, options: &CompositeOptions) {
        self.composite_pixels(other.as_source(), options);
    }

    pub(crate) fn as_source(&self) -> PixelSource<'_> {
        PixelSource {
            data: &self.data,
            width: self.width,
            height: self.height,
            premultiplied: self.premultiplied,
        }
    }

    pub(crate) fn composite_pixels(&mut self, src: PixelSource<'_>, options: &CompositeOptions) {
        let op = options.comp_op;
        if op == CompositeOp::Dst {
            return;
        }

        let x_start = options.dx.max(0) as i64;
        let y_start = options.dy.max(0) as i64;
        let x_end = (options.dx as i64 + src.width as i64).min(self.width as i64);
        let y_end = (options.dy as i64 + src.height as i64).min(self.height as i64);
        if x_start >= x_end || y_start >= y_end {
            return;
        }

        let opacity = options.opacity.clamp(0.0, 1.0);
        let exact_copy =
            op == CompositeOp::Src && opacity >= 1.0 && src.premultiplied == self.premultiplied;
        let keeps_dst = op.keeps_dst_under_transparent_src();
        let mut painted = false;

        for y in y_start..y_end {
            let sy = (y - options.dy as i64) as usize;
            for x in x_start..x_end {
                let sx = (x - options.dx as i64) as usize;
                let s_offset = (sy * src.width as usize + sx) * 4;
                let d_offset = (y as usize * self.width as usize + x as usize) * 4;
                let s_px = &src.data[s_offset..s_offset + 4];
                painted |= s_px[3] > 0;

                if exact_copy {
                    self.data[d_offset..d_offset + 4].copy_from_slice(s_px);
                    continue;
                }

                if keeps_dst && (s_px[3] == 0 || opacity <= 0.0) {
                    continue;
                }

                let mut s = to_premultiplied_f32(s_px, src.premultiplied);
                for channel in &mut s {
                    *channel *= opacity;
                }

                let d_px = &mut self.data[d_offset..d_offset + 4];
                let d = to_premultiplied_f32(d_px, self.premultiplied);
                let result = op.apply(s, d);
                d_px.copy_from_slice(&from_premultiplied_f32(result, self.premultiplied));
            }
        }

        self.painted |= painted;
    }

    /// Encodes the image. The format string is parsed with [`ImageFormat`]. The image itself is
    /// not changed.
    pub fn encode(&self, format: &str, options: &EncodeOptions) -> Result<Vec<u8>, MapError> {
        self.view(0, 0, self.width, self.height)
            .encode(format, options)
    }

    /// Encodes the image into a file. If the format is not given, it is guessed from the file
    /// extension.
    pub fn save(&self, path: impl AsRef<Path>, format: Option<&str>) -> Result<(), MapError> {
        self.view(0, 0, self.width, self.height).save(path, format)
    }

    /// Same as [`Image::save`], with encoding options. Needed for palette based formats.
    pub fn save_with_options(
        &self,
        path: impl AsRef<Path>,
        format: Option<&str>,
        options: &EncodeOptions,
    ) -> Result<(), MapError> {
        self.view(0, 0, self.width, self.height)
            .save_with_options(path, format, options)
    }
}

fn to_premultiplied_f32(px: &[u8], premultiplied: bool) -> [f32; 4] {
    let a = px[3] as f32 / 255.0;
    let scale = if premultiplied { 1.0 / 255.0 } else { a / 255.0 };
    [
        px[0] as f32 * scale,
        px[1] as f32 * scale,
        px[2] as f32 * scale,
        a,
    ]
}

fn from_premultiplied_f32(color: [f32; 4], premultiplied: bool) -> [u8; 4] {
    let a = color[3].clamp(0.0, 1.0);
    let to_byte = |v: f32| (v.clamp(0.0, 1.0) * 255.0).round() as u8;
    if premultiplied {
        [
            to_byte(color[0].min(a)),
            to_byte(color[1].min(a)),
            to_byte(color[2].min(a)),
            to_byte(a),
        ]
    } else if a <= 0.0 {
        [0; 4]
    } else {
        [
            to_byte(color[0] / a),
            to_byte(color[1] / a),
            to_byte(color[2] / a),
            to_byte(a),
        ]
    }
}

/// Rectangular window into an [`Image`].
#[derive(Debug, Clone, Copy)]
pub struct ImageView<'a> {
    image: &'a Image,
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

impl ImageView<'_> {
    /// Width of the window.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height of the window.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Stored value of the pixel relative to the window origin, `None` outside of the window.
    pub fn get_pixel(&self, x: i64, y: i64) -> Option<Color> {
        if x < 0 || y < 0 || x >= self.width as i64 || y >= self.height as i64 {
            return None;
        }

        self.image.get_pixel(x + self.x as i64, y + self.y as i64)
    }

    fn rows(&self) -> impl Iterator<Item = &[u8]> {
        let stride = self.image.width as usize * 4;
        let start = self.x as usize * 4;
        let len = self.width as usize * 4;
        (self.y..self.y + self.height).map(move |row| {
            let offset = row as usize * stride + start;
            &self.image.data[offset..offset + len]
        })
    }

    /// Returns the color if all pixels of the window are equal.
    pub fn is_solid(&self) -> Option<Color> {
        let first = self.get_pixel(0, 0)?.to_u8_array();
        self.rows()
            .all(|row| row.chunks_exact(4).all(|px| px == first))
            .then(|| Color::from_u8_array(first))
    }

    /// Copies the window into a new image with the same pixel format.
    pub fn to_image(&self) -> Result<Image, MapError> {
        let data: Vec<u8> = self.rows().flatten().copied().collect();
        Image::from_rgba(self.width, self.height, data, self.image.premultiplied)
    }

    /// Encodes the window. Premultiplied pixels are demultiplied in a copy before encoding.
    pub fn encode(&self, format: &str, options: &EncodeOptions) -> Result<Vec<u8>, MapError> {
        let image_format: ImageFormat = format.parse()?;
        let mut pixels = self.to_image()?;
        pixels.demultiply();
        encode::encode_rgba(
            &pixels.data,
            pixels.width,
            pixels.height,
            image_format,
            options,
            format,
        )
    }

    /// Encodes the window into a file. If the format is not given, it is guessed from the file
    /// extension.
    pub fn save(&self, path: impl AsRef<Path>, format: Option<&str>) -> Result<(), MapError> {
        self.save_with_options(path, format, &EncodeOptions::default())
    }

    /// Same as [`ImageView::save`], with encoding options.
    pub fn save_with_options(
        &self,
        path: impl AsRef<Path>,
        format: Option<&str>,
        options: &EncodeOptions,
    ) -> Result<(), MapError> {
        let path = path.as_ref();
        let format = match format {
            Some(format) => format.to_string(),
            None => path
                .extension()
                .and_then(|ext| ext.to_str())
                .filter(|ext| ImageFormat::from_extension(ext).is_some())
                .map(|ext| ext.to_ascii_lowercase())
                .ok_or_else(|| MapError::UnsupportedFormat(path.display().to_string()))?,
        };

        let bytes = self.encode(&format, options)?;
        std::fs::write(path, bytes)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn checkerboard() -> Image {
        let mut image = Image::new(4, 4).unwrap();
        for y in 0..4 {
            for x in 0..4 {
                let color = if (x + y) % 2 == 0 {
                    Color::rgba(200, 100, 50, 128)
                } else {
                    Color::BLUE
                };
                image.set_pixel(x, y, color).unwrap();
            }
        }
        image
    }

    #[test]
    fn pixel_access_bounds() {
        let mut image = Image::new(16, 16).unwrap();
        assert_eq!(image.get_pixel(-1, -1), None);
        assert_eq!(image.get_pixel(16, 0), None);
        assert_eq!(image.get_pixel(15, 15), Some(Color::TRANSPARENT));
        assert!(!image.painted());

        assert_matches!(
            image.set_pixel(16, 3, Color::RED),
            Err(MapError::OutOfBounds { x: 16, y: 3, .. })
        );
        image.set_pixel(3, 3, Color::RED).unwrap();
        assert_eq!(image.get_pixel(3, 3), Some(Color::RED));
        assert!(image.painted());
    }

    #[test]
    fn invalid_size() {
        assert_matches!(Image::new(0, 10), Err(MapError::InvalidDimensions { .. }));
        assert_matches!(
            Image::from_rgba(2, 2, vec![0; 3], false),
            Err(MapError::InvalidDimensions { .. })
        );
    }

    #[test]
    fn premultiply_is_idempotent() {
        let mut image = checkerboard();
        assert!(image.premultiply());
        let once = image.as_bytes().to_vec();
        assert!(!image.premultiply());
        assert_eq!(image.as_bytes(), once.as_slice());
        assert_eq!(image.get_pixel(0, 0), Some(Color::rgba(100, 50, 25, 128)));

        assert!(image.demultiply());
        assert!(!image.demultiply());
        assert!(!image.premultiplied());
    }

    #[test]
    fn background_and_clear() {
        let mut image = Image::new(2, 2).unwrap();
        image.set_background(Color::GREEN);
        assert_eq!(image.view(0, 0, 2, 2).is_solid(), Some(Color::GREEN));

        image.set_pixel(0, 0, Color::RED).unwrap();
        assert_eq!(image.view(0, 0, 2, 2).is_solid(), None);

        image.clear();
        assert!(!image.painted());
        assert_eq!(image.get_pixel(0, 0), Some(Color::GREEN));
    }

    #[test]
    fn src_copies_source_pixels() {
        let source = checkerboard();
        for background in [Color::WHITE, Color::TRANSPARENT, Color::rgba(1, 2, 3, 4)] {
            let mut target = Image::new(6, 6).unwrap();
            target.fill(background);
            target.composite(
                &source,
                &CompositeOptions {
                    comp_op: CompositeOp::Src,
                    dx: 1,
                    dy: 2,
                    ..Default::default()
                },
            );

            for y in 0..4 {
                for x in 0..4 {
                    assert_eq!(target.get_pixel(x + 1, y + 2), source.get_pixel(x, y));
                }
            }
            assert_eq!(target.get_pixel(0, 0), Some(background));
        }
    }

    #[test]
    fn src_over_with_opacity() {
        let mut target = Image::new(2, 2).unwrap();
        target.fill(Color::WHITE);
        let mut source = Image::new(2, 2).unwrap();
        source.fill(Color::BLACK);

        target.composite(
            &source,
            &CompositeOptions {
                opacity: 0.5,
                ..Default::default()
            },
        );
        assert_eq!(target.get_pixel(1, 1), Some(Color::rgb(128, 128, 128)));
        assert!(target.painted());
    }

    #[test]
    fn transparent_source_keeps_destination() {
        let mut target = checkerboard();
        let before = target.clone();
        let source = Image::new(4, 4).unwrap();
        target.composite(&source, &CompositeOptions::default());
        assert_eq!(target.as_bytes(), before.as_bytes());
    }

    #[test]
    fn grayscale_to_alpha() {
        let mut image = Image::new(1, 1).unwrap();
        image.fill(Color::WHITE);
        image.set_grayscale_to_alpha(Some(Color::RED));
        assert_eq!(image.get_pixel(0, 0), Some(Color::rgba(255, 0, 0, 255)));

        image.fill(Color::BLACK);
        image.set_grayscale_to_alpha(None);
        assert_eq!(image.get_pixel(0, 0), Some(Color::TRANSPARENT));
    }

    #[test]
    fn view_is_clipped() {
        let image = checkerboard();
        let view = image.view(2, 3, 10, 10);
        assert_eq!((view.width(), view.height()), (2, 1));
        assert_eq!(view.get_pixel(0, 0), image.get_pixel(2, 3));
        assert_eq!(view.get_pixel(-1, 0), None);
        assert_eq!(view.get_pixel(2, 0), None);
    }

    #[test]
    fn encode_does_not_mutate() {
        let mut image = checkerboard();
        image.premultiply();
        let before = image.clone();

        let png = image.encode("png", &EncodeOptions::default()).unwrap();
        assert_eq!(image, before);

        let decoded = Image::from_bytes(&png).unwrap();
        assert_eq!(decoded.get_pixel(1, 0), Some(Color::BLUE));
        assert_eq!(decoded.get_pixel(0, 0), Some(Color::rgba(199, 100, 50, 128)));

        let jpeg = image.encode("jpeg80", &EncodeOptions::default()).unwrap();
        assert_eq!(&jpeg[..2], &[0xFF, 0xD8]);
    }

    #[test]
    fn save_guesses_format_from_extension() {
        let dir = std::env::temp_dir().join(format!("meridian-image-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();

        let image = checkerboard();
        let path = dir.join("checkerboard.png");
        image.save(&path, None).unwrap();
        assert_eq!(Image::open(&path).unwrap().as_bytes(), image.as_bytes());

        assert_matches!(
            image.save(dir.join("checkerboard.bmpx"), None),
            Err(MapError::UnsupportedFormat(_))
        );

        std::fs::remove_dir_all(dir).unwrap();
    }
}
