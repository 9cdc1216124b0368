use meridian_types::cartesian::Point2;
use meridian_types::Geometry;
use tiny_skia::{FillRule, Paint, Path, PathBuilder, Pixmap, Stroke, Transform};

use super::ViewTransform;
use crate::color::Color;
use crate::error::MapError;
use crate::feature::Feature;
use crate::image::PixelSource;
use crate::style::{LineCap, LineSymbolizer, MarkerSymbolizer, PolygonSymbolizer, Symbolizer};

/// Anti-aliased scratch buffer the features of one style are drawn into.
///
/// Coordinates are converted to pixels in `f64` before being handed to tiny-skia, so
/// large projected coordinates do not lose precision.
pub(crate) struct Rasterizer {
    pixmap: Pixmap,
}

impl Rasterizer {
    pub fn new(width: u32, height: u32) -> Result<Self, MapError> {
        let pixmap = Pixmap::new(width, height).ok_or(MapError::InvalidDimensions {
            width,
            height,
            reason: "cannot allocate a drawing buffer",
        })?;
        Ok(Self { pixmap })
    }

    pub fn clear(&mut self) {
        self.pixmap.fill(tiny_skia::Color::TRANSPARENT);
    }

    /// Premultiplied pixels of the buffer.
    pub fn as_source(&self) -> PixelSource<'_> {
        PixelSource {
            data: self.pixmap.data(),
            width: self.pixmap.width(),
            height: self.pixmap.height(),
            premultiplied: true,
        }
    }

    pub fn draw_feature(
        &mut self,
        feature: &Feature,
        symbolizer: &Symbolizer,
        view: &ViewTransform,
        scale: f64,
    ) {
        for geometry in feature.geometries() {
            match symbolizer {
                Symbolizer::Polygon(symbolizer) => self.draw_polygon(geometry, symbolizer, view, scale),
                Symbolizer::Line(symbolizer) => self.draw_line(geometry, symbolizer, view, scale),
                Symbolizer::Marker(symbolizer) => {
                    self.draw_markers(geometry, symbolizer, view, scale)
                }
            }
        }
    }

    fn draw_polygon(
        &mut self,
        geometry: &Geometry,
        symbolizer: &PolygonSymbolizer,
        view: &ViewTransform,
        scale: f64,
    ) {
        let Geometry::Polygon(polygon) = geometry else {
            return;
        };

        let Some(path) = rings_path(polygon.rings(), view) else {
            return;
        };

        if !symbolizer.fill_color.is_transparent() {
            let paint = paint(symbolizer.fill_color);
            self.pixmap
                .fill_path(&path, &paint, FillRule::EvenOdd, Transform::identity(), None);
        }

        if symbolizer.stroke_width > 0.0 && !symbolizer.stroke_color.is_transparent() {
            let stroke = Stroke {
                width: (symbolizer.stroke_width * scale) as f32,
                ..Default::default()
            };
            self.pixmap.stroke_path(
                &path,
                &paint(symbolizer.stroke_color),
                &stroke,
                Transform::identity(),
                None,
            );
        }
    }

    fn draw_line(
        &mut self,
        geometry: &Geometry,
        symbolizer: &LineSymbolizer,
        view: &ViewTransform,
        scale: f64,
    ) {
        if symbolizer.width <= 0.0 || symbolizer.color.is_transparent() {
            return;
        }

        let path = match geometry {
            Geometry::Point(_) => return,
            Geometry::LineString(points) => line_path(points, view, false),
            Geometry::Polygon(polygon) => rings_path(polygon.rings(), view),
        };
        let Some(path) = path else {
            return;
        };

        let stroke = Stroke {
            width: (symbolizer.width * scale) as f32,
            line_cap: match symbolizer.line_cap {
                LineCap::Round => tiny_skia::LineCap::Round,
                LineCap::Butt => tiny_skia::LineCap::Butt,
                LineCap::Square => tiny_skia::LineCap::Square,
            },
            ..Default::default()
        };
        self.pixmap.stroke_path(
            &path,
            &paint(symbolizer.color),
            &stroke,
            Transform::identity(),
            None,
        );
    }

    fn draw_markers(
        &mut self,
        geometry: &Geometry,
        symbolizer: &MarkerSymbolizer,
        view: &ViewTransform,
        scale: f64,
    ) {
        let radius = (symbolizer.size * scale / 2.0) as f32;
        if radius <= 0.0 || symbolizer.color.is_transparent() {
            return;
        }

        let centers: Vec<Point2> = match geometry {
            Geometry::Point(p) => vec![*p],
            Geometry::LineString(points) => points.clone(),
            Geometry::Polygon(_) => geometry.extent().map(|e| e.center()).into_iter().collect(),
        };

        let paint = paint(symbolizer.color);
        for center in centers {
            let pixel = view.to_pixel(&center);
            if let Some(circle) = PathBuilder::from_circle(pixel.x as f32, pixel.y as f32, radius) {
                self.pixmap
                    .fill_path(&circle, &paint, FillRule::Winding, Transform::identity(), None);
            }
        }
    }
}

fn paint(color: Color) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color_rgba8(color.r(), color.g(), color.b(), color.a());
    paint.anti_alias = true;
    paint
}

fn rings_path<'a>(rings: impl Iterator<Item = &'a [Point2]>, view: &ViewTransform) -> Option<Path> {
    let mut builder = PathBuilder::new();
    for ring in rings {
        append_points(&mut builder, ring, view, true);
    }

    builder.finish()
}

fn line_path(points: &[Point2], view: &ViewTransform, closed: bool) -> Option<Path> {
    let mut builder = PathBuilder::new();
    append_points(&mut builder, points, view, closed);
    builder.finish()
}

fn append_points(builder: &mut PathBuilder, points: &[Point2], view: &ViewTransform, closed: bool) {
    if points.len() < 2 {
        return;
    }

    for (i, point) in points.iter().enumerate() {
        let pixel = view.to_pixel(point);
        let (x, y) = (pixel.x as f32, pixel.y as f32);
        if i == 0 {
            builder.move_to(x, y);
        } else {
            builder.line_to(x, y);
        }
    }

    if closed {
        builder.close();
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::cartesian::Rect;
    use meridian_types::Polygon;

    use super::*;

    fn view() -> ViewTransform {
        ViewTransform::new(&Rect::new(0.0, 0.0, 100.0, 100.0), 100, 100, 0.0, 0.0).unwrap()
    }

    fn pixel(rasterizer: &Rasterizer, x: u32, y: u32) -> [u8; 4] {
        let offset = ((y * 100 + x) * 4) as usize;
        let mut px = [0; 4];
        px.copy_from_slice(&rasterizer.pixmap.data()[offset..offset + 4]);
        px
    }

    fn square(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Vec<Point2> {
        vec![
            Point2::new(x_min, y_min),
            Point2::new(x_max, y_min),
            Point2::new(x_max, y_max),
            Point2::new(x_min, y_max),
        ]
    }

    #[test]
    fn polygon_with_hole() {
        let polygon = Polygon::new(square(10.0, 10.0, 90.0, 90.0), vec![square(40.0, 40.0, 60.0, 60.0)]);
        let feature = Feature::new(1).with_geometry(polygon);
        let mut rasterizer = Rasterizer::new(100, 100).unwrap();
        rasterizer.draw_feature(
            &feature,
            &PolygonSymbolizer::new(Color::RED).into(),
            &view(),
            1.0,
        );

        assert_eq!(pixel(&rasterizer, 20, 20), [255, 0, 0, 255]);
        assert_eq!(pixel(&rasterizer, 50, 50), [0, 0, 0, 0]);
        assert_eq!(pixel(&rasterizer, 5, 5), [0, 0, 0, 0]);

        rasterizer.clear();
        assert_eq!(pixel(&rasterizer, 20, 20), [0, 0, 0, 0]);
    }

    #[test]
    fn line_and_markers() {
        let feature = Feature::new(1).with_geometry(Geometry::LineString(vec![
            Point2::new(10.0, 50.0),
            Point2::new(90.0, 50.0),
        ]));
        let mut rasterizer = Rasterizer::new(100, 100).unwrap();
        rasterizer.draw_feature(
            &feature,
            &LineSymbolizer::new(Color::BLUE, 4.0).into(),
            &view(),
            1.0,
        );
        assert_eq!(pixel(&rasterizer, 50, 49), [0, 0, 255, 255]);
        assert_eq!(pixel(&rasterizer, 50, 40), [0, 0, 0, 0]);

        rasterizer.clear();
        rasterizer.draw_feature(
            &feature,
            &MarkerSymbolizer::new(Color::GREEN, 10.0).into(),
            &view(),
            1.0,
        );
        assert_eq!(pixel(&rasterizer, 10, 50)[3], 255);
        assert_eq!(pixel(&rasterizer, 50, 50), [0, 0, 0, 0]);
    }

    #[test]
    fn polygon_symbolizer_skips_points() {
        let feature = Feature::new(1).with_geometry(Point2::new(50.0, 50.0));
        let mut rasterizer = Rasterizer::new(100, 100).unwrap();
        rasterizer.draw_feature(
            &feature,
            &PolygonSymbolizer::new(Color::RED).into(),
            &view(),
            1.0,
        );
        assert!(rasterizer.pixmap.data().iter().all(|v| *v == 0));
    }
}
