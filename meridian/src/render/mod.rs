//! CPU rendering of maps into [`Image`]s.
//!
//! Every style of every visible layer is rasterized with anti-aliasing into a scratch buffer of
//! the target size, and the buffer is then composited onto the target. Layers are painted in
//! the order they are stored in the map.

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::geo::ProjTransform;
use nalgebra::Matrix3;
use serde::{Deserialize, Serialize};

use crate::datasource::Query;
use crate::error::MapError;
use crate::image::{CompositeOp, CompositeOptions, Image};
use crate::layer::Layer;
use crate::map::Map;
use crate::task::CancelToken;

mod rasterizer;

pub(crate) use rasterizer::Rasterizer;

/// Parameters of a single render call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderOptions {
    /// Overrides the buffer size of the map, in pixels.
    pub buffer_size: Option<u32>,
    /// Multiplier of symbol sizes and line widths.
    pub scale: f64,
    /// Scale denominator used to select visible layers instead of the computed one.
    pub scale_denominator: Option<f64>,
    /// Horizontal shift of the drawing in pixels.
    pub offset_x: f64,
    /// Vertical shift of the drawing in pixels.
    pub offset_y: f64,
    /// Operator for styles that do not set their own. `src_over` if not set.
    pub comp_op: Option<CompositeOp>,
    /// Multiplied with the opacity of every style.
    pub opacity: f32,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            buffer_size: None,
            scale: 1.0,
            scale_denominator: None,
            offset_x: 0.0,
            offset_y: 0.0,
            comp_op: None,
            opacity: 1.0,
        }
    }
}

impl RenderOptions {
    /// Sets the composite operator.
    pub fn with_comp_op(mut self, comp_op: CompositeOp) -> Self {
        self.comp_op = Some(comp_op);
        self
    }

    /// Sets the opacity.
    pub fn with_opacity(mut self, opacity: f32) -> Self {
        self.opacity = opacity;
        self
    }

    /// Sets the buffer size.
    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }
}

/// Affine transform between map coordinates and pixels of the target image.
///
/// Pixel `y` grows downwards while map `y` grows upwards.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ViewTransform {
    forward: Matrix3<f64>,
    backward: Matrix3<f64>,
}

impl ViewTransform {
    /// Transform fitting `extent` into an image of `width` x `height` pixels, shifted by the
    /// given pixel offset.
    pub fn new(
        extent: &Rect,
        width: u32,
        height: u32,
        offset_x: f64,
        offset_y: f64,
    ) -> Result<Self, MapError> {
        let extent = visible_extent(extent, width, height)?;
        let sx = extent.width() / width as f64;
        let sy = extent.height() / height as f64;
        if !(sx.is_finite() && sy.is_finite() && sx > 0.0 && sy > 0.0) {
            return Err(MapError::InvalidExtent(format!(
                "extent {extent:?} cannot be mapped to {width}x{height} pixels"
            )));
        }

        let forward = Matrix3::new(
            1.0 / sx,
            0.0,
            offset_x - extent.x_min() / sx,
            0.0,
            -1.0 / sy,
            offset_y + extent.y_max() / sy,
            0.0,
            0.0,
            1.0,
        );
        let backward = forward.try_inverse().ok_or_else(|| {
            MapError::InvalidExtent(format!("extent {extent:?} has no inverse view transform"))
        })?;

        Ok(Self { forward, backward })
    }

    /// Map coordinates to pixel coordinates.
    pub fn to_pixel(&self, point: &Point2) -> Point2 {
        self.forward.transform_point(point)
    }

    /// Pixel coordinates to map coordinates.
    pub fn to_map(&self, pixel: &Point2) -> Point2 {
        self.backward.transform_point(pixel)
    }

    /// Map units per pixel along x.
    pub fn resolution(&self) -> f64 {
        1.0 / self.forward[(0, 0)]
    }
}

/// Box shown by an image of `width` x `height` pixels when it is fitted to `extent`.
///
/// A zero span is widened around its center to the resolution of the other axis. If both
/// spans are zero, the box gets one map unit per pixel.
pub fn visible_extent(extent: &Rect, width: u32, height: u32) -> Result<Rect, MapError> {
    if !extent.is_valid() || width == 0 || height == 0 {
        return Err(MapError::InvalidExtent(format!(
            "extent {extent:?} cannot be mapped to {width}x{height} pixels"
        )));
    }

    let (width, height) = (width as f64, height as f64);
    let sx = extent.width() / width;
    let sy = extent.height() / height;
    let center = extent.center();
    let visible = match (sx > 0.0, sy > 0.0) {
        (true, true) => *extent,
        (true, false) => Rect::new(
            extent.x_min(),
            center.y - sx * height / 2.0,
            extent.x_max(),
            center.y + sx * height / 2.0,
        ),
        (false, true) => Rect::new(
            center.x - sy * width / 2.0,
            extent.y_min(),
            center.x + sy * width / 2.0,
            extent.y_max(),
        ),
        (false, false) => Rect::new(
            center.x - width / 2.0,
            center.y - height / 2.0,
            center.x + width / 2.0,
            center.y + height / 2.0,
        ),
    };

    Ok(visible)
}

/// Renders the layers of a map into a target image.
pub(crate) struct MapRenderer<'a> {
    map: &'a Map,
    options: &'a RenderOptions,
    extent: Rect,
    view: ViewTransform,
    scale_denominator: f64,
    width: u32,
    height: u32,
}

impl<'a> MapRenderer<'a> {
    /// Prepares rendering of the map extent into an image of the given size.
    pub fn new(
        map: &'a Map,
        extent: Rect,
        width: u32,
        height: u32,
        options: &'a RenderOptions,
    ) -> Result<Self, MapError> {
        let extent = visible_extent(&extent, width, height)?;
        let view = ViewTransform::new(&extent, width, height, options.offset_x, options.offset_y)?;
        let scale_denominator = options
            .scale_denominator
            .unwrap_or_else(|| map.scale_denominator_for(view.resolution()));

        Ok(Self {
            map,
            options,
            extent,
            view,
            scale_denominator,
            width,
            height,
        })
    }

    /// Visible extent grown by the buffer on each side.
    pub fn buffered_extent(&self) -> Rect {
        let buffer = self.options.buffer_size.unwrap_or(self.map.buffer_size()) as f64;
        let x_resolution = self.extent.width() / self.width as f64;
        let y_resolution = self.extent.height() / self.height as f64;
        self.extent
            .expand(buffer * x_resolution, buffer * y_resolution)
    }

    /// Paints all visible layers. The token is checked before every layer.
    pub fn render(&self, target: &mut Image, cancel: Option<&CancelToken>) -> Result<(), MapError> {
        if target.width() != self.width || target.height() != self.height {
            return Err(MapError::InvalidDimensions {
                width: target.width(),
                height: target.height(),
                reason: "target size differs from the rendered size",
            });
        }

        if let Some(background) = self.map.background() {
            target.fill(background);
        }

        let buffered_extent = self.buffered_extent();
        let mut rasterizer = Rasterizer::new(self.width, self.height)?;

        log::debug!(
            "Rendering {} layers into {}x{} at 1:{:.0}",
            self.map.layers().len(),
            self.width,
            self.height,
            self.scale_denominator
        );

        for (index, layer) in self.map.layers().iter().enumerate() {
            if cancel.is_some_and(|token| token.is_cancelled()) {
                log::debug!("Rendering cancelled before layer '{}'", layer.name());
                return Err(MapError::Cancelled);
            }

            if !layer.is_visible(self.scale_denominator) {
                log::debug!("Layer '{}' is not visible at this scale", layer.name());
                continue;
            }

            self.render_layer(layer, &buffered_extent, &mut rasterizer, target)
                .map_err(|err| err.in_layer(layer.name(), index))?;
        }

        Ok(())
    }

    fn render_layer(
        &self,
        layer: &Layer,
        buffered_extent: &Rect,
        rasterizer: &mut Rasterizer,
        target: &mut Image,
    ) -> Result<(), MapError> {
        let Some(datasource) = layer.datasource() else {
            log::debug!("Layer '{}' has no datasource", layer.name());
            return Ok(());
        };

        let transform = ProjTransform::new(
            layer.projection().clone(),
            self.map.projection().clone(),
        );

        if let Some(layer_extent) = datasource.extent()? {
            match transform.forward_rect(&layer_extent) {
                Ok(projected) if !projected.intersects(buffered_extent) => {
                    log::debug!("Layer '{}' is outside of the map extent", layer.name());
                    return Ok(());
                }
                Ok(_) => {}
                Err(err) => {
                    log::debug!(
                        "Extent of layer '{}' cannot be projected, drawing it anyway: {err}",
                        layer.name()
                    )
                }
            }
        }

        let featureset = match transform.backward_rect(buffered_extent) {
            Ok(query_extent) => datasource.features(&Query::new(query_extent))?,
            Err(err) => {
                log::debug!(
                    "Map extent cannot be projected into layer '{}', reading all features: {err}",
                    layer.name()
                );
                datasource.featureset()?
            }
        };

        let mut features = Vec::new();
        for feature in featureset {
            let projected = feature.project(&transform)?;
            if projected.intersects(buffered_extent) {
                features.push(projected);
            }
        }

        for style_name in layer.styles() {
            let style = self
                .map
                .style(style_name)
                .ok_or_else(|| MapError::NotFound(format!("style '{style_name}'")))?;
            if style.symbolizers.is_empty() {
                continue;
            }

            rasterizer.clear();
            for feature in &features {
                for symbolizer in &style.symbolizers {
                    rasterizer.draw_feature(feature, symbolizer, &self.view, self.options.scale);
                }
            }

            let options = CompositeOptions {
                comp_op: style
                    .comp_op
                    .or(self.options.comp_op)
                    .unwrap_or_default(),
                opacity: style.opacity * self.options.opacity,
                dx: 0,
                dy: 0,
            };
            target.composite_pixels(rasterizer.as_source(), &options);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    #[test]
    fn view_transform_flips_y() {
        let extent = Rect::new(-180.0, -90.0, 180.0, 90.0);
        let view = ViewTransform::new(&extent, 360, 180, 0.0, 0.0).unwrap();

        let top_left = view.to_pixel(&Point2::new(-180.0, 90.0));
        assert_relative_eq!(top_left.x, 0.0);
        assert_relative_eq!(top_left.y, 0.0);

        let bottom_right = view.to_pixel(&Point2::new(180.0, -90.0));
        assert_relative_eq!(bottom_right.x, 360.0);
        assert_relative_eq!(bottom_right.y, 180.0);

        let back = view.to_map(&Point2::new(90.0, 45.0));
        assert_relative_eq!(back.x, -90.0, epsilon = 1e-9);
        assert_relative_eq!(back.y, 45.0, epsilon = 1e-9);
        assert_relative_eq!(view.resolution(), 1.0);
    }

    #[test]
    fn view_transform_offset() {
        let extent = Rect::new(0.0, 0.0, 100.0, 100.0);
        let view = ViewTransform::new(&extent, 50, 50, 10.0, -5.0).unwrap();
        let pixel = view.to_pixel(&Point2::new(0.0, 100.0));
        assert_relative_eq!(pixel.x, 10.0);
        assert_relative_eq!(pixel.y, -5.0);
    }

    #[test]
    fn zero_width_extent_uses_height_resolution() {
        let extent = Rect::new(0.0, 0.0, 0.0, 100.0);
        assert_eq!(
            visible_extent(&extent, 50, 50).unwrap(),
            Rect::new(-50.0, 0.0, 50.0, 100.0)
        );

        let view = ViewTransform::new(&extent, 50, 50, 0.0, 0.0).unwrap();
        assert_relative_eq!(view.resolution(), 2.0);
        let pixel = view.to_pixel(&Point2::new(0.0, 50.0));
        assert_relative_eq!(pixel.x, 25.0);
        assert_relative_eq!(pixel.y, 25.0);
    }

    #[test]
    fn point_extent_is_centered() {
        let extent = Rect::new(10.0, 20.0, 10.0, 20.0);
        assert_eq!(
            visible_extent(&extent, 100, 60).unwrap(),
            Rect::new(-40.0, -10.0, 60.0, 50.0)
        );

        let view = ViewTransform::new(&extent, 100, 60, 0.0, 0.0).unwrap();
        let pixel = view.to_pixel(&Point2::new(10.0, 20.0));
        assert_relative_eq!(pixel.x, 50.0);
        assert_relative_eq!(pixel.y, 30.0);
    }

    #[test]
    fn malformed_extent() {
        let inverted = Rect::new(10.0, 0.0, 0.0, 100.0);
        assert!(ViewTransform::new(&inverted, 50, 50, 0.0, 0.0).is_err());
        let infinite = Rect::new(0.0, 0.0, f64::INFINITY, 100.0);
        assert!(visible_extent(&infinite, 50, 50).is_err());
    }
}
