//! [`Map`] owns layers and styles and renders them into images.

use std::collections::BTreeMap;
use std::path::Path;

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::geo::{ProjTransform, Projection, WGS84_SRS};
use serde::{Deserialize, Serialize};

use crate::color::Color;
use crate::datasource::Query;
use crate::error::MapError;
use crate::feature::Feature;
use crate::image::{CompositeOptions, EncodeOptions, Image};
use crate::layer::Layer;
use crate::render::{visible_extent, MapRenderer, RenderOptions, ViewTransform};
use crate::style::Style;
use crate::task::CancelToken;
use crate::tile::{TileGrid, TileIndex};

mod builder;
mod layer_collection;
mod stylesheet;

pub use builder::MapBuilder;
pub use layer_collection::{LayerCollection, LayerSelector};
pub use stylesheet::LoadOptions;

/// Smallest allowed width and height of a map.
pub const MIN_MAP_SIZE: u32 = 16;

/// Size of a pixel in meters used to calculate scale denominators (0.28 mm).
const STANDARDIZED_PIXEL_SIZE: f64 = 0.00028;

/// Restricts a point query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct QueryOptions {
    /// Only query this layer.
    pub layer: Option<LayerSelector>,
}

impl QueryOptions {
    /// Options querying only the selected layer.
    pub fn layer(selector: impl Into<LayerSelector>) -> Self {
        Self {
            layer: Some(selector.into()),
        }
    }
}

/// Features of one layer found by a point query.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResult {
    /// Layer name.
    pub layer: String,
    /// Position of the layer in the map.
    pub index: usize,
    /// Matched features in the coordinates of the layer.
    pub features: Vec<Feature>,
}

/// Free-form map parameters, kept in stylesheets.
pub type MapParameters = BTreeMap<String, String>;

/// Map specifies a set of layers and styles, and the extent of the plane that should be
/// rendered.
///
/// ```
/// use meridian::{Color, Datasource, Feature, Image, Layer, Map, PolygonSymbolizer, RenderOptions, Style};
/// use meridian_types::cartesian::{Point2, Rect};
/// use meridian_types::Polygon;
///
/// let square = Polygon::new(
///     vec![
///         Point2::new(-10.0, -10.0),
///         Point2::new(10.0, -10.0),
///         Point2::new(10.0, 10.0),
///         Point2::new(-10.0, 10.0),
///     ],
///     vec![],
/// );
///
/// let mut map = Map::new(100, 100).unwrap();
/// map.add_style("fill", Style::new(PolygonSymbolizer::new(Color::RED))).unwrap();
/// map.add_layer(
///     Layer::new("squares")
///         .with_style("fill")
///         .with_datasource(Datasource::memory(vec![Feature::new(1).with_geometry(square)])),
/// )
/// .unwrap();
/// map.zoom_to_box(Rect::new(-20.0, -20.0, 20.0, 20.0)).unwrap();
///
/// let mut image = Image::new(100, 100).unwrap();
/// map.render(&mut image, &RenderOptions::default()).unwrap();
/// assert!(image.painted());
/// assert_eq!(image.get_pixel(50, 50), Some(Color::RED));
/// assert_eq!(image.get_pixel(5, 5), Some(Color::TRANSPARENT));
/// ```
#[derive(Debug)]
pub struct Map {
    width: u32,
    height: u32,
    projection: Projection,
    extent: Option<Rect>,
    maximum_extent: Option<Rect>,
    buffer_size: u32,
    background: Option<Color>,
    parameters: MapParameters,
    styles: BTreeMap<String, Style>,
    layers: LayerCollection,
}

impl Map {
    /// Creates an empty map in WGS84 longitude/latitude.
    pub fn new(width: u32, height: u32) -> Result<Self, MapError> {
        Self::with_srs(width, height, WGS84_SRS)
    }

    /// Creates an empty map in the given spatial reference.
    pub fn with_srs(width: u32, height: u32, srs: &str) -> Result<Self, MapError> {
        check_size(width, height)?;
        Ok(Self {
            width,
            height,
            projection: Projection::new(srs)?,
            extent: None,
            maximum_extent: None,
            buffer_size: 0,
            background: None,
            parameters: MapParameters::new(),
            styles: BTreeMap::new(),
            layers: LayerCollection::default(),
        })
    }

    /// Width in pixels.
    pub fn width(&self) -> u32 {
        self.width
    }

    /// Height in pixels.
    pub fn height(&self) -> u32 {
        self.height
    }

    /// Changes the size of the map. The extent stays the same.
    pub fn resize(&mut self, width: u32, height: u32) -> Result<(), MapError> {
        check_size(width, height)?;
        self.width = width;
        self.height = height;
        Ok(())
    }

    /// Spatial reference definition of the map.
    pub fn srs(&self) -> &str {
        self.projection.srs()
    }

    /// Changes the spatial reference. The extent is not transformed.
    pub fn set_srs(&mut self, srs: &str) -> Result<(), MapError> {
        self.projection = Projection::new(srs)?;
        Ok(())
    }

    /// Projection of the map.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Number of pixels around the map that are drawn into, so symbols crossing the border
    /// are not cut.
    pub fn buffer_size(&self) -> u32 {
        self.buffer_size
    }

    /// Sets the buffer size.
    pub fn set_buffer_size(&mut self, buffer_size: u32) {
        self.buffer_size = buffer_size;
    }

    /// Area of the plane rendered into the map. Not set until [`Map::zoom_all`] or
    /// [`Map::zoom_to_box`] is called.
    pub fn extent(&self) -> Option<Rect> {
        self.extent
    }

    /// Extent grown by [`Map::buffer_size`] pixels on each side.
    pub fn buffered_extent(&self) -> Option<Rect> {
        let extent = self.visible_extent()?;
        let buffer = self.buffer_size as f64;
        Some(extent.expand(
            buffer * extent.width() / self.width as f64,
            buffer * extent.height() / self.height as f64,
        ))
    }

    /// Box [`Map::zoom_all`] never goes beyond.
    pub fn maximum_extent(&self) -> Option<Rect> {
        self.maximum_extent
    }

    /// Sets or resets the maximum extent.
    pub fn set_maximum_extent(&mut self, maximum_extent: Option<Rect>) -> Result<(), MapError> {
        if let Some(rect) = maximum_extent {
            check_box(&rect)?;
        }

        self.maximum_extent = maximum_extent;
        Ok(())
    }

    /// Color the target is filled with before rendering.
    pub fn background(&self) -> Option<Color> {
        self.background
    }

    /// Sets or resets the background color.
    pub fn set_background(&mut self, background: Option<Color>) {
        self.background = background;
    }

    /// Free-form parameters.
    pub fn parameters(&self) -> &MapParameters {
        &self.parameters
    }

    /// Mutable free-form parameters.
    pub fn parameters_mut(&mut self) -> &mut MapParameters {
        &mut self.parameters
    }

    /// Returns the list of map's layers.
    pub fn layers(&self) -> &LayerCollection {
        &self.layers
    }

    /// Returns a mutable reference to the list of map's layers.
    pub fn layers_mut(&mut self) -> &mut LayerCollection {
        &mut self.layers
    }

    /// Appends a layer on top of the others. Layer names must be unique.
    pub fn add_layer(&mut self, layer: Layer) -> Result<(), MapError> {
        self.layers.push(layer)
    }

    /// Returns a layer by its name or index.
    pub fn get_layer(&self, selector: impl Into<LayerSelector>) -> Result<&Layer, MapError> {
        let selector = selector.into();
        self.layers
            .position(&selector)
            .map(|index| &self.layers[index])
            .ok_or_else(|| MapError::NotFound(selector.to_string()))
    }

    /// Returns a mutable reference to a layer by its name or index.
    pub fn get_layer_mut(
        &mut self,
        selector: impl Into<LayerSelector>,
    ) -> Result<&mut Layer, MapError> {
        let selector = selector.into();
        match self.layers.position(&selector) {
            Some(index) => Ok(&mut self.layers[index]),
            None => Err(MapError::NotFound(selector.to_string())),
        }
    }

    /// Removes a layer and returns it.
    pub fn remove_layer(&mut self, selector: impl Into<LayerSelector>) -> Result<Layer, MapError> {
        self.layers.remove(selector)
    }

    /// Removes all layers and styles.
    pub fn clear(&mut self) {
        self.layers.clear();
        self.styles.clear();
    }

    /// Adds a named style. Style names must be unique.
    pub fn add_style(&mut self, name: impl Into<String>, style: Style) -> Result<(), MapError> {
        let name = name.into();
        if self.styles.contains_key(&name) {
            return Err(MapError::DuplicateName(name));
        }

        self.styles.insert(name, style);
        Ok(())
    }

    /// Returns a style by name.
    pub fn style(&self, name: &str) -> Option<&Style> {
        self.styles.get(name)
    }

    /// Removes a style by name.
    pub fn remove_style(&mut self, name: &str) -> Option<Style> {
        self.styles.remove(name)
    }

    /// All styles by their names.
    pub fn styles(&self) -> &BTreeMap<String, Style> {
        &self.styles
    }

    /// Sets the extent to the union of extents of all layers, projected to the map spatial
    /// reference and clipped by the maximum extent.
    ///
    /// Does nothing if no layer has an extent.
    pub fn zoom_all(&mut self) -> Result<(), MapError> {
        let mut union: Option<Rect> = None;
        for (index, layer) in self.layers.iter().enumerate() {
            if !layer.active() {
                continue;
            }

            let Some(extent) = layer
                .extent()
                .map_err(|err| err.in_layer(layer.name(), index))?
            else {
                continue;
            };

            let transform = ProjTransform::new(layer.projection().clone(), self.projection.clone());
            let projected = transform
                .forward_rect(&extent)
                .map_err(|err| MapError::from(err).in_layer(layer.name(), index))?;
            union = Some(match union {
                Some(union) => union.merge(projected),
                None => projected,
            });
        }

        let Some(mut extent) = union else {
            log::debug!("No layer extents available, map extent is not changed");
            return Ok(());
        };

        if let Some(maximum) = self.maximum_extent {
            extent = extent.intersection(&maximum).unwrap_or(maximum);
        }

        self.extent = Some(extent);
        Ok(())
    }

    /// Sets the extent. Fails with [`MapError::InvalidExtent`] for malformed boxes.
    pub fn zoom_to_box(&mut self, extent: Rect) -> Result<(), MapError> {
        check_box(&extent)?;
        self.extent = Some(extent);
        Ok(())
    }

    /// Map units per pixel along x.
    pub fn scale(&self) -> Option<f64> {
        self.visible_extent()
            .map(|extent| extent.width() / self.width as f64)
    }

    /// Extent widened the way it is shown in the image. Differs from [`Map::extent`] only if
    /// the extent has zero width or height.
    pub fn visible_extent(&self) -> Option<Rect> {
        self.extent
            .and_then(|extent| visible_extent(&extent, self.width, self.height).ok())
    }

    /// Scale denominator of the current extent, assuming 0.28 mm pixels.
    pub fn scale_denominator(&self) -> Option<f64> {
        self.scale().map(|scale| self.scale_denominator_for(scale))
    }

    pub(crate) fn scale_denominator_for(&self, resolution: f64) -> f64 {
        resolution * self.projection.crs().meters_per_unit() / STANDARDIZED_PIXEL_SIZE
    }

    fn view_transform(&self) -> Result<ViewTransform, MapError> {
        let extent = self.required_extent()?;
        ViewTransform::new(&extent, self.width, self.height, 0.0, 0.0)
    }

    fn required_extent(&self) -> Result<Rect, MapError> {
        self.extent
            .ok_or_else(|| MapError::InvalidExtent("map extent is not set".into()))
    }

    /// Converts pixel coordinates into map coordinates.
    pub fn pixel_to_map(&self, x: f64, y: f64) -> Result<Point2, MapError> {
        Ok(self.view_transform()?.to_map(&Point2::new(x, y)))
    }

    /// Converts map coordinates into pixel coordinates.
    pub fn map_to_pixel(&self, x: f64, y: f64) -> Result<Point2, MapError> {
        Ok(self.view_transform()?.to_pixel(&Point2::new(x, y)))
    }

    /// Renders the map into the target image, which must have the size of the map.
    ///
    /// Layers are drawn in order on top of what the target already contains. If rendering
    /// fails, the target may be left partially painted.
    pub fn render(&self, target: &mut Image, options: &RenderOptions) -> Result<(), MapError> {
        self.render_with_token(target, options, None)
    }

    /// Same as [`Map::render`], but stops with [`MapError::Cancelled`] once the token is
    /// cancelled. The token is checked before each layer.
    pub fn render_cancellable(
        &self,
        target: &mut Image,
        options: &RenderOptions,
        token: &CancelToken,
    ) -> Result<(), MapError> {
        self.render_with_token(target, options, Some(token))
    }

    fn render_with_token(
        &self,
        target: &mut Image,
        options: &RenderOptions,
        token: Option<&CancelToken>,
    ) -> Result<(), MapError> {
        let extent = self.required_extent()?;
        MapRenderer::new(self, extent, self.width, self.height, options)?.render(target, token)
    }

    /// Renders the map into a new image and encodes it.
    pub fn render_to_bytes(
        &self,
        format: &str,
        options: &RenderOptions,
        encode_options: &EncodeOptions,
    ) -> Result<Vec<u8>, MapError> {
        let image = self.render_to_image(options)?;
        image.encode(format, encode_options)
    }

    /// Renders the map into a file. If the format is not given, it is guessed from the file
    /// extension.
    pub fn render_to_file(
        &self,
        path: impl AsRef<Path>,
        format: Option<&str>,
        options: &RenderOptions,
        encode_options: &EncodeOptions,
    ) -> Result<(), MapError> {
        let image = self.render_to_image(options)?;
        image.save_with_options(path, format, encode_options)
    }

    fn render_to_image(&self, options: &RenderOptions) -> Result<Image, MapError> {
        let mut image = Image::new(self.width, self.height)?;
        self.render(&mut image, options)?;
        Ok(image)
    }

    /// Renders one tile of the grid into the target. The target size sets the tile size in
    /// pixels, the map size and extent are not used.
    pub fn render_tile(
        &self,
        index: TileIndex,
        grid: &TileGrid,
        target: &mut Image,
        options: &RenderOptions,
    ) -> Result<(), MapError> {
        let tile_bbox = grid
            .tile_bbox(index)
            .ok_or_else(|| MapError::NotFound(format!("tile {index:?}")))?;
        let transform = ProjTransform::new(Projection::new(grid.srs())?, self.projection.clone());
        let extent = transform.forward_rect(&tile_bbox)?;

        MapRenderer::new(self, extent, target.width(), target.height(), options)?
            .render(target, None)
    }

    /// Renders a rectangular range of tiles and stitches them into one image. The tile at
    /// (`x_min`, `y_min`) is at the top left corner of the result.
    pub fn render_mosaic(
        &self,
        grid: &TileGrid,
        z: u32,
        (x_min, y_min): (i32, i32),
        (x_max, y_max): (i32, i32),
        options: &RenderOptions,
    ) -> Result<Image, MapError> {
        if x_max < x_min || y_max < y_min {
            return Err(MapError::InvalidExtent(format!(
                "tile range ({x_min}, {y_min})..=({x_max}, {y_max}) is empty"
            )));
        }

        let tile_size = grid.tile_size();
        let columns = (x_max - x_min + 1) as u32;
        let rows = (y_max - y_min + 1) as u32;
        let mut mosaic = Image::new(columns * tile_size, rows * tile_size)?;

        for y in y_min..=y_max {
            for x in x_min..=x_max {
                let mut tile = Image::new(tile_size, tile_size)?;
                self.render_tile(TileIndex::new(x, y, z), grid, &mut tile, options)?;
                mosaic.composite(
                    &tile,
                    &CompositeOptions {
                        dx: (x - x_min) * tile_size as i32,
                        dy: (y - y_min) * tile_size as i32,
                        ..Default::default()
                    },
                );
            }
        }

        Ok(mosaic)
    }

    /// Finds features whose bounding box contains the pixel.
    pub fn query_point(
        &self,
        x: f64,
        y: f64,
        options: &QueryOptions,
    ) -> Result<Vec<QueryResult>, MapError> {
        let point = self.pixel_to_map(x, y)?;
        self.query_map_point(point.x, point.y, options)
    }

    /// Finds features whose bounding box contains the point given in map coordinates.
    ///
    /// Only layers with at least one match are returned. Inactive layers and layers outside
    /// of their scale range are not queried unless selected explicitly.
    pub fn query_map_point(
        &self,
        x: f64,
        y: f64,
        options: &QueryOptions,
    ) -> Result<Vec<QueryResult>, MapError> {
        let point = Point2::new(x, y);
        let candidates: Vec<usize> = match &options.layer {
            Some(selector) => vec![self
                .layers
                .position(selector)
                .ok_or_else(|| MapError::NotFound(selector.to_string()))?],
            None => {
                let scale_denominator = self.scale_denominator().unwrap_or(0.0);
                self.layers
                    .iter_visible(scale_denominator)
                    .map(|(index, _)| index)
                    .collect()
            }
        };

        let mut results = Vec::new();
        for index in candidates {
            let layer = &self.layers[index];
            let features = self
                .query_layer(layer, &point)
                .map_err(|err| err.in_layer(layer.name(), index))?;
            if !features.is_empty() {
                results.push(QueryResult {
                    layer: layer.name().to_string(),
                    index,
                    features,
                });
            }
        }

        Ok(results)
    }

    fn query_layer(&self, layer: &Layer, point: &Point2) -> Result<Vec<Feature>, MapError> {
        let Some(datasource) = layer.datasource() else {
            return Ok(Vec::new());
        };

        let transform = ProjTransform::new(layer.projection().clone(), self.projection.clone());
        let layer_point = match transform.backward_point(point) {
            Ok(p) => p,
            Err(err) => {
                log::debug!(
                    "Point is outside of the projection of layer '{}': {err}",
                    layer.name()
                );
                return Ok(Vec::new());
            }
        };

        Ok(datasource
            .features(&Query::point(layer_point, 0.0))?
            .filter(|feature| feature.bbox_contains(&layer_point))
            .collect())
    }
}

fn check_size(width: u32, height: u32) -> Result<(), MapError> {
    if width < MIN_MAP_SIZE || height < MIN_MAP_SIZE {
        return Err(MapError::InvalidDimensions {
            width,
            height,
            reason: "map must be at least 16 pixels wide and high",
        });
    }

    Ok(())
}

fn check_box(rect: &Rect) -> Result<(), MapError> {
    if !rect.is_valid() {
        return Err(MapError::InvalidExtent(format!(
            "[{}, {}, {}, {}]",
            rect.x_min(),
            rect.y_min(),
            rect.x_max(),
            rect.y_max()
        )));
    }

    Ok(())
}

/// Serializable snapshot of map properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MapDescription {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
    /// Spatial reference definition.
    pub srs: String,
    /// Current extent.
    pub extent: Option<Rect>,
    /// Buffer size in pixels.
    pub buffer_size: u32,
    /// Background color.
    pub background: Option<Color>,
    /// Names of the layers in drawing order.
    pub layers: Vec<String>,
}

impl Map {
    /// Returns a snapshot of map properties.
    pub fn describe(&self) -> MapDescription {
        MapDescription {
            width: self.width,
            height: self.height,
            srs: self.srs().to_string(),
            extent: self.extent,
            buffer_size: self.buffer_size,
            background: self.background,
            layers: self.layers.iter().map(|l| l.name().to_string()).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;
    use assert_matches::assert_matches;
    use meridian_types::geo::WEB_MERCATOR_SRS;
    use meridian_types::Polygon;

    use super::*;
    use crate::datasource::Datasource;
    use crate::image::CompositeOp;
    use crate::style::{MarkerSymbolizer, PolygonSymbolizer};

    fn square(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Polygon {
        Polygon::new(
            vec![
                Point2::new(x_min, y_min),
                Point2::new(x_max, y_min),
                Point2::new(x_max, y_max),
                Point2::new(x_min, y_max),
            ],
            vec![],
        )
    }

    fn squares_layer(name: &str, style: &str, polygon: Polygon) -> Layer {
        Layer::new(name)
            .with_style(style)
            .with_datasource(Datasource::memory(vec![
                Feature::new(1).with_geometry(polygon)
            ]))
    }

    fn test_map() -> Map {
        let mut map = Map::new(100, 100).unwrap();
        map.add_style("red", Style::new(PolygonSymbolizer::new(Color::RED)))
            .unwrap();
        map.add_style("blue", Style::new(PolygonSymbolizer::new(Color::BLUE)))
            .unwrap();
        map.add_layer(squares_layer("a", "red", square(0.0, 0.0, 10.0, 10.0)))
            .unwrap();
        map.add_layer(squares_layer("b", "blue", square(5.0, 5.0, 20.0, 20.0)))
            .unwrap();
        map
    }

    #[test]
    fn size_limits() {
        assert_matches!(Map::new(15, 100), Err(MapError::InvalidDimensions { .. }));
        let mut map = Map::new(16, 16).unwrap();
        assert_matches!(map.resize(100, 0), Err(MapError::InvalidDimensions { .. }));
        map.resize(200, 100).unwrap();
        assert_eq!((map.width(), map.height()), (200, 100));
    }

    #[test]
    fn invalid_srs() {
        assert_matches!(
            Map::with_srs(100, 100, "+proj=nonsense"),
            Err(MapError::InvalidCrs { .. })
        );
    }

    #[test]
    fn duplicate_layers_and_styles() {
        let mut map = test_map();
        assert_matches!(
            map.add_layer(Layer::new("a")),
            Err(MapError::DuplicateName(name)) if name == "a"
        );
        assert_matches!(
            map.add_style("red", Style::default()),
            Err(MapError::DuplicateName(_))
        );
        assert_eq!(map.get_layer(1).unwrap().name(), "b");
        assert_eq!(map.get_layer("a").unwrap().name(), "a");
        assert_matches!(map.get_layer("c"), Err(MapError::NotFound(_)));
        assert_matches!(map.get_layer(2), Err(MapError::NotFound(_)));
    }

    #[test]
    fn zoom_all_unions_layers() {
        let mut map = test_map();
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), Some(Rect::new(0.0, 0.0, 20.0, 20.0)));

        map.set_maximum_extent(Some(Rect::new(0.0, 0.0, 8.0, 8.0)))
            .unwrap();
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), Some(Rect::new(0.0, 0.0, 8.0, 8.0)));
    }

    #[test]
    fn zoom_all_without_layers_is_noop() {
        let mut map = Map::new(100, 100).unwrap();
        map.zoom_all().unwrap();
        assert_eq!(map.extent(), None);
    }

    #[test]
    fn zoom_all_reprojects_layers() {
        let mut map = Map::with_srs(100, 100, WEB_MERCATOR_SRS).unwrap();
        map.add_layer(squares_layer("a", "red", square(-10.0, -10.0, 10.0, 10.0)))
            .unwrap();
        map.zoom_all().unwrap();
        let extent = map.extent().unwrap();
        assert_relative_eq!(extent.x_max(), 1113194.9079327357, max_relative = 1e-9);
        assert_relative_eq!(extent.x_min(), -extent.x_max(), max_relative = 1e-9);
    }

    #[test]
    fn zoom_to_invalid_box() {
        let mut map = test_map();
        assert_matches!(
            map.zoom_to_box(Rect::new(10.0, 0.0, 0.0, 10.0)),
            Err(MapError::InvalidExtent(_))
        );
        assert_eq!(map.extent(), None);
    }

    #[test]
    fn render_requires_extent() {
        let map = test_map();
        let mut image = Image::new(100, 100).unwrap();
        assert_matches!(
            map.render(&mut image, &RenderOptions::default()),
            Err(MapError::InvalidExtent(_))
        );
    }

    #[test]
    fn render_requires_matching_target() {
        let mut map = test_map();
        map.zoom_all().unwrap();
        let mut image = Image::new(50, 100).unwrap();
        assert_matches!(
            map.render(&mut image, &RenderOptions::default()),
            Err(MapError::InvalidDimensions { .. })
        );
    }

    #[test]
    fn layers_are_painted_in_order() {
        let mut map = test_map();
        map.zoom_to_box(Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let mut image = Image::new(100, 100).unwrap();
        map.render(&mut image, &RenderOptions::default()).unwrap();

        // (7.5, 7.5) is covered by both squares, blue is on top
        assert_eq!(image.get_pixel(37, 62), Some(Color::BLUE));
        // (2.5, 2.5) only by the red one
        assert_eq!(image.get_pixel(12, 87), Some(Color::RED));
        assert_eq!(image.get_pixel(12, 12), Some(Color::TRANSPARENT));
    }

    #[test]
    fn background_and_comp_op() {
        let mut map = test_map();
        map.set_background(Some(Color::WHITE));
        map.zoom_to_box(Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let mut image = Image::new(100, 100).unwrap();
        map.render(
            &mut image,
            &RenderOptions::default().with_comp_op(CompositeOp::Multiply),
        )
        .unwrap();

        assert_eq!(image.get_pixel(12, 12), Some(Color::WHITE));
        // red multiplied by blue is black
        assert_eq!(image.get_pixel(37, 62), Some(Color::BLACK));
    }

    #[test]
    fn missing_style_names_layer() {
        let mut map = test_map();
        map.get_layer_mut("b").unwrap().add_style("missing");
        map.zoom_all().unwrap();
        let mut image = Image::new(100, 100).unwrap();
        let err = map
            .render(&mut image, &RenderOptions::default())
            .unwrap_err();
        assert_matches!(err, MapError::Layer { layer, index: 1, .. } if layer == "b");
    }

    #[test]
    fn cancelled_render() {
        let mut map = test_map();
        map.zoom_all().unwrap();
        let token = CancelToken::new();
        token.cancel();
        let mut image = Image::new(100, 100).unwrap();
        assert_matches!(
            map.render_cancellable(&mut image, &RenderOptions::default(), &token),
            Err(MapError::Cancelled)
        );
        assert!(!image.painted());
    }

    #[test]
    fn inactive_layers_are_skipped() {
        let mut map = test_map();
        map.get_layer_mut("b").unwrap().set_active(false);
        map.zoom_to_box(Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let mut image = Image::new(100, 100).unwrap();
        map.render(&mut image, &RenderOptions::default()).unwrap();
        assert_eq!(image.get_pixel(37, 62), Some(Color::RED));
    }

    #[test]
    fn pixel_conversion() {
        let mut map = test_map();
        map.zoom_to_box(Rect::new(0.0, 0.0, 20.0, 20.0)).unwrap();
        let point = map.pixel_to_map(50.0, 25.0).unwrap();
        assert_relative_eq!(point.x, 10.0);
        assert_relative_eq!(point.y, 15.0);

        let pixel = map.map_to_pixel(point.x, point.y).unwrap();
        assert_relative_eq!(pixel.x, 50.0);
        assert_relative_eq!(pixel.y, 25.0);
        assert_relative_eq!(map.scale().unwrap(), 0.2);
    }

    #[test]
    fn query_points() {
        let mut map = test_map();
        map.zoom_all().unwrap();

        let both = map.query_map_point(7.0, 7.0, &QueryOptions::default()).unwrap();
        let names: Vec<_> = both.iter().map(|r| r.layer.as_str()).collect();
        assert_eq!(names, ["a", "b"]);
        assert_eq!(both[0].features[0].id(), 1);

        let only_b = map
            .query_map_point(7.0, 7.0, &QueryOptions::layer("b"))
            .unwrap();
        assert_eq!(only_b.len(), 1);
        assert_eq!(only_b[0].index, 1);

        assert!(map
            .query_map_point(50.0, 50.0, &QueryOptions::default())
            .unwrap()
            .is_empty());
        assert_matches!(
            map.query_map_point(7.0, 7.0, &QueryOptions::layer("c")),
            Err(MapError::NotFound(_))
        );

        let by_pixel = map.query_point(10.0, 90.0, &QueryOptions::default()).unwrap();
        assert_eq!(by_pixel.len(), 1);
        assert_eq!(by_pixel[0].layer, "a");
    }

    #[test]
    fn mosaic_matches_single_render() {
        let mut map = Map::with_srs(256, 256, WEB_MERCATOR_SRS).unwrap();
        map.add_style("dots", Style::new(MarkerSymbolizer::new(Color::RED, 20.0)))
            .unwrap();
        // centers of the top-left and bottom-right quadrants of the world
        let quarter = 10018754.1713935;
        map.add_layer(
            Layer::with_srs("points", WEB_MERCATOR_SRS)
                .unwrap()
                .with_style("dots")
                .with_datasource(Datasource::memory(vec![
                    Feature::new(1).with_geometry(Point2::new(-quarter, quarter)),
                    Feature::new(2).with_geometry(Point2::new(quarter, -quarter)),
                ])),
        )
        .unwrap();

        let grid = TileGrid::web_mercator(128);
        let mosaic = map
            .render_mosaic(&grid, 1, (0, 0), (1, 1), &RenderOptions::default())
            .unwrap();
        assert_eq!((mosaic.width(), mosaic.height()), (256, 256));

        map.zoom_to_box(grid.bounds()).unwrap();
        let mut single = Image::new(256, 256).unwrap();
        map.render(&mut single, &RenderOptions::default()).unwrap();

        assert!(mosaic.painted());
        assert_eq!(mosaic.get_pixel(64, 64), single.get_pixel(64, 64));
        assert_eq!(mosaic.get_pixel(64, 64).map(|c| c.a()), Some(255));
        assert_eq!(mosaic.get_pixel(192, 192).map(|c| c.a()), Some(255));
    }

    #[test]
    fn describe_map() {
        let map = test_map();
        let description = serde_json::to_value(map.describe()).unwrap();
        assert_eq!(description["layers"], serde_json::json!(["a", "b"]));
        assert_eq!(description["width"], 100);
    }
}
