use meridian_types::cartesian::Rect;
use meridian_types::geo::WGS84_SRS;

use super::{Map, MapParameters};
use crate::color::Color;
use crate::error::MapError;
use crate::layer::Layer;
use crate::style::Style;

const DEFAULT_SIZE: u32 = 256;

/// Builder of a [`Map`].
///
/// ```
/// use meridian::map::MapBuilder;
/// use meridian::{Color, Layer, PolygonSymbolizer, Style};
/// use meridian_types::cartesian::Rect;
///
/// let map = MapBuilder::new()
///     .with_size(600, 400)
///     .with_background(Color::WHITE)
///     .with_style("fill", Style::new(PolygonSymbolizer::new(Color::GREEN)))
///     .with_layer(Layer::new("countries").with_style("fill"))
///     .with_extent(Rect::new(-180.0, -90.0, 180.0, 90.0))
///     .build()
///     .unwrap();
///
/// assert_eq!(map.width(), 600);
/// assert_eq!(map.layers().len(), 1);
/// assert_eq!(map.background(), Some(Color::WHITE));
/// ```
#[derive(Default)]
pub struct MapBuilder {
    size: Option<(u32, u32)>,
    srs: Option<String>,
    background: Option<Color>,
    buffer_size: Option<u32>,
    extent: Option<Rect>,
    maximum_extent: Option<Rect>,
    parameters: MapParameters,
    styles: Vec<(String, Style)>,
    layers: Vec<Layer>,
}

impl MapBuilder {
    /// Builder of a 256x256 map in WGS84 longitude/latitude.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the map size in pixels.
    pub fn with_size(mut self, width: u32, height: u32) -> Self {
        self.size = Some((width, height));
        self
    }

    /// Sets the spatial reference of the map.
    pub fn with_srs(mut self, srs: impl Into<String>) -> Self {
        self.srs = Some(srs.into());
        self
    }

    /// Sets the background color.
    pub fn with_background(mut self, background: Color) -> Self {
        self.background = Some(background);
        self
    }

    /// Sets the buffer size in pixels.
    pub fn with_buffer_size(mut self, buffer_size: u32) -> Self {
        self.buffer_size = Some(buffer_size);
        self
    }

    /// Sets the initial extent. Without it the map is zoomed to all layers.
    pub fn with_extent(mut self, extent: Rect) -> Self {
        self.extent = Some(extent);
        self
    }

    /// Sets the maximum extent.
    pub fn with_maximum_extent(mut self, maximum_extent: Rect) -> Self {
        self.maximum_extent = Some(maximum_extent);
        self
    }

    /// Adds a free-form parameter.
    pub fn with_parameter(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.parameters.insert(key.into(), value.into());
        self
    }

    /// Adds a named style.
    pub fn with_style(mut self, name: impl Into<String>, style: Style) -> Self {
        self.styles.push((name.into(), style));
        self
    }

    /// Adds a layer on top of the previously added ones.
    pub fn with_layer(mut self, layer: Layer) -> Self {
        self.layers.push(layer);
        self
    }

    /// Creates the map, validating all the given values.
    pub fn build(self) -> Result<Map, MapError> {
        let MapBuilder {
            size,
            srs,
            background,
            buffer_size,
            extent,
            maximum_extent,
            parameters,
            styles,
            layers,
        } = self;

        let (width, height) = size.unwrap_or((DEFAULT_SIZE, DEFAULT_SIZE));
        let mut map = Map::with_srs(width, height, srs.as_deref().unwrap_or(WGS84_SRS))?;
        map.set_background(background);
        map.set_buffer_size(buffer_size.unwrap_or_default());
        map.set_maximum_extent(maximum_extent)?;
        *map.parameters_mut() = parameters;

        for (name, style) in styles {
            map.add_style(name, style)?;
        }

        for layer in layers {
            map.add_layer(layer)?;
        }

        match extent {
            Some(extent) => map.zoom_to_box(extent)?,
            None => map.zoom_all()?,
        }

        Ok(map)
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use meridian_types::geo::WEB_MERCATOR_SRS;

    use super::*;

    #[test]
    fn constructs_map_with_default_parameters() {
        let map = MapBuilder::default().build().unwrap();

        assert_eq!((map.width(), map.height()), (DEFAULT_SIZE, DEFAULT_SIZE));
        assert_eq!(map.srs(), WGS84_SRS);
        assert_eq!(map.extent(), None);
        assert_eq!(map.background(), None);
        assert!(map.layers().is_empty());
        assert!(map.styles().is_empty());
    }

    #[test]
    fn with_srs_sets_projection() {
        let map = MapBuilder::new()
            .with_srs(WEB_MERCATOR_SRS)
            .build()
            .unwrap();
        assert!(!map.projection().is_geographic());
    }

    #[test]
    fn invalid_values_fail() {
        assert_matches!(
            MapBuilder::new().with_size(8, 8).build(),
            Err(MapError::InvalidDimensions { .. })
        );
        assert_matches!(
            MapBuilder::new()
                .with_layer(Layer::new("a"))
                .with_layer(Layer::new("a"))
                .build(),
            Err(MapError::DuplicateName(_))
        );
        assert_matches!(
            MapBuilder::new()
                .with_extent(Rect::new(1.0, 1.0, 0.0, 0.0))
                .build(),
            Err(MapError::InvalidExtent(_))
        );
    }

    #[test]
    fn keeps_parameters_and_buffer() {
        let map = MapBuilder::new()
            .with_parameter("attribution", "OSM contributors")
            .with_buffer_size(32)
            .build()
            .unwrap();
        assert_eq!(map.buffer_size(), 32);
        assert_eq!(
            map.parameters().get("attribution").map(String::as_str),
            Some("OSM contributors")
        );
    }
}
