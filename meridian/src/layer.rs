//! Map layers binding a datasource to a spatial reference and a list of styles.

use meridian_types::cartesian::Rect;
use meridian_types::geo::{Crs, Projection};
use serde::{Deserialize, Serialize};

use crate::datasource::{Datasource, Parameters};
use crate::error::MapError;

/// Named container of a datasource.
///
/// The spatial reference of the layer is the one the coordinates of its datasource are given
/// in. It defaults to WGS84 longitude/latitude.
///
/// ```
/// use meridian::layer::Layer;
///
/// let layer = Layer::with_srs("countries", "+init=epsg:3857").unwrap();
/// assert_eq!(layer.srs(), "+init=epsg:3857");
/// assert!(Layer::with_srs("broken", "+proj=unknown").is_err());
/// ```
#[derive(Debug)]
pub struct Layer {
    name: String,
    projection: Projection,
    styles: Vec<String>,
    datasource: Option<Datasource>,
    active: bool,
    minimum_scale_denominator: f64,
    maximum_scale_denominator: f64,
}

/// Snapshot of layer properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDescription {
    /// Layer name.
    pub name: String,
    /// Spatial reference definition.
    pub srs: String,
    /// Style names.
    pub styles: Vec<String>,
    /// Layer is rendered and queried.
    pub active: bool,
    /// Lower bound of the visible scale range.
    pub minimum_scale_denominator: f64,
    /// Upper bound of the visible scale range.
    pub maximum_scale_denominator: f64,
    /// Parameters of the datasource.
    pub datasource: Option<Parameters>,
}

impl Layer {
    /// Creates an active layer in WGS84 without styles and datasource.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            projection: Projection::from_crs(Crs::wgs84()),
            styles: Vec::new(),
            datasource: None,
            active: true,
            minimum_scale_denominator: 0.0,
            maximum_scale_denominator: f64::INFINITY,
        }
    }

    /// Creates a layer with the given spatial reference.
    pub fn with_srs(name: impl Into<String>, srs: &str) -> Result<Self, MapError> {
        let mut layer = Self::new(name);
        layer.set_srs(srs)?;
        Ok(layer)
    }

    /// Layer name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Renames the layer. Layers owned by a map are renamed through
    /// [`LayerCollection::rename`](crate::map::LayerCollection::rename), which keeps names unique.
    pub(crate) fn set_name(&mut self, name: impl Into<String>) {
        self.name = name.into();
    }

    /// Spatial reference definition.
    pub fn srs(&self) -> &str {
        self.projection.srs()
    }

    /// Changes the spatial reference. The definition is validated immediately.
    pub fn set_srs(&mut self, srs: &str) -> Result<(), MapError> {
        self.projection = Projection::new(srs)?;
        Ok(())
    }

    /// Projection of the layer coordinates.
    pub fn projection(&self) -> &Projection {
        &self.projection
    }

    /// Names of styles the layer is drawn with, in order.
    pub fn styles(&self) -> &[String] {
        &self.styles
    }

    /// Replaces the style names.
    pub fn set_styles(&mut self, styles: Vec<String>) {
        self.styles = styles;
    }

    /// Appends a style name.
    pub fn add_style(&mut self, style: impl Into<String>) {
        self.styles.push(style.into());
    }

    /// Builder-style helper adding a style name.
    pub fn with_style(mut self, style: impl Into<String>) -> Self {
        self.add_style(style);
        self
    }

    /// Datasource of the layer.
    pub fn datasource(&self) -> Option<&Datasource> {
        self.datasource.as_ref()
    }

    /// Replaces the datasource, returning the previous one.
    pub fn set_datasource(&mut self, datasource: Datasource) -> Option<Datasource> {
        self.datasource.replace(datasource)
    }

    /// Builder-style helper setting the datasource.
    pub fn with_datasource(mut self, datasource: Datasource) -> Self {
        self.datasource = Some(datasource);
        self
    }

    /// Returns true if the layer takes part in rendering and queries.
    pub fn active(&self) -> bool {
        self.active
    }

    /// Enables or disables the layer.
    pub fn set_active(&mut self, active: bool) {
        self.active = active;
    }

    /// Lower bound of the visible scale range, `0` by default.
    pub fn minimum_scale_denominator(&self) -> f64 {
        self.minimum_scale_denominator
    }

    /// Upper bound of the visible scale range, unbounded by default.
    pub fn maximum_scale_denominator(&self) -> f64 {
        self.maximum_scale_denominator
    }

    /// Sets the visible scale range.
    pub fn set_scale_range(&mut self, minimum: f64, maximum: f64) {
        self.minimum_scale_denominator = minimum;
        self.maximum_scale_denominator = maximum;
    }

    /// Returns true if the layer is active and the scale is within its visible range.
    pub fn is_visible(&self, scale_denominator: f64) -> bool {
        self.active
            && scale_denominator >= self.minimum_scale_denominator
            && scale_denominator < self.maximum_scale_denominator
    }

    /// Extent of the datasource in the layer spatial reference.
    pub fn extent(&self) -> Result<Option<Rect>, MapError> {
        match &self.datasource {
            Some(datasource) => datasource.extent(),
            None => Ok(None),
        }
    }

    /// Snapshot of the layer properties.
    pub fn describe(&self) -> LayerDescription {
        LayerDescription {
            name: self.name.clone(),
            srs: self.srs().to_string(),
            styles: self.styles.clone(),
            active: self.active,
            minimum_scale_denominator: self.minimum_scale_denominator,
            maximum_scale_denominator: self.maximum_scale_denominator,
            datasource: self.datasource.as_ref().map(|ds| ds.parameters().clone()),
        }
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use meridian_types::cartesian::Point2;

    use super::*;
    use crate::feature::Feature;

    #[test]
    fn default_srs_is_wgs84() {
        let layer = Layer::new("a");
        assert_eq!(layer.srs(), meridian_types::geo::WGS84_SRS);
        assert!(layer.projection().is_geographic());
    }

    #[test]
    fn invalid_srs_is_rejected_eagerly() {
        assert_matches!(
            Layer::with_srs("a", "+proj=foo"),
            Err(MapError::InvalidCrs { .. })
        );
    }

    #[test]
    fn visibility() {
        let mut layer = Layer::new("a");
        assert!(layer.is_visible(1e9));

        layer.set_scale_range(1000.0, 50000.0);
        assert!(!layer.is_visible(999.0));
        assert!(layer.is_visible(1000.0));
        assert!(!layer.is_visible(50000.0));

        layer.set_scale_range(0.0, f64::INFINITY);
        layer.set_active(false);
        assert!(!layer.is_visible(1.0));
    }

    #[test]
    fn describe() {
        let layer = Layer::new("points")
            .with_style("red")
            .with_style("labels")
            .with_datasource(Datasource::memory(vec![
                Feature::new(1).with_geometry(Point2::new(1.0, 2.0))
            ]));

        let description = layer.describe();
        assert_eq!(description.name, "points");
        assert_eq!(description.styles, vec!["red", "labels"]);
        assert_eq!(
            description.datasource.unwrap().get("type").map(String::as_str),
            Some("memory")
        );
        assert_eq!(
            layer.extent().unwrap(),
            Some(Rect::new(1.0, 2.0, 1.0, 2.0))
        );
    }
}
