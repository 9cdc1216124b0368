use std::collections::BTreeMap;
use std::sync::Arc;

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::GeometryType;
use serde::{Deserialize, Serialize};

use crate::datasource::options::DatasourceOptions;
use crate::error::MapError;
use crate::feature::{Feature, Featureset};

/// Spatial filter for feature requests.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Query {
    /// Features whose bounding box intersects this box are returned.
    pub extent: Rect,
}

impl Query {
    /// Query for a box.
    pub fn new(extent: Rect) -> Self {
        Self { extent }
    }

    /// Query for a point with the given search radius.
    pub fn point(point: Point2, tolerance: f64) -> Self {
        Self {
            extent: Rect::from_point(&point).expand(tolerance, tolerance),
        }
    }
}

/// Kind of data a datasource provides.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasourceKind {
    /// Features with geometries.
    Vector,
    /// Raster images.
    Raster,
}

/// Geometry type reported by a datasource description.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DescribedGeometry {
    /// Points only.
    Point,
    /// Lines only.
    Linestring,
    /// Polygons only.
    Polygon,
    /// Mixed geometry types.
    Collection,
}

impl From<GeometryType> for DescribedGeometry {
    fn from(value: GeometryType) -> Self {
        match value {
            GeometryType::Point => Self::Point,
            GeometryType::LineString => Self::Linestring,
            GeometryType::Polygon => Self::Polygon,
        }
    }
}

/// Source of features behind a [`Datasource`](super::Datasource).
///
/// Every call to [`FeatureProvider::featureset`] must start from the first feature, and the
/// order of features must be the same for unchanged data.
pub trait FeatureProvider: Send + Sync {
    /// All features.
    fn featureset(&self) -> Result<Featureset<'_>, MapError>;

    /// Features matching the query.
    fn features(&self, query: &Query) -> Result<Featureset<'_>, MapError> {
        Ok(self.featureset()?.filter_extent(query.extent))
    }

    /// Extent of all features. The default implementation iterates over all of them.
    fn extent(&self) -> Result<Option<Rect>, MapError> {
        Ok(Rect::union_all(
            self.featureset()?.filter_map(|feature| feature.extent()),
        ))
    }

    /// Kind of the provided data.
    fn kind(&self) -> DatasourceKind {
        DatasourceKind::Vector
    }

    /// Attribute names with type names. The default implementation scans all features and
    /// takes the type of the first non-null value of every attribute.
    fn fields(&self) -> Result<BTreeMap<String, String>, MapError> {
        let mut fields = BTreeMap::new();
        for feature in self.featureset()? {
            for (name, value) in feature.attributes() {
                let entry = fields
                    .entry(name.clone())
                    .or_insert_with(|| value.type_name().to_string());
                if *entry == "Null" {
                    *entry = value.type_name().to_string();
                }
            }
        }

        Ok(fields)
    }

    /// Common geometry type of all features.
    fn geometry_type(&self) -> Result<Option<DescribedGeometry>, MapError> {
        let mut result: Option<DescribedGeometry> = None;
        for feature in self.featureset()? {
            for geometry in feature.geometries() {
                let current = DescribedGeometry::from(geometry.geometry_type());
                match result {
                    None => result = Some(current),
                    Some(existing) if existing != current => {
                        return Ok(Some(DescribedGeometry::Collection))
                    }
                    Some(_) => {}
                }
            }
        }

        Ok(result)
    }
}

/// Creates a provider for options of a datasource type handled by a plugin.
pub type ProviderFactory =
    Arc<dyn Fn(&DatasourceOptions) -> Result<Box<dyn FeatureProvider>, MapError> + Send + Sync>;

/// Features stored in memory, in insertion order.
#[derive(Debug, Default, Clone)]
pub struct MemoryProvider {
    features: Vec<Feature>,
}

impl MemoryProvider {
    /// Creates a provider with the given features.
    pub fn new(features: Vec<Feature>) -> Self {
        Self { features }
    }

    /// Appends a feature.
    pub fn push(&mut self, feature: Feature) {
        self.features.push(feature);
    }

    /// Stored features.
    pub fn stored_features(&self) -> &[Feature] {
        &self.features
    }
}

impl FeatureProvider for MemoryProvider {
    fn featureset(&self) -> Result<Featureset<'_>, MapError> {
        Ok(Featureset::new(self.features.iter().cloned()))
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Polygon;

    use super::*;

    fn provider() -> MemoryProvider {
        MemoryProvider::new(vec![
            Feature::new(1)
                .with_geometry(Point2::new(0.0, 0.0))
                .with_attribute("name", "a"),
            Feature::new(2)
                .with_geometry(Point2::new(4.0, 3.0))
                .with_attribute("pop", 3i64),
        ])
    }

    #[test]
    fn default_extent_and_fields() {
        let provider = provider();
        assert_eq!(
            provider.extent().unwrap(),
            Some(Rect::new(0.0, 0.0, 4.0, 3.0))
        );

        let fields = provider.fields().unwrap();
        assert_eq!(fields["name"], "String");
        assert_eq!(fields["pop"], "Number");
        assert_eq!(
            provider.geometry_type().unwrap(),
            Some(DescribedGeometry::Point)
        );
    }

    #[test]
    fn mixed_geometries() {
        let mut provider = provider();
        provider.push(Feature::new(3).with_geometry(Polygon::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(1.0, 0.0),
                Point2::new(1.0, 1.0),
            ],
            vec![],
        )));
        assert_eq!(
            provider.geometry_type().unwrap(),
            Some(DescribedGeometry::Collection)
        );
        let ids: Vec<i64> = provider.stored_features().iter().map(|f| f.id()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn point_query() {
        let provider = provider();
        let ids: Vec<i64> = provider
            .features(&Query::point(Point2::new(4.5, 3.0), 1.0))
            .unwrap()
            .map(|f| f.id())
            .collect();
        assert_eq!(ids, vec![2]);
    }
}
