//! Attributed features produced by datasources.

use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use meridian_types::cartesian::{Point2, Rect};
use meridian_types::geo::ProjTransform;
use meridian_types::Geometry;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::MapError;

const WKB_GEOMETRY_COLLECTION: u32 = 7;

/// Typed attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Value {
    /// Missing value.
    Null,
    /// Boolean.
    Bool(bool),
    /// Integer.
    Integer(i64),
    /// Floating point number.
    Float(f64),
    /// Text.
    String(String),
}

impl Value {
    /// Infers the type of a textual value: empty text is `Null`, then booleans, integers and
    /// floats are tried before falling back to a string.
    pub fn infer(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Value::Null;
        }

        match trimmed {
            "true" | "TRUE" | "True" => return Value::Bool(true),
            "false" | "FALSE" | "False" => return Value::Bool(false),
            _ => {}
        }

        if let Ok(int) = trimmed.parse::<i64>() {
            return Value::Integer(int);
        }

        match trimmed.parse::<f64>() {
            Ok(float) if float.is_finite() => Value::Float(float),
            _ => Value::String(text.to_string()),
        }
    }

    /// Name of the value type as shown in datasource descriptions.
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Null => "Null",
            Value::Bool(_) => "Boolean",
            Value::Integer(_) => "Number",
            Value::Float(_) => "Number",
            Value::String(_) => "String",
        }
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Value::Null => Ok(()),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Integer(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::String(v) => f.write_str(v),
        }
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

/// Vector object with an id, attributes and any number of geometries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feature {
    id: i64,
    attributes: BTreeMap<String, Value>,
    geometries: Vec<Geometry>,
}

impl Feature {
    /// Creates a feature without geometries and attributes.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            attributes: BTreeMap::new(),
            geometries: Vec::new(),
        }
    }

    /// Builder-style helper adding a geometry.
    pub fn with_geometry(mut self, geometry: impl Into<Geometry>) -> Self {
        self.add_geometry(geometry);
        self
    }

    /// Builder-style helper adding an attribute.
    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.attributes.insert(name.into(), value.into());
        self
    }

    /// Feature id.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// Attributes sorted by name.
    pub fn attributes(&self) -> &BTreeMap<String, Value> {
        &self.attributes
    }

    /// Value of a single attribute.
    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.attributes.get(name)
    }

    /// Adds or replaces attributes.
    pub fn add_attributes<K, V>(&mut self, attributes: impl IntoIterator<Item = (K, V)>)
    where
        K: Into<String>,
        V: Into<Value>,
    {
        self.attributes.extend(
            attributes
                .into_iter()
                .map(|(k, v)| (k.into(), v.into())),
        );
    }

    /// Appends a geometry.
    pub fn add_geometry(&mut self, geometry: impl Into<Geometry>) {
        self.geometries.push(geometry.into());
    }

    /// Geometries of the feature.
    pub fn geometries(&self) -> &[Geometry] {
        &self.geometries
    }

    /// Number of geometries.
    pub fn num_geometries(&self) -> usize {
        self.geometries.len()
    }

    /// Union of the bounding boxes of all geometries.
    pub fn extent(&self) -> Option<Rect> {
        Rect::union_all(self.geometries.iter().filter_map(Geometry::extent))
    }

    /// Returns true if the bounding box of the feature intersects the given box.
    pub fn intersects(&self, bbox: &Rect) -> bool {
        self.extent().is_some_and(|extent| extent.intersects(bbox))
    }

    /// Returns true if the bounding box of the feature contains the point.
    pub fn bbox_contains(&self, point: &Point2) -> bool {
        self.extent().is_some_and(|extent| extent.contains(point))
    }

    /// Reprojects all geometries.
    pub fn project(&self, transform: &ProjTransform) -> Result<Feature, MapError> {
        if transform.is_identity() {
            return Ok(self.clone());
        }

        let geometries = self
            .geometries
            .iter()
            .map(|g| g.project(transform))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| MapError::from(err).in_feature(self.id))?;

        Ok(Feature {
            id: self.id,
            attributes: self.attributes.clone(),
            geometries,
        })
    }

    /// GeoJSON representation of the feature.
    pub fn to_json(&self) -> String {
        let geometry = match self.geometries.as_slice() {
            [] => serde_json::Value::Null,
            [single] => geometry_to_json(single),
            many => json!({
                "type": "GeometryCollection",
                "geometries": many.iter().map(geometry_to_json).collect::<Vec<_>>(),
            }),
        };

        json!({
            "type": "Feature",
            "id": self.id,
            "geometry": geometry,
            "properties": self.attributes,
        })
        .to_string()
    }

    /// Well-Known Text of the geometries. Several geometries are written as a
    /// `GEOMETRYCOLLECTION`.
    pub fn to_wkt(&self) -> String {
        match self.geometries.as_slice() {
            [] => "GEOMETRYCOLLECTION EMPTY".to_string(),
            [single] => single.to_wkt(),
            many => {
                let parts: Vec<String> = many.iter().map(Geometry::to_wkt).collect();
                format!("GEOMETRYCOLLECTION({})", parts.join(","))
            }
        }
    }

    /// Little-endian Well-Known Binary of the geometries. Several geometries are written as a
    /// geometry collection.
    pub fn to_wkb(&self) -> Vec<u8> {
        let mut out = Vec::new();
        match self.geometries.as_slice() {
            [single] => write_wkb(&mut out, single),
            many => {
                out.push(1);
                out.extend_from_slice(&WKB_GEOMETRY_COLLECTION.to_le_bytes());
                out.extend_from_slice(&(many.len() as u32).to_le_bytes());
                for geometry in many {
                    write_wkb(&mut out, geometry);
                }
            }
        }
        out
    }
}

impl Display for Feature {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_json())
    }
}

fn closed_ring(ring: &[Point2]) -> impl Iterator<Item = &Point2> {
    ring.iter().chain(ring.first())
}

fn coords<'a>(points: impl Iterator<Item = &'a Point2>) -> Vec<[f64; 2]> {
    points.map(|p| [p.x, p.y]).collect()
}

fn geometry_to_json(geometry: &Geometry) -> serde_json::Value {
    match geometry {
        Geometry::Point(p) => json!({"type": "Point", "coordinates": [p.x, p.y]}),
        Geometry::LineString(points) => {
            json!({"type": "LineString", "coordinates": coords(points.iter())})
        }
        Geometry::Polygon(polygon) => {
            let rings: Vec<_> = polygon
                .rings()
                .map(|ring| coords(closed_ring(ring)))
                .collect();
            json!({"type": "Polygon", "coordinates": rings})
        }
    }
}

fn write_points<'a>(out: &mut Vec<u8>, points: impl ExactSizeIterator<Item = &'a Point2>) {
    out.extend_from_slice(&(points.len() as u32).to_le_bytes());
    for point in points {
        out.extend_from_slice(&point.x.to_le_bytes());
        out.extend_from_slice(&point.y.to_le_bytes());
    }
}

fn write_wkb(out: &mut Vec<u8>, geometry: &Geometry) {
    out.push(1);
    out.extend_from_slice(&geometry.geometry_type().code().to_le_bytes());
    match geometry {
        Geometry::Point(p) => {
            out.extend_from_slice(&p.x.to_le_bytes());
            out.extend_from_slice(&p.y.to_le_bytes());
        }
        Geometry::LineString(points) => write_points(out, points.iter()),
        Geometry::Polygon(polygon) => {
            out.extend_from_slice(&(polygon.rings().count() as u32).to_le_bytes());
            for ring in polygon.rings() {
                let closed: Vec<&Point2> = closed_ring(ring).collect();
                write_points(out, closed.into_iter());
            }
        }
    }
}

/// Finite sequence of features.
///
/// A featureset is consumed by iterating. Datasources hand out a new featureset on every
/// request, starting from the first feature.
pub struct Featureset<'a> {
    features: Box<dyn Iterator<Item = Feature> + 'a>,
}

impl<'a> Featureset<'a> {
    /// Wraps an iterator.
    pub fn new(features: impl Iterator<Item = Feature> + 'a) -> Self {
        Self {
            features: Box::new(features),
        }
    }

    /// Featureset with no features.
    pub fn empty() -> Self {
        Self::new(std::iter::empty())
    }

    /// Keeps only features whose bounding box intersects the given box.
    pub fn filter_extent(self, bbox: Rect) -> Self {
        Self::new(self.features.filter(move |f| f.intersects(&bbox)))
    }
}

impl Featureset<'static> {
    /// Featureset over owned features.
    pub fn from_vec(features: Vec<Feature>) -> Self {
        Self::new(features.into_iter())
    }
}

impl Iterator for Featureset<'_> {
    type Item = Feature;

    fn next(&mut self) -> Option<Self::Item> {
        self.features.next()
    }
}

impl std::fmt::Debug for Featureset<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Featureset").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use meridian_types::Polygon;

    use super::*;

    fn square() -> Polygon {
        Polygon::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(2.0, 0.0),
                Point2::new(2.0, 2.0),
                Point2::new(0.0, 2.0),
            ],
            vec![],
        )
    }

    #[test]
    fn value_inference() {
        assert_eq!(Value::infer("12"), Value::Integer(12));
        assert_eq!(Value::infer("1.5"), Value::Float(1.5));
        assert_eq!(Value::infer("true"), Value::Bool(true));
        assert_eq!(Value::infer(""), Value::Null);
        assert_eq!(Value::infer("Oslo"), Value::String("Oslo".into()));
        assert_eq!(Value::infer("nan"), Value::String("nan".into()));
    }

    #[test]
    fn extent_is_union_of_geometries() {
        let feature = Feature::new(1)
            .with_geometry(square())
            .with_geometry(Point2::new(5.0, -1.0));
        assert_eq!(feature.num_geometries(), 2);
        assert_eq!(feature.extent(), Some(Rect::new(0.0, -1.0, 5.0, 2.0)));
        assert!(feature.intersects(&Rect::new(4.0, -2.0, 6.0, 0.0)));
        assert!(!feature.intersects(&Rect::new(10.0, 10.0, 11.0, 11.0)));
        assert_eq!(Feature::new(2).extent(), None);
    }

    #[test]
    fn json_output() {
        let feature = Feature::new(7)
            .with_geometry(Point2::new(1.0, 2.0))
            .with_attribute("name", "a")
            .with_attribute("pop", 10i64);

        let parsed: serde_json::Value = serde_json::from_str(&feature.to_json()).unwrap();
        assert_eq!(
            parsed,
            json!({
                "type": "Feature",
                "id": 7,
                "geometry": {"type": "Point", "coordinates": [1.0, 2.0]},
                "properties": {"name": "a", "pop": 10},
            })
        );

        let polygon = Feature::new(1).with_geometry(square());
        let parsed: serde_json::Value = serde_json::from_str(&polygon.to_json()).unwrap();
        assert_eq!(parsed["geometry"]["coordinates"][0].as_array().unwrap().len(), 5);
    }

    #[test]
    fn wkt_output() {
        let feature = Feature::new(1).with_geometry(Point2::new(1.0, 2.0));
        assert_eq!(feature.to_wkt(), "POINT(1 2)");

        let collection = feature.clone().with_geometry(Point2::new(3.0, 4.0));
        assert_eq!(collection.to_wkt(), "GEOMETRYCOLLECTION(POINT(1 2),POINT(3 4))");
    }

    #[test]
    fn wkb_output() {
        let point = Feature::new(1).with_geometry(Point2::new(1.0, 2.0)).to_wkb();
        assert_eq!(point.len(), 21);
        assert_eq!(point[0], 1);
        assert_eq!(&point[1..5], &1u32.to_le_bytes());
        assert_eq!(&point[5..13], &1.0f64.to_le_bytes());

        let polygon = Feature::new(1).with_geometry(square()).to_wkb();
        // header, ring count, point count, 5 points
        assert_eq!(polygon.len(), 5 + 4 + 4 + 5 * 16);

        let empty = Feature::new(1).to_wkb();
        assert_eq!(&empty[1..5], &7u32.to_le_bytes());
    }

    #[test]
    fn featureset_filter() {
        let features = vec![
            Feature::new(1).with_geometry(Point2::new(0.0, 0.0)),
            Feature::new(2).with_geometry(Point2::new(10.0, 10.0)),
        ];
        let ids: Vec<i64> = Featureset::from_vec(features)
            .filter_extent(Rect::new(5.0, 5.0, 15.0, 15.0))
            .map(|f| f.id())
            .collect();
        assert_eq!(ids, vec![2]);
    }
}
