//! Vector geometries produced by datasources.

use serde::{Deserialize, Serialize};

use crate::cartesian::{Point2, Rect};
use crate::geo::ProjTransform;
use crate::TypesError;

/// Kind of a [`Geometry`]. The numeric codes are the ones used by WKB.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GeometryType {
    /// Single point.
    Point = 1,
    /// Open polyline.
    LineString = 2,
    /// Polygon with optional holes.
    Polygon = 3,
}

impl GeometryType {
    /// Numeric code of the type.
    pub fn code(&self) -> u32 {
        *self as u32
    }

    /// Lowercase name, as used in datasource descriptions.
    pub fn name(&self) -> &'static str {
        match self {
            GeometryType::Point => "point",
            GeometryType::LineString => "linestring",
            GeometryType::Polygon => "polygon",
        }
    }
}

/// Polygon given by an outer ring and any number of holes. Rings are stored without repeating
/// the first point at the end.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Polygon {
    /// Outer boundary.
    pub outer: Vec<Point2>,
    /// Holes.
    pub inner: Vec<Vec<Point2>>,
}

impl Polygon {
    /// Creates a polygon. A closing point equal to the first one is dropped from every ring.
    pub fn new(outer: Vec<Point2>, inner: Vec<Vec<Point2>>) -> Self {
        Self {
            outer: open_ring(outer),
            inner: inner.into_iter().map(open_ring).collect(),
        }
    }

    /// Iterates over the outer ring and then the holes.
    pub fn rings(&self) -> impl Iterator<Item = &[Point2]> {
        std::iter::once(self.outer.as_slice()).chain(self.inner.iter().map(|r| r.as_slice()))
    }

    /// Even-odd containment test over all rings.
    pub fn contains(&self, point: &Point2) -> bool {
        let mut inside = false;
        for ring in self.rings() {
            if ring_contains(ring, point) {
                inside = !inside;
            }
        }

        inside
    }
}

fn open_ring(mut ring: Vec<Point2>) -> Vec<Point2> {
    if ring.len() > 1 && ring.first() == ring.last() {
        ring.pop();
    }
    ring
}

fn ring_contains(ring: &[Point2], point: &Point2) -> bool {
    let mut inside = false;
    let mut j = ring.len().wrapping_sub(1);
    for i in 0..ring.len() {
        let (a, b) = (ring[i], ring[j]);
        if (a.y > point.y) != (b.y > point.y)
            && point.x < (b.x - a.x) * (point.y - a.y) / (b.y - a.y) + a.x
        {
            inside = !inside;
        }
        j = i;
    }

    inside
}

fn map_ring<E>(
    ring: &[Point2],
    f: &mut impl FnMut(&Point2) -> Result<Point2, E>,
) -> Result<Vec<Point2>, E> {
    ring.iter().map(f).collect()
}

/// Geometry of a feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Geometry {
    /// Single point.
    Point(Point2),
    /// Polyline.
    LineString(Vec<Point2>),
    /// Polygon with holes.
    Polygon(Polygon),
}

impl Geometry {
    /// Kind of the geometry.
    pub fn geometry_type(&self) -> GeometryType {
        match self {
            Geometry::Point(_) => GeometryType::Point,
            Geometry::LineString(_) => GeometryType::LineString,
            Geometry::Polygon(_) => GeometryType::Polygon,
        }
    }

    /// Bounding box, `None` for empty lines and polygons.
    pub fn extent(&self) -> Option<Rect> {
        match self {
            Geometry::Point(p) => Some(Rect::from_point(p)),
            Geometry::LineString(points) => Rect::from_points(points.iter()),
            Geometry::Polygon(polygon) => Rect::from_points(polygon.outer.iter()),
        }
    }

    /// Applies `f` to every vertex, producing a new geometry of the same kind.
    pub fn try_map_points<E>(
        &self,
        mut f: impl FnMut(&Point2) -> Result<Point2, E>,
    ) -> Result<Geometry, E> {
        Ok(match self {
            Geometry::Point(p) => Geometry::Point(f(p)?),
            Geometry::LineString(points) => Geometry::LineString(map_ring(points, &mut f)?),
            Geometry::Polygon(polygon) => {
                let outer = map_ring(&polygon.outer, &mut f)?;
                let mut inner = Vec::with_capacity(polygon.inner.len());
                for ring in &polygon.inner {
                    inner.push(map_ring(ring, &mut f)?);
                }
                Geometry::Polygon(Polygon { outer, inner })
            }
        })
    }

    /// Reprojects the geometry with the forward direction of the transform. Latitudes outside
    /// of the destination domain (the poles in Mercator) are clamped to its edge.
    pub fn project(&self, transform: &ProjTransform) -> Result<Geometry, TypesError> {
        if transform.is_identity() {
            return Ok(self.clone());
        }

        self.try_map_points(|p| transform.forward_point_clamped(p))
    }

    /// Returns the geometry in Well-Known Text.
    pub fn to_wkt(&self) -> String {
        crate::wkt::write(self)
    }
}

impl From<Point2> for Geometry {
    fn from(value: Point2) -> Self {
        Self::Point(value)
    }
}

impl From<Polygon> for Geometry {
    fn from(value: Polygon) -> Self {
        Self::Polygon(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn square_with_hole() -> Polygon {
        Polygon::new(
            vec![
                Point2::new(0.0, 0.0),
                Point2::new(10.0, 0.0),
                Point2::new(10.0, 10.0),
                Point2::new(0.0, 10.0),
                Point2::new(0.0, 0.0),
            ],
            vec![vec![
                Point2::new(4.0, 4.0),
                Point2::new(6.0, 4.0),
                Point2::new(6.0, 6.0),
                Point2::new(4.0, 6.0),
            ]],
        )
    }

    #[test]
    fn closing_point_is_dropped() {
        assert_eq!(square_with_hole().outer.len(), 4);
    }

    #[test]
    fn polygon_contains() {
        let polygon = square_with_hole();
        assert!(polygon.contains(&Point2::new(1.0, 1.0)));
        assert!(!polygon.contains(&Point2::new(5.0, 5.0)));
        assert!(!polygon.contains(&Point2::new(11.0, 5.0)));
    }

    #[test]
    fn polar_polygon_into_mercator() {
        let transform = ProjTransform::new(
            crate::geo::Projection::new(crate::geo::WGS84_SRS).unwrap(),
            crate::geo::Projection::new(crate::geo::WEB_MERCATOR_SRS).unwrap(),
        );
        let antarctica = Geometry::from(Polygon::new(
            vec![
                Point2::new(-180.0, -90.0),
                Point2::new(180.0, -90.0),
                Point2::new(180.0, -60.0),
                Point2::new(-180.0, -60.0),
            ],
            vec![],
        ));

        let projected = antarctica.project(&transform).unwrap();
        let extent = projected.extent().unwrap();
        assert!((extent.y_min() + 20037508.342789244).abs() < 1e-3);
        assert!(extent.y_max() < -8.0e6);
    }

    #[test]
    fn extent() {
        let line = Geometry::LineString(vec![Point2::new(1.0, 5.0), Point2::new(-3.0, 2.0)]);
        assert_eq!(line.extent(), Some(Rect::new(-3.0, 2.0, 1.0, 5.0)));
        assert_eq!(Geometry::LineString(vec![]).extent(), None);
        assert_eq!(
            Geometry::from(square_with_hole()).extent(),
            Some(Rect::new(0.0, 0.0, 10.0, 10.0))
        );
        assert_eq!(Geometry::Point(Point2::new(1.0, 2.0)).geometry_type().code(), 1);
    }
}
