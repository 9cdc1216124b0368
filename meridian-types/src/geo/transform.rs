use crate::cartesian::{Point2, Rect};
use crate::geo::projection::{transform_slice, Projection};
use crate::TypesError;

/// Transformation from the coordinates of one projection (`source`) into another (`dest`).
///
/// `forward` maps source coordinates into destination coordinates through geographic
/// coordinates, `backward` is its inverse. When both projections describe the same system
/// the transform is an identity and coordinates are passed through unchanged.
///
/// ```
/// use meridian_types::geo::{Projection, ProjTransform};
///
/// let from = Projection::new("+init=epsg:4326").unwrap();
/// let to = Projection::new("+init=epsg:3857").unwrap();
/// let transform = ProjTransform::new(from, to);
///
/// let merc = transform.forward(&[-122.33517, 47.63752]).unwrap();
/// let lon_lat = transform.backward(&merc).unwrap();
/// assert!((lon_lat[0] - -122.33517).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct ProjTransform {
    source: Projection,
    dest: Projection,
    is_identity: bool,
}

impl ProjTransform {
    /// Creates a new transform.
    pub fn new(source: Projection, dest: Projection) -> Self {
        let is_identity = source.crs() == dest.crs();
        Self {
            source,
            dest,
            is_identity,
        }
    }

    /// Source projection.
    pub fn source(&self) -> &Projection {
        &self.source
    }

    /// Destination projection.
    pub fn dest(&self) -> &Projection {
        &self.dest
    }

    /// Returns true if the transform does not change coordinates.
    pub fn is_identity(&self) -> bool {
        self.is_identity
    }

    /// Transform with source and destination swapped.
    pub fn inverted(&self) -> Self {
        Self {
            source: self.dest.clone(),
            dest: self.source.clone(),
            is_identity: self.is_identity,
        }
    }

    /// Transforms a point from source into destination coordinates.
    pub fn forward_point(&self, point: &Point2) -> Result<Point2, TypesError> {
        if self.is_identity {
            return Ok(*point);
        }

        let geo = self.source.inverse_point(point)?;
        self.dest.forward_point(&geo)
    }

    /// Same as [`ProjTransform::forward_point`], but geographic latitudes are first clamped to
    /// the range the destination can represent. Used for geometry vertices, where a pole in
    /// the data must not make the whole geometry fail.
    pub fn forward_point_clamped(&self, point: &Point2) -> Result<Point2, TypesError> {
        if self.is_identity {
            return Ok(*point);
        }

        let geo = self.source.inverse_point(point)?;
        self.dest.forward_point(&self.dest.clamp_geographic(&geo))
    }

    /// Transforms a point from destination into source coordinates.
    pub fn backward_point(&self, point: &Point2) -> Result<Point2, TypesError> {
        if self.is_identity {
            return Ok(*point);
        }

        let geo = self.dest.inverse_point(point)?;
        self.source.forward_point(&geo)
    }

    /// Transforms a box from source into destination coordinates. See
    /// [`Projection::forward_rect`] for clamping of latitudes.
    pub fn forward_rect(&self, rect: &Rect) -> Result<Rect, TypesError> {
        transform_rect(rect, &self.source, &self.dest, self.is_identity)
    }

    /// Transforms a box from destination into source coordinates.
    pub fn backward_rect(&self, rect: &Rect) -> Result<Rect, TypesError> {
        transform_rect(rect, &self.dest, &self.source, self.is_identity)
    }

    /// Transforms a point or a box given as a slice of 2 or 4 numbers.
    pub fn forward(&self, coords: &[f64]) -> Result<Vec<f64>, TypesError> {
        transform_slice(coords, |p| self.forward_point(p), |r| self.forward_rect(r))
    }

    /// Inverse of [`ProjTransform::forward`].
    pub fn backward(&self, coords: &[f64]) -> Result<Vec<f64>, TypesError> {
        transform_slice(coords, |p| self.backward_point(p), |r| self.backward_rect(r))
    }
}

fn transform_rect(
    rect: &Rect,
    from: &Projection,
    to: &Projection,
    is_identity: bool,
) -> Result<Rect, TypesError> {
    if is_identity {
        return Ok(*rect);
    }

    let points = rect
        .boundary_samples()
        .iter()
        .map(|p| {
            let geo = from.inverse_point(p)?;
            to.forward_point(&to.clamp_geographic(&geo))
        })
        .collect::<Result<Vec<_>, _>>()?;

    Rect::from_points(points.iter())
        .ok_or_else(|| TypesError::InvalidCoordinates("empty box".into()))
}

#[cfg(test)]
mod tests {
    use approx::assert_relative_eq;

    use super::*;

    const DEFINITIONS: [&str; 5] = [
        "+init=epsg:4326",
        "+init=epsg:3857",
        "+proj=merc +ellps=WGS84 +lat_ts=10 +units=m",
        "+proj=eqc +lat_ts=30 +lon_0=15 +x_0=1000",
        "+proj=merc +a=6378137 +b=6356752.314245 +lon_0=-60 +y_0=-500",
    ];

    fn assert_roundtrip(transform: &ProjTransform, p: Point2) {
        let forward = transform.forward_point(&p).unwrap();
        let back = transform.backward_point(&forward).unwrap();
        assert_relative_eq!(back.x, p.x, max_relative = 1e-6, epsilon = 1e-7);
        assert_relative_eq!(back.y, p.y, max_relative = 1e-6, epsilon = 1e-7);
    }

    #[test]
    fn roundtrip_all_pairs() {
        let geo_points = [
            Point2::new(0.0, 0.0),
            Point2::new(-122.33517, 47.63752),
            Point2::new(151.2, -33.86),
            Point2::new(-17.5, 80.0),
        ];

        for from in DEFINITIONS {
            for to in DEFINITIONS {
                let source = Projection::new(from).unwrap();
                let transform = ProjTransform::new(source.clone(), Projection::new(to).unwrap());
                for geo in geo_points {
                    let p = source.forward_point(&geo).unwrap();
                    assert_roundtrip(&transform, p);
                }
            }
        }
    }

    #[test]
    fn same_crs_is_identity() {
        let transform = ProjTransform::new(
            Projection::new("+init=epsg:3857").unwrap(),
            Projection::new(crate::geo::WEB_MERCATOR_SRS).unwrap(),
        );
        assert!(transform.is_identity());
        assert_eq!(
            transform.forward(&[1e9, -1e9]).unwrap(),
            vec![1e9, -1e9]
        );
    }

    #[test]
    fn poles_are_clamped_for_vertices() {
        let transform = ProjTransform::new(
            Projection::new("epsg:4326").unwrap(),
            Projection::new("epsg:3857").unwrap(),
        );
        assert!(transform.forward_point(&Point2::new(0.0, -90.0)).is_err());

        let south = transform
            .forward_point_clamped(&Point2::new(10.0, -90.0))
            .unwrap();
        assert_relative_eq!(south.y, -20037508.342789244, epsilon = 1e-3);
        assert_relative_eq!(south.x, 1113194.9079327357, epsilon = 1e-6);
    }

    #[test]
    fn world_box_into_mercator() {
        let transform = ProjTransform::new(
            Projection::new("epsg:4326").unwrap(),
            Projection::new("epsg:3857").unwrap(),
        );
        let world = transform.forward(&[-180.0, -90.0, 180.0, 90.0]).unwrap();
        assert_relative_eq!(world[0], -20037508.342789244, epsilon = 1e-3);
        assert_relative_eq!(world[3], 20037508.342789244, epsilon = 1e-3);

        let back = transform.backward(&world).unwrap();
        assert_relative_eq!(back[0], -180.0, epsilon = 1e-9);
        assert_relative_eq!(back[3], 85.0511287798066, epsilon = 1e-9);
    }
}
