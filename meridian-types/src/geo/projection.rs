use std::f64::consts::{FRAC_PI_2, FRAC_PI_4};

use crate::cartesian::{Point2, Rect};
use crate::geo::crs::{Crs, ProjectionType};
use crate::TypesError;

/// Largest latitude that Mercator boxes are clamped to.
pub const MERCATOR_MAX_LATITUDE: f64 = 85.0511287798066;

const INVERSE_TOLERANCE: f64 = 1e-12;
const INVERSE_MAX_ITERATIONS: usize = 16;

/// Transformation between geographic coordinates (longitude and latitude in degrees) and the
/// coordinates of a [`Crs`].
///
/// The definition is validated when the projection is created, so the transform functions
/// fail only for coordinates the projection cannot represent.
///
/// ```
/// use meridian_types::geo::Projection;
///
/// let merc = Projection::new("+init=epsg:3857").unwrap();
/// let projected = merc.forward(&[-122.33517, 47.63752]).unwrap();
/// assert!((projected[0] - -13618288.8305).abs() < 1e-3);
/// assert!((projected[1] - 6046761.54747).abs() < 1e-3);
/// ```
#[derive(Debug, Clone, PartialEq)]
pub struct Projection {
    crs: Crs,
}

impl Projection {
    /// Parses the definition. Fails with [`TypesError::InvalidCrs`] if it cannot be parsed.
    pub fn new(srs: &str) -> Result<Self, TypesError> {
        Ok(Self {
            crs: Crs::parse(srs)?,
        })
    }

    /// Projection for an already parsed system.
    pub fn from_crs(crs: Crs) -> Self {
        Self { crs }
    }

    /// The coordinate system.
    pub fn crs(&self) -> &Crs {
        &self.crs
    }

    /// Definition string.
    pub fn srs(&self) -> &str {
        self.crs.definition()
    }

    /// Returns true if the coordinates of this projection are geographic.
    pub fn is_geographic(&self) -> bool {
        self.crs.is_geographic()
    }

    /// Projects a geographic point into the coordinates of the system.
    pub fn forward_point(&self, point: &Point2) -> Result<Point2, TypesError> {
        let crs = &self.crs;
        let a = crs.datum.semimajor() * crs.k_0;
        let lon = (point.x - crs.lon_0).to_radians();
        let lat = point.y.to_radians();

        let result = match crs.projection_type {
            ProjectionType::LongLat => *point,
            ProjectionType::Mercator => {
                if point.y.abs() >= 90.0 {
                    return Err(TypesError::InvalidCoordinates(format!(
                        "latitude {} cannot be projected into Mercator",
                        point.y
                    )));
                }
                let e = crs.datum.eccentricity();
                let k = mercator_scale(crs);
                let y = if e == 0.0 {
                    (FRAC_PI_4 + lat / 2.0).tan().ln()
                } else {
                    let es = e * lat.sin();
                    ((FRAC_PI_4 + lat / 2.0).tan() * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).ln()
                };
                Point2::new(a * k * lon + crs.x_0, a * k * y + crs.y_0)
            }
            ProjectionType::Equirectangular => Point2::new(
                a * lon * crs.lat_ts.to_radians().cos() + crs.x_0,
                a * lat + crs.y_0,
            ),
        };

        finite(result, point)
    }

    /// Converts a point in the coordinates of the system into geographic coordinates.
    pub fn inverse_point(&self, point: &Point2) -> Result<Point2, TypesError> {
        let crs = &self.crs;
        let a = crs.datum.semimajor() * crs.k_0;

        let result = match crs.projection_type {
            ProjectionType::LongLat => *point,
            ProjectionType::Mercator => {
                let k = mercator_scale(crs);
                let lon = (point.x - crs.x_0) / (a * k);
                let t = (-(point.y - crs.y_0) / (a * k)).exp();
                let e = crs.datum.eccentricity();
                let mut lat = FRAC_PI_2 - 2.0 * t.atan();
                if e != 0.0 {
                    for _ in 0..INVERSE_MAX_ITERATIONS {
                        let es = e * lat.sin();
                        let next =
                            FRAC_PI_2 - 2.0 * (t * ((1.0 - es) / (1.0 + es)).powf(e / 2.0)).atan();
                        let delta = (next - lat).abs();
                        lat = next;
                        if delta < INVERSE_TOLERANCE {
                            break;
                        }
                    }
                }
                Point2::new(lon.to_degrees() + crs.lon_0, lat.to_degrees())
            }
            ProjectionType::Equirectangular => {
                let lon = (point.x - crs.x_0) / (a * crs.lat_ts.to_radians().cos());
                let lat = (point.y - crs.y_0) / a;
                Point2::new(lon.to_degrees() + crs.lon_0, lat.to_degrees())
            }
        };

        finite(result, point)
    }

    /// Projects a geographic box. Latitudes are clamped to the range the projection can
    /// represent, so the whole world box can be projected into Mercator.
    pub fn forward_rect(&self, rect: &Rect) -> Result<Rect, TypesError> {
        let points = rect
            .boundary_samples()
            .iter()
            .map(|p| self.forward_point(&self.clamp_geographic(p)))
            .collect::<Result<Vec<_>, _>>()?;
        Rect::from_points(points.iter())
            .ok_or_else(|| TypesError::InvalidCoordinates("empty box".into()))
    }

    /// Converts a box in the coordinates of the system into a geographic box.
    pub fn inverse_rect(&self, rect: &Rect) -> Result<Rect, TypesError> {
        let points = rect
            .boundary_samples()
            .iter()
            .map(|p| self.inverse_point(p))
            .collect::<Result<Vec<_>, _>>()?;
        Rect::from_points(points.iter())
            .ok_or_else(|| TypesError::InvalidCoordinates("empty box".into()))
    }

    /// Projects either a point (`[x, y]`) or a box (`[x_min, y_min, x_max, y_max]`).
    pub fn forward(&self, coords: &[f64]) -> Result<Vec<f64>, TypesError> {
        transform_slice(coords, |p| self.forward_point(p), |r| self.forward_rect(r))
    }

    /// Inverse of [`Projection::forward`] for points and boxes.
    pub fn inverse(&self, coords: &[f64]) -> Result<Vec<f64>, TypesError> {
        transform_slice(coords, |p| self.inverse_point(p), |r| self.inverse_rect(r))
    }

    /// Clamps a geographic point into the valid domain of the projection.
    pub fn clamp_geographic(&self, point: &Point2) -> Point2 {
        match self.crs.projection_type {
            ProjectionType::Mercator => Point2::new(
                point.x,
                point.y.clamp(-MERCATOR_MAX_LATITUDE, MERCATOR_MAX_LATITUDE),
            ),
            _ => *point,
        }
    }
}

fn mercator_scale(crs: &Crs) -> f64 {
    let lat_ts = crs.lat_ts.to_radians();
    let e = crs.datum.eccentricity();
    lat_ts.cos() / (1.0 - e * e * lat_ts.sin().powi(2)).sqrt()
}

fn finite(result: Point2, input: &Point2) -> Result<Point2, TypesError> {
    if result.x.is_finite() && result.y.is_finite() {
        Ok(result)
    } else {
        Err(TypesError::InvalidCoordinates(format!(
            "point ({}, {}) cannot be transformed",
            input.x, input.y
        )))
    }
}

pub(crate) fn transform_slice(
    coords: &[f64],
    point: impl Fn(&Point2) -> Result<Point2, TypesError>,
    rect: impl Fn(&Rect) -> Result<Rect, TypesError>,
) -> Result<Vec<f64>, TypesError> {
    match coords {
        [x, y] => {
            let p = point(&Point2::new(*x, *y))?;
            Ok(vec![p.x, p.y])
        }
        [_, _, _, _] => Ok(rect(&Rect::from_slice(coords)?)?.to_array().to_vec()),
        _ => Err(TypesError::InvalidCoordinates(format!(
            "expected 2 or 4 numbers, got {}",
            coords.len()
        ))),
    }
}
