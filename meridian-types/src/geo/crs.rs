use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

use crate::geo::datum::Datum;
use crate::TypesError;

/// Proj definition of geographic WGS84 coordinates (EPSG:4326).
pub const WGS84_SRS: &str = "+proj=longlat +ellps=WGS84 +datum=WGS84 +no_defs";

/// Proj definition of spherical (Web) Mercator (EPSG:3857).
pub const WEB_MERCATOR_SRS: &str = "+proj=merc +a=6378137 +b=6378137 +lat_ts=0.0 +lon_0=0.0 +x_0=0.0 +y_0=0.0 +k=1.0 +units=m +nadgrids=@null +wktext +no_defs +over";

/// Family of the map projection used by a [`Crs`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProjectionType {
    /// Geographic coordinates in degrees, no projection.
    LongLat,
    /// Mercator, spherical or ellipsoidal depending on the datum.
    Mercator,
    /// Equidistant cylindrical (plate carrée).
    Equirectangular,
}

/// Parsed coordinate reference system.
///
/// Accepts proj-style definitions (`+proj=merc +a=6378137 ...`), `+init=epsg:NNNN` and the
/// `epsg:NNNN` shorthand for the few EPSG codes that map onto the supported projection types.
/// Two systems are equal when their parameters are equal, regardless of how they were written.
#[derive(Debug, Clone)]
pub struct Crs {
    definition: String,
    pub(crate) projection_type: ProjectionType,
    pub(crate) datum: Datum,
    pub(crate) lon_0: f64,
    pub(crate) lat_ts: f64,
    pub(crate) k_0: f64,
    pub(crate) x_0: f64,
    pub(crate) y_0: f64,
}

impl PartialEq for Crs {
    fn eq(&self, other: &Self) -> bool {
        self.projection_type == other.projection_type
            && (self.projection_type == ProjectionType::LongLat
                || (self.datum == other.datum
                    && self.lon_0 == other.lon_0
                    && self.lat_ts == other.lat_ts
                    && self.k_0 == other.k_0
                    && self.x_0 == other.x_0
                    && self.y_0 == other.y_0))
    }
}

impl Display for Crs {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.definition)
    }
}

impl Crs {
    /// Geographic WGS84.
    pub fn wgs84() -> Self {
        Self::with_type(WGS84_SRS, ProjectionType::LongLat, Datum::WGS84)
    }

    /// Spherical Web Mercator.
    pub fn web_mercator() -> Self {
        Self::with_type(WEB_MERCATOR_SRS, ProjectionType::Mercator, Datum::WEB_SPHERE)
    }

    fn with_type(definition: &str, projection_type: ProjectionType, datum: Datum) -> Self {
        Self {
            definition: definition.to_string(),
            projection_type,
            datum,
            lon_0: 0.0,
            lat_ts: 0.0,
            k_0: 1.0,
            x_0: 0.0,
            y_0: 0.0,
        }
    }

    /// Parses a definition string.
    pub fn parse(srs: &str) -> Result<Self, TypesError> {
        let definition = srs.trim();
        if definition.is_empty() {
            return Err(invalid(srs, "empty definition"));
        }

        let lower = definition.to_ascii_lowercase();
        if let Some(code) = lower.strip_prefix("epsg:") {
            return Self::from_epsg_code(srs, code);
        }

        let mut params = BTreeMap::new();
        for token in definition.split_whitespace() {
            let Some(token) = token.strip_prefix('+') else {
                return Err(invalid(srs, &format!("unexpected token '{token}'")));
            };
            match token.split_once('=') {
                Some((key, value)) => params.insert(key, Some(value)),
                None => params.insert(token, None),
            };
        }

        if let Some(Some(init)) = params.get("init") {
            let init = init.to_ascii_lowercase();
            let Some(code) = init.strip_prefix("epsg:") else {
                return Err(invalid(srs, "only epsg init files are supported"));
            };
            let mut crs = Self::from_epsg_code(srs, code)?;
            crs.definition = srs.to_string();
            return Ok(crs);
        }

        let projection_type = match params.get("proj") {
            Some(Some("longlat" | "latlong" | "lonlat" | "latlon")) => ProjectionType::LongLat,
            Some(Some("merc")) => ProjectionType::Mercator,
            Some(Some("eqc")) => ProjectionType::Equirectangular,
            Some(Some(other)) => {
                return Err(invalid(srs, &format!("unsupported projection '{other}'")))
            }
            _ => return Err(invalid(srs, "missing +proj parameter")),
        };

        let number = |key: &str| -> Result<Option<f64>, TypesError> {
            match params.get(key) {
                None => Ok(None),
                Some(None) => Err(invalid(srs, &format!("parameter +{key} needs a value"))),
                Some(Some(value)) => value
                    .parse::<f64>()
                    .map(Some)
                    .map_err(|_| invalid(srs, &format!("invalid number for +{key}: '{value}'"))),
            }
        };

        let datum = if let Some(a) = number("a")? {
            match (number("b")?, number("rf")?) {
                (Some(b), _) => Datum::from_axes(a, b),
                (None, Some(rf)) => Datum::new(a, rf),
                (None, None) => Datum::sphere(a),
            }
        } else if let Some(r) = number("R")? {
            Datum::sphere(r)
        } else if let Some(Some(name)) = params.get("ellps") {
            Datum::by_name(name)
                .ok_or_else(|| invalid(srs, &format!("unknown ellipsoid '{name}'")))?
        } else {
            match params.get("datum") {
                None | Some(Some("WGS84")) => Datum::WGS84,
                Some(other) => {
                    return Err(invalid(
                        srs,
                        &format!("unknown datum '{}'", other.unwrap_or_default()),
                    ))
                }
            }
        };

        if datum.semimajor() <= 0.0 || !datum.semimajor().is_finite() {
            return Err(invalid(srs, "semimajor axis must be positive"));
        }

        if projection_type != ProjectionType::LongLat {
            match params.get("units") {
                None | Some(Some("m")) => {}
                Some(other) => {
                    return Err(invalid(
                        srs,
                        &format!("unsupported units '{}'", other.unwrap_or_default()),
                    ))
                }
            }
        }

        let k_0 = match number("k_0")? {
            Some(k) => Some(k),
            None => number("k")?,
        };

        Ok(Self {
            definition: srs.to_string(),
            projection_type,
            datum,
            lon_0: number("lon_0")?.unwrap_or(0.0),
            lat_ts: number("lat_ts")?.unwrap_or(0.0),
            k_0: k_0.unwrap_or(1.0),
            x_0: number("x_0")?.unwrap_or(0.0),
            y_0: number("y_0")?.unwrap_or(0.0),
        })
    }

    fn from_epsg_code(srs: &str, code: &str) -> Result<Self, TypesError> {
        let code: u32 = code
            .trim()
            .parse()
            .map_err(|_| invalid(srs, &format!("invalid EPSG code '{code}'")))?;
        let mut crs = match code {
            4326 => Self::wgs84(),
            3857 | 3785 | 900913 | 102113 => Self::web_mercator(),
            3395 => Self::with_type(srs, ProjectionType::Mercator, Datum::WGS84),
            4087 | 32662 => Self::with_type(srs, ProjectionType::Equirectangular, Datum::WGS84),
            _ => return Err(invalid(srs, &format!("unknown EPSG code {code}"))),
        };
        crs.definition = srs.to_string();
        Ok(crs)
    }

    /// The definition this system was parsed from.
    pub fn definition(&self) -> &str {
        &self.definition
    }

    /// Projection family.
    pub fn projection_type(&self) -> ProjectionType {
        self.projection_type
    }

    /// Reference ellipsoid.
    pub fn datum(&self) -> Datum {
        self.datum
    }

    /// Returns true for geographic (unprojected) systems.
    pub fn is_geographic(&self) -> bool {
        self.projection_type == ProjectionType::LongLat
    }

    /// Length of one coordinate unit in meters, measured along the equator for geographic
    /// systems.
    pub fn meters_per_unit(&self) -> f64 {
        if self.is_geographic() {
            2.0 * std::f64::consts::PI * self.datum.semimajor() / 360.0
        } else {
            1.0
        }
    }
}

fn invalid(srs: &str, reason: &str) -> TypesError {
    TypesError::InvalidCrs {
        srs: srs.to_string(),
        reason: reason.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    #[test]
    fn parse_shorthands() {
        assert_eq!(Crs::parse("+init=epsg:4326").unwrap(), Crs::wgs84());
        assert_eq!(Crs::parse("EPSG:3857").unwrap(), Crs::web_mercator());
        assert_eq!(Crs::parse(WEB_MERCATOR_SRS).unwrap(), Crs::web_mercator());
        assert_eq!(Crs::parse(WGS84_SRS).unwrap(), Crs::wgs84());
        assert_eq!(
            Crs::parse("+init=epsg:3857").unwrap().definition(),
            "+init=epsg:3857"
        );
    }

    #[test]
    fn parse_parameters() {
        let crs = Crs::parse("+proj=merc +ellps=WGS84 +lon_0=10 +x_0=500 +k=0.9996").unwrap();
        assert_eq!(crs.projection_type(), ProjectionType::Mercator);
        assert!(!crs.datum().is_sphere());
        assert_eq!(crs.lon_0, 10.0);
        assert_eq!(crs.x_0, 500.0);
        assert_eq!(crs.k_0, 0.9996);
        assert_ne!(crs, Crs::web_mercator());
    }

    #[test]
    fn invalid_definitions() {
        for srs in [
            "",
            "+proj=tmerc",
            "+ellps=WGS84",
            "proj=merc",
            "+proj=merc +lon_0=abc",
            "+proj=merc +units=ft",
            "epsg:1234",
            "+init=esri:102100",
        ] {
            assert_matches!(Crs::parse(srs), Err(TypesError::InvalidCrs { .. }), "{srs}");
        }
    }
}
