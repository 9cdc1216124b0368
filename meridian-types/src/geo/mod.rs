//! Coordinate reference systems ([`Crs`]), projections between geographic and projected
//! coordinates ([`Projection`]) and transforms between two projections ([`ProjTransform`]).

mod crs;
mod datum;
mod projection;
mod transform;

pub use crs::{Crs, ProjectionType, WEB_MERCATOR_SRS, WGS84_SRS};
pub use datum::Datum;
pub use projection::{Projection, MERCATOR_MAX_LATITUDE};
pub use transform::ProjTransform;
