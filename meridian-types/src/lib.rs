//! Geometry, extent and projection types used by the `meridian` map renderer.
//!
//! * [`cartesian`] - points and axis-aligned rectangles ([`Rect`](cartesian::Rect)), used for
//!   extents of geometries, layers and maps.
//! * [`geometry`] - the [`Geometry`] sum type produced by datasources and consumed by the
//!   renderer.
//! * [`geo`] - coordinate reference systems and transforms between them.
//! * [`wkt`] - reading and writing Well-Known Text.

pub mod cartesian;
pub mod error;
pub mod geo;
pub mod geometry;
pub mod wkt;

pub use error::TypesError;
pub use geometry::{Geometry, GeometryType, Polygon};
