//! Types and functions on geometries in cartesian coordinates.

mod rect;

pub use rect::Rect;

/// 2d point with `f64` coordinates. `x` is easting (or longitude), `y` is northing (or latitude).
pub type Point2 = nalgebra::Point2<f64>;
